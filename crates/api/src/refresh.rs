//! Ordering of concurrent repaints of the same poll message.

use dashmap::DashMap;

#[derive(Default)]
struct Sequence {
    latest: u64,
    pending: u32,
}

/// In-flight refreshes per poll. Only the newest one may repaint the message.
#[derive(Default)]
pub struct Refreshes(DashMap<u64, Sequence>);

impl Refreshes {
    /// Registers a refresh of `poll` and returns its ticket.
    pub fn begin(&self, poll: u64) -> u64 {
        let mut seq = self.0.entry(poll).or_default();
        seq.latest += 1;
        seq.pending += 1;
        seq.latest
    }

    /// Whether a refresh newer than `ticket` has begun since.
    pub fn is_stale(&self, poll: u64, ticket: u64) -> bool {
        self.0.get(&poll).is_some_and(|seq| seq.latest != ticket)
    }

    /// Retires one refresh of `poll`. The entry is dropped once none remain in flight.
    pub fn finish(&self, poll: u64) {
        if let Some(mut seq) = self.0.get_mut(&poll) {
            seq.pending = seq.pending.saturating_sub(1);
        }
        self.0.remove_if(&poll, |_, seq| seq.pending == 0);
    }
}
