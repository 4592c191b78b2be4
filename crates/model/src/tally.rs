use alloc::{vec, vec::Vec};

/// Weighted per-option counts for one poll.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    /// Sum of weights selecting each option, indexed by option.
    pub counts: Vec<u64>,
    /// Sum of every vote weight.
    pub total: u64,
}

impl Tally {
    /// Sums `(option, weight)` rows into a tally over `options` options.
    ///
    /// Rows naming an option outside the poll are skipped so that `total` always equals the sum
    /// of `counts`.
    pub fn from_votes<I>(options: usize, votes: I) -> Self
    where
        I: IntoIterator<Item = (u16, u32)>,
    {
        let mut counts = vec![0; options];
        let mut total = 0;
        for (option, weight) in votes {
            let Some(count) = counts.get_mut(usize::from(option)) else {
                continue;
            };
            let weight = u64::from(weight);
            *count += weight;
            total += weight;
        }
        Self { counts, total }
    }

    /// Largest count held by any option.
    pub fn max(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}
