//! Offset arithmetic for browsing per-option voter rolls.

/// Number of voters listed per page.
pub const PAGE_SIZE: u32 = 15;

/// A resolved page of a voter roll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    /// Zero-based page index, clamped to the valid range.
    pub index: u32,
    /// Index of the last page. An empty roll still has one (empty) page.
    pub last: u32,
    /// Total number of voters in the roll.
    pub voters: u64,
}

impl Page {
    /// Clamps `requested` against a roll of `voters` entries.
    pub fn clamp(requested: u32, voters: u64) -> Self {
        let pages = voters.div_ceil(u64::from(PAGE_SIZE));
        let last = u32::try_from(pages.saturating_sub(1)).unwrap_or(u32::MAX);
        Self { index: requested.min(last), last, voters }
    }

    pub const fn offset(&self) -> u64 {
        self.index as u64 * PAGE_SIZE as u64
    }

    pub const fn limit(&self) -> u32 {
        PAGE_SIZE
    }

    pub const fn has_prev(&self) -> bool {
        self.index > 0
    }

    pub const fn has_next(&self) -> bool {
        self.index < self.last
    }
}

#[cfg(test)]
mod tests {
    use super::Page;

    #[test]
    fn seventeen_voters_span_two_pages() {
        let first = Page::clamp(0, 17);
        assert_eq!(first.last, 1);
        assert_eq!(first.offset(), 0);
        assert!(first.has_next());
        assert!(!first.has_prev());

        let second = Page::clamp(1, 17);
        assert_eq!(second.offset(), 15);
        assert!(!second.has_next());
        assert!(second.has_prev());
    }

    #[test]
    fn clamps_out_of_range_pages() {
        assert_eq!(Page::clamp(9, 17).index, 1);
        assert_eq!(Page::clamp(9, 15).index, 0);
        assert_eq!(Page::clamp(2, 31).index, 2);
    }

    #[test]
    fn empty_roll_has_single_page() {
        let page = Page::clamp(3, 0);
        assert_eq!(page.index, 0);
        assert_eq!(page.last, 0);
        assert!(!page.has_prev());
        assert!(!page.has_next());
    }
}
