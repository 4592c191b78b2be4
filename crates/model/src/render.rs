//! Request schema of the render worker and the ordering rules it applies.

use alloc::{string::String, vec::Vec};
use serde::{Deserialize, Serialize};

/// Visual layout of the rendered image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Compact card shown on the poll message.
    #[default]
    Card,
    /// Multi-panel results breakdown.
    Detailed,
}

/// Everything the render worker needs to draw one poll state.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RenderRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Option labels with mentions already resolved to display text.
    pub options: Vec<String>,
    /// Weighted count per option. Absent when results must stay hidden.
    #[serde(default)]
    pub counts: Option<Vec<u64>>,
    pub total: u64,
    pub creator: String,
    pub closed: bool,
    #[serde(default)]
    pub mode: Mode,
    pub locale: String,
}

/// One option as it is laid out in the image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row<'r> {
    /// Index of the option in the poll.
    pub index: usize,
    pub label: &'r str,
    pub count: Option<u64>,
    /// Share of the total weight in whole percent.
    pub percent: Option<u64>,
    pub winner: bool,
}

impl RenderRequest {
    /// Lays out the options in display order.
    ///
    /// Open polls keep the original order and never mark winners. Closed polls with visible
    /// counts are sorted by count (descending, ties in original order) and every option tied
    /// for the highest non-zero count is marked as a winner.
    pub fn rows(&self) -> Vec<Row<'_>> {
        let counts = self.counts.as_deref();
        let mut rows: Vec<_> = self
            .options
            .iter()
            .enumerate()
            .map(|(index, label)| {
                let count = counts.map(|counts| counts.get(index).copied().unwrap_or(0));
                let percent = count.map(|count| if self.total == 0 { 0 } else { count * 100 / self.total });
                Row { index, label, count, percent, winner: false }
            })
            .collect();

        if !self.closed || counts.is_none() {
            return rows;
        }

        rows.sort_by(|a, b| b.count.cmp(&a.count));
        let best = rows.first().and_then(|row| row.count).unwrap_or(0);
        if best > 0 {
            for row in rows.iter_mut().take_while(|row| row.count == Some(best)) {
                row.winner = true;
            }
        }

        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::{string::ToString, vec};

    fn request(options: &[&str], counts: Option<Vec<u64>>, closed: bool) -> RenderRequest {
        let total = counts.as_ref().map_or(0, |counts| counts.iter().sum());
        RenderRequest {
            title: "Drinks".to_string(),
            description: None,
            options: options.iter().map(|label| label.to_string()).collect(),
            counts,
            total,
            creator: "Alice".to_string(),
            closed,
            mode: Mode::Card,
            locale: "en-US".to_string(),
        }
    }

    #[test]
    fn closed_poll_has_sole_winner() {
        let req = request(&["Tea", "Coffee"], Some(vec![3, 5]), true);
        let rows = req.rows();
        assert_eq!(rows[0].label, "Coffee");
        assert!(rows[0].winner);
        assert_eq!(rows[1].label, "Tea");
        assert!(!rows[1].winner);
        assert_eq!(rows[0].percent, Some(62));
    }

    #[test]
    fn ties_share_the_win() {
        let req = request(&["A", "B", "C"], Some(vec![4, 1, 4]), true);
        let rows = req.rows();
        let winners: Vec<_> = rows.iter().filter(|row| row.winner).map(|row| row.index).collect();
        assert_eq!(winners, [0, 2]);
        assert_eq!(rows[2].index, 1);
    }

    #[test]
    fn open_poll_keeps_order() {
        let req = request(&["Tea", "Coffee"], Some(vec![3, 5]), false);
        let rows = req.rows();
        assert_eq!(rows[0].label, "Tea");
        assert!(rows.iter().all(|row| !row.winner));
    }

    #[test]
    fn hidden_counts_are_absent() {
        let req = request(&["Tea", "Coffee"], None, false);
        assert!(req.rows().iter().all(|row| row.count.is_none() && row.percent.is_none()));
    }

    #[test]
    fn empty_closed_poll_has_no_winner() {
        let req = request(&["Tea", "Coffee"], Some(vec![0, 0]), true);
        assert!(req.rows().iter().all(|row| !row.winner));
    }

    #[test]
    fn parses_minimal_json() {
        let json = r#"{"title":"T","options":["a","b"],"total":0,"creator":"c","closed":false,"locale":"en"}"#;
        let req: RenderRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.mode, Mode::Card);
        assert!(req.counts.is_none());
    }
}
