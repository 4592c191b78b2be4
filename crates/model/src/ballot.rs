//! Validation of a member's selection against a poll before it is persisted.

use crate::Poll;
use alloc::{collections::BTreeSet, vec::Vec};
use core::fmt::{self, Display};

#[derive(Debug, PartialEq, Eq)]
pub enum Rejection {
    /// The poll no longer accepts votes.
    Closed,
    /// The poll is restricted to roles the member does not hold.
    RoleRestricted,
    /// Fewer options than the poll's minimum were selected.
    TooFew,
    /// More options than the poll's maximum were selected.
    TooMany,
    /// A selected value does not name an option of the poll.
    UnknownOption,
}

impl Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "This poll is closed.",
            Self::RoleRestricted => "You do not hold any of the roles allowed to vote in this poll.",
            Self::TooFew => "You selected too few options.",
            Self::TooMany => "You selected too many options.",
            Self::UnknownOption => "You selected an option that does not exist.",
        })
    }
}

/// Outcome of a selection that passed validation.
#[derive(Debug, PartialEq, Eq)]
pub enum Check {
    /// The selection is set-equal to the stored ballot. Nothing should be written.
    Unchanged,
    /// The stored ballot must be replaced by these options (sorted, deduplicated).
    Replace(Vec<u16>),
}

/// Parses the raw select menu values into a sorted set of option indices.
pub fn parse_selection<S: AsRef<str>>(values: &[S]) -> Result<BTreeSet<u16>, Rejection> {
    values.iter().map(|value| value.as_ref().parse().map_err(|_| Rejection::UnknownOption)).collect()
}

/// Validates the raw `values` selected by a member holding `roles` whose stored ballot is `existing`.
///
/// The closed and role gates come before the values are parsed.
pub fn check<S: AsRef<str>>(poll: &Poll, roles: &[u64], existing: &[u16], values: &[S]) -> Result<Check, Rejection> {
    if !poll.active {
        return Err(Rejection::Closed);
    }

    if !poll.admits(roles) {
        return Err(Rejection::RoleRestricted);
    }

    let selected = parse_selection(values)?;
    if selected.iter().any(|&option| usize::from(option) >= poll.options.len()) {
        return Err(Rejection::UnknownOption);
    }

    let count = selected.len();
    if count < usize::from(poll.settings.min_votes) {
        return Err(Rejection::TooFew);
    }
    if count > usize::from(poll.settings.max_votes) {
        return Err(Rejection::TooMany);
    }

    let previous: BTreeSet<_> = existing.iter().copied().collect();
    if previous == selected {
        return Ok(Check::Unchanged);
    }

    Ok(Check::Replace(selected.iter().copied().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::tests::sample_poll;

    fn set(options: &[u16]) -> BTreeSet<u16> {
        options.iter().copied().collect()
    }

    fn values(options: &[u16]) -> Vec<String> {
        options.iter().map(u16::to_string).collect()
    }

    #[test]
    fn parses_and_deduplicates() {
        assert_eq!(parse_selection(&["2", "0", "2"]), Ok(set(&[0, 2])));
        assert_eq!(parse_selection(&["zero"]), Err(Rejection::UnknownOption));
        assert_eq!(parse_selection(&["-1"]), Err(Rejection::UnknownOption));
    }

    #[test]
    fn rejects_closed_poll_first() {
        let mut poll = sample_poll(&["Tea", "Coffee"]);
        poll.active = false;
        poll.settings.allowed_roles.push(1);
        assert_eq!(check(&poll, &[], &[], &values(&[0])), Err(Rejection::Closed));
        assert_eq!(check(&poll, &[], &[], &["garbage"]), Err(Rejection::Closed));
    }

    #[test]
    fn role_gate_precedes_parsing() {
        let mut poll = sample_poll(&["Tea", "Coffee"]);
        poll.settings.allowed_roles.push(1);
        assert_eq!(check(&poll, &[2], &[], &["garbage"]), Err(Rejection::RoleRestricted));
        assert_eq!(check(&poll, &[1], &[], &["garbage"]), Err(Rejection::UnknownOption));
    }

    #[test]
    fn rejects_restricted_member() {
        let mut poll = sample_poll(&["Tea", "Coffee"]);
        poll.settings.allowed_roles.push(1);
        assert_eq!(check(&poll, &[2], &[], &values(&[0])), Err(Rejection::RoleRestricted));
        assert_eq!(check(&poll, &[1, 2], &[], &values(&[0])), Ok(Check::Replace(vec![0])));
    }

    #[test]
    fn enforces_cardinality() {
        let mut poll = sample_poll(&["Tea", "Coffee", "Water"]);
        poll.settings.min_votes = 2;
        poll.settings.max_votes = 2;
        assert_eq!(check(&poll, &[], &[], &values(&[0])), Err(Rejection::TooFew));
        assert_eq!(check(&poll, &[], &[], &values(&[0, 1, 2])), Err(Rejection::TooMany));
        assert_eq!(check(&poll, &[], &[], &values(&[0, 5])), Err(Rejection::UnknownOption));
        assert_eq!(check(&poll, &[], &[], &values(&[2, 1])), Ok(Check::Replace(vec![1, 2])));
    }

    #[test]
    fn same_set_is_unchanged() {
        let mut poll = sample_poll(&["Tea", "Coffee", "Water"]);
        poll.settings.max_votes = 3;
        assert_eq!(check(&poll, &[], &[2, 0], &values(&[0, 2])), Ok(Check::Unchanged));
        assert_eq!(check(&poll, &[], &[0], &values(&[0, 2])), Ok(Check::Replace(vec![0, 2])));
    }
}
