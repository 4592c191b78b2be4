use alloc::{collections::BTreeMap, string::String, vec::Vec};
use chrono::{DateTime, Utc};
use core::fmt::{self, Display};
use serde::{Deserialize, Serialize};

/// Smallest number of options a poll may carry.
pub const MIN_OPTIONS: usize = 2;
/// Largest number of options a poll may carry. This is also the select menu limit.
pub const MAX_OPTIONS: usize = 25;
/// Longest permitted option label (in characters).
pub const MAX_LABEL_LEN: usize = 100;

/// Cached display data for a role referenced by a poll's restrictions or weights.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RoleMeta {
    pub name: String,
    pub color: u32,
}

/// Voting settings attached to a poll at creation time.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Whether live tallies are shown while the poll is still open.
    pub public: bool,
    /// Whether the close button may be shown on the poll message.
    pub allow_close: bool,
    /// Whether voter rolls may be exported as files.
    pub allow_exports: bool,
    /// Minimum number of options per ballot.
    pub min_votes: u8,
    /// Maximum number of options per ballot.
    pub max_votes: u8,
    /// Roles permitted to vote. Empty means unrestricted.
    #[serde(default)]
    pub allowed_roles: Vec<u64>,
    /// Poll-specific role weights. Every weight is at least two.
    #[serde(default)]
    pub vote_weights: BTreeMap<u64, u32>,
    /// Display data for every role named above.
    #[serde(default)]
    pub role_metadata: BTreeMap<u64, RoleMeta>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            public: true,
            allow_close: true,
            allow_exports: false,
            min_votes: 1,
            max_votes: 1,
            allowed_roles: Vec::new(),
            vote_weights: BTreeMap::new(),
            role_metadata: BTreeMap::new(),
        }
    }
}

/// A poll record. The platform message ID doubles as its primary key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Poll {
    pub id: u64,
    pub guild: u64,
    pub channel: u64,
    pub creator: u64,
    pub title: String,
    pub description: Option<String>,
    pub options: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub settings: Settings,
}

/// Reasons a poll record may be rejected before it is persisted.
#[derive(Debug, PartialEq, Eq)]
pub enum Invalid {
    TooFewOptions,
    TooManyOptions,
    LabelTooLong(usize),
    SelectionBounds,
    WeightTooLow(u64),
}

impl Display for Invalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewOptions => write!(f, "A poll needs at least {MIN_OPTIONS} options."),
            Self::TooManyOptions => write!(f, "A poll may have at most {MAX_OPTIONS} options."),
            Self::LabelTooLong(index) => {
                write!(f, "Option {} is longer than {MAX_LABEL_LEN} characters.", index + 1)
            }
            Self::SelectionBounds => f.write_str("Selection bounds must satisfy `1 <= min <= max <= options`."),
            Self::WeightTooLow(role) => write!(f, "Role `{role}` must have a weight of at least 2."),
        }
    }
}

impl Poll {
    /// Checks the record invariants: option count and length, selection bounds, and weights.
    pub fn validate(&self) -> Result<(), Invalid> {
        let count = self.options.len();
        if count < MIN_OPTIONS {
            return Err(Invalid::TooFewOptions);
        }
        if count > MAX_OPTIONS {
            return Err(Invalid::TooManyOptions);
        }

        if let Some(index) = self.options.iter().position(|label| label.chars().count() > MAX_LABEL_LEN) {
            return Err(Invalid::LabelTooLong(index));
        }

        let Settings { min_votes, max_votes, .. } = self.settings;
        if min_votes == 0 || min_votes > max_votes || usize::from(max_votes) > count {
            return Err(Invalid::SelectionBounds);
        }

        if let Some((&role, _)) = self.settings.vote_weights.iter().find(|(_, &weight)| weight < 2) {
            return Err(Invalid::WeightTooLow(role));
        }

        Ok(())
    }

    /// Label of the option at `index`, if it exists.
    pub fn label(&self, index: u16) -> Option<&str> {
        self.options.get(usize::from(index)).map(String::as_str)
    }

    /// Whether the member holding `roles` may vote at all.
    pub fn admits(&self, roles: &[u64]) -> bool {
        let allowed = &self.settings.allowed_roles;
        allowed.is_empty() || roles.iter().any(|role| allowed.contains(role))
    }

    /// Closed polls always show their results.
    pub fn shows_results(&self) -> bool {
        !self.active || self.settings.public
    }
}

/// One option selected by one user on one poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vote {
    pub poll: u64,
    pub user: u64,
    pub option: u16,
    pub weight: u32,
    pub created_at: DateTime<Utc>,
}

/// Guild-wide settings shared by every poll in the guild.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuildSettings {
    /// Global role weights. These apply alongside each poll's own weights.
    pub weights: BTreeMap<u64, u32>,
    /// Whether close and reopen buttons are shown on poll messages.
    pub show_buttons: bool,
    /// Role whose holders may manage polls without the guild-management permission.
    pub manager_role: Option<u64>,
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self { weights: BTreeMap::new(), show_buttons: true, manager_role: None }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloc::string::ToString;

    pub fn sample_poll(options: &[&str]) -> Poll {
        Poll {
            id: 1000,
            guild: 10,
            channel: 20,
            creator: 30,
            title: "Drinks".to_string(),
            description: None,
            options: options.iter().map(|label| label.to_string()).collect(),
            active: true,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            settings: Settings::default(),
        }
    }

    #[test]
    fn accepts_well_formed_poll() {
        assert_eq!(sample_poll(&["Tea", "Coffee"]).validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_option_counts() {
        assert_eq!(sample_poll(&["Tea"]).validate(), Err(Invalid::TooFewOptions));
        let many: Vec<_> = (0..26).map(|i| i.to_string()).collect();
        let many: Vec<_> = many.iter().map(String::as_str).collect();
        assert_eq!(sample_poll(&many).validate(), Err(Invalid::TooManyOptions));
    }

    #[test]
    fn rejects_long_labels() {
        let long = "x".repeat(101);
        assert_eq!(sample_poll(&["Tea", &long]).validate(), Err(Invalid::LabelTooLong(1)));
    }

    #[test]
    fn rejects_inverted_bounds() {
        let mut poll = sample_poll(&["Tea", "Coffee"]);
        poll.settings.min_votes = 2;
        poll.settings.max_votes = 1;
        assert_eq!(poll.validate(), Err(Invalid::SelectionBounds));
        poll.settings.max_votes = 3;
        assert_eq!(poll.validate(), Err(Invalid::SelectionBounds));
    }

    #[test]
    fn rejects_unit_weights() {
        let mut poll = sample_poll(&["Tea", "Coffee"]);
        poll.settings.vote_weights.insert(7, 1);
        assert_eq!(poll.validate(), Err(Invalid::WeightTooLow(7)));
    }

    #[test]
    fn restricts_by_role() {
        let mut poll = sample_poll(&["Tea", "Coffee"]);
        assert!(poll.admits(&[]));
        poll.settings.allowed_roles.push(5);
        assert!(!poll.admits(&[4]));
        assert!(poll.admits(&[4, 5]));
    }

    #[test]
    fn settings_survive_json() {
        let mut settings = Settings::default();
        settings.vote_weights.insert(42, 3);
        settings.role_metadata.insert(42, RoleMeta { name: "Mods".to_string(), color: 0xFF0000 });
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
