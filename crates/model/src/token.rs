//! Custom IDs carried by message components.
//!
//! Every component encodes the full state needed to service it, so any instance of the
//! interaction server can handle any click without a server-side session.

use core::{
    fmt::{self, Display},
    str::FromStr,
};

/// Navigation and export actions of the voter-roll browser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Select,
    First,
    Prev,
    Next,
    Last,
    Export,
}

impl Action {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::First => "first",
            Self::Prev => "prev",
            Self::Next => "next",
            Self::Last => "last",
            Self::Export => "export",
        }
    }

    /// Page that this action leads to from `current`, given the index of the `last` page.
    pub fn target(self, current: u32, last: u32) -> u32 {
        let page = match self {
            Self::Select | Self::First => 0,
            Self::Prev => current.saturating_sub(1),
            Self::Next => current.saturating_add(1),
            Self::Last => last,
            Self::Export => current,
        };
        page.min(last)
    }
}

impl FromStr for Action {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "select" => Self::Select,
            "first" => Self::First,
            "prev" => Self::Prev,
            "next" => Self::Next,
            "last" => Self::Last,
            "export" => Self::Export,
            _ => return Err(ParseError::Action),
        })
    }
}

/// State of one voter-roll browser control: `view_{poll}_{action}_{page}_{option}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewToken {
    pub poll: u64,
    pub action: Action,
    pub page: u32,
    pub option: u16,
}

impl ViewToken {
    pub const fn new(poll: u64, action: Action, page: u32, option: u16) -> Self {
        Self { poll, action, page, option }
    }

    /// The same state with a different action, used when building a control row.
    pub const fn with(self, action: Action) -> Self {
        Self { action, ..self }
    }
}

impl Display for ViewToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { poll, action, page, option } = *self;
        write!(f, "view_{poll}_{}_{page}_{option}", action.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The custom ID prefix is not one we issue.
    Prefix,
    /// The wrong number of fields followed the prefix.
    Arity,
    /// A numeric field failed to parse.
    Number,
    /// The browser action is unknown.
    Action,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Prefix => "unknown custom ID prefix",
            Self::Arity => "unexpected number of custom ID fields",
            Self::Number => "malformed numeric custom ID field",
            Self::Action => "unknown browser action",
        })
    }
}

/// Every component custom ID issued by the bot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CustomId {
    Vote(u64),
    Close(u64),
    Reopen(u64),
    Results(u64),
    Csv(u64),
    View(ViewToken),
}

impl CustomId {
    pub const fn poll(&self) -> u64 {
        match *self {
            Self::Vote(poll) | Self::Close(poll) | Self::Reopen(poll) | Self::Results(poll) | Self::Csv(poll) => poll,
            Self::View(ViewToken { poll, .. }) => poll,
        }
    }
}

impl Display for CustomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vote(poll) => write!(f, "vote_{poll}"),
            Self::Close(poll) => write!(f, "close_{poll}"),
            Self::Reopen(poll) => write!(f, "reopen_{poll}"),
            Self::Results(poll) => write!(f, "results_{poll}"),
            Self::Csv(poll) => write!(f, "csv_{poll}"),
            Self::View(token) => token.fmt(f),
        }
    }
}

fn number<T: FromStr>(field: Option<&str>) -> Result<T, ParseError> {
    field.ok_or(ParseError::Arity)?.parse().map_err(|_| ParseError::Number)
}

impl FromStr for CustomId {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, rest) = s.split_once('_').ok_or(ParseError::Prefix)?;
        let mut fields = rest.split('_');

        let id = match prefix {
            "vote" => Self::Vote(number(fields.next())?),
            "close" => Self::Close(number(fields.next())?),
            "reopen" => Self::Reopen(number(fields.next())?),
            "results" => Self::Results(number(fields.next())?),
            "csv" => Self::Csv(number(fields.next())?),
            "view" => {
                let poll = number(fields.next())?;
                let action = fields.next().ok_or(ParseError::Arity)?.parse()?;
                let page = number(fields.next())?;
                let option = number(fields.next())?;
                Self::View(ViewToken { poll, action, page, option })
            }
            _ => return Err(ParseError::Prefix),
        };

        if fields.next().is_some() {
            return Err(ParseError::Arity);
        }

        Ok(id)
    }
}
