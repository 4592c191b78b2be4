use alloc::vec::Vec;
use core::fmt::{self, Display};
use model::ballot::Rejection;
use twilight_http::{
    api_error::{ApiError, GeneralApiError},
    error::ErrorType,
};
use twilight_model::guild::Permissions;

/// Channel capabilities the bot needs to maintain a poll message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    ViewChannel,
    SendMessages,
    AttachFiles,
    EmbedLinks,
}

impl Capability {
    pub const ALL: [Self; 4] = [Self::ViewChannel, Self::SendMessages, Self::AttachFiles, Self::EmbedLinks];

    pub const fn permission(self) -> Permissions {
        match self {
            Self::ViewChannel => Permissions::VIEW_CHANNEL,
            Self::SendMessages => Permissions::SEND_MESSAGES,
            Self::AttachFiles => Permissions::ATTACH_FILES,
            Self::EmbedLinks => Permissions::EMBED_LINKS,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::ViewChannel => "View Channel",
            Self::SendMessages => "Send Messages",
            Self::AttachFiles => "Attach Files",
            Self::EmbedLinks => "Embed Links",
        }
    }

    /// Capabilities absent from the bot's channel permissions. Unknown permissions report every capability.
    pub fn missing(granted: Option<Permissions>) -> Vec<Self> {
        match granted {
            Some(granted) => Self::ALL.into_iter().filter(|cap| !granted.contains(cap.permission())).collect(),
            None => Self::ALL.to_vec(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    PollClosed,
    RoleRestricted,
    InvalidSelection,
    ExportsDisabled,
    PermissionDenied,
    MissingCapabilities(Vec<Capability>),
    /// Access was refused although every listed capability is granted.
    MissingAccess,
    Persistence,
    Orphaned,
    Render,
    Platform,
    UnsupportedInteraction,
    UnknownUser,
    Schema,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::PollClosed => "This poll is closed.",
            Self::RoleRestricted => "You do not have a role that is allowed to vote in this poll.",
            Self::InvalidSelection => "That selection is not valid for this poll.",
            Self::ExportsDisabled => "Exports are disabled for this poll.",
            Self::PermissionDenied => "You are not allowed to do that.",
            Self::Persistence => "We encountered an unexpected database error on our end.",
            Self::Orphaned => "This poll no longer exists. Its controls have been disabled.",
            Self::Render => "The poll image could not be rendered right now.",
            Self::MissingAccess => "I lack access to update the poll message in this channel.",
            Self::Platform => "Discord rejected the update to the poll message.",
            Self::UnsupportedInteraction => "This interaction is not supported.",
            Self::UnknownUser => "We could not identify who sent this interaction.",
            Self::Schema => "Discord provided an unexpected interaction schema.",
            Self::MissingCapabilities(caps) => {
                f.write_str("I am missing channel permissions:")?;
                for (i, cap) in caps.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}**{}**", cap.name())?;
                }
                "."
            }
        };
        f.write_str(text)
    }
}

impl From<Rejection> for Error {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Closed => Self::PollClosed,
            Rejection::RoleRestricted => Self::RoleRestricted,
            Rejection::TooFew | Rejection::TooMany | Rejection::UnknownOption => Self::InvalidSelection,
        }
    }
}

impl From<db::error::Error> for Error {
    fn from(err: db::error::Error) -> Self {
        use db::error::Error as DbError;
        match err {
            DbError::NotFound | DbError::Orphaned => Self::Orphaned,
            DbError::AlreadyExists | DbError::BadInput | DbError::Fatal => Self::Persistence,
        }
    }
}

/// Names the capabilities behind an access failure, if any of them are actually absent.
fn access_failure(granted: Option<Permissions>) -> Error {
    let missing = Capability::missing(granted);
    if missing.is_empty() {
        Error::MissingAccess
    } else {
        Error::MissingCapabilities(missing)
    }
}

/// Classifies a failed REST call. Access failures name the capabilities the bot lacks.
pub fn classify(err: &twilight_http::Error, granted: Option<Permissions>) -> Error {
    if let ErrorType::Response { error: ApiError::General(GeneralApiError { code: 50001 | 50013, .. }), .. } = err.kind() {
        log::warn!("missing access while updating a poll: {err}");
        return access_failure(granted);
    }
    log::error!("Discord request failed: {err}");
    Error::Platform
}

pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn lists_missing_capabilities() {
        let granted = Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES;
        let missing = Capability::missing(Some(granted));
        assert_eq!(missing, [Capability::AttachFiles, Capability::EmbedLinks]);
        assert_eq!(
            Error::MissingCapabilities(missing).to_string(),
            "I am missing channel permissions: **Attach Files**, **Embed Links**."
        );
    }

    #[test]
    fn unknown_permissions_report_everything() {
        assert_eq!(Capability::missing(None), Capability::ALL);
    }

    #[test]
    fn access_failure_with_every_capability_is_generic() {
        let granted = Capability::ALL.into_iter().fold(Permissions::empty(), |acc, cap| acc | cap.permission());
        assert_eq!(access_failure(Some(granted)), Error::MissingAccess);
        assert_eq!(access_failure(Some(Permissions::VIEW_CHANNEL)), Error::MissingCapabilities(Vec::from([
            Capability::SendMessages,
            Capability::AttachFiles,
            Capability::EmbedLinks,
        ])));
        assert_eq!(access_failure(None), Error::MissingCapabilities(Capability::ALL.to_vec()));
    }

    #[test]
    fn maps_rejections() {
        assert_eq!(Error::from(Rejection::Closed), Error::PollClosed);
        assert_eq!(Error::from(Rejection::TooMany), Error::InvalidSelection);
        assert_eq!(Error::from(db::error::Error::Orphaned), Error::Orphaned);
        assert_eq!(Error::from(db::error::Error::Fatal), Error::Persistence);
    }
}
