use core::fmt::{self, Display};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The record we are trying to insert already exists.
    AlreadyExists,
    /// The requested record does not exist.
    NotFound,
    /// A vote referenced a poll that has since been deleted.
    Orphaned,
    /// The record violates a table constraint.
    BadInput,
    /// Unrecoverable error.
    Fatal,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AlreadyExists => "record already exists",
            Self::NotFound => "record not found",
            Self::Orphaned => "referenced poll no longer exists",
            Self::BadInput => "record violates a table constraint",
            Self::Fatal => "unrecoverable database error",
        })
    }
}

pub type Result<T> = core::result::Result<T, Error>;
