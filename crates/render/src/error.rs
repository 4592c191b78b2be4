use core::fmt::{self, Display};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The headless browser could not be started.
    Launch,
    /// The browser failed to produce a screenshot.
    Capture,
    /// The pool has been shut down.
    Closed,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Launch => "headless browser failed to launch",
            Self::Capture => "headless browser failed to capture the poll",
            Self::Closed => "browser pool has been shut down",
        })
    }
}

pub type Result<T> = core::result::Result<T, Error>;

impl std::error::Error for Error {}
