use std::fmt;

/// Failures that prevent the push subsystem from being created at all.
///
/// Everything that can go wrong after construction is reported through the
/// owner-facing status channel instead; see `push::PushStatus`.
#[derive(Debug)]
pub enum Error {
    /// A queue or buffer was configured below the minimum required to keep
    /// the transport reader from stalling behind a burst of notifications.
    UndersizedQueue {
        name: &'static str,
        min: usize,
        got: usize,
    },
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use Error::*;
        match self {
            UndersizedQueue { name, min, got } => write!(
                f,
                "the {} queue holds {} entries but must hold at least {}",
                name, got, min
            ),
        }
    }
}
