use std::fmt::Display;
use thiserror::Error;

pub type Result<T, E = DriveListError> = std::result::Result<T, E>;

/// Fatal enumeration failures. Per-device problems never surface here; the
/// enumerators skip the device and carry on.
#[derive(Debug, Error)]
pub enum DriveListError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("{call} failed: {message}")]
    Native { call: &'static str, message: String },
    #[error("could not decode {what}: {message}")]
    Decode { what: &'static str, message: String },
    #[error("drive enumeration is not supported on {0}")]
    Unsupported(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The native facility could not be queried.
    Acquisition,
    /// The facility answered with a payload that could not be parsed.
    Decode,
}

impl DriveListError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Spawn { .. }
            | Self::CommandFailed { .. }
            | Self::Native { .. }
            | Self::Unsupported(_) => ErrorKind::Acquisition,
        }
    }

    pub fn decode(what: &'static str, err: impl Display) -> Self {
        Self::Decode {
            what,
            message: err.to_string(),
        }
    }

    pub fn native(call: &'static str, err: impl Display) -> Self {
        Self::Native {
            call,
            message: err.to_string(),
        }
    }
}
