//! Error types for the session crate.

use std::fmt;

/// Errors from session storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session could not be written.
    WriteFailed { session_id: String, reason: String },
    /// The session could not be read.
    ReadFailed { session_id: String, reason: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed { session_id, reason } => {
                write!(f, "failed to write session '{session_id}': {reason}")
            }
            Self::ReadFailed { session_id, reason } => {
                write!(f, "failed to read session '{session_id}': {reason}")
            }
        }
    }
}

impl std::error::Error for SessionError {}
