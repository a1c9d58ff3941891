//! Error types shared by every stage of a sync run.

use std::{io, path::PathBuf};
use thiserror::Error;

/// Coarse failure category, so callers can branch without matching messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    NotFound,
    SizeMismatch,
    PartialUpload,
    Persistence,
    Config,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("source directory `{}` not found", .0.display())]
    SourceNotFound(PathBuf),
    #[error("manifest `{}` not found", .0.display())]
    ManifestNotFound(PathBuf),
    #[error("could not reach bucket `{bucket}`: {reason}")]
    Connection { bucket: String, reason: String },
    #[error("{operation} failed for `{key}`: {reason}")]
    Remote {
        operation: &'static str,
        key: String,
        reason: String,
    },
    #[error("object key `{0}` is not a valid object name")]
    InvalidObjectKey(String),
    #[error("`{key}` is {remote} bytes in the bucket, expected {local}")]
    SizeMismatch { key: String, local: u64, remote: u64 },
    #[error("upload of `{key}` stopped after {sent} of {total} bytes: {reason}")]
    PartialUpload {
        key: String,
        sent: u64,
        total: u64,
        reason: String,
    },
    #[error("could not persist manifest to `{}`: {reason}", .target.display())]
    Persistence { target: PathBuf, reason: String },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::SourceNotFound(_) | SyncError::ManifestNotFound(_) => ErrorKind::NotFound,
            SyncError::Connection { .. } | SyncError::Remote { .. } => ErrorKind::Connection,
            SyncError::SizeMismatch { .. } => ErrorKind::SizeMismatch,
            SyncError::PartialUpload { .. } => ErrorKind::PartialUpload,
            SyncError::Persistence { .. } | SyncError::Json(_) | SyncError::Io(_) => {
                ErrorKind::Persistence
            }
            SyncError::InvalidObjectKey(_) | SyncError::Config(_) => ErrorKind::Config,
        }
    }

    /// Shortcut for a failed persistence step against `target`.
    pub fn persistence(target: impl Into<PathBuf>, reason: impl ToString) -> Self {
        SyncError::Persistence {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub fn remote(operation: &'static str, key: impl Into<String>, reason: impl ToString) -> Self {
        SyncError::Remote {
            operation,
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_failure_category() {
        assert_eq!(
            SyncError::SourceNotFound("videos".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            SyncError::remote("list_objects_v2", "", "timeout").kind(),
            ErrorKind::Connection
        );
        assert_eq!(
            SyncError::SizeMismatch {
                key: "a.mp4".into(),
                local: 2,
                remote: 1
            }
            .kind(),
            ErrorKind::SizeMismatch
        );
        assert_eq!(
            SyncError::persistence("public/m.json", "read-only").kind(),
            ErrorKind::Persistence
        );
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(SyncError::from(io_err).kind(), ErrorKind::Persistence);
    }

    #[test]
    fn messages_name_the_object() {
        let err = SyncError::PartialUpload {
            key: "intro.mov".into(),
            sent: 10,
            total: 20,
            reason: "reset".into(),
        };
        assert_eq!(
            err.to_string(),
            "upload of `intro.mov` stopped after 10 of 20 bytes: reset"
        );
    }
}
