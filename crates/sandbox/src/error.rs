use std::path::{Path, PathBuf};

use thiserror::Error;

/// Guidance attached to every access denial so the tool can steer the user
/// toward the selection APIs instead of retrying the raw path.
pub const ACCESS_REMEDIATION: &str = "ask the user to pick the file or folder with \
                                      `selectFile` / `selectFolder`; paths are only reachable \
                                      after an explicit selection";

#[derive(Debug, Error)]
pub enum Error {
    /// Unknown tool, missing file, or rejected traversal. Deliberately
    /// indistinguishable so callers learn nothing about the filesystem.
    #[error("not found")]
    NotFound,

    /// Unexpected I/O or serialization failure while serving content.
    #[error("failed to load content")]
    Failed,

    #[error("access to {} denied: {remediation}", path.display())]
    AccessDenied {
        path: PathBuf,
        remediation: &'static str,
    },

    #[error("invalid tool manifest at {}: {reason}", path.display())]
    InvalidManifest { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Message(String),
}

impl Error {
    #[must_use]
    pub fn access_denied(path: &Path) -> Self {
        Self::AccessDenied {
            path: path.to_path_buf(),
            remediation: ACCESS_REMEDIATION,
        }
    }

    #[must_use]
    pub fn invalid_manifest(path: &Path, reason: impl Into<String>) -> Self {
        Self::InvalidManifest {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl toolbay_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

toolbay_common::impl_context!();

pub type Result<T> = std::result::Result<T, Error>;
