//! Error types for slice-update.

use std::path::PathBuf;
use thiserror::Error;

use crate::manager::UpdatePhase;

/// Result type for update operations.
pub type UpdateResult<T> = std::result::Result<T, UpdateError>;

/// Coarse classification of an [`UpdateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateErrorKind {
    /// Release index unreachable or answered with an error status.
    Transient,
    /// Release index answered, but the payload was unusable.
    Protocol,
    /// No matching asset, or no matching binary inside the archive.
    NotFound,
    /// Asset download failed on the wire.
    Network,
    /// Local filesystem failure (create, write, rename, chmod).
    Io,
    /// Downloaded archive is not valid gzip/tar.
    Format,
}

/// Errors that can occur during update operations.
#[derive(Debug, Error)]
pub enum UpdateError {
    // Release index errors
    #[error("Failed to fetch latest release: {message}")]
    Transient { message: String },

    #[error("Release index returned malformed data: {message}")]
    Protocol { message: String },

    // Selection errors
    #[error("No suitable asset found for {fragment}")]
    AssetNotFound { fragment: String },

    #[error("Binary '{name}' not found in archive")]
    BinaryNotFound { name: String },

    // Download errors
    #[error("Download failed: {message}")]
    Network { message: String },

    // Archive errors
    #[error("Failed to read archive: {message}")]
    Format { message: String },

    // File system errors
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The new binary could not be written in full and the backup was put
    /// back. `cause` is `Format` when the payload stream itself was corrupt,
    /// `Io` when the local write failed.
    #[error(
        "Failed to install new binary at {}: {source} (previous binary restored)",
        path.display()
    )]
    RolledBack {
        path: PathBuf,
        cause: UpdateErrorKind,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Failed to install new binary at {}: {forward}; restoring {} also failed: {rollback}",
        path.display(),
        backup.display()
    )]
    Unrecoverable {
        path: PathBuf,
        backup: PathBuf,
        forward: std::io::Error,
        rollback: std::io::Error,
    },

    #[error("New binary installed at {} but it could not be marked executable: {source}", path.display())]
    Permissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UpdateError {
    /// Wrap an I/O error with a short description of the failed operation.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> UpdateErrorKind {
        match self {
            Self::Transient { .. } => UpdateErrorKind::Transient,
            Self::Protocol { .. } => UpdateErrorKind::Protocol,
            Self::AssetNotFound { .. } | Self::BinaryNotFound { .. } => UpdateErrorKind::NotFound,
            Self::Network { .. } => UpdateErrorKind::Network,
            Self::Format { .. } => UpdateErrorKind::Format,
            Self::RolledBack { cause, .. } => *cause,
            Self::Io { .. }
            | Self::Unrecoverable { .. }
            | Self::Permissions { .. } => UpdateErrorKind::Io,
        }
    }

    /// Check if this error is a network error.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self.kind(),
            UpdateErrorKind::Transient | UpdateErrorKind::Network
        )
    }

    /// Whether a runnable binary is still in place after this failure.
    ///
    /// Only a failed rollback can leave the install path empty.
    pub fn left_working_binary(&self) -> bool {
        !matches!(self, Self::Unrecoverable { .. })
    }

    /// Terminal phase for failures raised while replacing the binary.
    pub fn phase(&self) -> Option<UpdatePhase> {
        match self {
            Self::RolledBack { .. } => Some(UpdatePhase::RolledBack),
            Self::Unrecoverable { .. } => Some(UpdatePhase::FailedUnrecoverable),
            // The swap itself committed; only the mode bits are off.
            Self::Permissions { .. } => Some(UpdatePhase::Committed),
            _ => None,
        }
    }
}
