//! Error types shared across reelkit crates.

use std::path::PathBuf;
use std::sync::Arc;

/// Top-level error type for reelkit operations.
#[derive(Debug, thiserror::Error)]
pub enum ReelkitError {
    #[error("Failed to open asset {locator}: {message}")]
    AssetOpen { locator: String, message: String },

    #[error("Playback engine error: {message}")]
    PlaybackEngine { message: String },

    #[error("Export encode error: {message}")]
    ExportEncode { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ReelkitError.
pub type ReelkitResult<T> = Result<T, ReelkitError>;

/// An error that has to live inside cloneable values (playback state,
/// export results, aggregate error lists).
pub type SharedError = Arc<ReelkitError>;

impl ReelkitError {
    pub fn asset_open(locator: impl ToString, msg: impl Into<String>) -> Self {
        Self::AssetOpen {
            locator: locator.to_string(),
            message: msg.into(),
        }
    }

    pub fn playback(msg: impl Into<String>) -> Self {
        Self::PlaybackEngine {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::ExportEncode {
            message: msg.into(),
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this error reports a cancelled operation rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Wrap into a [`SharedError`].
    pub fn shared(self) -> SharedError {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_message() {
        let err = ReelkitError::configuration("clip length must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration error: clip length must be positive"
        );
    }

    #[test]
    fn test_asset_open_carries_locator() {
        let err = ReelkitError::asset_open("/tmp/missing.mp4", "no such file");
        assert!(err.to_string().contains("/tmp/missing.mp4"));
        assert!(!err.is_cancelled());
        assert!(ReelkitError::Cancelled.shared().is_cancelled());
    }
}
