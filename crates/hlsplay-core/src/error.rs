//! Error types for hlsplay core

use thiserror::Error;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, Error>;

/// Session error types
#[derive(Error, Debug)]
pub enum Error {
    // Setup errors
    #[error("Invalid media URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    // Playback errors
    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    #[error("Media engine reported an unknown item status")]
    UnknownStatus,

    // Platform errors
    #[error("System media controls error: {0}")]
    SystemControls(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid URL error
    pub fn invalid_url(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if this error is recoverable
    ///
    /// An unknown status is transient; everything else ends the session or
    /// needs caller input.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::UnknownStatus)
    }

    /// Returns a stable error code for logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidUrl { .. } => "INVALID_URL",
            Error::PlaybackFailed(_) => "PLAYBACK_FAILED",
            Error::UnknownStatus => "UNKNOWN_STATUS",
            Error::SystemControls(_) => "SYSTEM_CONTROLS",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Json(_) => "JSON",
            Error::Io(_) => "IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::invalid_url("", "empty").error_code(), "INVALID_URL");
        assert_eq!(Error::PlaybackFailed("403".into()).error_code(), "PLAYBACK_FAILED");
        assert_eq!(Error::UnknownStatus.error_code(), "UNKNOWN_STATUS");
    }

    #[test]
    fn test_only_unknown_status_is_recoverable() {
        assert!(Error::UnknownStatus.is_recoverable());
        assert!(!Error::PlaybackFailed("gone".into()).is_recoverable());
        assert!(!Error::InvalidConfig("zero".into()).is_recoverable());
    }
}
