//! Unified error types for stemmix
//!
//! Error strategy:
//! - Decode failures: recovered inside the loader by falling back through the
//!   decode tiers, ending in a silence buffer. Surfaced only from the remix
//!   path when *both* inputs are unusable.
//! - Insufficient signal: recovered by documented default estimates.
//! - Upstream tool failures (Rubber Band, external beat tracker, ffmpeg):
//!   recovered by the built-in equivalent. Surfaced only where no fallback
//!   exists (stem separation).
//! - Out-of-range ratios and degenerate beat grids never become errors; they
//!   are clamped or routed to the simple aligner and logged.

use std::path::PathBuf;
use thiserror::Error;

/// Formats the universal decoder understands, for helpful error messages
pub const SUPPORTED_FORMATS: &str = "MP3, WAV, FLAC, AAC/M4A, OGG Vorbis";

/// Top-level error type for stemmix operations
#[derive(Debug, Error)]
pub enum StemmixError {
    // =========================================================================
    // Recoverable errors - a fallback usually exists
    // =========================================================================
    #[error("Failed to decode audio file '{path}': {reason}\n  Supported formats: {SUPPORTED_FORMATS}\n  Tip: installing ffmpeg widens format support")]
    DecodeFailure { path: PathBuf, reason: String },

    #[error("Insufficient signal: {reason}")]
    InsufficientSignal { reason: String },

    #[error("External tool '{tool}' failed: {reason}")]
    UpstreamTool { tool: String, reason: String },

    // =========================================================================
    // Fatal errors for the remix path
    // =========================================================================
    #[error("Stem separation failed: {reason}\n\n  To enable stem separation:\n  1. pip install demucs\n  2. Make sure ffmpeg is on PATH\n  3. Pass --demucs <python> if demucs lives in a virtualenv")]
    StemSeparation { reason: String },

    #[error("Cannot write output to '{path}': {reason}\n  Tip: Check write permissions for the output directory")]
    OutputError { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for stemmix operations
pub type Result<T> = std::result::Result<T, StemmixError>;

impl StemmixError {
    /// Returns true if a caller can fall back to a degraded result
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StemmixError::DecodeFailure { .. }
                | StemmixError::InsufficientSignal { .. }
                | StemmixError::UpstreamTool { .. }
        )
    }

    /// Returns true if the error came from an optional external backend
    pub fn is_upstream(&self) -> bool {
        matches!(self, StemmixError::UpstreamTool { .. })
    }

    /// Create a decode failure with context about the issue
    pub fn decode_failure(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StemmixError::DecodeFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an upstream tool failure
    pub fn upstream(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        StemmixError::UpstreamTool {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Create an output error, checking for common issues
    pub fn output_error(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        let reason = match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!("Permission denied. Check that you have write access to {}", path.display())
            }
            std::io::ErrorKind::NotFound => {
                format!(
                    "Directory does not exist: {}",
                    path.parent().map(|p| p.display().to_string()).unwrap_or_default()
                )
            }
            _ => err.to_string(),
        };
        StemmixError::OutputError { path, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(StemmixError::decode_failure("a.wav", "bad header").is_recoverable());
        assert!(StemmixError::upstream("rubberband", "exit 1").is_recoverable());
        assert!(!StemmixError::StemSeparation { reason: "x".into() }.is_recoverable());
        assert!(!StemmixError::ConfigError("x".into()).is_recoverable());
    }

    #[test]
    fn test_upstream_classification() {
        assert!(StemmixError::upstream("ffmpeg", "not found").is_upstream());
        assert!(!StemmixError::InsufficientSignal { reason: "silent".into() }.is_upstream());
    }

    #[test]
    fn test_output_error_permission_message() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let e = StemmixError::output_error("/tmp/out/remix.wav", err);
        assert!(e.to_string().contains("Permission denied"));
    }
}
