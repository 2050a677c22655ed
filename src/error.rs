//! Error types for sampling and display.

use std::io;
use thiserror::Error;

/// Error type for monitor operations.
///
/// `QueryUnavailable` is fatal only on the very first sample; everything
/// else is absorbed by the loop so the display stays alive.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The GPU query command could not produce output at all
    /// (binary missing, non-zero exit, or timed out).
    #[error("GPU query unavailable: {0}")]
    QueryUnavailable(String),

    /// Query output was present but not in the expected record format.
    #[error("failed to parse GPU query output: {0}")]
    Parse(String),

    /// Terminal initialization or rendering error.
    #[error("terminal error: {0}")]
    Terminal(#[from] io::Error),
}

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_unavailable_includes_reason() {
        let err = MonitorError::QueryUnavailable("nvidia-smi: not found".to_string());
        let display = err.to_string();
        assert!(
            display.contains("nvidia-smi"),
            "Error should include command detail: {}",
            display
        );
    }

    #[test]
    fn test_parse_error_includes_detail() {
        let err = MonitorError::Parse("expected 8 fields, got 3".to_string());
        let display = err.to_string();
        assert!(display.contains("8 fields"), "Error should include detail: {}", display);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let err: MonitorError = io_err.into();
        assert!(matches!(err, MonitorError::Terminal(_)), "Should convert to Terminal");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MonitorError>();
    }
}
