//! Error types for score ingestion, analysis and session handling.
//!
//! This module provides the error hierarchy using `thiserror`. Every error
//! carries a stable code so a host UI can decide how to present it.
//!
//! Errors are serializable so they can be handed to a frontend as
//! `{ "code": ..., "message": ... }`.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the kokufuku library.
#[derive(Error, Debug)]
pub enum KokufukuError {
    /// Uploaded bytes are neither valid UTF-8 nor Shift_JIS.
    #[error("Could not decode '{file}' as UTF-8 or Shift_JIS")]
    Decode { file: String },

    /// No row of the file contains a header marker.
    #[error("No header marker found in '{file}'")]
    HeaderNotFound { file: String },

    /// The reshaped table has no score column.
    #[error("No score column found in '{file}'")]
    ScoreColumnMissing { file: String },

    /// The CSV reader rejected the file.
    #[error("Malformed CSV in '{file}': {reason}")]
    MalformedCsv { file: String, reason: String },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Caller supplied input outside the accepted range.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An imported session snapshot could not be decoded.
    #[error("Corrupt session snapshot: {0}")]
    SnapshotCorrupt(String),

    /// No session is registered under the given identifier.
    #[error("Session '{0}' not found")]
    SessionNotFound(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error (for AI client, only with "ai" feature).
    #[cfg(feature = "ai")]
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<KokufukuError>,
    },
}

impl KokufukuError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        KokufukuError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "DECODE_FAILED",
            Self::HeaderNotFound { .. } => "HEADER_NOT_FOUND",
            Self::ScoreColumnMissing { .. } => "SCORE_COLUMN_MISSING",
            Self::MalformedCsv { .. } => "MALFORMED_CSV",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::SnapshotCorrupt(_) => "SNAPSHOT_CORRUPT",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            #[cfg(feature = "ai")]
            Self::HttpRequest(_) => "HTTP_REQUEST_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error means a single uploaded file could not be parsed.
    ///
    /// Such errors are reported per file and never abort a batch.
    pub fn is_ingestion_error(&self) -> bool {
        match self {
            Self::Decode { .. }
            | Self::HeaderNotFound { .. }
            | Self::ScoreColumnMissing { .. }
            | Self::MalformedCsv { .. } => true,
            Self::WithContext { source, .. } => source.is_ingestion_error(),
            _ => false,
        }
    }

    /// Check if this error is recoverable (session state is left intact).
    pub fn is_recoverable(&self) -> bool {
        self.is_ingestion_error()
            || matches!(
                self,
                Self::SnapshotCorrupt(_) | Self::InvalidInput(_) | Self::InvalidConfig(_)
            )
    }
}

/// Errors are serialized as a struct with `code` and `message` fields,
/// making them easy to handle in a frontend.
impl Serialize for KokufukuError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("KokufukuError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for kokufuku operations.
pub type Result<T> = std::result::Result<T, KokufukuError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| KokufukuError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let error = KokufukuError::HeaderNotFound {
            file: "a.csv".to_string(),
        };
        assert_eq!(error.error_code(), "HEADER_NOT_FOUND");
        assert_eq!(
            KokufukuError::SnapshotCorrupt("bad".to_string()).error_code(),
            "SNAPSHOT_CORRUPT"
        );
    }

    #[test]
    fn test_is_ingestion_error() {
        assert!(
            KokufukuError::Decode {
                file: "x.csv".to_string()
            }
            .is_ingestion_error()
        );
        assert!(!KokufukuError::InvalidInput("x".to_string()).is_ingestion_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(KokufukuError::SnapshotCorrupt("x".to_string()).is_recoverable());
        assert!(
            KokufukuError::ScoreColumnMissing {
                file: "x.csv".to_string()
            }
            .is_recoverable()
        );
        assert!(!KokufukuError::SessionNotFound("s".to_string()).is_recoverable());
    }

    #[test]
    fn test_error_serialization() {
        let error = KokufukuError::ScoreColumnMissing {
            file: "数学.csv".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("SCORE_COLUMN_MISSING"));
        assert!(json.contains("数学.csv"));
    }

    #[test]
    fn test_with_context() {
        let error = KokufukuError::HeaderNotFound {
            file: "b.csv".to_string(),
        }
        .with_context("During ingest");
        assert!(error.to_string().contains("During ingest"));
        assert_eq!(error.error_code(), "HEADER_NOT_FOUND");
        assert!(error.is_ingestion_error());
    }
}
