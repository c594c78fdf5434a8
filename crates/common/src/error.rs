//! Error types shared across Oculo crates.

use std::path::PathBuf;

/// Top-level error type for Oculo operations.
#[derive(Debug, thiserror::Error)]
pub enum OculoError {
    #[error("Tracking error: {message}")]
    Tracking { message: String },

    #[error("Processing error: {message}")]
    Processing { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Service error: {message}")]
    Service { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

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

/// Result type alias using OculoError.
pub type OculoResult<T> = Result<T, OculoError>;

impl OculoError {
    pub fn tracking(msg: impl Into<String>) -> Self {
        Self::Tracking {
            message: msg.into(),
        }
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing {
            message: msg.into(),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage {
            message: msg.into(),
        }
    }

    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
