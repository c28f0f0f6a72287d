//! Structured error handling for the worker.
//!
//! The variants deliberately distinguish validation failures, resource-guard
//! rejections, backend failures, and I/O failures so callers can react
//! differently to each (retry a resource rejection, never retry validation).

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias with [`TtsError`]
pub type Result<T> = std::result::Result<T, TtsError>;

/// Main error type for the worker
#[derive(Error, Debug, Clone)]
pub enum TtsError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Model loading errors
    #[error("Model loading error: {message}")]
    ModelLoad {
        message: String,
        path: Option<PathBuf>,
    },

    /// Input validation errors (never retried)
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Resource-guard rejections (insufficient device memory etc.)
    #[error("Resource error ({resource}): {message}")]
    Resource {
        message: String,
        resource: ResourceKind,
    },

    /// Failures inside the opaque generation backend
    #[error("Backend error: {message}")]
    Backend { message: String },

    /// Audio decoding/playback errors
    #[error("Audio processing error ({operation}): {message}")]
    Audio {
        message: String,
        operation: AudioOperation,
    },

    /// I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
    },

    /// Malformed protocol input (bad JSON, missing fields)
    #[error("Protocol error: {message}")]
    Protocol { message: String },
}

/// Resource categories the guard can reject on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    DeviceMemory,
    Model,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::DeviceMemory => write!(f, "device memory"),
            ResourceKind::Model => write!(f, "model"),
        }
    }
}

/// Audio operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioOperation {
    Decoding,
    Playback,
    Saving,
    Probing,
}

impl fmt::Display for AudioOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioOperation::Decoding => write!(f, "decoding"),
            AudioOperation::Playback => write!(f, "playback"),
            AudioOperation::Saving => write!(f, "saving"),
            AudioOperation::Probing => write!(f, "probing"),
        }
    }
}

impl From<std::io::Error> for TtsError {
    fn from(err: std::io::Error) -> Self {
        TtsError::Io {
            message: err.to_string(),
            path: None,
        }
    }
}
