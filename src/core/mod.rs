//! Core framework types shared across the worker

pub mod error;

pub use error::{AudioOperation, ResourceKind, Result, TtsError};
