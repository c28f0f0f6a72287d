//! Backend seam for speech model inference
//!
//! The inference runtime is treated as an opaque capability behind two
//! traits: [`SpeechBackend`] turns a model artifact path into a
//! [`LoadedModel`], and a loaded model turns text plus a parameter bundle
//! into audio samples. The rest of the worker never sees anything more
//! concrete, which keeps the engine testable against fakes.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::Result;

mod synthetic;

pub use synthetic::SyntheticBackend;

/// A speech-synthesis backend capable of loading model artifacts
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Backend identifier reported by `describe()`
    fn name(&self) -> &'static str;

    /// Load a model artifact. The path is known to exist when called.
    async fn load(&self, model_path: &Path) -> Result<Box<dyn LoadedModel>>;
}

/// A loaded model ready for generation
///
/// Implementations are assumed NOT to be safe for concurrent generate
/// calls; the synthesis engine serializes access.
#[async_trait]
pub trait LoadedModel: Send + Sync {
    /// Resolve the voice profile used when a job names none
    fn default_voice(&self) -> Result<VoiceProfile>;

    /// Generate audio for the request. Blocking and CPU/GPU-bound.
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedAudio>;
}

/// Reference to the vocal characteristics used for generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceProfile {
    /// Voice identifier, e.g. "en-female-1-neutral"
    pub id: String,
}

impl VoiceProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Generation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// Single-pass generation
    Regular,
    /// Chunked generation with incremental decoding
    Chunked,
}

/// Concrete generation-parameter bundle handed to the backend
///
/// Built by merging a quality preset with per-job overrides; the sampler
/// fields beyond the preset are fixed engine-wide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub mode: GenerationMode,
    pub max_batch_size: usize,
    /// Granularity of incremental audio decoding
    pub decode_chunk: usize,
    pub max_length: usize,
    pub temperature: f32,
    pub repetition_penalty: f32,
    pub repetition_range: usize,
    pub top_k: usize,
    pub top_p: f32,
    pub min_p: f32,
    pub mirostat: bool,
    pub mirostat_tau: f32,
    pub mirostat_eta: f32,
}

/// One generation call into the backend
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub text: String,
    pub voice: VoiceProfile,
    pub params: GenerationParams,
}

/// Raw audio produced by a backend
#[derive(Debug, Clone)]
pub struct GeneratedAudio {
    /// Mono samples normalized to [-1, 1]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl GeneratedAudio {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}
