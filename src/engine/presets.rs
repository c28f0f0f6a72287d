//! Quality preset table
//!
//! Pure lookup from a quality level to a concrete generation-parameter
//! bundle. The three bundles trade latency for fidelity: `fast` uses larger
//! batches and coarser decode chunks at a higher temperature, `high` uses
//! small batches, fine decode chunks, and conservative repetition control.
//! The values are configuration constants, not computed.

use serde::{Deserialize, Serialize};

use crate::backend::{GenerationMode, GenerationParams};

// Sampler settings shared by every preset.
pub const TOP_K: usize = 40;
pub const TOP_P: f32 = 0.9;
pub const MIN_P: f32 = 0.05;
/// Must stay 64; the decoder misbehaves with other windows.
pub const REPETITION_RANGE: usize = 64;
pub const MIROSTAT_TAU: f32 = 5.0;
pub const MIROSTAT_ETA: f32 = 0.1;

/// Named quality level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Fast,
    Balanced,
    High,
}

impl Quality {
    /// Parse a quality name, falling back to `High` for anything outside
    /// the closed set. The fallback is deliberate wire behavior: unknown
    /// names must never fail a job.
    pub fn parse(name: &str) -> Self {
        match name {
            "fast" => Self::Fast,
            "balanced" => Self::Balanced,
            _ => Self::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::High => "high",
        }
    }

    /// Resolve the parameter bundle for this level
    pub fn preset(self) -> QualityPreset {
        match self {
            Self::Fast => FAST,
            Self::Balanced => BALANCED,
            Self::High => HIGH,
        }
    }
}

/// Generation-parameter bundle for one quality level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityPreset {
    pub mode: GenerationMode,
    pub max_batch_size: usize,
    pub decode_chunk: usize,
    pub max_length: usize,
    pub temperature: f32,
    pub repetition_penalty: f32,
}

const FAST: QualityPreset = QualityPreset {
    mode: GenerationMode::Regular,
    max_batch_size: 16,
    decode_chunk: 2048,
    max_length: 8192,
    temperature: 0.6,
    repetition_penalty: 1.05,
};

const BALANCED: QualityPreset = QualityPreset {
    mode: GenerationMode::Chunked,
    max_batch_size: 12,
    decode_chunk: 1536,
    max_length: 6144,
    temperature: 0.5,
    repetition_penalty: 1.08,
};

const HIGH: QualityPreset = QualityPreset {
    mode: GenerationMode::Chunked,
    max_batch_size: 8,
    decode_chunk: 1024,
    max_length: 4096,
    temperature: 0.4,
    repetition_penalty: 1.1,
};

impl QualityPreset {
    /// Expand the preset into the full bundle handed to the backend
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            mode: self.mode,
            max_batch_size: self.max_batch_size,
            decode_chunk: self.decode_chunk,
            max_length: self.max_length,
            temperature: self.temperature,
            repetition_penalty: self.repetition_penalty,
            repetition_range: REPETITION_RANGE,
            top_k: TOP_K,
            top_p: TOP_P,
            min_p: MIN_P,
            mirostat: true,
            mirostat_tau: MIROSTAT_TAU,
            mirostat_eta: MIROSTAT_ETA,
        }
    }
}
