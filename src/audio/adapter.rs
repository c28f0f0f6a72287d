//! Audio utility adapter
//!
//! File-level probe and playback operations exposed over the worker
//! protocol. The adapter holds no audio buffers between calls; every
//! operation decodes the file fresh.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::core::error::{AudioOperation, Result, TtsError};

use super::effects::{self, EffectSettings};
use super::output::{self, AudioSink};
#[cfg(not(feature = "playback"))]
use super::output::NullSink;

/// Probe result for `audio_info`
#[derive(Debug, Clone, Serialize)]
pub struct AudioInfo {
    pub success: bool,
    /// Duration in seconds
    pub duration: f64,
    pub file_size: u64,
    pub format: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
}

/// Playback result for `play_audio`, describing the audio as played
/// (after effects)
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackReport {
    pub success: bool,
    pub duration: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
}

/// Stateless adapter over a playback sink
#[derive(Clone)]
pub struct AudioAdapter {
    sink: Arc<dyn AudioSink>,
}

impl AudioAdapter {
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self { sink }
    }

    /// Adapter wired to the platform playback sink when the `playback`
    /// feature is enabled, and to a discarding sink otherwise
    pub fn with_default_sink() -> Self {
        #[cfg(feature = "playback")]
        {
            Self::new(Arc::new(output::CpalSink))
        }
        #[cfg(not(feature = "playback"))]
        {
            Self::new(Arc::new(NullSink))
        }
    }

    /// Probe a WAV file without retaining its contents
    pub fn info(&self, path: &Path) -> Result<AudioInfo> {
        check_format(path)?;
        let file_size = std::fs::metadata(path)
            .map_err(|e| TtsError::Audio {
                message: format!("Cannot stat {}: {e}", path.display()),
                operation: AudioOperation::Probing,
            })?
            .len();
        let decoded = output::read_wav(path)?;

        Ok(AudioInfo {
            success: true,
            duration: decoded.duration_secs(),
            file_size,
            format: "wav".to_string(),
            sample_rate: decoded.sample_rate,
            channels: decoded.channels,
            bit_depth: decoded.bits_per_sample,
        })
    }

    /// Decode, apply effects, and play through the sink (blocking)
    pub fn play(&self, path: &Path, settings: &EffectSettings) -> Result<PlaybackReport> {
        check_format(path)?;
        let decoded = output::read_wav(path)?;
        let processed = if settings.is_noop() {
            decoded
        } else {
            effects::apply(decoded, settings)
        };

        info!(
            path = %path.display(),
            duration_secs = processed.duration_secs(),
            sample_rate = processed.sample_rate,
            "Playing audio"
        );
        self.sink
            .play(&processed.samples, processed.sample_rate, processed.channels)?;

        Ok(PlaybackReport {
            success: true,
            duration: processed.duration_secs(),
            sample_rate: processed.sample_rate,
            channels: processed.channels,
            bit_depth: processed.bits_per_sample,
        })
    }
}

fn check_format(path: &Path) -> Result<()> {
    let supported = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    if supported {
        Ok(())
    } else {
        Err(TtsError::Audio {
            message: format!("Unsupported audio format: {}", path.display()),
            operation: AudioOperation::Decoding,
        })
    }
}
