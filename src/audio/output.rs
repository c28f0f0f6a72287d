//! WAV encoding, decoding, and playback sinks

use std::path::Path;

use crate::core::error::{AudioOperation, Result, TtsError};

/// Decoded PCM audio, channel-interleaved f32 in [-1, 1]
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl DecodedAudio {
    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.channels == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        let frames = self.samples.len() / self.channels as usize;
        frames as f64 / f64::from(self.sample_rate)
    }
}

/// Save mono samples as 16-bit PCM WAV; returns the file size in bytes
pub fn save_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<u64> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| TtsError::Audio {
            message: format!("Failed to create WAV file {}: {e}", path.display()),
            operation: AudioOperation::Saving,
        })?;

    for &sample in samples {
        let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer.write_sample(scaled).map_err(|e| TtsError::Audio {
            message: format!("Failed to write WAV sample: {e}"),
            operation: AudioOperation::Saving,
        })?;
    }

    writer.finalize().map_err(|e| TtsError::Audio {
        message: format!("Failed to finalize WAV file: {e}"),
        operation: AudioOperation::Saving,
    })?;

    let metadata = std::fs::metadata(path).map_err(|e| TtsError::Io {
        message: e.to_string(),
        path: Some(path.to_path_buf()),
    })?;
    Ok(metadata.len())
}

/// Decode a WAV file to interleaved f32 samples
pub fn read_wav(path: &Path) -> Result<DecodedAudio> {
    let mut reader = hound::WavReader::open(path).map_err(|e| TtsError::Audio {
        message: format!("Failed to open WAV file {}: {e}", path.display()),
        operation: AudioOperation::Decoding,
    })?;
    let spec = reader.spec();

    let decode_err = |e: hound::Error| TtsError::Audio {
        message: format!("Failed to decode WAV samples: {e}"),
        operation: AudioOperation::Decoding,
    };

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(decode_err)?,
        hound::SampleFormat::Int => {
            let scale = ((1u32 << (spec.bits_per_sample - 1)) as f32).max(1.0);
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(decode_err)?
        }
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
    })
}

/// Playback endpoint. Implementations block until the audio has drained.
pub trait AudioSink: Send + Sync {
    fn play(&self, samples: &[f32], sample_rate: u32, channels: u16) -> Result<()>;
}

/// Sink for headless deployments: accepts and discards audio
#[derive(Debug, Default)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn play(&self, _samples: &[f32], _sample_rate: u32, _channels: u16) -> Result<()> {
        Ok(())
    }
}

#[cfg(feature = "playback")]
pub use device::CpalSink;

#[cfg(feature = "playback")]
mod device {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::SampleFormat;
    use tracing::warn;

    use super::AudioSink;
    use crate::core::error::{AudioOperation, Result, TtsError};

    fn playback_err(message: String) -> TtsError {
        TtsError::Audio {
            message,
            operation: AudioOperation::Playback,
        }
    }

    /// Sink backed by the default cpal output device
    #[derive(Debug, Default)]
    pub struct CpalSink;

    impl AudioSink for CpalSink {
        fn play(&self, samples: &[f32], sample_rate: u32, channels: u16) -> Result<()> {
            if samples.is_empty() {
                return Ok(());
            }

            let host = cpal::default_host();
            let device = host.default_output_device().ok_or_else(|| {
                playback_err("No audio output device available".to_string())
            })?;

            let supported = device.supported_output_configs().map_err(|e| {
                playback_err(format!("Error querying audio configs: {e}"))
            })?;
            let config = supported
                .filter(|c| c.channels() == 1 || c.channels() == 2)
                .filter(|c| c.sample_format() == SampleFormat::F32)
                .find(|c| {
                    c.min_sample_rate().0 <= sample_rate
                        && c.max_sample_rate().0 >= sample_rate
                })
                .map(|c| c.with_sample_rate(cpal::SampleRate(sample_rate)))
                .or_else(|| device.default_output_config().ok())
                .ok_or_else(|| {
                    playback_err("No suitable audio config found".to_string())
                })?;

            let out_channels = config.channels() as usize;
            let src_channels = channels.max(1) as usize;
            // Mixed down to mono frames, then fanned out to every
            // device channel.
            let frames: Arc<Vec<f32>> = Arc::new(
                samples
                    .chunks(src_channels)
                    .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                    .collect(),
            );
            let frame_count = frames.len();
            let position = Arc::new(AtomicUsize::new(0));

            let frames_cb = Arc::clone(&frames);
            let position_cb = Arc::clone(&position);
            let stream = device
                .build_output_stream(
                    &config.into(),
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        for frame in data.chunks_mut(out_channels) {
                            let pos = position_cb.fetch_add(1, Ordering::Relaxed);
                            let sample = frames_cb.get(pos).copied().unwrap_or(0.0);
                            for s in frame.iter_mut() {
                                *s = sample;
                            }
                        }
                    },
                    move |err| {
                        warn!("Audio playback error: {}", err);
                    },
                    None,
                )
                .map_err(|e| playback_err(format!("Failed to build output stream: {e}")))?;

            stream
                .play()
                .map_err(|e| playback_err(format!("Failed to play audio stream: {e}")))?;

            let duration = frame_count as f64 / f64::from(sample_rate);
            let deadline = Instant::now() + Duration::from_secs_f64(duration + 0.1);
            while Instant::now() < deadline {
                if position.load(Ordering::Relaxed) >= frame_count {
                    break;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            // Let the hardware buffer drain.
            std::thread::sleep(Duration::from_millis(50));

            Ok(())
        }
    }
}
