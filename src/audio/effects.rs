//! Offline audio effect chain
//!
//! Applied in a fixed order: resample, channel remix, bit-depth selection,
//! volume, fades, normalization, filters. Each stage is a no-op when its
//! setting is absent.

use serde::Deserialize;

use super::output::DecodedAudio;

/// Effect settings for one playback or conversion request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EffectSettings {
    /// Target sample rate in Hz
    pub sample_rate: Option<u32>,
    /// Target channel count (1 or 2)
    pub channels: Option<u16>,
    /// Widen the reported depth to 32 bits; samples stay f32 internally.
    /// Values other than 32 are ignored.
    pub bit_depth: Option<u16>,
    /// Volume multiplier, 1.0 = unity
    pub volume: Option<f32>,
    /// Fade-in duration in seconds
    pub fade_in: Option<f32>,
    /// Fade-out duration in seconds
    pub fade_out: Option<f32>,
    /// Peak-normalize to full scale
    pub normalize: bool,
    /// High-pass cutoff in Hz
    pub high_pass: Option<f32>,
    /// Low-pass cutoff in Hz
    pub low_pass: Option<f32>,
}

impl EffectSettings {
    pub fn is_noop(&self) -> bool {
        self.sample_rate.is_none()
            && self.channels.is_none()
            && self.bit_depth.is_none()
            && self.volume.is_none()
            && self.fade_in.is_none()
            && self.fade_out.is_none()
            && !self.normalize
            && self.high_pass.is_none()
            && self.low_pass.is_none()
    }
}

/// Run the effect chain over decoded audio
pub fn apply(mut audio: DecodedAudio, settings: &EffectSettings) -> DecodedAudio {
    if let Some(rate) = settings.sample_rate {
        if rate > 0 && rate != audio.sample_rate {
            audio = resample(audio, rate);
        }
    }

    if let Some(channels) = settings.channels {
        if channels > 0 && channels != audio.channels {
            audio = remix(audio, channels);
        }
    }

    // Only the 32-bit widen is honored; other requested depths leave the
    // reported width unchanged.
    if settings.bit_depth == Some(32) {
        audio.bits_per_sample = 32;
    }

    if let Some(volume) = settings.volume {
        // Volume maps through decibels: 1.0 stays unity, 1.5 is +10 dB.
        let gain_db = 20.0 * (volume - 1.0);
        let factor = 10f32.powf(gain_db / 20.0);
        for s in &mut audio.samples {
            *s *= factor;
        }
    }

    if let Some(secs) = settings.fade_in {
        fade_in(&mut audio, secs);
    }
    if let Some(secs) = settings.fade_out {
        fade_out(&mut audio, secs);
    }

    if settings.normalize {
        normalize(&mut audio.samples);
    }

    if let Some(cutoff) = settings.high_pass {
        one_pole(&mut audio, cutoff, FilterKind::HighPass);
    }
    if let Some(cutoff) = settings.low_pass {
        one_pole(&mut audio, cutoff, FilterKind::LowPass);
    }

    audio
}

/// Linear-interpolation resampler, per channel
fn resample(audio: DecodedAudio, target_rate: u32) -> DecodedAudio {
    let channels = audio.channels.max(1) as usize;
    let src_frames = audio.samples.len() / channels;
    if src_frames == 0 {
        return DecodedAudio {
            sample_rate: target_rate,
            ..audio
        };
    }

    let ratio = f64::from(target_rate) / f64::from(audio.sample_rate);
    let dst_frames = ((src_frames as f64) * ratio).round().max(1.0) as usize;

    let mut samples = Vec::with_capacity(dst_frames * channels);
    for i in 0..dst_frames {
        let src_pos = i as f64 / ratio;
        let base = src_pos.floor() as usize;
        let frac = (src_pos - base as f64) as f32;
        let next = (base + 1).min(src_frames - 1);
        for ch in 0..channels {
            let a = audio.samples[base * channels + ch];
            let b = audio.samples[next * channels + ch];
            samples.push(a + (b - a) * frac);
        }
    }

    DecodedAudio {
        samples,
        sample_rate: target_rate,
        channels: audio.channels,
        bits_per_sample: audio.bits_per_sample,
    }
}

/// Mono<->stereo remix. Other channel counts pass through untouched.
fn remix(audio: DecodedAudio, target_channels: u16) -> DecodedAudio {
    let samples = match (audio.channels, target_channels) {
        (1, 2) => audio.samples.iter().flat_map(|&s| [s, s]).collect(),
        (2, 1) => audio
            .samples
            .chunks(2)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect(),
        _ => return audio,
    };
    DecodedAudio {
        samples,
        sample_rate: audio.sample_rate,
        channels: target_channels,
        bits_per_sample: audio.bits_per_sample,
    }
}

fn fade_in(audio: &mut DecodedAudio, secs: f32) {
    let channels = audio.channels.max(1) as usize;
    let frames = ((secs * audio.sample_rate as f32) as usize)
        .min(audio.samples.len() / channels);
    if frames == 0 {
        return;
    }
    for i in 0..frames {
        let gain = i as f32 / frames as f32;
        for ch in 0..channels {
            audio.samples[i * channels + ch] *= gain;
        }
    }
}

fn fade_out(audio: &mut DecodedAudio, secs: f32) {
    let channels = audio.channels.max(1) as usize;
    let total = audio.samples.len() / channels;
    let frames = ((secs * audio.sample_rate as f32) as usize).min(total);
    if frames == 0 {
        return;
    }
    for i in 0..frames {
        let gain = i as f32 / frames as f32;
        let frame = total - 1 - i;
        for ch in 0..channels {
            audio.samples[frame * channels + ch] *= gain;
        }
    }
}

/// Scale so the peak hits full scale. Silence is left alone.
fn normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak <= f32::EPSILON {
        return;
    }
    let factor = 1.0 / peak;
    for s in samples {
        *s *= factor;
    }
}

enum FilterKind {
    HighPass,
    LowPass,
}

/// First-order RC filter, applied independently per channel
fn one_pole(audio: &mut DecodedAudio, cutoff: f32, kind: FilterKind) {
    if cutoff <= 0.0 {
        return;
    }
    let channels = audio.channels.max(1) as usize;
    let dt = 1.0 / audio.sample_rate as f32;
    let rc = 1.0 / (2.0 * std::f32::consts::PI * cutoff);

    match kind {
        FilterKind::LowPass => {
            let alpha = dt / (rc + dt);
            for ch in 0..channels {
                let mut prev = 0.0f32;
                let mut i = ch;
                while i < audio.samples.len() {
                    prev += alpha * (audio.samples[i] - prev);
                    audio.samples[i] = prev;
                    i += channels;
                }
            }
        }
        FilterKind::HighPass => {
            let alpha = rc / (rc + dt);
            for ch in 0..channels {
                let mut prev_in = 0.0f32;
                let mut prev_out = 0.0f32;
                let mut i = ch;
                while i < audio.samples.len() {
                    let x = audio.samples[i];
                    prev_out = alpha * (prev_out + x - prev_in);
                    prev_in = x;
                    audio.samples[i] = prev_out;
                    i += channels;
                }
            }
        }
    }
}
