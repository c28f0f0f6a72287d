//! Audio I/O: WAV codec, effect chain, playback sinks, file adapter

pub mod adapter;
pub mod effects;
pub mod output;

pub use adapter::{AudioAdapter, AudioInfo, PlaybackReport};
pub use effects::EffectSettings;
pub use output::{read_wav, save_wav, AudioSink, DecodedAudio, NullSink};

#[cfg(feature = "playback")]
pub use output::CpalSink;
