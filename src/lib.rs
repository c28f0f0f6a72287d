//! Persistent speech-synthesis worker.
//!
//! A long-lived process that loads one text-to-speech model, then serves
//! synthesis jobs over a line-delimited JSON protocol on stdin/stdout and,
//! optionally, over HTTP. Jobs are strictly serialized: one model handle,
//! one job in flight, memory checked before and cleaned after every job.
//!
//! Module map:
//! - [`core`]: error types shared by every layer
//! - [`config`]: TOML worker configuration
//! - [`backend`]: the opaque model seam and a deterministic built-in backend
//! - [`engine`]: quality presets, memory guard, model lifecycle, job pipeline
//! - [`audio`]: WAV codec, effect chain, playback sinks
//! - [`worker`]: the JSON command protocol and its dispatch loop
//! - [`server`]: the axum HTTP boundary

pub mod audio;
pub mod backend;
pub mod config;
pub mod core;
pub mod engine;
pub mod server;
pub mod worker;

pub use self::config::WorkerConfig;
pub use self::core::error::{Result, TtsError};
pub use self::engine::{
    MemoryGuard, ModelLifecycle, Quality, SynthesisEngine, SynthesisJob,
    SynthesisResult, SystemMemoryProbe,
};
pub use self::worker::{Dispatcher, ShutdownCoordinator};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sample rate produced by the built-in backend
pub const DEFAULT_SAMPLE_RATE: u32 = 22_050;
