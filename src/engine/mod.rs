//! Synthesis engine: presets, memory guard, model lifecycle, job pipeline

pub mod memory;
pub mod model;
pub mod presets;
pub mod synthesis;

pub use memory::{MemoryGuard, MemoryProbe, MemoryStatus, SystemMemoryProbe};
pub use model::{ModelInfo, ModelLifecycle};
pub use presets::{Quality, QualityPreset};
pub use synthesis::{FailureKind, SynthesisEngine, SynthesisJob, SynthesisResult};
