//! Worker configuration
//!
//! Immutable startup parameters, loaded once from a TOML file (or built from
//! defaults plus CLI overrides) and read-only thereafter.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, TtsError};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Valid quality preset names
pub const VALID_QUALITIES: [&str; 3] = ["fast", "balanced", "high"];

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Path to the model artifact
    #[serde(default)]
    pub model_path: PathBuf,

    /// Device hint ("auto", "cuda", "cpu")
    #[serde(default = "default_device")]
    pub device: String,

    /// Worker pool bound for the supervising side
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Generation batch size hint
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Per-job timeout for the supervising side, in seconds.
    /// Not enforced around the backend call at this layer.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Device memory ceiling in GB
    #[serde(default = "default_gpu_memory_limit_gb")]
    pub gpu_memory_limit_gb: f64,

    /// Minimum available memory required before admitting a job, in GB
    #[serde(default = "default_min_free_memory_gb")]
    pub min_free_memory_gb: f64,

    /// Default quality preset name
    #[serde(default = "default_quality")]
    pub quality: String,

    /// Default generation temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Default voice profile identifier
    #[serde(default = "default_speaker")]
    pub speaker: String,

    /// Enable mirostat sampling
    #[serde(default = "default_true")]
    pub use_mirostat: bool,
}

fn default_device() -> String {
    "auto".to_string()
}

fn default_workers() -> usize {
    8
}

fn default_batch_size() -> usize {
    16
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_gpu_memory_limit_gb() -> f64 {
    5.5
}

fn default_min_free_memory_gb() -> f64 {
    1.0
}

fn default_quality() -> String {
    "high".to_string()
}

fn default_temperature() -> f32 {
    0.4
}

fn default_speaker() -> String {
    "en-female-1-neutral".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::new(),
            device: default_device(),
            workers: default_workers(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            gpu_memory_limit_gb: default_gpu_memory_limit_gb(),
            min_free_memory_gb: default_min_free_memory_gb(),
            quality: default_quality(),
            temperature: default_temperature(),
            speaker: default_speaker(),
            use_mirostat: default_true(),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| TtsError::Io {
                message: format!("Failed to read config file: {}", e),
                path: Some(path.as_ref().to_path_buf()),
            })?;

        let config: Self = toml::from_str(&content).map_err(|e| TtsError::Config {
            message: format!("Failed to parse config file: {}", e),
            path: Some(path.as_ref().to_path_buf()),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants
    pub fn validate(&self) -> Result<()> {
        if self.model_path.as_os_str().is_empty() {
            return Err(config_error("model_path cannot be empty"));
        }
        if self.workers == 0 {
            return Err(config_error("workers must be positive"));
        }
        if self.timeout_secs == 0 {
            return Err(config_error("timeout_secs must be positive"));
        }
        if self.gpu_memory_limit_gb <= 0.0 {
            return Err(config_error("gpu_memory_limit_gb must be positive"));
        }
        if self.min_free_memory_gb <= 0.0 {
            return Err(config_error("min_free_memory_gb must be positive"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(config_error("temperature must be between 0 and 2"));
        }
        if !VALID_QUALITIES.contains(&self.quality.as_str()) {
            return Err(config_error(format!(
                "quality must be one of: {}",
                VALID_QUALITIES.join(", ")
            )));
        }
        Ok(())
    }

    /// Memory floor for the guard, in bytes
    pub fn min_free_memory_bytes(&self) -> u64 {
        (self.min_free_memory_gb * BYTES_PER_GB) as u64
    }
}

fn config_error(message: impl Into<String>) -> TtsError {
    TtsError::Config {
        message: message.into(),
        path: None,
    }
}
