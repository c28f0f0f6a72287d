//! Synthesis engine
//!
//! Composes the quality preset table, the memory guard, and the model
//! lifecycle into a single `synthesize` operation. The whole job pipeline
//! runs under one mutex held from validation through cleanup, so at most
//! one backend generate call is ever in flight: the backend is not assumed
//! safe for concurrent generation.

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::audio;
use crate::backend::{GenerationRequest, VoiceProfile};
use crate::core::error::{Result, TtsError};

use super::memory::MemoryGuard;
use super::model::{ModelInfo, ModelLifecycle};
use super::presets::Quality;

/// One unit of synthesis work, as received on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisJob {
    /// Caller-supplied id, unique per in-flight job
    pub id: String,
    pub text: String,
    pub output_path: PathBuf,
    /// Quality preset name; engine default when absent
    #[serde(default)]
    pub quality: Option<String>,
    /// Overrides the preset's temperature when present
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Voice profile id; the model's default voice when absent
    #[serde(default)]
    pub speaker: Option<String>,
}

/// Failure category, so callers can apply different retry policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Validation,
    Resource,
    Backend,
    Io,
}

impl FailureKind {
    fn classify(err: &TtsError) -> Self {
        match err {
            TtsError::Validation { .. } => Self::Validation,
            TtsError::Resource { .. } => Self::Resource,
            TtsError::Io { .. } | TtsError::Audio { .. } => Self::Io,
            _ => Self::Backend,
        }
    }
}

/// Outcome of one job; serialized immediately, not retained
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisResult {
    pub job_id: String,
    pub success: bool,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
    /// Elapsed wall time in seconds
    pub duration: f64,
    pub audio_path: String,
    /// Output size in bytes; 0 on failure
    pub audio_size: u64,
}

/// The persistent synthesis engine
pub struct SynthesisEngine {
    state: Mutex<ModelLifecycle>,
    guard: MemoryGuard,
    default_quality: Quality,
}

impl SynthesisEngine {
    pub fn new(
        lifecycle: ModelLifecycle,
        guard: MemoryGuard,
        default_quality: Quality,
    ) -> Self {
        Self {
            state: Mutex::new(lifecycle),
            guard,
            default_quality,
        }
    }

    pub fn memory_guard(&self) -> &MemoryGuard {
        &self.guard
    }

    pub async fn is_ready(&self) -> bool {
        self.state.lock().await.is_ready()
    }

    pub async fn describe(&self) -> ModelInfo {
        self.state.lock().await.describe()
    }

    /// Run one job to completion.
    ///
    /// Never panics and never returns an error: every failure mode is
    /// captured in the result. The engine mutex is held from validation
    /// through the unconditional memory cleanup, so a second caller does
    /// not start until this job has fully finished.
    pub async fn synthesize(&self, job: &SynthesisJob) -> SynthesisResult {
        let started = Instant::now();
        let state = self.state.lock().await;

        let outcome = self.run_job(&state, job).await;
        // Cleanup runs whether generation succeeded or not.
        self.guard.cleanup();
        drop(state);

        let duration = started.elapsed().as_secs_f64();
        match outcome {
            Ok(audio_size) => {
                info!(
                    job_id = %job.id,
                    duration_secs = duration,
                    audio_size,
                    "Synthesis completed"
                );
                SynthesisResult {
                    job_id: job.id.clone(),
                    success: true,
                    error: None,
                    error_kind: None,
                    duration,
                    audio_path: job.output_path.display().to_string(),
                    audio_size,
                }
            }
            Err(e) => {
                warn!(job_id = %job.id, "Synthesis failed: {}", e);
                SynthesisResult {
                    job_id: job.id.clone(),
                    success: false,
                    error: Some(e.to_string()),
                    error_kind: Some(FailureKind::classify(&e)),
                    duration,
                    audio_path: job.output_path.display().to_string(),
                    audio_size: 0,
                }
            }
        }
    }

    async fn run_job(&self, state: &ModelLifecycle, job: &SynthesisJob) -> Result<u64> {
        let text = job.text.trim();
        if text.is_empty() {
            return Err(TtsError::Validation {
                message: "text cannot be empty".to_string(),
                field: Some("text".to_string()),
            });
        }

        // Fail fast before touching the backend.
        self.guard.check_available()?;

        let quality = job
            .quality
            .as_deref()
            .map_or(self.default_quality, Quality::parse);
        let preset = quality.preset();

        let (model, default_voice) = state.active()?;
        let voice = job
            .speaker
            .clone()
            .map_or_else(|| default_voice.clone(), VoiceProfile::new);

        let mut params = preset.generation_params();
        if let Some(temperature) = job.temperature {
            params.temperature = temperature;
        }

        info!(
            job_id = %job.id,
            quality = quality.as_str(),
            voice = %voice.id,
            chars = text.chars().count(),
            "Synthesizing"
        );

        let request = GenerationRequest {
            text: text.to_string(),
            voice,
            params,
        };
        let generated = model.generate(&request).await?;

        audio::save_wav(&job.output_path, &generated.samples, generated.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        GeneratedAudio, GenerationParams, LoadedModel, SpeechBackend,
    };
    use crate::engine::memory::{MemoryProbe, MemoryStatus};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Default)]
    struct Recorder {
        generate_calls: AtomicUsize,
        last_params: StdMutex<Option<GenerationParams>>,
        last_voice: StdMutex<Option<String>>,
    }

    struct FakeBackend {
        recorder: Arc<Recorder>,
        fail_generation: bool,
    }

    struct FakeModel {
        recorder: Arc<Recorder>,
        fail_generation: bool,
    }

    #[async_trait]
    impl SpeechBackend for FakeBackend {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn load(&self, _model_path: &Path) -> crate::Result<Box<dyn LoadedModel>> {
            Ok(Box::new(FakeModel {
                recorder: self.recorder.clone(),
                fail_generation: self.fail_generation,
            }))
        }
    }

    #[async_trait]
    impl LoadedModel for FakeModel {
        fn default_voice(&self) -> crate::Result<VoiceProfile> {
            Ok(VoiceProfile::new("default-voice"))
        }

        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> crate::Result<GeneratedAudio> {
            self.recorder.generate_calls.fetch_add(1, Ordering::SeqCst);
            *self.recorder.last_params.lock().unwrap() = Some(request.params);
            *self.recorder.last_voice.lock().unwrap() = Some(request.voice.id.clone());
            if self.fail_generation {
                return Err(TtsError::Backend {
                    message: "generation exploded".to_string(),
                });
            }
            Ok(GeneratedAudio {
                samples: vec![0.1; 2205],
                sample_rate: 22050,
            })
        }
    }

    struct FixedProbe {
        available: u64,
        releases: AtomicUsize,
    }

    impl MemoryProbe for FixedProbe {
        fn status(&self) -> crate::Result<MemoryStatus> {
            Ok(MemoryStatus {
                allocated: 0,
                reserved: 0,
                total: 8 << 30,
                available: self.available,
            })
        }

        fn release(&self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        engine: SynthesisEngine,
        recorder: Arc<Recorder>,
        probe: Arc<FixedProbe>,
        _dir: tempfile::TempDir,
        out_path: PathBuf,
    }

    async fn harness(available: u64, fail_generation: bool) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("model.gguf");
        std::fs::write(&artifact, b"weights").unwrap();
        let out_path = dir.path().join("out.wav");

        let recorder = Arc::new(Recorder::default());
        let backend = Arc::new(FakeBackend {
            recorder: recorder.clone(),
            fail_generation,
        });
        let mut lifecycle = ModelLifecycle::new(backend, artifact);
        lifecycle.load().await.unwrap();

        let probe = Arc::new(FixedProbe {
            available,
            releases: AtomicUsize::new(0),
        });
        let guard = MemoryGuard::new(probe.clone(), 1 << 30);
        Harness {
            engine: SynthesisEngine::new(lifecycle, guard, Quality::High),
            recorder,
            probe,
            _dir: dir,
            out_path,
        }
    }

    fn job(h: &Harness, text: &str) -> SynthesisJob {
        SynthesisJob {
            id: "1".to_string(),
            text: text.to_string(),
            output_path: h.out_path.clone(),
            quality: None,
            temperature: None,
            speaker: None,
        }
    }

    #[tokio::test]
    async fn test_blank_text_fails_without_backend_call() {
        let h = harness(4 << 30, false).await;
        let result = h.engine.synthesize(&job(&h, "   \t ")).await;

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(FailureKind::Validation));
        assert_eq!(result.audio_size, 0);
        assert_eq!(h.recorder.generate_calls.load(Ordering::SeqCst), 0);
        assert!(!h.out_path.exists());
        // Cleanup still ran.
        assert_eq!(h.probe.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_successful_job_writes_audio() {
        let h = harness(4 << 30, false).await;
        let result = h.engine.synthesize(&job(&h, "Hello")).await;

        assert!(result.success, "error: {:?}", result.error);
        assert!(result.audio_size > 0);
        assert_eq!(result.job_id, "1");
        assert_eq!(result.audio_path, h.out_path.display().to_string());
        assert_eq!(
            std::fs::metadata(&h.out_path).unwrap().len(),
            result.audio_size
        );
    }

    #[tokio::test]
    async fn test_insufficient_memory_rejects_before_backend() {
        let h = harness(100, false).await;
        let result = h.engine.synthesize(&job(&h, "Hello")).await;

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(FailureKind::Resource));
        assert_eq!(h.recorder.generate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_is_captured_and_cleaned_up() {
        let h = harness(4 << 30, true).await;
        let result = h.engine.synthesize(&job(&h, "Hello")).await;

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(FailureKind::Backend));
        assert!(result.error.unwrap().contains("generation exploded"));
        assert_eq!(h.probe.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_job_temperature_overrides_preset() {
        let h = harness(4 << 30, false).await;

        let mut j = job(&h, "Hello");
        j.quality = Some("fast".to_string());
        h.engine.synthesize(&j).await;
        let params = h.recorder.last_params.lock().unwrap().unwrap();
        assert_eq!(params.temperature, 0.6);

        j.temperature = Some(0.95);
        h.engine.synthesize(&j).await;
        let params = h.recorder.last_params.lock().unwrap().unwrap();
        assert_eq!(params.temperature, 0.95);
        // The rest of the preset is untouched by the override.
        assert_eq!(params.max_batch_size, 16);
    }

    #[tokio::test]
    async fn test_speaker_defaults_to_model_voice() {
        let h = harness(4 << 30, false).await;

        h.engine.synthesize(&job(&h, "Hello")).await;
        assert_eq!(
            h.recorder.last_voice.lock().unwrap().as_deref(),
            Some("default-voice")
        );

        let mut j = job(&h, "Hello");
        j.speaker = Some("narrator-2".to_string());
        h.engine.synthesize(&j).await;
        assert_eq!(
            h.recorder.last_voice.lock().unwrap().as_deref(),
            Some("narrator-2")
        );
    }

    #[tokio::test]
    async fn test_unknown_quality_falls_back_to_high() {
        let h = harness(4 << 30, false).await;
        let mut j = job(&h, "Hello");
        j.quality = Some("turbo".to_string());
        let result = h.engine.synthesize(&j).await;

        assert!(result.success);
        let params = h.recorder.last_params.lock().unwrap().unwrap();
        assert_eq!(params.max_batch_size, 8);
        assert_eq!(params.temperature, 0.4);
    }

    #[tokio::test]
    async fn test_jobs_do_not_overlap() {
        let h = Arc::new(harness(4 << 30, false).await);

        let first = {
            let h = h.clone();
            let j = job(&h, "first job");
            tokio::spawn(async move { h.engine.synthesize(&j).await })
        };
        let second = {
            let h = h.clone();
            let mut j = job(&h, "second job");
            j.id = "2".to_string();
            tokio::spawn(async move { h.engine.synthesize(&j).await })
        };

        let (a, b) = (first.await.unwrap(), second.await.unwrap());
        assert!(a.success && b.success);
        // Serialized execution: one cleanup per job, both observed.
        assert_eq!(h.probe.releases.load(Ordering::SeqCst), 2);
        assert_eq!(h.recorder.generate_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_result_wire_shape() {
        let result = SynthesisResult {
            job_id: "42".to_string(),
            success: true,
            error: None,
            error_kind: None,
            duration: 1.25,
            audio_path: "/tmp/out.wav".to_string(),
            audio_size: 4410,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["job_id"], "42");
        assert_eq!(json["success"], true);
        assert_eq!(json["audio_size"], 4410);
        assert!(json.get("error_kind").is_none());
    }

    #[test]
    fn test_job_deserializes_with_optional_fields() {
        let job: SynthesisJob = serde_json::from_str(
            r#"{"id": "7", "text": "hi", "output_path": "/tmp/x.wav"}"#,
        )
        .unwrap();
        assert_eq!(job.id, "7");
        assert!(job.quality.is_none());
        assert!(job.temperature.is_none());
        assert!(job.speaker.is_none());
    }
}
