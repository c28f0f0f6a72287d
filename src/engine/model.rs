//! Model lifecycle
//!
//! Owns the opaque model handle and the default voice profile. The state
//! machine is `Uninitialized -> Loading -> {Ready, Failed}`; both terminal
//! states hold for the lifetime of one load attempt, so retrying a failed
//! load requires a fresh process.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::backend::{LoadedModel, SpeechBackend, VoiceProfile};
use crate::core::error::{Result, TtsError};

enum LifecycleState {
    Uninitialized,
    Loading,
    Ready {
        model: Box<dyn LoadedModel>,
        default_voice: VoiceProfile,
    },
    Failed {
        reason: String,
    },
}

impl LifecycleState {
    fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready { .. } => "ready",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Read-only lifecycle snapshot. Callable at any state, never errors.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_path: String,
    pub backend: String,
    pub loaded: bool,
    pub state: String,
    pub default_voice: Option<String>,
}

/// Owner of the single per-process model handle
pub struct ModelLifecycle {
    backend: Arc<dyn SpeechBackend>,
    model_path: PathBuf,
    state: LifecycleState,
}

impl ModelLifecycle {
    pub fn new(backend: Arc<dyn SpeechBackend>, model_path: PathBuf) -> Self {
        Self {
            backend,
            model_path,
            state: LifecycleState::Uninitialized,
        }
    }

    /// Load the model artifact and resolve the default voice.
    ///
    /// A missing artifact or a voice-resolution failure lands in `Failed`
    /// with a reason; it does not panic. Only callable once per process.
    pub async fn load(&mut self) -> Result<()> {
        if !matches!(self.state, LifecycleState::Uninitialized) {
            return Err(TtsError::ModelLoad {
                message: format!(
                    "load already attempted (state: {})",
                    self.state.name()
                ),
                path: Some(self.model_path.clone()),
            });
        }
        self.state = LifecycleState::Loading;
        info!(path = %self.model_path.display(), "Loading model");

        if !self.model_path.exists() {
            return Err(self.fail(format!(
                "Model file not found: {}",
                self.model_path.display()
            )));
        }

        let model = match self.backend.load(&self.model_path).await {
            Ok(model) => model,
            Err(e) => return Err(self.fail(e.to_string())),
        };

        let default_voice = match model.default_voice() {
            Ok(voice) => voice,
            Err(e) => {
                return Err(self.fail(format!("Failed to resolve default voice: {e}")))
            }
        };

        info!(voice = %default_voice.id, "Model loaded, default voice resolved");
        self.state = LifecycleState::Ready {
            model,
            default_voice,
        };
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, LifecycleState::Ready { .. })
    }

    /// Lifecycle snapshot
    pub fn describe(&self) -> ModelInfo {
        let default_voice = match &self.state {
            LifecycleState::Ready { default_voice, .. } => {
                Some(default_voice.id.clone())
            }
            _ => None,
        };
        ModelInfo {
            model_path: self.model_path.display().to_string(),
            backend: self.backend.name().to_string(),
            loaded: self.is_ready(),
            state: self.state.name().to_string(),
            default_voice,
        }
    }

    /// The loaded model and its default voice, or an error when not Ready
    pub(crate) fn active(&self) -> Result<(&dyn LoadedModel, &VoiceProfile)> {
        match &self.state {
            LifecycleState::Ready {
                model,
                default_voice,
            } => Ok((model.as_ref(), default_voice)),
            other => Err(TtsError::Backend {
                message: format!("model not loaded (state: {})", other.name()),
            }),
        }
    }

    fn fail(&mut self, reason: String) -> TtsError {
        error!("Model load failed: {}", reason);
        self.state = LifecycleState::Failed {
            reason: reason.clone(),
        };
        TtsError::ModelLoad {
            message: reason,
            path: Some(self.model_path.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SyntheticBackend;

    #[tokio::test]
    async fn test_missing_artifact_is_failed_not_crash() {
        let mut lifecycle = ModelLifecycle::new(
            Arc::new(SyntheticBackend::new()),
            PathBuf::from("/nonexistent/model.gguf"),
        );
        assert!(lifecycle.load().await.is_err());
        assert!(!lifecycle.is_ready());

        let info = lifecycle.describe();
        assert_eq!(info.state, "failed");
        assert!(!info.loaded);
        assert!(info.default_voice.is_none());
    }

    #[tokio::test]
    async fn test_failed_is_terminal() {
        let mut lifecycle = ModelLifecycle::new(
            Arc::new(SyntheticBackend::new()),
            PathBuf::from("/nonexistent/model.gguf"),
        );
        let _ = lifecycle.load().await;
        // No automatic retry: a second attempt is refused outright.
        let err = lifecycle.load().await.unwrap_err();
        assert!(err.to_string().contains("already attempted"));
    }

    #[tokio::test]
    async fn test_successful_load_resolves_default_voice() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("model.gguf");
        std::fs::write(&artifact, b"weights").unwrap();

        let mut lifecycle =
            ModelLifecycle::new(Arc::new(SyntheticBackend::new()), artifact);
        lifecycle.load().await.unwrap();
        assert!(lifecycle.is_ready());

        let info = lifecycle.describe();
        assert_eq!(info.state, "ready");
        assert_eq!(info.backend, "synthetic");
        assert_eq!(info.default_voice.as_deref(), Some("en-female-1-neutral"));

        let (_, voice) = lifecycle.active().unwrap();
        assert_eq!(voice.id, "en-female-1-neutral");
    }

    #[test]
    fn test_describe_before_load_never_errors() {
        let lifecycle = ModelLifecycle::new(
            Arc::new(SyntheticBackend::new()),
            PathBuf::from("model.gguf"),
        );
        let info = lifecycle.describe();
        assert_eq!(info.state, "uninitialized");
        assert!(!info.loaded);
    }
}
