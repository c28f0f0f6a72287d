//! Wire protocol types
//!
//! One JSON object per line in each direction. Commands are an internally
//! tagged sum over the five known kinds plus a distinguished `Unknown`
//! variant, so an unrecognized tag is data, not a parse failure.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audio::{AudioInfo, EffectSettings, PlaybackReport};
use crate::core::error::{Result, TtsError};
use crate::engine::{MemoryStatus, SynthesisJob, SynthesisResult};

/// One request line
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Single {
        job: SynthesisJob,
    },
    MemoryUsage,
    PlayAudio {
        file_path: PathBuf,
        #[serde(default)]
        quality_settings: EffectSettings,
    },
    AudioInfo {
        file_path: PathBuf,
    },
    Cleanup,
    /// Any tag outside the known set
    #[serde(other)]
    Unknown,
}

impl Command {
    /// Parse one request line
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| TtsError::Protocol {
            message: format!("Invalid JSON: {e}"),
        })
    }
}

/// One response line, shaped by the command it answers
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Response {
    Synthesis(SynthesisResult),
    Memory(MemoryStatus),
    Playback(PlaybackReport),
    AudioInfo(AudioInfo),
    Status { status: &'static str },
    Error { error: String },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Serialize to a single line without the trailing newline
    pub fn to_line(&self) -> String {
        match serde_json::to_string(self) {
            Ok(line) => line,
            Err(e) => json!({ "error": format!("response serialization failed: {e}") })
                .to_string(),
        }
    }
}

/// Recover the offending tag from a line that parsed as [`Command::Unknown`]
pub fn unknown_tag(line: &str) -> String {
    serde_json::from_str::<serde_json::Value>(line)
        .ok()
        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_string))
        .unwrap_or_else(|| "<missing>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single() {
        let cmd = Command::parse(
            r#"{"type": "single", "job": {"id": "1", "text": "Hello", "output_path": "/tmp/out.wav", "quality": "fast"}}"#,
        )
        .unwrap();
        match cmd {
            Command::Single { job } => {
                assert_eq!(job.id, "1");
                assert_eq!(job.quality.as_deref(), Some("fast"));
                assert!(job.speaker.is_none());
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_parse_payload_free_commands() {
        assert!(matches!(
            Command::parse(r#"{"type": "memory_usage"}"#).unwrap(),
            Command::MemoryUsage
        ));
        assert!(matches!(
            Command::parse(r#"{"type": "cleanup"}"#).unwrap(),
            Command::Cleanup
        ));
    }

    #[test]
    fn test_parse_play_audio_defaults_settings() {
        let cmd = Command::parse(
            r#"{"type": "play_audio", "file_path": "/tmp/a.wav"}"#,
        )
        .unwrap();
        match cmd {
            Command::PlayAudio {
                file_path,
                quality_settings,
            } => {
                assert_eq!(file_path, PathBuf::from("/tmp/a.wav"));
                assert!(quality_settings.is_noop());
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_tag_is_data() {
        let line = r#"{"type": "batch", "jobs": []}"#;
        assert!(matches!(
            Command::parse(line).unwrap(),
            Command::Unknown
        ));
        assert_eq!(unknown_tag(line), "batch");
        assert_eq!(unknown_tag("not json"), "<missing>");
    }

    #[test]
    fn test_truncated_json_is_protocol_error() {
        let err = Command::parse(r#"{"type": "single", "job"#).unwrap_err();
        assert!(matches!(err, TtsError::Protocol { .. }));
        assert!(err.to_string().contains("Invalid JSON"));
    }

    #[test]
    fn test_status_response_shape() {
        let line = Response::Status { status: "cleaned" }.to_line();
        assert_eq!(line, r#"{"status":"cleaned"}"#);
    }

    #[test]
    fn test_error_response_shape() {
        let line = Response::error("boom").to_line();
        assert_eq!(line, r#"{"error":"boom"}"#);
    }
}
