//! Command dispatcher
//!
//! Reads one JSON command per line, routes it, and writes exactly one
//! response line per command, in receipt order. The read blocks inside a
//! `select!` against the cancellation token so shutdown is observed
//! without waiting for further input.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::audio::AudioAdapter;
use crate::core::error::Result;
use crate::engine::SynthesisEngine;

use super::command::{unknown_tag, Command, Response};

/// Handshake line emitted once the model is ready
pub const READY_LINE: &str = "READY";

/// Protocol loop over a bidirectional line stream
pub struct Dispatcher {
    engine: Arc<SynthesisEngine>,
    audio: AudioAdapter,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<SynthesisEngine>,
        audio: AudioAdapter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            engine,
            audio,
            cancel,
        }
    }

    /// Serve the stream until `cleanup`, EOF, or cancellation.
    ///
    /// Emits the `READY` handshake first, then one response line per
    /// command line, flushed immediately so the peer can treat each
    /// exchange as a synchronous call.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(READY_LINE.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        info!("Worker ready, serving commands");

        loop {
            // Cancellation wins over a ready line.
            let line = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Cancellation observed, leaving command loop");
                    break;
                }
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                debug!("Input stream closed");
                break;
            };

            // Even a blank line gets its error response; the peer counts
            // one reply per line written.
            let (response, terminate) = self.dispatch(&line).await;
            writer.write_all(response.to_line().as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;

            if terminate {
                info!("Cleanup command received, leaving command loop");
                break;
            }
        }
        Ok(())
    }

    /// Route one command line. The bool marks loop termination.
    async fn dispatch(&self, line: &str) -> (Response, bool) {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => return (Response::error(e.to_string()), false),
        };

        match command {
            Command::Single { job } => {
                debug!(job_id = %job.id, "Dispatching synthesis job");
                (Response::Synthesis(self.engine.synthesize(&job).await), false)
            }
            Command::MemoryUsage => match self.engine.memory_guard().status() {
                Ok(status) => (Response::Memory(status), false),
                Err(e) => (Response::error(e.to_string()), false),
            },
            Command::PlayAudio {
                file_path,
                quality_settings,
            } => {
                let adapter = self.audio.clone();
                let result = tokio::task::spawn_blocking(move || {
                    adapter.play(&file_path, &quality_settings)
                })
                .await;
                let response = match result {
                    Ok(Ok(report)) => Response::Playback(report),
                    Ok(Err(e)) => Response::error(e.to_string()),
                    Err(e) => Response::error(format!("Playback task failed: {e}")),
                };
                (response, false)
            }
            Command::AudioInfo { file_path } => {
                let adapter = self.audio.clone();
                let result =
                    tokio::task::spawn_blocking(move || adapter.info(&file_path)).await;
                let response = match result {
                    Ok(Ok(info)) => Response::AudioInfo(info),
                    Ok(Err(e)) => Response::error(e.to_string()),
                    Err(e) => Response::error(format!("Probe task failed: {e}")),
                };
                (response, false)
            }
            Command::Cleanup => {
                self.engine.memory_guard().cleanup();
                (Response::Status { status: "cleaned" }, true)
            }
            Command::Unknown => (
                Response::error(format!("Unknown command type: {}", unknown_tag(line))),
                false,
            ),
        }
    }
}
