//! tts-worker CLI - persistent speech-synthesis worker
//!
//! Runs the worker protocol over stdin/stdout, serves the HTTP boundary,
//! or performs one-shot synthesis and audio probing from the command line.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tts_worker::audio::{AudioAdapter, EffectSettings};
use tts_worker::engine::{MemoryGuard, Quality, SynthesisEngine, SystemMemoryProbe};
use tts_worker::server::{self, AppState};
use tts_worker::{
    Dispatcher, ModelLifecycle, ShutdownCoordinator, SynthesisJob, WorkerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "tts-worker")]
#[command(author, version, about = "Persistent speech-synthesis worker")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the model artifact (overrides config)
    #[arg(short, long, global = true)]
    model: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the line-delimited JSON protocol on stdin/stdout
    Worker,

    /// Serve the HTTP boundary
    Serve {
        /// Listen address
        #[arg(long, default_value = "127.0.0.1:8020")]
        addr: SocketAddr,
    },

    /// Synthesize one utterance to a WAV file
    Say {
        /// Text to synthesize
        text: String,

        /// Output audio file path
        #[arg(short, long, default_value = "output.wav")]
        output: PathBuf,

        /// Quality preset (fast, balanced, high)
        #[arg(short, long)]
        quality: Option<String>,

        /// Generation temperature
        #[arg(short, long)]
        temperature: Option<f32>,

        /// Voice profile id
        #[arg(short, long)]
        speaker: Option<String>,

        /// Play the result after saving
        #[arg(long)]
        play: bool,
    },

    /// Probe a WAV file and print its metadata as JSON
    Info {
        /// Audio file to inspect
        file: PathBuf,
    },
}

fn load_config(cli: &Cli) -> Result<WorkerConfig> {
    let mut config = match &cli.config {
        Some(path) => WorkerConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => WorkerConfig::default(),
    };
    if let Some(model) = &cli.model {
        config.model_path = model.clone();
    }
    Ok(config)
}

async fn build_engine(config: &WorkerConfig) -> Result<SynthesisEngine> {
    let backend = Arc::new(tts_worker::backend::SyntheticBackend::new());
    let mut lifecycle = ModelLifecycle::new(backend, config.model_path.clone());
    lifecycle
        .load()
        .await
        .context("model failed to load; cannot start")?;

    let guard = MemoryGuard::new(
        Arc::new(SystemMemoryProbe::new()),
        config.min_free_memory_bytes(),
    );
    let quality = Quality::parse(&config.quality);
    Ok(SynthesisEngine::new(lifecycle, guard, quality))
}

async fn run_worker(config: WorkerConfig) -> Result<()> {
    let engine = Arc::new(build_engine(&config).await?);
    let cancel = CancellationToken::new();

    let coordinator =
        ShutdownCoordinator::new(cancel.clone(), engine.memory_guard().clone());
    coordinator.spawn();

    let dispatcher = Dispatcher::new(
        engine,
        AudioAdapter::with_default_sink(),
        cancel,
    );
    dispatcher
        .run(tokio::io::stdin(), tokio::io::stdout())
        .await?;
    Ok(())
}

async fn run_serve(config: WorkerConfig, addr: SocketAddr) -> Result<()> {
    let engine = Arc::new(build_engine(&config).await?);
    let cancel = CancellationToken::new();

    let coordinator =
        ShutdownCoordinator::new(cancel.clone(), engine.memory_guard().clone());
    coordinator.spawn();

    server::serve(addr, AppState { engine }, cancel)
        .await
        .context("HTTP service failed")?;
    Ok(())
}

async fn run_say(
    config: WorkerConfig,
    text: String,
    output: PathBuf,
    quality: Option<String>,
    temperature: Option<f32>,
    speaker: Option<String>,
    play: bool,
) -> Result<()> {
    let engine = build_engine(&config).await?;
    let job = SynthesisJob {
        id: uuid::Uuid::new_v4().to_string(),
        text,
        output_path: output.clone(),
        quality,
        temperature,
        speaker,
    };

    let result = engine.synthesize(&job).await;
    if !result.success {
        anyhow::bail!(
            "synthesis failed: {}",
            result.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
    info!(
        path = %output.display(),
        bytes = result.audio_size,
        secs = format!("{:.2}", result.duration),
        "Saved audio"
    );

    if play {
        let adapter = AudioAdapter::with_default_sink();
        tokio::task::spawn_blocking(move || {
            adapter.play(&output, &EffectSettings::default())
        })
        .await?
        .context("playback failed")?;
    }
    Ok(())
}

async fn run_info(file: PathBuf) -> Result<()> {
    let adapter = AudioAdapter::with_default_sink();
    let info =
        tokio::task::spawn_blocking(move || adapter.info(&file)).await??;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Worker => {
            let config = load_config(&cli)?;
            run_worker(config).await
        }
        Commands::Serve { addr } => {
            let addr = *addr;
            let config = load_config(&cli)?;
            run_serve(config, addr).await
        }
        Commands::Say {
            text,
            output,
            quality,
            temperature,
            speaker,
            play,
        } => {
            let config = load_config(&cli)?;
            run_say(
                config,
                text.clone(),
                output.clone(),
                quality.clone(),
                *temperature,
                speaker.clone(),
                *play,
            )
            .await
        }
        Commands::Info { file } => run_info(file.clone()).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("tts_worker=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("tts_worker=info,warn"))
    };
    // stdout carries protocol lines; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
