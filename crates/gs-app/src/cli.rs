//! Command-line front end: run the simulated backend, or submit and follow
//! jobs against any backend that speaks the contract.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use gs_core::progress::{ProgressStage, estimate_remaining_secs};
use gs_core::{Job, JobId, JobKind, JobState};
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::backend::{GenerationBackend, GenerationRequest, HttpBackend};
use crate::board::JobBoard;
use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::events::{ChannelObserver, JobEvent};
use crate::server::{self, SimulationConfig};
use crate::tracker::{JobHandle, JobTracker};

#[derive(Debug, Parser)]
#[command(name = "gs-app", version, about = "Submit generation jobs and track them to completion")]
pub struct Cli {
    /// Base URL of the generation backend.
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    #[arg(long, global = true)]
    pub poll_interval_ms: Option<u64>,

    #[arg(long, global = true)]
    pub request_timeout_ms: Option<u64>,

    /// Consecutive failed polls before a job is marked failed.
    #[arg(long, global = true)]
    pub failure_threshold: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the in-memory simulated backend.
    Serve {
        #[arg(long)]
        port: Option<u16>,

        /// Progress added per status request.
        #[arg(long, default_value_t = SimulationConfig::default().progress_step)]
        step: u8,
    },
    /// Submit a job and follow it until it finishes.
    Submit {
        #[arg(long, default_value = "video")]
        kind: JobKind,

        #[arg(long)]
        prompt: Option<String>,

        /// Raw JSON object posted as the request body.
        #[arg(long)]
        body: Option<String>,

        /// Ask the simulated backend to fail the job with this message.
        #[arg(long)]
        simulate_failure: Option<String>,

        /// Print the job id and exit without following it.
        #[arg(long)]
        detach: bool,
    },
    /// Follow a job that was already submitted.
    Watch {
        id: String,

        #[arg(long, default_value = "video")]
        kind: JobKind,
    },
    /// List jobs known to the backend.
    Jobs,
    /// Delete a job on the backend.
    Delete { id: String },
}

impl Cli {
    /// Fold command-line overrides into the environment configuration.
    pub fn apply_overrides(&self, config: &mut AppConfig) -> Result<(), ConfigError> {
        if let Some(url) = &self.backend_url {
            config.backend_url = url.trim_end_matches('/').to_string();
        }
        if let Some(ms) = self.poll_interval_ms {
            config.tracker.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.request_timeout_ms {
            config.tracker.request_timeout = Duration::from_millis(ms);
        }
        if let Some(threshold) = self.failure_threshold {
            config.tracker.failure_threshold = threshold;
        }
        if let Command::Serve { port: Some(port), .. } = &self.command {
            config.port = *port;
        }
        config.tracker.validate()
    }

    pub async fn run(self, config: AppConfig) -> anyhow::Result<()> {
        match self.command {
            Command::Serve { step, .. } => serve(&config, step).await,
            Command::Submit {
                kind,
                prompt,
                body,
                simulate_failure,
                detach,
            } => {
                let body = build_body(kind, prompt, body.as_deref(), simulate_failure)?;
                submit(&config, GenerationRequest::new(kind, body), detach).await
            }
            Command::Watch { id, kind } => watch(&config, JobId::new(id), kind).await,
            Command::Jobs => list(&config).await,
            Command::Delete { id } => delete(&config, JobId::new(id)).await,
        }
    }
}

fn http_backend(config: &AppConfig) -> anyhow::Result<Arc<HttpBackend>> {
    let backend = HttpBackend::new(&config.backend_url, config.tracker.request_timeout)
        .context("failed to build HTTP client")?;
    Ok(Arc::new(backend))
}

/// Merge `--body`, `--prompt` and `--simulate-failure` into one JSON object.
fn build_body(
    kind: JobKind,
    prompt: Option<String>,
    raw: Option<&str>,
    simulate_failure: Option<String>,
) -> anyhow::Result<Value> {
    let mut body = match raw {
        Some(raw) => match serde_json::from_str(raw).context("--body is not valid JSON")? {
            Value::Object(map) => map,
            _ => bail!("--body must be a JSON object"),
        },
        None => Map::new(),
    };

    body.entry("kind")
        .or_insert_with(|| Value::String(kind.id().to_string()));
    if let Some(prompt) = prompt {
        body.insert("prompt".into(), Value::String(prompt));
    }
    if let Some(message) = simulate_failure {
        body.insert("simulate_failure".into(), Value::String(message));
    }
    Ok(Value::Object(body))
}

async fn serve(config: &AppConfig, step: u8) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("Shutting down");
    };

    server::serve(listener, SimulationConfig { progress_step: step }, shutdown).await?;
    Ok(())
}

async fn submit(config: &AppConfig, request: GenerationRequest, detach: bool) -> anyhow::Result<()> {
    let backend = http_backend(config)?;

    if detach {
        let id = backend.submit(&request).await?;
        println!("{id}");
        return Ok(());
    }

    let tracker = JobTracker::new(backend, config.tracker)?;
    let (observer, rx) = ChannelObserver::new();
    let handle = tracker.submit(request, observer).await?;
    println!("Submitted {}", handle.id());

    finish(follow(handle, rx).await?)
}

async fn watch(config: &AppConfig, id: JobId, kind: JobKind) -> anyhow::Result<()> {
    let tracker = JobTracker::new(http_backend(config)?, config.tracker)?;
    let (observer, rx) = ChannelObserver::new();
    let handle = tracker.track(id, kind, observer)?;

    finish(follow(handle, rx).await?)
}

/// Print every event until the job finishes. Ctrl-C cancels tracking.
async fn follow(mut handle: JobHandle, mut rx: UnboundedReceiver<JobEvent>) -> anyhow::Result<Job> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => {
                    println!("{}", render(event.job()));
                    if event.is_terminal() {
                        break;
                    }
                }
                None => break,
            },
            signal = &mut ctrl_c, if !interrupted => {
                signal.context("failed to listen for Ctrl-C")?;
                interrupted = true;
                handle.cancel();
            }
        }
    }

    Ok(handle.wait().await)
}

fn finish(job: Job) -> anyhow::Result<()> {
    match (job.state(), job.error()) {
        (JobState::Failed, Some(error)) => bail!("job {} failed: {error}", job.id()),
        _ => Ok(()),
    }
}

async fn list(config: &AppConfig) -> anyhow::Result<()> {
    let backend = http_backend(config)?;
    let mut board = JobBoard::new();
    board.load_from(backend.as_ref()).await?;

    if board.is_empty() {
        println!("No jobs");
        return Ok(());
    }
    for job in board.jobs() {
        println!("{}", render(job));
    }
    println!("{}", board.stats());
    Ok(())
}

async fn delete(config: &AppConfig, id: JobId) -> anyhow::Result<()> {
    let backend = http_backend(config)?;
    backend.delete(&id).await?;
    println!("Deleted {id}");
    Ok(())
}

/// One status line for a job.
pub fn render(job: &Job) -> String {
    let head = format!("{} {} {}", job.state().icon(), job.kind().icon(), job.id());

    match job.state() {
        JobState::Submitted | JobState::Polling => {
            let progress = job.progress();
            let text = job
                .message()
                .unwrap_or_else(|| ProgressStage::from_progress(progress).description());
            format!(
                "{head} {progress:>3}% {text} (~{}s left)",
                estimate_remaining_secs(job.kind(), progress)
            )
        }
        JobState::Completed => match job.result() {
            Some(Value::String(url)) => format!("{head} completed: {url}"),
            Some(result) => format!("{head} completed: {result}"),
            None => format!("{head} completed"),
        },
        JobState::Failed => match job.error() {
            Some(error) => format!("{head} failed: {error}"),
            None => format!("{head} failed"),
        },
        JobState::Cancelled => format!("{head} cancelled"),
    }
}
