use clap::Parser;
use gs_app::cli::Cli;
use gs_app::config::{AppConfig, duration_millis};
use gs_app::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load()?;
    cli.apply_overrides(&mut config)?;
    telemetry::init_tracing(config.json_logs);

    tracing::debug!(
        backend_url = %config.backend_url,
        poll_interval_ms = duration_millis(config.tracker.poll_interval),
        failure_threshold = config.tracker.failure_threshold,
        "Configuration loaded"
    );

    cli.run(config).await
}
