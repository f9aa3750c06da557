use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use telemetry_worker::runtime::{build_runtime, build_worker, load_and_log_config, shutdown_signal};
use telemetry_worker::{Args, logging};

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(args.log_file.as_deref());

    let rt = build_runtime(args.threads)?;
    rt.block_on(run_worker(args))
}

async fn run_worker(args: Args) -> Result<()> {
    let (config, _source) = match load_and_log_config(&args.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            error!("Please check your config file syntax and try again");
            return Err(e);
        }
    };
    let shutdown_timeout = config.worker.shutdown_timeout;

    let worker = build_worker(config).await?;
    worker.start().await?;

    shutdown_signal().await;
    info!("Shutdown signal received, waiting for running jobs...");

    let clean = worker.shutdown(shutdown_timeout).await;
    let stats = worker.stats();
    info!(
        "Processed {} log(s), {} metric(s), {} rollup(s); deleted {} raw metric(s) over {}",
        stats.logs_inserted,
        stats.metrics_inserted,
        stats.rollups_inserted,
        stats.raw_metrics_deleted,
        stats.format_uptime()
    );

    if !clean {
        anyhow::bail!("Shutdown timed out with jobs still running");
    }
    Ok(())
}
