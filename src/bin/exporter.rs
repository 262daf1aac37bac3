use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sql_exporter::{
    MetricSurface, QueryExecutor, Scheduler,
    api::{ApiConfig, ApiState, spawn_api_server},
    config::read_config_file,
    database::DatabaseTarget,
    logging,
};
use tokio::sync::watch;
use tracing::{error, info, trace};

#[derive(Debug, Clone, Parser)]
#[command(version, about)]
struct Args {
    /// Config file (YAML, or JSON when it ends in .json)
    #[arg(
        short = 'c',
        long = "configFile",
        alias = "config-file",
        default_value = "config.yaml"
    )]
    config_file: String,

    /// Log file, or "stdout"
    #[arg(
        short = 'l',
        long = "logFile",
        alias = "log-file",
        default_value = logging::STDOUT
    )]
    log_file: String,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    logging::init(args.verbose, &args.log_file);
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.config_file)
        .with_context(|| format!("failed to load config from {}", args.config_file))?;
    let settings = config.settings();

    let metrics = MetricSurface::new().context("failed to register metrics")?;

    let mut targets = Vec::with_capacity(config.databases.len());
    for database in &config.databases {
        let target = DatabaseTarget::open(database, settings)
            .with_context(|| format!("invalid settings for database {}", database.database))?;
        targets.push(Arc::new(target));
    }

    let executor = Arc::new(QueryExecutor::new(settings, metrics.clone()));
    let mut scheduler = Scheduler::new(executor);
    scheduler.start(&targets).await;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let (addr, server) = spawn_api_server(
        ApiConfig::from_config(&config),
        ApiState::new(metrics).with_jobs(scheduler.handles().len()),
        async move {
            let _ = shutdown_rx.changed().await;
        },
    )
    .await
    .context("failed to start metrics endpoint")?;

    info!("serving metrics on http://{addr}/metrics");

    shutdown_signal().await;
    info!("shutting down");

    let _ = shutdown_tx.send(true);
    scheduler.shutdown().await;
    if let Err(e) = server.await {
        error!("API server task failed: {e}");
    }
    for target in &targets {
        target.close().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
