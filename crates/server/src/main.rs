use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use lazarus_engine::OnceReport;
use lazarus_server::config::LazarusConfig;
use lazarus_server::{factory, telemetry};

#[derive(Parser, Debug)]
#[command(name = "lazarus", about = "Dead-letter replay engine", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "lazarus.toml")]
    config: String,

    /// Run a single health-gated pass over every queue and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let (config, found) = LazarusConfig::load(&cli.config)?;

    let telemetry_guard = telemetry::init(&config.telemetry);
    if !found {
        info!(path = %cli.config, "config file not found, using defaults");
    }
    config.validate()?;

    let broker = factory::create_broker(&config.broker);
    let gate = factory::create_health_gate(&config.health)?;
    let engine = Arc::new(factory::build_engine(&config, Arc::clone(&broker), gate)?);
    info!(
        queues = engine.registry().len(),
        poll_interval_seconds = config.replay.poll_interval_seconds,
        max_retries = config.replay.max_retries,
        once = cli.once,
        "lazarus starting"
    );

    let cancel = CancellationToken::new();
    let result = if cli.once {
        run_once(&engine, &cancel).await
    } else {
        run_until_signal(
            Arc::clone(&engine),
            cancel,
            config.server.shutdown_timeout(),
        )
        .await;
        Ok(())
    };

    let snapshot = engine.metrics().snapshot();
    info!(
        ticks = snapshot.ticks,
        ticks_skipped_unhealthy = snapshot.ticks_skipped_unhealthy,
        replayed = snapshot.replayed,
        deferred = snapshot.deferred,
        security_rejected = snapshot.security_rejected,
        permanently_lost = snapshot.permanently_lost,
        replay_failed = snapshot.replay_failed,
        setup_failures = snapshot.setup_failures,
        worker_restarts = snapshot.worker_restarts,
        "replay totals"
    );

    broker.close().await;
    telemetry_guard.shutdown();
    info!("lazarus stopped");
    result
}

/// Drain every queue once. A signal stops the pass after the message in
/// flight.
async fn run_once(
    engine: &lazarus_engine::ReplayEngine,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let pass = engine.run_once(cancel);
    tokio::pin!(pass);
    let report = tokio::select! {
        report = &mut pass => report,
        () = shutdown_signal() => {
            cancel.cancel();
            pass.await
        }
    };
    log_report(&report);

    if report.skipped() {
        return Err(format!(
            "replay skipped, unhealthy dependencies: {}",
            report.health.failing().join(", ")
        )
        .into());
    }
    Ok(())
}

fn log_report(report: &OnceReport) {
    for pass in &report.passes {
        info!(
            queue = %pass.queue,
            replayed = pass.replayed,
            deferred = pass.deferred,
            rejected = pass.rejected,
            lost = pass.lost,
            failed = pass.failed,
            end = ?pass.end,
            "pass complete"
        );
    }
}

/// Run the supervised engine until SIGINT or SIGTERM, then give workers
/// `shutdown_timeout` to settle their current message.
async fn run_until_signal(
    engine: Arc<lazarus_engine::ReplayEngine>,
    cancel: CancellationToken,
    shutdown_timeout: std::time::Duration,
) {
    let mut running = tokio::spawn({
        let cancel = cancel.clone();
        async move { engine.run(cancel).await }
    });

    tokio::select! {
        result = &mut running => {
            if let Err(e) = result {
                error!(error = %e, "engine task failed");
            }
            return;
        }
        () = shutdown_signal() => {}
    }

    info!("shutting down, waiting for workers");
    cancel.cancel();
    match tokio::time::timeout(shutdown_timeout, &mut running).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "engine task failed during shutdown"),
        Err(_) => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "workers did not stop in time, aborting"
            );
            running.abort();
        }
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }
}
