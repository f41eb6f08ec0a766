//! Persistent per-queue workers and their supervisor.
//!
//! Each dead-letter queue gets one long-lived worker that waits on a shared
//! tick signal. The signal is a `watch` channel, so ticks that arrive while a
//! pass is running collapse into a single follow-up pass. A supervisor loop
//! per queue respawns the worker if it panics or returns while the engine is
//! still running.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::processor::{QueueProcessor, ReplayContext};

/// Run passes over one queue whenever a tick arrives, until cancelled or the
/// tick source goes away. The consuming channel is closed on exit.
pub(crate) async fn run_worker(
    mut processor: QueueProcessor,
    mut ticks: watch::Receiver<u64>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = ticks.changed() => {
                if changed.is_err() {
                    break;
                }
                processor.process_pass(&cancel).await;
            }
        }
    }
    processor.shutdown().await;
}

/// Keep a worker alive for `dlq` until shutdown.
pub(crate) async fn supervise(
    dlq: String,
    context: Arc<ReplayContext>,
    ticks: watch::Receiver<u64>,
    cancel: CancellationToken,
    restart_delay: Duration,
) {
    let mut restarted = false;
    loop {
        let mut rx = ticks.clone();
        // A tick that was in flight when the worker died is not replayed.
        // The first start keeps it: the poller fires as soon as it runs.
        if restarted {
            rx.borrow_and_update();
        }
        restarted = true;

        let processor = QueueProcessor::new(dlq.clone(), Arc::clone(&context));
        let outcome = tokio::spawn(run_worker(processor, rx, cancel.clone())).await;

        let ticks_closed = ticks.has_changed().is_err();
        if cancel.is_cancelled() || (outcome.is_ok() && ticks_closed) {
            break;
        }
        match outcome {
            Ok(()) => warn!(queue = %dlq, "worker returned unexpectedly"),
            Err(e) if e.is_panic() => error!(queue = %dlq, "worker panicked"),
            Err(e) => warn!(queue = %dlq, error = %e, "worker task aborted"),
        }
        if ticks_closed {
            break;
        }

        context.metrics.increment_worker_restarts();
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(restart_delay) => {}
        }
        info!(queue = %dlq, "restarting worker");
    }
}
