//! Supervised drain loop.
//!
//! ```text
//!            ┌──────────── supervisor ─────────────┐
//!  queue ──► │ drain loop: recv → dispatch → fan-in │ ──► DeliveryReport (broadcast)
//!            │   ▲   restart with backoff on panic  │ ──► DrainStats
//!            └───┴──────────────────────────────────┘
//!              follow-up replies re-enqueued
//! ```
//!
//! One message is fully dispatched (all deliveries joined) before the next is
//! popped, so every agent observes queued messages serially in FIFO order.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use atlaserp_messaging::{AgentMessage, DeliveryReport, MessageSink, QueueReceiver, QueueSender};

use crate::dispatch::{Dispatched, Dispatcher};

/// Drain loop runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainStats {
    pub messages_processed: u64,
    pub deliveries_succeeded: u64,
    pub deliveries_failed: u64,
    pub messages_dropped: u64,
    pub replies_enqueued: u64,
    pub restarts: u32,
    pub running: bool,
    /// The loop exceeded its restart budget and is no longer draining.
    pub failed: bool,
    pub queue_depth: usize,
}

pub(crate) type SharedStats = Arc<Mutex<DrainStats>>;

pub(crate) fn lock_stats(stats: &SharedStats) -> std::sync::MutexGuard<'_, DrainStats> {
    stats.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything one drain loop incarnation needs. Cloned for every restart.
#[derive(Clone)]
pub(crate) struct DrainContext {
    pub dispatcher: Dispatcher,
    pub receiver: Arc<tokio::sync::Mutex<QueueReceiver<AgentMessage>>>,
    pub sender: QueueSender<AgentMessage>,
    pub reports: broadcast::Sender<DeliveryReport>,
    pub stats: SharedStats,
    pub error_pause: Duration,
    pub max_restarts: u32,
    pub restart_backoff: Duration,
}

/// Handle to a running drain loop.
#[derive(Debug)]
pub(crate) struct DrainHandle {
    shutdown: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
}

impl DrainHandle {
    /// Signal the loop to stop and wait for the supervisor to exit.
    ///
    /// A message already being dispatched is finished first.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(join) = self.join.take() {
            if let Err(err) = join.await {
                error!(error = %err, "drain supervisor terminated abnormally");
            }
        }
    }
}

/// Start the supervised drain loop on the current runtime.
pub(crate) fn spawn(ctx: DrainContext) -> DrainHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    lock_stats(&ctx.stats).running = true;

    let stats = ctx.stats.clone();
    let (max_restarts, base) = (ctx.max_restarts, ctx.restart_backoff);
    let loop_shutdown = shutdown_rx.clone();

    let join = tokio::spawn(async move {
        supervise(
            move || run(ctx.clone(), loop_shutdown.clone()),
            max_restarts,
            base,
            stats,
            shutdown_rx,
        )
        .await;
    });

    DrainHandle {
        shutdown: shutdown_tx,
        join: Some(join),
    }
}

/// Run `start()` in its own task, restarting it after a panic.
///
/// A clean return ends supervision. Restarts use `backoff(base, n)`; after
/// `max_restarts` the loop is given up and `DrainStats::failed` is set.
pub(crate) async fn supervise<F, Fut>(
    mut start: F,
    max_restarts: u32,
    base: Duration,
    stats: SharedStats,
    mut shutdown: watch::Receiver<bool>,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut attempt = 0u32;
    loop {
        match tokio::spawn(start()).await {
            Ok(()) => break,
            Err(err) if err.is_panic() => {
                if *shutdown.borrow() {
                    break;
                }
                attempt += 1;
                lock_stats(&stats).restarts = attempt;

                if attempt > max_restarts {
                    error!(restarts = max_restarts, "drain loop keeps panicking; giving up");
                    lock_stats(&stats).failed = true;
                    break;
                }

                let delay = backoff(base, attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, "drain loop panicked; restarting");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = stopped(&mut shutdown) => break,
                }
            }
            Err(err) => {
                warn!(error = %err, "drain loop cancelled");
                break;
            }
        }
    }
    lock_stats(&stats).running = false;
    info!("drain loop stopped");
}

async fn run(ctx: DrainContext, mut shutdown: watch::Receiver<bool>) {
    let mut receiver = ctx.receiver.lock().await;
    debug!("drain loop started");

    loop {
        let message = tokio::select! {
            biased;
            _ = stopped(&mut shutdown) => break,
            next = receiver.recv() => match next {
                Some(message) => message,
                None => break,
            },
        };

        let Dispatched { report, follow_ups } = ctx.dispatcher.dispatch(message).await;

        let mut enqueued = 0u64;
        for follow_up in follow_ups {
            let id = follow_up.id();
            match ctx.sender.enqueue(follow_up) {
                Ok(()) => enqueued += 1,
                Err(err) => warn!(message_id = %id, error = %err, "could not re-enqueue reply"),
            }
        }

        {
            let mut stats = lock_stats(&ctx.stats);
            stats.messages_processed += 1;
            stats.deliveries_succeeded += report.delivered.len() as u64;
            stats.deliveries_failed += report.failed.len() as u64;
            stats.replies_enqueued += enqueued;
            if report.dropped.is_some() {
                stats.messages_dropped += 1;
            }
        }

        let had_failures = !report.failed.is_empty();
        // No subscribers is fine.
        let _ = ctx.reports.send(report);

        if had_failures && !ctx.error_pause.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(ctx.error_pause) => {}
                _ = stopped(&mut shutdown) => break,
            }
        }
    }
}

/// Resolves once shutdown has been requested (or the signal is gone).
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    // base * 2^(attempt-1), capped at 10s.
    let pow = 1u32 << attempt.saturating_sub(1).min(10);
    let ms = base.as_millis().saturating_mul(pow as u128);
    Duration::from_millis(ms.min(10_000) as u64)
}
