//! Delivery queue (mechanics only).
//!
//! The orchestrator owns a single queue per lifetime:
//!
//! ```text
//! producers (API, orchestrator, agent replies) → QueueSender ─┐
//!                                                              ├→ QueueReceiver → drain loop
//! producers ...................................→ QueueSender ─┘
//! ```
//!
//! - **FIFO**: messages are received in enqueue order.
//! - **Unbounded**: back-pressure is not modeled; `enqueue` never blocks.
//! - **Single consumer**: exactly one `QueueReceiver` exists per queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::mpsc;

/// The queue's receiving side has been dropped or closed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
#[error("message queue is closed")]
pub struct QueueClosed;

/// Anything that accepts messages without blocking.
///
/// The trait requires `Send + Sync` so a sink can be shared between the API
/// layer, the orchestrator and the drain loop.
pub trait MessageSink<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn enqueue(&self, message: M) -> Result<(), Self::Error>;
}

impl<M, S> MessageSink<M> for Arc<S>
where
    S: MessageSink<M> + ?Sized,
{
    type Error = S::Error;

    fn enqueue(&self, message: M) -> Result<(), Self::Error> {
        (**self).enqueue(message)
    }
}

/// Create a new unbounded FIFO queue.
pub fn unbounded<M>() -> (QueueSender<M>, QueueReceiver<M>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        QueueSender {
            tx,
            depth: depth.clone(),
        },
        QueueReceiver { rx, depth },
    )
}

/// Producer handle. Cheap to clone; every clone feeds the same queue.
#[derive(Debug)]
pub struct QueueSender<M> {
    tx: mpsc::UnboundedSender<M>,
    depth: Arc<AtomicUsize>,
}

impl<M> Clone for QueueSender<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            depth: self.depth.clone(),
        }
    }
}

impl<M> QueueSender<M> {
    /// Number of messages enqueued but not yet received.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<M> MessageSink<M> for QueueSender<M>
where
    M: Send + 'static,
{
    type Error = QueueClosed;

    fn enqueue(&self, message: M) -> Result<(), Self::Error> {
        // Count before sending so the receiver never observes a negative depth.
        self.depth.fetch_add(1, Ordering::AcqRel);
        self.tx.send(message).map_err(|_| {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            QueueClosed
        })
    }
}

/// Consumer handle (single logical consumer).
#[derive(Debug)]
pub struct QueueReceiver<M> {
    rx: mpsc::UnboundedReceiver<M>,
    depth: Arc<AtomicUsize>,
}

impl<M> QueueReceiver<M> {
    /// Suspend until the next message is available.
    ///
    /// Returns `None` once the queue is closed and empty.
    pub async fn recv(&mut self) -> Option<M> {
        let message = self.rx.recv().await?;
        self.depth.fetch_sub(1, Ordering::AcqRel);
        Some(message)
    }

    /// Take the next message without waiting.
    pub fn try_recv(&mut self) -> Option<M> {
        let message = self.rx.try_recv().ok()?;
        self.depth.fetch_sub(1, Ordering::AcqRel);
        Some(message)
    }

    /// Stop accepting new messages; already-queued messages stay receivable.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Remove every pending message and return them in FIFO order.
    pub fn drain(&mut self) -> Vec<M> {
        let mut pending = Vec::new();
        while let Some(message) = self.try_recv() {
            pending.push(message);
        }
        pending
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }
}
