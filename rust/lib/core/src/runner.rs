//! Run one blocking unit of work off the caller's stack and deliver its
//! [`Envelope`] exactly once.
//!
//! ```ignore
//! let pending = Runner::new("member.get").run(move || store.get_sync(&id).into());
//! let envelope = pending.wait().await;
//! ```
//!
//! There is no timeout and no cancellation of the worker: once started it
//! runs to completion. A caller that never receives does not block the
//! worker; the send is simply discarded. [`Pending::wait_or_cancel`] lets a
//! caller stop *waiting* without stopping the work.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use axum::http::StatusCode;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{Envelope, ServiceError};

/// Spawns workers for one named operation.
#[derive(Debug, Clone, Copy)]
pub struct Runner {
    op: &'static str,
}

impl Runner {
    pub const fn new(op: &'static str) -> Self {
        Self { op }
    }

    pub fn op(&self) -> &'static str {
        self.op
    }

    /// Start `work` on a worker thread and return its receive-once conduit.
    ///
    /// Uses tokio's blocking pool when a runtime is available, otherwise a
    /// dedicated OS thread. A panic inside `work` is caught here and
    /// delivered as an `Internal` failure.
    pub fn run<T, F>(&self, work: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Envelope<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let op = self.op;

        let job = move || {
            let envelope = match catch_unwind(AssertUnwindSafe(work)) {
                Ok(envelope) => envelope,
                Err(panic) => {
                    let reason = panic_reason(panic.as_ref());
                    error!(op, %reason, "worker faulted");
                    Envelope::fail(ServiceError::Internal(format!("{op}: worker faulted")))
                }
            };
            if tx.send(envelope).is_err() {
                debug!(op, "result discarded: receiver dropped");
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(job);
            }
            Err(_) => {
                std::thread::spawn(job);
            }
        }

        Pending { op, rx: Some(rx) }
    }
}

/// Receive side of a single operation.
#[derive(Debug)]
pub struct Pending<T> {
    op: &'static str,
    rx: Option<oneshot::Receiver<Envelope<T>>>,
}

impl<T> Pending<T> {
    /// A conduit that already holds its value. Used when an operation is
    /// rejected before any work is spawned.
    pub fn ready(op: &'static str, envelope: Envelope<T>) -> Self {
        let (tx, rx) = oneshot::channel();
        // The receiver is alive, so the send cannot fail.
        let _ = tx.send(envelope);
        Self { op, rx: Some(rx) }
    }

    pub fn op(&self) -> &'static str {
        self.op
    }

    /// Receive the envelope. Every call after the first observes the
    /// closed conduit and returns `None`.
    pub async fn recv(&mut self) -> Option<Envelope<T>> {
        let rx = self.rx.take()?;
        Some(rx.await.unwrap_or_else(|_| worker_lost(self.op)))
    }

    /// Await the single envelope.
    pub async fn wait(mut self) -> Envelope<T> {
        match self.recv().await {
            Some(envelope) => envelope,
            None => drained(self.op),
        }
    }

    /// Block the current thread until the envelope arrives.
    ///
    /// For synchronous callers outside the runtime. Must not be called from
    /// inside an async task, nor from a runner worker: the worker would hold
    /// a blocking-pool thread while the awaited work queues for another.
    pub fn blocking_wait(mut self) -> Envelope<T> {
        match self.rx.take() {
            Some(rx) => rx.blocking_recv().unwrap_or_else(|_| worker_lost(self.op)),
            None => drained(self.op),
        }
    }

    /// Await the envelope unless `token` is cancelled first. The worker
    /// keeps running either way; only the wait is abandoned.
    pub async fn wait_or_cancel(self, token: &CancellationToken) -> Envelope<T> {
        let op = self.op;
        tokio::select! {
            biased;
            envelope = self.wait() => envelope,
            _ = token.cancelled() => {
                warn!(op, "caller stopped waiting; worker continues");
                Envelope::fail(ServiceError::Internal(format!("{op}: cancelled by caller")))
                    .with_status(StatusCode::SERVICE_UNAVAILABLE)
            }
        }
    }
}

fn worker_lost<T>(op: &'static str) -> Envelope<T> {
    error!(op, "worker exited without delivering a result");
    Envelope::fail(ServiceError::Internal(format!("{op}: no result delivered")))
}

fn drained<T>(op: &'static str) -> Envelope<T> {
    Envelope::fail(ServiceError::Internal(format!("{op}: result already received")))
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
