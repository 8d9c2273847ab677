//! Workflow runner
//!
//! Background-task abstraction for the engine: accepts a task descriptor
//! `{idempotency_key, max_retries, timeout}` plus a future factory, spawns
//! the work on tokio, enforces the per-attempt timeout, and retries with
//! exponential backoff. Delivery is at-least-once; tasks protect themselves
//! with check-then-insert, so a duplicate execution is harmless.
//!
//! Retry policy: only `timeout` and `unavailable` failures are retried.
//! Contract violations (validation, forbidden, state errors) surface on the
//! first attempt; retrying them would only hide the failure.
//!
//! Concurrent submissions under one idempotency key deduplicate to the same
//! in-flight task; the second caller receives a handle to the first run.
//!
//! `shutdown` cancels every in-flight attempt through a shared
//! `CancellationToken`; cancelled tasks report a `cancelled` failure rather
//! than disappearing silently.

use cqe_common::Error;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Descriptor of one unit of background work
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    /// Key deduplicating concurrent submissions of the same logical task
    pub idempotency_key: String,
    /// Additional attempts after the first (0 = never retry)
    pub max_retries: u32,
    /// Deadline per attempt
    pub timeout: Duration,
}

impl TaskDescriptor {
    pub fn new(idempotency_key: impl Into<String>, max_retries: u32, timeout: Duration) -> Self {
        Self {
            idempotency_key: idempotency_key.into(),
            max_retries,
            timeout,
        }
    }
}

/// Failure that crossed the task boundary
#[derive(Debug, Clone)]
pub struct TaskFailure {
    /// Error kind string (see `cqe_common::Error::kind`)
    pub kind: String,
    pub message: String,
}

impl TaskFailure {
    fn from_error(e: &Error) -> Self {
        Self {
            kind: e.kind().to_string(),
            message: e.to_string(),
        }
    }

    fn timeout(deadline: Duration) -> Self {
        Self {
            kind: "timeout".to_string(),
            message: format!("task exceeded {deadline:?} deadline"),
        }
    }

    fn cancelled() -> Self {
        Self {
            kind: "cancelled".to_string(),
            message: "task cancelled by runner shutdown".to_string(),
        }
    }

    /// Rebuild the engine error this failure was derived from.
    pub fn into_error(self) -> Error {
        Error::from_kind(&self.kind, self.message)
    }
}

/// Outcome of a finished task
pub type TaskResult = std::result::Result<(), TaskFailure>;

#[derive(Default)]
struct Cell {
    notify: Notify,
    result: Mutex<Option<TaskResult>>,
}

/// Handle to an in-flight (or finished) task
#[derive(Clone)]
pub struct TaskHandle {
    cell: Arc<Cell>,
}

impl TaskHandle {
    /// Wait for the task to report its final result.
    pub async fn join(&self) -> TaskResult {
        loop {
            let notified = self.cell.notify.notified();
            if let Some(result) = self.cell.result.lock().unwrap().clone() {
                return result;
            }
            notified.await;
        }
    }

    /// Final result if the task already finished.
    pub fn try_result(&self) -> Option<TaskResult> {
        self.cell.result.lock().unwrap().clone()
    }
}

/// The runner itself. Cheap to share behind an Arc.
pub struct WorkflowRunner {
    inflight: Mutex<HashMap<String, Arc<Cell>>>,
    backoff_base: Duration,
    cancel: CancellationToken,
}

impl WorkflowRunner {
    pub fn new() -> Self {
        Self::with_backoff_base(Duration::from_millis(100))
    }

    /// Override the backoff base (tests use zero to avoid sleeping).
    pub fn with_backoff_base(backoff_base: Duration) -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
            backoff_base,
            cancel: CancellationToken::new(),
        }
    }

    /// Number of tasks currently in flight.
    pub fn inflight_count(&self) -> usize {
        self.inflight.lock().unwrap().len()
    }

    /// Cancel every in-flight task and refuse further attempts. Waiters
    /// receive a `cancelled` failure.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Submit work. `make` is called once per attempt so retries run a fresh
    /// future each time.
    pub fn submit<F, Fut>(self: &Arc<Self>, descriptor: TaskDescriptor, mut make: F) -> TaskHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = cqe_common::Result<()>> + Send + 'static,
    {
        let key = descriptor.idempotency_key.clone();

        let cell = {
            let mut inflight = self.inflight.lock().unwrap();
            if let Some(existing) = inflight.get(&key) {
                info!(idempotency_key = %key, "Task already in flight, joining existing run");
                return TaskHandle {
                    cell: existing.clone(),
                };
            }
            let cell = Arc::new(Cell::default());
            inflight.insert(key, cell.clone());
            cell
        };

        let runner = Arc::clone(self);
        let handle_cell = cell.clone();

        tokio::spawn(async move {
            let cancel = runner.cancel.clone();
            let mut attempt: u32 = 0;
            let result = loop {
                attempt += 1;
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break Err(TaskFailure::cancelled()),
                    outcome = tokio::time::timeout(descriptor.timeout, make()) => outcome,
                };
                let failure = match outcome {
                    Ok(Ok(())) => break Ok(()),
                    Ok(Err(e)) => TaskFailure::from_error(&e),
                    Err(_) => TaskFailure::timeout(descriptor.timeout),
                };

                let retryable = matches!(failure.kind.as_str(), "timeout" | "unavailable");
                if !retryable || attempt > descriptor.max_retries {
                    break Err(failure);
                }

                warn!(
                    idempotency_key = %descriptor.idempotency_key,
                    attempt,
                    kind = %failure.kind,
                    "Task attempt failed, retrying"
                );
                let backoff = runner.backoff_base * 2u32.saturating_pow(attempt - 1);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break Err(TaskFailure::cancelled()),
                    _ = tokio::time::sleep(backoff) => {}
                }
            };

            match &result {
                Ok(()) => info!(idempotency_key = %descriptor.idempotency_key, "Task completed"),
                Err(f) => error!(
                    idempotency_key = %descriptor.idempotency_key,
                    kind = %f.kind,
                    message = %f.message,
                    "Task failed"
                ),
            }

            runner
                .inflight
                .lock()
                .unwrap()
                .remove(&descriptor.idempotency_key);
            *cell.result.lock().unwrap() = Some(result);
            cell.notify.notify_waiters();
        });

        TaskHandle { cell: handle_cell }
    }
}

impl Default for WorkflowRunner {
    fn default() -> Self {
        Self::new()
    }
}
