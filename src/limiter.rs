//! Limiter Facade - the public, scoped entry point over Components A-C.
//!
//! See `spec.md` §4.D. Lifecycle management mirrors the teacher's
//! `Platform::start() -> PlatformRuntime` / `PlatformRuntime::shutdown()`
//! shape: `Limiter::start` spawns the executor loop bound to a root
//! `CancellationToken`; `Limiter::shutdown` is the deterministic teardown
//! path, and `Drop` is a best-effort synchronous backstop for callers who
//! let the limiter simply go out of scope.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::LimiterError;
use crate::pacer;
use crate::queue::PriorityQueue;
use crate::task::TaskHandle;

/// A priority-aware interval rate limiter.
///
/// Construct with [`Limiter::start`]; submit work with [`Limiter::run`] from
/// as many concurrent callers as needed (behind an `Arc` if they don't share
/// a single owner); release it with [`Limiter::shutdown`] (or simply let it
/// drop, which cancels the executor loop but does not wait for in-flight
/// jobs to notice).
pub struct Limiter {
    queue: Arc<PriorityQueue>,
    shutdown: CancellationToken,
    executor: Mutex<Option<JoinHandle<()>>>,
}

impl Limiter {
    /// Starts a limiter and its background executor loop.
    ///
    /// # Panics
    ///
    /// Panics if `max_queued` or `max_concurrent` is zero. These are
    /// programming errors per `spec.md` §6/§7 (`ProgrammerError`), not
    /// recoverable `Result`s. `min_interval` has no precondition beyond
    /// being a valid, non-negative `Duration`, which the type already
    /// guarantees.
    pub fn start(min_interval: Duration, max_queued: usize, max_concurrent: usize) -> Self {
        assert!(max_queued > 0, "max_queued must be greater than zero");
        assert!(max_concurrent > 0, "max_concurrent must be greater than zero");

        let queue = Arc::new(PriorityQueue::new(max_queued));
        let shutdown = CancellationToken::new();

        let executor = tokio::spawn(pacer::run(
            Arc::clone(&queue),
            min_interval,
            max_concurrent,
            shutdown.clone(),
        ));

        info!(max_queued, max_concurrent, "limiter started");

        Self {
            queue,
            shutdown,
            executor: Mutex::new(Some(executor)),
        }
    }

    /// Submits `job` at `priority` (higher admits earlier) and waits for its
    /// outcome.
    ///
    /// Cancelling this future (dropping it) deletes the queue entry if the
    /// job has not yet been admitted, in which case no concurrency slot or
    /// pacing interval was ever consumed, or raises the job's own cancel
    /// signal if it is already running. See `spec.md` §4.D's state machine.
    pub async fn run<F, Fut, T, E>(&self, priority: i64, job: F) -> Result<T, LimiterError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (handle, executable) = TaskHandle::new(&self.shutdown, job);
        let cancel = handle.cancel_token();

        let id = match self.queue.enqueue(executable, priority) {
            Ok(id) => id,
            Err(_limit_reached) => {
                warn!(priority, "submission rejected: queue at capacity");
                return Err(LimiterError::LimitReached);
            }
        };

        // Run the cancellation protocol if this future is dropped early.
        let _guard = SubmissionGuard {
            queue: &self.queue,
            id,
            cancel,
        };

        handle.await_result().await
    }

    /// A best-effort, possibly-stale snapshot of the current queue size.
    pub fn pending(&self) -> usize {
        self.queue.size()
    }

    /// Deterministically tears the limiter down: stops the executor loop,
    /// cancels every in-flight job, and resolves every still-queued entry
    /// as cancelled so any outstanding [`Limiter::run`] callers unblock.
    ///
    /// Takes `&self` rather than consuming the limiter so that callers
    /// sharing it behind an `Arc` across many concurrent submitters can
    /// still trigger a shutdown without first collecting every clone back.
    /// Safe to call more than once: the first call waits for the executor
    /// loop to finish; later calls find it already taken and return as soon
    /// as they've cancelled and drained.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        for executable in self.queue.drain() {
            // Dropping a pending executable never runs it; the paired
            // handle observes the sender drop as `Cancelled` (see
            // `TaskHandle::await_result`).
            drop(executable);
        }

        // Take the handle and drop the lock guard before awaiting it.
        let executor = self.executor.lock().await.take();
        if let Some(executor) = executor {
            let _ = executor.await;
        }

        info!("limiter shut down");
    }
}

impl Drop for Limiter {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Couples a pending submission's queue id to its cancel signal so that if
/// the `run` future itself is dropped (the caller's own cancellation, e.g.
/// via an external timeout), the two-step "delete, else cancel" protocol
/// from `spec.md`'s `DESIGN NOTES` still runs to completion. On normal
/// completion its drop is a harmless no-op: the entry is already gone and
/// the token already settled.
struct SubmissionGuard<'a> {
    queue: &'a PriorityQueue,
    id: u64,
    cancel: CancellationToken,
}

impl<'a> Drop for SubmissionGuard<'a> {
    fn drop(&mut self) {
        // Delete if still queued; otherwise raise the cancel signal.
        if !self.queue.delete(self.id) {
            self.cancel.cancel();
        }
    }
}
