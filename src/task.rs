//! Task Handle - couples one submitted job to its waiting submitter.
//!
//! See `spec.md` §4.A. A handle is split in two the moment it is created:
//! the boxed [`Executable`] moves into the queue and, later, the executor;
//! the [`TaskHandle`] itself stays with the submitter and exposes
//! `await_result` and `cancel`. Both halves share a oneshot channel for the
//! result and a [`CancellationToken`] for the cancel signal.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::{LimiterError, Outcome};

/// A boxed, type-erased unit of work. Calling it runs the job to completion
/// (or cancellation) and delivers the outcome through the paired oneshot
/// sender captured in its closure. The queue only ever stores this type,
/// which is what keeps it monomorphic across submissions with unrelated
/// job types.
pub(crate) type Executable = Box<dyn FnOnce() -> BoxFuture + Send + 'static>;
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// The submitter-side half of a Task Handle.
///
/// Dropping a `TaskHandle` without calling [`TaskHandle::cancel`] leaves the
/// paired executable free to run to completion; the result is simply never
/// observed. Submitters that want cancellation-on-drop semantics should call
/// `cancel` explicitly (this is what [`crate::Limiter::run`] does on its own
/// cancellation path).
pub(crate) struct TaskHandle<T, E> {
    cancel: CancellationToken,
    result_rx: oneshot::Receiver<Outcome<T, E>>,
}

impl<T, E> TaskHandle<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Builds a fresh handle/executable pair from a user job.
    ///
    /// `parent` is the limiter's shutdown token; this handle's own cancel
    /// signal is a [`CancellationToken::child_token`] of it, so that
    /// cancelling `parent` at teardown cascades to every handle ever
    /// created (queued, running, or already completed) without the
    /// limiter having to track them individually.
    ///
    /// The executable races the job against the cancel signal with a
    /// `biased` select so a cancel raised before the job starts is observed
    /// promptly instead of racing tokio's fair polling; a cancel raised
    /// mid-execution drops the job's future in place, releasing whatever it
    /// held, before the outcome is ever stored. The submitter may have
    /// already observed cancellation through another path (e.g. shutdown
    /// drained this entry) and dropped its receiver by the time the
    /// executable sends its outcome.
    pub(crate) fn new<F, Fut>(parent: &CancellationToken, job: F) -> (Self, Executable)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let cancel = parent.child_token();
        let run_cancel = cancel.clone();

        let executable: Executable = Box::new(move || {
            Box::pin(async move {
                let outcome = tokio::select! {
                    biased;
                    _ = run_cancel.cancelled() => Outcome::Cancelled,
                    result = job() => match result {
                        Ok(value) => Outcome::Completed(value),
                        Err(err) => Outcome::Failed(err),
                    },
                };
                // A failed send (receiver already dropped) is not an error.
                let _ = result_tx.send(outcome);
            })
        });

        (Self { cancel, result_rx }, executable)
    }

    /// Waits for the completion event and surfaces the stored outcome.
    pub(crate) async fn await_result(self) -> Result<T, LimiterError<E>> {
        match self.result_rx.await {
            Ok(Outcome::Completed(value)) => Ok(value),
            Ok(Outcome::Failed(err)) => Err(LimiterError::JobFailure(err)),
            Ok(Outcome::Cancelled) => Err(LimiterError::Cancelled),
            // The sender was dropped without sending: the executable was
            // discarded (e.g. the executor loop itself was torn down mid
            // flight without running it). Treat this identically to an
            // explicit cancellation outcome.
            Err(_) => Err(LimiterError::Cancelled),
        }
    }

    /// Raises the cancel signal. Safe to call whether or not the paired
    /// executable has started running, and safe to call more than once.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clone of this handle's cancel signal, for callers that need to
    /// hold onto it independently of `await_result` (which consumes the
    /// handle by value).
    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
