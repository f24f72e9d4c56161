//! Error and outcome values produced by the limiter.

use thiserror::Error;

/// Failure modes a submitter can observe from [`crate::Limiter::run`].
///
/// `LimitReached` and `Cancelled` are reported synchronously to the
/// originating submitter only; neither affects other submissions or the
/// executor loop. `JobFailure` carries the user job's own error type.
#[derive(Debug, Error)]
pub enum LimiterError<E> {
    /// The queue was at `maxQueued` capacity at submission time.
    #[error("queue is at capacity")]
    LimitReached,

    /// The job ran and returned an error.
    #[error("job failed")]
    JobFailure(#[source] E),

    /// The submission was cancelled while queued, while running, or by
    /// limiter shutdown.
    #[error("cancelled")]
    Cancelled,
}

/// The result a completed [`crate::task::TaskHandle`] delivers exactly once.
pub(crate) enum Outcome<T, E> {
    Completed(T),
    Failed(E),
    Cancelled,
}
