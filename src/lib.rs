//! A priority-aware interval rate limiter for asynchronous jobs.
//!
//! Clients submit jobs tagged with an integer priority through
//! [`Limiter::run`]; the limiter admits at most one job per `min_interval`,
//! never more than `max_concurrent` at once, and rejects submissions past
//! `max_queued` so a slow downstream never turns into unbounded memory
//! growth upstream. Higher-priority submissions are admitted ahead of
//! lower-priority ones that are still waiting; among equal priorities,
//! admission is first-come, first-served.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use pulsegate::Limiter;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let limiter = Limiter::start(Duration::from_millis(200), 64, 4);
//!
//! let result: Result<u32, pulsegate::LimiterError<std::io::Error>> =
//!     limiter.run(0, || async { Ok(42) }).await;
//!
//! assert_eq!(result.unwrap(), 42);
//! limiter.shutdown().await;
//! # }
//! ```
//!
//! # What this crate is not
//!
//! There is no persistence across restarts, no fairness across priorities
//! beyond strict ordering with no aging, and no coordination between
//! separate [`Limiter`] instances sharing the same downstream resource.

mod error;
mod limiter;
mod pacer;
mod queue;
mod task;

pub use error::LimiterError;
pub use limiter::Limiter;
