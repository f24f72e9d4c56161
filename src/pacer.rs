//! Pacer/Executor Loop - admits one queued executable per `minInterval`,
//! bounded by `maxConcurrent` in-flight jobs.
//!
//! See `spec.md` §4.C. This is a fixed-*delay* pacer, not a fixed-rate
//! ticker: the interval clock is sampled after the loop becomes ready to
//! take the next item, not on a wall-clock tick train, so a stall at the
//! concurrency gate never produces a burst once it clears (`DESIGN NOTES`).

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::queue::PriorityQueue;

/// Runs for the limiter's lifetime (until `shutdown` cancels `token`).
/// Dequeues are unbounded in wait time; in-flight jobs complete
/// independently of one another and of admission order.
///
/// Every admitted job is tracked in a [`JoinSet`] so that when the loop
/// exits it can wait for whatever is still in flight, bounding the work
/// `Limiter::shutdown` has to wait for instead of leaving detached tasks to
/// finish on their own schedule.
///
/// The admission sequence per loop iteration is: wait out the pacing floor,
/// then wait for a concurrency permit, then dequeue. A task that is merely
/// queued while the loop is blocked on pacing or concurrency has not been
/// dequeued yet, so it remains cancellable by id until the dequeue step
/// actually pulls it off; that dequeue is the atomic point after which the
/// entry is no longer deletable and a racing cancel must fall back to
/// raising the handle's cancel signal instead. The pacing clock itself
/// starts counting the instant the loop becomes ready to pursue the next
/// admission, so time spent waiting for a permit never shrinks the gap
/// below `min_interval`.
pub(crate) async fn run(queue: Arc<PriorityQueue>, min_interval: Duration, max_concurrent: usize, shutdown: CancellationToken) {
    let semaphore = Arc::new(Semaphore::new(max_concurrent));
    let mut incoming = std::pin::pin!(queue.dequeue_all());
    let mut next_admission_at: Option<Instant> = None;
    let mut in_flight: JoinSet<()> = JoinSet::new();

    info!(
        min_interval_ms = min_interval.as_millis() as u64,
        max_concurrent, "executor loop started"
    );

    loop {
        // Wait out the pacing floor.
        if let Some(at) = next_admission_at {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep_until(at) => {}
            }
        }

        // Wait for a concurrency permit.
        let permit = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            permit = Arc::clone(&semaphore).acquire_owned() => permit.expect("semaphore is never closed"),
        };

        // Pull the next item off the queue.
        let executable = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            item = incoming.next() => match item {
                Some(item) => item,
                None => break,
            },
        };

        next_admission_at = Some(Instant::now() + min_interval);
        debug!("admitting task");

        in_flight.spawn(async move {
            executable().await;
            drop(permit);
        });
        // Surface panics from completed jobs eagerly.
        while in_flight.try_join_next().is_some() {}
    }

    debug!(in_flight = in_flight.len(), "waiting for in-flight jobs to settle");
    while in_flight.join_next().await.is_some() {}

    info!("executor loop stopping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskHandle;

    #[tokio::test(start_paused = true)]
    async fn paces_admissions_at_min_interval() {
        let queue = Arc::new(PriorityQueue::new(10));
        let shutdown = CancellationToken::new();

        let admitted: Arc<std::sync::Mutex<Vec<Instant>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for _ in 0..3 {
            let admitted = admitted.clone();
            let (handle, exec) = TaskHandle::<(), ()>::new(&shutdown, move || {
                let admitted = admitted.clone();
                async move {
                    admitted.lock().unwrap().push(Instant::now());
                    Ok(())
                }
            });
            queue.enqueue(exec, 0).unwrap();
            handles.push(handle);
        }

        let loop_queue = queue.clone();
        let loop_shutdown = shutdown.clone();
        let handle = tokio::spawn(async move {
            run(loop_queue, Duration::from_secs(1), 10, loop_shutdown).await;
        });

        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::time::advance(Duration::from_millis(50)).await;

        shutdown.cancel();
        handle.await.unwrap();

        let times = admitted.lock().unwrap();
        assert_eq!(times.len(), 3);
        assert!(times[1].duration_since(times[0]) >= Duration::from_secs(1));
        assert!(times[2].duration_since(times[1]) >= Duration::from_secs(1));
    }
}
