//! Cancellation semantics: a cancel raised while a submission is still
//! queued does not disturb the pacing clock; a cancel raised while a job is
//! running interrupts it in place without accelerating the next admission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pulsegate::Limiter;
use tokio::sync::Notify;

mod common;

#[tokio::test(start_paused = true)]
async fn cancelling_a_queued_submission_leaves_pacing_untouched() {
    common::init_tracing();
    let limiter = Arc::new(Limiter::start(Duration::from_secs(10), 10, 10));
    let a_started = Arc::new(Notify::new());
    let release_a = Arc::new(Notify::new());

    // A admits immediately (nothing paces the very first admission) and
    // then blocks, holding the only concurrency slot we care about here.
    let a = {
        let limiter = limiter.clone();
        let a_started = a_started.clone();
        let release_a = release_a.clone();
        tokio::spawn(async move {
            limiter
                .run(0, move || async move {
                    a_started.notify_one();
                    release_a.notified().await;
                    Ok::<(), std::io::Error>(())
                })
                .await
        })
    };
    a_started.notified().await;

    // B queues behind A.
    let b = {
        let limiter = limiter.clone();
        tokio::spawn(async move { limiter.run(0, || async { Ok::<(), std::io::Error>(()) }).await })
    };
    tokio::task::yield_now().await;
    assert_eq!(limiter.pending(), 1);

    // C queues behind B; its admission time is what we check is unmoved by
    // B's cancellation.
    let c_started = Arc::new(AtomicBool::new(false));
    let c = {
        let limiter = limiter.clone();
        let c_started = c_started.clone();
        tokio::spawn(async move {
            limiter
                .run(0, move || async move {
                    c_started.store(true, Ordering::SeqCst);
                    Ok::<(), std::io::Error>(())
                })
                .await
        })
    };
    tokio::task::yield_now().await;
    assert_eq!(limiter.pending(), 2);

    tokio::time::advance(Duration::from_secs(1)).await;
    b.abort();
    assert!(b.await.is_err());

    // B's slot is gone, but the pacing clock started counting from A's
    // admission at t=0, not from B's cancellation at t=1s.
    tokio::time::advance(Duration::from_secs(8) + Duration::from_millis(900)).await;
    assert!(!c_started.load(Ordering::SeqCst));

    release_a.notify_one();
    a.await.unwrap().unwrap();

    tokio::time::advance(Duration::from_millis(200)).await;
    assert!(c_started.load(Ordering::SeqCst));
    c.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancelling_a_running_job_does_not_accelerate_the_next_admission() {
    common::init_tracing();
    let limiter = Arc::new(Limiter::start(Duration::from_secs(1), 10, 10));
    let a_started = Arc::new(Notify::new());

    let a = {
        let limiter = limiter.clone();
        let a_started = a_started.clone();
        tokio::spawn(async move {
            limiter
                .run(0, move || async move {
                    a_started.notify_one();
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<(), std::io::Error>(())
                })
                .await
        })
    };
    a_started.notified().await;

    let b_started = Arc::new(AtomicBool::new(false));
    let b = {
        let limiter = limiter.clone();
        let b_started = b_started.clone();
        tokio::spawn(async move {
            limiter
                .run(0, move || async move {
                    b_started.store(true, Ordering::SeqCst);
                    Ok::<(), std::io::Error>(())
                })
                .await
        })
    };

    tokio::time::advance(Duration::from_millis(500)).await;
    a.abort();
    assert!(a.await.is_err());

    tokio::time::advance(Duration::from_millis(400)).await;
    assert!(!b_started.load(Ordering::SeqCst));

    tokio::time::advance(Duration::from_millis(100)).await;
    assert!(b_started.load(Ordering::SeqCst));
    b.await.unwrap().unwrap();
}
