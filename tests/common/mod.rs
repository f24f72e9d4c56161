//! Shared test support: routes `tracing` output through the test harness's
//! writer so `cargo test -- --nocapture` shows admission/pacing/shutdown
//! events from the crate under test.

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("pulsegate=debug")
        .with_test_writer()
        .try_init();
}
