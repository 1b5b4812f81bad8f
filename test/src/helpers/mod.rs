pub mod assertions;
pub mod test_client;
pub mod test_server;

pub use assertions::{component_of, share_snapshot};
pub use test_client::TestClient;
pub use test_server::TestServer;

/// Routes `log` output through the test harness; safe to call from every test.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Polls `condition` until it holds, failing the test after five seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition did not hold within the wait time"
        );
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
}
