//! Lifecycle logging, captured with tracing-test.

mod common;

use common::*;
use peerlink_client_core::Credentials;
use tracing_test::traced_test;

#[tokio::test]
#[traced_test]
async fn test_connect_and_disconnect_are_logged() {
    let f = fixture();
    f.client.connect(Credentials::new("bob")).await.unwrap();
    f.client.disconnect().await.unwrap();

    assert!(logs_contain("client connected"));
    assert!(logs_contain("client disconnected"));
}
