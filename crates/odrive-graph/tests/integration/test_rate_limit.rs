//! S4: two consecutive `429` responses, each carrying `Retry-After: 1`,
//! are retried with the server-specified delay rather than the computed
//! backoff, and the third attempt succeeds.

use std::sync::Arc;
use std::time::Instant;

use odrive_graph::mock::MockTransport;
use tokio_util::sync::CancellationToken;

use crate::common::authenticated_runtime;

#[tokio::test]
async fn rate_limited_requests_retry_after_the_server_specified_delay() {
    let mock = Arc::new(MockTransport::new());
    mock.add_mock_response("/me/drive", b"{\"id\":\"drive-1\",\"driveType\":\"personal\",\"quota\":{\"total\":100,\"used\":1,\"remaining\":99,\"deleted\":0,\"fileCount\":1,\"state\":\"normal\"}}".to_vec(), 200, None);
    mock.add_mock_throttle_once("/me/drive", 1);
    mock.add_mock_throttle_once("/me/drive", 1);

    let rig = authenticated_runtime(mock.clone()).await;
    let cancel = CancellationToken::new();

    let started = Instant::now();
    let drive = rig.runtime.items().get_drive(&cancel).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(drive.id, "drive-1");
    assert_eq!(mock.call_count("/me/drive"), 3);
    assert!(
        elapsed >= std::time::Duration::from_secs(2),
        "expected at least 2s of server-specified retry delay, got {elapsed:?}"
    );
}
