//! S5: with operational offline mode engaged, every request short-circuits
//! before reaching the transport.

use std::sync::Arc;

use odrive_graph::mock::MockTransport;
use tokio_util::sync::CancellationToken;

use crate::common::authenticated_runtime;

#[tokio::test]
async fn offline_mode_short_circuits_without_any_outbound_request() {
    let mock = Arc::new(MockTransport::new());
    mock.add_mock_response("/me", b"{\"userPrincipalName\":\"a@b\"}".to_vec(), 200, None);
    let rig = authenticated_runtime(mock.clone()).await;
    let cancel = CancellationToken::new();

    rig.runtime.set_offline(true).await;

    let err = rig.runtime.items().get_user(&cancel).await.unwrap_err();
    assert!(matches!(err, odrive_graph::GraphError::NetworkError(_)));
    assert_eq!(mock.call_count("/me"), 0);

    rig.runtime.set_offline(false).await;
    let user = rig.runtime.items().get_user(&cancel).await.unwrap();
    assert_eq!(user.user_principal_name, "a@b");
}
