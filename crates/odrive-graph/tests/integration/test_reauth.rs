//! S3: a 401 on the first attempt triggers the authorization-code reauth
//! flow, and the retried request succeeds, for exactly two `/me` requests
//! against the Graph transport.

use std::sync::Arc;

use odrive_graph::mock::MockTransport;
use tokio_util::sync::CancellationToken;

use crate::common::authenticated_runtime;

#[tokio::test]
async fn expired_token_triggers_reauth_then_succeeds() {
    let mock = Arc::new(MockTransport::new());
    mock.add_mock_response_once(
        "/me",
        b"{\"error\":{\"code\":\"InvalidAuthenticationToken\",\"message\":\"token expired\"}}".to_vec(),
        401,
    );
    mock.add_mock_response("/me", b"{\"userPrincipalName\":\"a@b\"}".to_vec(), 200, None);

    let rig = authenticated_runtime(mock.clone()).await;
    let cancel = CancellationToken::new();

    let user = rig.runtime.items().get_user(&cancel).await.unwrap();
    assert_eq!(user.user_principal_name, "a@b");
    assert_eq!(mock.call_count("/me"), 2);
}
