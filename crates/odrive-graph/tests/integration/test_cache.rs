//! S2: a cacheable GET is served from cache on a repeat call, and a
//! successful mutation against the same resource invalidates it.

use std::sync::Arc;

use odrive_graph::mock::MockTransport;
use tokio_util::sync::CancellationToken;

use crate::common::authenticated_runtime;

#[tokio::test]
async fn remove_invalidates_the_cached_item_so_a_later_get_refetches() {
    let mock = Arc::new(MockTransport::new());
    mock.add_mock_response("/me/drive/items/doc-1", b"{\"id\":\"doc-1\",\"name\":\"a.txt\"}".to_vec(), 200, None);
    let rig = authenticated_runtime(mock.clone()).await;
    let cancel = CancellationToken::new();

    let first = rig.runtime.items().get_item("doc-1", &cancel).await.unwrap();
    assert_eq!(first.name, "a.txt");
    assert_eq!(mock.call_count("/me/drive/items/doc-1"), 1);

    let second = rig.runtime.items().get_item("doc-1", &cancel).await.unwrap();
    assert_eq!(second.name, "a.txt");
    assert_eq!(mock.call_count("/me/drive/items/doc-1"), 1, "second get should hit the cache");

    mock.add_mock_response("/me/drive/items/doc-1", b"{}".to_vec(), 204, None);
    rig.runtime.items().remove("doc-1", &cancel).await.unwrap();

    mock.add_mock_response(
        "/me/drive/items/doc-1",
        b"{\"id\":\"doc-1\",\"name\":\"renamed.txt\"}".to_vec(),
        200,
        None,
    );
    let after = rig.runtime.items().get_item("doc-1", &cancel).await.unwrap();
    assert_eq!(after.name, "renamed.txt");
}
