//! S1: listing a folder's children follows every page of a paginated
//! response and returns the complete, ordered set.

use std::sync::Arc;

use odrive_graph::items::ItemRef;
use odrive_graph::mock::MockTransport;
use tokio_util::sync::CancellationToken;

use crate::common::{authenticated_runtime, item_json};

#[tokio::test]
async fn two_page_listing_returns_every_item_in_order() {
    let mock = Arc::new(MockTransport::new());
    let items: Vec<serde_json::Value> = (0..23)
        .map(|i| item_json(&format!("item-{i}"), &format!("file-{i}.txt")))
        .collect();
    mock.add_mock_items_with_pagination("/me/drive/root/children", items, 12);

    let rig = authenticated_runtime(mock.clone()).await;
    let cancel = CancellationToken::new();

    let children = rig
        .runtime
        .items()
        .get_item_children(ItemRef::Id("root".to_string()), &cancel)
        .await
        .unwrap();

    assert_eq!(children.len(), 23);
    for (i, item) in children.iter().enumerate() {
        assert_eq!(item.id.as_str(), format!("item-{i}"));
    }

    // Exactly two pages fetched: the first page's URL, then one
    // continuation request for the remaining 11 items.
    let calls = mock
        .calls()
        .iter()
        .filter(|c| c.path.starts_with("/me/drive/root/children"))
        .count();
    assert_eq!(calls, 2);
}
