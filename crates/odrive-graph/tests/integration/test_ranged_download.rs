//! S6: a file whose size exceeds the 10 MiB chunk threshold is downloaded
//! as a sequence of ranged GETs, each served from the mock's real
//! `Range`-header slicing, and the sink ends up holding the exact
//! concatenation of the original bytes.

use std::sync::Arc;

use odrive_graph::mock::MockTransport;
use tokio_util::sync::CancellationToken;

use crate::common::{authenticated_runtime, item_json};

const TWENTY_FIVE_MIB: usize = 25 * 1024 * 1024;

#[tokio::test]
async fn large_file_downloads_as_concatenated_ranged_chunks() {
    let mock = Arc::new(MockTransport::new());

    let mut item = item_json("file-1", "movie.mkv");
    item["size"] = serde_json::json!(TWENTY_FIVE_MIB);
    mock.add_mock_item("/me/drive/items/file-1", item);

    // A content body with a distinct byte value at every offset's low byte,
    // so the ranged slices can only agree with the source if the mock's
    // `Range` parsing and the client's chunk boundaries line up exactly.
    let content: Vec<u8> = (0..TWENTY_FIVE_MIB).map(|i| (i % 256) as u8).collect();
    mock.add_mock_content("/me/drive/items/file-1/content", content.clone());

    let rig = authenticated_runtime(mock.clone()).await;
    let cancel = CancellationToken::new();

    let downloaded = rig
        .runtime
        .items()
        .get_item_content("file-1", &cancel)
        .await
        .unwrap();

    assert_eq!(downloaded.len(), 26_214_400);
    assert_eq!(downloaded, content);
    // 10 MiB + 10 MiB + 5 MiB: three ranged GETs, none of them cached (they
    // carry a `Range` header, so each goes over `CacheIntent::BypassGet`).
    assert_eq!(mock.call_count("/me/drive/items/file-1/content"), 3);
}
