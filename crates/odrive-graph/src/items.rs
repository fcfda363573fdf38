//! Typed item operations (C8): thin compositions of the URL algebra
//! (`url`), the executor (`executor`), and the content hashes (`hash`) for
//! the handful of Graph resources the core cares about.
//!
//! Every operation here goes through [`Executor::execute`]; none of them
//! composes a URL or touches the response cache directly.

use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use odrive_core::domain::{Drive, DriveChildren, DriveItem, User};
use reqwest::Method;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::executor::{CacheIntent, Executor};
use crate::url;
use crate::GraphError;

/// Width of a single ranged-download chunk: 10 MiB.
const CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// A reference to a drive item, by stable id or by path, for the
/// operations that accept either.
#[derive(Debug, Clone)]
pub enum ItemRef {
    Id(String),
    Path(String),
}

impl ItemRef {
    fn children_path(&self) -> String {
        match self {
            ItemRef::Id(id) => url::children_path_id(id),
            ItemRef::Path(path) => url::children_path(path),
        }
    }
}

impl From<&str> for ItemRef {
    /// Paths are distinguished from ids by a leading `/`; everything else
    /// (including the literal `"root"`) is treated as an id.
    fn from(s: &str) -> Self {
        if s.starts_with('/') {
            ItemRef::Path(s.to_string())
        } else {
            ItemRef::Id(s.to_string())
        }
    }
}

/// Typed wrappers over the executor for drive-item operations: get, list
/// children (paginated), create folder, rename/move, delete, download, and
/// account/drive metadata.
pub struct ItemApi {
    executor: Executor,
}

impl ItemApi {
    #[must_use]
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    /// GET `idPath(id)`, decoded as a [`DriveItem`]. The literal id
    /// `"root"` resolves to the drive root.
    #[instrument(skip(self, cancel))]
    pub async fn get_item(&self, id: &str, cancel: &CancellationToken) -> Result<DriveItem, GraphError> {
        let path = url::id_path(id);
        self.get_item_at(&path, cancel).await
    }

    /// GET `resourcePath(path)`, decoded as a [`DriveItem`].
    #[instrument(skip(self, cancel))]
    pub async fn get_item_path(&self, path: &str, cancel: &CancellationToken) -> Result<DriveItem, GraphError> {
        let resource = url::resource_path(path);
        self.get_item_at(&resource, cancel).await
    }

    /// GET the named child of `parent_id`, addressed as
    /// `idPath(parent_id) + ":/" + escaped(name)`.
    #[instrument(skip(self, cancel))]
    pub async fn get_item_child(
        &self,
        parent_id: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<DriveItem, GraphError> {
        let resource = format!("{}:/{}", url::id_path(parent_id), url::escape(name));
        self.get_item_at(&resource, cancel).await
    }

    async fn get_item_at(&self, resource: &str, cancel: &CancellationToken) -> Result<DriveItem, GraphError> {
        let body = self
            .executor
            .execute(Method::GET, resource, None, &[], CacheIntent::CacheableGet, cancel)
            .await?;
        decode_json(&body)
    }

    /// Iterates every page of `item`'s children, following
    /// `@odata.nextLink` (relativized against the Graph base URL) until
    /// exhausted. Returns every item across all pages, in server order.
    #[instrument(skip(self, cancel))]
    pub async fn get_item_children(
        &self,
        item: ItemRef,
        cancel: &CancellationToken,
    ) -> Result<Vec<DriveItem>, GraphError> {
        let mut all = Vec::new();
        let mut next_path = Some(item.children_path());

        while let Some(path) = next_path {
            let body = self
                .executor
                .execute(Method::GET, &path, None, &[], CacheIntent::CacheableGet, cancel)
                .await?;
            let page: DriveChildren = decode_json(&body)?;
            all.extend(page.items);

            next_path = page.next_link.map(|link| self.relativize(&link));
        }

        Ok(all)
    }

    /// Turns an absolute `@odata.nextLink` into a `path` the executor can
    /// reuse directly: the URL's own path and query, not a prefix-stripped
    /// string. Falls back to the raw link if it fails to parse as a URL at
    /// all (it is still handed to `execute`, which will simply 404).
    fn relativize(&self, link: &str) -> String {
        match ::url::Url::parse(link) {
            Ok(parsed) => match parsed.query() {
                Some(query) => format!("{}?{}", parsed.path(), query),
                None => parsed.path().to_string(),
            },
            Err(_) => link.to_string(),
        }
    }

    /// Downloads an item's full content into memory. Delegates to
    /// [`ItemApi::get_item_content_stream`] against an in-memory sink.
    #[instrument(skip(self, cancel))]
    pub async fn get_item_content(&self, id: &str, cancel: &CancellationToken) -> Result<Vec<u8>, GraphError> {
        let mut buf = Vec::new();
        self.get_item_content_stream(id, &mut VecWriter(&mut buf), cancel)
            .await?;
        Ok(buf)
    }

    /// Downloads an item's full content into `writer`. Looks up the
    /// item's size first; files at or under 10 MiB are fetched in one GET,
    /// larger files in a sequence of 10 MiB ranged GETs. Returns the total
    /// number of bytes written.
    #[instrument(skip(self, writer, cancel))]
    pub async fn get_item_content_stream<W>(
        &self,
        id: &str,
        writer: &mut W,
        cancel: &CancellationToken,
    ) -> Result<u64, GraphError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let item = self.get_item(id, cancel).await?;
        let size = item.normalized_size();
        let content_path = format!("{}/content", url::id_path(id));

        if size <= CHUNK_SIZE {
            let body = self
                .executor
                .execute(Method::GET, &content_path, None, &[], CacheIntent::CacheableGet, cancel)
                .await?;
            let written = body.len() as u64;
            writer
                .write_all(&body)
                .await
                .map_err(|e| GraphError::NetworkError(format!("writing downloaded content: {e}")))?;
            return Ok(written);
        }

        let mut written = 0u64;
        let mut start = 0u64;
        while start < size {
            let end = (start + CHUNK_SIZE - 1).min(size - 1);
            let headers = [("range".to_string(), format!("bytes={start}-{end}"))];
            let chunk = self
                .executor
                .execute(Method::GET, &content_path, None, &headers, CacheIntent::BypassGet, cancel)
                .await?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| GraphError::NetworkError(format!("writing downloaded chunk: {e}")))?;
            written += chunk.len() as u64;
            start = end + 1;
        }

        Ok(written)
    }

    /// POSTs a new folder named `name` under `parent_id`. The server
    /// assigns the resulting item's `id`.
    #[instrument(skip(self, cancel))]
    pub async fn mkdir(
        &self,
        name: &str,
        parent_id: &str,
        cancel: &CancellationToken,
    ) -> Result<DriveItem, GraphError> {
        let path = url::children_path_id(parent_id);
        let body = serde_json::json!({ "name": name, "folder": {} });
        let bytes = serde_json::to_vec(&body)
            .map_err(|e| GraphError::ValidationError(format!("encoding mkdir body: {e}")))?;

        let response = self
            .executor
            .execute(Method::POST, &path, Some(bytes), &[], CacheIntent::Mutation, cancel)
            .await?;
        decode_json(&response)
    }

    /// Renames and/or moves an item. On a retryable failure, sleeps one
    /// second and retries exactly once at this level (on top of whatever
    /// retries the executor's own retry engine already performed); further
    /// failures surface as-is.
    #[instrument(skip(self, cancel))]
    pub async fn rename(
        &self,
        id: &str,
        new_name: &str,
        new_parent_id: &str,
        cancel: &CancellationToken,
    ) -> Result<DriveItem, GraphError> {
        match self.try_rename(id, new_name, new_parent_id, cancel).await {
            Err(err) if err.retryable() => {
                tokio::select! {
                    () = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
                    () = cancel.cancelled() => return Err(GraphError::Cancelled),
                }
                self.try_rename(id, new_name, new_parent_id, cancel).await
            }
            other => other,
        }
    }

    async fn try_rename(
        &self,
        id: &str,
        new_name: &str,
        new_parent_id: &str,
        cancel: &CancellationToken,
    ) -> Result<DriveItem, GraphError> {
        let path = url::id_path(id);
        let body = serde_json::json!({
            "@microsoft.graph.conflictBehavior": "replace",
            "name": new_name,
            "parentReference": { "id": new_parent_id },
        });
        let bytes = serde_json::to_vec(&body)
            .map_err(|e| GraphError::ValidationError(format!("encoding rename body: {e}")))?;

        let response = self
            .executor
            .execute(Method::PATCH, &path, Some(bytes), &[], CacheIntent::Mutation, cancel)
            .await?;
        decode_json(&response)
    }

    /// Deletes an item.
    #[instrument(skip(self, cancel))]
    pub async fn remove(&self, id: &str, cancel: &CancellationToken) -> Result<(), GraphError> {
        let path = url::id_path(id);
        self.executor
            .execute(Method::DELETE, &path, None, &[], CacheIntent::Mutation, cancel)
            .await?;
        Ok(())
    }

    /// GET `/me`, decoded as a [`User`].
    #[instrument(skip(self, cancel))]
    pub async fn get_user(&self, cancel: &CancellationToken) -> Result<User, GraphError> {
        let body = self
            .executor
            .execute(Method::GET, "/me", None, &[], CacheIntent::CacheableGet, cancel)
            .await?;
        decode_json(&body)
    }

    /// GET `/me/drive`, decoded as a [`Drive`].
    #[instrument(skip(self, cancel))]
    pub async fn get_drive(&self, cancel: &CancellationToken) -> Result<Drive, GraphError> {
        let body = self
            .executor
            .execute(Method::GET, "/me/drive", None, &[], CacheIntent::CacheableGet, cancel)
            .await?;
        decode_json(&body)
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, GraphError> {
    serde_json::from_slice(body)
        .map_err(|e| GraphError::ValidationError(format!("decoding Graph response: {e}")))
}

/// An in-memory [`AsyncWrite`] sink over a caller-owned `Vec<u8>`, used to
/// give [`ItemApi::get_item_content`] a streaming implementation in terms
/// of [`ItemApi::get_item_content_stream`] without buffering twice.
struct VecWriter<'a>(&'a mut Vec<u8>);

impl AsyncWrite for VecWriter<'_> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut TaskContext<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.0.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
