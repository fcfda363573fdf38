//! The owned handle bundling one account's session, auth store, cache,
//! retry queue, and item API into a single value a caller constructs and
//! holds, rather than reaching through process-wide statics.

use std::path::Path;
use std::sync::Arc;

use odrive_core::domain::AuthConfig;
use odrive_core::ports::UserAgentHook;

use crate::auth::AuthStore;
use crate::cache::ResponseCache;
use crate::executor::Executor;
use crate::items::ItemApi;
use crate::retry::RetryQueue;
use crate::transport::{HttpSession, Transport};
use crate::GraphError;

/// One account's full Graph client: the HTTP session, the persisted auth
/// store, the response cache, the retry queue, and the typed item API built
/// on top of them. Constructing one owns everything it needs; nothing here
/// is reached through a global.
pub struct GraphRuntime {
    session: Arc<HttpSession>,
    auth: Arc<AuthStore>,
    cache: Arc<ResponseCache>,
    retry_queue: Arc<RetryQueue>,
    items: ItemApi,
}

impl GraphRuntime {
    /// Loads the auth record at `auth_path` (creating an empty, unusable one
    /// if absent) and wires up a live-transport session, a fresh response
    /// cache, and a fresh retry queue around it.
    pub fn load(
        auth_path: &Path,
        auth_config: AuthConfig,
        user_agent: Arc<dyn UserAgentHook>,
    ) -> Result<Self, GraphError> {
        let session = Arc::new(HttpSession::new());
        let auth = Arc::new(AuthStore::load(auth_path, auth_config)?);
        let cache = Arc::new(ResponseCache::new());
        let retry_queue = Arc::new(RetryQueue::new());

        let executor = Executor::new(
            session.clone(),
            auth.clone(),
            cache.clone(),
            retry_queue.clone(),
            user_agent,
        );

        Ok(Self {
            session,
            auth,
            cache,
            retry_queue,
            items: ItemApi::new(executor),
        })
    }

    /// Builds a runtime from already-constructed parts, for tests that need
    /// an isolated runtime wired to a mock transport instead of a live one.
    #[must_use]
    pub fn from_parts(
        session: Arc<HttpSession>,
        auth: Arc<AuthStore>,
        cache: Arc<ResponseCache>,
        retry_queue: Arc<RetryQueue>,
        user_agent: Arc<dyn UserAgentHook>,
    ) -> Self {
        let executor = Executor::new(
            session.clone(),
            auth.clone(),
            cache.clone(),
            retry_queue.clone(),
            user_agent,
        );

        Self {
            session,
            auth,
            cache,
            retry_queue,
            items: ItemApi::new(executor),
        }
    }

    /// The typed item API: `get_item`, `get_item_children`,
    /// `get_item_content`, `mkdir`, `rename`, `remove`, `get_user`,
    /// `get_drive`.
    #[must_use]
    pub fn items(&self) -> &ItemApi {
        &self.items
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<AuthStore> {
        &self.auth
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    #[must_use]
    pub fn retry_queue(&self) -> &Arc<RetryQueue> {
        &self.retry_queue
    }

    /// Swap the session's transport, e.g. to `mock::MockTransport` in tests.
    pub async fn set_transport(&self, transport: Arc<dyn Transport>) {
        self.session.set_transport(transport).await;
    }

    pub async fn set_offline(&self, offline: bool) {
        self.session.set_offline(offline).await;
    }

    pub async fn is_offline(&self) -> bool {
        self.session.is_offline().await
    }
}
