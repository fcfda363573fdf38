//! The persisted OAuth2 token store: load/save, refresh, and reauth, with
//! single-flight coalescing of concurrent refresh attempts.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use odrive_core::domain::{AuthConfig, AuthRecord};
use odrive_core::ports::UserAgentHook;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::GraphError;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: i64,
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Persistent OAuth2 token state for one account, with single-flight
/// refresh: concurrent callers that all observe an expired token coalesce
/// into a single network round trip.
pub struct AuthStore {
    record: RwLock<AuthRecord>,
    refresh_lock: Mutex<()>,
}

impl AuthStore {
    /// Load a record from `path`, merging in config defaults for any field
    /// the file left empty. A missing file yields an empty, unusable record
    /// (the caller is expected to reauth).
    pub fn load(path: &Path, config: AuthConfig) -> Result<Self, GraphError> {
        let record = if path.exists() {
            let contents = fs::read_to_string(path)
                .map_err(|e| GraphError::ValidationError(format!("reading auth file: {e}")))?;
            let mut record: AuthRecord = serde_json::from_str(&contents)
                .map_err(|e| GraphError::ValidationError(format!("parsing auth file: {e}")))?;
            record.config = record.config.apply_defaults();
            record.path = path.to_path_buf();
            record
        } else {
            AuthRecord {
                config: config.apply_defaults(),
                account: String::new(),
                access_token: String::new(),
                refresh_token: String::new(),
                expires_at: 0,
                expires_in: 0,
                path: path.to_path_buf(),
            }
        };

        Ok(Self {
            record: RwLock::new(record),
            refresh_lock: Mutex::new(()),
        })
    }

    /// A snapshot of the current record.
    pub async fn snapshot(&self) -> AuthRecord {
        self.record.read().await.clone()
    }

    /// Whether the current record has both tokens populated.
    pub async fn is_usable(&self) -> bool {
        self.record.read().await.is_usable()
    }

    /// Persist the current record to disk at mode 0600, creating parent
    /// directories at mode 0700.
    #[instrument(skip(self))]
    pub async fn persist(&self) -> Result<(), GraphError> {
        let record = self.record.read().await;
        let path = record.path.clone();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| GraphError::ValidationError(format!("creating auth dir: {e}")))?;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| GraphError::ValidationError(format!("setting auth dir perms: {e}")))?;
        }

        let json = serde_json::to_string_pretty(&*record)
            .map_err(|e| GraphError::ValidationError(format!("serializing auth record: {e}")))?;
        fs::write(&path, json)
            .map_err(|e| GraphError::ValidationError(format!("writing auth file: {e}")))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
            .map_err(|e| GraphError::ValidationError(format!("setting auth file perms: {e}")))?;

        debug!(path = %path.display(), "persisted auth record");
        Ok(())
    }

    /// No-op if the access token has not expired. Otherwise posts a
    /// `refresh_token` grant to the token URL and persists the result.
    /// Concurrent callers coalesce into a single network call.
    #[instrument(skip(self, client))]
    pub async fn refresh(&self, client: &Client) -> Result<(), GraphError> {
        if self.record.read().await.expires_at > now_unix() {
            return Ok(());
        }

        let _guard = self.refresh_lock.lock().await;

        // Re-check: another waiter may have already refreshed while we
        // waited for the lock.
        if self.record.read().await.expires_at > now_unix() {
            return Ok(());
        }

        let (token_url, client_id, redirect_url, refresh_token) = {
            let record = self.record.read().await;
            (
                record.config.token_url.clone(),
                record.config.client_id.clone(),
                record.config.redirect_url.clone(),
                record.refresh_token.clone(),
            )
        };

        if refresh_token.is_empty() {
            return Err(GraphError::AuthError(
                "no refresh token available; reauth required".to_string(),
            ));
        }

        let form = [
            ("client_id", client_id.as_str()),
            ("redirect_uri", redirect_url.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = client
            .post(&token_url)
            .form(&form)
            .send()
            .await
            .map_err(GraphError::from)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::AuthError(format!(
                "refresh failed with HTTP {status}: {body}"
            )));
        }

        let token: TokenResponse = response.json().await.map_err(GraphError::from)?;
        self.apply_token_response(token).await;
        self.persist().await?;
        info!("refreshed access token");
        Ok(())
    }

    /// Runs the authorization-code flow end-to-end: builds the authorize
    /// URL, invokes `hook` to obtain a code, exchanges it for tokens, merges
    /// the result over the current record, and persists.
    #[instrument(skip(self, client, hook))]
    pub async fn reauth(
        &self,
        client: &Client,
        hook: &Arc<dyn UserAgentHook>,
    ) -> Result<(), GraphError> {
        let (authorize_url, token_url, client_id, redirect_url) = {
            let record = self.record.read().await;
            (
                record.config.authorize_url(),
                record.config.token_url.clone(),
                record.config.client_id.clone(),
                record.config.redirect_url.clone(),
            )
        };

        let code = hook
            .obtain_authorization_code(&authorize_url)
            .await
            .map_err(|e| GraphError::AuthError(format!("user agent failed: {e}")))?;

        let form = [
            ("client_id", client_id.as_str()),
            ("redirect_uri", redirect_url.as_str()),
            ("code", code.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = client
            .post(&token_url)
            .form(&form)
            .send()
            .await
            .map_err(GraphError::from)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::AuthError(format!(
                "authorization code exchange failed with HTTP {status}: {body}"
            )));
        }

        let token: TokenResponse = response.json().await.map_err(GraphError::from)?;
        self.apply_token_response(token).await;
        self.persist().await?;
        warn!("completed reauth flow");
        Ok(())
    }

    /// Directly installs a usable token set, bypassing the network
    /// exchange. For use by other modules' tests that need a working
    /// `AuthStore` without standing up a token endpoint.
    #[cfg(test)]
    pub(crate) async fn install_tokens_for_test(
        &self,
        access_token: &str,
        refresh_token: &str,
        expires_in: i64,
    ) {
        self.apply_token_response(TokenResponse {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_in,
        })
        .await;
    }

    async fn apply_token_response(&self, token: TokenResponse) {
        let mut record = self.record.write().await;
        let fresh_refresh = if token.refresh_token.is_empty() {
            record.refresh_token.clone()
        } else {
            token.refresh_token
        };
        let fresh = AuthRecord {
            config: record.config.clone(),
            account: record.account.clone(),
            access_token: token.access_token,
            refresh_token: fresh_refresh,
            expires_at: now_unix() + token.expires_in,
            expires_in: token.expires_in,
            path: record.path.clone(),
        };
        record.merge_from(fresh);
    }
}
