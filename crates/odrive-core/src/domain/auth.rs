//! Authentication configuration and the persisted token record.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const DEFAULT_CLIENT_ID: &str = "71ae7ad8-260d-45f4-9781-744a4181f1ed";
const DEFAULT_AUTHORIZE_URL: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
const DEFAULT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";
const DEFAULT_REDIRECT_URL: &str = "https://login.microsoftonline.com/common/oauth2/nativeclient";

/// The static parameters of an OAuth2 authorization-code flow against
/// Microsoft identity platform.
///
/// Every field has a default; [`AuthConfig::apply_defaults`] fills in any
/// field the caller left empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub code_url: String,
    #[serde(default)]
    pub token_url: String,
    #[serde(default)]
    pub redirect_url: String,
}

impl AuthConfig {
    /// The built-in defaults used when a field is left empty.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            code_url: DEFAULT_AUTHORIZE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            redirect_url: DEFAULT_REDIRECT_URL.to_string(),
        }
    }

    /// Merge `self` over the built-in defaults: empty fields in `self` are
    /// replaced by the corresponding default; non-empty fields win.
    #[must_use]
    pub fn apply_defaults(mut self) -> Self {
        let defaults = Self::defaults();
        if self.client_id.is_empty() {
            self.client_id = defaults.client_id;
        }
        if self.code_url.is_empty() {
            self.code_url = defaults.code_url;
        }
        if self.token_url.is_empty() {
            self.token_url = defaults.token_url;
        }
        if self.redirect_url.is_empty() {
            self.redirect_url = defaults.redirect_url;
        }
        self
    }

    /// Build the code-request URL a user agent should be sent to.
    #[must_use]
    pub fn authorize_url(&self) -> String {
        format!(
            "{}?client_id={}&scope=user.read%20files.readwrite.all%20offline_access&response_type=code&redirect_uri={}",
            self.code_url, self.client_id, self.redirect_url
        )
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Persisted OAuth2 token state for one account.
///
/// `access_token` and `refresh_token` are either both non-empty (a usable
/// record) or the record is unusable and a caller must trigger reauth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRecord {
    #[serde(flatten)]
    pub config: AuthConfig,
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Absolute unix-seconds expiry. Computed from `expires_in` on first
    /// parse if the token response didn't carry an absolute value.
    #[serde(default)]
    pub expires_at: i64,
    /// Only populated while parsing a fresh token response; not meaningful
    /// once `expires_at` has been computed.
    #[serde(skip_serializing, default)]
    pub expires_in: i64,
    /// Where this record lives on disk. Not part of the wire format.
    #[serde(skip)]
    pub path: PathBuf,
}

impl AuthRecord {
    /// A record is usable when both tokens are present.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }

    /// Whether the access token has passed its expiry, given the current
    /// unix-seconds time.
    #[must_use]
    pub fn is_expired(&self, now_unix: i64) -> bool {
        self.expires_at <= now_unix
    }

    /// Replace this record's mutable fields with a freshly-obtained record,
    /// keeping `path`. New values always win.
    pub fn merge_from(&mut self, fresh: AuthRecord) {
        self.config = fresh.config;
        self.account = fresh.account;
        self.access_token = fresh.access_token;
        self.refresh_token = fresh.refresh_token;
        self.expires_at = fresh.expires_at;
    }
}
