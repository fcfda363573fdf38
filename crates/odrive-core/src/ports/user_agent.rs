//! The hook the auth flow uses to turn a code-request URL into an
//! authorization code. Implementations range from an embedded browser to a
//! headless terminal prompt; the core is agnostic to which.

use async_trait::async_trait;

/// Errors a user-agent hook can report back to the auth flow.
#[derive(Debug, thiserror::Error)]
pub enum UserAgentError {
    #[error("user cancelled the sign-in flow")]
    Cancelled,
    #[error("user agent failed: {0}")]
    Failed(String),
}

/// Drives the interactive half of the authorization-code flow: given the
/// URL the user must approve at, returns the `code` value Graph redirected
/// back with.
#[async_trait]
pub trait UserAgentHook: Send + Sync {
    async fn obtain_authorization_code(&self, authorize_url: &str) -> Result<String, UserAgentError>;
}

/// Extracts the `code` query parameter from a redirect URL or raw query
/// string. Shared by every `UserAgentHook` implementation so the extraction
/// rule lives in one place.
#[must_use]
pub fn extract_code(redirected: &str) -> Option<String> {
    let query = redirected.split('?').nth(1).unwrap_or(redirected);
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("code=") {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_code_from_full_redirect_url() {
        let url = "https://login.microsoftonline.com/common/oauth2/nativeclient?code=M.abc123&state=xyz";
        assert_eq!(extract_code(url), Some("M.abc123".to_string()));
    }

    #[test]
    fn extracts_code_from_bare_query_string() {
        assert_eq!(extract_code("code=abc&foo=bar"), Some("abc".to_string()));
    }

    #[test]
    fn empty_code_value_is_a_hard_failure() {
        assert_eq!(extract_code("https://x/?code=&state=xyz"), None);
    }

    #[test]
    fn missing_code_parameter_returns_none() {
        assert_eq!(extract_code("https://x/?state=xyz"), None);
    }
}
