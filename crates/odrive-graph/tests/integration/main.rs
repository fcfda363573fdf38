//! Integration tests for odrive-graph
//!
//! Drives a `GraphRuntime` end-to-end against the in-crate mock transport
//! (for Graph API calls) and a wiremock server (for the OAuth2 token
//! endpoint), exercising the request executor's pagination, caching,
//! reauth, rate-limit, offline, and ranged-download behavior.

mod common;

mod test_cache;
mod test_offline;
mod test_pagination;
mod test_ranged_download;
mod test_rate_limit;
mod test_reauth;
