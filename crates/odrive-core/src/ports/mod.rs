//! Port definitions: the interfaces the Graph sync layer needs from its
//! collaborators, implemented outside this crate.
//!
//! - [`user_agent::UserAgentHook`] - turns an authorize URL into a code
//! - [`network::NetworkObserver`] - receives connectivity transitions

pub mod network;
pub mod user_agent;

pub use network::{ConnectivityStatus, NetworkFeedbackBus, NetworkObserver};
pub use user_agent::{extract_code, UserAgentError, UserAgentHook};
