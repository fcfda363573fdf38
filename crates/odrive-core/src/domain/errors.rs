//! Domain error types
//!
//! Validation failures for the newtypes in this crate. Networking and
//! Graph-protocol errors live in `odrive-graph::GraphError`; this type only
//! covers malformed domain values.

use thiserror::Error;

/// Errors that can occur constructing or validating domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid remote path format (must start with `/`, no `..`, no `//`)
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    /// Invalid remote ID format
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Invalid hash format (expected Base64-encoded quickXorHash)
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
