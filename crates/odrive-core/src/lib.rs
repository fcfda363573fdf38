//! odrive-core - Domain types and ports for the OneDrive Graph sync client
//!
//! This crate holds the provider-agnostic domain model: the remote item tree
//! (`DriveItem`, `Drive`, `User`), authentication state (`AuthConfig`,
//! `AuthRecord`), validated newtypes, and the port traits that the networking
//! layer (`odrive-graph`) needs from its collaborators (a user-agent hook for
//! the interactive login step, and a connectivity feedback bus). No HTTP code
//! lives here.

pub mod domain;
pub mod ports;

pub use domain::errors::DomainError;
