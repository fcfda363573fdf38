//! Domain entities and validated newtypes for the remote item tree and
//! authentication state.

pub mod auth;
pub mod errors;
pub mod item;
pub mod newtypes;

pub use auth::{AuthConfig, AuthRecord};
pub use errors::DomainError;
pub use item::{
    ConflictBehavior, DeletedFacet, Drive, DriveChildren, DriveItem, DriveType, FileFacet,
    FileHashes, FolderFacet, ParentReference, Quota, QuotaState, User,
};
pub use newtypes::{FileHash, RemoteId, RemotePath};
