//! The remote item tree: `DriveItem`, `Drive`, `User`, and their facets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::RemoteId;

/// A reference to an item's parent, as Graph embeds it on every `DriveItem`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentReference {
    pub id: Option<String>,
    pub path: Option<String>,
    #[serde(rename = "driveId")]
    pub drive_id: Option<String>,
    #[serde(rename = "driveType")]
    pub drive_type: Option<DriveType>,
}

/// The type of drive an item or parent reference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DriveType {
    Personal,
    Business,
    DocumentLibrary,
}

/// Present on folder items; absent on files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FolderFacet {
    #[serde(rename = "childCount", default)]
    pub child_count: u64,
}

/// Content hashes Graph reports for a file's current bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileHashes {
    #[serde(rename = "sha1Hash")]
    pub sha1_hash: Option<String>,
    #[serde(rename = "quickXorHash")]
    pub quick_xor_hash: Option<String>,
}

/// Present on file items; absent on folders.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileFacet {
    #[serde(default)]
    pub hashes: FileHashes,
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
}

/// Present on a tombstoned item; its value is the deletion reason, which
/// this client treats as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedFacet {
    pub state: Option<String>,
}

/// Server-side policy applied when a create would collide with a sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictBehavior {
    Replace,
    Rename,
    Fail,
}

impl Default for ConflictBehavior {
    fn default() -> Self {
        Self::Replace
    }
}

/// The canonical remote entity: a file or folder, addressed by stable `id`
/// or by path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveItem {
    pub id: RemoteId,
    pub name: String,
    #[serde(default)]
    pub size: i64,
    #[serde(rename = "eTag")]
    pub e_tag: Option<String>,
    #[serde(rename = "lastModifiedDateTime")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(rename = "parentReference")]
    pub parent_reference: Option<ParentReference>,
    pub folder: Option<FolderFacet>,
    pub file: Option<FileFacet>,
    pub deleted: Option<DeletedFacet>,
}

impl DriveItem {
    /// An item is a directory iff the `folder` facet is present.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.folder.is_some()
    }

    /// An item is a regular file for read-path purposes when neither facet
    /// is present, or the file facet is present.
    #[must_use]
    pub fn is_file(&self) -> bool {
        !self.is_directory()
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted.is_some()
    }

    /// Byte size, normalized: some personal drives report negative sizes for
    /// directories, which this client treats as zero.
    #[must_use]
    pub fn normalized_size(&self) -> u64 {
        if self.size < 0 {
            0
        } else {
            self.size as u64
        }
    }

    /// The item's `quickXorHash`, if it carries a file facet with one.
    #[must_use]
    pub fn quick_xor_hash(&self) -> Option<&str> {
        self.file
            .as_ref()
            .and_then(|f| f.hashes.quick_xor_hash.as_deref())
    }

    /// Case-insensitive compare of `candidate` against this item's
    /// `quickXorHash`. A missing facet is never considered a match.
    #[must_use]
    pub fn matches_quick_xor_hash(&self, candidate: &str) -> bool {
        match self.quick_xor_hash() {
            Some(hash) => hash.eq_ignore_ascii_case(candidate),
            None => false,
        }
    }

    /// Exact-string compare of `candidate` against this item's `eTag`. An
    /// empty candidate, or a missing `eTag`, is never considered a match.
    #[must_use]
    pub fn matches_etag(&self, candidate: &str) -> bool {
        if candidate.is_empty() {
            return false;
        }
        match &self.e_tag {
            Some(tag) if !tag.is_empty() => tag == candidate,
            _ => false,
        }
    }
}

/// A page of a drive's children: items plus an optional continuation link.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriveChildren {
    #[serde(rename = "value")]
    pub items: Vec<DriveItem>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
    #[serde(rename = "@odata.deltaLink")]
    pub delta_link: Option<String>,
}

/// Remote quota state classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuotaState {
    Normal,
    Nearing,
    Critical,
    Exceeded,
}

/// Drive-level storage quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub total: u64,
    pub used: u64,
    pub remaining: u64,
    pub deleted: u64,
    #[serde(rename = "fileCount", default)]
    pub file_count: u64,
    pub state: QuotaState,
}

/// Drive-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drive {
    pub id: String,
    #[serde(rename = "driveType")]
    pub drive_type: DriveType,
    pub quota: Quota,
}

/// The signed-in account. Only the principal name is needed to label the
/// mount and route per-account token files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "userPrincipalName")]
    pub user_principal_name: String,
}
