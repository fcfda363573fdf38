//! Pure functions translating `(id, path)` tuples to Microsoft Graph
//! resource URLs. This is the only place in the crate that composes URLs by
//! hand; every other component goes through it.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// RFC 3986 path-component escape, deliberately widened to also escape `/`:
/// the colon-suffixed resource form (`/me/drive/root:<path>`) treats
/// everything after the colon as one opaque escaped path segment, and Graph
/// expects the embedded slashes to be percent-encoded rather than left as
/// path separators.
const PATH_COMPONENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'%');

pub(crate) fn escape(s: &str) -> String {
    utf8_percent_encode(s, PATH_COMPONENT).to_string()
}

/// The id-addressed resource path for a drive item, e.g.
/// `/me/drive/items/<id>`. The literal id `"root"` instead resolves to
/// `/me/drive/root`.
#[must_use]
pub fn id_path(id: &str) -> String {
    if id == "root" {
        "/me/drive/root".to_string()
    } else {
        format!("/me/drive/items/{}", escape(id))
    }
}

/// The path-addressed resource path for a drive item, e.g.
/// `/me/drive/root:<path>`. The root path `"/"` resolves to
/// `/me/drive/root`.
#[must_use]
pub fn resource_path(path: &str) -> String {
    if path == "/" {
        "/me/drive/root".to_string()
    } else {
        format!("/me/drive/root:{}", escape(path))
    }
}

/// The path-addressed children-listing path.
#[must_use]
pub fn children_path(path: &str) -> String {
    if path == "/" {
        format!("{}/children", resource_path(path))
    } else {
        format!("{}:/children", resource_path(path))
    }
}

/// The id-addressed children-listing path.
#[must_use]
pub fn children_path_id(id: &str) -> String {
    format!("{}/children", id_path(id))
}
