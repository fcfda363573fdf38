//! The TTL response cache and its prefix-based invalidation rules.

use std::time::{Duration, Instant};

use dashmap::DashMap;

const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct Entry {
    body: Vec<u8>,
    inserted_at: Instant,
}

/// A keyed cache of GET response bodies, keyed by resource URL, with a
/// time-to-live and prefix-based invalidation on mutation.
pub struct ResponseCache {
    entries: DashMap<String, Entry>,
    ttl: Duration,
}

impl ResponseCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Returns the cached body for `key` if present and not past its TTL.
    /// An expired entry is treated as a miss (and lazily evicted).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(entry) = self.entries.get(key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.body.clone());
            }
        }
        self.entries.remove(key);
        None
    }

    /// Insert or replace the cached body for `key`.
    pub fn put(&self, key: String, body: Vec<u8>) {
        self.entries.insert(
            key,
            Entry {
                body,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Remove the exact key.
    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Remove every key starting with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.entries
            .retain(|key, _| !key.starts_with(prefix));
    }

    /// Applies the mutation-invalidation rules for a successful non-GET
    /// against resource `resource`.
    pub fn invalidate_for_mutation(&self, resource: &str) {
        self.invalidate(resource);

        if let Some(items_pos) = resource.find("/items/") {
            let parent_prefix = &resource[..items_pos];
            self.invalidate_prefix(&format!("{parent_prefix}/children"));
        }

        if resource == "/me/drive/root" || resource.starts_with("/me/drive/root/") {
            self.invalidate_prefix("/me/drive/root/children");
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_miss_then_put_then_hit() {
        let cache = ResponseCache::new();
        assert!(cache.get("/me/drive/root").is_none());
        cache.put("/me/drive/root".to_string(), b"body".to_vec());
        assert_eq!(cache.get("/me/drive/root"), Some(b"body".to_vec()));
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let cache = ResponseCache::with_ttl(Duration::from_millis(1));
        cache.put("/me".to_string(), b"x".to_vec());
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get("/me").is_none());
    }

    #[test]
    fn exact_key_invalidation() {
        let cache = ResponseCache::new();
        cache.put("/me/drive/items/abc".to_string(), b"x".to_vec());
        cache.invalidate_for_mutation("/me/drive/items/abc");
        assert!(cache.get("/me/drive/items/abc").is_none());
    }

    #[test]
    fn mutation_on_item_invalidates_prefix_derived_from_text_before_items_segment() {
        // Rule 2 derives the prefix lexically from the mutated resource's
        // own URL, not from the item's actual parent id.
        let cache = ResponseCache::new();
        cache.put("/me/drive/children".to_string(), b"listing".to_vec());
        cache.put(
            "/me/drive/children?skiptoken=10".to_string(),
            b"page2".to_vec(),
        );

        cache.invalidate_for_mutation("/me/drive/items/child-id");

        assert!(cache.get("/me/drive/children").is_none());
        assert!(cache.get("/me/drive/children?skiptoken=10").is_none());
    }

    #[test]
    fn mutation_on_root_invalidates_root_children_listing() {
        let cache = ResponseCache::new();
        cache.put(
            "/me/drive/root/children".to_string(),
            b"root-listing".to_vec(),
        );
        cache.invalidate_for_mutation("/me/drive/root");
        assert!(cache.get("/me/drive/root/children").is_none());
    }

    #[test]
    fn unrelated_keys_survive_invalidation() {
        // Rule 2's prefix is derived lexically from the text before the
        // mutated resource's own "/items/" segment, not from any other
        // item's parent id, so a sibling's cached listing is untouched.
        let cache = ResponseCache::new();
        cache.put("/me/drive/items/other/children".to_string(), b"x".to_vec());
        cache.invalidate_for_mutation("/me/drive/items/child-id");
        assert_eq!(
            cache.get("/me/drive/items/other/children"),
            Some(b"x".to_vec())
        );
    }
}
