//! Ephemeral face cache.
//!
//! Holds encoded face crops between detection and archival. Entries carry a
//! TTL; an expired entry reads as absent, never as stale bytes. Expiry is
//! the only removal path — nothing deletes an entry early.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

struct Entry {
    bytes: Vec<u8>,
    expires_at: Instant,
}

/// In-memory TTL cache of cropped face images, keyed by their generated
/// identifier. Safe for concurrent use from independent sessions; keys are
/// fresh UUIDs, so no two sessions ever contend on the same entry.
#[derive(Default)]
pub struct FaceCache {
    entries: DashMap<Uuid, Entry>,
}

impl FaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` under `id`, expiring `ttl` from now.
    ///
    /// Identifiers are written at most once; there is no update-in-place.
    pub fn put(&self, id: Uuid, bytes: Vec<u8>, ttl: Duration) {
        self.entries.insert(
            id,
            Entry {
                bytes,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Fetch the bytes for `id` if present and unexpired.
    ///
    /// A miss (absent or expired) is a normal outcome, not an error. The
    /// read does not consume the entry.
    pub fn get(&self, id: &Uuid) -> Option<Vec<u8>> {
        let entry = self.entries.get(id)?;
        if entry.expires_at > Instant::now() {
            Some(entry.bytes.clone())
        } else {
            None
        }
    }

    /// Drop expired entries; returns how many were removed. Driven by a
    /// periodic task in the daemon.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_roundtrip() {
        let cache = FaceCache::new();
        let id = Uuid::new_v4();
        cache.put(id, vec![1, 2, 3], Duration::from_secs(60));

        assert_eq!(cache.get(&id), Some(vec![1, 2, 3]));
    }

    #[test]
    fn get_is_not_consuming() {
        let cache = FaceCache::new();
        let id = Uuid::new_v4();
        cache.put(id, vec![9], Duration::from_secs(60));

        assert!(cache.get(&id).is_some());
        assert!(cache.get(&id).is_some());
    }

    #[test]
    fn unknown_id_is_a_miss() {
        let cache = FaceCache::new();
        assert!(cache.get(&Uuid::new_v4()).is_none());
    }

    #[test]
    fn expired_entry_reads_as_absent() {
        let cache = FaceCache::new();
        let id = Uuid::new_v4();
        cache.put(id, vec![1], Duration::from_millis(10));

        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get(&id).is_none());
    }

    #[test]
    fn purge_removes_only_expired() {
        let cache = FaceCache::new();
        let short = Uuid::new_v4();
        let long = Uuid::new_v4();
        cache.put(short, vec![1], Duration::from_millis(10));
        cache.put(long, vec![2], Duration::from_secs(60));

        std::thread::sleep(Duration::from_millis(30));
        let removed = cache.purge_expired();

        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&long).is_some());
    }
}
