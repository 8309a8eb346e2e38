use std::sync::{Mutex, MutexGuard, PoisonError};

use ahash::AHashMap;
use arrow::record_batch::RecordBatch;
use log::debug;

use super::{Upload, load};
use crate::core::DashError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub upload_id: u64,
    pub sheet: Option<String>,
}

impl CacheKey {
    pub fn new(upload: &Upload, sheet: Option<&str>) -> Self {
        Self {
            upload_id: upload.id(),
            sheet: sheet.map(str::to_string),
        }
    }
}

/// Process-wide memo of parsed uploads, keyed by upload identity rather than
/// content. Entries stay until [`LoaderCache::invalidate`] drops them.
#[derive(Default)]
pub struct LoaderCache {
    tables: Mutex<AHashMap<CacheKey, RecordBatch>>,
}

impl LoaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, AHashMap<CacheKey, RecordBatch>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached table for `(upload, sheet)`, parsing it on a miss.
    /// Parse failures are not cached.
    pub fn get_or_load(&self, upload: &Upload, sheet: Option<&str>) -> Result<RecordBatch, DashError> {
        let key = CacheKey::new(upload, sheet);

        if let Some(batch) = self.tables().get(&key) {
            debug!("loader cache hit for '{}' (sheet {:?})", upload.name(), sheet);
            return Ok(batch.clone());
        }

        debug!("loader cache miss for '{}' (sheet {:?})", upload.name(), sheet);
        let batch = load(upload, sheet)?;
        self.tables().insert(key, batch.clone());
        Ok(batch)
    }

    /// Drops every cached sheet of an upload.
    pub fn invalidate(&self, upload_id: u64) {
        let mut tables = self.tables();
        let before = tables.len();
        tables.retain(|key, _| key.upload_id != upload_id);
        debug!(
            "loader cache invalidated {} entries for upload {}",
            before - tables.len(),
            upload_id
        );
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.tables().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tables().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_upload(body: &str) -> Upload {
        Upload::new("data.csv", body.to_string()).unwrap()
    }

    #[test]
    fn test_second_load_is_served_from_cache() {
        let cache = LoaderCache::new();
        let upload = csv_upload("a,b\n1,2\n3,4\n");

        let first = cache.get_or_load(&upload, None).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&CacheKey::new(&upload, None)));

        let second = cache.get_or_load(&upload, None).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(first, second);
        // Same underlying buffers, not a re-parse.
        assert!(std::sync::Arc::ptr_eq(first.column(0), second.column(0)));
    }

    #[test]
    fn test_identity_not_content() {
        let cache = LoaderCache::new();
        let a = csv_upload("a\n1\n");
        let b = csv_upload("a\n1\n");

        cache.get_or_load(&a, None).unwrap();
        cache.get_or_load(&b, None).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_invalidate_drops_only_that_upload() {
        let cache = LoaderCache::new();
        let a = csv_upload("a\n1\n");
        let b = csv_upload("b\n2\n");

        cache.get_or_load(&a, None).unwrap();
        cache.get_or_load(&b, None).unwrap();
        cache.invalidate(a.id());

        assert_eq!(cache.len(), 1);
        assert!(!cache.contains(&CacheKey::new(&a, None)));
        assert!(cache.contains(&CacheKey::new(&b, None)));
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let cache = LoaderCache::new();
        let upload = csv_upload("");

        assert!(cache.get_or_load(&upload, None).is_err());
        assert!(cache.is_empty());
    }
}
