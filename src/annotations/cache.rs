//! Read-through cache over an annotation store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use super::store::AnnotationStore;
use crate::error::{PipelineError, Result};
use crate::models::AnnotationRecord;

struct CacheEntry {
    records: Arc<Vec<AnnotationRecord>>,
    loaded_at: Instant,
}

/// Caches `load_all` for `ttl`. Every successful write drops the cached copy,
/// so readers never see a store state older than their own last write.
///
/// Appends are checked against the current view and a second annotation
/// for the same (village_name, ward_name) is rejected.
pub struct CachedAnnotationStore<S> {
    inner: S,
    ttl: Duration,
    entry: Mutex<Option<CacheEntry>>,
}

impl<S: AnnotationStore> CachedAnnotationStore<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn lock(&self) -> MutexGuard<'_, Option<CacheEntry>> {
        self.entry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh(&self, entry: &mut Option<CacheEntry>) -> Result<Arc<Vec<AnnotationRecord>>> {
        if let Some(cached) = entry.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&cached.records));
            }
        }

        let records = Arc::new(self.inner.load_all()?);
        debug!("Annotation cache refreshed with {} records", records.len());
        *entry = Some(CacheEntry {
            records: Arc::clone(&records),
            loaded_at: Instant::now(),
        });
        Ok(records)
    }

    /// Current annotations, from the cache while it is fresh
    pub fn annotations(&self) -> Result<Arc<Vec<AnnotationRecord>>> {
        let mut entry = self.lock();
        self.fresh(&mut entry)
    }

    pub fn invalidate(&self) {
        *self.lock() = None;
    }

    pub fn is_mapped(&self, village_name: &str, ward_name: &str) -> Result<bool> {
        Ok(self
            .annotations()?
            .iter()
            .any(|a| a.same_village(village_name, ward_name)))
    }
}

impl<S: AnnotationStore> AnnotationStore for CachedAnnotationStore<S> {
    fn load_all(&self) -> Result<Vec<AnnotationRecord>> {
        Ok(self.annotations()?.as_ref().clone())
    }

    /// The lock is held from the duplicate check through the write
    fn append(&self, record: &AnnotationRecord) -> Result<()> {
        let mut entry = self.lock();
        let mapped = self
            .fresh(&mut entry)?
            .iter()
            .any(|a| a.same_village(&record.village_name, &record.ward_name));
        if mapped {
            return Err(PipelineError::DuplicateAnnotation {
                village: record.village_name.clone(),
                ward: record.ward_name.clone(),
            });
        }
        let result = self.inner.append(record);
        *entry = None;
        result
    }

    fn delete(&self, village_name: &str, ward_name: &str) -> Result<bool> {
        let mut entry = self.lock();
        let result = self.inner.delete(village_name, ward_name);
        *entry = None;
        result
    }
}
