use std::io;

use async_trait::async_trait;
use boardsight_core::domain::{BoardCategory, RawRecord, RawRecordSet};
use boardsight_core::snapshot::DataOrigin;
use boardsight_core::source::{BoardSource, CacheError, RawRecordCache, SourceError};

/// Serves boards from the on-disk raw cache. File access runs on the
/// blocking pool.
#[derive(Clone, Debug)]
pub struct CachedSource {
    cache: RawRecordCache,
}

impl CachedSource {
    pub fn new(cache: RawRecordCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl BoardSource for CachedSource {
    fn origin(&self) -> DataOrigin {
        DataOrigin::Cache
    }

    async fn fetch(&self, category: BoardCategory) -> Result<Vec<RawRecord>, SourceError> {
        let set = load_cache(&self.cache)
            .await
            .map_err(|error| SourceError::SourceUnavailable(error.to_string()))?;
        if !set.0.contains_key(&category) {
            return Err(SourceError::SourceUnavailable(format!(
                "raw cache `{}` has no `{category}` board",
                self.cache.path().display()
            )));
        }
        Ok(set.records(category).to_vec())
    }
}

pub(crate) async fn load_cache(cache: &RawRecordCache) -> Result<RawRecordSet, CacheError> {
    let cache = cache.clone();
    let path = cache.path().to_path_buf();
    match tokio::task::spawn_blocking(move || cache.load()).await {
        Ok(result) => result,
        Err(join) => Err(CacheError::Read { path, source: io::Error::other(join.to_string()) }),
    }
}

pub(crate) async fn store_cache(cache: &RawRecordCache, records: RawRecordSet) -> Result<(), CacheError> {
    let cache = cache.clone();
    let path = cache.path().to_path_buf();
    match tokio::task::spawn_blocking(move || cache.store(&records)).await {
        Ok(result) => result,
        Err(join) => Err(CacheError::Write { path, source: io::Error::other(join.to_string()) }),
    }
}
