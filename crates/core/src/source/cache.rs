use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::RawRecordSet;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("could not read raw cache `{path}`: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("could not write raw cache `{path}`: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("could not decode raw cache `{path}`: {source}")]
    Decode { path: PathBuf, source: serde_json::Error },
    #[error("could not encode raw cache: {0}")]
    Encode(serde_json::Error),
}

/// Last good raw record set on disk, stored as
/// `{ "deal": [...], "work_order": [...] }`.
#[derive(Clone, Debug)]
pub struct RawRecordCache {
    path: PathBuf,
}

impl RawRecordCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<RawRecordSet, CacheError> {
        let raw = fs::read_to_string(&self.path)
            .map_err(|source| CacheError::Read { path: self.path.clone(), source })?;
        let mut set: RawRecordSet = serde_json::from_str(&raw)
            .map_err(|source| CacheError::Decode { path: self.path.clone(), source })?;

        // The map key is authoritative for the board a record belongs to.
        for (category, records) in set.0.iter_mut() {
            for record in records.iter_mut() {
                record.category = *category;
            }
        }
        Ok(set)
    }

    /// Writes through a sibling temp file and renames, so readers never see a
    /// half-written cache.
    pub fn store(&self, records: &RawRecordSet) -> Result<(), CacheError> {
        let encoded = serde_json::to_string_pretty(records).map_err(CacheError::Encode)?;

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| CacheError::Write { path: self.path.clone(), source })?;
        }

        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, encoded)
            .map_err(|source| CacheError::Write { path: staging.clone(), source })?;
        fs::rename(&staging, &self.path)
            .map_err(|source| CacheError::Write { path: self.path.clone(), source })
    }
}
