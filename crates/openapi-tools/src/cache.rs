//! On-disk cache of downloaded `OpenAPI` documents, one file per target version:
//! `{root}/{vX.Y.Z}/openapi.yaml`.
//!
//! Freshness is judged from the file's modification time. Concurrent processes sharing the
//! cache may race on `store`; the last rename wins and readers never observe a partial file.

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::version::Version;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const SPEC_FILE_NAME: &str = "openapi.yaml";

#[derive(Debug, Clone)]
pub struct SpecCache {
    root: PathBuf,
    ttl: Duration,
}

impl SpecCache {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            root: root.into(),
            ttl,
        }
    }

    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.root.clone(), config.ttl)
    }

    #[must_use]
    pub fn entry_path(&self, version: &Version) -> PathBuf {
        self.root.join(version.to_string()).join(SPEC_FILE_NAME)
    }

    /// Read the cached spec for `version` if it is still fresh.
    ///
    /// # Errors
    ///
    /// See [`SpecCache::load_at`].
    pub fn load(&self, version: &Version) -> Result<Vec<u8>, CacheError> {
        self.load_at(version, SystemTime::now())
    }

    /// Read the cached spec for `version`, judging freshness against `now`.
    ///
    /// An entry exactly `ttl` old is still fresh. Modification times in the future count as
    /// age zero.
    ///
    /// # Errors
    ///
    /// - [`CacheError::NotFound`] if there is no entry.
    /// - [`CacheError::Outdated`] if the entry is older than the TTL.
    /// - [`CacheError::Io`] if the entry exists but cannot be read.
    pub fn load_at(&self, version: &Version, now: SystemTime) -> Result<Vec<u8>, CacheError> {
        let path = self.entry_path(version);
        let meta = match std::fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CacheError::NotFound { path });
            }
            Err(e) => return Err(CacheError::Io(e)),
        };

        let age = now
            .duration_since(meta.modified()?)
            .unwrap_or(Duration::ZERO);
        if age > self.ttl {
            return Err(CacheError::Outdated { path, age });
        }

        Ok(std::fs::read(&path)?)
    }

    /// Persist `spec` as the cache entry for `version`, creating directories as needed.
    ///
    /// The bytes are written to a sibling temp file and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory, temp file, or rename fails.
    pub fn store(&self, version: &Version, spec: &[u8]) -> Result<PathBuf, CacheError> {
        let path = self.entry_path(version);
        let dir = path
            .parent()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);
        std::fs::create_dir_all(&dir)?;

        let tmp = dir.join(format!(".{SPEC_FILE_NAME}.{}.tmp", std::process::id()));
        let written = std::fs::File::create(&tmp).and_then(|mut f| {
            f.write_all(spec)?;
            f.sync_all()
        });
        if let Err(e) = written.and_then(|()| std::fs::rename(&tmp, &path)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(CacheError::Io(e));
        }

        tracing::debug!(path = %path.display(), bytes = spec.len(), "Cached OpenAPI spec");
        Ok(path)
    }
}
