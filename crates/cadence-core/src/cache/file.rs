//! Directory-backed cache store.
//!
//! # Layout
//!
//! ```text
//! .cadence/cache/
//!   activities.json   # local completion events
//!   routines.json     # last routine list from the server
//!   cache.lock        # advisory lock held across read-modify-write
//! ```
//!
//! Writes go to `<stem>.json.tmp` and are renamed over the target, so a
//! reader never observes a half-written document.

use std::fs;
use std::io::{self, Write as IoWrite};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::trace;

use super::{CacheError, CacheKey, LocalCache};
use crate::lock::CacheLock;

/// Default wait for the cache lock before giving up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(500);

/// JSON-file cache store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    lock_timeout: Duration,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn path_for(&self, key: CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.stem()))
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join("cache.lock")
    }

    fn read(path: &Path) -> Result<Option<String>, CacheError> {
        match fs::read_to_string(path) {
            Ok(doc) => Ok(Some(doc)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn write_atomic(path: &Path, doc: &str) -> Result<(), CacheError> {
        let tmp = path.with_extension("json.tmp");
        let io_err = |source: io::Error| CacheError::Io {
            path: tmp.clone(),
            source,
        };
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(doc.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);
        fs::rename(&tmp, path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl LocalCache for FileCache {
    fn load(&self, key: CacheKey) -> Result<Option<String>, CacheError> {
        Self::read(&self.path_for(key))
    }

    fn modify(
        &self,
        key: CacheKey,
        f: &mut dyn FnMut(Option<String>) -> Result<String, CacheError>,
    ) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let _guard = CacheLock::acquire(&self.lock_path(), self.lock_timeout)?;

        let path = self.path_for(key);
        let next = f(Self::read(&path)?)?;
        Self::write_atomic(&path, &next)?;
        trace!(path = %path.display(), bytes = next.len(), "cache document written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::LockError;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileCache) {
        let tmp = TempDir::new().expect("tempdir");
        let cache = FileCache::new(tmp.path().join(".cadence").join("cache"));
        (tmp, cache)
    }

    #[test]
    fn missing_file_loads_as_none() {
        let (_tmp, cache) = setup();
        assert!(cache.load(CacheKey::Activities).expect("load").is_none());
    }

    #[test]
    fn store_creates_directory_and_file() {
        let (_tmp, cache) = setup();
        cache
            .store(CacheKey::Routines, "[]".to_string())
            .expect("store");
        assert!(cache.path_for(CacheKey::Routines).exists());
        assert!(!cache.path_for(CacheKey::Routines).with_extension("json.tmp").exists());
        assert_eq!(
            cache.load(CacheKey::Routines).expect("load").as_deref(),
            Some("[]")
        );
    }

    #[test]
    fn failed_update_leaves_previous_document() {
        let (_tmp, cache) = setup();
        cache
            .store(CacheKey::Activities, "[1]".to_string())
            .expect("store");
        let result = cache.modify(CacheKey::Activities, &mut |_| Err(CacheError::NotApplied));
        assert!(result.is_err());
        assert_eq!(
            cache.load(CacheKey::Activities).expect("load").as_deref(),
            Some("[1]")
        );
    }

    #[test]
    fn held_lock_times_out_modify() {
        let (_tmp, cache) = setup();
        let cache = cache.with_lock_timeout(Duration::from_millis(20));
        fs::create_dir_all(cache.dir()).expect("mkdir");
        let _held = CacheLock::acquire(&cache.lock_path(), Duration::from_millis(50)).expect("lock");
        let err = cache
            .store(CacheKey::Activities, "[]".to_string())
            .expect_err("contended");
        assert!(matches!(err, CacheError::Lock(LockError::Timeout { .. })));
    }

    #[test]
    fn threads_sharing_the_directory_serialize_updates() {
        let (_tmp, cache) = setup();
        let cache = Arc::new(cache.with_lock_timeout(Duration::from_secs(5)));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for _ in 0..10 {
                        cache
                            .modify(CacheKey::Activities, &mut |doc| {
                                let n: u32 = doc.as_deref().unwrap_or("0").parse().unwrap_or(0);
                                Ok((n + 1).to_string())
                            })
                            .expect("modify");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }
        assert_eq!(
            cache.load(CacheKey::Activities).expect("load").as_deref(),
            Some("40")
        );
    }
}
