//! Memoized store for font and CMap resources.
//!
//! Resources are immutable files under a root directory (`cmaps/`,
//! `standard_fonts/`). Each is read on first request and kept until
//! [`ResourceCache::clear`] is called. Two tasks racing on the same name both
//! read the same bytes, so whichever insert wins is correct.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Shared, lazily populated resource store
#[derive(Debug, Default)]
pub struct ResourceCache {
    directory: Option<PathBuf>,
    entries: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl ResourceCache {
    /// Create a cache rooted at `directory`; `None` disables lookups
    pub fn new(directory: Option<PathBuf>) -> Self {
        Self {
            directory,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Root directory, if configured
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// Fetch a resource by relative name, e.g. `cmaps/UniGB-UCS2-H`
    ///
    /// Returns `Ok(None)` when no directory is configured or the file does
    /// not exist.
    pub fn get(&self, name: &str) -> std::io::Result<Option<Arc<[u8]>>> {
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(bytes) = entries.get(name) {
                return Ok(Some(Arc::clone(bytes)));
            }
        }

        let Some(directory) = &self.directory else {
            return Ok(None);
        };
        if name.split(['/', '\\']).any(|part| part == "..") {
            return Ok(None);
        }

        let path = directory.join(name);
        if !path.is_file() {
            return Ok(None);
        }

        let bytes: Arc<[u8]> = std::fs::read(&path)?.into();
        tracing::debug!(resource = name, size = bytes.len(), "Loaded resource");

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let stored = entries.entry(name.to_string()).or_insert(bytes);
        Ok(Some(Arc::clone(stored)))
    }

    /// Number of memoized resources
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every memoized resource
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lazy_load_and_memoize() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("cmaps")).unwrap();
        std::fs::write(dir.path().join("cmaps/Test-H"), b"cmap bytes").unwrap();

        let cache = ResourceCache::new(Some(dir.path().to_path_buf()));
        assert!(cache.is_empty());

        let first = cache.get("cmaps/Test-H").unwrap().unwrap();
        assert_eq!(&*first, b"cmap bytes");
        assert_eq!(cache.len(), 1);

        // Served from memory even after the file is gone
        std::fs::remove_file(dir.path().join("cmaps/Test-H")).unwrap();
        let second = cache.get("cmaps/Test-H").unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("cmaps/Test-H").unwrap().is_none());
    }

    #[test]
    fn test_missing_resources() {
        let cache = ResourceCache::new(None);
        assert!(cache.get("cmaps/Anything").unwrap().is_none());

        let dir = tempdir().unwrap();
        let cache = ResourceCache::new(Some(dir.path().to_path_buf()));
        assert!(cache.get("cmaps/Nope").unwrap().is_none());
        assert!(cache.get("../etc/passwd").unwrap().is_none());
    }
}
