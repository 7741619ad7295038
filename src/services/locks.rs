//! Per-catalog mutual exclusion.

use dashmap::DashMap;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<PathBuf, Arc<Mutex<()>>>;

/// One async mutex per catalog file.
///
/// Every read-modify-write cycle against a catalog runs while holding that
/// catalog's guard. When both kinds are needed the bucket catalog is locked
/// before the object catalog. Entries only live while someone holds or waits
/// for them, so the map stays as small as the set of busy catalogs.
#[derive(Debug, Default)]
pub struct CatalogLocks {
    inner: Arc<LockMap>,
}

/// Exclusive access to one catalog; released on drop.
#[derive(Debug)]
pub struct CatalogGuard {
    guard: Option<OwnedMutexGuard<()>>,
    path: PathBuf,
    map: Arc<LockMap>,
}

impl CatalogLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the catalog at `path`.
    pub async fn lock(&self, path: &Path) -> CatalogGuard {
        // Clone the Arc out so the DashMap shard guard is dropped before awaiting.
        let mutex = self
            .inner
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        CatalogGuard {
            guard: Some(mutex.lock_owned().await),
            path: path.to_path_buf(),
            map: self.inner.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }
}

impl Drop for CatalogGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The map's own Arc is the only one left: nobody holds or awaits it.
        // `remove_if` runs under the shard lock, the same one `lock` clones under.
        self.map
            .remove_if(&self.path, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
