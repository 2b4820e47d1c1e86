//! The disk-backed LRU cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use ferrite_core::config::CacheConfig;
use ferrite_core::ports::ObjectFetcher;
use ferrite_core::{Error, ObjectKey, Result};
use futures::StreamExt;
use lru::LruCache;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Occupancy and traffic counters, exposed on the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
    pub max_bytes: u64,
    pub hits: u64,
    pub misses: u64,
}

/// Bookkeeping guarded by one short-lived lock. File I/O never happens
/// while this is held.
struct CacheState {
    /// Live entries, most-recently-used first, valued by on-disk byte size.
    index: LruCache<ObjectKey, u64>,
    /// Sum of the sizes in `index`. Never exceeds the configured cap after
    /// an admission completes.
    total_bytes: u64,
    /// Keys with a fetch in progress. Requesters for the same key wait on
    /// the receiver instead of issuing a second remote call.
    inflight: HashMap<ObjectKey, watch::Receiver<()>>,
    hits: u64,
    misses: u64,
}

/// Maps object keys to local files, fetching misses from the remote store
/// and evicting strictly least-recently-used entries to honor the on-disk
/// byte cap.
///
/// Callers receive a path and a size, never a handle into the index. At
/// construction the cache directory is scanned so entries from a previous
/// run stay under the cap: stray `.tmp` files are deleted and finalized
/// files are re-indexed in modification-time order.
pub struct ObjectStoreCache {
    cache_dir: PathBuf,
    max_disk_bytes: u64,
    fetcher: Arc<dyn ObjectFetcher>,
    state: Mutex<CacheState>,
}

impl ObjectStoreCache {
    pub fn new(config: &CacheConfig, fetcher: Arc<dyn ObjectFetcher>) -> Result<Self> {
        std::fs::create_dir_all(&config.dir)?;

        let cache = Self {
            cache_dir: config.dir.clone(),
            max_disk_bytes: config.max_disk_bytes,
            fetcher,
            state: Mutex::new(CacheState {
                index: LruCache::unbounded(),
                total_bytes: 0,
                inflight: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
        };
        cache.scan_existing()?;
        Ok(cache)
    }

    /// Return the local path and size for `key`, fetching from the remote
    /// store on a miss.
    ///
    /// A hit promotes the key to most-recently-used and makes no remote
    /// call. Concurrent misses for the same key collapse to one remote
    /// call; misses for different keys fetch in parallel. A failed fetch
    /// leaves no trace: no index entry, no temporary file, total unchanged.
    pub async fn get_or_fetch(&self, key: &ObjectKey) -> Result<(PathBuf, u64)> {
        let final_path = self.cache_dir.join(key.relative_path());

        loop {
            let plan = {
                let mut state = self.state.lock().unwrap();

                // A fetch in progress wins over everything else: the index
                // may already name this key while its file is still being
                // finalized.
                if let Some(rx) = state.inflight.get(key) {
                    Plan::Wait(rx.clone())
                } else if let Some(&size) = state.index.peek(key) {
                    if final_path.exists() {
                        state.index.promote(key);
                        state.hits += 1;
                        debug!(%key, size, "cache hit");
                        return Ok((final_path, size));
                    }
                    // The file vanished out from under the index (external
                    // deletion). Drop the entry and fall through to a fetch.
                    warn!(%key, "indexed file missing on disk, refetching");
                    state.index.pop(key);
                    state.total_bytes = state.total_bytes.saturating_sub(size);
                    state.misses += 1;
                    Plan::Lead(self.mark_inflight(&mut state, key))
                } else {
                    state.misses += 1;
                    Plan::Lead(self.mark_inflight(&mut state, key))
                }
            };

            match plan {
                Plan::Wait(mut rx) => {
                    // Wakes when the leader drops its end, success or not.
                    // Either way, re-run the lookup; a waiter whose leader
                    // failed becomes the next leader.
                    let _ = rx.changed().await;
                }
                Plan::Lead(tx) => {
                    let guard = InflightGuard {
                        cache: self,
                        key: key.clone(),
                        _tx: tx,
                    };
                    let result = self.populate(key, &final_path).await;
                    drop(guard);
                    return result;
                }
            }
        }
    }

    /// The configured cache directory.
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Current occupancy and traffic counters.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock().unwrap();
        CacheStats {
            entries: state.index.len(),
            total_bytes: state.total_bytes,
            max_bytes: self.max_disk_bytes,
            hits: state.hits,
            misses: state.misses,
        }
    }

    fn mark_inflight(&self, state: &mut CacheState, key: &ObjectKey) -> watch::Sender<()> {
        let (tx, rx) = watch::channel(());
        state.inflight.insert(key.clone(), rx);
        tx
    }

    /// Miss path: stream the remote object into a temporary file, make room
    /// under the cap, and atomically move it to its final path.
    async fn populate(&self, key: &ObjectKey, final_path: &Path) -> Result<(PathBuf, u64)> {
        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // No partial file may survive a failed or abandoned transfer. The
        // guard also covers the leader being dropped mid-download.
        let mut tmp = TmpFileGuard::new(tmp_path_for(final_path));

        let size = self.download(key, tmp.path()).await?;

        // Eviction selection and admission accounting happen in one
        // critical section so the cap holds even with fetches for other
        // keys completing concurrently. The file lands at its final path
        // before the in-flight marker is removed, so the early index entry
        // is never observed.
        let evicted = {
            let mut state = self.state.lock().unwrap();
            let mut evicted = Vec::new();
            while state.total_bytes + size > self.max_disk_bytes {
                let Some((old_key, old_size)) = state.index.pop_lru() else {
                    break;
                };
                state.total_bytes = state.total_bytes.saturating_sub(old_size);
                evicted.push((old_key, old_size));
            }
            state.index.put(key.clone(), size);
            state.total_bytes += size;
            evicted
        };

        for (old_key, old_size) in evicted {
            let path = self.cache_dir.join(old_key.relative_path());
            match tokio::fs::remove_file(&path).await {
                Ok(()) => info!(key = %old_key, size = old_size, "evicted cache entry"),
                Err(err) => warn!(key = %old_key, %err, "failed to remove evicted file"),
            }
        }

        if let Err(err) = tokio::fs::rename(tmp.path(), final_path).await {
            // Roll the admission back; the object never became visible.
            // The lock guard must stay out of any scope containing an await.
            {
                let mut state = self.state.lock().unwrap();
                state.index.pop(key);
                state.total_bytes = state.total_bytes.saturating_sub(size);
            }
            return Err(Error::Storage(err));
        }
        tmp.disarm();

        info!(%key, size, "cached object");
        Ok((final_path.to_path_buf(), size))
    }

    /// Write the remote byte stream to `tmp_path`, returning the byte count.
    async fn download(&self, key: &ObjectKey, tmp_path: &Path) -> Result<u64> {
        let mut stream = self.fetcher.fetch(key.bucket(), key.object()).await?;
        let mut file = tokio::fs::File::create(tmp_path).await?;
        let mut size: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(size)
    }

    /// Rebuild the index from files left by a previous run. Entries are
    /// seeded in modification-time order so recency survives a restart.
    fn scan_existing(&self) -> Result<()> {
        let mut found: Vec<(SystemTime, ObjectKey, u64)> = Vec::new();
        let mut stale_tmp = 0usize;
        collect_files(&self.cache_dir, &self.cache_dir, &mut found, &mut stale_tmp)?;

        found.sort_by_key(|(mtime, _, _)| *mtime);

        let mut state = self.state.lock().unwrap();
        for (_, key, size) in found {
            state.index.put(key, size);
            state.total_bytes += size;
        }
        if state.index.len() > 0 || stale_tmp > 0 {
            info!(
                entries = state.index.len(),
                total_bytes = state.total_bytes,
                removed_tmp = stale_tmp,
                "restored cache index from disk"
            );
        }
        Ok(())
    }
}

enum Plan {
    Wait(watch::Receiver<()>),
    Lead(watch::Sender<()>),
}

/// Removes the in-flight marker for a key on every leader exit path,
/// including cancellation mid-fetch. Dropping the sender afterwards wakes
/// the waiters.
struct InflightGuard<'a> {
    cache: &'a ObjectStoreCache,
    key: ObjectKey,
    _tx: watch::Sender<()>,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.cache.state.lock().unwrap();
        state.inflight.remove(&self.key);
    }
}

/// Deletes the temporary download file unless the transfer is finalized.
/// The leader future can be dropped at any await point while downloading;
/// without this the partial file would linger until the next startup scan.
struct TmpFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TmpFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TmpFileGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

fn tmp_path_for(final_path: &Path) -> PathBuf {
    let mut os = final_path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

fn collect_files(
    root: &Path,
    dir: &Path,
    found: &mut Vec<(SystemTime, ObjectKey, u64)>,
    stale_tmp: &mut usize,
) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let meta = entry.metadata()?;

        if meta.is_dir() {
            collect_files(root, &path, found, stale_tmp)?;
            continue;
        }
        if path.extension().is_some_and(|ext| ext == "tmp") {
            warn!(path = %path.display(), "removing stale temporary file");
            std::fs::remove_file(&path)?;
            *stale_tmp += 1;
            continue;
        }

        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        let mut components = rel.iter().map(|c| c.to_string_lossy().into_owned());
        let Some(bucket) = components.next() else {
            continue;
        };
        let object = components.collect::<Vec<_>>().join("/");
        let Ok(key) = ObjectKey::new(bucket, object) else {
            warn!(path = %path.display(), "ignoring file with unparsable cache path");
            continue;
        };

        let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        found.push((mtime, key, meta.len()));
    }
    Ok(())
}
