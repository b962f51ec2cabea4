//! Two-tier cache for the bulk key table
//!
//! The memory tier holds the parsed table and the instant it was fetched.
//! The file tier is a JSON file whose age is its modification time, so a
//! table written by a previous process is reused until it expires.
//!
//! Fetches are single-flight: callers that miss queue on one async lock and,
//! once they hold it, reuse a table fetched while they waited instead of
//! starting another network fetch. A zero TTL stores nothing in either tier;
//! the last fetched table is only handed to callers that were already queued.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Flat depot id -> hex key mapping, the wire format of the bulk table
pub type KeyTable = HashMap<String, String>;

/// Tier that satisfied a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Memory,
    File,
}

/// Cache introspection snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub has_memory_entry: bool,
    pub memory_entry_count: usize,
    pub memory_entry_age: Option<Duration>,
    pub has_file_entry: bool,
    pub file_entry_count: usize,
    pub file_entry_age: Option<Duration>,
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    table: Arc<KeyTable>,
    fetched_at: Instant,
}

/// Bulk key table cache shared by every resolution
#[derive(Debug)]
pub struct KeyTableCache {
    path: PathBuf,
    ttl: Duration,
    memory: RwLock<Option<MemoryEntry>>,
    latest: RwLock<Option<Arc<KeyTable>>>,
    fetch_lock: tokio::sync::Mutex<()>,
    generation: AtomicU64,
}

impl KeyTableCache {
    /// Create a cache persisting to `path`; a zero `ttl` disables lookups
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
            memory: RwLock::new(None),
            latest: RwLock::new(None),
            fetch_lock: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Persisted file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a fresh table without fetching
    pub async fn lookup(&self, force_refresh: bool) -> Option<(Arc<KeyTable>, CacheTier)> {
        if force_refresh || self.ttl.is_zero() {
            return None;
        }

        if let Some(entry) = self.memory.read().as_ref() {
            if entry.fetched_at.elapsed() < self.ttl {
                debug!("Key table cache hit (memory)");
                return Some((Arc::clone(&entry.table), CacheTier::Memory));
            }
        }

        let age = file_age(&self.path).await?;
        if age >= self.ttl {
            debug!("Key table file expired ({}s old)", age.as_secs());
            return None;
        }

        let table = match read_table(&self.path).await {
            Ok(table) => Arc::new(table),
            Err(e) => {
                warn!("Ignoring unreadable key table {:?}: {}", self.path, e);
                return None;
            }
        };

        debug!("Key table cache hit (file, {} entries)", table.len());
        let fetched_at = Instant::now().checked_sub(age).unwrap_or_else(Instant::now);
        *self.memory.write() = Some(MemoryEntry {
            table: Arc::clone(&table),
            fetched_at,
        });
        Some((table, CacheTier::File))
    }

    /// Return a fresh table, fetching it at most once across concurrent
    /// callers
    ///
    /// The boolean is `true` when the table came from a cache tier and
    /// `false` when it was fetched by this call or by a fetch that completed
    /// while this call waited.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        force_refresh: bool,
        fetch: F,
    ) -> Result<(Arc<KeyTable>, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<KeyTable>>,
    {
        if let Some((table, _)) = self.lookup(force_refresh).await {
            return Ok((table, true));
        }

        let observed = self.generation.load(Ordering::SeqCst);
        let _guard = self.fetch_lock.lock().await;

        if self.generation.load(Ordering::SeqCst) != observed {
            if let Some(table) = self.latest.read().as_ref() {
                debug!("Reusing key table fetched by a concurrent caller");
                return Ok((Arc::clone(table), false));
            }
        }

        let table = Arc::new(fetch().await?);
        info!("Fetched key table with {} entries", table.len());

        *self.latest.write() = Some(Arc::clone(&table));
        self.generation.fetch_add(1, Ordering::SeqCst);

        if self.ttl.is_zero() {
            return Ok((table, false));
        }

        *self.memory.write() = Some(MemoryEntry {
            table: Arc::clone(&table),
            fetched_at: Instant::now(),
        });
        if let Err(e) = write_table(&self.path, &table).await {
            warn!("Failed to persist key table to {:?}: {}", self.path, e);
        }

        Ok((table, false))
    }

    /// Force a fetch and return the new entry count
    pub async fn refresh<F, Fut>(&self, fetch: F) -> Result<usize>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<KeyTable>>,
    {
        let (table, _) = self.get_or_fetch(true, fetch).await?;
        Ok(table.len())
    }

    /// Drop both tiers; never fails
    pub async fn clear(&self) {
        *self.memory.write() = None;
        *self.latest.write() = None;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => info!("Removed key table cache {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove key table cache {:?}: {}", self.path, e),
        }
    }

    /// Snapshot of both tiers
    pub async fn status(&self) -> CacheStatus {
        let mut status = CacheStatus::default();

        if let Some(entry) = self.memory.read().as_ref() {
            status.has_memory_entry = true;
            status.memory_entry_count = entry.table.len();
            status.memory_entry_age = Some(entry.fetched_at.elapsed());
        }

        if let Some(age) = file_age(&self.path).await {
            status.has_file_entry = true;
            status.file_entry_age = Some(age);
            status.file_entry_count = read_table(&self.path).await.map_or(0, |t| t.len());
        }

        status
    }
}

/// Age from modification time; `None` when the file is absent
async fn file_age(path: &Path) -> Option<Duration> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    let modified = metadata.modified().ok()?;
    Some(SystemTime::now().duration_since(modified).unwrap_or_default())
}

async fn read_table(path: &Path) -> Result<KeyTable> {
    let data = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&data)?)
}

/// Write through a temporary file so readers never see a partial table
async fn write_table(path: &Path, table: &KeyTable) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let data = serde_json::to_vec(table)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!("Persisted key table to {:?}", path);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ResolverError;
    use filetime::FileTime;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn sample_table() -> KeyTable {
        HashMap::from([
            ("228988".to_string(), "aa".to_string()),
            ("228990".to_string(), "bb".to_string()),
        ])
    }

    fn set_age(path: &Path, age: Duration) {
        let mtime = FileTime::from_system_time(SystemTime::now() - age);
        filetime::set_file_mtime(path, mtime).expect("Operation should succeed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_entry_hit_before_ttl_and_miss_at_ttl() {
        let dir = TempDir::new().expect("Operation should succeed");
        let cache = KeyTableCache::new(dir.path().join("keys.json"), HOUR);

        let (_, from_cache) = cache
            .get_or_fetch(false, || async { Ok(sample_table()) })
            .await
            .expect("Operation should succeed");
        assert!(!from_cache);

        // Only the memory tier should answer from here on
        std::fs::remove_file(cache.path()).expect("Operation should succeed");

        tokio::time::advance(HOUR - Duration::from_secs(1)).await;
        let hit = cache.lookup(false).await;
        assert_eq!(hit.map(|(_, tier)| tier), Some(CacheTier::Memory));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.lookup(false).await.is_none());
    }

    #[tokio::test]
    async fn test_file_tier_age_from_mtime() {
        let dir = TempDir::new().expect("Operation should succeed");
        let path = dir.path().join("keys.json");
        std::fs::write(&path, serde_json::to_vec(&sample_table()).unwrap()).unwrap();

        set_age(&path, HOUR - Duration::from_secs(60));
        let cache = KeyTableCache::new(&path, HOUR);
        let (table, tier) = cache.lookup(false).await.expect("file entry should hit");
        assert_eq!(tier, CacheTier::File);
        assert_eq!(table.len(), 2);

        // Promotion keeps the file's age, so the memory copy is still fresh
        assert_eq!(
            cache.lookup(false).await.map(|(_, tier)| tier),
            Some(CacheTier::Memory)
        );

        set_age(&path, HOUR + Duration::from_secs(1));
        let cold = KeyTableCache::new(&path, HOUR);
        assert!(cold.lookup(false).await.is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_always_misses_and_skips_file() {
        let dir = TempDir::new().expect("Operation should succeed");
        let cache = KeyTableCache::new(dir.path().join("keys.json"), Duration::ZERO);
        let fetches = AtomicUsize::new(0);
        let counter = &fetches;

        for _ in 0..2 {
            let (_, from_cache) = cache
                .get_or_fetch(false, move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(sample_table())
                })
                .await
                .expect("Operation should succeed");
            assert!(!from_cache);
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        assert!(!cache.path().exists());
        assert_eq!(cache.status().await, CacheStatus::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_concurrent_misses_share_one_fetch() {
        let dir = TempDir::new().expect("Operation should succeed");
        let cache = KeyTableCache::new(dir.path().join("keys.json"), Duration::ZERO);
        let fetches = AtomicUsize::new(0);
        let counter = &fetches;

        let slow_fetch = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(sample_table())
        };

        let (first, second) = tokio::join!(
            cache.get_or_fetch(false, slow_fetch),
            cache.get_or_fetch(false, slow_fetch)
        );

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(first.unwrap().0.len(), 2);
        assert_eq!(second.unwrap().0.len(), 2);
        assert!(!cache.status().await.has_memory_entry);
        assert!(!cache.path().exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_fetch_once() {
        let dir = TempDir::new().expect("Operation should succeed");
        let cache = KeyTableCache::new(dir.path().join("keys.json"), HOUR);
        let fetches = AtomicUsize::new(0);
        let counter = &fetches;

        let slow_fetch = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(sample_table())
        };

        let (first, second) = tokio::join!(
            cache.get_or_fetch(false, slow_fetch),
            cache.get_or_fetch(false, slow_fetch)
        );

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(first.unwrap().0.len(), 2);
        assert_eq!(second.unwrap().0.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates_and_leaves_cache_empty() {
        let dir = TempDir::new().expect("Operation should succeed");
        let cache = KeyTableCache::new(dir.path().join("keys.json"), HOUR);

        let result = cache
            .get_or_fetch(false, || async {
                Err(ResolverError::AllCandidatesFailed { attempted: 2 })
            })
            .await;

        assert!(result.is_err());
        assert!(!cache.status().await.has_memory_entry);
    }

    #[tokio::test]
    async fn test_persist_failure_is_not_fatal() {
        let dir = TempDir::new().expect("Operation should succeed");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let cache = KeyTableCache::new(blocker.join("keys.json"), HOUR);

        let (table, _) = cache
            .get_or_fetch(false, || async { Ok(sample_table()) })
            .await
            .expect("memory tier should still be populated");
        assert_eq!(table.len(), 2);
        assert_eq!(
            cache.lookup(false).await.map(|(_, tier)| tier),
            Some(CacheTier::Memory)
        );
    }

    #[tokio::test]
    async fn test_clear_status_and_refresh() {
        let dir = TempDir::new().expect("Operation should succeed");
        let cache = KeyTableCache::new(dir.path().join("nested/keys.json"), HOUR);

        // Clearing an empty cache is fine
        cache.clear().await;
        assert_eq!(cache.status().await, CacheStatus::default());

        let count = cache
            .refresh(|| async { Ok(sample_table()) })
            .await
            .expect("Operation should succeed");
        assert_eq!(count, 2);

        let status = cache.status().await;
        assert!(status.has_memory_entry);
        assert_eq!(status.memory_entry_count, 2);
        assert!(status.has_file_entry);
        assert_eq!(status.file_entry_count, 2);

        cache.clear().await;
        let status = cache.status().await;
        assert!(!status.has_memory_entry);
        assert!(!status.has_file_entry);
        assert!(!cache.path().exists());
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_fresh_entry() {
        let dir = TempDir::new().expect("Operation should succeed");
        let cache = KeyTableCache::new(dir.path().join("keys.json"), HOUR);
        let fetches = AtomicUsize::new(0);
        let counter = &fetches;
        let fetch = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(sample_table())
        };

        cache.get_or_fetch(false, fetch).await.unwrap();
        let (_, from_cache) = cache.get_or_fetch(false, fetch).await.unwrap();
        assert!(from_cache);
        cache.get_or_fetch(true, fetch).await.unwrap();

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }
}
