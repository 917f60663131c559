use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::cache::{Cache, cache_key};
use crate::check::{CheckRequest, CheckResult, SubjectKind};

const DEFAULT_TTL: Duration = Duration::from_secs(300);
const DEFAULT_MAX_SIZE: usize = 10_000;

/// In-memory TTL cache for check results with capacity-bounded eviction.
///
/// Reads take the shared lock; an expired entry found on read is deleted
/// under the exclusive lock. When a write would exceed capacity, all
/// expired entries are evicted first; if the cache is still full, one
/// arbitrary entry is evicted.
#[derive(Clone, Debug)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    ttl: Duration,
    max_size: usize,
}

#[derive(Clone, Debug)]
struct Entry {
    result: CheckResult,
    expires_at: Instant,
}

impl MemoryCache {
    /// Creates a cache with the default TTL (5 minutes) and capacity
    /// (10 000 entries).
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl: DEFAULT_TTL,
            max_size: DEFAULT_MAX_SIZE,
        }
    }

    /// Overrides the entry time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Overrides the maximum number of entries.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn evict_expired(entries: &mut HashMap<String, Entry>, now: Instant) {
        entries.retain(|_, entry| entry.expires_at > now);
    }

    fn evict_one(entries: &mut HashMap<String, Entry>) {
        if let Some(key) = entries.keys().next().cloned() {
            entries.remove(&key);
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, tenant_id: &str, req: &CheckRequest) -> Option<CheckResult> {
        let key = cache_key(tenant_id, req);
        let now = Instant::now();

        {
            let entries = self.read_entries();
            match entries.get(&key) {
                Some(entry) if entry.expires_at > now => return Some(entry.result.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired entry: delete it under the exclusive lock.
        self.write_entries().remove(&key);
        None
    }

    async fn set(&self, tenant_id: &str, req: &CheckRequest, result: &CheckResult) {
        if self.max_size == 0 {
            return;
        }

        let key = cache_key(tenant_id, req);
        let now = Instant::now();
        let mut entries = self.write_entries();

        if entries.len() >= self.max_size && !entries.contains_key(&key) {
            Self::evict_expired(&mut entries, now);
            if entries.len() >= self.max_size {
                Self::evict_one(&mut entries);
            }
        }

        entries.insert(
            key,
            Entry {
                result: result.clone(),
                expires_at: now + self.ttl,
            },
        );
    }

    async fn invalidate_tenant(&self, tenant_id: &str) {
        let prefix = format!("{tenant_id}:");
        self.write_entries().retain(|key, _| !key.starts_with(&prefix));
    }

    async fn invalidate_subject(&self, tenant_id: &str, kind: SubjectKind, subject_id: &str) {
        let prefix = format!("{tenant_id}:{kind}:{subject_id}:");
        self.write_entries().retain(|key, _| !key.starts_with(&prefix));
    }
}
