//! Distributed semaphore over the cache's atomic set-if-absent.
//!
//! One lock name maps to one cache key; the value is a unique lock id so
//! only the owner can release. A per-name in-process mutex serializes local
//! acquisition attempts and keeps contending workers from hammering the
//! cache. The cache TTL bounds lock lifetime: a crashed holder self-heals
//! once the entry expires.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::cache::Cache;
use crate::errors::{LedgerError, LedgerResult};

pub struct Semaphore {
    cache: Arc<Cache>,
    lock_ttl_ms: u64,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    guards: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// Held lock; releases on drop so unwinding still frees the resource.
pub struct Lease<'a> {
    semaphore: &'a Semaphore,
    resource: String,
    lock_id: String,
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.semaphore.release(&self.resource, &self.lock_id);
    }
}

impl Semaphore {
    pub fn new(cache: Arc<Cache>, lock_ttl_ms: u64, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            cache,
            lock_ttl_ms,
            initial_backoff_ms,
            max_backoff_ms,
            guards: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `f` with `resource` held, using the default timeout.
    pub fn execute<T>(&self, resource: &str, f: impl FnOnce() -> T) -> LedgerResult<T> {
        self.execute_with_timeout(resource, self.lock_ttl_ms, f)
    }

    pub fn execute_with_timeout<T>(
        &self,
        resource: &str,
        timeout_ms: u64,
        f: impl FnOnce() -> T,
    ) -> LedgerResult<T> {
        let lease = self.acquire(resource, timeout_ms)?;
        let result = f();
        drop(lease);
        Ok(result)
    }

    pub fn acquire(&self, resource: &str, timeout_ms: u64) -> LedgerResult<Lease<'_>> {
        let guard = {
            let mut guards = self.guards.lock();
            guards
                .entry(resource.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _local = guard.lock();

        let lock_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let mut attempt: u32 = 1;
        loop {
            if self.cache.set_if_absent(resource, &lock_id, self.lock_ttl_ms) {
                return Ok(Lease {
                    semaphore: self,
                    resource: resource.to_string(),
                    lock_id,
                });
            }
            if started.elapsed() >= Duration::from_millis(timeout_ms) {
                return Err(LedgerError::LockTimeout(resource.to_string()));
            }
            let backoff = (self.initial_backoff_ms * u64::from(attempt)).min(self.max_backoff_ms);
            attempt = attempt.saturating_add(1);
            thread::sleep(Duration::from_millis(backoff));
        }
    }

    fn release(&self, resource: &str, lock_id: &str) -> bool {
        match self.cache.get(resource) {
            Some(current) if current == lock_id => {
                self.force_release(resource);
                true
            }
            _ => {
                warn!(resource, "attempt to release lock failed: not the lock owner");
                false
            }
        }
    }

    /// Removes the lock regardless of owner and trims the in-process guard.
    pub fn force_release(&self, resource: &str) {
        self.cache.delete(resource);
        self.guards.lock().remove(resource);
    }
}
