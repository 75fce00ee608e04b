use std::collections::HashMap;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::clock::Clock;
use crate::errors::LedgerResult;

struct Entry {
    value: String,
    expires_at_ms: i64,
}

/// TTL key-value cache holding lock tokens and response envelopes.
///
/// Mirrors the atomic `SET key value EX ttl NX` semantics the semaphore
/// depends on. Expired entries are dropped lazily on access.
pub struct Cache {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Clock,
}

impl Cache {
    pub fn new(clock: Clock) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn set(&self, key: &str, value: &str, ttl_ms: u64) {
        let expires_at_ms = self.clock.now_ms() + ttl_ms as i64;
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at_ms,
            },
        );
    }

    /// Atomic set-if-absent with TTL; returns whether the key was claimed.
    pub fn set_if_absent(&self, key: &str, value: &str, ttl_ms: u64) -> bool {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(key) {
            if existing.expires_at_ms > now {
                return false;
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at_ms: now + ttl_ms as i64,
            },
        );
        true
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at_ms > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn delete(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    pub fn save_json<T: Serialize>(&self, key: &str, value: &T, ttl_ms: u64) -> LedgerResult<()> {
        self.set(key, &serde_json::to_string(value)?, ttl_ms);
        Ok(())
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> LedgerResult<Option<T>> {
        match self.get(key) {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}
