// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! LRU cache store with per-entry TTL

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use crate::domain::cache::{CacheEntry, CacheStore, Fingerprint};

struct Slot {
    entry: CacheEntry,
    expires_at: Instant,
}

pub struct LruCacheStore {
    entries: Mutex<LruCache<Fingerprint, Slot>>,
}

impl LruCacheStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }
}

#[async_trait]
impl CacheStore for LruCacheStore {
    async fn record_hit(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        match entries.peek(fingerprint).map(|slot| slot.expires_at > now) {
            Some(true) => {
                let slot = entries.get_mut(fingerprint)?;
                slot.entry.hit_count += 1;
                Some(slot.entry.clone())
            }
            Some(false) => {
                entries.pop(fingerprint);
                None
            }
            None => None,
        }
    }

    async fn peek(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let entries = self.entries.lock();
        entries
            .peek(fingerprint)
            .filter(|slot| slot.expires_at > Instant::now())
            .map(|slot| slot.entry.clone())
    }

    async fn put(&self, entry: CacheEntry, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries
            .lock()
            .put(entry.fingerprint.clone(), Slot { entry, expires_at });
    }

    async fn remove(&self, fingerprint: &Fingerprint) {
        self.entries.lock().pop(fingerprint);
    }

    async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let expired: Vec<Fingerprint> = entries
            .iter()
            .filter(|(_, slot)| slot.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    async fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
