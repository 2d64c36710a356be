// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Semantic cache over a [`CacheStore`], keyed by query fingerprint

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::domain::augmentation::AugmentedContext;
use crate::domain::cache::{CacheEntry, CacheStore, Fingerprint};
use crate::domain::context::ContextLevel;

pub struct SemanticCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl SemanticCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Returns the cached entry and counts the hit, or `None` on miss
    pub async fn lookup(&self, query: &str, level: ContextLevel) -> Option<CacheEntry> {
        let fingerprint = Fingerprint::compute(query, level);
        let entry = self.store.record_hit(&fingerprint).await;
        let result = if entry.is_some() { "hit" } else { "miss" };
        debug!(fingerprint = fingerprint.as_str(), result, "Semantic cache lookup");
        metrics::counter!("hcoord_cache_lookups_total", "result" => result).increment(1);
        entry
    }

    /// Like [`lookup`](Self::lookup), but an entry rejected by `usable` is a
    /// miss for this caller and its hit count is left alone
    pub async fn lookup_usable<F>(&self, query: &str, level: ContextLevel, usable: F) -> Option<CacheEntry>
    where
        F: Fn(&CacheEntry) -> bool,
    {
        let fingerprint = Fingerprint::compute(query, level);
        let result = match self.store.peek(&fingerprint).await {
            None => "miss",
            Some(entry) if !usable(&entry) => "bypass",
            Some(_) => "hit",
        };
        debug!(fingerprint = fingerprint.as_str(), result, "Semantic cache lookup");
        metrics::counter!("hcoord_cache_lookups_total", "result" => result).increment(1);
        if result != "hit" {
            return None;
        }
        self.store.record_hit(&fingerprint).await
    }

    /// Inspect without counting a hit
    pub async fn peek(&self, query: &str, level: ContextLevel) -> Option<CacheEntry> {
        self.store.peek(&Fingerprint::compute(query, level)).await
    }

    pub async fn store(&self, fingerprint: Fingerprint, result: AugmentedContext) {
        self.store.put(CacheEntry::new(fingerprint, result), self.ttl).await;
    }

    pub async fn purge_expired(&self) -> usize {
        self.store.purge_expired().await
    }

    pub async fn len(&self) -> usize {
        self.store.len().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::LruCacheStore;

    fn result() -> AugmentedContext {
        AugmentedContext {
            context_text: "- restart gnome-keyring-daemon".to_string(),
            context_ids: vec!["doc-1".into()],
            suggestions: vec![],
            token_count: 8,
            collections_searched: vec!["documentation".to_string()],
        }
    }

    #[tokio::test]
    async fn test_lookup_after_store() {
        let cache = SemanticCache::new(Arc::new(LruCacheStore::new(16)), Duration::from_secs(60));
        assert!(cache.lookup("keyring", ContextLevel::Standard).await.is_none());

        cache
            .store(Fingerprint::compute("keyring", ContextLevel::Standard), result())
            .await;

        let first = cache.lookup("Keyring ", ContextLevel::Standard).await.unwrap();
        let second = cache.lookup("keyring", ContextLevel::Standard).await.unwrap();
        assert_eq!(first.hit_count, 1);
        assert_eq!(second.hit_count, 2);
        assert_eq!(first.result.context_ids, second.result.context_ids);
        assert!(cache.lookup("keyring", ContextLevel::Detailed).await.is_none());
    }

    #[tokio::test]
    async fn test_unusable_entry_is_a_miss() {
        let cache = SemanticCache::new(Arc::new(LruCacheStore::new(16)), Duration::from_secs(60));
        cache
            .store(Fingerprint::compute("keyring", ContextLevel::Standard), result())
            .await;

        let bypassed = cache
            .lookup_usable("keyring", ContextLevel::Standard, |entry| entry.result.token_count <= 4)
            .await;
        assert!(bypassed.is_none());
        assert_eq!(cache.peek("keyring", ContextLevel::Standard).await.unwrap().hit_count, 0);

        let served = cache
            .lookup_usable("keyring", ContextLevel::Standard, |entry| entry.result.token_count <= 8)
            .await;
        assert_eq!(served.unwrap().hit_count, 1);
    }

    #[tokio::test]
    async fn test_peek_does_not_count() {
        let cache = SemanticCache::new(Arc::new(LruCacheStore::new(16)), Duration::from_secs(60));
        cache
            .store(Fingerprint::compute("keyring", ContextLevel::Standard), result())
            .await;
        cache.peek("keyring", ContextLevel::Standard).await.unwrap();
        assert_eq!(cache.peek("keyring", ContextLevel::Standard).await.unwrap().hit_count, 0);
    }
}
