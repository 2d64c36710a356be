// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Maintenance Worker - Background eviction of idle sessions and stale cache entries
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Keeps session and cache memory bounded between requests

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::application::semantic_cache::SemanticCache;
use crate::application::session_manager::SessionContextManager;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub sessions_evicted: usize,
    pub cache_entries_purged: usize,
}

pub struct MaintenanceWorker {
    sessions: Arc<SessionContextManager>,
    cache: Arc<SemanticCache>,
    interval: Duration,
    shutdown_token: CancellationToken,
}

impl MaintenanceWorker {
    pub fn new(
        sessions: Arc<SessionContextManager>,
        cache: Arc<SemanticCache>,
        interval: Duration,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            sessions,
            cache,
            interval,
            shutdown_token,
        }
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        info!(interval_secs = self.interval.as_secs(), "Starting maintenance worker");

        let mut tick = interval(self.interval);
        // The first tick completes immediately and there is nothing to evict yet
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let report = self.run_cycle().await;
                    if report != MaintenanceReport::default() {
                        info!(
                            sessions_evicted = report.sessions_evicted,
                            cache_entries_purged = report.cache_entries_purged,
                            "Maintenance cycle completed"
                        );
                    } else {
                        debug!("Maintenance cycle found nothing to evict");
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping maintenance worker");
                    break;
                }
            }
        }
    }

    pub async fn run_cycle(&self) -> MaintenanceReport {
        MaintenanceReport {
            sessions_evicted: self.sessions.evict_expired(),
            cache_entries_purged: self.cache.purge_expired().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::augmentation::AugmentedContext;
    use crate::domain::cache::Fingerprint;
    use crate::domain::context::ContextLevel;
    use crate::infrastructure::cache::LruCacheStore;

    #[tokio::test]
    async fn test_cycle_evicts_sessions_and_cache() {
        let sessions = Arc::new(SessionContextManager::new(Duration::from_millis(10), 100));
        let cache = Arc::new(SemanticCache::new(Arc::new(LruCacheStore::new(8)), Duration::from_millis(10)));
        drop(sessions.acquire("s1").await);
        cache
            .store(
                Fingerprint::compute("keyring", ContextLevel::Standard),
                AugmentedContext {
                    context_text: String::new(),
                    context_ids: vec![],
                    suggestions: vec![],
                    token_count: 0,
                    collections_searched: vec![],
                },
            )
            .await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let worker = MaintenanceWorker::new(sessions.clone(), cache.clone(), Duration::from_secs(300), CancellationToken::new());
        assert_eq!(
            worker.run_cycle().await,
            MaintenanceReport {
                sessions_evicted: 1,
                cache_entries_purged: 1,
            }
        );
        assert!(sessions.is_empty());
        assert_eq!(cache.len().await, 0);
    }
}
