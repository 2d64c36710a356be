// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Session Context Manager
//!
//! Sole owner of [`Session`] state. Each session sits behind its own async
//! mutex: an augmentation call holds the lock for its whole duration, so two
//! concurrent calls on one session cannot both deliver the same item, while
//! calls on different sessions never contend.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Per-session state registry with TTL eviction

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::domain::session::Session;

pub struct SessionContextManager {
    sessions: DashMap<String, Arc<Mutex<Session>>>,
    ttl: Duration,
    token_budget: usize,
}

impl SessionContextManager {
    pub fn new(ttl: Duration, token_budget: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
            token_budget,
        }
    }

    /// Exclusive access to the session, creating it on first use.
    ///
    /// The slot can be evicted or closed while we wait for its lock; the
    /// guard is only returned once it is still the registered slot.
    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<Session> {
        loop {
            let slot = self
                .sessions
                .entry(session_id.to_string())
                .or_insert_with(|| {
                    debug!(session_id, "Creating session");
                    Arc::new(Mutex::new(Session::new(session_id, self.token_budget)))
                })
                .clone();
            let guard = slot.clone().lock_owned().await;

            let registered = self
                .sessions
                .get(session_id)
                .is_some_and(|current| Arc::ptr_eq(current.value(), &slot));
            if registered {
                return guard;
            }
            debug!(session_id, "Session removed while waiting for it, retrying");
        }
    }

    /// Cloned snapshot, `None` if the session does not exist
    pub async fn get(&self, session_id: &str) -> Option<Session> {
        let slot = self.sessions.get(session_id).map(|s| s.clone())?;
        let session = slot.lock().await;
        Some(session.clone())
    }

    /// Remove the session, waiting for any in-flight call on it to finish
    pub async fn close(&self, session_id: &str) -> Option<Session> {
        let (_, slot) = self.sessions.remove(session_id)?;
        let session = slot.lock().await;
        Some(session.clone())
    }

    /// Drop sessions idle for longer than the TTL. Sessions in use are skipped.
    pub fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, slot| match slot.try_lock() {
            Ok(session) => !session.is_expired(self.ttl, now),
            Err(_) => true,
        });
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::ContextItemId;

    #[tokio::test]
    async fn test_acquire_creates_once() {
        let manager = SessionContextManager::new(Duration::from_secs(3600), 1000);
        {
            let mut session = manager.acquire("s1").await;
            session.record_turn("keyring", &[ContextItemId::from("a")], 100);
        }
        let session = manager.acquire("s1").await;
        assert_eq!(session.queries.len(), 1);
        assert_eq!(session.token_budget_remaining, 900);
        drop(session);
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_close_removes_session() {
        let manager = SessionContextManager::new(Duration::from_secs(3600), 1000);
        drop(manager.acquire("s1").await);
        let closed = manager.close("s1").await.unwrap();
        assert_eq!(closed.id, "s1");
        assert!(manager.get("s1").await.is_none());
        assert!(manager.close("s1").await.is_none());
    }

    #[tokio::test]
    async fn test_acquire_follows_a_slot_removed_while_waiting() {
        let manager = Arc::new(SessionContextManager::new(Duration::from_secs(3600), 1000));
        let holder = manager.acquire("s1").await;

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move {
                let mut session = manager.acquire("s1").await;
                session.record_turn("keyring", &[ContextItemId::from("a")], 10);
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Evicted between the waiter's lookup and its lock
        manager.sessions.remove("s1");
        drop(holder);
        waiter.await.unwrap();

        let session = manager.get("s1").await.unwrap();
        assert_eq!(session.queries.len(), 1);
        assert!(session.has_returned(&ContextItemId::from("a")));
    }

    #[tokio::test]
    async fn test_evict_expired() {
        let manager = SessionContextManager::new(Duration::from_millis(20), 1000);
        drop(manager.acquire("idle").await);
        tokio::time::sleep(Duration::from_millis(40)).await;

        let busy = manager.acquire("busy").await;
        assert_eq!(manager.evict_expired(), 1);
        assert!(manager.get("idle").await.is_none());
        drop(busy);
        assert_eq!(manager.len(), 1);
    }
}
