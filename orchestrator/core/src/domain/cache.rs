// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Cache
//!
//! Fingerprints, cache entries and the consumed key-value cache port.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements cache model

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::domain::augmentation::AugmentedContext;
use crate::domain::context::ContextLevel;

/// Deterministic cache key over (normalized query, context level)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn compute(query: &str, level: ContextLevel) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(level.as_str().as_bytes());
        hasher.update([0x1f]);
        hasher.update(normalize_query(query).as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Lowercase, strip edge punctuation from each term, collapse whitespace
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| term.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|term| !term.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub result: AugmentedContext,
    pub created_at: DateTime<Utc>,
    pub hit_count: u64,
}

impl CacheEntry {
    pub fn new(fingerprint: Fingerprint, result: AugmentedContext) -> Self {
        Self {
            fingerprint,
            result,
            created_at: Utc::now(),
            hit_count: 0,
        }
    }
}

/// Key-value cache consumed by the semantic cache
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Increment `hit_count` of a live entry and return the updated entry
    async fn record_hit(&self, fingerprint: &Fingerprint) -> Option<CacheEntry>;

    /// Read a live entry without counting a hit
    async fn peek(&self, fingerprint: &Fingerprint) -> Option<CacheEntry>;

    async fn put(&self, entry: CacheEntry, ttl: Duration);

    async fn remove(&self, fingerprint: &Fingerprint);

    /// Drop expired entries, returning how many were removed
    async fn purge_expired(&self) -> usize;

    async fn len(&self) -> usize;
}
