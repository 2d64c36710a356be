// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Session — multi-turn augmentation state for one caller conversation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::context::ContextItemId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Queries in arrival order
    pub queries: Vec<String>,
    /// Every item ever delivered in this session. Only grows.
    pub returned_item_ids: BTreeSet<ContextItemId>,
    pub token_budget_remaining: usize,
}

impl Session {
    pub fn new(id: impl Into<String>, token_budget: usize) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            last_activity: now,
            queries: Vec::new(),
            returned_item_ids: BTreeSet::new(),
            token_budget_remaining: token_budget,
        }
    }

    /// Commit one completed turn
    pub fn record_turn<'a>(
        &mut self,
        query: &str,
        returned: impl IntoIterator<Item = &'a ContextItemId>,
        tokens_used: usize,
    ) {
        self.queries.push(query.to_string());
        self.returned_item_ids.extend(returned.into_iter().cloned());
        self.token_budget_remaining = self.token_budget_remaining.saturating_sub(tokens_used);
        self.last_activity = Utc::now();
    }

    pub fn has_returned(&self, id: &ContextItemId) -> bool {
        self.returned_item_ids.contains(id)
    }

    /// Budget for the next call given the caller's per-request limit
    pub fn effective_budget(&self, max_tokens: usize) -> usize {
        max_tokens.min(self.token_budget_remaining)
    }

    pub fn last_query(&self) -> Option<&str> {
        self.queries.last().map(String::as_str)
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_activity
    }

    pub fn is_expired(&self, ttl: std::time::Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => self.idle_for(now) >= ttl,
            Err(_) => false,
        }
    }
}
