// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Context Items & Levels
//!
//! Retrievable knowledge as stored in the vector index, and the fixed mapping
//! from a requested [`ContextLevel`] to the collections searched for it.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements context item model and collection mapping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DOCUMENTATION_COLLECTION: &str = "documentation";
pub const SOLUTIONS_COLLECTION: &str = "solutions";
pub const PATTERNS_COLLECTION: &str = "patterns";
pub const INTERACTIONS_COLLECTION: &str = "interactions";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextItemId(pub String);

impl ContextItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ContextItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ContextItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for ContextItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextPayload {
    pub text: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// A stored unit of retrievable context. Never mutated after storage;
/// superseding content is written under a new id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    pub id: ContextItemId,
    pub collection: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vector: Vec<f32>,
    pub payload: ContextPayload,
    /// Similarity to the query that retrieved this item (0.0 when stored)
    #[serde(default)]
    pub relevance_score: f64,
    pub created_at: DateTime<Utc>,
}

impl ContextItem {
    pub fn new(collection: impl Into<String>, vector: Vec<f32>, payload: ContextPayload) -> Self {
        Self {
            id: ContextItemId::new(),
            collection: collection.into(),
            vector,
            payload,
            relevance_score: 0.0,
            created_at: Utc::now(),
        }
    }

    /// Summary if present, otherwise the first line of the text
    pub fn headline(&self) -> &str {
        let summary = self.payload.summary.trim();
        if !summary.is_empty() {
            return summary;
        }
        self.payload.text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("")
    }
}

/// Requested depth of retrieved context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextLevel {
    Standard,
    Detailed,
    Comprehensive,
}

impl ContextLevel {
    /// Collections searched for this level. Fixed by design, never discovered.
    pub fn collections(&self) -> &'static [&'static str] {
        match self {
            ContextLevel::Standard => &[DOCUMENTATION_COLLECTION, SOLUTIONS_COLLECTION],
            ContextLevel::Detailed => &[DOCUMENTATION_COLLECTION, SOLUTIONS_COLLECTION, PATTERNS_COLLECTION],
            ContextLevel::Comprehensive => &[
                DOCUMENTATION_COLLECTION,
                SOLUTIONS_COLLECTION,
                PATTERNS_COLLECTION,
                INTERACTIONS_COLLECTION,
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextLevel::Standard => "standard",
            ContextLevel::Detailed => "detailed",
            ContextLevel::Comprehensive => "comprehensive",
        }
    }

    /// Next deeper level, if any
    pub fn deeper(&self) -> Option<ContextLevel> {
        match self {
            ContextLevel::Standard => Some(ContextLevel::Detailed),
            ContextLevel::Detailed => Some(ContextLevel::Comprehensive),
            ContextLevel::Comprehensive => None,
        }
    }
}

impl Default for ContextLevel {
    fn default() -> Self {
        Self::Standard
    }
}

impl std::fmt::Display for ContextLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All collections known to the coordinator
pub fn all_collections() -> &'static [&'static str] {
    ContextLevel::Comprehensive.collections()
}
