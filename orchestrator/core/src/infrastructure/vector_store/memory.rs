// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory vector store, used for `type: memory` deployments and tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::context::ContextItem;
use crate::domain::vector_store::{VectorContextStore, VectorStoreError};

pub struct InMemoryVectorStore {
    collections: Arc<RwLock<HashMap<String, Vec<ContextItem>>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub async fn items(&self, collection: &str) -> Vec<ContextItem> {
        self.collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Cosine similarity, 0.0 for mismatched or zero-length vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    (dot_product / (magnitude_a * magnitude_b)) as f64
}

#[async_trait]
impl VectorContextStore for InMemoryVectorStore {
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: f64,
    ) -> Result<Vec<ContextItem>, VectorStoreError> {
        let collections = self.collections.read().await;
        let Some(items) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<ContextItem> = items
            .iter()
            .filter_map(|item| {
                let similarity = cosine_similarity(vector, &item.vector);
                (similarity >= score_threshold).then(|| {
                    let mut hit = item.clone();
                    hit.relevance_score = similarity;
                    hit
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        Ok(results)
    }

    async fn upsert(&self, collection: &str, item: &ContextItem) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.write().await;
        let items = collections.entry(collection.to_string()).or_default();

        let mut stored = item.clone();
        stored.collection = collection.to_string();
        stored.relevance_score = 0.0;

        match items.iter_mut().find(|existing| existing.id == stored.id) {
            Some(existing) => *existing = stored,
            None => items.push(stored),
        }
        Ok(())
    }
}
