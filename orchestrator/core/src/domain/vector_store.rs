// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Vector Context Store - Domain Interface (Anti-Corruption Layer)
//
// Thin port over the external vector index. Collections are addressed by
// name; the index itself is not implemented here.
// Implementations live in infrastructure/vector_store/.

use async_trait::async_trait;

use crate::domain::context::ContextItem;
use crate::domain::error::{Classify, ErrorKind};

#[async_trait]
pub trait VectorContextStore: Send + Sync {
    /// Nearest neighbours of `vector` in `collection`, best first.
    /// Returned items carry their similarity in `relevance_score`.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: f64,
    ) -> Result<Vec<ContextItem>, VectorStoreError>;

    async fn upsert(&self, collection: &str, item: &ContextItem) -> Result<(), VectorStoreError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum VectorStoreError {
    #[error("Vector store request timed out: {0}")]
    Timeout(String),

    #[error("Vector store connection failed: {0}")]
    Connection(String),

    #[error("Vector store rate limited")]
    RateLimited,

    #[error("Vector store server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Vector store rejected request: {0}")]
    Rejected(String),

    #[error("Failed to decode vector store response: {0}")]
    Decode(String),
}

impl Classify for VectorStoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            VectorStoreError::Timeout(_) => ErrorKind::Timeout,
            VectorStoreError::Connection(_) => ErrorKind::Connection,
            VectorStoreError::RateLimited => ErrorKind::RateLimited,
            VectorStoreError::Server { .. } => ErrorKind::Server,
            VectorStoreError::CollectionNotFound(_) => ErrorKind::Invalid,
            VectorStoreError::Rejected(_) | VectorStoreError::Decode(_) => ErrorKind::Rejected,
        }
    }
}
