// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;

use crate::domain::error::{Classify, ErrorKind};

/// Turns text into the vectors stored in and searched against the index
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn dimension(&self) -> usize;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Embedding service network error: {0}")]
    Network(String),

    #[error("Embedding service error (HTTP {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Invalid embedding input: {0}")]
    InvalidInput(String),
}

impl Classify for EmbeddingError {
    fn kind(&self) -> ErrorKind {
        match self {
            EmbeddingError::Network(_) => ErrorKind::Connection,
            EmbeddingError::Provider { status, .. } if *status == 429 => ErrorKind::RateLimited,
            EmbeddingError::Provider { status, .. } if *status >= 500 => ErrorKind::Server,
            EmbeddingError::Provider { .. } => ErrorKind::Rejected,
            EmbeddingError::InvalidInput(_) => ErrorKind::Invalid,
        }
    }
}
