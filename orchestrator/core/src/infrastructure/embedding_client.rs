// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Embedding Clients
//
// - HashingEmbedder: deterministic feature hashing, no network. Texts that
//   share terms land close to each other, which is all ranking and novelty
//   detection need in air-gapped or test deployments.
// - OllamaEmbedder: Anti-Corruption Layer for Ollama's /api/embeddings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::cache::normalize_query;
use crate::domain::embedding::{Embedder, EmbeddingError};

pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let normalized = normalize_query(text);
        let terms: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();

        for term in &terms {
            self.accumulate(&mut vector, term.as_bytes(), 1.0);
        }
        // Adjacent pairs keep a little word order
        for pair in terms.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut vector, bigram.as_bytes(), 0.5);
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let digest = Sha256::digest(feature);
        let mut index_bytes = [0u8; 8];
        index_bytes.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(index_bytes) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign * weight;
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("cannot embed empty text".to_string()));
        }
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

pub struct OllamaEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(endpoint: String, model: String, dimension: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            model,
            dimension,
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("cannot embed empty text".to_string()));
        }

        let url = format!("{}/api/embeddings", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&OllamaEmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Provider { status, message });
        }

        let body: OllamaEmbeddingResponse = response.json().await.map_err(|e| EmbeddingError::Provider {
            status: 200,
            message: format!("Failed to parse response: {}", e),
        })?;

        if body.embedding.len() != self.dimension {
            return Err(EmbeddingError::Provider {
                status: 200,
                message: format!(
                    "model '{}' returned {} dimensions, expected {}",
                    self.model,
                    body.embedding.len(),
                    self.dimension
                ),
            });
        }
        Ok(body.embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::vector_store::cosine_similarity;

    #[tokio::test]
    async fn test_hashing_embedder_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed("NixOS keyring error").await.unwrap();
        let b = embedder.embed("nixos keyring error").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_terms_are_closer() {
        let embedder = HashingEmbedder::new(384);
        let query = embedder.embed("nixos keyring error").await.unwrap();
        let related = embedder.embed("fix the nixos keyring error on login").await.unwrap();
        let unrelated = embedder.embed("postgres vacuum tuning").await.unwrap();
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let embedder = HashingEmbedder::new(8);
        assert!(matches!(embedder.embed("  ").await, Err(EmbeddingError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_ollama_embedder() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"embedding":[0.1,0.2,0.3]}"#)
            .create_async()
            .await;

        let embedder = OllamaEmbedder::new(server.url(), "nomic-embed-text".to_string(), 3);
        assert_eq!(embedder.embed("keyring").await.unwrap(), vec![0.1, 0.2, 0.3]);

        let wrong_dimension = OllamaEmbedder::new(server.url(), "nomic-embed-text".to_string(), 768);
        assert!(wrong_dimension.embed("keyring").await.is_err());
    }

    #[tokio::test]
    async fn test_ollama_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/embeddings")
            .with_status(500)
            .with_body("model not loaded")
            .create_async()
            .await;

        let embedder = OllamaEmbedder::new(server.url(), "nomic-embed-text".to_string(), 3);
        let err = embedder.embed("keyring").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Provider { status: 500, .. }));
    }
}
