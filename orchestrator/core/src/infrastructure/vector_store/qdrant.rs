// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Qdrant Vector Store Adapter
//
// Anti-Corruption Layer over the Qdrant REST API. Point ids must be UUIDs,
// so arbitrary item ids are mapped with a v5 UUID and the original id is
// kept in the payload. Collections are created lazily on first upsert; a
// search against a collection that does not exist yet returns no items.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::context::{ContextItem, ContextItemId, ContextPayload};
use crate::domain::vector_store::{VectorContextStore, VectorStoreError};

pub struct QdrantVectorStore {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    score_threshold: f64,
    with_payload: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: serde_json::Value,
    score: f64,
    #[serde(default)]
    payload: Option<PointPayload>,
}

#[derive(Serialize, Deserialize)]
struct PointPayload {
    #[serde(default)]
    item_id: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct CreateCollectionRequest {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    points: [Point<'a>; 1],
}

#[derive(Serialize)]
struct Point<'a> {
    id: String,
    vector: &'a [f32],
    payload: PointPayload,
}

impl QdrantVectorStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn point_id(id: &ContextItemId) -> String {
        match Uuid::parse_str(id.as_str()) {
            Ok(uuid) => uuid.to_string(),
            Err(_) => Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_str().as_bytes()).to_string(),
        }
    }

    async fn create_collection(&self, collection: &str, size: usize) -> Result<(), VectorStoreError> {
        let url = format!("{}/collections/{}", self.base_url, collection);
        let request = CreateCollectionRequest {
            vectors: VectorParams {
                size,
                distance: "Cosine",
            },
        };
        let response = self
            .client
            .put(&url)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        Self::check_status(response, collection).await?;
        info!(collection, size, "Created Qdrant collection");
        Ok(())
    }

    async fn put_points(&self, collection: &str, request: &UpsertRequest<'_>) -> Result<(), VectorStoreError> {
        let url = format!("{}/collections/{}/points?wait=true", self.base_url, collection);
        let response = self
            .client
            .put(&url)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        Self::check_status(response, collection).await?;
        Ok(())
    }

    async fn check_status(
        response: reqwest::Response,
        collection: &str,
    ) -> Result<reqwest::Response, VectorStoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            404 => VectorStoreError::CollectionNotFound(collection.to_string()),
            429 => VectorStoreError::RateLimited,
            code if code >= 500 => VectorStoreError::Server {
                status: code,
                message: body,
            },
            code => VectorStoreError::Rejected(format!("HTTP {}: {}", code, body)),
        })
    }
}

fn transport_error(e: reqwest::Error) -> VectorStoreError {
    if e.is_timeout() {
        VectorStoreError::Timeout(e.to_string())
    } else {
        VectorStoreError::Connection(e.to_string())
    }
}

#[async_trait]
impl VectorContextStore for QdrantVectorStore {
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: f64,
    ) -> Result<Vec<ContextItem>, VectorStoreError> {
        let url = format!("{}/collections/{}/points/search", self.base_url, collection);
        let request = SearchRequest {
            vector,
            limit,
            score_threshold,
            with_payload: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        let response = match Self::check_status(response, collection).await {
            Ok(response) => response,
            Err(VectorStoreError::CollectionNotFound(_)) => {
                debug!(collection, "Collection does not exist yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| VectorStoreError::Decode(e.to_string()))?;

        Ok(body
            .result
            .into_iter()
            .map(|point| {
                let payload = point.payload.unwrap_or(PointPayload {
                    item_id: None,
                    text: String::new(),
                    summary: String::new(),
                    metadata: serde_json::Map::new(),
                    created_at: None,
                });
                let id = payload.item_id.clone().unwrap_or_else(|| match &point.id {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
                ContextItem {
                    id: ContextItemId(id),
                    collection: collection.to_string(),
                    vector: Vec::new(),
                    payload: ContextPayload {
                        text: payload.text,
                        summary: payload.summary,
                        metadata: payload.metadata,
                    },
                    relevance_score: point.score,
                    created_at: payload.created_at.unwrap_or_else(Utc::now),
                }
            })
            .collect())
    }

    async fn upsert(&self, collection: &str, item: &ContextItem) -> Result<(), VectorStoreError> {
        let request = UpsertRequest {
            points: [Point {
                id: Self::point_id(&item.id),
                vector: &item.vector,
                payload: PointPayload {
                    item_id: Some(item.id.to_string()),
                    text: item.payload.text.clone(),
                    summary: item.payload.summary.clone(),
                    metadata: item.payload.metadata.clone(),
                    created_at: Some(item.created_at),
                },
            }],
        };

        match self.put_points(collection, &request).await {
            Err(VectorStoreError::CollectionNotFound(_)) => {
                self.create_collection(collection, item.vector.len()).await?;
                self.put_points(collection, &request).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::SOLUTIONS_COLLECTION;

    #[tokio::test]
    async fn test_search_maps_points() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/collections/solutions/points/search")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"result":[{"id":"7c9e6679-7425-40de-944b-e07fc1f90ae7","score":0.82,
                "payload":{"item_id":"keyring-fix","text":"Enable gnome-keyring PAM module","summary":"keyring PAM"}}],
                "status":"ok","time":0.001}"#,
            )
            .create_async()
            .await;

        let store = QdrantVectorStore::new(server.url());
        let results = store.search(SOLUTIONS_COLLECTION, &[0.1, 0.2], 5, 0.3).await.unwrap();

        mock.assert_async().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id.as_str(), "keyring-fix");
        assert_eq!(results[0].collection, SOLUTIONS_COLLECTION);
        assert!((results[0].relevance_score - 0.82).abs() < 1e-9);
        assert_eq!(results[0].headline(), "keyring PAM");
    }

    #[tokio::test]
    async fn test_server_errors_are_classified() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/collections/patterns/points/search")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;
        server
            .mock("POST", "/collections/missing/points/search")
            .with_status(404)
            .create_async()
            .await;

        let store = QdrantVectorStore::new(server.url());
        let err = store.search("patterns", &[0.1], 5, 0.3).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Server { status: 503, .. }));

        let results = store.search("missing", &[0.1], 5, 0.3).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_creates_missing_collection() {
        let mut server = mockito::Server::new_async().await;
        let points = server
            .mock("PUT", "/collections/interactions/points")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .with_body(r#"{"status":{"error":"Not found: Collection `interactions` doesn't exist!"}}"#)
            .expect(2)
            .create_async()
            .await;
        let create = server
            .mock("PUT", "/collections/interactions")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"vectors":{"size":2,"distance":"Cosine"}}"#.to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"result":true,"status":"ok"}"#)
            .create_async()
            .await;

        let store = QdrantVectorStore::new(server.url());
        let item = ContextItem::new("interactions", vec![0.5, 0.5], ContextPayload::default());
        let err = store.upsert("interactions", &item).await.unwrap_err();

        // Points are retried once after the create; the mock keeps answering 404
        assert!(matches!(err, VectorStoreError::CollectionNotFound(_)));
        create.assert_async().await;
        points.assert_async().await;
    }

    #[tokio::test]
    async fn test_upsert_puts_point() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/collections/patterns/points")
            .match_query(mockito::Matcher::UrlEncoded("wait".into(), "true".into()))
            .with_status(200)
            .with_body(r#"{"result":{"operation_id":1,"status":"completed"},"status":"ok"}"#)
            .create_async()
            .await;

        let store = QdrantVectorStore::new(server.url());
        let item = ContextItem::new("patterns", vec![0.5, 0.5], ContextPayload::default());
        store.upsert("patterns", &item).await.unwrap();
        mock.assert_async().await;
    }

    #[test]
    fn test_point_id_is_stable_uuid() {
        let a = QdrantVectorStore::point_id(&ContextItemId::from("keyring-fix"));
        let b = QdrantVectorStore::point_id(&ContextItemId::from("keyring-fix"));
        assert_eq!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[tokio::test]
    async fn test_connection_refused_is_connection_error() {
        let store = QdrantVectorStore::new("http://127.0.0.1:1");
        let err = store.search(SOLUTIONS_COLLECTION, &[0.1], 5, 0.3).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Connection(_) | VectorStoreError::Timeout(_)));
    }
}
