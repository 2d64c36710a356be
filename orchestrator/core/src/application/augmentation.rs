// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Context Augmentation Service
//!
//! Answers an [`AugmentationRequest`] with budget-constrained context:
//!
//! 1. lock the session (created on first use)
//! 2. serve from the semantic cache when the cached result fits the budget
//!    and repeats nothing the session already received
//! 3. embed the query and search every collection of the requested level in
//!    parallel, each behind its own circuit breaker and retry policy
//! 4. drop already-delivered ids, merge, rank, pack into the budget
//! 5. commit the turn to the session and write through to the cache,
//!    unless exclusions or a reduced session budget shaped the result
//!
//! Every remote call runs under the per-call timeout and the whole request
//! under the overall deadline. Session and cache writes happen only after a
//! result is complete, so an abandoned request leaves no partial state.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Multi-turn retrieval with progressive disclosure

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::application::context_packing::{pack, summarizer_for, PackedContext, Summarizer};
use crate::application::semantic_cache::SemanticCache;
use crate::application::session_manager::SessionContextManager;
use crate::domain::augmentation::{AugmentationRequest, AugmentedContext};
use crate::domain::cache::{normalize_query, Fingerprint};
use crate::domain::context::{ContextItem, ContextItemId, ContextLevel};
use crate::domain::coordinator_config::{CoordinatorConfigSpec, SummarizationKind};
use crate::domain::embedding::Embedder;
use crate::domain::error::{CoordinatorError, ErrorKind};
use crate::domain::vector_store::VectorContextStore;
use crate::infrastructure::resilience::{CircuitBreakerRegistry, DependencyGuard, RetryExecutor, RetryPolicy};

pub const EMBEDDING_DEPENDENCY: &str = "embedding";

const MAX_SUGGESTIONS: usize = 3;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "how", "what", "why", "when", "does", "not", "this", "that", "from", "into",
    "are", "was", "can",
];

/// Breaker id guarding searches of one collection
pub fn vector_store_dependency(collection: &str) -> String {
    format!("vector_store:{}", collection)
}

#[derive(Debug, Clone)]
pub struct AugmentationSettings {
    pub search_limit: usize,
    pub score_threshold: f64,
    pub call_timeout: Duration,
    pub request_deadline: Duration,
    pub retry: RetryPolicy,
    pub summarization: SummarizationKind,
}

impl AugmentationSettings {
    pub fn from_config(spec: &CoordinatorConfigSpec) -> Self {
        Self {
            search_limit: spec.vector_store.search_limit,
            score_threshold: spec.vector_store.score_threshold,
            call_timeout: spec.vector_store.call_timeout,
            request_deadline: spec.augmentation.request_deadline,
            retry: RetryPolicy::from(&spec.resilience.retry),
            summarization: spec.augmentation.summarization,
        }
    }
}

pub struct ContextAugmentationService {
    sessions: Arc<SessionContextManager>,
    cache: Arc<SemanticCache>,
    store: Arc<dyn VectorContextStore>,
    embedder: Arc<dyn Embedder>,
    breakers: Arc<CircuitBreakerRegistry>,
    retry: RetryExecutor,
    summarizer: Arc<dyn Summarizer>,
    settings: AugmentationSettings,
}

impl ContextAugmentationService {
    pub fn new(
        sessions: Arc<SessionContextManager>,
        cache: Arc<SemanticCache>,
        store: Arc<dyn VectorContextStore>,
        embedder: Arc<dyn Embedder>,
        breakers: Arc<CircuitBreakerRegistry>,
        settings: AugmentationSettings,
    ) -> Self {
        Self {
            sessions,
            cache,
            store,
            embedder,
            breakers,
            retry: RetryExecutor::new(settings.retry.clone()),
            summarizer: summarizer_for(settings.summarization),
            settings,
        }
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub async fn augment(&self, request: AugmentationRequest) -> Result<AugmentedContext, CoordinatorError> {
        request.validate()?;
        let started = std::time::Instant::now();
        let deadline = Instant::now() + self.settings.request_deadline;
        let level = request.context_level;

        let mut session = self.sessions.acquire(&request.session_id).await;
        let budget = session.effective_budget(request.max_tokens);
        let excluded: HashSet<ContextItemId> = session
            .returned_item_ids
            .iter()
            .chain(request.previous_context_ids.iter())
            .cloned()
            .collect();

        let cached = self
            .cache
            .lookup_usable(&request.query, level, |entry| {
                entry.result.token_count <= budget && !entry.result.context_ids.iter().any(|id| excluded.contains(id))
            })
            .await;
        if let Some(entry) = cached {
            session.record_turn(&request.query, &entry.result.context_ids, entry.result.token_count);
            debug!(
                session_id = %request.session_id,
                hit_count = entry.hit_count,
                "Served augmentation from semantic cache"
            );
            record_duration(started, "cache");
            return Ok(entry.result);
        }

        let vector = match timeout_at(deadline, self.embed(&request.query)).await {
            Ok(Ok(vector)) => vector,
            Ok(Err(e)) => return Err(CoordinatorError::ContextUnavailable(format!("query embedding failed: {}", e))),
            Err(_) => {
                return Err(CoordinatorError::ContextUnavailable(
                    "request deadline exceeded while embedding query".to_string(),
                ))
            }
        };

        let collections = level.collections();
        let searches = collections
            .iter()
            .map(|collection| self.search_collection(collection, &vector, deadline));
        let results = futures::future::join_all(searches).await;

        let mut collections_searched = Vec::new();
        let mut candidates: HashMap<ContextItemId, ContextItem> = HashMap::new();
        let mut filtered = false;
        for (collection, result) in collections.iter().zip(results) {
            match result {
                Ok(items) => {
                    collections_searched.push(collection.to_string());
                    for item in items {
                        if excluded.contains(&item.id) {
                            filtered = true;
                            continue;
                        }
                        match candidates.entry(item.id.clone()) {
                            Entry::Occupied(mut existing) => {
                                if item.relevance_score > existing.get().relevance_score {
                                    existing.insert(item);
                                }
                            }
                            Entry::Vacant(slot) => {
                                slot.insert(item);
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        session_id = %request.session_id,
                        collection,
                        error = %e,
                        "Collection unavailable, continuing with partial results"
                    );
                }
            }
        }

        if collections_searched.is_empty() {
            return Err(CoordinatorError::ContextUnavailable(format!(
                "all {} collections for level {} are unavailable",
                collections.len(),
                level
            )));
        }
        let degraded = collections_searched.len() < collections.len();

        let mut ranked: Vec<ContextItem> = candidates.into_values().collect();
        rank(&mut ranked);
        let packed = pack(ranked, level, budget, self.summarizer.as_ref());
        let suggestions = suggest_follow_ups(&request.query, level, &packed);

        let result = AugmentedContext {
            context_text: packed.text,
            context_ids: packed.ids,
            suggestions,
            token_count: packed.token_count,
            collections_searched,
        };

        session.record_turn(&request.query, &result.context_ids, result.token_count);
        drop(session);

        // Only results every fresh caller would also get are shared
        let caller_specific = filtered || budget < request.max_tokens;
        if !degraded && !caller_specific && !result.context_ids.is_empty() {
            self.cache
                .store(Fingerprint::compute(&request.query, level), result.clone())
                .await;
        }

        info!(
            session_id = %request.session_id,
            level = %level,
            items = result.context_ids.len(),
            token_count = result.token_count,
            budget,
            degraded,
            filtered,
            "Augmented query context"
        );
        record_duration(started, "search");
        Ok(result)
    }

    async fn embed(&self, query: &str) -> Result<Vec<f32>, CoordinatorError> {
        let guard = DependencyGuard::new(
            self.breakers.get(EMBEDDING_DEPENDENCY),
            self.retry.clone(),
            self.settings.call_timeout,
        );
        guard.run("embed", || self.embedder.embed(query)).await
    }

    async fn search_collection(
        &self,
        collection: &str,
        vector: &[f32],
        deadline: Instant,
    ) -> Result<Vec<ContextItem>, CoordinatorError> {
        let dependency = vector_store_dependency(collection);
        let guard = DependencyGuard::new(
            self.breakers.get(&dependency),
            self.retry.clone(),
            self.settings.call_timeout,
        );
        let search = guard.run("vector_search", || {
            self.store
                .search(collection, vector, self.settings.search_limit, self.settings.score_threshold)
        });

        match timeout_at(deadline, search).await {
            Ok(result) => result,
            Err(_) => Err(CoordinatorError::TransientDependency {
                dependency,
                kind: ErrorKind::Timeout,
                message: "request deadline exceeded".to_string(),
            }),
        }
    }
}

fn record_duration(started: std::time::Instant, source: &'static str) {
    metrics::histogram!("hcoord_augment_duration_seconds", "source" => source).record(started.elapsed().as_secs_f64());
}

/// Relevance descending, then newest first, then id for a stable order
pub fn rank(items: &mut [ContextItem]) {
    items.sort_by(|a, b| {
        b.relevance_score
            .total_cmp(&a.relevance_score)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Follow-up queries for what the delivered context did not cover
fn suggest_follow_ups(query: &str, level: ContextLevel, packed: &PackedContext) -> Vec<String> {
    let mut suggestions: Vec<String> = Vec::new();

    if !packed.ids.is_empty() {
        let delivered = packed.text.to_lowercase();
        let uncovered: Vec<String> = normalize_query(query)
            .split(' ')
            .filter(|term| term.chars().count() >= 3 && !STOP_WORDS.iter().any(|w| w == term) && !delivered.contains(term))
            .map(str::to_string)
            .collect();
        if !uncovered.is_empty() {
            suggestions.push(uncovered.join(" "));
        }
    }

    if let Some(omitted) = packed.omitted.first() {
        let headline = omitted.headline().trim();
        if !headline.is_empty() {
            suggestions.push(headline.to_string());
        }
    }

    if let Some(deeper) = level.deeper() {
        suggestions.push(format!("{} ({} context)", query.trim(), deeper));
    }

    let mut seen = HashSet::new();
    suggestions.retain(|s| seen.insert(s.clone()));
    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}
