// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end augmentation behaviour over the in-memory store: caching across
//! sessions, token budgets, session monotonicity and the learning loop.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hybrid_coordinator_core::application::context_packing::estimate_tokens;
use hybrid_coordinator_core::application::{
    AugmentationSettings, ContextAugmentationService, FeedbackEvaluator, FeedbackRequest, InteractionRecorder,
    InteractionReport, RecorderSettings, SemanticCache, SessionContextManager,
};
use hybrid_coordinator_core::domain::augmentation::AugmentationRequest;
use hybrid_coordinator_core::domain::context::{
    ContextItem, ContextItemId, ContextLevel, ContextPayload, DOCUMENTATION_COLLECTION, PATTERNS_COLLECTION,
    SOLUTIONS_COLLECTION,
};
use hybrid_coordinator_core::domain::coordinator_config::{CircuitBreakerConfig, SummarizationKind};
use hybrid_coordinator_core::domain::embedding::{Embedder, EmbeddingError};
use hybrid_coordinator_core::domain::error::ErrorKind;
use hybrid_coordinator_core::domain::interaction::{Feedback, Outcome};
use hybrid_coordinator_core::domain::vector_store::VectorContextStore;
use hybrid_coordinator_core::infrastructure::embedding_client::HashingEmbedder;
use hybrid_coordinator_core::infrastructure::resilience::{CircuitBreakerRegistry, RetryExecutor, RetryPolicy};
use hybrid_coordinator_core::infrastructure::{EventBus, JsonlTelemetryLog, LruCacheStore};
use hybrid_coordinator_core::infrastructure::vector_store::InMemoryVectorStore;

/// Counts embedding calls so cache hits are observable
struct CountingEmbedder {
    inner: HashingEmbedder,
    calls: AtomicUsize,
}

#[async_trait]
impl Embedder for CountingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

const KNOWLEDGE: &[(&str, &str, &str)] = &[
    (
        DOCUMENTATION_COLLECTION,
        "doc-keyring-pam",
        "NixOS keyring error: enable gnome-keyring in the PAM configuration of the display manager",
    ),
    (
        DOCUMENTATION_COLLECTION,
        "doc-keyring-login",
        "Keyring error after login on NixOS: unlock the login keyring with the user password",
    ),
    (
        DOCUMENTATION_COLLECTION,
        "doc-secret-service",
        "The secret service API is provided by gnome-keyring or KeePassXC on NixOS desktops",
    ),
    (
        SOLUTIONS_COLLECTION,
        "sol-keyring-enable",
        "Fix NixOS keyring error by setting services.gnome.gnome-keyring.enable = true and rebuilding",
    ),
    (
        SOLUTIONS_COLLECTION,
        "sol-keyring-sway",
        "On sway the keyring error goes away once gnome-keyring-daemon is started from the session",
    ),
];

struct Harness {
    augmentation: ContextAugmentationService,
    recorder: InteractionRecorder,
    feedback: FeedbackEvaluator,
    sessions: Arc<SessionContextManager>,
    store: Arc<InMemoryVectorStore>,
    embedder: Arc<CountingEmbedder>,
    _dir: tempfile::TempDir,
}

async fn harness(session_budget: usize) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(CountingEmbedder {
        inner: HashingEmbedder::new(256),
        calls: AtomicUsize::new(0),
    });
    let store = Arc::new(InMemoryVectorStore::new());
    for (collection, id, text) in KNOWLEDGE {
        let mut item = ContextItem::new(
            *collection,
            embedder.inner.embed(text).await.unwrap(),
            ContextPayload {
                text: text.to_string(),
                ..Default::default()
            },
        );
        item.id = ContextItemId::from(*id);
        store.upsert(collection, &item).await.unwrap();
    }

    let sessions = Arc::new(SessionContextManager::new(Duration::from_secs(3600), session_budget));
    let breakers = Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig::default(), None));
    let retry = RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
        retryable: ErrorKind::DEFAULT_TRANSIENT.to_vec(),
    };

    let augmentation = ContextAugmentationService::new(
        sessions.clone(),
        Arc::new(SemanticCache::new(Arc::new(LruCacheStore::new(64)), Duration::from_secs(600))),
        store.clone(),
        embedder.clone(),
        breakers.clone(),
        AugmentationSettings {
            search_limit: 10,
            score_threshold: 0.05,
            call_timeout: Duration::from_secs(1),
            request_deadline: Duration::from_secs(5),
            retry: retry.clone(),
            summarization: SummarizationKind::PayloadSummary,
        },
    );

    let recorder = InteractionRecorder::new(
        sessions.clone(),
        store.clone(),
        embedder.clone(),
        Arc::new(JsonlTelemetryLog::new(dir.path().join("telemetry.jsonl"))),
        breakers,
        RetryExecutor::new(retry),
        EventBus::new(64),
        RecorderSettings {
            promotion_threshold: 0.7,
            novelty_threshold: 0.95,
            call_timeout: Duration::from_secs(1),
        },
    );

    Harness {
        augmentation,
        recorder,
        feedback: FeedbackEvaluator::new(sessions.clone()),
        sessions,
        store,
        embedder,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_identical_query_from_new_session_is_served_from_cache() {
    let h = harness(32_000).await;

    let first = h
        .augmentation
        .augment(AugmentationRequest::new("alice", "NixOS keyring error", ContextLevel::Standard, 1500))
        .await
        .unwrap();
    let embeds_after_first = h.embedder.calls.load(Ordering::SeqCst);

    // Differs only in case and whitespace, so the fingerprint matches
    let second = h
        .augmentation
        .augment(AugmentationRequest::new("bob", "  nixos   KEYRING error ", ContextLevel::Standard, 1500))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), embeds_after_first);

    // The cached answer still counts against bob's session
    let bob = h.sessions.get("bob").await.unwrap();
    assert_eq!(bob.queries.len(), 1);
    for id in &second.context_ids {
        assert!(bob.has_returned(id));
    }
}

#[tokio::test]
async fn test_token_count_never_exceeds_budget() {
    let h = harness(1_000_000).await;
    let levels = [ContextLevel::Standard, ContextLevel::Detailed, ContextLevel::Comprehensive];

    for (n, budget) in [1usize, 8, 25, 60, 150, 4000].into_iter().enumerate() {
        for level in levels {
            let session = format!("budget-{}-{}", n, level);
            let result = h
                .augmentation
                .augment(AugmentationRequest::new(session, "NixOS keyring error", level, budget))
                .await
                .unwrap();

            assert!(
                result.token_count <= budget,
                "{} tokens for budget {} at {}",
                result.token_count,
                budget,
                level
            );
            assert!(estimate_tokens(&result.context_text) <= result.token_count);
            assert_eq!(result.context_ids.is_empty(), result.context_text.is_empty());
        }
    }
}

#[tokio::test]
async fn test_session_never_sees_an_item_twice() {
    let h = harness(32_000).await;
    let queries = [
        "NixOS keyring error",
        "keyring error after login",
        "gnome-keyring NixOS",
        "NixOS keyring error",
    ];

    let mut seen = HashSet::new();
    for (turn, query) in queries.iter().enumerate() {
        let result = h
            .augmentation
            .augment(AugmentationRequest::new("carol", *query, ContextLevel::Detailed, 2000))
            .await
            .unwrap();
        for id in result.context_ids {
            assert!(seen.insert(id.clone()), "{} returned twice", id);
        }

        let session = h.sessions.get("carol").await.unwrap();
        assert_eq!(session.queries.len(), turn + 1);
        assert_eq!(session.returned_item_ids.len(), seen.len());
    }
}

#[tokio::test]
async fn test_session_budget_caps_lifetime_tokens() {
    let h = harness(60).await;

    let mut total = 0;
    for query in ["NixOS keyring error", "keyring error after login", "secret service NixOS"] {
        let result = h
            .augmentation
            .augment(AugmentationRequest::new("dave", query, ContextLevel::Standard, 2000))
            .await
            .unwrap();
        total += result.token_count;
    }

    assert!(total <= 60);
    assert_eq!(h.sessions.get("dave").await.unwrap().token_budget_remaining, 60 - total);
}

#[tokio::test]
async fn test_keyring_session_learns_a_pattern() {
    let h = harness(32_000).await;

    let first = h
        .augmentation
        .augment(AugmentationRequest::new("erin", "NixOS keyring error", ContextLevel::Standard, 1500))
        .await
        .unwrap();
    assert!(!first.context_ids.is_empty());
    assert!(first.suggestions.len() <= 3);

    let evaluation = h
        .feedback
        .evaluate(&FeedbackRequest {
            session_id: "erin".to_string(),
            confidence: 0.65,
            gaps: vec!["PAM configuration".to_string()],
        })
        .await
        .unwrap();
    assert!(evaluation.should_refine);
    assert_eq!(evaluation.suggested_queries, vec!["NixOS keyring error PAM configuration"]);

    let refined = h
        .augmentation
        .augment(AugmentationRequest::new(
            "erin",
            evaluation.suggested_queries[0].clone(),
            ContextLevel::Detailed,
            1500,
        ))
        .await
        .unwrap();
    assert!(refined.context_ids.iter().all(|id| !first.context_ids.contains(id)));

    let confident = h
        .feedback
        .evaluate(&FeedbackRequest {
            session_id: "erin".to_string(),
            confidence: 0.85,
            gaps: vec![],
        })
        .await
        .unwrap();
    assert!(!confident.should_refine);

    let mut metadata = serde_json::Map::new();
    metadata.insert("complexity".to_string(), serde_json::json!(0.9));
    let recorded = h
        .recorder
        .record(InteractionReport {
            session_id: "erin".to_string(),
            final_response: "Enable the keyring so the display manager unlocks it at login, then rebuild \
                the system and log in again to pick up the change:\n\
                - set `services.gnome.gnome-keyring.enable = true`\n\
                $ sudo nixos-rebuild switch\n"
                .to_string(),
            outcome: Outcome::Success,
            user_feedback: Feedback::Positive,
            metadata,
        })
        .await
        .unwrap();

    assert_eq!(recorded.interaction.turns, 2);
    assert!(recorded.value_score.composite >= 0.7);
    let pattern_id = recorded.promoted.expect("interaction should be promoted");

    // Recording closed the session
    assert!(h.sessions.get("erin").await.is_none());

    let patterns = h.store.items(PATTERNS_COLLECTION).await;
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].payload.summary, "NixOS keyring error");

    let later = h
        .augmentation
        .augment(AugmentationRequest::new("frank", "NixOS keyring error fix", ContextLevel::Detailed, 4000))
        .await
        .unwrap();
    assert!(later.context_ids.contains(&pattern_id));
    assert!(later.collections_searched.iter().any(|c| c == PATTERNS_COLLECTION));
}
