// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Value scoring bounds and the promotion rule as seen through the recorder.

use std::sync::Arc;
use std::time::Duration;

use hybrid_coordinator_core::application::value_scorer::ValueScorer;
use hybrid_coordinator_core::application::{
    InteractionRecorder, InteractionReport, RecorderSettings, SessionContextManager,
};
use hybrid_coordinator_core::domain::context::{INTERACTIONS_COLLECTION, PATTERNS_COLLECTION};
use hybrid_coordinator_core::domain::coordinator_config::CircuitBreakerConfig;
use hybrid_coordinator_core::domain::interaction::{Feedback, Interaction, Outcome, ValueScore};
use hybrid_coordinator_core::domain::telemetry::TelemetryLog;
use hybrid_coordinator_core::infrastructure::embedding_client::HashingEmbedder;
use hybrid_coordinator_core::infrastructure::resilience::{CircuitBreakerRegistry, RetryExecutor};
use hybrid_coordinator_core::infrastructure::vector_store::InMemoryVectorStore;
use hybrid_coordinator_core::infrastructure::{EventBus, JsonlTelemetryLog};

const STRUCTURED_RESPONSE: &str = "Restart the daemon after freeing the port, then confirm that the \
health endpoint answers before routing traffic back to it:\n\
- stop the stale container\n\
$ docker restart qdrant\n";

#[test]
fn test_value_score_stays_within_bounds() {
    let scorer = ValueScorer::new(0.9);
    let responses = ["ok", STRUCTURED_RESPONSE];
    let outcomes = [Outcome::Success, Outcome::Partial, Outcome::Failure];
    let feedback = [Feedback::Negative, Feedback::Neutral, Feedback::Positive];
    let similarities = [None, Some(0.0), Some(0.5), Some(0.95), Some(1.0)];

    for response in responses {
        for outcome in outcomes {
            for fb in feedback {
                for similarity in similarities {
                    let interaction = Interaction::new(
                        "s",
                        vec!["docker port conflict".to_string()],
                        response,
                        outcome,
                        fb,
                        None,
                    );
                    let score = scorer.score(&interaction, similarity);
                    for factor in [
                        score.complexity,
                        score.reusability,
                        score.novelty,
                        score.confirmation,
                        score.impact,
                        score.composite,
                    ] {
                        assert!((0.0..=1.0).contains(&factor), "{:?}", score);
                    }

                    let weighted = ValueScore::COMPLEXITY_WEIGHT * score.complexity
                        + ValueScore::REUSABILITY_WEIGHT * score.reusability
                        + ValueScore::NOVELTY_WEIGHT * score.novelty
                        + ValueScore::CONFIRMATION_WEIGHT * score.confirmation
                        + ValueScore::IMPACT_WEIGHT * score.impact;
                    assert!((weighted - score.composite).abs() < 1e-9);
                }
            }
        }
    }
}

struct Harness {
    recorder: InteractionRecorder,
    sessions: Arc<SessionContextManager>,
    store: Arc<InMemoryVectorStore>,
    telemetry: Arc<JsonlTelemetryLog>,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let sessions = Arc::new(SessionContextManager::new(Duration::from_secs(3600), 32_000));
    let store = Arc::new(InMemoryVectorStore::new());
    let telemetry = Arc::new(JsonlTelemetryLog::new(dir.path().join("telemetry.jsonl")));
    let recorder = InteractionRecorder::new(
        sessions.clone(),
        store.clone(),
        Arc::new(HashingEmbedder::new(128)),
        telemetry.clone(),
        Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig::default(), None)),
        RetryExecutor::default(),
        EventBus::new(64),
        RecorderSettings {
            promotion_threshold: 0.7,
            novelty_threshold: 0.9,
            call_timeout: Duration::from_secs(1),
        },
    );
    Harness {
        recorder,
        sessions,
        store,
        telemetry,
        _dir: dir,
    }
}

fn report(session_id: &str, outcome: Outcome, feedback: Feedback, complexity: f64) -> InteractionReport {
    let mut metadata = serde_json::Map::new();
    metadata.insert("complexity".to_string(), serde_json::json!(complexity));
    InteractionReport {
        session_id: session_id.to_string(),
        final_response: STRUCTURED_RESPONSE.to_string(),
        outcome,
        user_feedback: feedback,
        metadata,
    }
}

#[tokio::test]
async fn test_promotion_follows_composite_threshold() {
    let h = harness();
    h.sessions
        .acquire("good")
        .await
        .record_turn("docker port conflict", &[], 10);
    h.sessions
        .acquire("weak")
        .await
        .record_turn("docker port conflict on restart", &[], 10);

    let good = h
        .recorder
        .record(report("good", Outcome::Success, Feedback::Positive, 1.0))
        .await
        .unwrap();
    assert!(good.value_score.composite >= 0.7);
    assert!(good.promoted.is_some());

    let weak = h
        .recorder
        .record(report("weak", Outcome::Partial, Feedback::Negative, 0.0))
        .await
        .unwrap();
    assert!(weak.value_score.composite < 0.7);
    assert!(weak.promoted.is_none());

    assert_eq!(h.store.count(PATTERNS_COLLECTION).await, 1);
    assert_eq!(h.store.count(INTERACTIONS_COLLECTION).await, 2);
}

#[tokio::test]
async fn test_failures_are_logged_but_not_indexed() {
    let h = harness();

    let recorded = h
        .recorder
        .record(report("never-seen", Outcome::Failure, Feedback::Negative, 0.2))
        .await
        .unwrap();

    assert!(recorded.interaction.query_sequence.is_empty());
    assert_eq!(recorded.interaction.turns, 0);
    assert!(recorded.promoted.is_none());
    assert_eq!(h.store.count(INTERACTIONS_COLLECTION).await, 0);

    let records = h.telemetry.read_all().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, "interaction");
    assert_eq!(records[0].session_id.as_deref(), Some("never-seen"));
}
