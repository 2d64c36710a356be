// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Interaction Recorder
//!
//! Closes a session into an [`Interaction`], scores it and feeds the
//! long-term knowledge store:
//!
//! - every interaction is appended to the telemetry log
//! - interactions that did not fail are stored in the `interactions`
//!   collection for comprehensive-level retrieval
//! - interactions whose composite score reaches the promotion threshold become
//!   a new item in the `patterns` collection, with the score in its payload
//!
//! The recorder and the healing orchestrator are the only writers of
//! long-lived knowledge; the augmentation path only reads it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::application::session_manager::SessionContextManager;
use crate::application::value_scorer::ValueScorer;
use crate::domain::context::{ContextItem, ContextItemId, ContextPayload, INTERACTIONS_COLLECTION, PATTERNS_COLLECTION};
use crate::domain::embedding::Embedder;
use crate::domain::error::CoordinatorError;
use crate::domain::events::LearningEvent;
use crate::domain::interaction::{Feedback, Interaction, Outcome, ValueScore};
use crate::domain::telemetry::{TelemetryLog, TelemetryRecord};
use crate::domain::vector_store::VectorContextStore;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::resilience::{CircuitBreakerRegistry, DependencyGuard, RetryExecutor};
use crate::application::augmentation::{vector_store_dependency, EMBEDDING_DEPENDENCY};

/// Body of `POST /interactions/record`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionReport {
    pub session_id: String,
    pub final_response: String,
    pub outcome: Outcome,
    #[serde(default)]
    pub user_feedback: Feedback,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl InteractionReport {
    pub fn validate(&self) -> Result<(), CoordinatorError> {
        if self.session_id.trim().is_empty() {
            return Err(CoordinatorError::Configuration("session_id cannot be empty".to_string()));
        }
        Ok(())
    }

    /// `metadata.complexity`, when the caller knows better than the estimate
    fn complexity_override(&self) -> Option<f64> {
        self.metadata.get("complexity").and_then(serde_json::Value::as_f64)
    }
}

#[derive(Debug, Clone)]
pub struct RecordedInteraction {
    pub interaction: Interaction,
    pub value_score: ValueScore,
    pub promoted: Option<ContextItemId>,
}

#[derive(Debug, Clone, Copy)]
pub struct RecorderSettings {
    pub promotion_threshold: f64,
    pub novelty_threshold: f64,
    pub call_timeout: Duration,
}

pub struct InteractionRecorder {
    sessions: Arc<SessionContextManager>,
    store: Arc<dyn VectorContextStore>,
    embedder: Arc<dyn Embedder>,
    telemetry: Arc<dyn TelemetryLog>,
    breakers: Arc<CircuitBreakerRegistry>,
    retry: RetryExecutor,
    event_bus: EventBus,
    scorer: ValueScorer,
    settings: RecorderSettings,
}

impl InteractionRecorder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<SessionContextManager>,
        store: Arc<dyn VectorContextStore>,
        embedder: Arc<dyn Embedder>,
        telemetry: Arc<dyn TelemetryLog>,
        breakers: Arc<CircuitBreakerRegistry>,
        retry: RetryExecutor,
        event_bus: EventBus,
        settings: RecorderSettings,
    ) -> Self {
        Self {
            sessions,
            store,
            embedder,
            telemetry,
            breakers,
            retry,
            event_bus,
            scorer: ValueScorer::new(settings.novelty_threshold),
            settings,
        }
    }

    /// Close the reported session and record it
    pub async fn record(&self, report: InteractionReport) -> Result<RecordedInteraction, CoordinatorError> {
        report.validate()?;
        let queries = match self.sessions.close(&report.session_id).await {
            Some(session) => session.queries,
            None => {
                warn!(session_id = %report.session_id, "Recording interaction for unknown session");
                Vec::new()
            }
        };

        let interaction = Interaction::new(
            report.session_id.clone(),
            queries,
            report.final_response.clone(),
            report.outcome,
            report.user_feedback,
            report.complexity_override(),
        );
        self.record_interaction(interaction, report.metadata).await
    }

    /// Score, archive and conditionally promote an already-built interaction
    pub async fn record_interaction(
        &self,
        interaction: Interaction,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<RecordedInteraction, CoordinatorError> {
        let document = interaction_document(&interaction);
        let vector = match self.embed(&document).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(session_id = %interaction.session_id, error = %e, "Embedding failed, interaction will not be indexed");
                None
            }
        };

        let best_similarity = match &vector {
            Some(vector) => match self.closest_pattern(vector).await {
                Ok(similarity) => similarity,
                Err(e) => {
                    // Unknown novelty must not earn the novelty weight toward promotion
                    warn!(
                        session_id = %interaction.session_id,
                        error = %e,
                        "Pattern similarity lookup failed, scoring interaction as not novel"
                    );
                    Some(1.0)
                }
            },
            None => None,
        };
        let value_score = self.scorer.score(&interaction, best_similarity);

        // The telemetry append is unconditional; indexing below is best effort
        let record = TelemetryRecord::for_session(
            "interaction",
            interaction.session_id.clone(),
            json!({
                "interaction": interaction,
                "value_score": value_score,
                "metadata": metadata,
            }),
        );
        if let Err(e) = self.telemetry.append(&record).await {
            warn!(session_id = %interaction.session_id, error = %e, "Failed to append interaction to telemetry log");
        }

        metrics::counter!("hcoord_interactions_recorded_total", "outcome" => interaction.outcome.as_str())
            .increment(1);
        self.event_bus.publish_learning_event(LearningEvent::InteractionRecorded {
            session_id: interaction.session_id.clone(),
            outcome: interaction.outcome,
            value_score,
            recorded_at: Utc::now(),
        });

        let mut promoted = None;
        if let Some(vector) = vector {
            if interaction.outcome != Outcome::Failure {
                let item = interaction_item(INTERACTIONS_COLLECTION, &interaction, &value_score, vector.clone(), &metadata);
                if let Err(e) = self.upsert(INTERACTIONS_COLLECTION, &item).await {
                    warn!(session_id = %interaction.session_id, error = %e, "Failed to index interaction history");
                }
            }

            if value_score.qualifies_for_promotion(self.settings.promotion_threshold) {
                let item = interaction_item(PATTERNS_COLLECTION, &interaction, &value_score, vector, &metadata);
                match self.upsert(PATTERNS_COLLECTION, &item).await {
                    Ok(()) => {
                        info!(
                            session_id = %interaction.session_id,
                            item_id = %item.id,
                            composite = value_score.composite,
                            "Promoted interaction to patterns"
                        );
                        metrics::counter!("hcoord_patterns_promoted_total").increment(1);
                        self.event_bus.publish_learning_event(LearningEvent::PatternPromoted {
                            session_id: interaction.session_id.clone(),
                            item_id: item.id.clone(),
                            composite: value_score.composite,
                            promoted_at: Utc::now(),
                        });
                        promoted = Some(item.id);
                    }
                    Err(e) => {
                        warn!(session_id = %interaction.session_id, error = %e, "Pattern promotion failed");
                    }
                }
            }
        }

        Ok(RecordedInteraction {
            interaction,
            value_score,
            promoted,
        })
    }

    fn guard(&self, dependency: &str) -> DependencyGuard {
        DependencyGuard::new(self.breakers.get(dependency), self.retry.clone(), self.settings.call_timeout)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CoordinatorError> {
        self.guard(EMBEDDING_DEPENDENCY)
            .run("embed", || self.embedder.embed(text))
            .await
    }

    /// Similarity of the closest stored pattern, `None` when there is none
    async fn closest_pattern(&self, vector: &[f32]) -> Result<Option<f64>, CoordinatorError> {
        let items = self
            .guard(&vector_store_dependency(PATTERNS_COLLECTION))
            .run("pattern_similarity", || self.store.search(PATTERNS_COLLECTION, vector, 1, 0.0))
            .await?;
        Ok(items.first().map(|item| item.relevance_score))
    }

    async fn upsert(&self, collection: &str, item: &ContextItem) -> Result<(), CoordinatorError> {
        self.guard(&vector_store_dependency(collection))
            .run("vector_upsert", || self.store.upsert(collection, item))
            .await
    }
}

/// Originating query plus final response, the text that gets embedded
fn interaction_document(interaction: &Interaction) -> String {
    let query = interaction.originating_query();
    if query.is_empty() {
        interaction.final_response.clone()
    } else {
        format!("{}\n\n{}", query, interaction.final_response)
    }
}

fn interaction_item(
    collection: &str,
    interaction: &Interaction,
    value_score: &ValueScore,
    vector: Vec<f32>,
    metadata: &serde_json::Map<String, serde_json::Value>,
) -> ContextItem {
    let mut payload_metadata = metadata.clone();
    payload_metadata.insert("session_id".to_string(), json!(interaction.session_id));
    payload_metadata.insert("outcome".to_string(), json!(interaction.outcome));
    payload_metadata.insert("turns".to_string(), json!(interaction.turns));
    payload_metadata.insert("value_score".to_string(), json!(value_score));

    let query = interaction.originating_query();
    let summary = if query.is_empty() {
        interaction.final_response.lines().next().unwrap_or("").to_string()
    } else {
        query.to_string()
    };

    ContextItem::new(
        collection,
        vector,
        ContextPayload {
            text: interaction_document(interaction),
            summary,
            metadata: payload_metadata,
        },
    )
}
