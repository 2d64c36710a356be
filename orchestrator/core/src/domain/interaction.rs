// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Interactions & Value Scores
//!
//! An [`Interaction`] is the immutable record of a closed session: the query
//! sequence, the final response and how it went. A [`ValueScore`] is derived
//! from it (never persisted on its own) and decides whether the interaction
//! is promoted into the `patterns` collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Partial,
    Failure,
}

impl Outcome {
    /// Contribution of the outcome to reusability and impact
    pub fn weight(&self) -> f64 {
        match self {
            Outcome::Success => 1.0,
            Outcome::Partial => 0.5,
            Outcome::Failure => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Partial => "partial",
            Outcome::Failure => "failure",
        }
    }
}

/// Explicit user feedback, carried on the wire as -1, 0 or 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Feedback {
    Negative,
    Neutral,
    Positive,
}

impl TryFrom<i8> for Feedback {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Feedback::Negative),
            0 => Ok(Feedback::Neutral),
            1 => Ok(Feedback::Positive),
            other => Err(format!("feedback must be -1, 0 or 1, got {}", other)),
        }
    }
}

impl From<Feedback> for i8 {
    fn from(value: Feedback) -> Self {
        match value {
            Feedback::Negative => -1,
            Feedback::Neutral => 0,
            Feedback::Positive => 1,
        }
    }
}

impl Default for Feedback {
    fn default() -> Self {
        Feedback::Neutral
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub session_id: String,
    pub query_sequence: Vec<String>,
    pub final_response: String,
    pub outcome: Outcome,
    pub explicit_feedback: Feedback,
    pub turns: usize,
    /// Normalized to [0, 1]
    pub complexity: f64,
    pub closed_at: DateTime<Utc>,
}

impl Interaction {
    /// Build an interaction, deriving `turns` and `complexity` from the content
    /// unless a complexity override is supplied
    pub fn new(
        session_id: impl Into<String>,
        query_sequence: Vec<String>,
        final_response: impl Into<String>,
        outcome: Outcome,
        explicit_feedback: Feedback,
        complexity_override: Option<f64>,
    ) -> Self {
        let final_response = final_response.into();
        let turns = query_sequence.len();
        let complexity = complexity_override
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or_else(|| estimate_complexity(&query_sequence, &final_response));

        Self {
            session_id: session_id.into(),
            query_sequence,
            final_response,
            outcome,
            explicit_feedback,
            turns,
            complexity,
            closed_at: Utc::now(),
        }
    }

    /// The query the final response answers
    pub fn originating_query(&self) -> &str {
        self.query_sequence.first().map(String::as_str).unwrap_or("")
    }
}

/// Turn count, query vocabulary and response length, each saturating
fn estimate_complexity(queries: &[String], response: &str) -> f64 {
    let turns = (queries.len() as f64 / 5.0).min(1.0);

    let mut vocabulary: Vec<String> = queries
        .iter()
        .flat_map(|q| q.split_whitespace())
        .map(|t| t.to_lowercase())
        .collect();
    vocabulary.sort();
    vocabulary.dedup();
    let breadth = (vocabulary.len() as f64 / 30.0).min(1.0);

    let length = (response.split_whitespace().count() as f64 / 300.0).min(1.0);

    (0.4 * turns + 0.3 * breadth + 0.3 * length).clamp(0.0, 1.0)
}

/// Composite quality score of an interaction. Every factor is in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueScore {
    pub complexity: f64,
    pub reusability: f64,
    pub novelty: f64,
    pub confirmation: f64,
    pub impact: f64,
    pub composite: f64,
}

impl ValueScore {
    pub const COMPLEXITY_WEIGHT: f64 = 0.2;
    pub const REUSABILITY_WEIGHT: f64 = 0.3;
    pub const NOVELTY_WEIGHT: f64 = 0.2;
    pub const CONFIRMATION_WEIGHT: f64 = 0.15;
    pub const IMPACT_WEIGHT: f64 = 0.15;

    pub fn from_factors(complexity: f64, reusability: f64, novelty: f64, confirmation: f64, impact: f64) -> Self {
        let complexity = complexity.clamp(0.0, 1.0);
        let reusability = reusability.clamp(0.0, 1.0);
        let novelty = novelty.clamp(0.0, 1.0);
        let confirmation = confirmation.clamp(0.0, 1.0);
        let impact = impact.clamp(0.0, 1.0);

        let composite = Self::COMPLEXITY_WEIGHT * complexity
            + Self::REUSABILITY_WEIGHT * reusability
            + Self::NOVELTY_WEIGHT * novelty
            + Self::CONFIRMATION_WEIGHT * confirmation
            + Self::IMPACT_WEIGHT * impact;

        Self {
            complexity,
            reusability,
            novelty,
            confirmation,
            impact,
            composite: composite.clamp(0.0, 1.0),
        }
    }

    pub fn qualifies_for_promotion(&self, threshold: f64) -> bool {
        self.composite >= threshold
    }
}
