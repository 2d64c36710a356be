// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Confidence feedback: should the caller refine, and with which queries

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::application::session_manager::SessionContextManager;
use crate::domain::error::CoordinatorError;

/// Below this confidence the caller is told to refine
pub const REFINE_BELOW: f64 = 0.80;

const MAX_SUGGESTED_QUERIES: usize = 3;
const GAIN_PER_GAP: f64 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub session_id: String,
    pub confidence: f64,
    #[serde(default)]
    pub gaps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvaluation {
    pub suggested_queries: Vec<String>,
    pub estimated_confidence_increase: f64,
    pub should_refine: bool,
}

pub struct FeedbackEvaluator {
    sessions: Arc<SessionContextManager>,
}

impl FeedbackEvaluator {
    pub fn new(sessions: Arc<SessionContextManager>) -> Self {
        Self { sessions }
    }

    pub async fn evaluate(&self, request: &FeedbackRequest) -> Result<FeedbackEvaluation, CoordinatorError> {
        if !request.confidence.is_finite() || !(0.0..=1.0).contains(&request.confidence) {
            return Err(CoordinatorError::Configuration(format!(
                "confidence must be within [0, 1], got {}",
                request.confidence
            )));
        }

        let last_query = self
            .sessions
            .get(&request.session_id)
            .await
            .and_then(|session| session.last_query().map(str::to_string));

        Ok(evaluate_feedback(request.confidence, &request.gaps, last_query.as_deref()))
    }
}

pub fn evaluate_feedback(confidence: f64, gaps: &[String], last_query: Option<&str>) -> FeedbackEvaluation {
    let gaps: Vec<&str> = gaps.iter().map(|g| g.trim()).filter(|g| !g.is_empty()).collect();

    let mut suggested_queries: Vec<String> = gaps
        .iter()
        .map(|gap| match last_query {
            Some(query) => format!("{} {}", query.trim(), gap),
            None => gap.to_string(),
        })
        .collect();
    if suggested_queries.is_empty() {
        if let Some(query) = last_query {
            suggested_queries.push(format!("{} examples", query.trim()));
        }
    }
    suggested_queries.dedup();
    suggested_queries.truncate(MAX_SUGGESTED_QUERIES);

    let headroom = (1.0 - confidence).max(0.0);
    let estimated_confidence_increase = (GAIN_PER_GAP * gaps.len() as f64).min(headroom).max(0.0);

    FeedbackEvaluation {
        suggested_queries,
        estimated_confidence_increase,
        should_refine: confidence < REFINE_BELOW,
    }
}
