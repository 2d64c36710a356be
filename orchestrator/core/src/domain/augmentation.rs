// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Request and response shapes of the context augmentation protocol

use serde::{Deserialize, Serialize};

use crate::domain::context::{ContextItemId, ContextLevel};
use crate::domain::error::CoordinatorError;

pub const DEFAULT_MAX_TOKENS: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentationRequest {
    pub session_id: String,
    pub query: String,
    #[serde(default)]
    pub context_level: ContextLevel,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default)]
    pub previous_context_ids: Vec<ContextItemId>,
}

impl AugmentationRequest {
    pub fn new(session_id: impl Into<String>, query: impl Into<String>, context_level: ContextLevel, max_tokens: usize) -> Self {
        Self {
            session_id: session_id.into(),
            query: query.into(),
            context_level,
            max_tokens,
            previous_context_ids: Vec::new(),
        }
    }

    /// Reject requests that cannot be served under any dependency state
    pub fn validate(&self) -> Result<(), CoordinatorError> {
        if self.session_id.trim().is_empty() {
            return Err(CoordinatorError::Configuration("session_id cannot be empty".to_string()));
        }
        if self.query.trim().is_empty() {
            return Err(CoordinatorError::Configuration("query cannot be empty".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(CoordinatorError::Configuration("max_tokens must be greater than zero".to_string()));
        }
        Ok(())
    }
}

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

/// Packed context returned to the caller, also the value held by the semantic cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentedContext {
    pub context_text: String,
    pub context_ids: Vec<ContextItemId>,
    pub suggestions: Vec<String>,
    pub token_count: usize,
    pub collections_searched: Vec<String>,
}
