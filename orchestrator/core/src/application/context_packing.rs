// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Context Packing
//!
//! Renders ranked [`ContextItem`]s at the requested [`ContextLevel`] and packs
//! them greedily into a token budget. Items that do not fit are skipped so a
//! smaller, lower-ranked item can still use the remaining budget. At the
//! comprehensive level an overflowing item first goes through a
//! [`Summarizer`] before being dropped.

use std::sync::Arc;

use crate::domain::context::{ContextItem, ContextItemId, ContextLevel};
use crate::domain::coordinator_config::SummarizationKind;

/// Rough token estimate: one token per four characters, rounded up
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Fallback used when a comprehensive-level block overflows the budget.
/// Returns a block of at most `budget` tokens, or `None` to drop the item.
pub trait Summarizer: Send + Sync {
    fn condense(&self, item: &ContextItem, budget: usize) -> Option<String>;
}

/// Replace the full text with the stored payload summary
pub struct PayloadSummarizer;

impl Summarizer for PayloadSummarizer {
    fn condense(&self, item: &ContextItem, budget: usize) -> Option<String> {
        let summary = item.payload.summary.trim();
        if summary.is_empty() {
            return None;
        }
        let block = format!("## {} [{}]\n{}\n", item.headline(), item.collection, summary);
        (estimate_tokens(&block) <= budget).then_some(block)
    }
}

/// Cut the full text at a word boundary so the block fits
pub struct TruncatingSummarizer {
    /// Below this many tokens a truncated block is not worth returning
    pub min_tokens: usize,
}

impl Default for TruncatingSummarizer {
    fn default() -> Self {
        Self { min_tokens: 16 }
    }
}

impl Summarizer for TruncatingSummarizer {
    fn condense(&self, item: &ContextItem, budget: usize) -> Option<String> {
        if budget < self.min_tokens {
            return None;
        }
        let header = format!("## {} [{}]\n", item.headline(), item.collection);
        let marker = " [...]\n";
        let max_chars = (budget * 4).checked_sub(header.chars().count() + marker.chars().count())?;

        let mut body = String::new();
        for word in item.payload.text.split_whitespace() {
            let needed = if body.is_empty() { word.chars().count() } else { word.chars().count() + 1 };
            if body.chars().count() + needed > max_chars {
                break;
            }
            if !body.is_empty() {
                body.push(' ');
            }
            body.push_str(word);
        }
        if body.is_empty() {
            return None;
        }
        let block = format!("{}{}{}", header, body, marker);
        (estimate_tokens(&block) <= budget).then_some(block)
    }
}

pub fn summarizer_for(kind: SummarizationKind) -> Arc<dyn Summarizer> {
    match kind {
        SummarizationKind::PayloadSummary => Arc::new(PayloadSummarizer),
        SummarizationKind::Truncate => Arc::new(TruncatingSummarizer::default()),
    }
}

pub fn format_item(item: &ContextItem, level: ContextLevel) -> String {
    match level {
        ContextLevel::Standard => format!("- {}\n", item.headline()),
        ContextLevel::Detailed => {
            let mut block = format!(
                "- {} [{}, relevance {:.2}]\n",
                item.headline(),
                item.collection,
                item.relevance_score
            );
            let summary = item.payload.summary.trim();
            if !summary.is_empty() && summary != item.headline() {
                block.push_str(&format!("  summary: {}\n", summary));
            }
            for (key, value) in &item.payload.metadata {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                block.push_str(&format!("  {}: {}\n", key, value));
            }
            block
        }
        ContextLevel::Comprehensive => {
            format!("## {} [{}]\n{}\n", item.headline(), item.collection, item.payload.text.trim())
        }
    }
}

#[derive(Debug, Default)]
pub struct PackedContext {
    pub text: String,
    pub ids: Vec<ContextItemId>,
    /// Sum of per-block estimates, never above the budget
    pub token_count: usize,
    /// Ranked items that did not fit
    pub omitted: Vec<ContextItem>,
}

pub fn pack(items: Vec<ContextItem>, level: ContextLevel, budget: usize, summarizer: &dyn Summarizer) -> PackedContext {
    let mut packed = PackedContext::default();
    for item in items {
        let remaining = budget - packed.token_count;
        if remaining == 0 {
            packed.omitted.push(item);
            continue;
        }

        let block = format_item(&item, level);
        let block = if estimate_tokens(&block) <= remaining {
            Some(block)
        } else if level == ContextLevel::Comprehensive {
            summarizer
                .condense(&item, remaining)
                .filter(|condensed| estimate_tokens(condensed) <= remaining)
        } else {
            None
        };

        match block {
            Some(block) => {
                packed.token_count += estimate_tokens(&block);
                packed.text.push_str(&block);
                packed.ids.push(item.id);
            }
            None => packed.omitted.push(item),
        }
    }
    packed
}
