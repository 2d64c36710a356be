// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Composite value scoring for closed interactions

use crate::domain::interaction::{Feedback, Interaction, ValueScore};

const STRUCTURE_MIN_WORDS: usize = 20;

#[derive(Debug, Clone, Copy)]
pub struct ValueScorer {
    /// Pattern similarity at or above which an interaction is not novel
    novelty_threshold: f64,
}

impl ValueScorer {
    pub fn new(novelty_threshold: f64) -> Self {
        Self {
            novelty_threshold: novelty_threshold.clamp(0.0, 1.0),
        }
    }

    pub fn novelty_threshold(&self) -> f64 {
        self.novelty_threshold
    }

    /// `best_pattern_similarity` is the similarity of the closest existing
    /// pattern, `None` when the patterns collection holds nothing comparable
    pub fn score(&self, interaction: &Interaction, best_pattern_similarity: Option<f64>) -> ValueScore {
        ValueScore::from_factors(
            interaction.complexity,
            reusability(interaction),
            self.novelty(best_pattern_similarity),
            confirmation(interaction.explicit_feedback),
            impact(interaction),
        )
    }

    pub fn novelty(&self, best_pattern_similarity: Option<f64>) -> f64 {
        match best_pattern_similarity {
            None => 1.0,
            Some(similarity) if similarity >= self.novelty_threshold => 0.0,
            Some(similarity) => (1.0 - similarity).clamp(0.0, 1.0),
        }
    }
}

fn confirmation(feedback: Feedback) -> f64 {
    match feedback {
        Feedback::Positive => 1.0,
        Feedback::Neutral | Feedback::Negative => 0.0,
    }
}

/// Outcome plus how reusable the response text looks: lists, code or
/// commands, and enough substance to stand on its own
fn reusability(interaction: &Interaction) -> f64 {
    let response = interaction.final_response.as_str();
    let has_list = response.lines().any(|line| {
        let line = line.trim_start();
        line.starts_with("- ")
            || line.starts_with("* ")
            || line
                .split_once(". ")
                .is_some_and(|(n, _)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
    });
    let has_code = response.contains("```")
        || response.contains('`')
        || response.lines().any(|line| line.trim_start().starts_with('$'));
    let substantial = response.split_whitespace().count() >= STRUCTURE_MIN_WORDS;

    let structure = [has_list, has_code, substantial].iter().filter(|b| **b).count() as f64 / 3.0;
    0.6 * interaction.outcome.weight() + 0.4 * structure
}

fn impact(interaction: &Interaction) -> f64 {
    let feedback_factor = match interaction.explicit_feedback {
        Feedback::Positive => 1.0,
        Feedback::Neutral => 0.7,
        Feedback::Negative => 0.0,
    };
    interaction.outcome.weight() * feedback_factor
}
