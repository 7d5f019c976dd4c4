use bson::Bson;
use std::fmt;

use super::plan::FlattenedPlan;
use crate::format::{self, DEFAULT_MAX_ARRAY_ITEMS};

/// How a plan line should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    /// Data is read through an index.
    Favorable,
    /// Full collection scan.
    Unfavorable,
    /// Anything else.
    Neutral,
}

impl fmt::Display for Emphasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Emphasis::Favorable => "favorable",
            Emphasis::Unfavorable => "unfavorable",
            Emphasis::Neutral => "neutral",
        })
    }
}

/// A plan worth logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub emphasis: Emphasis,
    pub text: String,
}

/// Outcome of classifying a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanVerdict {
    /// Nothing to log (no plan, or a plain `_id` lookup).
    Suppress,
    Report(PlanSummary),
}

impl PlanVerdict {
    pub fn summary(&self) -> Option<&PlanSummary> {
        match self {
            PlanVerdict::Suppress => None,
            PlanVerdict::Report(summary) => Some(summary),
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, PlanVerdict::Suppress)
    }
}

/// Classify a flattened plan by its data-access (leaf) stage.
pub fn classify(plan: Option<&FlattenedPlan>) -> PlanVerdict {
    classify_with_limit(plan, DEFAULT_MAX_ARRAY_ITEMS)
}

/// [`classify`] with an explicit array-truncation cap for the rendered stages.
pub fn classify_with_limit(plan: Option<&FlattenedPlan>, max_items: usize) -> PlanVerdict {
    let Some(plan) = plan else {
        return PlanVerdict::Suppress;
    };

    let leaf = plan.leaf();
    let (emphasis, text) = match leaf.stage() {
        // primary-key lookups would flood the log
        Some("IDHACK") => return PlanVerdict::Suppress,
        Some("IXSCAN") => {
            let key_pattern = leaf
                .key_pattern()
                .map(|kp| format::document_to_json(kp, max_items))
                .unwrap_or_else(|| "null".to_string());
            (Emphasis::Favorable, format!("IXSCAN {key_pattern}"))
        }
        Some("COLLSCAN") => (
            Emphasis::Unfavorable,
            format!("COLLSCAN: {}", render_stages(plan, max_items)),
        ),
        _ => (
            Emphasis::Neutral,
            format!("Stages: {}", render_stages(plan, max_items)),
        ),
    };

    PlanVerdict::Report(PlanSummary { emphasis, text })
}

fn render_stages(plan: &FlattenedPlan, max_items: usize) -> String {
    let stages: Bson = plan.to_bson();
    format::to_pretty_json(&stages, max_items)
}
