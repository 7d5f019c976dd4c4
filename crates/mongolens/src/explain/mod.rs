//! Explain-plan extraction and classification.
//!
//! Raw explain output goes through three steps:
//! - [`find_query_planners`] locates plan descriptors anywhere in the response
//! - [`flatten_winning_plan`] turns a descriptor's winning plan into a
//!   leaf-first [`FlattenedPlan`]
//! - [`classify`] decides whether the plan is worth a log line and how loud
//!
//! # Example
//!
//! ```rust,ignore
//! use mongolens::explain::{ExplainDocument, classify};
//!
//! let explain = ExplainDocument::from(raw_response);
//! if let Some(summary) = classify(explain.winning_plan().as_ref()).summary() {
//!     println!("[{}] {}", summary.emphasis, summary.text);
//! }
//! ```

mod classify;
mod locate;
mod plan;

pub use classify::{Emphasis, PlanSummary, PlanVerdict, classify, classify_with_limit};
pub use locate::{MAX_SEARCH_DEPTH, QUERY_PLANNER, find_plan_descriptors, find_query_planners};
pub use plan::{
    FlattenedPlan, MAX_PLAN_DEPTH, PlanStage, WINNING_PLAN_PATH, flatten_at, flatten_stage_tree,
    flatten_winning_plan,
};

use bson::Document;

use crate::instrument::DIAGNOSTIC_TARGET;

/// Raw response of a re-issued explain call.
///
/// Find-style explains return one document with `queryPlanner` at the top;
/// aggregate explains return one document per pipeline stage with the
/// planner nested at a depth that depends on the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ExplainDocument {
    Single(Document),
    Stages(Vec<Document>),
}

impl ExplainDocument {
    pub fn documents(&self) -> &[Document] {
        match self {
            ExplainDocument::Single(doc) => std::slice::from_ref(doc),
            ExplainDocument::Stages(docs) => docs,
        }
    }

    /// All plan descriptors in the response, in document order.
    pub fn query_planners(&self) -> Vec<&Document> {
        find_query_planners(self.documents())
    }

    /// The flattened winning plan of the first descriptor that has one.
    pub fn winning_plan(&self) -> Option<FlattenedPlan> {
        let plan = self
            .query_planners()
            .into_iter()
            .find_map(|planner| flatten_at(planner, &WINNING_PLAN_PATH[1..]));
        if plan.is_none() {
            tracing::debug!(target: DIAGNOSTIC_TARGET, "explain output carries no winning plan");
        }
        plan
    }
}

impl From<Document> for ExplainDocument {
    fn from(doc: Document) -> Self {
        ExplainDocument::Single(doc)
    }
}

impl From<Vec<Document>> for ExplainDocument {
    fn from(docs: Vec<Document>) -> Self {
        ExplainDocument::Stages(docs)
    }
}
