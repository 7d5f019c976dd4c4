use bson::{Bson, Document};
use std::fmt;

use crate::instrument::DIAGNOSTIC_TARGET;

/// Longest `inputStage` chain the flattener will follow.
pub const MAX_PLAN_DEPTH: usize = 128;

/// Field path of the winning plan inside a find-style explain response.
pub const WINNING_PLAN_PATH: [&str; 2] = ["queryPlanner", "winningPlan"];

const INPUT_STAGE: &str = "inputStage";

/// One step of an execution plan, with its `inputStage` link removed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStage(Document);

impl PlanStage {
    fn detached(node: &Document) -> Self {
        let mut doc = node.clone();
        doc.remove(INPUT_STAGE);
        Self(doc)
    }

    /// The stage discriminator (`IXSCAN`, `COLLSCAN`, `FETCH`, ...).
    pub fn stage(&self) -> Option<&str> {
        self.0.get_str("stage").ok()
    }

    /// Key pattern of an index scan.
    pub fn key_pattern(&self) -> Option<&Document> {
        self.0.get_document("keyPattern").ok()
    }

    pub fn document(&self) -> &Document {
        &self.0
    }
}

impl fmt::Display for PlanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stage().unwrap_or("?"))
    }
}

/// A winning plan flattened into a list, ordered leaf to root: index 0 is
/// the data-access stage, the last element is the stage producing output.
///
/// Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedPlan {
    stages: Vec<PlanStage>,
}

impl FlattenedPlan {
    pub fn stages(&self) -> &[PlanStage] {
        &self.stages
    }

    /// The innermost (data-access) stage.
    pub fn leaf(&self) -> &PlanStage {
        &self.stages[0]
    }

    /// The outermost (output) stage.
    pub fn root(&self) -> &PlanStage {
        &self.stages[self.stages.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Stage discriminators, leaf first.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.stage().unwrap_or("?")).collect()
    }

    /// The stage list as a BSON array, leaf first.
    pub fn to_bson(&self) -> Bson {
        Bson::Array(
            self.stages
                .iter()
                .map(|s| Bson::Document(s.document().clone()))
                .collect(),
        )
    }

    /// Rebuild the nested `inputStage` chain, root outermost.
    pub fn nest(&self) -> Document {
        let mut stages = self.stages.iter();
        // `stages` is never empty
        let mut current = stages.next().map(|s| s.document().clone()).unwrap_or_default();
        for stage in stages {
            let mut parent = stage.document().clone();
            parent.insert(INPUT_STAGE, current);
            current = parent;
        }
        current
    }
}

/// Flatten a stage tree starting at `root`.
///
/// Returns `None` when `root` is not a stage or the chain is deeper than
/// [`MAX_PLAN_DEPTH`].
pub fn flatten_stage_tree(root: &Document) -> Option<FlattenedPlan> {
    // Slot-based engine plans wrap the classic tree in `queryPlan`.
    let root = match (root.get("stage"), root.get_document("queryPlan")) {
        (None, Ok(query_plan)) => query_plan,
        _ => root,
    };
    if root.is_empty() {
        return None;
    }

    let mut stages = Vec::new();
    let mut current = root;
    loop {
        if stages.len() == MAX_PLAN_DEPTH {
            tracing::debug!(
                target: DIAGNOSTIC_TARGET,
                max_depth = MAX_PLAN_DEPTH,
                "plan chain exceeds depth cap"
            );
            return None;
        }
        stages.push(PlanStage::detached(current));
        match current.get(INPUT_STAGE) {
            Some(Bson::Document(child)) => current = child,
            _ => break,
        }
    }

    stages.reverse();
    Some(FlattenedPlan { stages })
}

/// Follow `path` from `doc` and flatten the stage tree found there.
pub fn flatten_at(doc: &Document, path: &[&str]) -> Option<FlattenedPlan> {
    let mut node = doc;
    for key in path {
        node = node.get_document(key).ok()?;
    }
    flatten_stage_tree(node)
}

/// Flatten the winning plan of an explain response.
///
/// Accepts either the whole response (`queryPlanner.winningPlan`) or an
/// already unwrapped plan descriptor (`winningPlan`). Logs a debug
/// diagnostic and returns `None` when neither is present.
pub fn flatten_winning_plan(doc: &Document) -> Option<FlattenedPlan> {
    let plan = flatten_at(doc, &WINNING_PLAN_PATH).or_else(|| flatten_at(doc, &WINNING_PLAN_PATH[1..]));
    if plan.is_none() {
        tracing::debug!(target: DIAGNOSTIC_TARGET, "no queryPlanner.winningPlan in explain output");
    }
    plan
}
