//! Operation verbs and the records that describe one invocation.

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::LensError;

/// A database operation verb that can be instrumented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Find,
    FindOne,
    FindOneAndUpdate,
    FindOneAndRemove,
    FindOneAndDelete,
    Update,
    UpdateOne,
    UpdateMany,
    DeleteOne,
    DeleteMany,
    Count,
    CountDocuments,
    EstimatedDocumentCount,
    Aggregate,
}

/// How an operation is timed and explained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationCategory {
    /// Filter-based reads and writes; explained by re-issuing the same call.
    Query,
    /// Count-family verbs; timed like queries, not explained by default.
    Count,
    /// Aggregation pipelines; explained through a separate aggregate call.
    Aggregate,
}

impl Operation {
    /// Every supported verb, in declaration order.
    pub const ALL: [Operation; 14] = [
        Operation::Find,
        Operation::FindOne,
        Operation::FindOneAndUpdate,
        Operation::FindOneAndRemove,
        Operation::FindOneAndDelete,
        Operation::Update,
        Operation::UpdateOne,
        Operation::UpdateMany,
        Operation::DeleteOne,
        Operation::DeleteMany,
        Operation::Count,
        Operation::CountDocuments,
        Operation::EstimatedDocumentCount,
        Operation::Aggregate,
    ];

    /// The camelCase name used by drivers and in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Find => "find",
            Operation::FindOne => "findOne",
            Operation::FindOneAndUpdate => "findOneAndUpdate",
            Operation::FindOneAndRemove => "findOneAndRemove",
            Operation::FindOneAndDelete => "findOneAndDelete",
            Operation::Update => "update",
            Operation::UpdateOne => "updateOne",
            Operation::UpdateMany => "updateMany",
            Operation::DeleteOne => "deleteOne",
            Operation::DeleteMany => "deleteMany",
            Operation::Count => "count",
            Operation::CountDocuments => "countDocuments",
            Operation::EstimatedDocumentCount => "estimatedDocumentCount",
            Operation::Aggregate => "aggregate",
        }
    }

    pub fn category(self) -> OperationCategory {
        match self {
            Operation::Count | Operation::CountDocuments | Operation::EstimatedDocumentCount => {
                OperationCategory::Count
            }
            Operation::Aggregate => OperationCategory::Aggregate,
            _ => OperationCategory::Query,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = LensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| LensError::config(format!("unknown operation: {s}")))
    }
}

/// The in-flight operation as seen by the host layer.
///
/// The host fills this in when its pre-operation hook fires; the
/// instrumentator reads it again on completion and when re-issuing explain.
#[derive(Debug, Clone)]
pub struct OperationSpec {
    pub operation: Operation,
    /// Target collection. `None` makes instrumentation a no-op for the call.
    pub collection: Option<String>,
    pub filter: Option<Document>,
    /// Aggregation pipeline (only meaningful for [`Operation::Aggregate`]).
    pub pipeline: Vec<Document>,
    /// Projection.
    pub fields: Option<Document>,
    pub options: Document,
    /// Update document or update pipeline.
    pub update: Option<Bson>,
    /// Arbitrary value attached by the caller for logging.
    pub additional_properties: Option<Bson>,
}

impl OperationSpec {
    pub fn new(operation: Operation, collection: impl Into<String>) -> Self {
        Self {
            operation,
            collection: Some(collection.into()),
            filter: None,
            pipeline: Vec::new(),
            fields: None,
            options: Document::new(),
            update: None,
            additional_properties: None,
        }
    }

    /// An aggregate over `collection`. The collection is the owning model's,
    /// not a per-stage namespace.
    pub fn aggregate(collection: impl Into<String>, pipeline: Vec<Document>) -> Self {
        Self {
            pipeline,
            ..Self::new(Operation::Aggregate, collection)
        }
    }

    /// A spec with no collection bound (e.g. a hook fired before the model was resolved).
    pub fn unbound(operation: Operation) -> Self {
        Self {
            collection: None,
            ..Self::new(operation, String::new())
        }
    }

    pub fn with_filter(mut self, filter: Document) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_fields(mut self, fields: Document) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_options(mut self, options: Document) -> Self {
        self.options = options;
        self
    }

    /// Set a single option, keeping the others.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn with_update(mut self, update: impl Into<Bson>) -> Self {
        self.update = Some(update.into());
        self
    }

    pub fn with_additional_properties(mut self, value: impl Into<Bson>) -> Self {
        self.additional_properties = Some(value.into());
        self
    }

    /// Whether the caller already asked the server for an explain plan.
    pub fn explain_requested(&self) -> bool {
        matches!(self.options.get("explain"), Some(Bson::Boolean(true)))
    }

    /// A copy of this spec with `explain: true` merged into its options.
    pub fn with_explain_flag(&self) -> Self {
        let mut spec = self.clone();
        spec.options.insert("explain", true);
        spec
    }

    /// The value logged as the operation's filter: the pipeline for
    /// aggregates, the filter document otherwise.
    pub(crate) fn logged_filter(&self) -> Option<Bson> {
        match self.operation {
            Operation::Aggregate => Some(Bson::Array(
                self.pipeline.iter().cloned().map(Bson::Document).collect(),
            )),
            _ => self.filter.clone().map(Bson::Document),
        }
    }
}

/// One completed, timed operation. Built once per invocation and handed to
/// loggers by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationEvent {
    pub operation: Operation,
    pub collection_name: String,
    pub execution_time_ms: u64,
    pub filter: Option<Bson>,
    pub fields: Option<Document>,
    pub options: Document,
    pub update: Option<Bson>,
    pub additional_properties: Option<Bson>,
}

impl OperationEvent {
    pub(crate) fn from_spec(
        spec: &OperationSpec,
        collection_name: &str,
        elapsed: Duration,
        include_additional: bool,
    ) -> Self {
        Self {
            operation: spec.operation,
            collection_name: collection_name.to_string(),
            execution_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            filter: spec.logged_filter(),
            fields: spec.fields.clone(),
            options: spec.options.clone(),
            update: spec.update.clone(),
            additional_properties: if include_additional {
                spec.additional_properties.clone()
            } else {
                None
            },
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.execution_time_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn operation_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
        assert!("insertMany".parse::<Operation>().is_err());
    }

    #[test]
    fn categories() {
        assert_eq!(Operation::Find.category(), OperationCategory::Query);
        assert_eq!(Operation::DeleteMany.category(), OperationCategory::Query);
        assert_eq!(
            Operation::EstimatedDocumentCount.category(),
            OperationCategory::Count
        );
        assert_eq!(Operation::Aggregate.category(), OperationCategory::Aggregate);
    }

    #[test]
    fn explain_flag_is_merged_into_options() {
        let spec = OperationSpec::new(Operation::Find, "tasks")
            .with_filter(doc! { "name": "john" })
            .with_option("limit", 10);
        assert!(!spec.explain_requested());

        let explained = spec.with_explain_flag();
        assert!(explained.explain_requested());
        assert_eq!(explained.options.get_i32("limit").unwrap(), 10);
        // the original stays untouched
        assert!(spec.options.get("explain").is_none());
    }

    #[test]
    fn aggregate_logs_pipeline_as_filter() {
        let spec = OperationSpec::aggregate("tasks", vec![doc! { "$match": { "name": "john" } }]);
        let event = OperationEvent::from_spec(&spec, "tasks", Duration::from_millis(7), false);
        assert_eq!(
            event.filter,
            Some(Bson::Array(vec![Bson::Document(doc! { "$match": { "name": "john" } })]))
        );
        assert_eq!(event.execution_time_ms, 7);
    }

    #[test]
    fn additional_properties_are_opt_in() {
        let spec = OperationSpec::new(Operation::Find, "tasks").with_additional_properties("req-1");
        let hidden = OperationEvent::from_spec(&spec, "tasks", Duration::ZERO, false);
        let shown = OperationEvent::from_spec(&spec, "tasks", Duration::ZERO, true);
        assert_eq!(hidden.additional_properties, None);
        assert_eq!(shown.additional_properties, Some(Bson::String("req-1".into())));
    }
}
