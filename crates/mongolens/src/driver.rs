//! [`ExplainExecutor`] backed by the official MongoDB driver.
//!
//! Operations are re-issued as `explain` commands through
//! [`Database::run_command`](mongodb::Database::run_command), so no documents
//! are read or modified.

use bson::{Bson, Document, doc};
use mongodb::Database;

use crate::error::{LensError, LensResult};
use crate::instrument::ExplainExecutor;
use crate::operation::{Operation, OperationSpec};

/// Default explain verbosity. Only the planner section is needed.
pub const DEFAULT_VERBOSITY: &str = "queryPlanner";

/// Issues explain commands against one database.
#[derive(Debug, Clone)]
pub struct MongoExplainer {
    db: Database,
    verbosity: String,
}

impl MongoExplainer {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            verbosity: DEFAULT_VERBOSITY.to_string(),
        }
    }

    /// Override the explain verbosity (`queryPlanner`, `executionStats`, ...).
    pub fn with_verbosity(mut self, verbosity: impl Into<String>) -> Self {
        self.verbosity = verbosity.into();
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn run(&self, command: Document) -> LensResult<Document> {
        let command = to_driver(&doc! {
            "explain": command,
            "verbosity": self.verbosity.as_str(),
        })?;
        let response = self.db.run_command(command).await?;
        from_driver(&response)
    }
}

impl ExplainExecutor for MongoExplainer {
    async fn explain_query(&self, spec: &OperationSpec) -> LensResult<Document> {
        self.run(explain_command(spec)?).await
    }

    async fn explain_aggregate(&self, spec: &OperationSpec) -> LensResult<Vec<Document>> {
        let mut response = self.run(explain_command(spec)?).await?;
        // sharded and older servers list per-stage output under `stages`
        match response.remove("stages") {
            Some(Bson::Array(stages)) => Ok(stages
                .into_iter()
                .filter_map(|stage| match stage {
                    Bson::Document(doc) => Some(doc),
                    _ => None,
                })
                .collect()),
            _ => Ok(vec![response]),
        }
    }
}

/// The command to wrap in `explain` for `spec`.
///
/// The `explain` flag itself is not forwarded; every other option is.
pub fn explain_command(spec: &OperationSpec) -> LensResult<Document> {
    let collection = spec
        .collection
        .as_deref()
        .ok_or(LensError::MissingContext("collection"))?;
    let filter = spec.filter.clone().unwrap_or_default();
    let options: Document = spec
        .options
        .iter()
        .filter(|(key, _)| key.as_str() != "explain")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let mut command = match spec.operation {
        Operation::Find | Operation::FindOne => {
            let mut command = doc! { "find": collection, "filter": filter };
            if let Some(fields) = &spec.fields {
                command.insert("projection", fields.clone());
            }
            if spec.operation == Operation::FindOne {
                command.insert("limit", 1);
                command.insert("singleBatch", true);
            }
            command
        }
        Operation::FindOneAndUpdate => {
            let update = spec
                .update
                .clone()
                .ok_or_else(|| LensError::malformed("findOneAndUpdate without update"))?;
            let mut command = doc! { "findAndModify": collection, "query": filter, "update": update };
            if let Some(fields) = &spec.fields {
                command.insert("fields", fields.clone());
            }
            command
        }
        Operation::FindOneAndRemove | Operation::FindOneAndDelete => {
            let mut command = doc! { "findAndModify": collection, "query": filter, "remove": true };
            if let Some(fields) = &spec.fields {
                command.insert("fields", fields.clone());
            }
            command
        }
        Operation::Update | Operation::UpdateOne | Operation::UpdateMany => {
            let update = spec
                .update
                .clone()
                .ok_or_else(|| LensError::malformed("update without update document"))?;
            let multi = spec.operation == Operation::UpdateMany
                || (spec.operation == Operation::Update
                    && matches!(spec.options.get("multi"), Some(Bson::Boolean(true))));
            // statement-level options stay on the statement
            return Ok(doc! {
                "update": collection,
                "updates": [{ "q": filter, "u": update, "multi": multi }],
            });
        }
        Operation::DeleteOne | Operation::DeleteMany => {
            let limit = if spec.operation == Operation::DeleteOne { 1 } else { 0 };
            return Ok(doc! {
                "delete": collection,
                "deletes": [{ "q": filter, "limit": limit }],
            });
        }
        Operation::Count | Operation::CountDocuments => {
            doc! { "count": collection, "query": filter }
        }
        Operation::EstimatedDocumentCount => doc! { "count": collection },
        Operation::Aggregate => doc! {
            "aggregate": collection,
            "pipeline": spec.pipeline.clone(),
            "cursor": {},
        },
    };

    for (key, value) in options {
        if !command.contains_key(&key) {
            command.insert(key, value);
        }
    }
    Ok(command)
}

// The driver may be built against a different bson major than this crate,
// so documents cross the boundary as raw bytes.
fn to_driver(doc: &Document) -> LensResult<mongodb::bson::Document> {
    let mut buf = Vec::new();
    doc.to_writer(&mut buf)
        .map_err(|e| LensError::Serialization(e.to_string()))?;
    mongodb::bson::Document::from_reader(buf.as_slice())
        .map_err(|e| LensError::Serialization(e.to_string()))
}

fn from_driver(doc: &mongodb::bson::Document) -> LensResult<Document> {
    let mut buf = Vec::new();
    doc.to_writer(&mut buf)
        .map_err(|e| LensError::Serialization(e.to_string()))?;
    Document::from_reader(buf.as_slice()).map_err(|e| LensError::Serialization(e.to_string()))
}
