//! Console and tracing output for a few operations, without a server.
//!
//! Run with `RUST_LOG=mongolens=debug cargo run --example console_logging`.

use bson::{Document, doc};
use mongolens::{
    CompositeLogger, ConsoleLogger, ExplainExecutor, Instrumentator, LensResult, LoggerConfig,
    Operation, OperationSpec, TracingLogger,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{filter::EnvFilter, fmt};

/// Pretends `tasks` has an index on `name` and nothing else.
struct DemoExplainer;

impl ExplainExecutor for DemoExplainer {
    async fn explain_query(&self, spec: &OperationSpec) -> LensResult<Document> {
        let by_name = spec
            .filter
            .as_ref()
            .is_some_and(|f| f.contains_key("name"));
        let by_id = spec.filter.as_ref().is_some_and(|f| f.contains_key("_id"));
        let winning_plan = if by_id {
            doc! { "stage": "IDHACK" }
        } else if by_name {
            doc! {
                "stage": "FETCH",
                "inputStage": { "stage": "IXSCAN", "keyPattern": { "name": 1 }, "indexName": "name_1" }
            }
        } else {
            doc! { "stage": "COLLSCAN", "direction": "forward" }
        };
        Ok(doc! { "queryPlanner": { "namespace": "demo.tasks", "winningPlan": winning_plan }, "ok": 1.0 })
    }

    async fn explain_aggregate(&self, _spec: &OperationSpec) -> LensResult<Vec<Document>> {
        Ok(vec![
            doc! {
                "$cursor": {
                    "queryPlanner": {
                        "winningPlan": {
                            "stage": "SORT",
                            "sortPattern": { "count": -1 },
                            "inputStage": { "stage": "COLLSCAN", "direction": "forward" }
                        }
                    }
                }
            },
            doc! { "$group": { "_id": "$project", "count": { "$sum": 1 } } },
        ])
    }
}

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .init();

    let console = Arc::new(ConsoleLogger::new());
    let logger = Arc::new(
        CompositeLogger::new()
            .add_query_arc(console.clone())
            .add_explain_arc(console)
            .add(TracingLogger::new()),
    );
    let instrumentator = Instrumentator::new(
        LoggerConfig::new()
            .with_query_logger_arc(logger.clone())
            .with_explain_logger_arc(logger),
    );
    let explainer = Arc::new(DemoExplainer);

    let operations = vec![
        OperationSpec::new(Operation::Find, "tasks").with_filter(doc! { "name": "john" }),
        OperationSpec::new(Operation::FindOne, "tasks").with_filter(doc! { "_id": 42 }),
        OperationSpec::new(Operation::Find, "tasks")
            .with_filter(doc! { "done": false })
            .with_option("limit", 10),
        OperationSpec::new(Operation::CountDocuments, "tasks"),
        OperationSpec::aggregate(
            "tasks",
            vec![
                doc! { "$group": { "_id": "$project", "count": { "$sum": 1 } } },
                doc! { "$sort": { "count": -1 } },
            ],
        ),
    ];

    let mut explains = Vec::new();
    for spec in operations {
        let ctx = instrumentator.start(spec);
        tokio::time::sleep(Duration::from_millis(15)).await;
        explains.extend(instrumentator.complete_detached(ctx, explainer.clone()));
    }
    for handle in explains {
        if let Err(e) = handle.await {
            eprintln!("explain task failed: {e}");
        }
    }
}
