use bson::{Document, doc};
use mongolens::explain::{Emphasis, ExplainDocument, classify, flatten_winning_plan};
use mongolens::{
    ConsoleLogger, ExplainExecutor, Instrumentator, LensError, LensResult, LoggerConfig,
    LoggerSettings, Operation, OperationSpec,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Serves canned explain responses, or fails when none is set.
#[derive(Default)]
struct CannedExplainer {
    query: Option<Document>,
    aggregate: Option<Vec<Document>>,
}

impl ExplainExecutor for CannedExplainer {
    async fn explain_query(&self, _spec: &OperationSpec) -> LensResult<Document> {
        self.query
            .clone()
            .ok_or_else(|| LensError::explain("server selection timeout"))
    }

    async fn explain_aggregate(&self, _spec: &OperationSpec) -> LensResult<Vec<Document>> {
        self.aggregate
            .clone()
            .ok_or_else(|| LensError::explain("server selection timeout"))
    }
}

fn capture() -> (Arc<Mutex<Vec<String>>>, Instrumentator) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    let console = Arc::new(
        ConsoleLogger::new()
            .without_colors()
            .with_sink(move |line| sink.lock().unwrap().push(line.to_string())),
    );
    let config = LoggerConfig::new()
        .with_query_logger_arc(console.clone())
        .with_explain_logger_arc(console);
    (lines, Instrumentator::new(config))
}

async fn run(spec: OperationSpec, explainer: &CannedExplainer) -> Vec<String> {
    let (lines, instrumentator) = capture();
    let ctx = instrumentator.start(spec);
    instrumentator.on_complete(&ctx, explainer).await;
    lines.lock().unwrap().clone()
}

// ── Fixtures (queryPlanner sections as returned by a 7.0 server) ──

fn name_index_find() -> Document {
    doc! {
        "explainVersion": "1",
        "queryPlanner": {
            "namespace": "test.tasks",
            "parsedQuery": { "name": { "$eq": "john" } },
            "winningPlan": {
                "stage": "FETCH",
                "inputStage": {
                    "stage": "IXSCAN",
                    "keyPattern": { "name": 1 },
                    "indexName": "name_1",
                    "isMultiKey": false,
                    "direction": "forward",
                    "indexBounds": { "name": ["[\"john\", \"john\"]"] }
                }
            },
            "rejectedPlans": []
        },
        "command": { "find": "tasks", "filter": { "name": "john" }, "$db": "test" },
        "ok": 1.0
    }
}

fn full_scan_find() -> Document {
    doc! {
        "queryPlanner": {
            "namespace": "test.tasks",
            "parsedQuery": {},
            "winningPlan": { "stage": "COLLSCAN", "direction": "forward" },
            "rejectedPlans": []
        },
        "ok": 1.0
    }
}

fn skip_limit_find() -> Document {
    doc! {
        "queryPlanner": {
            "winningPlan": {
                "stage": "LIMIT",
                "limitAmount": 10,
                "inputStage": {
                    "stage": "SKIP",
                    "skipAmount": 5,
                    "inputStage": { "stage": "COLLSCAN", "direction": "forward" }
                }
            }
        },
        "ok": 1.0
    }
}

fn projection_find() -> Document {
    doc! {
        "queryPlanner": {
            "winningPlan": {
                "stage": "PROJECTION_SIMPLE",
                "transformBy": { "_id": 1 },
                "inputStage": { "stage": "COLLSCAN", "direction": "forward" }
            }
        },
        "ok": 1.0
    }
}

fn slot_engine_find() -> Document {
    doc! {
        "queryPlanner": {
            "namespace": "test.tasks",
            "winningPlan": {
                "queryPlan": {
                    "stage": "FETCH",
                    "planNodeId": 2,
                    "inputStage": {
                        "stage": "IXSCAN",
                        "planNodeId": 1,
                        "keyPattern": { "status": 1, "createdAt": -1 }
                    }
                },
                "slotBasedPlan": { "slots": "...", "stages": "..." }
            }
        },
        "ok": 1.0
    }
}

fn matched_aggregate() -> Vec<Document> {
    vec![
        doc! {
            "$cursor": {
                "queryPlanner": {
                    "namespace": "test.tasks",
                    "winningPlan": {
                        "stage": "PROJECTION_SIMPLE",
                        "inputStage": {
                            "stage": "FETCH",
                            "inputStage": { "stage": "IXSCAN", "keyPattern": { "name": 1 } }
                        }
                    }
                }
            }
        },
        doc! { "$group": { "_id": "$project", "count": { "$sum": 1 } } },
        doc! { "$sort": { "sortKey": { "count": -1 } } },
    ]
}

// ── End to end ──

#[tokio::test]
async fn indexed_find_logs_index_scan() {
    let explainer = CannedExplainer {
        query: Some(name_index_find()),
        ..Default::default()
    };
    let spec = OperationSpec::new(Operation::Find, "tasks").with_filter(doc! { "name": "john" });

    let lines = run(spec, &explainer).await;

    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains(r#"tasks.find({"name":"john"})"#));
    assert!(lines[1].contains(r#"IXSCAN {"name":1}"#));
}

#[tokio::test]
async fn unindexed_find_logs_collection_scan() {
    let explainer = CannedExplainer {
        query: Some(full_scan_find()),
        ..Default::default()
    };
    let lines = run(OperationSpec::new(Operation::Find, "tasks"), &explainer).await;

    assert!(lines[0].contains("tasks.find({})"));
    assert!(lines[1].contains(r#""stage": "COLLSCAN""#));
}

#[tokio::test]
async fn skip_and_limit_are_listed_with_the_scan() {
    let explainer = CannedExplainer {
        query: Some(skip_limit_find()),
        ..Default::default()
    };
    let spec = OperationSpec::new(Operation::Find, "tasks")
        .with_option("limit", 10)
        .with_option("skip", 5);

    let lines = run(spec, &explainer).await;

    assert!(lines[0].contains(r#"tasks.find({}, {"limit":10,"skip":5})"#));
    assert!(lines[1].starts_with("COLLSCAN: "));
    assert!(lines[1].contains(r#""skipAmount": 5"#));
    assert!(lines[1].contains(r#""limitAmount": 10"#));
}

#[tokio::test]
async fn projection_is_logged_and_listed() {
    let explainer = CannedExplainer {
        query: Some(projection_find()),
        ..Default::default()
    };
    let spec = OperationSpec::new(Operation::Find, "tasks").with_fields(doc! { "_id": 1 });

    let lines = run(spec, &explainer).await;

    assert!(lines[0].contains(r#"tasks.find({}, {"_id":1})"#));
    assert!(lines[1].contains(r#""stage": "PROJECTION_SIMPLE""#));
}

#[tokio::test]
async fn find_one_and_update_logs_update() {
    let explainer = CannedExplainer::default();
    let spec = OperationSpec::new(Operation::FindOneAndUpdate, "tasks")
        .with_filter(doc! { "name": "bob" })
        .with_update(doc! { "$set": { "name": "john" } });

    let lines = run(spec, &explainer).await;

    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(r#"tasks.findOneAndUpdate({"name":"bob"}, {"$set":{"name":"john"}})"#));
}

#[tokio::test]
async fn aggregate_plan_is_found_by_search() {
    let explainer = CannedExplainer {
        aggregate: Some(matched_aggregate()),
        ..Default::default()
    };
    let spec = OperationSpec::aggregate(
        "tasks",
        vec![
            doc! { "$match": { "name": "john" } },
            doc! { "$group": { "_id": "$project", "count": { "$sum": 1 } } },
        ],
    );

    let lines = run(spec, &explainer).await;

    assert!(lines[0].contains(r#"tasks.aggregate([{"$match":{"name":"john"}},"#));
    assert_eq!(lines[1], r#"IXSCAN {"name":1}"#);
}

#[tokio::test]
async fn failed_explain_keeps_query_line() {
    let explainer = CannedExplainer::default();
    let spec = OperationSpec::new(Operation::Find, "tasks").with_filter(doc! { "name": "john" });

    let lines = run(spec, &explainer).await;

    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(r#"tasks.find({"name":"john"})"#));
}

#[tokio::test]
async fn instrument_returns_before_the_plan_is_logged() {
    let (lines, instrumentator) = capture();
    let explainer = Arc::new(CannedExplainer {
        query: Some(full_scan_find()),
        ..Default::default()
    });

    let result = instrumentator
        .instrument(OperationSpec::new(Operation::Find, "tasks"), explainer, async {
            Ok::<_, String>("done")
        })
        .await;
    assert_eq!(result, Ok("done"));

    tokio::time::timeout(Duration::from_secs(5), async {
        while lines.lock().unwrap().len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("plan line");
    let lines = lines.lock().unwrap();
    assert!(lines[0].contains("tasks.find({})"));
    assert!(lines[1].starts_with("COLLSCAN: "));
}

#[tokio::test]
async fn long_in_lists_are_truncated_in_query_lines() {
    let ids: Vec<i32> = (0..150).collect();
    let spec = OperationSpec::new(Operation::DeleteMany, "tasks")
        .with_filter(doc! { "_id": { "$in": ids } });

    let lines = run(spec, &CannedExplainer::default()).await;

    assert!(lines[0].contains("99,\"50 more items…\"]"));
}

// ── Plan extraction without an instrumentator ──

#[test]
fn slot_engine_plans_are_unwrapped() {
    let plan = flatten_winning_plan(&slot_engine_find()).unwrap();
    assert_eq!(plan.stage_names(), vec!["IXSCAN", "FETCH"]);
    let summary = classify(Some(&plan)).summary().cloned().unwrap();
    assert_eq!(summary.emphasis, Emphasis::Favorable);
    assert_eq!(summary.text, r#"IXSCAN {"status":1,"createdAt":-1}"#);
}

#[test]
fn flatten_then_nest_keeps_stage_order() {
    let explain = skip_limit_find();
    let plan = flatten_winning_plan(&explain).unwrap();
    assert_eq!(plan.len(), 3);
    assert!(
        plan.stages()
            .iter()
            .all(|s| !s.document().contains_key("inputStage"))
    );

    let nested = plan.nest();
    let again = mongolens::explain::flatten_stage_tree(&nested).unwrap();
    assert_eq!(again.stage_names(), vec!["COLLSCAN", "SKIP", "LIMIT"]);
}

#[test]
fn aggregate_explain_yields_one_planner() {
    let explain = ExplainDocument::from(matched_aggregate());
    assert_eq!(explain.query_planners().len(), 1);
    assert_eq!(
        explain.winning_plan().unwrap().stage_names(),
        vec!["IXSCAN", "FETCH", "PROJECTION_SIMPLE"]
    );
}

// ── Settings ──

#[test]
fn settings_file_drives_configuration() {
    let path = std::env::temp_dir().join(format!("mongolens-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        r#"
target_operations = ["find", "aggregate", "countDocuments"]
explain_operations = ["aggregate"]
colors = false
"#,
    )
    .unwrap();

    let settings = LoggerSettings::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let config = LoggerConfig::from_settings(&settings).unwrap();
    assert!(config.is_target(Operation::CountDocuments));
    assert!(!config.is_explain_eligible(Operation::Find));
    assert!(config.is_explain_eligible(Operation::Aggregate));
}

#[test]
fn missing_settings_file_is_a_config_error() {
    let err = LoggerSettings::load("/nonexistent/mongolens.toml").unwrap_err();
    assert!(matches!(err, LensError::Config(_)));
}
