use crate::cli::{ExplainArgs, Input};
use crate::config_cmd::load_settings;
use anyhow::Context;
use bson::{Bson, Document};
use colored::Colorize;
use mongolens::explain::{Emphasis, ExplainDocument, PlanVerdict, classify_with_limit};
use std::io::Read;

pub fn run(args: ExplainArgs) -> anyhow::Result<()> {
    let settings = load_settings(&args.config, args.config_explicit)?;
    let raw = read_input(&args.input)?;
    let explain = parse_explain(&raw, args.aggregate)?;

    let colors = settings.colors && !args.no_color;
    for line in report(&explain, settings.max_array_items, colors) {
        println!("{line}");
    }
    Ok(())
}

fn read_input(input: &Input) -> anyhow::Result<String> {
    match input {
        Input::Stdin => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| anyhow::anyhow!("failed to read stdin: {e}"))?;
            Ok(buf)
        }
        Input::File(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Parse explain JSON: an object, or an array of stage documents.
pub fn parse_explain(raw: &str, aggregate: bool) -> anyhow::Result<ExplainDocument> {
    if raw.trim().is_empty() {
        anyhow::bail!("no explain output provided");
    }
    let value: serde_json::Value =
        serde_json::from_str(raw).context("explain output is not valid JSON")?;

    match value {
        serde_json::Value::Array(_) => {
            let docs: Vec<Document> = serde_json::from_value(value)
                .context("explain array must contain only documents")?;
            Ok(ExplainDocument::Stages(docs))
        }
        serde_json::Value::Object(_) => {
            let doc: Document = serde_json::from_value(value)?;
            if aggregate && let Ok(stages) = doc.get_array("stages") {
                let docs = stages
                    .iter()
                    .filter_map(Bson::as_document)
                    .cloned()
                    .collect();
                return Ok(ExplainDocument::Stages(docs));
            }
            Ok(ExplainDocument::Single(doc))
        }
        _ => anyhow::bail!("explain output must be a JSON object or array"),
    }
}

/// Lines printed for one explain document.
pub fn report(explain: &ExplainDocument, max_items: usize, colors: bool) -> Vec<String> {
    let planners = explain.query_planners();
    let plan = explain.winning_plan();

    let mut lines = vec![format!("planners: {}", planners.len())];
    if let Some(plan) = &plan {
        lines.push(format!("stages: {}", plan.stage_names().join(" <- ")));
    }

    lines.push(match (&plan, classify_with_limit(plan.as_ref(), max_items)) {
        (None, _) => "(no plan found)".to_string(),
        (Some(_), PlanVerdict::Suppress) => "(suppressed: id lookup)".to_string(),
        (Some(_), PlanVerdict::Report(summary)) if colors => match summary.emphasis {
            Emphasis::Favorable => summary.text.green().to_string(),
            Emphasis::Unfavorable => summary.text.red().to_string(),
            Emphasis::Neutral => summary.text.yellow().to_string(),
        },
        (Some(_), PlanVerdict::Report(summary)) => summary.text,
    });
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_explain_object() {
        let explain = parse_explain(
            r#"{
                "queryPlanner": {
                    "winningPlan": {
                        "stage": "FETCH",
                        "inputStage": { "stage": "IXSCAN", "keyPattern": { "name": 1 } }
                    }
                },
                "ok": 1
            }"#,
            false,
        )
        .unwrap();

        assert_eq!(
            report(&explain, 100, false),
            vec![
                "planners: 1".to_string(),
                "stages: IXSCAN <- FETCH".to_string(),
                r#"IXSCAN {"name":1}"#.to_string(),
            ]
        );
    }

    #[test]
    fn aggregate_stage_array() {
        let explain = parse_explain(
            r#"[
                { "$cursor": { "queryPlanner": { "winningPlan": { "stage": "COLLSCAN" } } } },
                { "$group": { "_id": "$project" } }
            ]"#,
            true,
        )
        .unwrap();

        let lines = report(&explain, 100, false);
        assert!(lines[2].starts_with("COLLSCAN: "));
    }

    #[test]
    fn aggregate_object_with_stages() {
        let explain = parse_explain(
            r#"{ "stages": [ { "$cursor": { "queryPlanner": { "winningPlan": { "stage": "EOF" } } } } ], "ok": 1 }"#,
            true,
        )
        .unwrap();

        assert!(matches!(explain, ExplainDocument::Stages(ref docs) if docs.len() == 1));
        assert!(report(&explain, 100, false)[2].starts_with("Stages: "));
    }

    #[test]
    fn id_lookup_and_missing_plan() {
        let idhack =
            parse_explain(r#"{ "queryPlanner": { "winningPlan": { "stage": "IDHACK" } } }"#, false)
                .unwrap();
        assert_eq!(report(&idhack, 100, false)[2], "(suppressed: id lookup)");

        let empty = parse_explain(r#"{ "ok": 1 }"#, false).unwrap();
        assert_eq!(
            report(&empty, 100, false),
            vec!["planners: 0".to_string(), "(no plan found)".to_string()]
        );
    }

    #[test]
    fn rejects_scalars_and_bad_json() {
        assert!(parse_explain("42", false).is_err());
        assert!(parse_explain("{", false).is_err());
        assert!(parse_explain("  ", false).is_err());
    }
}
