//! JSON rendering for log lines.
//!
//! Documents are rendered as relaxed extended JSON with their original key
//! order. Arrays longer than the configured cap are cut short and end with a
//! `"N more items…"` marker so one huge `$in` list cannot blow up a log line.

use bson::{Bson, Document};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::operation::OperationEvent;

/// Default number of array items kept when rendering.
pub const DEFAULT_MAX_ARRAY_ITEMS: usize = 100;

/// Copy `value`, cutting every array longer than `max_items`.
pub fn truncate_arrays(value: &Bson, max_items: usize) -> Bson {
    match value {
        Bson::Array(items) => {
            let mut out: Vec<Bson> = items
                .iter()
                .take(max_items)
                .map(|item| truncate_arrays(item, max_items))
                .collect();
            if items.len() > max_items {
                out.push(Bson::String(format!(
                    "{} more items…",
                    items.len() - max_items
                )));
            }
            Bson::Array(out)
        }
        Bson::Document(doc) => Bson::Document(truncate_document(doc, max_items)),
        other => other.clone(),
    }
}

fn truncate_document(doc: &Document, max_items: usize) -> Document {
    doc.iter()
        .map(|(key, value)| (key.clone(), truncate_arrays(value, max_items)))
        .collect()
}

/// Compact JSON, e.g. `{"name":"john"}`.
pub fn to_json(value: &Bson, max_items: usize) -> String {
    truncate_arrays(value, max_items)
        .into_relaxed_extjson()
        .to_string()
}

/// Compact JSON for a document.
pub fn document_to_json(doc: &Document, max_items: usize) -> String {
    Bson::Document(truncate_document(doc, max_items))
        .into_relaxed_extjson()
        .to_string()
}

/// Pretty JSON with four-space indentation.
pub fn to_pretty_json(value: &Bson, max_items: usize) -> String {
    let value = truncate_arrays(value, max_items).into_relaxed_extjson();
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    match value.serialize(&mut ser) {
        Ok(()) => String::from_utf8(buf).unwrap_or_else(|_| value.to_string()),
        Err(_) => value.to_string(),
    }
}

fn is_empty(value: &Bson) -> bool {
    match value {
        Bson::Document(doc) => doc.is_empty(),
        Bson::Array(items) => items.is_empty(),
        Bson::Null => true,
        _ => false,
    }
}

/// Render `<collection>.<operation>(<filter>[, <fields>][, <options>][, <update>])`.
///
/// A missing filter prints as `{}`; empty projection, options and update are
/// left out.
pub fn query_string(event: &OperationEvent, max_items: usize) -> String {
    let filter = event
        .filter
        .as_ref()
        .map(|f| to_json(f, max_items))
        .unwrap_or_else(|| "{}".to_string());

    let mut args = vec![filter];
    if let Some(fields) = event.fields.as_ref().filter(|f| !f.is_empty()) {
        args.push(document_to_json(fields, max_items));
    }
    if !event.options.is_empty() {
        args.push(document_to_json(&event.options, max_items));
    }
    if let Some(update) = event.update.as_ref().filter(|u| !is_empty(u)) {
        args.push(to_json(update, max_items));
    }

    format!(
        "{}.{}({})",
        event.collection_name,
        event.operation,
        args.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;
    use bson::doc;

    fn event(operation: Operation) -> OperationEvent {
        OperationEvent {
            operation,
            collection_name: "tasks".into(),
            execution_time_ms: 3,
            filter: None,
            fields: None,
            options: Document::new(),
            update: None,
            additional_properties: None,
        }
    }

    #[test]
    fn query_string_with_filter_only() {
        let mut e = event(Operation::Find);
        e.filter = Some(Bson::Document(doc! { "name": "john" }));
        assert_eq!(query_string(&e, 100), r#"tasks.find({"name":"john"})"#);
    }

    #[test]
    fn query_string_missing_filter_prints_empty_object() {
        assert_eq!(query_string(&event(Operation::Count), 100), "tasks.count({})");
    }

    #[test]
    fn query_string_includes_projection_options_and_update() {
        let mut e = event(Operation::FindOneAndUpdate);
        e.filter = Some(Bson::Document(doc! { "name": "bob" }));
        e.update = Some(Bson::Document(doc! { "$set": { "name": "john" } }));
        assert_eq!(
            query_string(&e, 100),
            r#"tasks.findOneAndUpdate({"name":"bob"}, {"$set":{"name":"john"}})"#
        );

        let mut e = event(Operation::Find);
        e.filter = Some(Bson::Document(doc! {}));
        e.fields = Some(doc! { "_id": 1 });
        assert_eq!(query_string(&e, 100), r#"tasks.find({}, {"_id":1})"#);

        let mut e = event(Operation::Find);
        e.options = doc! { "limit": 10, "skip": 5 };
        assert_eq!(
            query_string(&e, 100),
            r#"tasks.find({}, {"limit":10,"skip":5})"#
        );
    }

    #[test]
    fn key_order_is_preserved() {
        let mut e = event(Operation::Aggregate);
        e.filter = Some(Bson::Array(vec![Bson::Document(doc! {
            "$match": { "status": "pending", "user": "123", "project": "321" }
        })]));
        assert_eq!(
            query_string(&e, 100),
            r#"tasks.aggregate([{"$match":{"status":"pending","user":"123","project":"321"}}])"#
        );
    }

    #[test]
    fn long_arrays_are_truncated() {
        let ids: Vec<Bson> = (0..105).map(Bson::Int32).collect();
        let json = to_json(&Bson::Document(doc! { "_id": { "$in": ids } }), 100);
        assert!(json.contains(",99,\"5 more items…\"]"));
        assert!(!json.contains(",100,"));
    }

    #[test]
    fn short_arrays_are_untouched() {
        let value = Bson::Array(vec![Bson::Int32(1), Bson::Int32(2)]);
        assert_eq!(truncate_arrays(&value, 2), value);
    }

    #[test]
    fn pretty_json_uses_four_spaces() {
        let pretty = to_pretty_json(&Bson::Document(doc! { "stage": "COLLSCAN" }), 100);
        assert_eq!(pretty, "{\n    \"stage\": \"COLLSCAN\"\n}");
    }
}
