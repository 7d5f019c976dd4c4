use bson::{Bson, Document};

/// Maximum nesting the locator descends into.
pub const MAX_SEARCH_DEPTH: usize = 64;

/// Key holding a plan descriptor in explain output.
pub const QUERY_PLANNER: &str = "queryPlanner";

/// Find every `key` descriptor across `docs`, in document order.
///
/// Aggregation explain output does not fix where the planner sits (it
/// depends on how many pipeline stages precede the cursor), so each
/// document is searched depth-first, keeping the first match per branch:
/// once a document holds `key`, that value is recorded and nothing else
/// inside that document is searched, while sibling branches are still
/// searched on their own.
pub fn find_plan_descriptors<'a>(docs: &'a [Document], key: &str) -> Vec<&'a Document> {
    let mut found = Vec::new();
    for doc in docs {
        search_document(doc, key, 0, &mut found);
    }
    found
}

/// [`find_plan_descriptors`] for the `queryPlanner` key.
pub fn find_query_planners(docs: &[Document]) -> Vec<&Document> {
    find_plan_descriptors(docs, QUERY_PLANNER)
}

fn search_document<'a>(doc: &'a Document, key: &str, depth: usize, found: &mut Vec<&'a Document>) {
    if depth > MAX_SEARCH_DEPTH {
        return;
    }
    if let Some(value) = doc.get(key) {
        if let Bson::Document(descriptor) = value {
            found.push(descriptor);
        }
        return;
    }
    for value in doc.values() {
        search_value(value, key, depth + 1, found);
    }
}

fn search_value<'a>(value: &'a Bson, key: &str, depth: usize, found: &mut Vec<&'a Document>) {
    match value {
        Bson::Document(doc) => search_document(doc, key, depth, found),
        Bson::Array(items) => {
            for item in items {
                search_value(item, key, depth + 1, found);
            }
        }
        _ => {}
    }
}
