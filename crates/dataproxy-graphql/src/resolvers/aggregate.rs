//! Aggregate selection extraction.
//!
//! `aggregate` and `groupBy` take the caller's selection as input: the client
//! only computes the aggregate groups that are asked for. This module turns
//! the selection set of such a root field into the nested map the client
//! expects, e.g. `_count { _all id }` becomes `{"_count": {"_all": true, "id": true}}`.

use async_graphql::Positioned;
use async_graphql::parser::types::Selection;
use serde_json::{Map, Value};

/// Prefix shared by aggregate groups (`_count`, `_min`, `_max`, `_avg`, `_sum`).
const AGGREGATE_PREFIX: char = '_';

/// Prefix of introspection meta fields (`__typename`).
const META_PREFIX: &str = "__";

/// Extracts the requested aggregate groups from a root selection set.
///
/// At the root only `_`-prefixed selections are considered; below it every
/// field is kept. A field whose own selection yields nothing maps to `true`.
/// Fragments are ignored, so the result is empty rather than an error for
/// selections that carry no fields.
#[must_use]
pub fn extract_aggregate_selection(selections: &[Positioned<Selection>]) -> Map<String, Value> {
    collect(selections, true)
}

fn collect(selections: &[Positioned<Selection>], root: bool) -> Map<String, Value> {
    let mut fields = Map::new();
    for selection in selections {
        let Selection::Field(field) = &selection.node else {
            continue;
        };
        let name = field.node.name.node.as_str();
        if name.starts_with(META_PREFIX) || (root && !name.starts_with(AGGREGATE_PREFIX)) {
            continue;
        }

        let nested = collect(&field.node.selection_set.node.items, false);
        let value = if nested.is_empty() {
            Value::Bool(true)
        } else {
            Value::Object(nested)
        };
        fields.insert(name.to_string(), value);
    }
    fields
}

/// Builds the argument bag of an aggregate call.
///
/// The extracted selection goes first; caller arguments win on collision.
#[must_use]
pub fn merge_aggregate_args(selection: Map<String, Value>, args: Map<String, Value>) -> Value {
    let mut merged = selection;
    merged.extend(args);
    Value::Object(merged)
}
