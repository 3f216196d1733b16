//! Resolvers for the synthesized schema.
//!
//! - `root`: Query/Mutation fields dispatched to the client
//! - `aggregate`: selection extraction for `aggregate` and `groupBy`
//! - `relation`: relation fields answered through a fresh point lookup
//! - `raw`: `queryRaw`/`executeRaw` and the tagged raw result format
//!
//! Records travel between resolvers as `async_graphql::Value` objects;
//! fields without a dedicated resolver read their value from the parent.

pub mod aggregate;
pub mod raw;
mod relation;
mod root;

pub use relation::{RecordKey, RelationResolver, RelationResolvers};
pub use root::{RootDispatch, RootResolver, RootRoute, Route};

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::dynamic::{FieldFuture, FieldValue, ResolverContext};
use async_graphql::{Name, Value};
use dataproxy_client::DynClient;
use dataproxy_core::IntrospectionDocument;
use serde_json::Map;
use tracing::warn;

use crate::error::GraphQLError;

/// Resolvers synthesized from one introspection document.
///
/// Holds the root dispatch table, the relation resolvers of every keyed
/// model and the client they call. Immutable once built.
#[derive(Clone)]
pub struct Resolvers {
    client: DynClient,
    dispatch: Arc<RootDispatch>,
    relations: HashMap<String, Arc<RelationResolvers>>,
}

impl Resolvers {
    /// Builds the resolvers of `document` bound to `client`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDocument` if the document breaks its invariants, and
    /// the dispatch table errors (`DuplicateRootField`, `UnsupportedOperation`).
    pub fn new(document: &IntrospectionDocument, client: DynClient) -> Result<Self, GraphQLError> {
        document.validate()?;
        let dispatch = RootDispatch::new(document)?;

        let relations = document
            .datamodel
            .models
            .iter()
            .filter_map(|model| {
                let resolvers = RelationResolvers::new(model);
                if resolvers.is_none() && model.fields.iter().any(|f| f.is_relation()) {
                    warn!(model = %model.name, "Model has no key; its relations are not traversable");
                }
                resolvers.map(|r| (model.name.clone(), Arc::new(r)))
            })
            .collect();

        Ok(Self {
            client,
            dispatch: Arc::new(dispatch),
            relations,
        })
    }

    pub fn dispatch(&self) -> &RootDispatch {
        &self.dispatch
    }

    /// Relation resolvers of `model`, if the model is keyed.
    #[must_use]
    pub fn relations(&self, model: &str) -> Option<&RelationResolvers> {
        self.relations.get(model).map(Arc::as_ref)
    }

    pub fn client(&self) -> &DynClient {
        &self.client
    }

    /// Route of root field `field`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownOperation` if the field has no route.
    pub fn route(&self, field: &str) -> Result<Route, GraphQLError> {
        self.dispatch.route(field).cloned()
    }

    /// Relation resolvers answering `field` of `model`, if it is a
    /// traversable relation.
    #[must_use]
    pub fn relation(&self, model: &str, field: &str) -> Option<Arc<RelationResolvers>> {
        self.relations
            .get(model)
            .filter(|r| r.handles(field))
            .cloned()
    }
}

/// Resolver for fields read straight from the parent record.
pub struct PassthroughResolver;

impl PassthroughResolver {
    /// Creates a resolver returning `field` of the parent record.
    ///
    /// Enum-typed values arrive from the client as strings and are turned
    /// into enum values.
    pub fn resolve(
        field: String,
        is_enum: bool,
    ) -> impl Fn(ResolverContext<'_>) -> FieldFuture<'_> + Send + Sync + Clone {
        move |ctx| {
            let field = field.clone();
            FieldFuture::new(async move {
                let value = match ctx.parent_value.as_value() {
                    Some(Value::Object(record)) => record.get(field.as_str()).cloned(),
                    _ => None,
                };
                Ok(value.and_then(|v| {
                    let v = if is_enum { string_to_enum(v) } else { v };
                    field_value(v)
                }))
            })
        }
    }
}

/// Wraps a resolved value for the executor.
///
/// Null maps to an absent value so object-typed fields resolve to null.
pub(crate) fn field_value(value: Value) -> Option<FieldValue<'static>> {
    match value {
        Value::Null => None,
        other => Some(FieldValue::value(other)),
    }
}

/// Collects the field arguments into a JSON object.
pub(crate) fn args_to_json(ctx: &ResolverContext<'_>) -> Result<Map<String, serde_json::Value>, GraphQLError> {
    let mut args = Map::new();
    for (name, value) in ctx.args.iter() {
        let json = value
            .as_value()
            .clone()
            .into_json()
            .map_err(|e| GraphQLError::InvalidArgument(format!("argument `{name}`: {e}")))?;
        args.insert(name.to_string(), json);
    }
    Ok(args)
}

/// The parent record of a field as a JSON object.
pub(crate) fn parent_json(ctx: &ResolverContext<'_>) -> Result<Map<String, serde_json::Value>, async_graphql::Error> {
    match ctx.parent_value.as_value() {
        Some(record @ Value::Object(_)) => match record.clone().into_json() {
            Ok(serde_json::Value::Object(map)) => Ok(map),
            Ok(_) => Ok(Map::new()),
            Err(e) => Err(async_graphql::Error::new(format!("Unreadable parent record: {e}"))),
        },
        _ => Ok(Map::new()),
    }
}

/// Convert a serde_json::Value to async_graphql::Value.
pub(crate) fn json_to_graphql_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else if let Some(f) = n.as_f64() {
                Value::Number(
                    async_graphql::Number::from_f64(f).unwrap_or_else(|| async_graphql::Number::from(0)),
                )
            } else {
                Value::Null
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => {
            Value::List(arr.into_iter().map(json_to_graphql_value).collect())
        }
        serde_json::Value::Object(obj) => Value::Object(
            obj.into_iter()
                .map(|(k, v)| (Name::new(k), json_to_graphql_value(v)))
                .collect(),
        ),
    }
}

/// Turns string leaves into enum values, descending into lists.
fn string_to_enum(value: Value) -> Value {
    match value {
        Value::String(s) => Value::Enum(Name::new(s)),
        Value::List(items) => Value::List(items.into_iter().map(string_to_enum).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_to_graphql_value_primitives() {
        assert!(matches!(json_to_graphql_value(json!(null)), Value::Null));
        assert!(matches!(json_to_graphql_value(json!(true)), Value::Boolean(true)));
        assert!(matches!(json_to_graphql_value(json!(42)), Value::Number(_)));
        assert!(matches!(json_to_graphql_value(json!("hi")), Value::String(s) if s == "hi"));
    }

    #[test]
    fn test_json_to_graphql_value_keeps_object_order() {
        let value = json_to_graphql_value(json!({ "b": 1, "a": [1.5] }));
        let Value::Object(map) = value else {
            panic!("expected object");
        };
        let keys: Vec<_> = map.keys().map(Name::as_str).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_null_is_an_absent_value() {
        assert!(field_value(Value::Null).is_none());
        assert!(field_value(Value::Boolean(false)).is_some());
        assert!(field_value(Value::List(vec![])).is_some());
    }

    #[test]
    fn test_string_to_enum() {
        assert_eq!(
            string_to_enum(Value::List(vec![Value::String("ENGLISH".into())])),
            Value::List(vec![Value::Enum(Name::new("ENGLISH"))])
        );
        assert_eq!(string_to_enum(Value::Null), Value::Null);
    }
}
