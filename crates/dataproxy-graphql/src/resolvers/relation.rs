//! Relation traversal.
//!
//! Relation accessors only exist on a fluent point lookup, not on a
//! materialized record. A relation field is therefore answered in two
//! steps: look the parent up again by its key, then read the relation
//! through the returned handle with the caller's arguments.

use std::collections::HashSet;
use std::sync::Arc;

use async_graphql::dynamic::{FieldFuture, ResolverContext};
use dataproxy_client::{CrudClient, DynClient};
use dataproxy_core::{ModelDescriptor, lower_first};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::{args_to_json, field_value, json_to_graphql_value, parent_json};
use crate::context::request_id;
use crate::error::GraphQLError;
use crate::metrics;

/// How a model's records are addressed in a `where` filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKey {
    /// `{ id: 10 }`
    Single(String),
    /// `{ leaderboardId_userId: { leaderboardId: 1, userId: 10 } }`
    Compound { name: String, fields: Vec<String> },
}

impl RecordKey {
    /// Derives the key of `model`, or `None` if it has no identifying fields.
    #[must_use]
    pub fn of(model: &ModelDescriptor) -> Option<Self> {
        let fields = model.identifying_fields();
        match fields.as_slice() {
            [] => None,
            [single] => Some(Self::Single(single.name.clone())),
            _ => Some(Self::Compound {
                name: model.compound_key_name(&fields),
                fields: fields.iter().map(|f| f.name.clone()).collect(),
            }),
        }
    }

    /// Builds the `where` filter addressing `parent`.
    ///
    /// Key fields missing from the parent are sent as `null`.
    #[must_use]
    pub fn filter(&self, parent: &Map<String, Value>) -> Value {
        let value_of = |field: &str| parent.get(field).cloned().unwrap_or(Value::Null);
        match self {
            Self::Single(field) => json!({ field.as_str(): value_of(field) }),
            Self::Compound { name, fields } => {
                let parts: Map<String, Value> = fields
                    .iter()
                    .map(|field| (field.clone(), value_of(field)))
                    .collect();
                json!({ name.as_str(): parts })
            }
        }
    }
}

/// Relation resolvers of one model.
#[derive(Debug, Clone)]
pub struct RelationResolvers {
    model: String,
    delegate: String,
    key: RecordKey,
    relations: HashSet<String>,
}

impl RelationResolvers {
    /// Builds the relation resolvers of `model`.
    ///
    /// Returns `None` when the model has no identifying fields: its
    /// relations cannot be traversed and are left unresolved.
    #[must_use]
    pub fn new(model: &ModelDescriptor) -> Option<Self> {
        let key = RecordKey::of(model)?;
        let relations = model
            .fields
            .iter()
            .filter(|f| f.is_relation())
            .map(|f| f.name.clone())
            .collect();

        Some(Self {
            model: model.name.clone(),
            delegate: lower_first(&model.name),
            key,
            relations,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    /// Returns `true` if `field` is a relation answered by this resolver.
    #[must_use]
    pub fn handles(&self, field: &str) -> bool {
        self.relations.contains(field)
    }

    /// Reads relation `field` of `parent` with the caller's `args`.
    ///
    /// # Errors
    ///
    /// Client errors of either round trip are returned unchanged.
    pub async fn resolve(
        &self,
        client: &dyn CrudClient,
        parent: &Map<String, Value>,
        field: &str,
        args: Value,
    ) -> Result<Value, GraphQLError> {
        let filter = self.key.filter(parent);
        debug!(model = %self.model, relation = %field, "Traversing relation");

        let handle = client
            .find_unique(&self.delegate, json!({ "where": filter }))
            .await?;
        Ok(handle.relation(field, args).await?)
    }
}

/// Resolver for relation fields of model types.
pub struct RelationResolver;

impl RelationResolver {
    /// Creates a resolver answering relation `field` with `relations`.
    pub fn resolve(
        field: String,
        relations: Arc<RelationResolvers>,
        client: DynClient,
    ) -> impl Fn(ResolverContext<'_>) -> FieldFuture<'_> + Send + Sync + Clone {
        move |ctx| {
            let field = field.clone();
            let relations = relations.clone();
            let client = client.clone();
            FieldFuture::new(async move {
                let parent = parent_json(&ctx)?;
                let args = args_to_json(&ctx).map_err(|e| e.to_graphql_error())?;

                let result = relations
                    .resolve(client.as_ref(), &parent, &field, Value::Object(args))
                    .await;
                metrics::record_relation(relations.model(), &field, result.is_ok());

                match result {
                    Ok(value) => Ok(field_value(json_to_graphql_value(value))),
                    Err(e) => {
                        warn!(
                            request_id = %request_id(ctx.ctx),
                            model = %relations.model(),
                            relation = %field,
                            error = %e,
                            "Relation traversal failed"
                        );
                        Err(e.to_graphql_error())
                    }
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dataproxy_client::{ClientError, ClientOperation, RecordHandle};
    use std::sync::{Arc, Mutex};

    type Calls = Arc<Mutex<Vec<(String, String, Value)>>>;

    /// Records every lookup and relation read.
    #[derive(Default)]
    struct Recorder {
        calls: Calls,
    }

    struct RecordedHandle {
        calls: Calls,
    }

    #[async_trait]
    impl RecordHandle for RecordedHandle {
        async fn relation(&self, field: &str, args: Value) -> Result<Value, ClientError> {
            self.calls
                .lock()
                .unwrap()
                .push(("relation".into(), field.into(), args));
            Ok(json!({ "id": "t1", "name": "red" }))
        }
    }

    #[async_trait]
    impl CrudClient for Recorder {
        async fn execute(
            &self,
            _delegate: &str,
            operation: ClientOperation,
            _args: Value,
        ) -> Result<Value, ClientError> {
            Err(ClientError::unsupported(operation.as_str()))
        }

        async fn find_unique(
            &self,
            delegate: &str,
            args: Value,
        ) -> Result<Box<dyn RecordHandle>, ClientError> {
            self.calls
                .lock()
                .unwrap()
                .push(("findUnique".into(), delegate.into(), args));
            Ok(Box::new(RecordedHandle {
                calls: self.calls.clone(),
            }))
        }
    }

    fn model(value: Value) -> ModelDescriptor {
        serde_json::from_value(value).unwrap()
    }

    fn user() -> ModelDescriptor {
        model(json!({
            "name": "User",
            "fields": [
                { "name": "id", "kind": "scalar", "type": "Int", "isId": true },
                { "name": "name", "kind": "scalar", "type": "String" },
                { "name": "Team", "kind": "object", "type": "Team", "relationName": "TeamToUser" }
            ]
        }))
    }

    fn leaderboard_row() -> ModelDescriptor {
        model(json!({
            "name": "LeaderboardRow",
            "fields": [
                { "name": "userId", "kind": "scalar", "type": "Int" },
                { "name": "leaderboardId", "kind": "scalar", "type": "Int" },
                { "name": "User", "kind": "object", "type": "User", "relationName": "LeaderboardRowToUser" }
            ],
            "primaryKey": { "name": null, "fields": ["leaderboardId", "userId"] }
        }))
    }

    fn parent(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_single_key_traversal() {
        let resolvers = RelationResolvers::new(&user()).unwrap();
        assert!(resolvers.handles("Team"));
        assert!(!resolvers.handles("name"));

        let client = Recorder::default();
        let args = json!({ "select": { "id": true, "name": true } });
        let team = resolvers
            .resolve(&client, &parent(json!({ "id": 10, "name": "foo" })), "Team", args.clone())
            .await
            .unwrap();

        assert_eq!(team, json!({ "id": "t1", "name": "red" }));
        let calls = client.calls.lock().unwrap();
        assert_eq!(
            calls[0],
            ("findUnique".into(), "user".into(), json!({ "where": { "id": 10 } }))
        );
        assert_eq!(calls[1], ("relation".into(), "Team".into(), args));
    }

    #[tokio::test]
    async fn test_compound_key_traversal() {
        let resolvers = RelationResolvers::new(&leaderboard_row()).unwrap();
        let client = Recorder::default();
        resolvers
            .resolve(
                &client,
                &parent(json!({ "userId": 10, "leaderboardId": 1, "rating": 5 })),
                "User",
                json!({}),
            )
            .await
            .unwrap();

        let calls = client.calls.lock().unwrap();
        let (_, delegate, args) = &calls[0];
        assert_eq!(delegate, "leaderboardRow");
        assert_eq!(
            args,
            &json!({ "where": { "leaderboardId_userId": { "leaderboardId": 1, "userId": 10 } } })
        );

        let key = &args["where"]["leaderboardId_userId"];
        let order: Vec<_> = key.as_object().unwrap().keys().collect();
        assert_eq!(order, vec!["leaderboardId", "userId"]);
    }

    #[test]
    fn test_keyless_model_has_no_resolvers() {
        let keyless = model(json!({
            "name": "Log",
            "fields": [
                { "name": "message", "kind": "scalar", "type": "String" },
                { "name": "User", "kind": "object", "type": "User", "relationName": "LogToUser" }
            ]
        }));
        assert!(RelationResolvers::new(&keyless).is_none());
        assert!(RecordKey::of(&keyless).is_none());
    }

    #[test]
    fn test_missing_key_field_is_null() {
        let key = RecordKey::Single("id".into());
        assert_eq!(key.filter(&Map::new()), json!({ "id": null }));
    }

    #[tokio::test]
    async fn test_client_error_propagates() {
        struct Failing;

        #[async_trait]
        impl CrudClient for Failing {
            async fn execute(
                &self,
                _delegate: &str,
                _operation: ClientOperation,
                _args: Value,
            ) -> Result<Value, ClientError> {
                Ok(Value::Null)
            }

            async fn find_unique(
                &self,
                _delegate: &str,
                _args: Value,
            ) -> Result<Box<dyn RecordHandle>, ClientError> {
                Err(ClientError::connection("refused"))
            }
        }

        let resolvers = RelationResolvers::new(&user()).unwrap();
        let err = resolvers
            .resolve(&Failing, &parent(json!({ "id": 1 })), "Team", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphQLError::Client(ClientError::Connection { .. })));
        assert_eq!(err.to_string(), "Can't reach database server: refused");
    }
}
