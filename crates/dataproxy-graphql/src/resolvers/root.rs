//! Root field dispatch.
//!
//! Every Query and Mutation field is routed to exactly one client call. The
//! table is built once from the operation mappings and never changes.

use std::time::Instant;

use async_graphql::dynamic::{FieldFuture, ResolverContext};
use dataproxy_client::{ClientError, ClientOperation, CrudClient, DynClient};
use dataproxy_core::{IntrospectionDocument, lower_first};
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::aggregate::{extract_aggregate_selection, merge_aggregate_args};
use super::raw::RawOperation;
use super::{args_to_json, field_value, json_to_graphql_value};
use crate::context::request_id;
use crate::error::GraphQLError;
use crate::metrics;

/// A root field backed by a model delegate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootRoute {
    pub model: String,
    /// Operation id as found in the mappings (`createOne`).
    pub operation: String,
    /// Client method the id normalizes to (`create`).
    pub method: ClientOperation,
    /// Delegate name on the client (`user`).
    pub delegate: String,
}

impl RootRoute {
    /// Builds the route of `operation` on `model`.
    ///
    /// # Errors
    ///
    /// Returns `GraphQLError::UnsupportedOperation` if the operation id
    /// names no client method.
    pub fn new(model: &str, operation: &str) -> Result<Self, GraphQLError> {
        let method = ClientOperation::from_operation_id(operation).map_err(|_| {
            GraphQLError::UnsupportedOperation {
                model: model.to_string(),
                operation: operation.to_string(),
            }
        })?;

        Ok(Self {
            model: model.to_string(),
            operation: operation.to_string(),
            method,
            delegate: lower_first(model),
        })
    }

    /// Builds the argument bag sent to the client.
    ///
    /// Aggregate methods receive the extracted selection merged under the
    /// caller's arguments; every other method receives the arguments as is.
    #[must_use]
    pub fn arguments(&self, args: Map<String, Value>, selection: Map<String, Value>) -> Value {
        if self.method.is_aggregate() {
            merge_aggregate_args(selection, args)
        } else {
            Value::Object(args)
        }
    }

    /// Invokes the client method of this route.
    ///
    /// # Errors
    ///
    /// Client errors are returned unchanged.
    pub async fn call(&self, client: &dyn CrudClient, args: Value) -> Result<Value, ClientError> {
        debug!(
            model = %self.model,
            operation = %self.method,
            "Dispatching root field"
        );
        client.execute(&self.delegate, self.method, args).await
    }
}

/// What a root field is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Model(RootRoute),
    Raw(RawOperation),
    /// A model-independent operation the proxy cannot execute.
    Unsupported(String),
}

/// Root field name -> route, in document order.
#[derive(Debug, Clone, Default)]
pub struct RootDispatch {
    routes: IndexMap<String, Route>,
}

impl RootDispatch {
    /// Flattens the operation mappings of `document`.
    ///
    /// Model-independent operations come from `otherOperations`; the raw SQL
    /// fields are also recognised when they are only declared on a root type.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateRootField` when two mappings claim one field.
    /// Operation ids with no client method become `Unsupported` routes.
    pub fn new(document: &IntrospectionDocument) -> Result<Self, GraphQLError> {
        let mut dispatch = Self::default();

        for (model, operation, field) in document.operations() {
            let route = match RootRoute::new(model, operation) {
                Ok(route) => Route::Model(route),
                Err(e) => {
                    warn!(model, operation, field, error = %e, "Mapped operation is not supported");
                    Route::Unsupported(operation.to_string())
                }
            };
            dispatch.insert(field, route)?;
        }

        for name in document.mappings.other_operations.iter() {
            let route = RawOperation::from_field(name)
                .map_or_else(|| Route::Unsupported(name.clone()), Route::Raw);
            dispatch.insert(name, route)?;
        }

        for root in ["Query", "Mutation"] {
            let Some(object) = document.object_type(root) else {
                continue;
            };
            for field in &object.fields {
                if let Some(raw) = RawOperation::from_field(&field.name) {
                    if !dispatch.routes.contains_key(&field.name) {
                        dispatch.routes.insert(field.name.clone(), Route::Raw(raw));
                    }
                }
            }
        }

        Ok(dispatch)
    }

    fn insert(&mut self, field: &str, route: Route) -> Result<(), GraphQLError> {
        match self.routes.entry(field.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(route);
                Ok(())
            }
            Entry::Occupied(existing) => Err(GraphQLError::DuplicateRootField {
                field: field.to_string(),
                first: owner(existing.get()),
                second: owner(&route),
            }),
        }
    }

    /// Looks up the route of a root field.
    ///
    /// # Errors
    ///
    /// Returns `GraphQLError::UnknownOperation` for unmapped fields.
    pub fn route(&self, field: &str) -> Result<&Route, GraphQLError> {
        self.routes
            .get(field)
            .ok_or_else(|| GraphQLError::UnknownOperation(field.to_string()))
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.routes.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Route)> {
        self.routes.iter().map(|(field, route)| (field.as_str(), route))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Resolver for Query and Mutation fields.
pub struct RootResolver;

impl RootResolver {
    /// Creates a resolver answering root field `field` through `route`.
    pub fn resolve(
        field: String,
        route: Route,
        client: DynClient,
    ) -> impl Fn(ResolverContext<'_>) -> FieldFuture<'_> + Send + Sync + Clone {
        move |ctx| {
            let field = field.clone();
            let route = route.clone();
            let client = client.clone();
            FieldFuture::new(async move {
                let started = Instant::now();
                let args = args_to_json(&ctx).map_err(|e| e.to_graphql_error())?;

                let (operation, result) = match &route {
                    Route::Model(route) => {
                        let selection = if route.method.is_aggregate() {
                            extract_aggregate_selection(&ctx.ctx.item.node.selection_set.node.items)
                        } else {
                            Map::new()
                        };
                        let result = route
                            .call(client.as_ref(), route.arguments(args, selection))
                            .await
                            .map_err(GraphQLError::from);
                        (route.method.as_str(), result)
                    }
                    Route::Raw(raw) => (raw.as_str(), raw.run(client.as_ref(), &args).await),
                    Route::Unsupported(name) => (
                        "unsupported",
                        Err(GraphQLError::Client(ClientError::unsupported(name.clone()))),
                    ),
                };
                metrics::record_operation(&field, operation, result.is_ok(), started.elapsed());

                match result {
                    Ok(value) => Ok(field_value(json_to_graphql_value(value))),
                    Err(e) => {
                        warn!(
                            request_id = %request_id(ctx.ctx),
                            field = %field,
                            code = e.error_code(),
                            error = %e,
                            "Root field failed"
                        );
                        Err(e.to_graphql_error())
                    }
                }
            })
        }
    }
}

fn owner(route: &Route) -> String {
    match route {
        Route::Model(route) => route.model.clone(),
        Route::Raw(raw) => raw.as_str().to_string(),
        Route::Unsupported(name) => name.clone(),
    }
}
