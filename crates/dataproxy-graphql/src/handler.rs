//! Axum HTTP handler for GraphQL requests.
//!
//! The ORM client posts to `/<version>/<schema-hash>/graphql`; the proxy
//! answers the same document on every path, so the handler is mounted as a
//! fallback by the server.

use async_graphql::dynamic::Schema;
use async_graphql::{Request, Response, Variables};
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::ProxyContext;

/// State shared across GraphQL handlers.
#[derive(Clone)]
pub struct GraphQLState {
    /// The synthesized schema, built once at startup.
    pub schema: Schema,
}

impl GraphQLState {
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }
}

/// GraphQL request body.
#[derive(Debug, Deserialize)]
pub struct GraphQLRequest {
    /// The GraphQL query string.
    pub query: String,

    /// Optional operation name for multi-operation documents.
    #[serde(rename = "operationName")]
    pub operation_name: Option<String>,

    /// Optional variables for the query.
    pub variables: Option<serde_json::Value>,

    /// Optional extensions.
    pub extensions: Option<serde_json::Value>,
}

/// GraphQL response body.
#[derive(Debug, Serialize)]
pub struct GraphQLResponse {
    /// `null` when execution failed before producing data.
    pub data: serde_json::Value,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

impl From<Response> for GraphQLResponse {
    fn from(resp: Response) -> Self {
        let data = serde_json::to_value(&resp.data).unwrap_or(serde_json::Value::Null);

        // ServerError serializes as {message, locations, path, extensions}.
        let errors = resp
            .errors
            .iter()
            .map(|e| {
                serde_json::to_value(e)
                    .unwrap_or_else(|_| serde_json::json!({ "message": e.message }))
            })
            .collect();

        let extensions = if resp.extensions.is_empty() {
            None
        } else {
            serde_json::to_value(&resp.extensions).ok()
        };

        Self {
            data,
            errors,
            extensions,
        }
    }
}

/// Handles a GraphQL POST request.
///
/// GraphQL errors are returned with status 200, as usual; the server's
/// envelope middleware rewrites them for the ORM client.
pub async fn graphql_handler(
    State(state): State<GraphQLState>,
    headers: HeaderMap,
    Json(request): Json<GraphQLRequest>,
) -> impl IntoResponse {
    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let response = execute(&state.schema, request, ProxyContext::new(request_id)).await;

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        Json(response),
    )
}

/// Executes `request` against `schema` with `context` as request data.
pub async fn execute(schema: &Schema, request: GraphQLRequest, context: ProxyContext) -> GraphQLResponse {
    let mut gql_request = Request::new(&request.query);

    if let Some(op_name) = request.operation_name {
        gql_request = gql_request.operation_name(op_name);
    }

    if let Some(vars) = request.variables {
        gql_request = gql_request.variables(Variables::from_json(vars));
    }

    debug!(request_id = %context.request_id, query = %request.query, "Executing GraphQL query");
    gql_request = gql_request.data(context);

    GraphQLResponse::from(schema.execute(gql_request).await)
}
