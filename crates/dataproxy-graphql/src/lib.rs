//! # dataproxy-graphql
//!
//! GraphQL schema and resolver synthesis for the data proxy.
//!
//! Given an ORM introspection document and a CRUD client, this crate builds
//! a GraphQL schema that mirrors the ORM's own query engine: one root field
//! per model operation, one object type per output type, `Any`-typed
//! arguments passed to the client unchanged.
//!
//! ## Overview
//!
//! ```ignore
//! let document = provider.load().await?;
//! let client: DynClient = Arc::new(InMemoryClient::new(&document));
//! let schema = build_schema(&document, client, GraphQLConfig::default().to_schema_builder_config())?;
//! ```
//!
//! ## Modules
//!
//! - [`schema`] - type definitions and the executable schema builder
//! - [`resolvers`] - root dispatch, relation traversal, aggregate selection, raw SQL
//! - [`config`] - `[graphql]` configuration section
//! - [`context`] - per-request execution context
//! - [`handler`] - Axum HTTP handler
//! - [`metrics`] - operation metrics
//! - [`error`] - error types

pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod resolvers;
pub mod schema;

pub use config::GraphQLConfig;
pub use context::ProxyContext;
pub use error::{GraphQLError, client_error_to_graphql};
pub use handler::{GraphQLRequest, GraphQLResponse, GraphQLState, graphql_handler};
pub use resolvers::Resolvers;
pub use schema::{ProxySchemaBuilder, SchemaBuilderConfig, TypeDefs};

use dataproxy_client::DynClient;
use dataproxy_core::IntrospectionDocument;

/// Result type for GraphQL operations.
pub type Result<T> = std::result::Result<T, GraphQLError>;

/// Synthesizes the type definitions and resolvers of `document` and binds
/// them into an executable schema.
///
/// # Errors
///
/// Any startup error of the synthesis (see [`GraphQLError::is_startup_error`]).
pub fn build_schema(
    document: &IntrospectionDocument,
    client: DynClient,
    config: SchemaBuilderConfig,
) -> Result<async_graphql::dynamic::Schema> {
    let type_defs = TypeDefs::from_document(document)?;
    let resolvers = Resolvers::new(document, client)?;
    ProxySchemaBuilder::new(type_defs, resolvers, config).build()
}
