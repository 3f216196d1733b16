//! HTTP server for the GraphQL data proxy.
//!
//! Loads the introspection document, synthesizes the schema and serves it
//! behind API key authentication and the engine error envelope.

pub mod bootstrap;
pub mod config;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod server;

pub use config::AppConfig;
pub use observability::init_tracing;
pub use server::{DataProxyServer, ServerBuilder, build_app};
