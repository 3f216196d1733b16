//! In-memory CRUD client for the data proxy.
//!
//! This crate provides an implementation of the `CrudClient` trait from
//! `dataproxy-client`, using papaya lock-free HashMap for concurrent access.
//! It backs local development and the end-to-end tests of the proxy.
//!
//! # Example
//!
//! ```ignore
//! use dataproxy_client::{ClientOperation, CrudClient};
//! use dataproxy_db_memory::InMemoryClient;
//!
//! let client = InMemoryClient::new(&document);
//! client
//!     .execute("user", ClientOperation::Create, json!({ "data": { "email": "a@b.c" } }))
//!     .await?;
//! ```

pub mod aggregate;
mod client;
pub mod query;

pub use client::{InMemoryClient, RowKey};

// Re-export the client trait for convenience
pub use dataproxy_client::{ClientError, CrudClient};

/// Creates a shareable in-memory client for `document`.
pub fn create_client(document: &dataproxy_core::IntrospectionDocument) -> dataproxy_client::DynClient {
    std::sync::Arc::new(InMemoryClient::new(document))
}
