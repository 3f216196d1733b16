//! # dataproxy-client
//!
//! The CRUD client abstraction consumed by the data proxy.
//!
//! The proxy's resolvers only ever call [`CrudClient`]. Backends live in
//! separate crates (`dataproxy-db-memory` ships an in-memory one).
//!
//! ## Implementing a backend
//!
//! ```ignore
//! use async_trait::async_trait;
//! use dataproxy_client::{ClientError, ClientOperation, CrudClient, RecordHandle};
//!
//! struct MyClient;
//!
//! #[async_trait]
//! impl CrudClient for MyClient {
//!     async fn execute(&self, delegate: &str, op: ClientOperation, args: Value)
//!         -> Result<Value, ClientError> {
//!         // ...
//!     }
//!     // ...
//! }
//! ```

mod error;
mod operation;
mod raw;
mod traits;

pub use error::{ClientError, ErrorCategory};
pub use operation::ClientOperation;
pub use raw::RawValue;
pub use traits::{CrudClient, RecordHandle};

/// Type alias for a client result.
pub type ClientResult<T> = Result<T, ClientError>;

/// Shared handle to a client, passed explicitly into the schema builder.
pub type DynClient = std::sync::Arc<dyn CrudClient>;
