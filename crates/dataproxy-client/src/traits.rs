//! The CRUD client boundary.
//!
//! The proxy never talks to a database itself. Every GraphQL root field is
//! answered by one call on a [`CrudClient`], addressed by the model's
//! delegate name (`user`, `leaderboardRow`) and a [`ClientOperation`].

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ClientError;
use crate::operation::ClientOperation;
use crate::raw::RawValue;

/// A CRUD client exposing one delegate per model.
///
/// Argument bags are passed through as JSON objects in the shape the ORM
/// client accepts (`where`, `data`, `select`, `orderBy`, ...).
/// Implementations must be thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use dataproxy_client::{ClientOperation, CrudClient};
/// use serde_json::json;
///
/// async fn list_users(client: &dyn CrudClient) -> Result<Value, ClientError> {
///     client
///         .execute("user", ClientOperation::FindMany, json!({ "take": 10 }))
///         .await
/// }
/// ```
#[async_trait]
pub trait CrudClient: Send + Sync {
    /// Invokes `client[delegate][operation](args)`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` if `delegate` names no model or the
    /// arguments are malformed; any other variant as reported by the backend.
    async fn execute(
        &self,
        delegate: &str,
        operation: ClientOperation,
        args: Value,
    ) -> Result<Value, ClientError>;

    /// Starts a fluent point lookup (`client[delegate].findUnique(args)`).
    ///
    /// The returned handle has not necessarily hit the database yet; the
    /// lookup happens when a relation is read through it.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` if `delegate` names no model.
    async fn find_unique(
        &self,
        delegate: &str,
        args: Value,
    ) -> Result<Box<dyn RecordHandle>, ClientError>;

    /// Runs a raw SQL query with positional parameters and returns its rows.
    ///
    /// # Errors
    ///
    /// The default implementation returns `ClientError::Unsupported`.
    async fn query_raw(&self, query: &str, parameters: Vec<Value>) -> Result<RawValue, ClientError> {
        let _ = (query, parameters);
        Err(ClientError::unsupported("queryRaw"))
    }

    /// Runs a raw SQL statement and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// The default implementation returns `ClientError::Unsupported`.
    async fn execute_raw(&self, query: &str, parameters: Vec<Value>) -> Result<u64, ClientError> {
        let _ = (query, parameters);
        Err(ClientError::unsupported("executeRaw"))
    }
}

/// A record obtained through [`CrudClient::find_unique`] whose relations can
/// be traversed.
#[async_trait]
pub trait RecordHandle: Send + Sync {
    /// Reads relation `field` of the looked-up record with the caller's
    /// relation arguments (`select`, `where`, `take`, ...).
    ///
    /// Yields `Value::Null` if the record no longer exists.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` if `field` is not a relation of the model.
    async fn relation(&self, field: &str, args: Value) -> Result<Value, ClientError>;
}
