//! Error types for the synthesis engine.
//!
//! Startup errors (`SchemaGeneration`, `DuplicateRootField`,
//! `UnsupportedOperation`, `UnknownOperation`, `InvalidDocument`,
//! `SchemaBuildFailed`) abort the process before it accepts requests.
//! `InvalidArgument` and `Client` surface per request as GraphQL errors.

use std::fmt;

use async_graphql::ErrorExtensions;
use dataproxy_client::ClientError;
use dataproxy_core::CoreError;

/// Errors that can occur while synthesizing or executing the proxy schema.
#[derive(Debug)]
pub enum GraphQLError {
    /// A field references a type that is neither a scalar, an enum nor an object.
    SchemaGeneration(String),

    /// Two operation mappings claim the same root field.
    DuplicateRootField {
        /// The contested root field name.
        field: String,
        /// Model of the first mapping.
        first: String,
        /// Model of the second mapping.
        second: String,
    },

    /// An operation id names no client method.
    UnsupportedOperation {
        /// Model of the mapping.
        model: String,
        /// The operation id (`createOne`, `findMany`, ...).
        operation: String,
    },

    /// A root field has no dispatch route.
    UnknownOperation(String),

    /// The introspection document is unusable.
    InvalidDocument(String),

    /// A request argument could not be decoded.
    InvalidArgument(String),

    /// The executor rejected the synthesized schema.
    SchemaBuildFailed(String),

    /// Error raised by the CRUD client, passed through unchanged.
    Client(ClientError),
}

impl fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaGeneration(msg) => write!(f, "Schema generation failed: {msg}"),
            Self::DuplicateRootField {
                field,
                first,
                second,
            } => write!(
                f,
                "Root field `{field}` is mapped by both `{first}` and `{second}`"
            ),
            Self::UnsupportedOperation { model, operation } => {
                write!(f, "Operation `{operation}` of model `{model}` has no client method")
            }
            Self::UnknownOperation(field) => write!(f, "No operation is mapped to root field `{field}`"),
            Self::InvalidDocument(msg) => write!(f, "Invalid introspection document: {msg}"),
            Self::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            Self::SchemaBuildFailed(msg) => write!(f, "Failed to build GraphQL schema: {msg}"),
            // Client messages travel verbatim so ORM clients can parse them.
            Self::Client(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for GraphQLError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Client(err) => Some(err),
            _ => None,
        }
    }
}

impl GraphQLError {
    /// Returns the error code for GraphQL error extensions.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SchemaGeneration(_) => "SCHEMA_GENERATION_FAILED",
            Self::DuplicateRootField { .. } => "DUPLICATE_ROOT_FIELD",
            Self::UnsupportedOperation { .. } => "UNSUPPORTED_OPERATION",
            Self::UnknownOperation(_) => "UNKNOWN_OPERATION",
            Self::InvalidDocument(_) => "INVALID_DOCUMENT",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::SchemaBuildFailed(_) => "SCHEMA_BUILD_FAILED",
            Self::Client(err) => err.code(),
        }
    }

    /// Returns `true` for errors that can only happen while building the schema.
    #[must_use]
    pub fn is_startup_error(&self) -> bool {
        !matches!(self, Self::InvalidArgument(_) | Self::Client(_))
    }

    /// Converts the error into an executor error carrying `code` in its extensions.
    #[must_use]
    pub fn to_graphql_error(&self) -> async_graphql::Error {
        match self {
            Self::Client(err) => client_error_to_graphql(err),
            other => async_graphql::Error::new(other.to_string())
                .extend_with(|_, e| e.set("code", other.error_code())),
        }
    }
}

impl From<ClientError> for GraphQLError {
    fn from(err: ClientError) -> Self {
        Self::Client(err)
    }
}

impl From<CoreError> for GraphQLError {
    fn from(err: CoreError) -> Self {
        Self::InvalidDocument(err.to_string())
    }
}

/// Converts a client error to an executor error.
///
/// The message is the client's own message; `code` and `category` are
/// attached as extensions.
#[must_use]
pub fn client_error_to_graphql(err: &ClientError) -> async_graphql::Error {
    let code = err.code();
    let category = err.category().to_string();
    async_graphql::Error::new(err.to_string()).extend_with(|_, e| {
        e.set("code", code);
        e.set("category", category);
    })
}
