//! Per-request execution context.
//!
//! The context is inserted as request data by the HTTP handler and read by
//! resolvers for log correlation.

/// Request-scoped data available to every resolver.
#[derive(Debug, Clone)]
pub struct ProxyContext {
    /// Request ID for tracing and correlation.
    pub request_id: String,
}

impl ProxyContext {
    #[must_use]
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }
}

impl Default for ProxyContext {
    fn default() -> Self {
        Self::new("unknown")
    }
}

/// Returns the request id of the current execution, or `"unknown"` outside a request.
pub(crate) fn request_id(ctx: &async_graphql::Context<'_>) -> String {
    ctx.data_opt::<ProxyContext>()
        .map_or_else(|| "unknown".to_string(), |c| c.request_id.clone())
}
