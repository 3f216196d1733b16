//! Raw SQL root fields (`queryRaw`, `executeRaw`).
//!
//! Raw results carry driver types that GraphQL scalars cannot represent
//! faithfully. Each scalar leaf of a `queryRaw` result is therefore replaced
//! by a tagged envelope `{"prisma__type": <tag>, "prisma__value": <value>}`
//! which the ORM client decodes on its side.

use dataproxy_client::{CrudClient, RawValue};
use serde_json::{Map, Value, json};
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::error::GraphQLError;

pub const TYPE_KEY: &str = "prisma__type";
pub const VALUE_KEY: &str = "prisma__value";

/// The raw operations the proxy knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawOperation {
    /// Runs a query and returns its rows, tagged.
    Query,
    /// Runs a statement and returns the affected row count.
    Execute,
}

impl RawOperation {
    /// Recognises a raw root field name.
    #[must_use]
    pub fn from_field(name: &str) -> Option<Self> {
        match name {
            "queryRaw" => Some(Self::Query),
            "executeRaw" => Some(Self::Execute),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "queryRaw",
            Self::Execute => "executeRaw",
        }
    }

    /// Runs the operation with the root field arguments `args`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a missing `query` or malformed
    /// `parameters`, and `Client` for failures of the client.
    pub async fn run(
        &self,
        client: &dyn CrudClient,
        args: &Map<String, Value>,
    ) -> Result<Value, GraphQLError> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| GraphQLError::InvalidArgument(format!("{} requires a `query` string", self.as_str())))?;
        let parameters = decode_parameters(args.get("parameters"))?;
        debug!(operation = self.as_str(), parameters = parameters.len(), "Executing raw SQL");

        match self {
            Self::Query => {
                let rows = client.query_raw(query, parameters).await?;
                Ok(tag_raw_value(rows))
            }
            Self::Execute => {
                let affected = client.execute_raw(query, parameters).await?;
                Ok(Value::from(affected))
            }
        }
    }
}

/// Decodes the positional parameters of a raw call.
///
/// The ORM client sends them as a JSON-encoded array string; a plain array
/// is accepted too. Absent or null means no parameters.
///
/// # Errors
///
/// Returns `InvalidArgument` if the value is not an array or a string
/// holding one.
pub fn decode_parameters(value: Option<&Value>) -> Result<Vec<Value>, GraphQLError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(items)) => Ok(items),
            Ok(_) => Err(GraphQLError::InvalidArgument(
                "`parameters` must encode a JSON array".into(),
            )),
            Err(e) => Err(GraphQLError::InvalidArgument(format!(
                "`parameters` is not valid JSON: {e}"
            ))),
        },
        Some(_) => Err(GraphQLError::InvalidArgument(
            "`parameters` must be a JSON array".into(),
        )),
    }
}

/// Converts a raw driver result into its tagged wire form.
///
/// Rows and lists keep their shape; only scalar leaves are replaced.
#[must_use]
pub fn tag_raw_value(value: RawValue) -> Value {
    match value {
        RawValue::BigInt(n) => tagged("bigint", Value::String(n.to_string())),
        RawValue::Int(n) => tagged("number", Value::from(n)),
        RawValue::Float(f) => tagged("number", Value::from(f)),
        RawValue::Decimal(d) => tagged("decimal", Value::String(d)),
        RawValue::String(s) => tagged("string", Value::String(s)),
        RawValue::Null => tagged("null", Value::Null),
        RawValue::Bool(b) => tagged("bool", Value::Bool(b)),
        RawValue::DateTime(dt) => {
            let text = dt.format(&Rfc3339).unwrap_or_else(|_| dt.to_string());
            tagged("datetime", Value::String(text))
        }
        RawValue::Json(json) => tag_json(json),
        RawValue::List(items) => Value::Array(items.into_iter().map(tag_raw_value).collect()),
        RawValue::Object(columns) => Value::Object(
            columns
                .into_iter()
                .map(|(name, value)| (name, tag_raw_value(value)))
                .collect(),
        ),
    }
}

fn tag_json(json: Value) -> Value {
    match json {
        Value::Null => tagged("null", Value::Null),
        Value::Bool(b) => tagged("bool", Value::Bool(b)),
        Value::Number(n) => tagged("number", Value::Number(n)),
        Value::String(s) => tagged("string", Value::String(s)),
        Value::Array(items) => Value::Array(items.into_iter().map(tag_json).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, tag_json(value)))
                .collect(),
        ),
    }
}

fn tagged(tag: &str, value: Value) -> Value {
    json!({ TYPE_KEY: tag, VALUE_KEY: value })
}
