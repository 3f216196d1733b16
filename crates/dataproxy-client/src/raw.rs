//! Values returned by raw SQL execution.
//!
//! Raw results keep the driver's native types. Several of them (64-bit
//! integers in particular) cannot travel through GraphQL scalars untouched,
//! so the proxy tags each leaf before returning it.

use indexmap::IndexMap;
use time::OffsetDateTime;

/// A value produced by the database driver for a raw query.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    /// A column typed as a 64-bit integer (`BIGINT`, `INT8`).
    BigInt(i64),
    Float(f64),
    /// Arbitrary precision decimal in its textual form.
    Decimal(String),
    String(String),
    DateTime(OffsetDateTime),
    Json(serde_json::Value),
    List(Vec<RawValue>),
    Object(IndexMap<String, RawValue>),
}

impl RawValue {
    /// Builds a row object from `(column, value)` pairs.
    pub fn row<I, K>(columns: I) -> Self
    where
        I: IntoIterator<Item = (K, RawValue)>,
        K: Into<String>,
    {
        Self::Object(columns.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for RawValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<OffsetDateTime> for RawValue {
    fn from(value: OffsetDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
