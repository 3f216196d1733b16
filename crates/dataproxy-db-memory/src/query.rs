//! Filtering, ordering and pagination over stored records.
//!
//! `where` arguments are parsed once into a [`QueryFilter`] tree and then
//! evaluated against every candidate record. Only the scalar filter
//! vocabulary is understood; relation filters (`some`, `every`, `is`) are
//! rejected with a validation error.

use std::cmp::Ordering;

use dataproxy_client::ClientError;
use dataproxy_core::ModelDescriptor;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A stored record: column name to JSON value.
pub type Record = Map<String, Value>;

/// Parsed `where` argument.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    /// Matches every record (absent or empty `where`).
    All,
    And(Vec<QueryFilter>),
    Or(Vec<QueryFilter>),
    /// Matches records for which none of the inner filters match.
    Not(Vec<QueryFilter>),
    Field { field: String, condition: Condition },
}

/// Condition applied to a single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Not(Box<Condition>),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    Contains { value: String, insensitive: bool },
    StartsWith { value: String, insensitive: bool },
    EndsWith { value: String, insensitive: bool },
    /// Conjunction of several operators given in one object (`{ gt: 1, lt: 5 }`).
    All(Vec<Condition>),
}

impl QueryFilter {
    /// Parses a `where` object for `model`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for unknown fields, relation
    /// filters and malformed operator objects.
    pub fn parse(model: &ModelDescriptor, filter: Option<&Value>) -> Result<Self, ClientError> {
        match filter {
            None | Some(Value::Null) => Ok(Self::All),
            Some(Value::Object(map)) => Self::parse_object(model, map),
            Some(other) => Err(ClientError::validation(format!(
                "Argument `where` must be an object, got {other}"
            ))),
        }
    }

    fn parse_object(model: &ModelDescriptor, map: &Map<String, Value>) -> Result<Self, ClientError> {
        let mut parts = Vec::with_capacity(map.len());

        for (key, value) in map {
            let part = match key.as_str() {
                "AND" => Self::And(Self::parse_list(model, value)?),
                "OR" => Self::Or(Self::parse_list(model, value)?),
                "NOT" => Self::Not(Self::parse_list(model, value)?),
                _ => Self::parse_field(model, key, value)?,
            };
            parts.push(part);
        }

        Ok(match parts.len() {
            0 => Self::All,
            1 => parts.remove(0),
            _ => Self::And(parts),
        })
    }

    fn parse_list(model: &ModelDescriptor, value: &Value) -> Result<Vec<Self>, ClientError> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| Self::parse(model, Some(item)))
                .collect(),
            single => Ok(vec![Self::parse(model, Some(single))?]),
        }
    }

    fn parse_field(model: &ModelDescriptor, key: &str, value: &Value) -> Result<Self, ClientError> {
        if let Some(field) = model.field(key) {
            if field.is_relation() {
                return Err(ClientError::unsupported(format!(
                    "filtering on relation `{}.{key}`",
                    model.name
                )));
            }
            return Ok(Self::Field {
                field: key.to_string(),
                condition: Condition::parse(value)?,
            });
        }

        // Compound unique input: `{ leaderboardId_userId: { leaderboardId: 1, userId: 10 } }`.
        let ids = model.identifying_fields();
        if ids.len() > 1 && model.compound_key_name(&ids) == key {
            let Value::Object(parts) = value else {
                return Err(ClientError::validation(format!(
                    "Argument `{key}` must be an object"
                )));
            };
            let mut filters = Vec::with_capacity(ids.len());
            for id in ids {
                let part = parts.get(&id.name).ok_or_else(|| {
                    ClientError::validation(format!("Argument `{key}.{}` is missing", id.name))
                })?;
                filters.push(Self::Field {
                    field: id.name.clone(),
                    condition: Condition::Equals(part.clone()),
                });
            }
            return Ok(Self::And(filters));
        }

        Err(ClientError::validation(format!(
            "Unknown argument `{key}` in `where` of model `{}`",
            model.name
        )))
    }

    /// Builds an equality filter over `(field, value)` pairs.
    pub fn equals<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        Self::And(
            pairs
                .into_iter()
                .map(|(field, value)| Self::Field {
                    field,
                    condition: Condition::Equals(value),
                })
                .collect(),
        )
    }

    /// Check if a record matches this filter.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::All => true,
            Self::And(parts) => parts.iter().all(|p| p.matches(record)),
            Self::Or(parts) => parts.iter().any(|p| p.matches(record)),
            Self::Not(parts) => !parts.iter().any(|p| p.matches(record)),
            Self::Field { field, condition } => {
                condition.matches(record.get(field).unwrap_or(&Value::Null))
            }
        }
    }
}

impl Condition {
    fn parse(value: &Value) -> Result<Self, ClientError> {
        let Value::Object(ops) = value else {
            return Ok(Self::Equals(value.clone()));
        };

        let insensitive = ops.get("mode").and_then(Value::as_str) == Some("insensitive");
        let mut conditions = Vec::new();
        for (op, operand) in ops {
            let condition = match op.as_str() {
                "equals" => Self::Equals(operand.clone()),
                "in" => Self::In(as_list(op, operand)?),
                "notIn" => Self::NotIn(as_list(op, operand)?),
                "not" => Self::Not(Box::new(Self::parse(operand)?)),
                "lt" => Self::Lt(operand.clone()),
                "lte" => Self::Lte(operand.clone()),
                "gt" => Self::Gt(operand.clone()),
                "gte" => Self::Gte(operand.clone()),
                "contains" => Self::Contains {
                    value: as_text(op, operand)?,
                    insensitive,
                },
                "startsWith" => Self::StartsWith {
                    value: as_text(op, operand)?,
                    insensitive,
                },
                "endsWith" => Self::EndsWith {
                    value: as_text(op, operand)?,
                    insensitive,
                },
                "mode" => continue,
                other => {
                    return Err(ClientError::validation(format!(
                        "Unknown filter operator `{other}`"
                    )));
                }
            };
            conditions.push(condition);
        }

        Ok(if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            Self::All(conditions)
        })
    }

    fn matches(&self, actual: &Value) -> bool {
        match self {
            Self::Equals(expected) => values_equal(actual, expected),
            Self::In(list) => list.iter().any(|v| values_equal(actual, v)),
            Self::NotIn(list) => !actual.is_null() && !list.iter().any(|v| values_equal(actual, v)),
            Self::Not(inner) => !inner.matches(actual),
            Self::Lt(v) => compare_values(actual, v) == Some(Ordering::Less),
            Self::Lte(v) => matches!(
                compare_values(actual, v),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::Gt(v) => compare_values(actual, v) == Some(Ordering::Greater),
            Self::Gte(v) => matches!(
                compare_values(actual, v),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::Contains { value, insensitive } => {
                text_match(actual, value, *insensitive, |a, b| a.contains(b))
            }
            Self::StartsWith { value, insensitive } => {
                text_match(actual, value, *insensitive, |a, b| a.starts_with(b))
            }
            Self::EndsWith { value, insensitive } => {
                text_match(actual, value, *insensitive, |a, b| a.ends_with(b))
            }
            Self::All(parts) => parts.iter().all(|c| c.matches(actual)),
        }
    }
}

fn as_list(op: &str, value: &Value) -> Result<Vec<Value>, ClientError> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        _ => Err(ClientError::validation(format!(
            "Filter `{op}` expects a list"
        ))),
    }
}

fn as_text(op: &str, value: &Value) -> Result<String, ClientError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ClientError::validation(format!("Filter `{op}` expects a string")))
}

fn text_match(actual: &Value, needle: &str, insensitive: bool, f: impl Fn(&str, &str) -> bool) -> bool {
    let Some(actual) = actual.as_str() else {
        return false;
    };
    if insensitive {
        f(&actual.to_lowercase(), &needle.to_lowercase())
    } else {
        f(actual, needle)
    }
}

fn parse_datetime(s: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(s, &Rfc3339).ok()
}

/// Equality that treats `1` and `1.0` alike and compares timestamps by instant.
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_)) => {
            compare_values(a, b) == Some(Ordering::Equal)
        }
        _ => a == b,
    }
}

/// Orders two values of the same kind; `None` when they are not comparable.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => match (parse_datetime(x), parse_datetime(y)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// One `orderBy` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
    /// Place nulls before non-null values.
    pub nulls_first: bool,
}

impl SortKey {
    /// Parses `orderBy`: an object or a list of objects, each
    /// `{ field: "asc" | "desc" }` or `{ field: { sort, nulls } }`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for unknown directions.
    pub fn parse(order_by: Option<&Value>) -> Result<Vec<Self>, ClientError> {
        let entries: Vec<&Value> = match order_by {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(items)) => items.iter().collect(),
            Some(single) => vec![single],
        };

        let mut keys = Vec::new();
        for entry in entries {
            let Value::Object(map) = entry else {
                return Err(ClientError::validation("Argument `orderBy` must be an object"));
            };
            for (field, spec) in map {
                let (direction, nulls) = match spec {
                    Value::String(dir) => (dir.as_str(), None),
                    Value::Object(o) => (
                        o.get("sort").and_then(Value::as_str).unwrap_or("asc"),
                        o.get("nulls").and_then(Value::as_str),
                    ),
                    _ => ("", None),
                };
                let descending = match direction {
                    "asc" => false,
                    "desc" => true,
                    other => {
                        return Err(ClientError::validation(format!(
                            "Invalid sort order `{other}` for `{field}`"
                        )));
                    }
                };
                keys.push(Self {
                    field: field.clone(),
                    descending,
                    nulls_first: nulls.map_or(descending, |n| n == "first"),
                });
            }
        }
        Ok(keys)
    }

    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let x = a.get(&self.field).unwrap_or(&Value::Null);
        let y = b.get(&self.field).unwrap_or(&Value::Null);
        match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) if self.nulls_first => Ordering::Less,
            (true, false) => Ordering::Greater,
            (false, true) if self.nulls_first => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let ord = compare_values(x, y).unwrap_or(Ordering::Equal);
                if self.descending { ord.reverse() } else { ord }
            }
        }
    }
}

/// Stable sort by the given keys.
pub fn sort_records(records: &mut [Record], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        keys.iter()
            .map(|k| k.compare(a, b))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

/// Applies `skip` and `take`. A negative `take` keeps the last `|take|` records.
///
/// # Errors
///
/// Returns `ClientError::Validation` if either argument is not an integer.
pub fn paginate(records: Vec<Record>, args: &Value) -> Result<Vec<Record>, ClientError> {
    let skip = integer_arg(args, "skip")?.unwrap_or(0).max(0) as usize;
    let take = integer_arg(args, "take")?;

    let remaining = records.into_iter().skip(skip);
    Ok(match take {
        None => remaining.collect(),
        Some(n) if n >= 0 => remaining.take(n as usize).collect(),
        Some(n) => {
            let all: Vec<_> = remaining.collect();
            let keep = n.unsigned_abs() as usize;
            let start = all.len().saturating_sub(keep);
            all.into_iter().skip(start).collect()
        }
    })
}

/// Removes records whose `fields` repeat an earlier record's values.
pub fn distinct(records: Vec<Record>, fields: &[String]) -> Vec<Record> {
    if fields.is_empty() {
        return records;
    }
    let mut seen: Vec<Vec<Value>> = Vec::new();
    records
        .into_iter()
        .filter(|r| {
            let key: Vec<Value> = fields
                .iter()
                .map(|f| r.get(f).cloned().unwrap_or(Value::Null))
                .collect();
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        })
        .collect()
}

/// Reads an optional integer argument.
///
/// # Errors
///
/// Returns `ClientError::Validation` if present and not an integer.
pub fn integer_arg(args: &Value, name: &str) -> Result<Option<i64>, ClientError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| ClientError::validation(format!("Argument `{name}` must be an integer"))),
    }
}

/// Reads a field-name list argument given either as a string or a list of strings.
#[must_use]
pub fn field_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
