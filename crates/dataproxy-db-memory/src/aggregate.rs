//! `count`, `aggregate` and `groupBy` over already filtered records.

use std::cmp::Ordering;

use dataproxy_client::ClientError;
use serde_json::{Map, Number, Value, json};

use crate::query::{Record, compare_values, values_equal};

/// An aggregate group requested in the arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Count,
    Min,
    Max,
    Sum,
    Avg,
}

impl AggregateOp {
    /// Parses an aggregate group key (`_count`, `_min`, ...).
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "_count" => Some(Self::Count),
            "_min" => Some(Self::Min),
            "_max" => Some(Self::Max),
            "_sum" => Some(Self::Sum),
            "_avg" => Some(Self::Avg),
            _ => None,
        }
    }
}

/// Counts records. With a selection object the result has one count per
/// selected field (`_all` counts records, other keys count non-null values).
#[must_use]
pub fn count(records: &[Record], selection: Option<&Value>) -> Value {
    match selection {
        Some(Value::Object(fields)) => Value::Object(
            fields
                .iter()
                .filter(|(_, wanted)| is_selected(wanted))
                .map(|(field, _)| (field.clone(), json!(count_field(records, field))))
                .collect(),
        ),
        _ => json!(records.len()),
    }
}

fn count_field(records: &[Record], field: &str) -> usize {
    if field == "_all" {
        return records.len();
    }
    records
        .iter()
        .filter(|r| r.get(field).is_some_and(|v| !v.is_null()))
        .count()
}

fn is_selected(value: &Value) -> bool {
    !matches!(value, Value::Bool(false) | Value::Null)
}

/// Computes every aggregate group present in `args`, in argument order.
///
/// # Errors
///
/// Returns `ClientError::Validation` when summing or averaging non-numeric values.
pub fn aggregate(records: &[Record], args: &Value) -> Result<Value, ClientError> {
    let mut out = Map::new();
    if let Value::Object(map) = args {
        for (key, selection) in map {
            if let Some(op) = AggregateOp::from_key(key) {
                out.insert(key.clone(), compute(records, op, selection)?);
            }
        }
    }
    Ok(Value::Object(out))
}

fn compute(records: &[Record], op: AggregateOp, selection: &Value) -> Result<Value, ClientError> {
    let Value::Object(fields) = selection else {
        if op == AggregateOp::Count {
            return Ok(json!(records.len()));
        }
        return Err(ClientError::validation(
            "Aggregate selection must name the fields to aggregate",
        ));
    };

    let mut out = Map::new();
    for (field, wanted) in fields {
        if !is_selected(wanted) {
            continue;
        }
        let values: Vec<&Value> = records
            .iter()
            .filter_map(|r| r.get(field))
            .filter(|v| !v.is_null())
            .collect();
        let result = match op {
            AggregateOp::Min => extreme(&values, Ordering::Less),
            AggregateOp::Max => extreme(&values, Ordering::Greater),
            AggregateOp::Sum => sum(field, &values)?,
            AggregateOp::Avg => avg(field, &values)?,
            AggregateOp::Count => json!(count_field(records, field)),
        };
        out.insert(field.clone(), result);
    }
    Ok(Value::Object(out))
}

fn extreme(values: &[&Value], wanted: Ordering) -> Value {
    values
        .iter()
        .copied()
        .fold(None::<&Value>, |best, v| match best {
            Some(b) if compare_values(v, b) != Some(wanted) => Some(b),
            _ => Some(v),
        })
        .cloned()
        .unwrap_or(Value::Null)
}

fn numbers<'a>(field: &str, values: &[&'a Value]) -> Result<Vec<&'a Number>, ClientError> {
    values
        .iter()
        .map(|v| match v {
            Value::Number(n) => Ok(n),
            _ => Err(ClientError::validation(format!(
                "Field `{field}` is not numeric"
            ))),
        })
        .collect()
}

fn sum(field: &str, values: &[&Value]) -> Result<Value, ClientError> {
    let nums = numbers(field, values)?;
    if nums.is_empty() {
        return Ok(Value::Null);
    }
    if nums.iter().all(|n| n.is_i64()) {
        let total = nums
            .iter()
            .filter_map(|n| n.as_i64())
            .try_fold(0i64, i64::checked_add)
            .ok_or_else(|| ClientError::validation(format!("Sum of `{field}` overflows")))?;
        return Ok(json!(total));
    }
    let total: f64 = nums.iter().filter_map(|n| n.as_f64()).sum();
    Ok(json!(total))
}

fn avg(field: &str, values: &[&Value]) -> Result<Value, ClientError> {
    let nums = numbers(field, values)?;
    if nums.is_empty() {
        return Ok(Value::Null);
    }
    let total: f64 = nums.iter().filter_map(|n| n.as_f64()).sum();
    Ok(json!(total / nums.len() as f64))
}

/// Groups records by the `by` fields and aggregates each group.
///
/// Groups appear in order of their first record. Each output row carries the
/// grouping values followed by the requested aggregate groups.
///
/// # Errors
///
/// Returns `ClientError::Validation` if `by` is empty, and the errors of
/// [`aggregate`] per group.
pub fn group_by(records: &[Record], by: &[String], args: &Value) -> Result<Vec<Record>, ClientError> {
    if by.is_empty() {
        return Err(ClientError::validation("Argument `by` must name at least one field"));
    }

    let mut groups: Vec<(Vec<Value>, Vec<Record>)> = Vec::new();
    for record in records {
        let key: Vec<Value> = by
            .iter()
            .map(|f| record.get(f).cloned().unwrap_or(Value::Null))
            .collect();
        match groups
            .iter_mut()
            .find(|(k, _)| k.iter().zip(&key).all(|(a, b)| values_equal(a, b)))
        {
            Some((_, members)) => members.push(record.clone()),
            None => groups.push((key, vec![record.clone()])),
        }
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let mut row: Record = by.iter().cloned().zip(key).collect();
            if let Value::Object(aggregates) = aggregate(&members, args)? {
                row.extend(aggregates);
            }
            Ok(row)
        })
        .collect()
}
