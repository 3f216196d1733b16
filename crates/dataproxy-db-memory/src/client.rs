use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use async_trait::async_trait;
use dataproxy_client::{ClientError, ClientOperation, CrudClient, RecordHandle};
use dataproxy_core::{FieldDescriptor, IntrospectionDocument, ModelDescriptor, lower_first};
use papaya::HashMap as PapayaHashMap;
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::aggregate;
use crate::query::{self, QueryFilter, Record, SortKey};

/// Row key: the JSON-encoded identifying field values, or `#<seq>` for
/// models without a key.
pub type RowKey = String;

#[derive(Debug, Clone)]
struct Row {
    /// Insertion sequence, used as the default ordering.
    seq: u64,
    data: Record,
}

#[derive(Debug)]
struct Table {
    model: ModelDescriptor,
    rows: PapayaHashMap<RowKey, Row>,
    sequence: AtomicU64,
    /// Last value handed out by `autoincrement()`.
    autoincrement: AtomicI64,
}

impl Table {
    fn new(model: ModelDescriptor) -> Self {
        Self {
            model,
            rows: PapayaHashMap::new(),
            sequence: AtomicU64::new(1),
            autoincrement: AtomicI64::new(0),
        }
    }

    fn next_seq(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    fn key_for(&self, record: &Record, seq: u64) -> RowKey {
        let ids = self.model.identifying_fields();
        if ids.is_empty() {
            return format!("#{seq}");
        }
        Value::Array(
            ids.iter()
                .map(|f| record.get(&f.name).cloned().unwrap_or(Value::Null))
                .collect(),
        )
        .to_string()
    }

    /// All rows in insertion order.
    fn entries(&self) -> Vec<(RowKey, Row)> {
        let guard = self.rows.pin();
        let mut entries: Vec<_> = guard
            .iter()
            .map(|(k, r)| (k.clone(), r.clone()))
            .collect();
        entries.sort_by_key(|(_, r)| r.seq);
        entries
    }
}

#[derive(Debug)]
struct Store {
    /// Tables by model name.
    tables: HashMap<String, Table>,
    /// Delegate name (`leaderboardRow`) to model name (`LeaderboardRow`).
    delegates: HashMap<String, String>,
    /// Serializes writes so unique checks and inserts are not interleaved.
    writes: Mutex<()>,
}

/// In-memory CRUD client using one papaya lock-free HashMap per model.
///
/// Reads never block. Writes are serialized per client. Filtering supports
/// the scalar operator vocabulary only; this is a development and test
/// backend, not a query planner.
#[derive(Debug, Clone)]
pub struct InMemoryClient {
    store: Arc<Store>,
}

impl InMemoryClient {
    /// Creates an empty client with one table per model of the document.
    #[must_use]
    pub fn new(document: &IntrospectionDocument) -> Self {
        let models = &document.datamodel.models;
        let tables = models
            .iter()
            .map(|m| (m.name.clone(), Table::new(m.clone())))
            .collect();
        let delegates = models
            .iter()
            .map(|m| (lower_first(&m.name), m.name.clone()))
            .collect();

        Self {
            store: Arc::new(Store {
                tables,
                delegates,
                writes: Mutex::new(()),
            }),
        }
    }

    /// Inserts records given as `{ "<Model>": [record, ...] }`.
    ///
    /// Records go through the regular create path, so defaults and unique
    /// constraints apply. Returns the number of inserted records.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for unknown models or malformed
    /// records, and `ClientError::UniqueConstraint` for duplicates.
    pub async fn seed(&self, data: &Value) -> Result<usize, ClientError> {
        let Value::Object(models) = data else {
            return Err(ClientError::validation(
                "Seed data must be an object keyed by model name",
            ));
        };

        let _guard = self.store.writes.lock().await;
        let mut inserted = 0;
        for (model, records) in models {
            let table = self.model_table(model)?;
            let records = records.as_array().ok_or_else(|| {
                ClientError::validation(format!("Seed data for `{model}` must be a list"))
            })?;
            for record in records {
                self.create_record(table, record)?;
                inserted += 1;
            }
        }

        info!(records = inserted, "Seeded in-memory client");
        Ok(inserted)
    }

    /// Number of stored records of `model` (0 for unknown models).
    #[must_use]
    pub fn row_count(&self, model: &str) -> usize {
        self.store
            .tables
            .get(model)
            .map_or(0, |t| t.rows.pin().len())
    }

    fn table(&self, delegate: &str) -> Result<&Table, ClientError> {
        self.store
            .delegates
            .get(delegate)
            .and_then(|model| self.store.tables.get(model))
            .ok_or_else(|| ClientError::validation(format!("Unknown model delegate `{delegate}`")))
    }

    fn model_table(&self, model: &str) -> Result<&Table, ClientError> {
        self.store
            .tables
            .get(model)
            .ok_or_else(|| ClientError::validation(format!("Unknown model `{model}`")))
    }

    // ==================== Reads ====================

    fn select_rows(
        &self,
        table: &Table,
        args: &Value,
        scope: Option<QueryFilter>,
    ) -> Result<Vec<Record>, ClientError> {
        let mut filter = QueryFilter::parse(&table.model, args.get("where"))?;
        if let Some(scope) = scope {
            filter = QueryFilter::And(vec![scope, filter]);
        }

        let mut records: Vec<Record> = table
            .entries()
            .into_iter()
            .map(|(_, row)| row.data)
            .filter(|r| filter.matches(r))
            .collect();

        query::sort_records(&mut records, &SortKey::parse(args.get("orderBy"))?);

        if let Some(cursor) = args.get("cursor").filter(|c| !c.is_null()) {
            let cursor = QueryFilter::parse(&table.model, Some(cursor))?;
            let start = records
                .iter()
                .position(|r| cursor.matches(r))
                .unwrap_or(records.len());
            records.drain(..start);
        }

        let records = query::distinct(records, &query::field_list(args.get("distinct")));
        query::paginate(records, args)
    }

    fn find_entries(
        &self,
        table: &Table,
        filter: Option<&Value>,
    ) -> Result<Vec<(RowKey, Row)>, ClientError> {
        let filter = QueryFilter::parse(&table.model, filter)?;
        Ok(table
            .entries()
            .into_iter()
            .filter(|(_, row)| filter.matches(&row.data))
            .collect())
    }

    fn find_entry(
        &self,
        table: &Table,
        filter: Option<&Value>,
    ) -> Result<Option<(RowKey, Row)>, ClientError> {
        Ok(self.find_entries(table, filter)?.into_iter().next())
    }

    fn find_first(&self, table: &Table, args: &Value) -> Result<Value, ClientError> {
        let rows = self.select_rows(table, args, None)?;
        match rows.first() {
            Some(record) => self.project(table, record, args),
            None => Ok(Value::Null),
        }
    }

    /// Shapes a stored record for output according to `select`/`include`.
    fn project(&self, table: &Table, record: &Record, args: &Value) -> Result<Value, ClientError> {
        let mut out = Map::new();

        if let Some(select) = args.get("select").and_then(Value::as_object) {
            for (key, wanted) in select.iter().filter(|(_, w)| is_wanted(w)) {
                let value = self.selected_value(table, record, key, wanted)?;
                out.insert(key.clone(), value);
            }
            return Ok(Value::Object(out));
        }

        for field in table.model.scalar_fields() {
            let value = record.get(&field.name).cloned().unwrap_or(Value::Null);
            out.insert(field.name.clone(), value);
        }
        if let Some(include) = args.get("include").and_then(Value::as_object) {
            for (key, wanted) in include.iter().filter(|(_, w)| is_wanted(w)) {
                let value = self.selected_value(table, record, key, wanted)?;
                out.insert(key.clone(), value);
            }
        }
        Ok(Value::Object(out))
    }

    fn selected_value(
        &self,
        table: &Table,
        record: &Record,
        key: &str,
        wanted: &Value,
    ) -> Result<Value, ClientError> {
        match table.model.field(key) {
            Some(field) if field.is_relation() => {
                let nested = if wanted.is_object() { wanted.clone() } else { Value::Null };
                self.related(table, record, field, &nested)
            }
            Some(_) => Ok(record.get(key).cloned().unwrap_or(Value::Null)),
            None if key == "_count" => self.relation_counts(table, record, wanted),
            None => Err(ClientError::validation(format!(
                "Unknown field `{key}` for select statement on model `{}`",
                table.model.name
            ))),
        }
    }

    fn relation_counts(
        &self,
        table: &Table,
        record: &Record,
        wanted: &Value,
    ) -> Result<Value, ClientError> {
        let fields: Vec<&FieldDescriptor> = match wanted.get("select").and_then(Value::as_object) {
            Some(select) => select
                .iter()
                .filter(|(_, w)| is_wanted(w))
                .map(|(name, _)| {
                    table
                        .model
                        .field(name)
                        .filter(|f| f.is_relation() && f.is_list)
                        .ok_or_else(|| {
                            ClientError::validation(format!("`{name}` is not a list relation"))
                        })
                })
                .collect::<Result<_, _>>()?,
            None => table
                .model
                .fields
                .iter()
                .filter(|f| f.is_relation() && f.is_list)
                .collect(),
        };

        let mut out = Map::new();
        for field in fields {
            let related = self.related(table, record, field, &Value::Null)?;
            let n = related.as_array().map_or(0, Vec::len);
            out.insert(field.name.clone(), json!(n));
        }
        Ok(Value::Object(out))
    }

    /// Reads relation `field` of `record`, applying the relation arguments.
    fn related(
        &self,
        table: &Table,
        record: &Record,
        field: &FieldDescriptor,
        args: &Value,
    ) -> Result<Value, ClientError> {
        let target = self.model_table(&field.type_name)?;
        let empty = if field.is_list { json!([]) } else { Value::Null };

        let mut scope = Vec::new();
        for (target_field, source_field) in self.join_pairs(table, field, target)? {
            let value = record.get(&source_field).cloned().unwrap_or(Value::Null);
            if value.is_null() {
                return Ok(empty);
            }
            scope.push((target_field, value));
        }
        let scope = QueryFilter::equals(scope);

        if field.is_list {
            let rows = self.select_rows(target, args, Some(scope))?;
            return rows
                .iter()
                .map(|r| self.project(target, r, args))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array);
        }

        let rows = self.select_rows(target, &Value::Null, Some(scope))?;
        match rows.first() {
            Some(related) => self.project(target, related, args),
            None => Ok(empty),
        }
    }

    /// `(target field, source field)` pairs joining `table` to `target` through `field`.
    fn join_pairs(
        &self,
        table: &Table,
        field: &FieldDescriptor,
        target: &Table,
    ) -> Result<Vec<(String, String)>, ClientError> {
        if !field.relation_from_fields.is_empty() {
            return Ok(field
                .relation_to_fields
                .iter()
                .cloned()
                .zip(field.relation_from_fields.iter().cloned())
                .collect());
        }

        let back = target
            .model
            .fields
            .iter()
            .find(|f| {
                f.relation_name == field.relation_name
                    && f.type_name == table.model.name
                    && !f.relation_from_fields.is_empty()
                    && !(target.model.name == table.model.name && f.name == field.name)
            })
            .ok_or_else(|| {
                ClientError::internal(format!(
                    "Relation `{}.{}` has no foreign key side",
                    table.model.name, field.name
                ))
            })?;

        Ok(back
            .relation_from_fields
            .iter()
            .cloned()
            .zip(back.relation_to_fields.iter().cloned())
            .collect())
    }

    // ==================== Writes ====================

    fn create_record(&self, table: &Table, data: &Value) -> Result<Record, ClientError> {
        let Value::Object(data) = data else {
            return Err(ClientError::validation("Argument `data` must be an object"));
        };
        let model = &table.model;

        if let Some(unknown) = data.keys().find(|k| model.field(k).is_none()) {
            return Err(ClientError::validation(format!(
                "Unknown argument `{unknown}` in data of model `{}`",
                model.name
            )));
        }

        // Relation writes fill foreign key columns before scalars are read.
        let mut connected = Record::new();
        for field in model.fields.iter().filter(|f| f.is_relation()) {
            if let Some(value) = data.get(&field.name) {
                self.connect(field, value, &mut connected)?;
            }
        }

        let mut record = Record::new();
        for field in model.scalar_fields() {
            let value = match data.get(&field.name).or_else(|| connected.get(&field.name)) {
                Some(Value::Object(ops)) if field.is_list && ops.contains_key("set") => {
                    ops["set"].clone()
                }
                Some(value) => {
                    if field.default_function() == Some("autoincrement") {
                        if let Some(n) = value.as_i64() {
                            table.autoincrement.fetch_max(n, Ordering::SeqCst);
                        }
                    }
                    value.clone()
                }
                None => match default_value(table, field)? {
                    Some(value) => value,
                    None if field.is_list => json!([]),
                    None if field.is_required => {
                        return Err(ClientError::validation(format!(
                            "Argument `{}` is missing.",
                            field.name
                        )));
                    }
                    None => Value::Null,
                },
            };
            record.insert(field.name.clone(), value);
        }

        let seq = table.next_seq();
        self.store_row(table, record.clone(), seq, None)?;
        Ok(record)
    }

    fn update_record(
        &self,
        table: &Table,
        key: &RowKey,
        row: Row,
        data: &Value,
    ) -> Result<Record, ClientError> {
        let Value::Object(data) = data else {
            return Err(ClientError::validation("Argument `data` must be an object"));
        };

        let mut record = row.data;
        for (name, value) in data {
            let field = table.model.field(name).ok_or_else(|| {
                ClientError::validation(format!(
                    "Unknown argument `{name}` in data of model `{}`",
                    table.model.name
                ))
            })?;
            if field.is_relation() {
                self.connect(field, value, &mut record)?;
                continue;
            }
            let next = match value {
                Value::Object(ops) if field.type_name != "Json" => {
                    apply_update_op(field, record.get(name).unwrap_or(&Value::Null), ops)?
                }
                other => other.clone(),
            };
            record.insert(name.clone(), next);
        }

        for field in table.model.fields.iter().filter(|f| f.is_updated_at) {
            if !data.contains_key(&field.name) {
                record.insert(field.name.clone(), now()?);
            }
        }

        self.store_row(table, record.clone(), row.seq, Some(key))?;
        Ok(record)
    }

    /// Applies `{ connect }` / `{ disconnect }` on the owning side of a relation.
    fn connect(
        &self,
        field: &FieldDescriptor,
        value: &Value,
        record: &mut Record,
    ) -> Result<(), ClientError> {
        let Value::Object(ops) = value else {
            return Err(ClientError::validation(format!(
                "Relation argument `{}` must be an object",
                field.name
            )));
        };
        if field.relation_from_fields.is_empty() {
            return Err(ClientError::unsupported(format!(
                "nested writes from the non-owning side of relation `{}`",
                field.name
            )));
        }

        if let Some(target) = ops.get("connect") {
            let target_table = self.model_table(&field.type_name)?;
            let mut pairs = Vec::new();
            for (from, to) in field.relation_from_fields.iter().zip(&field.relation_to_fields) {
                let value = lookup_key_part(target, to).ok_or_else(|| {
                    ClientError::validation(format!("Argument `connect.{to}` is missing"))
                })?;
                pairs.push((from.clone(), to.clone(), value.clone()));
            }

            let filter = QueryFilter::equals(pairs.iter().map(|(_, to, v)| (to.clone(), v.clone())));
            let exists = target_table
                .entries()
                .iter()
                .any(|(_, row)| filter.matches(&row.data));
            if !exists {
                return Err(ClientError::not_found(format!(
                    "No '{}' record found for a nested connect on relation '{}'.",
                    field.type_name,
                    field.relation_name.as_deref().unwrap_or_default()
                )));
            }

            for (from, _, value) in pairs {
                record.insert(from, value);
            }
            return Ok(());
        }

        if ops.get("disconnect").is_some_and(is_wanted) {
            for from in &field.relation_from_fields {
                record.insert(from.clone(), Value::Null);
            }
            return Ok(());
        }

        let op = ops.keys().next().map_or("", String::as_str);
        Err(ClientError::unsupported(format!(
            "nested write `{op}` on relation `{}`",
            field.name
        )))
    }

    fn store_row(
        &self,
        table: &Table,
        record: Record,
        seq: u64,
        replacing: Option<&RowKey>,
    ) -> Result<(), ClientError> {
        check_unique(table, &record, replacing)?;

        let key = table.key_for(&record, seq);
        let guard = table.rows.pin();
        if let Some(old) = replacing {
            if *old != key {
                guard.remove(old);
            }
        }
        guard.insert(key, Row { seq, data: record });
        Ok(())
    }

    fn create_many(&self, table: &Table, args: &Value) -> Result<Vec<Record>, ClientError> {
        let skip_duplicates = args
            .get("skipDuplicates")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let data = match args.get("data") {
            Some(Value::Array(items)) => items.clone(),
            Some(single @ Value::Object(_)) => vec![single.clone()],
            _ => return Err(ClientError::validation("Argument `data` is missing.")),
        };

        let mut created = Vec::with_capacity(data.len());
        for item in &data {
            match self.create_record(table, item) {
                Ok(record) => created.push(record),
                Err(ClientError::UniqueConstraint { .. }) if skip_duplicates => {}
                Err(err) => return Err(err),
            }
        }
        Ok(created)
    }

    fn update_many(&self, table: &Table, args: &Value) -> Result<Vec<Record>, ClientError> {
        let data = args.get("data").unwrap_or(&Value::Null);
        self.find_entries(table, args.get("where"))?
            .into_iter()
            .map(|(key, row)| self.update_record(table, &key, row, data))
            .collect()
    }

    fn project_all(&self, table: &Table, records: &[Record], args: &Value) -> Result<Value, ClientError> {
        records
            .iter()
            .map(|r| self.project(table, r, args))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }
}

#[async_trait]
impl CrudClient for InMemoryClient {
    async fn execute(
        &self,
        delegate: &str,
        operation: ClientOperation,
        args: Value,
    ) -> Result<Value, ClientError> {
        let table = self.table(delegate)?;
        debug!(model = %table.model.name, operation = %operation, "In-memory client call");

        match operation {
            ClientOperation::FindUnique | ClientOperation::FindFirst => self.find_first(table, &args),
            ClientOperation::FindUniqueOrThrow | ClientOperation::FindFirstOrThrow => {
                let found = self.find_first(table, &args)?;
                if found.is_null() {
                    return Err(ClientError::not_found(format!("No {} found", table.model.name)));
                }
                Ok(found)
            }
            ClientOperation::FindMany => {
                let rows = self.select_rows(table, &args, None)?;
                self.project_all(table, &rows, &args)
            }
            ClientOperation::Count => {
                let rows = self.select_rows(table, &args, None)?;
                Ok(aggregate::count(&rows, args.get("select")))
            }
            ClientOperation::Aggregate => {
                let rows = self.select_rows(table, &args, None)?;
                aggregate::aggregate(&rows, &args)
            }
            ClientOperation::GroupBy => {
                if args.get("having").is_some_and(|h| !h.is_null()) {
                    return Err(ClientError::unsupported("groupBy `having` on the in-memory client"));
                }
                let by = query::field_list(args.get("by"));
                let scope = json!({ "where": args.get("where").cloned().unwrap_or(Value::Null) });
                let rows = self.select_rows(table, &scope, None)?;

                let mut groups = aggregate::group_by(&rows, &by, &args)?;
                query::sort_records(&mut groups, &SortKey::parse(args.get("orderBy"))?);
                let groups = query::paginate(groups, &args)?;
                Ok(Value::Array(groups.into_iter().map(Value::Object).collect()))
            }
            ClientOperation::Create => {
                let _guard = self.store.writes.lock().await;
                let record = self.create_record(table, args.get("data").unwrap_or(&Value::Null))?;
                self.project(table, &record, &args)
            }
            ClientOperation::CreateMany => {
                let _guard = self.store.writes.lock().await;
                let created = self.create_many(table, &args)?;
                Ok(json!({ "count": created.len() }))
            }
            ClientOperation::CreateManyAndReturn => {
                let _guard = self.store.writes.lock().await;
                let created = self.create_many(table, &args)?;
                self.project_all(table, &created, &args)
            }
            ClientOperation::Update => {
                let _guard = self.store.writes.lock().await;
                let (key, row) = self
                    .find_entry(table, args.get("where"))?
                    .ok_or_else(|| ClientError::not_found("Record to update not found."))?;
                let data = args.get("data").unwrap_or(&Value::Null);
                let record = self.update_record(table, &key, row, data)?;
                self.project(table, &record, &args)
            }
            ClientOperation::UpdateMany => {
                let _guard = self.store.writes.lock().await;
                let updated = self.update_many(table, &args)?;
                Ok(json!({ "count": updated.len() }))
            }
            ClientOperation::UpdateManyAndReturn => {
                let _guard = self.store.writes.lock().await;
                let updated = self.update_many(table, &args)?;
                self.project_all(table, &updated, &args)
            }
            ClientOperation::Upsert => {
                let _guard = self.store.writes.lock().await;
                let record = match self.find_entry(table, args.get("where"))? {
                    Some((key, row)) => {
                        let data = args.get("update").unwrap_or(&Value::Null);
                        self.update_record(table, &key, row, data)?
                    }
                    None => self.create_record(table, args.get("create").unwrap_or(&Value::Null))?,
                };
                self.project(table, &record, &args)
            }
            ClientOperation::Delete => {
                let _guard = self.store.writes.lock().await;
                let (key, row) = self
                    .find_entry(table, args.get("where"))?
                    .ok_or_else(|| ClientError::not_found("Record to delete does not exist."))?;
                let deleted = self.project(table, &row.data, &args)?;
                table.rows.pin().remove(&key);
                Ok(deleted)
            }
            ClientOperation::DeleteMany => {
                let _guard = self.store.writes.lock().await;
                let entries = self.find_entries(table, args.get("where"))?;
                let guard = table.rows.pin();
                for (key, _) in &entries {
                    guard.remove(key);
                }
                Ok(json!({ "count": entries.len() }))
            }
            ClientOperation::FindRaw | ClientOperation::AggregateRaw => Err(
                ClientError::unsupported(format!("{operation} on the in-memory client")),
            ),
        }
    }

    async fn find_unique(
        &self,
        delegate: &str,
        args: Value,
    ) -> Result<Box<dyn RecordHandle>, ClientError> {
        self.table(delegate)?;
        Ok(Box::new(MemoryRecordHandle {
            client: self.clone(),
            delegate: delegate.to_string(),
            args,
        }))
    }
}

/// Lazy `findUnique` result; the lookup runs when a relation is read.
struct MemoryRecordHandle {
    client: InMemoryClient,
    delegate: String,
    args: Value,
}

#[async_trait]
impl RecordHandle for MemoryRecordHandle {
    async fn relation(&self, field: &str, args: Value) -> Result<Value, ClientError> {
        let table = self.client.table(&self.delegate)?;
        let descriptor = table
            .model
            .field(field)
            .filter(|f| f.is_relation())
            .ok_or_else(|| {
                ClientError::validation(format!(
                    "`{field}` is not a relation of model `{}`",
                    table.model.name
                ))
            })?;

        let Some((_, parent)) = self.client.find_entry(table, self.args.get("where"))? else {
            return Ok(Value::Null);
        };
        self.client.related(table, &parent.data, descriptor, &args)
    }
}

fn is_wanted(value: &Value) -> bool {
    !matches!(value, Value::Bool(false) | Value::Null)
}

fn now() -> Result<Value, ClientError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map(Value::String)
        .map_err(|e| ClientError::internal(format!("failed to format timestamp: {e}")))
}

fn cuid() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(24);
    format!("c{id}")
}

fn default_value(table: &Table, field: &FieldDescriptor) -> Result<Option<Value>, ClientError> {
    if field.is_updated_at {
        return now().map(Some);
    }
    Ok(match field.default_function() {
        Some("autoincrement") => Some(json!(table.autoincrement.fetch_add(1, Ordering::SeqCst) + 1)),
        Some("uuid") => Some(json!(Uuid::new_v4().to_string())),
        Some("cuid") => Some(json!(cuid())),
        Some("now") => Some(now()?),
        Some(_) => None,
        None => field.default.clone().filter(|d| !d.is_object()),
    })
}

/// Finds `name` in a unique input, looking one level into compound key objects.
fn lookup_key_part<'a>(input: &'a Value, name: &str) -> Option<&'a Value> {
    input.get(name).or_else(|| {
        input
            .as_object()?
            .values()
            .filter_map(Value::as_object)
            .find_map(|inner| inner.get(name))
    })
}

fn apply_update_op(
    field: &FieldDescriptor,
    current: &Value,
    ops: &Map<String, Value>,
) -> Result<Value, ClientError> {
    let mut entries = ops.iter();
    let (Some((op, operand)), None) = (entries.next(), entries.next()) else {
        return Err(ClientError::validation(format!(
            "Update of `{}` must use exactly one operation",
            field.name
        )));
    };

    match op.as_str() {
        "set" => Ok(operand.clone()),
        "push" => {
            let mut list = current.as_array().cloned().unwrap_or_default();
            match operand {
                Value::Array(items) => list.extend(items.iter().cloned()),
                item => list.push(item.clone()),
            }
            Ok(Value::Array(list))
        }
        "increment" | "decrement" | "multiply" | "divide" => arith(&field.name, op, current, operand),
        other => Err(ClientError::validation(format!(
            "Unknown update operation `{other}` on `{}`",
            field.name
        ))),
    }
}

fn arith(name: &str, op: &str, current: &Value, operand: &Value) -> Result<Value, ClientError> {
    let not_numeric = || ClientError::validation(format!("Field `{name}` is not numeric"));

    if let (Some(a), Some(b)) = (current.as_i64(), operand.as_i64()) {
        let result = match op {
            "increment" => a.checked_add(b),
            "decrement" => a.checked_sub(b),
            "multiply" => a.checked_mul(b),
            _ => a.checked_div(b),
        };
        return result
            .map(|n| json!(n))
            .ok_or_else(|| ClientError::validation(format!("Arithmetic on `{name}` overflows")));
    }

    let a = current.as_f64().ok_or_else(not_numeric)?;
    let b = operand.as_f64().ok_or_else(not_numeric)?;
    let result = match op {
        "increment" => a + b,
        "decrement" => a - b,
        "multiply" => a * b,
        _ => a / b,
    };
    Ok(json!(result))
}

fn check_unique(table: &Table, record: &Record, replacing: Option<&RowKey>) -> Result<(), ClientError> {
    let model = &table.model;
    let mut groups: Vec<Vec<&str>> = model
        .fields
        .iter()
        .filter(|f| (f.is_id || f.is_unique) && !f.is_relation())
        .map(|f| vec![f.name.as_str()])
        .collect();
    if let Some(pk) = &model.primary_key {
        groups.push(pk.fields.iter().map(String::as_str).collect());
    }

    for (key, row) in table.entries() {
        if replacing == Some(&key) {
            continue;
        }
        for group in &groups {
            let clash = group.iter().all(|name| {
                let mine = record.get(*name).unwrap_or(&Value::Null);
                !mine.is_null()
                    && row
                        .data
                        .get(*name)
                        .is_some_and(|theirs| query::values_equal(mine, theirs))
            });
            if clash {
                return Err(ClientError::unique_constraint(group.join(", ")));
            }
        }
    }
    Ok(())
}
