//! In-memory store keyed by resource name. Backs the test suite and the
//! demo consumer; not intended for production data.

use super::{DataStore, ListPage, Row, StoreError};
use crate::payload::{FieldValue, FormattedPayload, RecordId, RelationDirective};
use crate::request::{ListQuery, SortDirection};
use crate::schema::{FieldKind, IdType, Multiplicity, Registry, Resource, ScalarType};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

#[derive(Default)]
struct Table {
    rows: Vec<Value>,
    next_int_id: i64,
}

pub struct MemoryStore {
    registry: Arc<Registry>,
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new(registry: Arc<Registry>) -> Self {
        MemoryStore {
            registry,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Seed rows for a resource, advancing the integer id counter past any
    /// seeded identifiers.
    pub fn seed(&self, resource: &str, rows: Vec<Value>) {
        let mut tables = self.tables.write().expect("memory store lock");
        let table = tables.entry(resource.to_lowercase()).or_default();
        if let Some(r) = self.registry.resource(resource) {
            let id_field = r.id_field.clone();
            for row in &rows {
                if let Some(n) = row.get(&id_field).and_then(Value::as_i64) {
                    table.next_int_id = table.next_int_id.max(n);
                }
            }
        }
        table.rows.extend(rows);
    }

    fn key(resource: &Resource) -> String {
        resource.name.to_lowercase()
    }

    fn check_unique(
        resource: &Resource,
        rows: &[Value],
        candidate: &Value,
        skip_id: Option<&Value>,
    ) -> Result<(), StoreError> {
        for field in &resource.fields {
            if !field.unique {
                continue;
            }
            let Some(v) = candidate.get(&field.name) else {
                continue;
            };
            if v.is_null() {
                continue;
            }
            let clash = rows.iter().any(|row| {
                if let Some(skip) = skip_id {
                    if row.get(&resource.id_field) == Some(skip) {
                        return false;
                    }
                }
                row.get(&field.name) == Some(v)
            });
            if clash {
                return Err(StoreError::Constraint(format!(
                    "{} must be unique",
                    field.name
                )));
            }
        }
        Ok(())
    }

    /// Write payload values into a row object. To-one relations land on the
    /// FK column; to-many directives are applied to the related table.
    fn apply_payload(
        &self,
        tables: &mut HashMap<String, Table>,
        resource: &Resource,
        row_id: &Value,
        payload: &FormattedPayload,
        target_key: &str,
        row_index: usize,
    ) -> Result<(), StoreError> {
        for (name, value) in payload.iter() {
            let Some(field) = resource.field(name) else {
                continue;
            };
            match (&field.kind, value) {
                (FieldKind::Relation(spec), FieldValue::Relation(directive)) => {
                    match spec.multiplicity {
                        Multiplicity::ToOne => {
                            let fk = directive
                                .ids()
                                .first()
                                .map(RecordId::to_json)
                                .unwrap_or(Value::Null);
                            set_cell(tables, target_key, row_index, &spec.fk_column, fk);
                        }
                        Multiplicity::ToMany => {
                            self.apply_to_many(tables, spec, row_id, directive)?;
                        }
                    }
                }
                _ => {
                    set_cell(tables, target_key, row_index, name, value.to_json());
                }
            }
        }
        Ok(())
    }

    fn apply_to_many(
        &self,
        tables: &mut HashMap<String, Table>,
        spec: &crate::schema::RelationSpec,
        row_id: &Value,
        directive: &RelationDirective,
    ) -> Result<(), StoreError> {
        let related = self
            .registry
            .resource(&spec.resource)
            .ok_or_else(|| StoreError::Constraint(format!("unknown resource {}", spec.resource)))?;
        let related_key = Self::key(related);
        let linked: Vec<Value> = directive.ids().iter().map(RecordId::to_json).collect();
        let table = tables.entry(related_key).or_default();
        for row in &mut table.rows {
            let Some(obj) = row.as_object_mut() else {
                continue;
            };
            let their_id = obj.get(&related.id_field).cloned().unwrap_or(Value::Null);
            if linked.contains(&their_id) {
                obj.insert(spec.fk_column.clone(), row_id.clone());
            } else if matches!(directive, RelationDirective::Replace(_))
                && obj.get(&spec.fk_column) == Some(row_id)
            {
                obj.insert(spec.fk_column.clone(), Value::Null);
            }
        }
        Ok(())
    }

    fn new_row(&self, resource: &Resource, table: &mut Table) -> Result<Value, StoreError> {
        let id = match resource.id_type() {
            IdType::Int => {
                table.next_int_id += 1;
                Value::Number(table.next_int_id.into())
            }
            IdType::Uuid => Value::String(Uuid::new_v4().to_string()),
            IdType::Text => {
                return Err(StoreError::Constraint(format!(
                    "{} requires an explicit identifier",
                    resource.name
                )))
            }
        };
        let mut obj = serde_json::Map::new();
        obj.insert(resource.id_field.clone(), id);
        for field in resource.writable_fields() {
            match &field.kind {
                FieldKind::Relation(spec) => {
                    if spec.multiplicity == Multiplicity::ToOne {
                        obj.insert(spec.fk_column.clone(), Value::Null);
                    }
                }
                _ => {
                    obj.insert(field.name.clone(), Value::Null);
                }
            }
        }
        Ok(Value::Object(obj))
    }
}

fn set_cell(
    tables: &mut HashMap<String, Table>,
    key: &str,
    index: usize,
    column: &str,
    value: Value,
) {
    if let Some(obj) = tables
        .get_mut(key)
        .and_then(|t| t.rows.get_mut(index))
        .and_then(Value::as_object_mut)
    {
        obj.insert(column.to_string(), value);
    }
}

fn matches_search(resource: &Resource, row: &Value, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    resource.fields.iter().any(|f| {
        matches!(f.kind, FieldKind::Scalar(ScalarType::Text))
            && row
                .get(&f.name)
                .and_then(Value::as_str)
                .map(|s| s.to_lowercase().contains(&needle))
                .unwrap_or(false)
    })
}

fn compare_cells(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn find(&self, resource: &Resource, query: &ListQuery) -> Result<ListPage, StoreError> {
        let tables = self.tables.read().expect("memory store lock");
        let empty = Vec::new();
        let rows = tables
            .get(&Self::key(resource))
            .map(|t| &t.rows)
            .unwrap_or(&empty);

        let mut filtered: Vec<Value> = rows
            .iter()
            .filter(|row| {
                query
                    .search
                    .as_deref()
                    .map(|needle| matches_search(resource, row, needle))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        let sort_key = query.sort_column.as_deref().unwrap_or(&resource.id_field);
        filtered.sort_by(|a, b| {
            let ord = compare_cells(
                a.get(sort_key).unwrap_or(&Value::Null),
                b.get(sort_key).unwrap_or(&Value::Null),
            );
            match query.sort_direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });

        let total = filtered.len() as u64;
        let rows = filtered
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.items_per_page as usize)
            .collect();
        Ok(ListPage { rows, total })
    }

    async fn find_by_id(
        &self,
        resource: &Resource,
        id: &RecordId,
    ) -> Result<Option<Row>, StoreError> {
        let tables = self.tables.read().expect("memory store lock");
        let id = id.to_json();
        Ok(tables.get(&Self::key(resource)).and_then(|t| {
            t.rows
                .iter()
                .find(|row| row.get(&resource.id_field) == Some(&id))
                .cloned()
        }))
    }

    async fn insert(
        &self,
        resource: &Resource,
        payload: &FormattedPayload,
    ) -> Result<Row, StoreError> {
        let mut tables = self.tables.write().expect("memory store lock");
        let key = Self::key(resource);
        let row = {
            let table = tables.entry(key.clone()).or_default();
            let row = self.new_row(resource, table)?;
            table.rows.push(row.clone());
            row
        };
        let row_id = row
            .get(&resource.id_field)
            .cloned()
            .unwrap_or(Value::Null);
        let index = tables.get(&key).map(|t| t.rows.len() - 1).unwrap_or(0);
        self.apply_payload(&mut tables, resource, &row_id, payload, &key, index)?;

        let updated = tables.get(&key).and_then(|t| t.rows.last()).cloned();
        let updated = updated.ok_or_else(|| StoreError::Unavailable("row vanished".into()))?;
        let others: Vec<Value> = tables
            .get(&key)
            .map(|t| t.rows[..t.rows.len() - 1].to_vec())
            .unwrap_or_default();
        Self::check_unique(resource, &others, &updated, None).map_err(|e| {
            // Roll the failed insert back before reporting the conflict.
            if let Some(t) = tables.get_mut(&key) {
                t.rows.pop();
            }
            e
        })?;
        Ok(updated)
    }

    async fn update(
        &self,
        resource: &Resource,
        id: &RecordId,
        payload: &FormattedPayload,
    ) -> Result<Option<Row>, StoreError> {
        let mut tables = self.tables.write().expect("memory store lock");
        let key = Self::key(resource);
        let id_json = id.to_json();
        let Some(index) = tables.get(&key).and_then(|t| {
            t.rows
                .iter()
                .position(|row| row.get(&resource.id_field) == Some(&id_json))
        }) else {
            return Ok(None);
        };
        let before = tables
            .get(&key)
            .and_then(|t| t.rows.get(index))
            .cloned()
            .unwrap_or(Value::Null);
        self.apply_payload(&mut tables, resource, &id_json, payload, &key, index)?;
        let updated = tables
            .get(&key)
            .and_then(|t| t.rows.get(index))
            .cloned()
            .unwrap_or(Value::Null);
        let rows: Vec<Value> = tables.get(&key).map(|t| t.rows.clone()).unwrap_or_default();
        if let Err(e) = Self::check_unique(resource, &rows, &updated, Some(&id_json)) {
            if let Some(cell) = tables.get_mut(&key).and_then(|t| t.rows.get_mut(index)) {
                *cell = before;
            }
            return Err(e);
        }
        Ok(Some(updated))
    }

    async fn remove(&self, resource: &Resource, id: &RecordId) -> Result<Row, StoreError> {
        let mut tables = self.tables.write().expect("memory store lock");
        let key = Self::key(resource);
        let id_json = id.to_json();
        let table = tables.get_mut(&key).ok_or(StoreError::NotFound)?;
        let index = table
            .rows
            .iter()
            .position(|row| row.get(&resource.id_field) == Some(&id_json))
            .ok_or(StoreError::NotFound)?;
        Ok(table.rows.remove(index))
    }

    async fn remove_many(
        &self,
        resource: &Resource,
        ids: &[RecordId],
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().expect("memory store lock");
        let key = Self::key(resource);
        let targets: Vec<Value> = ids.iter().map(RecordId::to_json).collect();
        let Some(table) = tables.get_mut(&key) else {
            return Ok(0);
        };
        let before = table.rows.len();
        table.rows.retain(|row| {
            row.get(&resource.id_field)
                .map(|id| !targets.contains(id))
                .unwrap_or(true)
        });
        Ok((before - table.rows.len()) as u64)
    }
}
