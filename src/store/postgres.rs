//! PostgreSQL adapter. Builds parameterized SQL from the resolved resource
//! model; every parameter is bound as text and cast in SQL to the column's
//! declared type, so one bind path covers all scalar kinds.

use super::{DataStore, ListPage, Row, StoreError};
use crate::payload::{FieldValue, FormattedPayload, RecordId, RelationDirective};
use crate::request::{ListQuery, SortDirection};
use crate::schema::{Field, FieldKind, IdType, Multiplicity, Registry, Resource, ScalarType};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row as _};
use std::sync::Arc;

pub struct PgStore {
    pool: PgPool,
    registry: Arc<Registry>,
}

impl PgStore {
    pub fn new(pool: PgPool, registry: Arc<Registry>) -> Self {
        PgStore { pool, registry }
    }

    pub async fn connect(url: &str, registry: Arc<Registry>) -> Result<Self, StoreError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(map_sqlx)?;
        Ok(PgStore::new(pool, registry))
    }
}

/// Quote identifier (safe: only from the resolved schema).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn pg_type(ty: ScalarType) -> &'static str {
    match ty {
        ScalarType::Int => "int4",
        ScalarType::BigInt => "int8",
        ScalarType::Float => "float8",
        ScalarType::Boolean => "boolean",
        ScalarType::Text => "text",
        ScalarType::DateTime => "timestamptz",
        ScalarType::Uuid => "uuid",
        ScalarType::Json => "jsonb",
    }
}

fn id_pg_type(id_type: IdType) -> &'static str {
    match id_type {
        IdType::Int => "int8",
        IdType::Uuid => "uuid",
        IdType::Text => "text",
    }
}

/// Text rendering bound for a parameter; SQL casts restore the type.
fn bind_text(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Null => None,
        FieldValue::Bool(b) => Some(b.to_string()),
        FieldValue::Int(n) => Some(n.to_string()),
        FieldValue::Float(f) => Some(f.to_string()),
        FieldValue::Text(s) => Some(s.clone()),
        FieldValue::DateTime(d) => Some(d.to_rfc3339()),
        FieldValue::Uuid(u) => Some(u.to_string()),
        FieldValue::Json(v) => Some(v.to_string()),
        FieldValue::FileRef(h) => Some(h.clone()),
        // Relation directives never reach the bind layer; the builder
        // resolves them to FK writes or related-table updates first.
        FieldValue::Relation(_) => None,
    }
}

fn bind_id(id: &RecordId) -> String {
    id.to_string()
}

struct QueryBuf {
    sql: String,
    params: Vec<Option<String>>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Option<String>) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// One writable column: its SQL name, cast type, and source field.
struct ColumnRef<'a> {
    column: String,
    cast: &'static str,
    field: &'a Field,
}

/// Selectable columns of a resource: scalars and file handles by field
/// name, to-one relations by FK column. To-many relations have no local
/// column.
fn columns_of<'a>(registry: &Registry, resource: &'a Resource) -> Vec<ColumnRef<'a>> {
    let mut out = Vec::with_capacity(resource.fields.len());
    for field in &resource.fields {
        match &field.kind {
            FieldKind::Scalar(ty) => out.push(ColumnRef {
                column: field.name.clone(),
                cast: pg_type(*ty),
                field,
            }),
            FieldKind::File => out.push(ColumnRef {
                column: field.name.clone(),
                cast: "text",
                field,
            }),
            FieldKind::Relation(spec) => {
                if spec.multiplicity == Multiplicity::ToOne {
                    let cast = registry
                        .resource(&spec.resource)
                        .map(|r| id_pg_type(r.id_type()))
                        .unwrap_or("text");
                    out.push(ColumnRef {
                        column: spec.fk_column.clone(),
                        cast,
                        field,
                    });
                }
            }
        }
    }
    out
}

fn select_list(columns: &[ColumnRef<'_>]) -> String {
    columns
        .iter()
        .map(|c| quoted(&c.column))
        .collect::<Vec<_>>()
        .join(", ")
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.to_string()).unwrap_or_default();
            // Class 22 = data exception, 23 = integrity constraint violation.
            if code.starts_with("22") || code.starts_with("23") {
                StoreError::Constraint(db.message().to_string())
            } else {
                StoreError::Unavailable(db.message().to_string())
            }
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

fn cell_to_json(row: &PgRow, name: &str, ty: ScalarType) -> Value {
    match ty {
        ScalarType::Int | ScalarType::BigInt => {
            if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
                return Value::Number(n.into());
            }
            if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
                return Value::Number(n.into());
            }
            if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
                return Value::Number(n.into());
            }
            Value::Null
        }
        ScalarType::Float => {
            if let Ok(Some(f)) = row.try_get::<Option<f64>, _>(name) {
                return serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .unwrap_or(Value::Null);
            }
            if let Ok(Some(f)) = row.try_get::<Option<f32>, _>(name) {
                return serde_json::Number::from_f64(f64::from(f))
                    .map(Value::Number)
                    .unwrap_or(Value::Null);
            }
            Value::Null
        }
        ScalarType::Boolean => row
            .try_get::<Option<bool>, _>(name)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        ScalarType::Text => row
            .try_get::<Option<String>, _>(name)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
        ScalarType::DateTime => {
            if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
                return Value::String(d.to_rfc3339());
            }
            if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
                return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
            }
            Value::Null
        }
        ScalarType::Uuid => row
            .try_get::<Option<uuid::Uuid>, _>(name)
            .ok()
            .flatten()
            .map(|u| Value::String(u.to_string()))
            .unwrap_or(Value::Null),
        ScalarType::Json => row
            .try_get::<Option<Value>, _>(name)
            .ok()
            .flatten()
            .unwrap_or(Value::Null),
    }
}

/// FK columns carry the referenced identifier type.
fn fk_cell_to_json(row: &PgRow, name: &str) -> Value {
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    Value::Null
}

fn row_to_json(row: &PgRow, columns: &[ColumnRef<'_>]) -> Value {
    let mut map = serde_json::Map::new();
    for col in columns {
        let v = match &col.field.kind {
            FieldKind::Scalar(ty) => cell_to_json(row, &col.column, *ty),
            FieldKind::File => cell_to_json(row, &col.column, ScalarType::Text),
            FieldKind::Relation(_) => fk_cell_to_json(row, &col.column),
        };
        map.insert(col.column.clone(), v);
    }
    Value::Object(map)
}

impl PgStore {
    fn table(&self, resource: &Resource) -> String {
        quoted(&resource.table)
    }

    /// Column SET/VALUES pairs from the payload; to-many directives are
    /// returned separately for post-write application.
    fn split_payload<'p>(
        &self,
        resource: &'p Resource,
        payload: &'p FormattedPayload,
    ) -> (
        Vec<(String, &'static str, Option<String>)>,
        Vec<(&'p crate::schema::RelationSpec, &'p RelationDirective)>,
    ) {
        let mut cells = Vec::new();
        let mut to_many = Vec::new();
        for (name, value) in payload.iter() {
            let Some(field) = resource.field(name) else {
                continue;
            };
            match (&field.kind, value) {
                (FieldKind::Relation(spec), FieldValue::Relation(directive)) => {
                    match spec.multiplicity {
                        Multiplicity::ToOne => {
                            let cast = self
                                .registry
                                .resource(&spec.resource)
                                .map(|r| id_pg_type(r.id_type()))
                                .unwrap_or("text");
                            let bound = directive.ids().first().map(bind_id);
                            cells.push((spec.fk_column.clone(), cast, bound));
                        }
                        Multiplicity::ToMany => to_many.push((spec, directive)),
                    }
                }
                (FieldKind::Scalar(ty), v) => {
                    cells.push((field.name.clone(), pg_type(*ty), bind_text(v)));
                }
                (FieldKind::File, v) => {
                    cells.push((field.name.clone(), "text", bind_text(v)));
                }
                (FieldKind::Relation(_), _) => {
                    // Non-directive value on a relation field: ignore rather
                    // than corrupt the FK column.
                }
            }
        }
        (cells, to_many)
    }

    async fn apply_to_many(
        &self,
        tx: &mut sqlx::PgConnection,
        resource: &Resource,
        row_id: &RecordId,
        spec: &crate::schema::RelationSpec,
        directive: &RelationDirective,
    ) -> Result<(), StoreError> {
        let related = self.registry.resource(&spec.resource).ok_or_else(|| {
            StoreError::Constraint(format!("unknown resource {}", spec.resource))
        })?;
        let table = quoted(&related.table);
        let fk = quoted(&spec.fk_column);
        let their_id = quoted(&related.id_field);
        let id_cast = id_pg_type(resource.id_type());
        let their_cast = id_pg_type(related.id_type());

        if let RelationDirective::Replace(ids) = directive {
            let mut q = QueryBuf::new();
            let id_param = q.push_param(Some(bind_id(row_id)));
            if ids.is_empty() {
                q.sql = format!(
                    "UPDATE {} SET {} = NULL WHERE {} = ${}::{}",
                    table, fk, fk, id_param, id_cast
                );
            } else {
                let keep: Vec<String> = ids
                    .iter()
                    .map(|id| {
                        let n = q.push_param(Some(bind_id(id)));
                        format!("${}::{}", n, their_cast)
                    })
                    .collect();
                q.sql = format!(
                    "UPDATE {} SET {} = NULL WHERE {} = ${}::{} AND {} NOT IN ({})",
                    table,
                    fk,
                    fk,
                    id_param,
                    id_cast,
                    their_id,
                    keep.join(", ")
                );
            }
            run(tx, &q).await?;
        }

        let ids = directive.ids();
        if !ids.is_empty() {
            let mut q = QueryBuf::new();
            let id_param = q.push_param(Some(bind_id(row_id)));
            let targets: Vec<String> = ids
                .iter()
                .map(|id| {
                    let n = q.push_param(Some(bind_id(id)));
                    format!("${}::{}", n, their_cast)
                })
                .collect();
            q.sql = format!(
                "UPDATE {} SET {} = ${}::{} WHERE {} IN ({})",
                table,
                fk,
                id_param,
                id_cast,
                their_id,
                targets.join(", ")
            );
            run(tx, &q).await?;
        }
        Ok(())
    }
}

async fn run(tx: &mut sqlx::PgConnection, q: &QueryBuf) -> Result<u64, StoreError> {
    tracing::debug!(sql = %q.sql, "query (tx)");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.as_deref());
    }
    let result = query.execute(&mut *tx).await.map_err(map_sqlx)?;
    Ok(result.rows_affected())
}

async fn fetch_optional_tx(
    tx: &mut sqlx::PgConnection,
    q: &QueryBuf,
) -> Result<Option<PgRow>, StoreError> {
    tracing::debug!(sql = %q.sql, "query (tx)");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.as_deref());
    }
    query.fetch_optional(&mut *tx).await.map_err(map_sqlx)
}

#[async_trait]
impl DataStore for PgStore {
    async fn find(&self, resource: &Resource, query: &ListQuery) -> Result<ListPage, StoreError> {
        let columns = columns_of(&self.registry, resource);
        let table = self.table(resource);

        let mut q = QueryBuf::new();
        let mut where_clause = String::new();
        if let Some(search) = &query.search {
            let text_cols: Vec<&ColumnRef<'_>> = columns
                .iter()
                .filter(|c| matches!(c.field.kind, FieldKind::Scalar(ScalarType::Text)))
                .collect();
            if !text_cols.is_empty() {
                let n = q.push_param(Some(format!("%{}%", search)));
                let parts: Vec<String> = text_cols
                    .iter()
                    .map(|c| format!("{} ILIKE ${}", quoted(&c.column), n))
                    .collect();
                where_clause = format!(" WHERE ({})", parts.join(" OR "));
            }
        }

        let sort_field = query.sort_column.as_deref().unwrap_or(&resource.id_field);
        let sort_col = resource
            .field(sort_field)
            .and_then(|f| match &f.kind {
                FieldKind::Relation(spec) if spec.multiplicity == Multiplicity::ToOne => {
                    Some(spec.fk_column.clone())
                }
                FieldKind::Relation(_) => None,
                _ => Some(f.name.clone()),
            })
            .unwrap_or_else(|| resource.id_field.clone());
        let direction = match query.sort_direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };

        let count_sql = format!("SELECT COUNT(*) FROM {}{}", table, where_clause);
        tracing::debug!(sql = %count_sql, "query");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for p in &q.params {
            count_query = count_query.bind(p.as_deref());
        }
        let total = count_query
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)? as u64;

        q.sql = format!(
            "SELECT {} FROM {}{} ORDER BY {} {} LIMIT {} OFFSET {}",
            select_list(&columns),
            table,
            where_clause,
            quoted(&sort_col),
            direction,
            query.items_per_page,
            query.offset()
        );
        tracing::debug!(sql = %q.sql, "query");
        let mut list_query = sqlx::query(&q.sql);
        for p in &q.params {
            list_query = list_query.bind(p.as_deref());
        }
        let rows = list_query
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(ListPage {
            rows: rows.iter().map(|r| row_to_json(r, &columns)).collect(),
            total,
        })
    }

    async fn find_by_id(
        &self,
        resource: &Resource,
        id: &RecordId,
    ) -> Result<Option<Row>, StoreError> {
        let columns = columns_of(&self.registry, resource);
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = $1::{}",
            select_list(&columns),
            self.table(resource),
            quoted(&resource.id_field),
            id_pg_type(resource.id_type())
        );
        tracing::debug!(sql = %sql, "query");
        let row = sqlx::query(&sql)
            .bind(bind_id(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(|r| row_to_json(&r, &columns)))
    }

    async fn insert(
        &self,
        resource: &Resource,
        payload: &FormattedPayload,
    ) -> Result<Row, StoreError> {
        let columns = columns_of(&self.registry, resource);
        let (cells, to_many) = self.split_payload(resource, payload);

        let mut q = QueryBuf::new();
        let mut names = Vec::with_capacity(cells.len());
        let mut placeholders = Vec::with_capacity(cells.len());
        for (column, cast, bound) in cells {
            let n = q.push_param(bound);
            names.push(quoted(&column));
            placeholders.push(format!("${}::{}", n, cast));
        }
        q.sql = if names.is_empty() {
            format!(
                "INSERT INTO {} DEFAULT VALUES RETURNING {}",
                self.table(resource),
                select_list(&columns)
            )
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
                self.table(resource),
                names.join(", "),
                placeholders.join(", "),
                select_list(&columns)
            )
        };

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let row = fetch_optional_tx(&mut tx, &q)
            .await?
            .ok_or(StoreError::NotFound)?;
        let row_json = row_to_json(&row, &columns);

        if !to_many.is_empty() {
            let new_id = row_json
                .get(&resource.id_field)
                .and_then(|v| crate::request::record_id_from_json(v, resource.id_type()))
                .ok_or_else(|| {
                    StoreError::Unavailable("inserted row missing identifier".into())
                })?;
            for (spec, directive) in to_many {
                self.apply_to_many(&mut tx, resource, &new_id, spec, directive)
                    .await?;
            }
        }
        tx.commit().await.map_err(map_sqlx)?;
        Ok(row_json)
    }

    async fn update(
        &self,
        resource: &Resource,
        id: &RecordId,
        payload: &FormattedPayload,
    ) -> Result<Option<Row>, StoreError> {
        let columns = columns_of(&self.registry, resource);
        let (cells, to_many) = self.split_payload(resource, payload);

        let mut q = QueryBuf::new();
        let mut sets = Vec::with_capacity(cells.len());
        for (column, cast, bound) in cells {
            let n = q.push_param(bound);
            sets.push(format!("{} = ${}::{}", quoted(&column), n, cast));
        }
        let id_param = q.push_param(Some(bind_id(id)));
        let id_cond = format!(
            "{} = ${}::{}",
            quoted(&resource.id_field),
            id_param,
            id_pg_type(resource.id_type())
        );
        q.sql = if sets.is_empty() {
            // Nothing scalar to set; fetch the row so to-many rewrites still
            // confirm the target exists.
            format!(
                "SELECT {} FROM {} WHERE {}",
                select_list(&columns),
                self.table(resource),
                id_cond
            )
        } else {
            format!(
                "UPDATE {} SET {} WHERE {} RETURNING {}",
                self.table(resource),
                sets.join(", "),
                id_cond,
                select_list(&columns)
            )
        };

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let Some(row) = fetch_optional_tx(&mut tx, &q).await? else {
            return Ok(None);
        };
        for (spec, directive) in to_many {
            self.apply_to_many(&mut tx, resource, id, spec, directive)
                .await?;
        }
        tx.commit().await.map_err(map_sqlx)?;
        Ok(Some(row_to_json(&row, &columns)))
    }

    async fn remove(&self, resource: &Resource, id: &RecordId) -> Result<Row, StoreError> {
        let columns = columns_of(&self.registry, resource);
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1::{} RETURNING {}",
            self.table(resource),
            quoted(&resource.id_field),
            id_pg_type(resource.id_type()),
            select_list(&columns)
        );
        tracing::debug!(sql = %sql, "query");
        let row = sqlx::query(&sql)
            .bind(bind_id(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(|r| row_to_json(&r, &columns))
            .ok_or(StoreError::NotFound)
    }

    async fn remove_many(
        &self,
        resource: &Resource,
        ids: &[RecordId],
    ) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let cast = id_pg_type(resource.id_type());
        let mut q = QueryBuf::new();
        let placeholders: Vec<String> = ids
            .iter()
            .map(|id| {
                let n = q.push_param(Some(bind_id(id)));
                format!("${}::{}", n, cast)
            })
            .collect();
        q.sql = format!(
            "DELETE FROM {} WHERE {} IN ({})",
            self.table(resource),
            quoted(&resource.id_field),
            placeholders.join(", ")
        );
        tracing::debug!(sql = %q.sql, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.as_deref());
        }
        let result = query.execute(&self.pool).await.map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }
}
