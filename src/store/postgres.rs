//! Postgres-backed [`RecordStore`].
//!
//! Tables live in the `grc` schema and are created from [`Schema::ddl`].
//! Rows are read back through `to_jsonb(t)` so the store stays generic over
//! every declared table. Foreign keys carry their own `ON DELETE` rules;
//! reference-list columns are unlinked by hand inside the delete transaction.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row as _};
use tracing::{debug, info, warn};

use crate::error::{FieldErrors, GrcError, Result};
use crate::ports::{ListQuery, RecordStore, Row};
use crate::schema::{Column, ColumnType, EntityKind, OnDelete, Schema, TableDef};

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub connection_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(database_url: impl Into<String>, max_connections: u32) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections,
            connection_timeout: Duration::from_secs(30),
        }
    }
}

pub struct PgRecordStore {
    pool: PgPool,
    schema: Arc<Schema>,
}

impl PgRecordStore {
    pub fn new(pool: PgPool, schema: Arc<Schema>) -> Self {
        Self { pool, schema }
    }

    pub async fn connect(config: &DatabaseConfig, schema: Arc<Schema>) -> Result<Self> {
        info!(
            "Connecting to database: {}",
            mask_database_url(&config.database_url)
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connection_timeout)
            .connect(&config.database_url)
            .await
            .map_err(|e| {
                warn!("Failed to connect to database: {}", e);
                e
            })
            .context("Failed to connect to database")?;
        info!("Database connection pool created successfully");
        Ok(Self::new(pool, schema))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `grc` schema and every declared table if missing.
    pub async fn migrate(&self) -> Result<()> {
        info!("Applying GRC schema DDL");
        sqlx::raw_sql(&self.schema.ddl())
            .execute(&self.pool)
            .await
            .context("Failed to apply schema DDL")?;
        Ok(())
    }

    /// Every (kind, id) removed when `id` is deleted, root first.
    async fn cascade_closure(
        &self,
        tx: &mut sqlx::Transaction<'_, Postgres>,
        kind: EntityKind,
        id: i64,
    ) -> Result<Vec<(EntityKind, i64)>> {
        let mut doomed = vec![(kind, id)];
        let mut cursor = 0;
        while cursor < doomed.len() {
            let (parent, parent_id) = doomed[cursor];
            cursor += 1;
            for reference in self.schema.references_to(parent) {
                let cascades = matches!(
                    reference.column.ty,
                    ColumnType::Ref {
                        on_delete: OnDelete::Cascade,
                        ..
                    }
                );
                if !cascades {
                    continue;
                }
                let sql = format!(
                    "SELECT id FROM grc.{} WHERE {} = $1",
                    reference.child.table, reference.column.name
                );
                let ids: Vec<i64> = sqlx::query_scalar(&sql)
                    .bind(parent_id)
                    .fetch_all(&mut **tx)
                    .await
                    .map_err(|e| db_error(e, "Failed to collect cascade"))?;
                for child_id in ids {
                    let entry = (reference.child.kind, child_id);
                    if !doomed.contains(&entry) {
                        doomed.push(entry);
                    }
                }
            }
        }
        Ok(doomed)
    }
}

/// Mask the password in a database URL for logging
fn mask_database_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return "***".to_string();
    };
    match rest.split_once('@') {
        Some((credentials, host)) => {
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{scheme}://{user}:***@{host}")
        }
        None => url.to_string(),
    }
}

fn db_error(e: sqlx::Error, context: &'static str) -> GrcError {
    if let sqlx::Error::Database(db) = &e {
        match db.code().as_deref() {
            Some("23505") => return GrcError::Conflict(db.message().to_string()),
            Some("23503") => {
                let mut errors = FieldErrors::default();
                errors.add(FieldErrors::NON_FIELD, db.message());
                return GrcError::Validation(errors);
            }
            _ => {}
        }
    }
    GrcError::Internal(anyhow::Error::new(e).context(context))
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, column: &Column, value: &Value) {
    match column.ty {
        ColumnType::Text { .. } | ColumnType::Choice { .. } => {
            qb.push_bind(value.as_str().map(str::to_owned));
        }
        ColumnType::Bool => {
            qb.push_bind(value.as_bool());
        }
        ColumnType::Date => {
            qb.push_bind(value.as_str().map(str::to_owned));
            qb.push("::date");
        }
        ColumnType::Ref { .. } => {
            qb.push_bind(value.as_i64());
        }
        ColumnType::RefList { .. } => {
            let ids: Vec<i64> = value
                .as_array()
                .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
                .unwrap_or_default();
            qb.push_bind(ids);
        }
        ColumnType::Json => {
            qb.push_bind((!value.is_null()).then(|| value.clone()));
        }
    }
}

/// LIMIT/OFFSET operands are BIGINT; larger counts saturate.
fn to_sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn decode_row(row: PgRow) -> Result<Row> {
    let value: Value = row.try_get("row").context("Failed to decode row")?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(anyhow::anyhow!("expected JSON object row, got {other}").into()),
    }
}

fn column_values<'a>(def: &'a TableDef, fields: &'a Row) -> impl Iterator<Item = (&'a Column, &'a Value)> {
    def.columns
        .iter()
        .map(move |c| (c, fields.get(c.name).unwrap_or(&Value::Null)))
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert(&self, kind: EntityKind, fields: Row) -> Result<Row> {
        let def = self.schema.table(kind)?;
        let names: Vec<&str> = def.columns.iter().map(|c| c.name).collect();

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO grc.{} AS t ({}) VALUES (",
            def.table,
            names.join(", ")
        ));
        for (position, (column, value)) in column_values(def, &fields).enumerate() {
            if position > 0 {
                qb.push(", ");
            }
            push_value(&mut qb, column, value);
        }
        qb.push(") RETURNING to_jsonb(t) AS row");

        let row = qb
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error(e, "Failed to insert row"))?;
        decode_row(row)
    }

    async fn fetch(&self, kind: EntityKind, id: i64) -> Result<Option<Row>> {
        let def = self.schema.table(kind)?;
        let sql = format!("SELECT to_jsonb(t) AS row FROM grc.{} t WHERE t.id = $1", def.table);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error(e, "Failed to fetch row"))?;
        row.map(decode_row).transpose()
    }

    async fn list(&self, kind: EntityKind, query: &ListQuery) -> Result<Vec<Row>> {
        let def = self.schema.table(kind)?;
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT to_jsonb(t) AS row FROM grc.{} t WHERE TRUE",
            def.table
        ));

        for (field, wanted) in &query.filters {
            let column = def
                .column(field)
                .ok_or_else(|| GrcError::invalid(field, "Unknown filter field."))?;
            match column.ty {
                ColumnType::RefList { .. } => {
                    qb.push(" AND ");
                    qb.push_bind(wanted.as_i64());
                    qb.push(format!(" = ANY(t.{})", column.name));
                }
                _ if wanted.is_null() => {
                    qb.push(format!(" AND t.{} IS NULL", column.name));
                }
                _ => {
                    qb.push(format!(" AND t.{} = ", column.name));
                    push_value(&mut qb, column, wanted);
                }
            }
        }

        if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = escape_like(term);
            qb.push(" AND (");
            for (position, field) in def.search.iter().enumerate() {
                if position > 0 {
                    qb.push(" OR ");
                }
                qb.push(format!("t.{field} ILIKE "));
                qb.push_bind(pattern.clone());
            }
            qb.push(")");
        }

        qb.push(" ORDER BY t.id");
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ");
            qb.push_bind(to_sql_count(limit));
        }
        if query.offset > 0 {
            qb.push(" OFFSET ");
            qb.push_bind(to_sql_count(query.offset));
        }

        debug!("list {}: {}", kind, qb.sql());
        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error(e, "Failed to list rows"))?;
        rows.into_iter().map(decode_row).collect()
    }

    async fn update(&self, kind: EntityKind, id: i64, fields: Row) -> Result<Option<Row>> {
        let def = self.schema.table(kind)?;
        let mut qb = QueryBuilder::<Postgres>::new(format!("UPDATE grc.{} AS t SET ", def.table));
        for (column, value) in column_values(def, &fields) {
            qb.push(format!("{} = ", column.name));
            push_value(&mut qb, column, value);
            qb.push(", ");
        }
        qb.push("updated_at = NOW() WHERE t.id = ");
        qb.push_bind(id);
        qb.push(" RETURNING to_jsonb(t) AS row");

        let row = qb
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error(e, "Failed to update row"))?;
        row.map(decode_row).transpose()
    }

    async fn delete(&self, kind: EntityKind, id: i64) -> Result<bool> {
        let def = self.schema.table(kind)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error(e, "Failed to begin transaction"))?;

        let doomed = self.cascade_closure(&mut tx, kind, id).await?;
        for (parent, parent_id) in &doomed {
            for reference in self.schema.references_to(*parent) {
                if !matches!(reference.column.ty, ColumnType::RefList { .. }) {
                    continue;
                }
                let sql = format!(
                    "UPDATE grc.{table} SET {col} = array_remove({col}, $1) WHERE $1 = ANY({col})",
                    table = reference.child.table,
                    col = reference.column.name
                );
                sqlx::query(&sql)
                    .bind(parent_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| db_error(e, "Failed to unlink reference list"))?;
            }
        }

        let sql = format!("DELETE FROM grc.{} WHERE id = $1", def.table);
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error(e, "Failed to delete row"))?;
        tx.commit()
            .await
            .map_err(|e| db_error(e, "Failed to commit delete"))?;

        if result.rows_affected() > 0 {
            debug!("Deleted {} {} ({} rows in cascade)", kind, id, doomed.len());
        }
        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, kind: EntityKind, id: i64) -> Result<bool> {
        let def = self.schema.table(kind)?;
        let sql = format!("SELECT EXISTS(SELECT 1 FROM grc.{} WHERE id = $1)", def.table);
        let found: bool = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error(e, "Failed to check existence"))?;
        Ok(found)
    }
}
