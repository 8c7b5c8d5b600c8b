//! In-memory [`RecordStore`].
//!
//! Default backend for the server when no database is configured, and the
//! store every test runs against. All tables sit behind one `RwLock`, so a
//! cascading delete is applied atomically with respect to other writers.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::error::{GrcError, Result};
use crate::ports::{ListQuery, RecordStore, Row};
use crate::schema::{ColumnType, EntityKind, OnDelete, Schema, TableDef};

#[derive(Default)]
struct Tables {
    rows: BTreeMap<EntityKind, BTreeMap<i64, Row>>,
    next_id: BTreeMap<EntityKind, i64>,
}

impl Tables {
    fn table(&self, kind: EntityKind) -> impl Iterator<Item = (&i64, &Row)> {
        self.rows.get(&kind).into_iter().flat_map(|rows| rows.iter())
    }

    fn allocate_id(&mut self, kind: EntityKind) -> i64 {
        let next = self.next_id.entry(kind).or_insert(1);
        let id = *next;
        *next += 1;
        id
    }
}

pub struct MemoryStore {
    schema: Arc<Schema>,
    inner: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            inner: RwLock::new(Tables::default()),
        }
    }

    /// Reject a row whose unique key collides with another row of the table.
    fn check_unique(&self, tables: &Tables, def: &TableDef, id: Option<i64>, row: &Row) -> Result<()> {
        for key in def.unique {
            let clash = tables.table(def.kind).any(|(other_id, other)| {
                Some(*other_id) != id && key.iter().all(|field| other.get(*field) == row.get(*field))
            });
            if clash {
                return Err(GrcError::Conflict(format!(
                    "{} with this {} already exists",
                    def.kind,
                    key.join(" and ")
                )));
            }
        }
        Ok(())
    }

    /// Removes `id` and applies the declared delete rule to every dependant.
    fn delete_locked(&self, tables: &mut Tables, kind: EntityKind, id: i64) -> bool {
        let removed = tables
            .rows
            .get_mut(&kind)
            .and_then(|rows| rows.remove(&id))
            .is_some();
        if !removed {
            return false;
        }

        for reference in self.schema.references_to(kind) {
            let child = reference.child.kind;
            let column = reference.column.name;
            match reference.column.ty {
                ColumnType::Ref {
                    on_delete: OnDelete::Cascade,
                    ..
                } => {
                    let dependants: Vec<i64> = tables
                        .table(child)
                        .filter(|(_, row)| row.get(column).and_then(Value::as_i64) == Some(id))
                        .map(|(child_id, _)| *child_id)
                        .collect();
                    for child_id in dependants {
                        debug!("Cascading delete to {} {}", child, child_id);
                        self.delete_locked(tables, child, child_id);
                    }
                }
                ColumnType::Ref {
                    on_delete: OnDelete::SetNull,
                    ..
                } => {
                    for row in tables.rows.entry(child).or_default().values_mut() {
                        if row.get(column).and_then(Value::as_i64) == Some(id) {
                            row.insert(column.to_string(), Value::Null);
                        }
                    }
                }
                ColumnType::RefList { .. } => {
                    for row in tables.rows.entry(child).or_default().values_mut() {
                        if let Some(Value::Array(ids)) = row.get_mut(column) {
                            ids.retain(|v| v.as_i64() != Some(id));
                        }
                    }
                }
                _ => {}
            }
        }
        true
    }
}

fn matches(def: &TableDef, row: &Row, query: &ListQuery) -> bool {
    let filters_match = query.filters.iter().all(|(field, wanted)| {
        let stored = row.get(field).unwrap_or(&Value::Null);
        match def.column(field).map(|c| c.ty) {
            Some(ColumnType::RefList { .. }) => stored
                .as_array()
                .is_some_and(|ids| ids.contains(wanted)),
            _ => stored == wanted,
        }
    });
    if !filters_match {
        return false;
    }

    match query.search.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(term) => {
            let term = term.to_lowercase();
            def.search.iter().any(|field| {
                row.get(*field)
                    .and_then(Value::as_str)
                    .is_some_and(|text| text.to_lowercase().contains(&term))
            })
        }
    }
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, kind: EntityKind, mut fields: Row) -> Result<Row> {
        let def = self.schema.table(kind)?;
        let mut tables = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        self.check_unique(&tables, def, None, &fields)?;

        let id = tables.allocate_id(kind);
        let stamp = now();
        fields.insert("id".into(), Value::from(id));
        fields.insert("created_at".into(), stamp.clone());
        fields.insert("updated_at".into(), stamp);
        tables.rows.entry(kind).or_default().insert(id, fields.clone());
        Ok(fields)
    }

    async fn fetch(&self, kind: EntityKind, id: i64) -> Result<Option<Row>> {
        let tables = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(tables.rows.get(&kind).and_then(|rows| rows.get(&id)).cloned())
    }

    async fn list(&self, kind: EntityKind, query: &ListQuery) -> Result<Vec<Row>> {
        let def = self.schema.table(kind)?;
        let tables = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        let rows = tables
            .table(kind)
            .map(|(_, row)| row)
            .filter(|row| matches(def, row, query))
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(rows)
    }

    async fn update(&self, kind: EntityKind, id: i64, mut fields: Row) -> Result<Option<Row>> {
        let def = self.schema.table(kind)?;
        let mut tables = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        let Some(created_at) = tables
            .rows
            .get(&kind)
            .and_then(|rows| rows.get(&id))
            .and_then(|row| row.get("created_at").cloned())
        else {
            return Ok(None);
        };
        self.check_unique(&tables, def, Some(id), &fields)?;

        fields.insert("id".into(), Value::from(id));
        fields.insert("created_at".into(), created_at);
        fields.insert("updated_at".into(), now());
        tables.rows.entry(kind).or_default().insert(id, fields.clone());
        Ok(Some(fields))
    }

    async fn delete(&self, kind: EntityKind, id: i64) -> Result<bool> {
        let mut tables = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(self.delete_locked(&mut tables, kind, id))
    }

    async fn exists(&self, kind: EntityKind, id: i64) -> Result<bool> {
        let tables = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(tables.rows.get(&kind).is_some_and(|rows| rows.contains_key(&id)))
    }
}
