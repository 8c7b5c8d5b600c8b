//! Storage port.
//!
//! The service layer depends only on [`RecordStore`]; the in-memory and
//! Postgres stores implement it. Rows cross the port as JSON objects holding
//! every declared column plus `id`, `created_at` and `updated_at`, so one
//! implementation serves every table the schema declares.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::schema::EntityKind;

/// One stored row, keyed by column name.
pub type Row = Map<String, Value>;

/// List parameters. Filters are already validated and typed by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// Case-insensitive substring over the table's search fields.
    pub search: Option<String>,
    /// Exact matches; a reference-list column matches when it contains the value.
    pub filters: BTreeMap<String, Value>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ListQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.insert(field.to_string(), value.into());
        self
    }
}

/// Row storage honouring the delete rules declared in the schema.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a row; storage assigns `id` and both timestamps.
    async fn insert(&self, kind: EntityKind, fields: Row) -> Result<Row>;

    async fn fetch(&self, kind: EntityKind, id: i64) -> Result<Option<Row>>;

    /// Matching rows ordered by id.
    async fn list(&self, kind: EntityKind, query: &ListQuery) -> Result<Vec<Row>>;

    /// Replace every column of an existing row and bump `updated_at`.
    /// Returns `None` when the row does not exist.
    async fn update(&self, kind: EntityKind, id: i64, fields: Row) -> Result<Option<Row>>;

    /// Delete a row, cascading, nulling or unlinking its dependants as
    /// declared. Returns `false` when the row does not exist.
    async fn delete(&self, kind: EntityKind, id: i64) -> Result<bool>;

    async fn exists(&self, kind: EntityKind, id: i64) -> Result<bool>;
}
