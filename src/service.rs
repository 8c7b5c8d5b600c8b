//! GRC service: typed CRUD over the storage port.
//!
//! Every write goes through the same pipeline:
//!
//! 1. schema-driven field checks (required, nulls, max length, closed
//!    choices, reference existence), reported per field;
//! 2. deserialization into the record type, which applies field defaults;
//! 3. the record's own cross-field rules ([`Record::validate`]).
//!
//! Server-managed columns (evidence attachments) are never taken from client
//! input and survive updates unchanged.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use grc_types::{
    Attachment, Control, Entity, Framework, Risk, RiskAssessment, RiskAssessmentView,
    RiskMetrics, RiskTreatment,
};

use crate::blob_store::{sanitize_filename, BlobStore, BlobStoreError};
use crate::error::{FieldErrors, GrcError, Result};
use crate::metrics;
use crate::ports::{ListQuery, RecordStore, Row};
use crate::record::Record;
use crate::schema::{Column, ColumnType, EntityKind, Schema, TableDef};
use crate::seed::{SeedBundle, SeedReport};

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";
const NOT_BLANK: &str = "This field may not be blank.";

/// Raw list parameters as they arrive in a query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub search: Option<String>,
    pub filters: BTreeMap<String, String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ListParams {
    /// Splits `search`, `limit` and `offset` out of the query pairs; every
    /// other pair is a field filter.
    pub fn from_query(mut pairs: BTreeMap<String, String>) -> Result<Self> {
        let mut errors = FieldErrors::default();
        let mut number = |name: &str, raw: Option<String>| -> Option<usize> {
            let raw = raw?;
            match raw.trim().parse::<usize>() {
                Ok(n) if i64::try_from(n).is_ok() => Some(n),
                _ => {
                    errors.add(name, "A valid integer is required.");
                    None
                }
            }
        };
        let limit = number("limit", pairs.remove("limit"));
        let offset = number("offset", pairs.remove("offset")).unwrap_or(0);
        errors.into_result()?;

        Ok(Self {
            search: pairs.remove("search"),
            filters: pairs,
            limit,
            offset,
        })
    }

    pub fn filter(mut self, field: &str, value: impl Into<String>) -> Self {
        self.filters.insert(field.to_string(), value.into());
        self
    }
}

/// Best-effort content type from a filename extension.
pub fn guess_content_type(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "txt" | "log" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        "zip" => "application/zip",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

fn decode<R: Record>(row: Row) -> Result<Entity<R>> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

fn expect_object(input: Value) -> Result<Map<String, Value>> {
    match input {
        Value::Object(map) => Ok(map),
        _ => Err(GrcError::invalid(
            FieldErrors::NON_FIELD,
            "Invalid data. Expected a dictionary.",
        )),
    }
}

fn invalid_pk(raw: &Value) -> String {
    format!("invalid pk \"{}\" - object does not exist.", raw.to_string().trim_matches('"'))
}

/// A reference that must resolve before the write is accepted.
struct PendingRef {
    field: &'static str,
    target: EntityKind,
    id: i64,
}

/// Check one supplied value against its column and normalize it.
fn check_value(
    column: &Column,
    value: &Value,
    errors: &mut FieldErrors,
    refs: &mut Vec<PendingRef>,
) -> Option<Value> {
    let name = column.name;
    match column.ty {
        ColumnType::Text { max_len } => {
            let Some(text) = value.as_str() else {
                errors.add(name, "Not a valid string.");
                return None;
            };
            if column.required && text.trim().is_empty() {
                errors.add(name, NOT_BLANK);
            }
            if let Some(max) = max_len {
                if text.chars().count() > max {
                    errors.add(
                        name,
                        format!("Ensure this field has no more than {max} characters."),
                    );
                }
            }
            Some(value.clone())
        }
        ColumnType::Bool => match value {
            Value::Bool(_) => Some(value.clone()),
            _ => {
                errors.add(name, "Must be a valid boolean.");
                None
            }
        },
        ColumnType::Date => {
            let parsed = value
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
            match parsed {
                Some(date) => Some(Value::String(date.format("%Y-%m-%d").to_string())),
                None => {
                    errors.add(name, "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.");
                    None
                }
            }
        }
        ColumnType::Choice { codes } => {
            let code = value
                .as_str()
                .and_then(|s| codes.iter().find(|code| **code == s));
            match code {
                Some(code) => Some(Value::String((*code).to_string())),
                None => {
                    let shown = value.as_str().map_or_else(|| value.to_string(), str::to_owned);
                    errors.add(name, format!("\"{shown}\" is not a valid choice."));
                    None
                }
            }
        }
        ColumnType::Ref { target, .. } => match value.as_i64() {
            Some(id) => {
                refs.push(PendingRef { field: name, target, id });
                Some(value.clone())
            }
            None => {
                errors.add(name, "Incorrect type. Expected pk value.");
                None
            }
        },
        ColumnType::RefList { target } => {
            let Some(items) = value.as_array() else {
                errors.add(name, "Expected a list of items.");
                return None;
            };
            let mut ids = Vec::with_capacity(items.len());
            for item in items {
                match item.as_i64() {
                    Some(id) if !ids.contains(&id) => {
                        refs.push(PendingRef { field: name, target, id });
                        ids.push(id);
                    }
                    Some(_) => {}
                    None => errors.add(name, "Incorrect type. Expected pk value."),
                }
            }
            Some(Value::from(ids))
        }
        ColumnType::Json => Some(value.clone()),
    }
}

/// Convert a raw `?field=value` filter into the stored representation.
fn typed_filter(def: &TableDef, field: &str, raw: &str) -> std::result::Result<Value, String> {
    if !def.filters.contains(&field) {
        return Err("Unknown filter field.".to_string());
    }
    let column = def
        .column(field)
        .ok_or_else(|| "Unknown filter field.".to_string())?;
    // text compares verbatim, like stored text
    let trimmed = raw.trim();
    match column.ty {
        ColumnType::Text { .. } => Ok(Value::String(raw.to_string())),
        ColumnType::Choice { codes } => codes
            .iter()
            .find(|code| **code == trimmed)
            .map(|code| Value::String((*code).to_string()))
            .ok_or_else(|| format!("Select a valid choice. {trimmed} is not one of the available choices.")),
        ColumnType::Bool => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err("Enter a valid boolean.".to_string()),
        },
        ColumnType::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .map_err(|_| "Enter a valid date.".to_string()),
        ColumnType::Ref { .. } | ColumnType::RefList { .. } => trimmed
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| "Enter a whole number.".to_string()),
        ColumnType::Json => Err("Field cannot be filtered.".to_string()),
    }
}

pub struct GrcService {
    store: Arc<dyn RecordStore>,
    schema: Arc<Schema>,
    blobs: Arc<dyn BlobStore>,
}

impl GrcService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        schema: Arc<Schema>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            store,
            schema,
            blobs,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    // ── Write pipeline ────────────────────────────────────────

    /// Validate `input` (merged over `existing` when updating) and produce the
    /// record plus the row to store.
    ///
    /// On a full write every required column must appear in `input`; on a
    /// partial write missing columns keep their stored values.
    async fn prepare<R: Record>(
        &self,
        input: Value,
        existing: Option<&Row>,
        partial: bool,
    ) -> Result<(R, Row)> {
        let def = self.schema.table(R::KIND)?;
        let input = expect_object(input)?;

        let mut errors = FieldErrors::default();
        let mut refs = Vec::new();
        let mut normalized = Row::new();

        for column in def.client_columns() {
            let supplied = input.get(column.name);
            let value = match (supplied, existing) {
                (Some(value), _) => Some(value),
                (None, Some(row)) if partial || !column.required => row.get(column.name),
                (None, _) => None,
            };
            match value {
                None => {
                    if column.required {
                        errors.add(column.name, REQUIRED);
                    }
                }
                Some(Value::Null) => {
                    if column.nullable {
                        normalized.insert(column.name.to_string(), Value::Null);
                    } else {
                        errors.add(column.name, NOT_NULL);
                    }
                }
                Some(value) => {
                    if let Some(clean) = check_value(column, value, &mut errors, &mut refs) {
                        normalized.insert(column.name.to_string(), clean);
                    }
                }
            }
        }

        for pending in &refs {
            if !self.store.exists(pending.target, pending.id).await? {
                errors.add(pending.field, invalid_pk(&Value::from(pending.id)));
            }
        }
        errors.into_result()?;

        let record: R = serde_json::from_value(Value::Object(normalized))
            .map_err(|e| GrcError::invalid(FieldErrors::NON_FIELD, e.to_string()))?;
        record.validate().map_err(GrcError::Validation)?;

        let mut row = match serde_json::to_value(&record)? {
            Value::Object(map) => map,
            other => {
                return Err(anyhow::anyhow!("{} serialized to non-object {other}", R::KIND).into())
            }
        };
        for column in def.managed_columns() {
            let kept = existing
                .and_then(|r| r.get(column.name).cloned())
                .unwrap_or(Value::Null);
            row.insert(column.name.to_string(), kept);
        }
        Ok((record, row))
    }

    async fn fetch_row(&self, kind: EntityKind, id: i64) -> Result<Row> {
        self.store
            .fetch(kind, id)
            .await?
            .ok_or_else(|| GrcError::not_found(kind, id))
    }

    // ── Generic CRUD ──────────────────────────────────────────

    pub async fn create<R: Record>(&self, input: Value) -> Result<Entity<R>> {
        let (_, row) = self.prepare::<R>(input, None, false).await?;
        let stored = self.store.insert(R::KIND, row).await?;
        let entity = decode::<R>(stored)?;
        info!("Created {} {}", R::KIND, entity.id);
        Ok(entity)
    }

    /// Create from an already-typed record.
    pub async fn create_record<R: Record>(&self, record: &R) -> Result<Entity<R>> {
        self.create(serde_json::to_value(record)?).await
    }

    pub async fn get<R: Record>(&self, id: i64) -> Result<Entity<R>> {
        decode(self.fetch_row(R::KIND, id).await?)
    }

    pub async fn list<R: Record>(&self, params: &ListParams) -> Result<Vec<Entity<R>>> {
        let def = self.schema.table(R::KIND)?;
        let mut errors = FieldErrors::default();
        let mut query = ListQuery {
            search: params.search.clone(),
            limit: params.limit,
            offset: params.offset,
            ..ListQuery::default()
        };
        for (field, raw) in &params.filters {
            match typed_filter(def, field, raw) {
                Ok(value) => {
                    query.filters.insert(field.clone(), value);
                }
                Err(message) => errors.add(field, message),
            }
        }
        errors.into_result()?;

        debug!("Listing {} with {:?}", R::KIND, query);
        self.store
            .list(R::KIND, &query)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// PUT (`partial = false`) or PATCH (`partial = true`).
    pub async fn update<R: Record>(&self, id: i64, input: Value, partial: bool) -> Result<Entity<R>> {
        let existing = self.fetch_row(R::KIND, id).await?;
        let (_, row) = self.prepare::<R>(input, Some(&existing), partial).await?;
        let stored = self
            .store
            .update(R::KIND, id, row)
            .await?
            .ok_or_else(|| GrcError::not_found(R::KIND, id))?;
        info!("Updated {} {}", R::KIND, id);
        decode(stored)
    }

    /// Delete with the schema's cascade rules. Blobs of removed records stay
    /// in the blob store.
    pub async fn delete<R: Record>(&self, id: i64) -> Result<()> {
        if !self.store.delete(R::KIND, id).await? {
            return Err(GrcError::not_found(R::KIND, id));
        }
        info!("Deleted {} {}", R::KIND, id);
        Ok(())
    }

    // ── Risk register ─────────────────────────────────────────

    pub async fn risk_assessments(&self, risk_id: i64) -> Result<Vec<RiskAssessmentView>> {
        self.fetch_row(EntityKind::Risk, risk_id).await?;
        let params = ListParams::default().filter("risk", risk_id.to_string());
        Ok(self
            .list::<RiskAssessment>(&params)
            .await?
            .into_iter()
            .map(RiskAssessment::view)
            .collect())
    }

    pub async fn risk_metrics(&self) -> Result<RiskMetrics> {
        let risks = self.list::<Risk>(&ListParams::default()).await?;
        Ok(metrics::risk_metrics(&risks))
    }

    pub async fn risk_treatments(
        &self,
        risk_id: i64,
        params: &ListParams,
    ) -> Result<Vec<Entity<RiskTreatment>>> {
        self.fetch_row(EntityKind::Risk, risk_id).await?;
        let params = params.clone().filter("risk", risk_id.to_string());
        self.list(&params).await
    }

    pub async fn create_treatment(&self, risk_id: i64, mut input: Value) -> Result<Entity<RiskTreatment>> {
        self.fetch_row(EntityKind::Risk, risk_id).await?;
        if let Value::Object(fields) = &mut input {
            fields.insert("risk".into(), Value::from(risk_id));
        }
        self.create(input).await
    }

    /// A treatment addressed through its parent risk; any mismatch is 404.
    pub async fn treatment(&self, risk_id: i64, id: i64) -> Result<Entity<RiskTreatment>> {
        let treatment = self.get::<RiskTreatment>(id).await?;
        if treatment.record.risk != risk_id {
            return Err(GrcError::not_found(EntityKind::RiskTreatment, id));
        }
        Ok(treatment)
    }

    pub async fn update_treatment(
        &self,
        risk_id: i64,
        id: i64,
        mut input: Value,
        partial: bool,
    ) -> Result<Entity<RiskTreatment>> {
        self.treatment(risk_id, id).await?;
        if let Value::Object(fields) = &mut input {
            fields.insert("risk".into(), Value::from(risk_id));
        }
        self.update(id, input, partial).await
    }

    pub async fn delete_treatment(&self, risk_id: i64, id: i64) -> Result<()> {
        self.treatment(risk_id, id).await?;
        self.delete::<RiskTreatment>(id).await
    }

    // ── Attachments ───────────────────────────────────────────

    fn attachment_column<R: Record>(&self) -> Result<&'static str> {
        self.schema
            .table(R::KIND)?
            .managed_columns()
            .find(|c| c.ty == ColumnType::Json)
            .map(|c| c.name)
            .ok_or_else(|| anyhow::anyhow!("{} does not take attachments", R::KIND).into())
    }

    /// Store `content` as the record's attachment, replacing (and deleting)
    /// any previous blob.
    pub async fn attach_file<R: Record>(
        &self,
        id: i64,
        filename: &str,
        content_type: Option<&str>,
        content: &[u8],
    ) -> Result<Entity<R>> {
        let column = self.attachment_column::<R>()?;
        if filename.trim().is_empty() {
            return Err(GrcError::invalid("filename", REQUIRED));
        }
        let mut row = self.fetch_row(R::KIND, id).await?;
        let previous: Option<Attachment> = match row.get(column) {
            Some(Value::Null) | None => None,
            Some(value) => Some(serde_json::from_value(value.clone())?),
        };

        let def = self.schema.table(R::KIND)?;
        let safe_name = sanitize_filename(filename);
        let key = format!("{}/{}/{}-{}", def.table, id, Uuid::new_v4(), safe_name);
        let blob_ref = self.blobs.store(&key, content).await?;

        let attachment = Attachment {
            blob_ref,
            filename: safe_name.clone(),
            content_type: content_type
                .filter(|ct| !ct.trim().is_empty())
                .map(str::to_owned)
                .unwrap_or_else(|| guess_content_type(&safe_name).to_string()),
            size: content.len() as u64,
            sha256: hex::encode(Sha256::digest(content)),
        };
        row.insert(column.to_string(), serde_json::to_value(&attachment)?);

        let stored = self
            .store
            .update(R::KIND, id, row)
            .await?
            .ok_or_else(|| GrcError::not_found(R::KIND, id))?;
        info!(
            "Attached {} ({} bytes) to {} {}",
            attachment.filename,
            attachment.size,
            R::KIND,
            id
        );

        if let Some(old) = previous {
            if let Err(e) = self.blobs.delete(&old.blob_ref).await {
                warn!("Failed to delete replaced blob {}: {}", old.blob_ref, e);
            }
        }
        decode(stored)
    }

    /// The stored attachment metadata and its bytes.
    pub async fn fetch_attachment<R: Record>(&self, id: i64) -> Result<(Attachment, Vec<u8>)> {
        let column = self.attachment_column::<R>()?;
        let row = self.fetch_row(R::KIND, id).await?;
        let attachment: Attachment = match row.get(column) {
            Some(Value::Null) | None => {
                return Err(BlobStoreError::NotFound(format!("{} {} has no attachment", R::KIND, id)).into())
            }
            Some(value) => serde_json::from_value(value.clone())?,
        };
        let content = self.blobs.fetch(&attachment.blob_ref).await?;
        Ok((attachment, content))
    }

    // ── Seeding ───────────────────────────────────────────────

    /// Load frameworks and controls; existing ones are left untouched.
    pub async fn apply_seed(&self, bundle: &SeedBundle) -> Result<SeedReport> {
        let mut report = SeedReport {
            bundle_hash: bundle.content_hash()?,
            ..SeedReport::default()
        };

        for seed in &bundle.frameworks {
            let lookup = ListParams::default()
                .filter("name", seed.name.clone())
                .filter("version", seed.version.clone());
            let framework_id = match self.list::<Framework>(&lookup).await?.first() {
                Some(existing) => {
                    report.frameworks_existing += 1;
                    existing.id
                }
                None => {
                    let created = self
                        .create_record(&Framework {
                            name: seed.name.clone(),
                            description: seed.description.clone(),
                            version: seed.version.clone(),
                        })
                        .await?;
                    report.frameworks_created += 1;
                    created.id
                }
            };

            for control in &seed.controls {
                let lookup = ListParams::default()
                    .filter("framework", framework_id.to_string())
                    .filter("identifier", control.identifier.clone());
                if !self.list::<Control>(&lookup).await?.is_empty() {
                    report.controls_existing += 1;
                    continue;
                }
                self.create_record(&Control {
                    framework: framework_id,
                    identifier: control.identifier.clone(),
                    title: control.title.clone(),
                    description: control.description.clone(),
                })
                .await?;
                report.controls_created += 1;
            }
        }

        info!(
            "Applied seed bundle {}: {} frameworks created, {} controls created",
            report.bundle_hash, report.frameworks_created, report.controls_created
        );
        Ok(report)
    }
}
