//! Error taxonomy for the GRC tracker.
//!
//! Every operation is a single synchronous read or write with a deterministic
//! outcome, so nothing here is retryable. `http_status` gives the client-facing
//! status code for each variant.

use std::collections::BTreeMap;
use std::fmt;

use grc_types::InvalidChoice;
use serde::Serialize;
use thiserror::Error;

use crate::blob_store::BlobStoreError;
use crate::schema::EntityKind;

pub type Result<T> = std::result::Result<T, GrcError>;

#[derive(Debug, Error)]
pub enum GrcError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: i64 },

    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// A classification input outside its closed set.
    #[error(transparent)]
    InvalidEnumValue(#[from] InvalidChoice),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Blob(#[from] BlobStoreError),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GrcError {
    pub fn not_found(kind: EntityKind, id: i64) -> Self {
        Self::NotFound { kind, id }
    }

    /// Single-field validation failure.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::default();
        errors.add(field, message);
        Self::Validation(errors)
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Validation(_) => 400,
            Self::InvalidEnumValue(_) => 400,
            Self::Conflict(_) => 409,
            Self::Blob(BlobStoreError::NotFound(_)) => 404,
            Self::Blob(_) => 500,
            Self::Internal(_) => 500,
        }
    }
}

impl From<serde_json::Error> for GrcError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(e.into())
    }
}

/// Per-field validation messages, keyed by field name.
///
/// Errors that do not belong to a single field are filed under
/// [`FieldErrors::NON_FIELD`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub const NON_FIELD: &'static str = "non_field_errors";

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `Ok(())` when empty, otherwise a `Validation` error.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(GrcError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}
