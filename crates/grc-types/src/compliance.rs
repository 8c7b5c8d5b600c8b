//! Compliance frameworks, their controls, and control evidence.

use serde::{Deserialize, Serialize};

use crate::entity::Attachment;

/// A compliance framework such as ISO/IEC 27001 or SOC 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Framework {
    pub name: String,
    pub description: String,
    pub version: String,
}

/// A safeguard within a framework. `(framework, identifier)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub framework: i64,
    pub identifier: String,
    pub title: String,
    pub description: String,
}

/// Evidence that a control is operating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub control: i64,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub attachment: Option<Attachment>,
    pub created_by: i64,
}
