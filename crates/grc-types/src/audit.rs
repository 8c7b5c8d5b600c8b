//! Audits, findings raised during them, and finding evidence.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::choice::closed_choice;
use crate::entity::Attachment;

closed_choice! {
    pub enum AuditType ("audit_type") {
        Internal => "INTERNAL", "Internal Audit",
        External => "EXTERNAL", "External Audit",
        Compliance => "COMPLIANCE", "Compliance Audit",
        Security => "SECURITY", "Security Audit",
        Operational => "OPERATIONAL", "Operational Audit",
    }
}

closed_choice! {
    #[derive(Default)]
    pub enum AuditStatus ("status") {
        #[default]
        Planned => "PLANNED", "Planned",
        InProgress => "IN_PROGRESS", "In Progress",
        Completed => "COMPLETED", "Completed",
        Cancelled => "CANCELLED", "Cancelled",
    }
}

closed_choice! {
    pub enum FindingSeverity ("severity") {
        Low => "LOW", "Low",
        Medium => "MEDIUM", "Medium",
        High => "HIGH", "High",
        Critical => "CRITICAL", "Critical",
    }
}

closed_choice! {
    /// No transition rules are enforced; a finding may move between any two states.
    #[derive(Default)]
    pub enum FindingStatus ("status") {
        #[default]
        Open => "OPEN", "Open",
        InRemediation => "IN_REMEDIATION", "In Remediation",
        Remediated => "REMEDIATED", "Remediated",
        Verified => "VERIFIED", "Verified",
        Closed => "CLOSED", "Closed",
        Accepted => "ACCEPTED", "Risk Accepted",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub title: String,
    pub description: String,
    pub audit_type: AuditType,
    #[serde(default)]
    pub status: AuditStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub lead_auditor: i64,
    /// Users on the audit team.
    #[serde(default)]
    pub auditors: Vec<i64>,
    /// Controls in scope.
    #[serde(default)]
    pub controls: Vec<i64>,
    pub created_by: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFinding {
    pub audit: i64,
    #[serde(default)]
    pub control: Option<i64>,
    pub title: String,
    pub description: String,
    pub severity: FindingSeverity,
    #[serde(default)]
    pub status: FindingStatus,
    #[serde(default)]
    pub remediation_plan: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub assigned_to: Option<i64>,
    pub created_by: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvidence {
    pub finding: i64,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub attachment: Option<Attachment>,
    pub created_by: i64,
}
