//! Risk register types: risks, their assessments and treatments, and the
//! metrics rollup returned by the dashboard endpoint.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::choice::closed_choice;
use crate::entity::Entity;

closed_choice! {
    /// Severity of consequence, ordered LOW < MEDIUM < HIGH < CRITICAL.
    pub enum Impact ("impact") {
        Low => "LOW", "Low",
        Medium => "MEDIUM", "Medium",
        High => "HIGH", "High",
        Critical => "CRITICAL", "Critical",
    }
}

closed_choice! {
    /// Probability of occurrence, ordered RARE < ... < CERTAIN.
    pub enum Likelihood ("likelihood") {
        Rare => "RARE", "Rare",
        Unlikely => "UNLIKELY", "Unlikely",
        Possible => "POSSIBLE", "Possible",
        Likely => "LIKELY", "Likely",
        Certain => "CERTAIN", "Certain",
    }
}

closed_choice! {
    /// Qualitative band derived from impact x likelihood. Never stored.
    pub enum RiskLevel ("risk_level") {
        Low => "LOW", "Low",
        Medium => "MEDIUM", "Medium",
        High => "HIGH", "High",
        Critical => "CRITICAL", "Critical",
    }
}

closed_choice! {
    #[derive(Default)]
    pub enum RiskSeverity ("severity") {
        Low => "LOW", "Low",
        #[default]
        Medium => "MEDIUM", "Medium",
        High => "HIGH", "High",
        Critical => "CRITICAL", "Critical",
    }
}

closed_choice! {
    #[derive(Default)]
    pub enum RiskStatus ("status") {
        #[default]
        Open => "OPEN", "Open",
        Mitigated => "MITIGATED", "Mitigated",
        Accepted => "ACCEPTED", "Accepted",
        Transferred => "TRANSFERRED", "Transferred",
        Closed => "CLOSED", "Closed",
    }
}

closed_choice! {
    #[derive(Default)]
    pub enum AssessmentStatus ("status") {
        #[default]
        Open => "OPEN", "Open",
        InProgress => "IN_PROGRESS", "In Progress",
        Mitigated => "MITIGATED", "Mitigated",
        Accepted => "ACCEPTED", "Accepted",
        Closed => "CLOSED", "Closed",
    }
}

closed_choice! {
    pub enum TreatmentStrategy ("strategy") {
        Mitigate => "MITIGATE", "Mitigate",
        Accept => "ACCEPT", "Accept",
        Transfer => "TRANSFER", "Transfer",
        Avoid => "AVOID", "Avoid",
    }
}

closed_choice! {
    #[derive(Default)]
    pub enum TreatmentStatus ("status") {
        #[default]
        Planned => "PLANNED", "Planned",
        InProgress => "IN_PROGRESS", "In Progress",
        Completed => "COMPLETED", "Completed",
        Cancelled => "CANCELLED", "Cancelled",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Risk {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub severity: RiskSeverity,
    #[serde(default)]
    pub status: RiskStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk: i64,
    pub impact: Impact,
    pub likelihood: Likelihood,
    pub mitigation_plan: String,
    #[serde(default)]
    pub status: AssessmentStatus,
    #[serde(default)]
    pub assigned_to: Option<i64>,
    pub created_by: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskTreatment {
    pub risk: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub strategy: TreatmentStrategy,
    #[serde(default)]
    pub status: TreatmentStatus,
    #[serde(default)]
    pub owner: Option<i64>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// Score and band for one (impact, likelihood) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskScore {
    pub impact: Impact,
    pub likelihood: Likelihood,
    pub score: u8,
    pub level: RiskLevel,
}

/// A stored assessment with its derived band, as returned on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessmentView {
    #[serde(flatten)]
    pub assessment: Entity<RiskAssessment>,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
}

// ── Metrics rollup ────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskStatusCounts {
    pub open: usize,
    pub mitigated: usize,
    pub accepted: usize,
    pub transferred: usize,
    pub closed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentRisk {
    pub id: i64,
    pub title: String,
    pub severity: RiskSeverity,
}

/// Dashboard rollup over the whole risk register.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total: usize,
    pub open_risks: usize,
    pub closed_risks: usize,
    pub status_counts: RiskStatusCounts,
    /// At most three, newest first.
    pub recent_risks: Vec<RecentRisk>,
}
