//! Shared record and API types for the GRC tracker.
//!
//! Plain serde data: no storage or HTTP dependencies, so the same types serve
//! the stores, the REST layer and API clients.

pub mod choice;

pub mod audit;
pub mod compliance;
pub mod entity;
pub mod project;
pub mod risk;
pub mod user;

pub use audit::{Audit, AuditEvidence, AuditFinding, AuditStatus, AuditType, FindingSeverity, FindingStatus};
pub use choice::InvalidChoice;
pub use compliance::{Control, Evidence, Framework};
pub use entity::{Attachment, Entity};
pub use project::{Milestone, Project, ProjectStatus, Task, TaskPriority, TaskStatus};
pub use risk::{
    AssessmentStatus, Impact, Likelihood, RecentRisk, Risk, RiskAssessment, RiskAssessmentView,
    RiskLevel, RiskMetrics, RiskScore, RiskSeverity, RiskStatus, RiskStatusCounts, RiskTreatment,
    TreatmentStatus, TreatmentStrategy,
};
pub use user::User;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn entity_serializes_flat() {
        let entity = Entity {
            id: 7,
            record: Risk {
                title: "Vendor lock-in".into(),
                description: "Single cloud provider".into(),
                category: "Operational".into(),
                severity: RiskSeverity::High,
                status: RiskStatus::Open,
            },
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        };
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["title"], "Vendor lock-in");
        assert_eq!(json["severity"], "HIGH");

        let back: Entity<Risk> = serde_json::from_value(json).unwrap();
        assert_eq!(back, entity);
    }

    #[test]
    fn defaults_apply_to_omitted_fields() {
        let risk: Risk = serde_json::from_value(serde_json::json!({
            "title": "t", "description": "d", "category": "c"
        }))
        .unwrap();
        assert_eq!(risk.severity, RiskSeverity::Medium);
        assert_eq!(risk.status, RiskStatus::Open);
    }

    #[test]
    fn unknown_enum_code_fails_deserialization() {
        let err = serde_json::from_value::<RiskAssessment>(serde_json::json!({
            "risk": 1, "impact": "EXTREME", "likelihood": "RARE",
            "mitigation_plan": "", "created_by": 1
        }))
        .unwrap_err();
        assert!(err.to_string().contains("invalid value 'EXTREME' for impact"));
    }
}
