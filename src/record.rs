//! Binds each record type to its table and carries cross-field rules.
//!
//! Per-column checks (required, max length, closed choices, references) are
//! driven by the schema in [`crate::service`]; only rules spanning several
//! fields live here.

use serde::de::DeserializeOwned;
use serde::Serialize;

use grc_types::{
    Audit, AuditEvidence, AuditFinding, Control, Entity, Evidence, Framework, Milestone, Project,
    Risk, RiskAssessment, RiskAssessmentView, RiskTreatment, Task, User,
};

use crate::error::FieldErrors;
use crate::schema::EntityKind;
use crate::scoring;

pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    /// Shape returned to API clients.
    type View: Serialize + Send;

    fn view(entity: Entity<Self>) -> Self::View;

    fn validate(&self) -> Result<(), FieldErrors> {
        Ok(())
    }
}

/// Records that are returned exactly as stored.
macro_rules! stored_view {
    () => {
        type View = Entity<Self>;

        fn view(entity: Entity<Self>) -> Self::View {
            entity
        }
    };
}

fn check_date_order(
    start: chrono::NaiveDate,
    end: Option<chrono::NaiveDate>,
) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    if let Some(end) = end {
        if end < start {
            errors.add("end_date", "End date cannot be before start date.");
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

impl Record for User {
    const KIND: EntityKind = EntityKind::User;

    stored_view!();

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        if !self.email.contains('@') {
            errors.add("email", "Enter a valid email address.");
        }
        if self.username.chars().any(char::is_whitespace) {
            errors.add("username", "Username may not contain whitespace.");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Record for Framework {
    const KIND: EntityKind = EntityKind::Framework;

    stored_view!();
}

impl Record for Control {
    const KIND: EntityKind = EntityKind::Control;

    stored_view!();
}

impl Record for Evidence {
    const KIND: EntityKind = EntityKind::Evidence;

    stored_view!();
}

impl Record for Audit {
    const KIND: EntityKind = EntityKind::Audit;

    stored_view!();

    fn validate(&self) -> Result<(), FieldErrors> {
        check_date_order(self.start_date, Some(self.end_date))
    }
}

impl Record for AuditFinding {
    const KIND: EntityKind = EntityKind::AuditFinding;

    stored_view!();
}

impl Record for AuditEvidence {
    const KIND: EntityKind = EntityKind::AuditEvidence;

    stored_view!();
}

impl Record for Risk {
    const KIND: EntityKind = EntityKind::Risk;

    stored_view!();
}

impl Record for RiskAssessment {
    const KIND: EntityKind = EntityKind::RiskAssessment;

    type View = RiskAssessmentView;

    /// Attaches the band, recomputed on every read.
    fn view(entity: Entity<Self>) -> Self::View {
        let score = scoring::assess(entity.record.impact, entity.record.likelihood);
        RiskAssessmentView {
            assessment: entity,
            risk_score: score.score,
            risk_level: score.level,
        }
    }
}

impl Record for RiskTreatment {
    const KIND: EntityKind = EntityKind::RiskTreatment;

    stored_view!();
}

impl Record for Project {
    const KIND: EntityKind = EntityKind::Project;

    stored_view!();

    fn validate(&self) -> Result<(), FieldErrors> {
        check_date_order(self.start_date, self.end_date)
    }
}

impl Record for Task {
    const KIND: EntityKind = EntityKind::Task;

    stored_view!();
}

impl Record for Milestone {
    const KIND: EntityKind = EntityKind::Milestone;

    stored_view!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono::Utc;
    use grc_types::{AssessmentStatus, AuditStatus, AuditType, Impact, Likelihood, ProjectStatus, RiskLevel};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn audit(start: NaiveDate, end: NaiveDate) -> Audit {
        Audit {
            title: "ISO 27001 surveillance".into(),
            description: "Annual".into(),
            audit_type: AuditType::Compliance,
            status: AuditStatus::Planned,
            start_date: start,
            end_date: end,
            lead_auditor: 1,
            auditors: vec![],
            controls: vec![],
            created_by: 1,
        }
    }

    #[test]
    fn audit_end_before_start_is_rejected() {
        let errors = audit(date(2024, 5, 2), date(2024, 5, 1)).validate().unwrap_err();
        assert!(errors.contains("end_date"));
    }

    #[test]
    fn audit_same_day_is_fine() {
        assert!(audit(date(2024, 5, 1), date(2024, 5, 1)).validate().is_ok());
    }

    #[test]
    fn open_ended_project_is_fine() {
        let project = Project {
            title: "SOC 2 readiness".into(),
            description: String::new(),
            status: ProjectStatus::Planning,
            start_date: date(2024, 1, 1),
            end_date: None,
            project_manager: None,
        };
        assert!(project.validate().is_ok());
    }

    #[test]
    fn user_email_needs_at_sign() {
        let user = User {
            username: "alice".into(),
            email: "alice.example.com".into(),
            full_name: String::new(),
            is_active: true,
        };
        assert!(user.validate().unwrap_err().contains("email"));
    }

    #[test]
    fn assessment_view_carries_derived_band() {
        let entity = Entity {
            id: 4,
            record: RiskAssessment {
                risk: 1,
                impact: Impact::High,
                likelihood: Likelihood::Certain,
                mitigation_plan: "segment network".into(),
                status: AssessmentStatus::Open,
                assigned_to: None,
                created_by: 1,
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let view = RiskAssessment::view(entity);
        assert_eq!(view.risk_score, 15);
        assert_eq!(view.risk_level, RiskLevel::Critical);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["risk_level"], "CRITICAL");
        assert_eq!(json["impact"], "HIGH");
        assert_eq!(json["id"], 4);
    }
}
