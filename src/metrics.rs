//! Risk register rollup.
//!
//! Computed from a full scan of the current risks on every call.

use grc_types::{Entity, RecentRisk, Risk, RiskMetrics, RiskSeverity, RiskStatus};

const RECENT_LIMIT: usize = 3;

pub fn risk_metrics(risks: &[Entity<Risk>]) -> RiskMetrics {
    let mut metrics = RiskMetrics {
        total: risks.len(),
        ..RiskMetrics::default()
    };

    for risk in risks {
        match risk.record.severity {
            RiskSeverity::Critical => metrics.critical += 1,
            RiskSeverity::High => metrics.high += 1,
            RiskSeverity::Medium => metrics.medium += 1,
            RiskSeverity::Low => metrics.low += 1,
        }
        let counts = &mut metrics.status_counts;
        match risk.record.status {
            RiskStatus::Open => counts.open += 1,
            RiskStatus::Mitigated => counts.mitigated += 1,
            RiskStatus::Accepted => counts.accepted += 1,
            RiskStatus::Transferred => counts.transferred += 1,
            RiskStatus::Closed => counts.closed += 1,
        }
    }
    metrics.open_risks = metrics.status_counts.open;
    metrics.closed_risks = metrics.status_counts.closed;

    let mut newest: Vec<&Entity<Risk>> = risks.iter().collect();
    newest.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    metrics.recent_risks = newest
        .into_iter()
        .take(RECENT_LIMIT)
        .map(|risk| RecentRisk {
            id: risk.id,
            title: risk.record.title.clone(),
            severity: risk.record.severity,
        })
        .collect();

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn risk(id: i64, minutes: i64, severity: RiskSeverity, status: RiskStatus) -> Entity<Risk> {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes);
        Entity {
            id,
            record: Risk {
                title: format!("risk {id}"),
                description: String::new(),
                category: "IT".into(),
                severity,
                status,
            },
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn empty_register() {
        let metrics = risk_metrics(&[]);
        assert_eq!(metrics, RiskMetrics::default());
    }

    #[test]
    fn counts_match_manual_tally() {
        let risks = vec![
            risk(1, 0, RiskSeverity::Critical, RiskStatus::Open),
            risk(2, 1, RiskSeverity::High, RiskStatus::Open),
            risk(3, 2, RiskSeverity::High, RiskStatus::Mitigated),
            risk(4, 3, RiskSeverity::Low, RiskStatus::Closed),
            risk(5, 4, RiskSeverity::Medium, RiskStatus::Transferred),
            risk(6, 5, RiskSeverity::Medium, RiskStatus::Accepted),
        ];
        let m = risk_metrics(&risks);
        assert_eq!((m.critical, m.high, m.medium, m.low), (1, 2, 2, 1));
        assert_eq!(m.critical + m.high + m.medium + m.low, m.total);
        assert_eq!(m.open_risks, 2);
        assert_eq!(m.closed_risks, 1);
        let c = &m.status_counts;
        assert_eq!(c.open + c.mitigated + c.accepted + c.transferred + c.closed, 6);
        let recent: Vec<i64> = m.recent_risks.iter().map(|r| r.id).collect();
        assert_eq!(recent, [6, 5, 4]);
    }

    #[test]
    fn recent_ties_break_on_higher_id() {
        let risks = vec![
            risk(1, 0, RiskSeverity::Low, RiskStatus::Open),
            risk(2, 0, RiskSeverity::Low, RiskStatus::Open),
        ];
        let recent: Vec<i64> = risk_metrics(&risks).recent_risks.iter().map(|r| r.id).collect();
        assert_eq!(recent, [2, 1]);
    }
}
