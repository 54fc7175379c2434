//! Deterministic post-mortem explanation for a decision record. No LLM
//! dependency: the markdown is a pure transform over `DecisionRecord`
//! fields, as this workspace's decision path never needs a generative
//! model to describe what it already knows.

use gridshift_core::decision::DecisionRecord;
use gridshift_core::planner::Status;

pub fn explain_decision(record: &DecisionRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Decision `{}`\n\n", record.decision_id));
    out.push_str(&format!("- Requested: **{:.1} kW**\n", record.requested_delta_p_kw));
    out.push_str(&format!("- Approved: **{:.1} kW**\n", record.approved_delta_p_kw));
    out.push_str(&format!("- Grid headroom used: {:.1} kW (source: {:?})\n", record.grid_headroom_kw, record.headroom_source));
    out.push_str(&format!("- Confidence: {:.2}\n", record.confidence));

    if record.blocked {
        out.push_str(&format!(
            "\n**Blocked**: {}",
            record.reason
        ));
        if let Some(component) = record.primary_constraint {
            out.push_str(&format!(" (primary constraint: {:?})", component));
        }
        out.push('\n');
    } else {
        out.push_str("\n**Approved**: no blocking constraint was hit.\n");
    }

    let blocked_events: Vec<_> = record
        .trace
        .iter()
        .filter(|e| e.status == Status::Blocked)
        .collect();
    if !blocked_events.is_empty() {
        out.push_str("\n## Blocked rule evaluations\n\n");
        for event in blocked_events {
            out.push_str(&format!("- `{}`: {}\n", event.rule_id, event.message));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridshift_core::decision::HeadroomSource;
    use gridshift_core::planner::RampPlan;
    use chrono::Utc;

    fn sample_record(blocked: bool) -> DecisionRecord {
        DecisionRecord {
            ts: Utc::now(),
            decision_id: "abc123".to_string(),
            requested_delta_p_kw: 500.0,
            approved_delta_p_kw: if blocked { 0.0 } else { 500.0 },
            blocked,
            reason: if blocked { "GRID_HEADROOM_ZERO".to_string() } else { "APPROVED".to_string() },
            primary_constraint: None,
            headroom_source: HeadroomSource::Manual,
            grid_headroom_kw: 0.0,
            confidence: 0.4,
            plan: RampPlan {
                requested_delta_p_kw: 500.0,
                approved_delta_p_kw: 0.0,
                blocked,
                reason: "GRID_HEADROOM_ZERO".to_string(),
                primary_constraint: None,
                constraint_value: None,
                constraint_threshold: None,
                steps: Vec::new(),
            },
            trace: Vec::new(),
        }
    }

    #[test]
    fn explain_is_deterministic() {
        let record = sample_record(true);
        assert_eq!(explain_decision(&record), explain_decision(&record));
    }

    #[test]
    fn blocked_decision_mentions_blocked() {
        let record = sample_record(true);
        let text = explain_decision(&record);
        assert!(text.contains("Blocked"));
    }

    #[test]
    fn approved_decision_mentions_approved() {
        let record = sample_record(false);
        let text = explain_decision(&record);
        assert!(text.contains("Approved"));
    }
}
