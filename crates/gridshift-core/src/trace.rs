//! Bounded trace ring and KPI roll-ups (C6).
//!
//! The ring keeps the most recent events only; capacity is fixed at
//! construction and old events are dropped from the front once it fills, the
//! same pattern the server's history buffers use elsewhere in this
//! workspace.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::planner::{rule_ids, Component, Phase, Status, TraceEvent};

pub const DEFAULT_TRACE_CAPACITY: usize = 600;

#[derive(Debug, Clone)]
pub struct TraceRing {
    capacity: usize,
    events: VecDeque<TraceEvent>,
}

impl TraceRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push_all(&mut self, new_events: impl IntoIterator<Item = TraceEvent>) {
        for event in new_events {
            if self.events.len() >= self.capacity {
                self.events.pop_front();
            }
            self.events.push_back(event);
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Most recent `n` events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<TraceEvent> {
        let len = self.events.len();
        let skip = len.saturating_sub(n);
        self.events.iter().skip(skip).cloned().collect()
    }

    pub fn all(&self) -> Vec<TraceEvent> {
        self.events.iter().cloned().collect()
    }
}

impl Default for TraceRing {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_CAPACITY)
    }
}

/// Windowed KPI roll-up over final-phase trace events, grouped by
/// `decision_id`. Each decision contributes exactly one selection event
/// (`rule_ids::APPROVED_DELTA_SELECTED`) carrying its outcome; everything
/// else in the window is supporting evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    pub window_s: i64,
    pub total_recent: usize,
    pub blocked_decisions_unique: usize,
    pub unsafe_actions_prevented_total: usize,
    pub by_component: BTreeMap<Component, usize>,
    pub by_rule: BTreeMap<String, usize>,
    pub blocked_rate_pct: f64,
    pub kwh_shifted: f64,
    pub money_saved: f64,
    pub co2_avoided: f64,
    pub sla_penalty: f64,
    pub jobs_on_time_pct: f64,
}

impl KpiSummary {
    fn empty(window_s: i64) -> Self {
        Self {
            window_s,
            total_recent: 0,
            blocked_decisions_unique: 0,
            unsafe_actions_prevented_total: 0,
            by_component: BTreeMap::new(),
            by_rule: BTreeMap::new(),
            blocked_rate_pct: 0.0,
            kwh_shifted: 0.0,
            money_saved: 0.0,
            co2_avoided: 0.0,
            sla_penalty: 0.0,
            jobs_on_time_pct: 100.0,
        }
    }
}

const PRICE_USD_PER_KWH: f64 = 0.15;
const CO2_KG_PER_KWH: f64 = 0.4;
const SLA_PENALTY_USD_PER_BLOCK: f64 = 500.0;
/// A decision's steps are spaced `dt_s` apart but the trace only carries the
/// selected step; 30s approximates a typical decision's commit interval.
const ASSUMED_COMMIT_INTERVAL_S: f64 = 30.0;

/// Rolls up final-phase trace events timestamped within `[now - window_s,
/// now]` into a [`KpiSummary`]. Returns a zeroed (100% on-time) summary for
/// a window with no decisions, rather than erroring: KPI endpoints stay
/// queryable before any decision has been made.
pub fn rollup(events: &[TraceEvent], window_s: i64, now: DateTime<Utc>) -> KpiSummary {
    let in_window: Vec<&TraceEvent> = events
        .iter()
        .filter(|e| e.phase == Phase::Final && (now - e.ts).num_seconds() <= window_s)
        .collect();

    let mut selections: BTreeMap<&str, &TraceEvent> = BTreeMap::new();
    for event in &in_window {
        if event.rule_id == rule_ids::APPROVED_DELTA_SELECTED {
            selections.insert(event.decision_id.as_str(), event);
        }
    }

    let total_recent = selections.len();
    if total_recent == 0 {
        return KpiSummary::empty(window_s);
    }

    let mut blocked_decisions_unique = 0usize;
    let mut unsafe_actions_prevented_total = 0usize;
    let mut kwh_shifted = 0.0f64;

    for event in selections.values() {
        let blocked = event.status == Status::Blocked;
        let proposed = event.proposed_delta_p_kw.unwrap_or(0.0);
        let approved = event.approved_delta_p_kw.unwrap_or(0.0);
        let clipped = approved.abs() + 1e-9 < proposed.abs();
        if blocked {
            blocked_decisions_unique += 1;
        }
        if blocked || clipped {
            unsafe_actions_prevented_total += 1;
        }
        kwh_shifted += approved * (ASSUMED_COMMIT_INTERVAL_S / 3600.0);
    }

    let mut by_component: BTreeMap<Component, usize> = BTreeMap::new();
    let mut by_rule: BTreeMap<String, usize> = BTreeMap::new();
    for event in &in_window {
        if event.status != Status::Blocked {
            continue;
        }
        if let Some(component) = event.component {
            *by_component.entry(component).or_insert(0) += 1;
        }
        *by_rule.entry(event.rule_id.clone()).or_insert(0) += 1;
    }

    let blocked_rate_pct = 100.0 * blocked_decisions_unique as f64 / total_recent as f64;

    KpiSummary {
        window_s,
        total_recent,
        blocked_decisions_unique,
        unsafe_actions_prevented_total,
        by_component,
        by_rule,
        blocked_rate_pct,
        kwh_shifted,
        money_saved: PRICE_USD_PER_KWH * kwh_shifted,
        co2_avoided: CO2_KG_PER_KWH * kwh_shifted,
        sla_penalty: SLA_PENALTY_USD_PER_BLOCK * blocked_decisions_unique as f64,
        jobs_on_time_pct: 100.0 - blocked_rate_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{Component, Phase, Severity, Status, TraceEvent};
    use chrono::Utc;

    fn dummy_event(rule_id: &str) -> TraceEvent {
        TraceEvent {
            ts: Utc::now(),
            decision_id: "d1".to_string(),
            phase: Phase::Final,
            component: Some(Component::Grid),
            rule_id: rule_id.to_string(),
            status: Status::Info,
            severity: Severity::Low,
            message: "test".to_string(),
            value: None,
            threshold: None,
            units: None,
            proposed_delta_p_kw: None,
            approved_delta_p_kw: None,
            rack_temp_c: None,
        }
    }

    fn selection_event(
        decision_id: &str,
        ts: DateTime<Utc>,
        blocked: bool,
        proposed: f64,
        approved: f64,
        component: Component,
    ) -> TraceEvent {
        TraceEvent {
            ts,
            decision_id: decision_id.to_string(),
            phase: Phase::Final,
            component: Some(component),
            rule_id: rule_ids::APPROVED_DELTA_SELECTED.to_string(),
            status: if blocked { Status::Blocked } else { Status::Allowed },
            severity: if blocked { Severity::Medium } else { Severity::Low },
            message: "selected".to_string(),
            value: None,
            threshold: None,
            units: None,
            proposed_delta_p_kw: Some(proposed),
            approved_delta_p_kw: Some(approved),
            rack_temp_c: Some(40.0),
        }
    }

    #[test]
    fn ring_evicts_oldest_beyond_capacity() {
        let mut ring = TraceRing::new(3);
        ring.push_all(vec![
            dummy_event("a"),
            dummy_event("b"),
            dummy_event("c"),
            dummy_event("d"),
        ]);
        let all = ring.all();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].rule_id, "b");
        assert_eq!(all[2].rule_id, "d");
    }

    #[test]
    fn rollup_on_empty_window_is_zeroed_not_error() {
        let summary = rollup(&[], 300, Utc::now());
        assert_eq!(summary.total_recent, 0);
        assert_eq!(summary.blocked_rate_pct, 0.0);
        assert_eq!(summary.jobs_on_time_pct, 100.0);
    }

    #[test]
    fn jobs_on_time_and_blocked_rate_sum_to_100() {
        let now = Utc::now();
        let events = vec![
            selection_event("d1", now, true, 500.0, 0.0, Component::Grid),
            selection_event("d2", now, false, 100.0, 100.0, Component::Grid),
            selection_event("d3", now, false, 300.0, 300.0, Component::Grid),
        ];
        let summary = rollup(&events, 300, now);
        assert_eq!(summary.total_recent, 3);
        assert_eq!(summary.blocked_decisions_unique, 1);
        assert!((summary.blocked_rate_pct - (100.0 / 3.0)).abs() < 1e-9);
        assert!((summary.jobs_on_time_pct + summary.blocked_rate_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn clipped_but_not_blocked_counts_as_unsafe_action_prevented() {
        let now = Utc::now();
        let events = vec![selection_event("d1", now, false, 500.0, 100.0, Component::Grid)];
        let summary = rollup(&events, 300, now);
        assert_eq!(summary.blocked_decisions_unique, 0);
        assert_eq!(summary.unsafe_actions_prevented_total, 1);
    }

    #[test]
    fn events_outside_window_are_excluded() {
        let now = Utc::now();
        let stale = now - chrono::Duration::seconds(9999);
        let events = vec![selection_event("d1", stale, true, 500.0, 0.0, Component::Grid)];
        let summary = rollup(&events, 300, now);
        assert_eq!(summary.total_recent, 0);
    }

    #[test]
    fn by_component_and_by_rule_count_blocked_final_events() {
        let now = Utc::now();
        let mut blocked_margin = dummy_event(rule_ids::THERMAL_MARGIN_TOO_THIN);
        blocked_margin.status = Status::Blocked;
        blocked_margin.component = Some(Component::Thermal);
        blocked_margin.ts = now;
        let events = vec![
            blocked_margin,
            selection_event("d1", now, true, 500.0, 0.0, Component::Thermal),
        ];
        let summary = rollup(&events, 300, now);
        assert_eq!(summary.by_component.get(&Component::Thermal), Some(&2));
        assert_eq!(summary.by_rule.get(rule_ids::THERMAL_MARGIN_TOO_THIN), Some(&1));
    }

    #[test]
    fn kwh_shifted_feeds_money_and_co2_formulas() {
        let now = Utc::now();
        let events = vec![selection_event("d1", now, false, 100.0, 100.0, Component::Grid)];
        let summary = rollup(&events, 300, now);
        let expected_kwh = 100.0 * (ASSUMED_COMMIT_INTERVAL_S / 3600.0);
        assert!((summary.kwh_shifted - expected_kwh).abs() < 1e-9);
        assert!((summary.money_saved - PRICE_USD_PER_KWH * expected_kwh).abs() < 1e-9);
        assert!((summary.co2_avoided - CO2_KG_PER_KWH * expected_kwh).abs() < 1e-9);
    }
}
