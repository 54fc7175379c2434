//! Core physics, planning, and trace engine for a data-center power-shift
//! safety gate: a thermal twin, a battery-aging model, a ramp planner that
//! binary-searches for the largest safe power shift, and the bounded trace
//! ring / KPI roll-ups used to summarize decisions over time.
//!
//! Everything in this crate is synchronous and side-effect free; the
//! server crate owns the tick loop, HTTP surface, and persistence that
//! wrap it.

pub mod aging;
pub mod contracts;
pub mod decision;
pub mod error;
pub mod planner;
pub mod scenario;
pub mod telemetry;
pub mod thermal;
pub mod topology;
pub mod trace;

pub use decision::{confidence_heuristic, DecisionRecord, HeadroomSource};
pub use error::GridShiftError;
pub use planner::{plan_ramp, Component, Phase, RampPlan, RampPlanStep, Severity, Status, TraceEvent};
pub use thermal::{Prediction, ThermalConfig, ThermalState};
