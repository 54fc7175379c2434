//! Arrhenius-style battery capacity-loss increment (C2).
//!
//! Not a persistent state variable: callers accumulate the per-step
//! increment into a per-decision budget (see [`crate::planner`]).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryAgingConfig {
    /// Activation energy, J/mol.
    pub ea_j_per_mol: f64,
    /// Gas constant, J/(mol*K).
    pub r_gas_j_per_mol_k: f64,
    /// Overall scale factor.
    pub k_aging: f64,
    /// Maximum cumulative capacity-loss fraction allowed per single decision.
    pub max_cap_loss_frac_per_decision: f64,
    /// Aging rate saturates above this temperature, °C.
    pub max_temp_for_aging_c: f64,
}

impl Default for BatteryAgingConfig {
    fn default() -> Self {
        Self {
            ea_j_per_mol: 20_000.0,
            r_gas_j_per_mol_k: 8.314,
            k_aging: 1e-7,
            max_cap_loss_frac_per_decision: 5e-4,
            max_temp_for_aging_c: 45.0,
        }
    }
}

const KELVIN_OFFSET: f64 = 273.15;

/// `Δcap_loss = k_aging * exp(-Ea / (R * T_k)) * max(0, throughput) * dt`, `>= 0`.
pub fn increment(cfg: &BatteryAgingConfig, t_c: f64, throughput_kw: f64, dt_s: f64) -> f64 {
    let t_k = t_c.min(cfg.max_temp_for_aging_c) + KELVIN_OFFSET;
    let factor = (-cfg.ea_j_per_mol / (cfg.r_gas_j_per_mol_k * t_k)).exp();
    cfg.k_aging * factor * throughput_kw.max(0.0) * dt_s
}
