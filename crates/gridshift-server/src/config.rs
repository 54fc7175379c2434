//! Environment-variable configuration, read once at startup: parse each
//! `VAR`, or fall back to its `Default` value.

use std::env;

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub allowed_origins: Vec<String>,
    pub log_level: String,
    pub log_dir: Option<String>,
    pub demo_mode: bool,
    pub demo_deterministic: bool,
    pub demo_seed: u64,
    pub gnn_enabled: bool,
    pub carbon_enabled: bool,
    pub topology_fallback: bool,
    pub explainer_enabled: bool,
    pub database_url: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        Self {
            bind_addr: env_string("BIND_ADDR", "127.0.0.1:8080"),
            allowed_origins,
            log_level: env_string("LOG_LEVEL", "info"),
            log_dir: env::var("LOG_DIR").ok(),
            demo_mode: env_bool("DEMO_MODE", false),
            demo_deterministic: env_bool("DEMO_DETERMINISTIC", true),
            demo_seed: env_u64("DEMO_SEED", 42),
            gnn_enabled: env_bool("GNN_ENABLED", false),
            carbon_enabled: env_bool("CARBON_ENABLED", true),
            topology_fallback: env_bool("TOPOLOGY_FALLBACK", true),
            explainer_enabled: env_bool("EXPLAINER_ENABLED", true),
            database_url: env::var("DATABASE_URL").ok(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            allowed_origins: Vec::new(),
            log_level: "info".to_string(),
            log_dir: None,
            demo_mode: false,
            demo_deterministic: true,
            demo_seed: 42,
            gnn_enabled: false,
            carbon_enabled: true,
            topology_fallback: true,
            explainer_enabled: true,
            database_url: None,
        }
    }
}
