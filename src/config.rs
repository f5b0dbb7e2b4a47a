//! Runtime configuration for the SAGIN routing and admission controller.
//!
//! A top-level `Config` composed of per-concern sections, loaded from
//! defaults and then overridden by environment variables via
//! [`Config::load`].

use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{Error, Result};

/// Top-level configuration, composed of per-concern sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub http: HttpConfig,
    pub topology: TopologyConfig,
    pub routing: RoutingConfig,
    pub stats: StatsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
            http: HttpConfig::default(),
            topology: TopologyConfig::default(),
            routing: RoutingConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}

impl Config {
    /// Build a configuration from defaults, then apply `SAGIN_*` environment
    /// overrides. Never fails on a missing variable; fails only if a
    /// present variable cannot be parsed as its target type.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();

        if let Ok(v) = env::var("SAGIN_LOG_LEVEL") {
            cfg.app.log_level = v;
        }
        if let Ok(v) = env::var("SAGIN_WORKER_THREADS") {
            cfg.app.worker_threads = v
                .parse()
                .map_err(|_| Error::Config(format!("SAGIN_WORKER_THREADS: invalid value {v}")))?;
        }
        if let Ok(v) = env::var("SAGIN_LISTEN_ADDR") {
            cfg.http.listen_addr = v;
        }
        if let Ok(v) = env::var("SAGIN_LISTEN_PORT") {
            cfg.http.listen_port = v
                .parse()
                .map_err(|_| Error::Config(format!("SAGIN_LISTEN_PORT: invalid value {v}")))?;
        }
        if let Ok(v) = env::var("SAGIN_TOPOLOGY_PATH") {
            cfg.topology.snapshot_path = v;
        }
        if let Ok(v) = env::var("SAGIN_STATS_LOG_PATH") {
            cfg.stats.log_path = v;
        }

        Ok(cfg)
    }
}

/// Process-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub log_level: String,
    /// Tokio worker thread count for the runtime hosting the routing worker
    /// and the HTTP adapter.
    pub worker_threads: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            worker_threads: 4,
        }
    }
}

/// The thin HTTP adapter's listen settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub listen_addr: String,
    pub listen_port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8080,
        }
    }
}

/// Where the topology snapshot is loaded from at startup. Stands in for
/// the out-of-scope topology datastore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    pub snapshot_path: String,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            snapshot_path: "topology.json".to_string(),
        }
    }
}

/// Every numeric constant the routing environment and planner treat as
/// contractual, exposed here so they can be tuned without recompiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    // Geometry / link model
    pub earth_radius_m: f64,
    pub speed_of_light_m_s: f64,
    pub leo_elevation_min_deg: f64,
    pub geo_elevation_min_deg: f64,
    pub min_propagation_interval_s: f64,
    pub min_persist_interval_s: f64,
    pub visibility_search_max_time_s: f64,

    // Admission
    pub admission_cap_default: f64,
    pub admission_cap_emergency: f64,
    pub neighbour_feasibility_floor: f64,

    // Environment / reward
    pub max_step: u32,
    pub base_reward: f64,
    pub hop_penalty: f64,
    pub usage_pool: f64,
    pub qos_pool: f64,
    pub timeout_pool: f64,
    pub finished_pool: f64,
    pub gs_proximity_bonus: f64,
    pub special_bonus: f64,
    pub invalid_action_penalty: f64,
    pub dead_end_penalty: f64,
    pub step_limit_penalty: f64,
    pub norm_base: f64,
    pub inter_step_norm: f64,

    // Spatial index
    pub spatial_rebuild_threshold: u64,
    pub spatial_max_stale_secs: u64,
    pub nearby_radius_km: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            earth_radius_m: 6_371_000.0,
            speed_of_light_m_s: 3.0e8,
            leo_elevation_min_deg: 7.5,
            geo_elevation_min_deg: 5.0,
            min_propagation_interval_s: 1.0,
            min_persist_interval_s: 2000.0,
            visibility_search_max_time_s: 7200.0,

            admission_cap_default: 0.90,
            admission_cap_emergency: 0.95,
            neighbour_feasibility_floor: 0.5,

            max_step: 15,
            base_reward: 5.0,
            hop_penalty: 5.0,
            usage_pool: 10.0,
            qos_pool: 55.0,
            timeout_pool: 8.0,
            finished_pool: 42.0,
            gs_proximity_bonus: 16.0,
            special_bonus: 8.0,
            invalid_action_penalty: -80.0,
            dead_end_penalty: -120.0,
            step_limit_penalty: -100.0,
            norm_base: 70.0,
            inter_step_norm: 100.0,

            spatial_rebuild_threshold: 64,
            spatial_max_stale_secs: 30,
            nearby_radius_km: 2500.0,
        }
    }
}

/// Statistics aggregator persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    pub log_path: String,
    pub batch_size: usize,
    pub time_series_window: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            log_path: "sagin_stats.csv".to_string(),
            batch_size: 50,
            time_series_window: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_contract() {
        let cfg = RoutingConfig::default();
        assert_eq!(cfg.max_step, 15);
        assert_eq!(cfg.admission_cap_emergency, 0.95);
        assert_eq!(cfg.dead_end_penalty, -120.0);
    }

    #[test]
    fn load_applies_env_overrides() {
        env::set_var("SAGIN_LISTEN_PORT", "9191");
        let cfg = Config::load().unwrap();
        assert_eq!(cfg.http.listen_port, 9191);
        env::remove_var("SAGIN_LISTEN_PORT");
    }
}
