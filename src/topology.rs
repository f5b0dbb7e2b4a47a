//! Topology loading: the datastore itself is an external collaborator, so
//! this module only defines the snapshot shape a real loader must produce
//! and a JSON-file-backed implementation standing in for it at startup and
//! in tests.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::geo::{OrbitParams, Position};
use crate::network::NetworkRegistry;
use crate::node::{Node, NodeKind, ResourceKey};

#[derive(Debug, Deserialize)]
struct NodeRecord {
    id: String,
    lat: f64,
    lon: f64,
    alt: f64,
    #[serde(default)]
    uplink: f64,
    #[serde(default)]
    downlink: f64,
    #[serde(default)]
    cpu: f64,
    #[serde(default)]
    power: f64,
    #[serde(default)]
    isl: f64,
    #[serde(default)]
    coverage_radius_km: f64,
}

#[derive(Debug, Deserialize)]
struct SatelliteRecord {
    id: String,
    lat: f64,
    lon: f64,
    alt: f64,
    #[serde(default)]
    uplink: f64,
    #[serde(default)]
    downlink: f64,
    #[serde(default)]
    isl: f64,
    #[serde(default)]
    kind: String,
    orbit: OrbitRecord,
    #[serde(default)]
    orbit_state: OrbitStateRecord,
}

#[derive(Debug, Deserialize)]
struct OrbitRecord {
    period: f64,
    inclination: f64,
    raan: f64,
}

#[derive(Debug, Deserialize, Default)]
struct OrbitStateRecord {
    #[serde(default)]
    last_theta: f64,
}

/// The three collections a topology loader must supply.
#[derive(Debug, Deserialize)]
struct TopologySnapshot {
    #[serde(default)]
    groundstations: Vec<NodeRecord>,
    #[serde(default)]
    seastations: Vec<NodeRecord>,
    #[serde(default)]
    satellites: Vec<SatelliteRecord>,
}

fn gs_ss_pool(r: &NodeRecord, kind: NodeKind) -> HashMap<ResourceKey, f64> {
    match kind {
        NodeKind::GroundStation => HashMap::from([
            (ResourceKey::Uplink, r.uplink),
            (ResourceKey::Downlink, r.downlink),
            (ResourceKey::Cpu, r.cpu),
            (ResourceKey::Power, r.power),
        ]),
        _ => HashMap::from([
            (ResourceKey::Uplink, r.uplink),
            (ResourceKey::Downlink, r.downlink),
            (ResourceKey::Isl, r.isl),
        ]),
    }
}

/// Loads a topology into a fresh [`NetworkRegistry`]. The file-backed
/// implementation is this crate's stand-in for the out-of-scope datastore;
/// unknown JSON fields are ignored (`serde`'s default behaviour without
/// `deny_unknown_fields`).
pub trait TopologyLoader {
    fn load(&self) -> Result<Arc<NetworkRegistry>>;
}

pub struct JsonFileTopologyLoader {
    path: String,
    geo: crate::network::GeoParams,
}

impl JsonFileTopologyLoader {
    pub fn new(path: impl Into<String>, geo: crate::network::GeoParams) -> Self {
        Self { path: path.into(), geo }
    }
}

impl TopologyLoader for JsonFileTopologyLoader {
    fn load(&self) -> Result<Arc<NetworkRegistry>> {
        let path = Path::new(&self.path);
        let raw = fs::read_to_string(path).map_err(|source| Error::TopologyLoad {
            path: self.path.clone(),
            source,
        })?;
        let snapshot: TopologySnapshot = serde_json::from_str(&raw)?;

        let registry = NetworkRegistry::new(self.geo);
        for r in &snapshot.groundstations {
            let node = Node::new_ground_or_sea(
                r.id.clone(),
                NodeKind::GroundStation,
                Position::new(r.lat, r.lon, r.alt),
                gs_ss_pool(r, NodeKind::GroundStation),
                r.coverage_radius_km,
            );
            registry.add_node(Arc::new(node));
        }
        for r in &snapshot.seastations {
            let node = Node::new_ground_or_sea(
                r.id.clone(),
                NodeKind::SeaStation,
                Position::new(r.lat, r.lon, r.alt),
                gs_ss_pool(r, NodeKind::SeaStation),
                r.coverage_radius_km,
            );
            registry.add_node(Arc::new(node));
        }
        for r in &snapshot.satellites {
            let kind = if r.kind.eq_ignore_ascii_case("geo") { NodeKind::Geo } else { NodeKind::Leo };
            let pool = HashMap::from([
                (ResourceKey::Uplink, r.uplink),
                (ResourceKey::Downlink, r.downlink),
                (ResourceKey::Isl, r.isl),
            ]);
            let orbit = OrbitParams {
                period_s: r.orbit.period,
                inclination_deg: r.orbit.inclination,
                raan_deg: r.orbit.raan,
            };
            let node = Node::new_satellite(
                r.id.clone(),
                kind,
                Position::new(r.lat, r.lon, r.alt),
                pool,
                orbit,
                r.orbit_state.last_theta,
            );
            registry.add_node(Arc::new(node));
        }

        tracing::info!(
            path = %self.path,
            nodes = registry.len(),
            "topology loaded",
        );
        Ok(Arc::new(registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn unique_json_path() -> std::path::PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("sagin_topology_test_{n}.json"))
    }

    fn geo_params() -> crate::network::GeoParams {
        crate::network::GeoParams {
            earth_radius_m: 6_371_000.0,
            leo_elev_min_deg: 7.5,
            geo_elev_min_deg: 5.0,
            min_propagation_interval_s: 1.0,
        }
    }

    #[test]
    fn loads_all_three_collections() {
        let json = r#"{
            "groundstations": [{"id": "gs-1", "lat": 13.8, "lon": 100.55, "alt": 20.0, "uplink": 100, "downlink": 100, "cpu": 50, "power": 100, "coverage_radius_km": 200}],
            "seastations": [{"id": "ss-1", "lat": 10.0, "lon": 90.0, "alt": 0.0, "uplink": 50, "downlink": 50, "isl": 20, "coverage_radius_km": 100}],
            "satellites": [{"id": "leo-1", "lat": 0.0, "lon": 0.0, "alt": 550000.0, "uplink": 80, "downlink": 80, "isl": 40, "kind": "leo", "orbit": {"period": 6000.0, "inclination": 53.0, "raan": 0.0}, "orbit_state": {"last_theta": 0.0}}]
        }"#;
        let path = unique_json_path();
        fs::write(&path, json).unwrap();

        let loader = JsonFileTopologyLoader::new(path.to_str().unwrap(), geo_params());
        let registry = loader.load().unwrap();
        assert_eq!(registry.len(), 3);
        assert!(registry.get_node("gs-1").is_some());
        assert!(registry.get_node("leo-1").is_some());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_topology_load_error() {
        let loader = JsonFileTopologyLoader::new("/nonexistent/path/topology.json", geo_params());
        let err = loader.load().unwrap_err();
        assert!(matches!(err, Error::TopologyLoad { .. }));
    }
}
