//! Uniform node model for ground stations, sea stations, and satellites.
//!
//! Resource pools are guarded per-node so allocation/release is safe to call
//! from the single-writer routing plane while readers (scan endpoints,
//! observation building) take the same short lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::geo::{self, Cartesian, DistanceMode, OrbitParams, Position};

/// The four node kinds the network can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    GroundStation,
    SeaStation,
    Leo,
    Geo,
}

impl NodeKind {
    /// Sort priority used for neighbour enumeration ordering (GS, SS, sat).
    pub fn priority(&self) -> u8 {
        match self {
            NodeKind::GroundStation => 1,
            NodeKind::SeaStation => 2,
            NodeKind::Leo | NodeKind::Geo => 3,
        }
    }

    pub fn is_satellite(&self) -> bool {
        matches!(self, NodeKind::Leo | NodeKind::Geo)
    }

    pub fn is_ground_station(&self) -> bool {
        matches!(self, NodeKind::GroundStation)
    }

    /// Wire name used by the `/nodes`/`/allnodes` HTTP surface, matching the
    /// original system's `typename` strings.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::GroundStation => "groundstation",
            NodeKind::SeaStation => "seastation",
            NodeKind::Leo | NodeKind::Geo => "satellite",
        }
    }
}

/// Resource pool keys. Not every kind carries every key: GS carries
/// uplink/downlink/cpu/power; SS and satellites carry uplink/downlink/isl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    Uplink,
    Downlink,
    Cpu,
    Power,
    Isl,
}

impl ResourceKey {
    pub fn name(&self) -> &'static str {
        match self {
            ResourceKey::Uplink => "uplink",
            ResourceKey::Downlink => "downlink",
            ResourceKey::Cpu => "cpu",
            ResourceKey::Power => "power",
            ResourceKey::Isl => "isl",
        }
    }

    pub fn keys_for(kind: NodeKind) -> &'static [ResourceKey] {
        match kind {
            NodeKind::GroundStation => {
                &[ResourceKey::Uplink, ResourceKey::Downlink, ResourceKey::Cpu, ResourceKey::Power]
            }
            NodeKind::SeaStation | NodeKind::Leo | NodeKind::Geo => {
                &[ResourceKey::Uplink, ResourceKey::Downlink, ResourceKey::Isl]
            }
        }
    }
}

/// Per-node resource accounting: total pool and committed usage, one mutex
/// guarding both so `0 <= used <= total` never observably breaks.
#[derive(Debug, Default)]
pub struct ResourcePool {
    inner: Mutex<ResourcePoolInner>,
}

#[derive(Debug, Default, Clone)]
struct ResourcePoolInner {
    total: HashMap<ResourceKey, f64>,
    used: HashMap<ResourceKey, f64>,
}

impl ResourcePool {
    pub fn new(total: HashMap<ResourceKey, f64>) -> Self {
        Self { inner: Mutex::new(ResourcePoolInner { total, used: HashMap::new() }) }
    }

    pub fn total(&self, key: ResourceKey) -> f64 {
        *self.inner.lock().total.get(&key).unwrap_or(&0.0)
    }

    pub fn used(&self, key: ResourceKey) -> f64 {
        *self.inner.lock().used.get(&key).unwrap_or(&0.0)
    }

    pub fn free_raw(&self, key: ResourceKey) -> f64 {
        let g = self.inner.lock();
        let total = *g.total.get(&key).unwrap_or(&0.0);
        let used = *g.used.get(&key).unwrap_or(&0.0);
        (total - used).max(0.0)
    }

    /// Admission-capped free amount: `max(0, total * cap - used)`.
    pub fn free_capped(&self, key: ResourceKey, cap: f64) -> f64 {
        let g = self.inner.lock();
        let total = *g.total.get(&key).unwrap_or(&0.0);
        let used = *g.used.get(&key).unwrap_or(&0.0);
        (total * cap - used).max(0.0)
    }

    /// Mean utilisation across every key this pool carries.
    pub fn mean_usage(&self) -> f64 {
        let g = self.inner.lock();
        if g.total.is_empty() {
            return 0.0;
        }
        let sum: f64 = g
            .total
            .iter()
            .map(|(k, total)| {
                if *total <= 0.0 {
                    0.0
                } else {
                    g.used.get(k).copied().unwrap_or(0.0) / total
                }
            })
            .sum();
        sum / g.total.len() as f64
    }

    pub fn allocate(&self, amounts: &[(ResourceKey, f64)]) -> Result<()> {
        let mut g = self.inner.lock();
        for (key, amount) in amounts {
            let total = *g.total.get(key).unwrap_or(&0.0);
            let used = g.used.get(key).copied().unwrap_or(0.0);
            if used + amount > total + 1e-9 {
                return Err(Error::CommitFailure {
                    node_id: String::new(),
                    resource: key.name().to_string(),
                });
            }
        }
        for (key, amount) in amounts {
            *g.used.entry(*key).or_insert(0.0) += amount;
        }
        Ok(())
    }

    pub fn release(&self, amounts: &[(ResourceKey, f64)]) {
        let mut g = self.inner.lock();
        for (key, amount) in amounts {
            if let Some(used) = g.used.get_mut(key) {
                *used = (*used - amount).max(0.0);
            }
        }
    }
}

/// Orbital state carried only by satellites. GEO satellites keep `orbit` for
/// completeness but are never propagated: their ground track is fixed.
#[derive(Debug)]
pub struct OrbitState {
    pub orbit: OrbitParams,
    pub last_theta: Mutex<f64>,
    /// Seconds since an arbitrary epoch; monotonically non-decreasing as
    /// `propagate_to` is called.
    pub last_update_s: Mutex<f64>,
    /// Seconds since an arbitrary epoch of the last persisted position.
    pub last_persist_s: Mutex<f64>,
    pub last_position: Mutex<Position>,
}

/// A single network node: ground station, sea station, or satellite.
#[derive(Debug)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub position: Mutex<Position>,
    pub resources: ResourcePool,
    pub priority: u8,
    /// GS/SS coverage disc radius; `None` for satellites.
    pub coverage_radius_km: Option<f64>,
    /// Satellite orbital state; `None` for GS/SS.
    pub orbit_state: Option<OrbitState>,
    /// Bumped on every resource mutation; used by the observation builder's
    /// "mean usage" feature without re-locking the pool repeatedly.
    pub version: AtomicU64,
}

/// Pure connectivity predicate, parameterised on an explicit position
/// rather than a live `Node` so it can be evaluated against a propagated
/// (isolated-copy) position without mutating anything.
#[allow(clippy::too_many_arguments)]
fn can_connect_at(
    kind: NodeKind,
    self_pos: Position,
    coverage_radius_km: Option<f64>,
    peer_pos: Position,
    peer_is_sat: bool,
    earth_radius_m: f64,
    leo_elev_min_deg: f64,
    geo_elev_min_deg: f64,
) -> bool {
    match kind {
        NodeKind::GroundStation | NodeKind::SeaStation => {
            if peer_is_sat {
                return false;
            }
            let radius_km = coverage_radius_km.unwrap_or(0.0);
            let dist_km = geo::distance(self_pos, peer_pos, DistanceMode::Surface, earth_radius_m) / 1000.0;
            dist_km <= radius_km
        }
        NodeKind::Leo | NodeKind::Geo => {
            let self_cart = geo::to_cartesian(self_pos, earth_radius_m);
            let peer_cart = geo::to_cartesian(peer_pos, earth_radius_m);
            if peer_is_sat {
                geo::min_distance_segment_to_origin(self_cart, peer_cart) > earth_radius_m
            } else {
                let min_elev = if kind == NodeKind::Leo { leo_elev_min_deg } else { geo_elev_min_deg };
                geo::elevation_angle_deg(peer_cart, self_cart) >= min_elev
            }
        }
    }
}

impl Node {
    pub fn new_ground_or_sea(
        id: impl Into<String>,
        kind: NodeKind,
        position: Position,
        total: HashMap<ResourceKey, f64>,
        coverage_radius_km: f64,
    ) -> Self {
        assert!(!kind.is_satellite());
        Self {
            id: id.into(),
            kind,
            position: Mutex::new(position),
            resources: ResourcePool::new(total),
            priority: kind.priority(),
            coverage_radius_km: Some(coverage_radius_km),
            orbit_state: None,
            version: AtomicU64::new(0),
        }
    }

    pub fn new_satellite(
        id: impl Into<String>,
        kind: NodeKind,
        position: Position,
        total: HashMap<ResourceKey, f64>,
        orbit: OrbitParams,
        last_theta: f64,
    ) -> Self {
        assert!(kind.is_satellite());
        Self {
            id: id.into(),
            kind,
            position: Mutex::new(position),
            resources: ResourcePool::new(total),
            priority: kind.priority(),
            coverage_radius_km: None,
            orbit_state: Some(OrbitState {
                orbit,
                last_theta: Mutex::new(last_theta),
                last_update_s: Mutex::new(0.0),
                last_persist_s: Mutex::new(0.0),
                last_position: Mutex::new(position),
            }),
            version: AtomicU64::new(0),
        }
    }

    pub fn position(&self) -> Position {
        *self.position.lock()
    }

    pub fn cartesian(&self, earth_radius_m: f64) -> Cartesian {
        geo::to_cartesian(self.position(), earth_radius_m)
    }

    /// `groundstation` check. The historical original source also probed the
    /// unreachable misspelling `"ground_station"`; there is nothing to
    /// replicate here since `NodeKind` only ever spells it one way.
    pub fn is_gs(&self) -> bool {
        self.kind.is_ground_station()
    }

    pub fn get_total_resources(&self) -> HashMap<ResourceKey, f64> {
        ResourceKey::keys_for(self.kind)
            .iter()
            .map(|k| (*k, self.resources.total(*k)))
            .collect()
    }

    pub fn get_free_resources(&self, cap: f64) -> HashMap<ResourceKey, f64> {
        ResourceKey::keys_for(self.kind)
            .iter()
            .map(|k| (*k, self.resources.free_capped(*k, cap)))
            .collect()
    }

    pub fn get_mean_usage(&self) -> f64 {
        self.resources.mean_usage()
    }

    pub fn allocate_resource(&self, amounts: &[(ResourceKey, f64)]) -> Result<()> {
        self.resources.allocate(amounts).map_err(|e| match e {
            Error::CommitFailure { resource, .. } => {
                Error::CommitFailure { node_id: self.id.clone(), resource }
            }
            other => other,
        })?;
        self.version.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn release_resource(&self, amounts: &[(ResourceKey, f64)]) {
        self.resources.release(amounts);
        self.version.fetch_add(1, Ordering::Relaxed);
    }

    /// Propagate this satellite's position to `t_now_s`, subject to the
    /// minimum-update-interval gate (a no-op below the threshold). GEO
    /// satellites and ground/sea nodes are always no-ops.
    pub fn propagate_to(&self, t_now_s: f64, earth_radius_m: f64, min_update_interval_s: f64) {
        let Some(orbit_state) = &self.orbit_state else { return };
        if self.kind == NodeKind::Geo {
            return;
        }
        let mut last_update = orbit_state.last_update_s.lock();
        let dt = t_now_s - *last_update;
        if dt.abs() < min_update_interval_s {
            return;
        }
        let theta0 = *orbit_state.last_theta.lock();
        let alt_m = self.position().alt_m;
        let (theta, pos) = geo::propagate_circular_orbit(
            orbit_state.orbit,
            theta0,
            *last_update,
            t_now_s,
            alt_m,
            earth_radius_m,
        );
        *orbit_state.last_theta.lock() = theta;
        *last_update = t_now_s;
        *self.position.lock() = pos;
        *orbit_state.last_position.lock() = pos;
    }

    /// Whether enough time has passed since the last persisted position that
    /// a caller wiring in a real datastore should write it out. The crate
    /// itself never performs the write (the datastore is out of scope); it
    /// only tracks the gate and, when it trips, logs at `debug!`.
    pub fn should_persist(&self, t_now_s: f64, min_persist_interval_s: f64) -> bool {
        let Some(orbit_state) = &self.orbit_state else { return false };
        let last_persist = *orbit_state.last_persist_s.lock();
        if t_now_s - last_persist >= min_persist_interval_s {
            *orbit_state.last_persist_s.lock() = t_now_s;
            tracing::debug!(node_id = %self.id, "satellite position persist gate tripped");
            true
        } else {
            false
        }
    }

    /// Connectivity predicate between this node and a surface/air point.
    /// `peer_is_sat` indicates the other endpoint is itself a satellite
    /// (only meaningful for GS/SS, which can never connect to one).
    pub fn can_connect(
        &self,
        lat_deg: f64,
        lon_deg: f64,
        alt_m: f64,
        peer_is_sat: bool,
        earth_radius_m: f64,
        leo_elev_min_deg: f64,
        geo_elev_min_deg: f64,
    ) -> bool {
        can_connect_at(
            self.kind,
            self.position(),
            self.coverage_radius_km,
            Position::new(lat_deg, lon_deg, alt_m),
            peer_is_sat,
            earth_radius_m,
            leo_elev_min_deg,
            geo_elev_min_deg,
        )
    }

    /// The position this satellite would occupy at `t_target_s`, computed on
    /// an isolated copy of its orbital state — reads `last_theta`/
    /// `last_update_s` but never writes them, so the main record (and any
    /// concurrent reader of it) is untouched. GS/SS and GEO nodes return
    /// their current (fixed) position.
    pub fn propagated_position_at(&self, t_target_s: f64, earth_radius_m: f64) -> Position {
        let Some(orbit_state) = &self.orbit_state else { return self.position() };
        if self.kind == NodeKind::Geo {
            return self.position();
        }
        let theta0 = *orbit_state.last_theta.lock();
        let t0 = *orbit_state.last_update_s.lock();
        let alt_m = self.position().alt_m;
        let (_, pos) = geo::propagate_circular_orbit(orbit_state.orbit, theta0, t0, t_target_s, alt_m, earth_radius_m);
        pos
    }

    /// Estimate how long (seconds, capped at `max_time_s`) `self` and `peer`
    /// remain mutually connectable starting at `t_now_s`, propagating both
    /// endpoints (on isolated copies — see [`Node::propagated_position_at`])
    /// forward by the search offset.
    pub fn estimate_visible_time(
        &self,
        peer: &Node,
        t_now_s: f64,
        max_time_s: f64,
        earth_radius_m: f64,
        leo_elev_min_deg: f64,
        geo_elev_min_deg: f64,
    ) -> f64 {
        geo::estimate_visible_time(max_time_s, |m| {
            let self_pos = self.propagated_position_at(t_now_s + m, earth_radius_m);
            let peer_pos = peer.propagated_position_at(t_now_s + m, earth_radius_m);
            let self_to_peer = can_connect_at(
                self.kind, self_pos, self.coverage_radius_km, peer_pos, peer.kind.is_satellite(),
                earth_radius_m, leo_elev_min_deg, geo_elev_min_deg,
            );
            if self_to_peer {
                return true;
            }
            can_connect_at(
                peer.kind, peer_pos, peer.coverage_radius_km, self_pos, self.kind.is_satellite(),
                earth_radius_m, leo_elev_min_deg, geo_elev_min_deg,
            )
        })
    }

    /// Both directions evaluated, accepting if either side reports
    /// connectivity: GS coverage discs and satellite elevation-angle tests
    /// are not symmetric in general.
    pub fn mutually_connectable(
        a: &Node,
        b: &Node,
        earth_radius_m: f64,
        leo_elev_min_deg: f64,
        geo_elev_min_deg: f64,
    ) -> bool {
        let pb = b.position();
        let pa = a.position();
        let a_to_b = a.can_connect(
            pb.lat_deg, pb.lon_deg, pb.alt_m, b.kind.is_satellite(),
            earth_radius_m, leo_elev_min_deg, geo_elev_min_deg,
        );
        if a_to_b {
            return true;
        }
        b.can_connect(
            pa.lat_deg, pa.lon_deg, pa.alt_m, a.kind.is_satellite(),
            earth_radius_m, leo_elev_min_deg, geo_elev_min_deg,
        )
    }
}
