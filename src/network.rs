//! In-memory network registry: nodes indexed by id and by kind, neighbour
//! enumeration, and nearest-ground-station queries.
//!
//! `find_connectable_nodes` is a linear scan across the whole topology per
//! call: acceptable at the hundreds-of-nodes scale this system targets; a
//! coarse geographic pre-filter would be the natural next step for larger
//! fleets.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::geo::{self, DistanceMode, Position};
use crate::node::{Node, NodeKind};

/// Geometric constants the registry needs for connectivity checks, threaded
/// through rather than owned so the registry stays free of a `Config`
/// dependency.
#[derive(Debug, Clone, Copy)]
pub struct GeoParams {
    pub earth_radius_m: f64,
    pub leo_elev_min_deg: f64,
    pub geo_elev_min_deg: f64,
    pub min_propagation_interval_s: f64,
}

/// The live network: all nodes, indexed by id.
pub struct NetworkRegistry {
    nodes: DashMap<String, Arc<Node>>,
    geo: GeoParams,
}

impl NetworkRegistry {
    pub fn new(geo: GeoParams) -> Self {
        Self { nodes: DashMap::new(), geo }
    }

    pub fn add_node(&self, node: Arc<Node>) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn remove_node(&self, id: &str) -> Option<Arc<Node>> {
        self.nodes.remove(id).map(|(_, n)| n)
    }

    pub fn get_node(&self, id: &str) -> Option<Arc<Node>> {
        self.nodes.get(id).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn all_nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.iter().map(|e| e.value().clone()).collect()
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<Arc<Node>> {
        self.nodes.iter().filter(|e| e.value().kind == kind).map(|e| e.value().clone()).collect()
    }

    /// Propagate every satellite to `t_now_s` before any connectivity check
    /// that depends on position. Cheap no-op for nodes below the minimum
    /// update interval or for GS/SS/GEO.
    pub fn propagate_all(&self, t_now_s: f64) {
        for entry in self.nodes.iter() {
            entry.value().propagate_to(t_now_s, self.geo.earth_radius_m, self.geo.min_propagation_interval_s);
        }
    }

    fn sort_key(&self, node: &Node, from: Position) -> (u8, i64) {
        let d = geo::distance(node.position(), from, DistanceMode::Surface, self.geo.earth_radius_m);
        // millimetre-resolution integer key keeps the sort total and stable.
        (node.kind.priority(), (d * 1000.0) as i64)
    }

    /// Nodes connectable from another node, bidirectionally evaluated,
    /// excluding `from` itself, sorted by kind (GS, SS, satellite) then by
    /// ascending distance within each kind.
    pub fn find_connectable_nodes(&self, from: &Node) -> Vec<Arc<Node>> {
        let from_pos = from.position();
        let mut candidates: Vec<Arc<Node>> = self
            .nodes
            .iter()
            .filter(|e| e.key() != &from.id)
            .filter(|e| {
                Node::mutually_connectable(
                    from, e.value(), self.geo.earth_radius_m, self.geo.leo_elev_min_deg, self.geo.geo_elev_min_deg,
                )
            })
            .map(|e| e.value().clone())
            .collect();
        candidates.sort_by_key(|n| self.sort_key(n, from_pos));
        candidates
    }

    /// Nodes connectable from a free geographic point (the user's source
    /// location, or the synthetic `SOURCE_USER` seed in the planner).
    pub fn find_connectable_nodes_for_location(&self, lat_deg: f64, lon_deg: f64, alt_m: f64) -> Vec<Arc<Node>> {
        let loc = Position::new(lat_deg, lon_deg, alt_m);
        let mut candidates: Vec<Arc<Node>> = self
            .nodes
            .iter()
            .filter(|e| {
                e.value().can_connect(
                    lat_deg, lon_deg, alt_m, false,
                    self.geo.earth_radius_m, self.geo.leo_elev_min_deg, self.geo.geo_elev_min_deg,
                )
            })
            .map(|e| e.value().clone())
            .collect();
        candidates.sort_by_key(|n| self.sort_key(n, loc));
        candidates
    }

    /// Whether at least one node is connectable from the given location.
    /// Used by request synthesis to resample an unreachable source.
    pub fn check_neighbor_exist(&self, lat_deg: f64, lon_deg: f64, alt_m: f64) -> bool {
        self.nodes.iter().any(|e| {
            e.value().can_connect(
                lat_deg, lon_deg, alt_m, false,
                self.geo.earth_radius_m, self.geo.leo_elev_min_deg, self.geo.geo_elev_min_deg,
            )
        })
    }

    /// Great-circle distance from a node to the nearest ground station.
    pub fn distance_to_nearest_gs(&self, from: &Node) -> Option<f64> {
        self.distance_to_nearest_gs_from_location(from.position())
    }

    /// Great-circle distance from an arbitrary location to the nearest
    /// ground station.
    pub fn distance_to_nearest_gs_from_location(&self, from: Position) -> Option<f64> {
        self.nearest_gs_from_location(from).map(|(_, d)| d)
    }

    /// The nearest ground station and its distance from an arbitrary
    /// location, or `None` if the topology holds no ground stations.
    pub fn nearest_gs_from_location(&self, from: Position) -> Option<(Arc<Node>, f64)> {
        self.nodes
            .iter()
            .filter(|e| e.value().kind == NodeKind::GroundStation)
            .map(|e| {
                let d = geo::distance(e.value().position(), from, DistanceMode::Surface, self.geo.earth_radius_m);
                (e.value().clone(), d)
            })
            .fold(None, |acc: Option<(Arc<Node>, f64)>, (node, d)| match acc {
                Some((_, best_d)) if best_d <= d => acc,
                _ => Some((node, d)),
            })
    }

    /// Full adjacency dump of the live topology graph: for every node, the
    /// ids of every other node it is mutually connectable with.
    pub fn adjacency_list(&self) -> HashMap<String, Vec<String>> {
        let all = self.all_nodes();
        let mut out = HashMap::with_capacity(all.len());
        for node in &all {
            let neighbours: Vec<String> = self
                .find_connectable_nodes(node)
                .into_iter()
                .map(|n| n.id.clone())
                .collect();
            out.insert(node.id.clone(), neighbours);
        }
        out
    }
}
