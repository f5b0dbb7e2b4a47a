//! Deterministic shortest-path planner: the baseline strategy compared
//! against the learned agent. A best-first search from a synthetic
//! `SOURCE_USER` seed, with an admission-floor cost gate and per-predecessor
//! latency/reliability/bandwidth tracking, pruned once a ground-station cost
//! is known.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::config::RoutingConfig;
use crate::link::{self, EndpointKind};
use crate::network::NetworkRegistry;
use crate::node::{Node, NodeKind, ResourceKey};
use crate::request::{Qos, Request};

/// A min-heap entry ordered by ascending cost (reversed so `BinaryHeap`,
/// which is a max-heap, pops the cheapest first). Ties break on node id to
/// keep ordering total and deterministic.
#[derive(Debug, Clone, PartialEq)]
struct HeapEntry {
    cost: f64,
    node_id: String,
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node_id.cmp(&self.node_id))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn endpoint_kind_of(node: &Node) -> EndpointKind {
    EndpointKind::from(node.kind)
}

/// Admission-floor cost: `geodesic_distance / 1e7` if the neighbour passes
/// the half-requirement resource floor (cpu/power additionally checked for
/// GS terminals), else infinite.
fn calculate_cost(req: &Request, from_position: crate::geo::Position, to: &Node, cfg: &RoutingConfig) -> f64 {
    let cap = if req.service_type.is_emergency() {
        cfg.admission_cap_emergency
    } else {
        cfg.admission_cap_default
    };
    const MIN_QOS_COST: f64 = 0.5;

    let free_uplink = to.resources.free_capped(ResourceKey::Uplink, cap);
    let free_downlink = to.resources.free_capped(ResourceKey::Downlink, cap);
    if free_uplink < req.required.uplink * MIN_QOS_COST || free_downlink < req.required.downlink * MIN_QOS_COST {
        return f64::INFINITY;
    }

    if to.kind == NodeKind::GroundStation {
        let free_cpu = to.resources.free_capped(ResourceKey::Cpu, cap);
        let free_power = to.resources.free_capped(ResourceKey::Power, cap);
        if free_cpu < req.required.cpu * MIN_QOS_COST || free_power < req.required.power * MIN_QOS_COST {
            return f64::INFINITY;
        }
    }

    let distance = crate::geo::distance(
        from_position,
        to.position(),
        crate::geo::DistanceMode::ThreeD,
        cfg.earth_radius_m,
    );
    distance / 1e7
}

/// Run the deterministic planner for `req` against the live `network`,
/// returning the reference path (empty if no connectable seed exists) and
/// the QoS achieved along it. Never mutates `resources_used`.
pub fn run_dijkstra(req: &Request, network: &NetworkRegistry, cfg: &RoutingConfig) -> (Vec<String>, Option<Qos>) {
    let cap = if req.service_type.is_emergency() {
        cfg.admission_cap_emergency
    } else {
        cfg.admission_cap_default
    };

    let source_pos = crate::geo::Position::new(req.source_lat, req.source_lon, req.source_alt_m);
    let start_nodes = network.find_connectable_nodes_for_location(req.source_lat, req.source_lon, req.source_alt_m);
    if start_nodes.is_empty() {
        return (Vec::new(), None);
    }

    let mut distances: HashMap<String, f64> = HashMap::new();
    let mut previous: HashMap<String, Option<String>> = HashMap::new();
    let mut path_latency: HashMap<String, f64> = HashMap::new();
    let mut path_reliability: HashMap<String, f64> = HashMap::new();
    let mut path_uplink: HashMap<String, f64> = HashMap::new();
    let mut path_downlink: HashMap<String, f64> = HashMap::new();
    let mut visited: HashMap<String, bool> = HashMap::new();
    let mut heap = BinaryHeap::new();

    for start in &start_nodes {
        let cost = calculate_cost(req, source_pos, start, cfg);
        if cost.is_infinite() {
            continue;
        }
        distances.insert(start.id.clone(), cost);
        previous.insert(start.id.clone(), None);

        let distance_m = crate::geo::distance(source_pos, start.position(), crate::geo::DistanceMode::ThreeD, cfg.earth_radius_m);
        let lat = link::hop_latency_ms(distance_m, EndpointKind::User, endpoint_kind_of(start), req.service_type, cfg.speed_of_light_m_s);
        let rel = link::link_reliability(EndpointKind::User, endpoint_kind_of(start), distance_m);
        path_latency.insert(start.id.clone(), lat);
        path_reliability.insert(start.id.clone(), rel);

        let free_uplink = start.resources.free_capped(ResourceKey::Uplink, cap);
        let free_downlink = start.resources.free_capped(ResourceKey::Downlink, cap);
        path_uplink.insert(start.id.clone(), free_uplink.min(req.required.uplink));
        path_downlink.insert(start.id.clone(), free_downlink.min(req.required.downlink));

        heap.push(HeapEntry { cost, node_id: start.id.clone() });
    }

    let mut best_gs_id: Option<String> = None;
    let mut min_cost_to_gs = f64::INFINITY;

    while let Some(HeapEntry { cost: current_cost, node_id: current_id }) = heap.pop() {
        if visited.get(&current_id).copied().unwrap_or(false) {
            continue;
        }
        visited.insert(current_id.clone(), true);

        let Some(current_node) = network.get_node(&current_id) else { continue };

        if current_node.kind == NodeKind::GroundStation && current_cost < min_cost_to_gs {
            min_cost_to_gs = current_cost;
            best_gs_id = Some(current_id.clone());
        }

        if current_cost > min_cost_to_gs {
            continue;
        }

        for neighbour in network.find_connectable_nodes(&current_node) {
            if visited.get(&neighbour.id).copied().unwrap_or(false) {
                continue;
            }
            let cost = calculate_cost(req, current_node.position(), &neighbour, cfg);
            if cost.is_infinite() {
                continue;
            }
            let new_cost = current_cost + cost;
            let existing = distances.get(&neighbour.id).copied().unwrap_or(f64::INFINITY);
            if new_cost < existing {
                distances.insert(neighbour.id.clone(), new_cost);
                previous.insert(neighbour.id.clone(), Some(current_id.clone()));

                let distance_m = crate::geo::distance(
                    current_node.position(), neighbour.position(), crate::geo::DistanceMode::ThreeD, cfg.earth_radius_m,
                );
                let link_lat = link::hop_latency_ms(
                    distance_m, endpoint_kind_of(&current_node), endpoint_kind_of(&neighbour), req.service_type, cfg.speed_of_light_m_s,
                );
                let link_rel = link::link_reliability(endpoint_kind_of(&current_node), endpoint_kind_of(&neighbour), distance_m);

                let prev_lat = *path_latency.get(&current_id).unwrap_or(&0.0);
                let prev_rel = *path_reliability.get(&current_id).unwrap_or(&1.0);
                path_latency.insert(neighbour.id.clone(), prev_lat + link_lat);
                path_reliability.insert(neighbour.id.clone(), prev_rel * link_rel);

                let free_uplink = neighbour.resources.free_capped(ResourceKey::Uplink, cap);
                let free_downlink = neighbour.resources.free_capped(ResourceKey::Downlink, cap);
                let prev_up = *path_uplink.get(&current_id).unwrap_or(&f64::INFINITY);
                let prev_dn = *path_downlink.get(&current_id).unwrap_or(&f64::INFINITY);
                path_uplink.insert(neighbour.id.clone(), prev_up.min(free_uplink));
                path_downlink.insert(neighbour.id.clone(), prev_dn.min(free_downlink));

                heap.push(HeapEntry { cost: new_cost, node_id: neighbour.id.clone() });
            }
        }
    }

    let Some(gs_id) = best_gs_id else { return (Vec::new(), None) };

    let mut path = Vec::new();
    let mut current = Some(gs_id.clone());
    while let Some(id) = current {
        path.push(id.clone());
        current = previous.get(&id).cloned().flatten();
    }
    path.reverse();

    let (gs_free_cpu, gs_free_power) = network
        .get_node(&gs_id)
        .filter(|n| n.kind == NodeKind::GroundStation)
        .map(|n| {
            (
                n.resources.free_capped(ResourceKey::Cpu, cap).min(req.required.cpu),
                n.resources.free_capped(ResourceKey::Power, cap).min(req.required.power),
            )
        })
        .unwrap_or((0.0, 0.0));

    let qos = Qos {
        uplink: *path_uplink.get(&gs_id).unwrap_or(&0.0),
        downlink: *path_downlink.get(&gs_id).unwrap_or(&0.0),
        latency_ms: *path_latency.get(&gs_id).unwrap_or(&0.0),
        reliability: *path_reliability.get(&gs_id).unwrap_or(&0.0),
        cpu: gs_free_cpu,
        power: gs_free_power,
        priority: req.required.priority,
        packet_size: req.required.packet_size,
        demand_timeout: req.required.demand_timeout,
    };

    (path, Some(qos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::GeoParams;
    use crate::node::NodeKind;
    use crate::request::{Qos, ServiceType};
    use std::collections::HashMap as StdHashMap;
    use std::sync::Arc;

    fn geo_params() -> GeoParams {
        GeoParams {
            earth_radius_m: 6_371_000.0,
            leo_elev_min_deg: 7.5,
            geo_elev_min_deg: 5.0,
            min_propagation_interval_s: 1.0,
        }
    }

    fn gs_pool() -> StdHashMap<ResourceKey, f64> {
        StdHashMap::from([
            (ResourceKey::Uplink, 100.0),
            (ResourceKey::Downlink, 100.0),
            (ResourceKey::Cpu, 50.0),
            (ResourceKey::Power, 100.0),
        ])
    }

    fn data_request(lat: f64, lon: f64) -> Request {
        let required = Qos {
            uplink: 2.0,
            downlink: 10.0,
            latency_ms: 150.0,
            reliability: 0.95,
            cpu: 10.0,
            power: 20.0,
            priority: 4,
            packet_size: 1024.0,
            demand_timeout: 20,
        };
        Request::new("req-1", ServiceType::Data, lat, lon, 0.0, required)
    }

    #[test]
    fn single_hop_to_reachable_gs() {
        let network = NetworkRegistry::new(geo_params());
        let gs = Arc::new(Node::new_ground_or_sea(
            "gs-1", NodeKind::GroundStation, crate::geo::Position::new(13.80, 100.55, 20.0), gs_pool(), 200.0,
        ));
        network.add_node(gs);

        let req = data_request(13.75, 100.5);
        let cfg = RoutingConfig::default();
        let (path, qos) = run_dijkstra(&req, &network, &cfg);

        assert_eq!(path, vec!["gs-1".to_string()]);
        let qos = qos.unwrap();
        assert!(qos.reliability > 0.0 && qos.reliability <= 1.0);
        assert!(qos.cpu > 0.0);
    }

    #[test]
    fn no_connectable_seed_returns_empty_path() {
        let network = NetworkRegistry::new(geo_params());
        let gs = Arc::new(Node::new_ground_or_sea(
            "gs-1", NodeKind::GroundStation, crate::geo::Position::new(50.0, 50.0, 20.0), gs_pool(), 200.0,
        ));
        network.add_node(gs);

        let req = data_request(13.75, 100.5);
        let cfg = RoutingConfig::default();
        let (path, qos) = run_dijkstra(&req, &network, &cfg);
        assert!(path.is_empty());
        assert!(qos.is_none());
    }

    #[test]
    fn exhausted_gs_resources_yield_no_path() {
        let network = NetworkRegistry::new(geo_params());
        let gs = Arc::new(Node::new_ground_or_sea(
            "gs-1", NodeKind::GroundStation, crate::geo::Position::new(13.80, 100.55, 20.0), gs_pool(), 200.0,
        ));
        gs.allocate_resource(&[(ResourceKey::Uplink, 95.0)]).unwrap();
        network.add_node(gs);

        let req = data_request(13.75, 100.5);
        let cfg = RoutingConfig::default();
        let (path, qos) = run_dijkstra(&req, &network, &cfg);
        assert!(path.is_empty());
        assert!(qos.is_none());
    }

    #[test]
    fn emergency_cap_accepts_where_data_would_reject() {
        let network = NetworkRegistry::new(geo_params());
        let gs = Arc::new(Node::new_ground_or_sea(
            "gs-1", NodeKind::GroundStation, crate::geo::Position::new(13.80, 100.55, 20.0), gs_pool(), 200.0,
        ));
        // 92% uplink usage: data (cap 0.9) should reject, emergency (cap 0.95) accepts.
        gs.allocate_resource(&[(ResourceKey::Uplink, 92.0)]).unwrap();
        network.add_node(gs);

        let cfg = RoutingConfig::default();

        let data_req = data_request(13.75, 100.5);
        let (data_path, _) = run_dijkstra(&data_req, &network, &cfg);
        assert!(data_path.is_empty());

        let mut emergency_req = data_request(13.75, 100.5);
        emergency_req.service_type = ServiceType::Emergency;
        emergency_req.required.uplink = 1.0;
        emergency_req.required.downlink = 1.0;
        emergency_req.required.cpu = 5.0;
        emergency_req.required.power = 10.0;
        let (emergency_path, _) = run_dijkstra(&emergency_req, &network, &cfg);
        assert_eq!(emergency_path, vec!["gs-1".to_string()]);
    }
}
