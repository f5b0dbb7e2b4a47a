//! The routing environment: a stateful step machine exposing the fixed-size
//! observation, the 10-slot action space, and reward shaping required by a
//! step-by-step learned policy.

use crate::config::RoutingConfig;
use crate::link::{self, EndpointKind};
use crate::network::NetworkRegistry;
use crate::node::{Node, NodeKind, ResourceKey};
use crate::request::{Request, ServiceType};
use crate::spatial::GroundSpace;

pub const OBS_DIM: usize = 169;
pub const NUM_NEIGHBOUR_SLOTS: usize = 10;
pub const NEARBY_RADIUS_KM: f64 = 2500.0;

/// The fixed-length observation vector, every element in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct Observation(pub Vec<f64>);

impl Observation {
    fn zeroed() -> Self {
        Self(vec![0.0; OBS_DIM])
    }
}

/// How an episode step concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Episode continues; no terminal condition hit.
    Continuing,
    /// The chosen action indexed an empty neighbour slot. Non-terminal;
    /// absorbed locally without advancing the hop.
    InvalidAction,
    /// No feasible neighbour from the current node. Terminal failure.
    DeadEnd,
    /// Hop cap exceeded without reaching a ground station. Terminal failure.
    StepLimit,
    /// Current node is a ground station. Terminal success.
    Success,
}

#[derive(Debug, Clone)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    pub outcome: StepOutcome,
}

/// Owns the current episode's transient state: the request being routed,
/// the current node (`None` means "still at the user's source location"),
/// already-traversed ids, and the cached top-10 neighbour candidates.
pub struct RoutingEnv {
    current_request: Option<Request>,
    current_node_id: Option<String>,
    node_passed_ids: Vec<String>,
    neighbor_ids: [Option<String>; NUM_NEIGHBOUR_SLOTS],
    steps: u32,
    last_action_valid: bool,
    /// Wall-clock time this episode was bound at, held fixed across every
    /// step within the episode (no real time passes mid-episode) and used
    /// as the base instant for neighbour visibility-window search.
    now_s: f64,
}

impl Default for RoutingEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingEnv {
    pub fn new() -> Self {
        Self {
            current_request: None,
            current_node_id: None,
            node_passed_ids: Vec::new(),
            neighbor_ids: Default::default(),
            steps: 0,
            last_action_valid: true,
            now_s: 0.0,
        }
    }

    pub fn current_request(&self) -> Option<&Request> {
        self.current_request.as_ref()
    }

    pub fn current_node_id(&self) -> Option<&str> {
        self.current_node_id.as_deref()
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn node_passed_ids(&self) -> &[String] {
        &self.node_passed_ids
    }

    /// Bind a new request as "current" and return the initial observation.
    /// Per-request retirement sweeps are the pipeline's responsibility;
    /// this only resets the episode-local state.
    pub fn bind_request(
        &mut self,
        request: Request,
        network: &NetworkRegistry,
        groundspace: &GroundSpace,
        cfg: &RoutingConfig,
        now_s: f64,
    ) -> Observation {
        self.current_node_id = None;
        self.node_passed_ids.clear();
        self.neighbor_ids = Default::default();
        self.steps = 0;
        self.last_action_valid = true;
        self.now_s = now_s;
        self.current_request = Some(request);
        self.build_observation(network, groundspace, cfg)
    }

    fn admission_cap(&self, cfg: &RoutingConfig) -> f64 {
        let req = self.current_request.as_ref().expect("request bound");
        if req.service_type.is_emergency() {
            cfg.admission_cap_emergency
        } else {
            cfg.admission_cap_default
        }
    }

    fn current_position(&self, network: &NetworkRegistry) -> crate::geo::Position {
        let req = self.current_request.as_ref().expect("request bound");
        match &self.current_node_id {
            Some(id) => network.get_node(id).expect("current node exists").position(),
            None => crate::geo::Position::new(req.source_lat, req.source_lon, req.source_alt_m),
        }
    }

    fn current_endpoint_kind(&self, network: &NetworkRegistry) -> EndpointKind {
        match &self.current_node_id {
            Some(id) => EndpointKind::from(network.get_node(id).expect("current node exists").kind),
            None => EndpointKind::User,
        }
    }

    /// Build the 169-float observation for the current state.
    pub fn build_observation(&mut self, network: &NetworkRegistry, groundspace: &GroundSpace, cfg: &RoutingConfig) -> Observation {
        let cap = self.admission_cap(cfg);
        let req = self.current_request.as_ref().expect("request bound").clone();
        let mut obs = Observation::zeroed();

        obs.0[req.service_type.one_hot_index()] = 1.0;
        obs.0[8] = (self.steps as f64 / cfg.max_step as f64).min(1.0);
        obs.0[9] = (req.required.uplink / 20.0).min(1.0);
        obs.0[10] = if req.required.uplink > 0.0 {
            (req.allocated.uplink / req.required.uplink).min(1.0)
        } else {
            0.0
        };
        obs.0[11] = (req.required.downlink / 100.0).min(1.0);
        obs.0[12] = if req.required.downlink > 0.0 {
            (req.allocated.downlink / req.required.downlink).min(1.0)
        } else {
            0.0
        };

        let current_pos = self.current_position(network);
        let lat_rad = current_pos.lat_deg.to_radians();
        let lon_rad = current_pos.lon_deg.to_radians();
        obs.0[13] = (lat_rad.sin() + 1.0) / 2.0;
        obs.0[14] = (lat_rad.cos() + 1.0) / 2.0;
        obs.0[15] = (lon_rad.sin() + 1.0) / 2.0;
        obs.0[16] = (lon_rad.cos() + 1.0) / 2.0;
        obs.0[17] = (current_pos.alt_m / 1e6).min(1.0);

        obs.0[18] = req.required.reliability.min(1.0);
        obs.0[19] = if req.required.reliability > 0.0 {
            (req.reliability_actual / req.required.reliability).min(1.0)
        } else {
            0.0
        };
        obs.0[20] = (req.required.latency_ms / 500.0).min(1.0);
        obs.0[21] = if req.latency_actual_ms > 0.0 {
            (req.required.latency_ms / req.latency_actual_ms).min(1.0)
        } else {
            1.0
        };

        obs.0[22] = (req.required.priority as f64 / 10.0).min(1.0);
        obs.0[23] = (req.required.cpu / 50.0).min(1.0);
        obs.0[24] = (req.required.power / 100.0).min(1.0);

        let connectable = match &self.current_node_id {
            Some(id) => network.find_connectable_nodes(&network.get_node(id).expect("current node exists")),
            None => network.find_connectable_nodes_for_location(req.source_lat, req.source_lon, req.source_alt_m),
        };
        obs.0[25] = (connectable.len() as f64 / 10.0).min(1.0);

        self.neighbor_ids = Default::default();
        let mut count = 0;
        for node in &connectable {
            if count >= NUM_NEIGHBOUR_SLOTS {
                break;
            }
            if self.node_passed_ids.contains(&node.id) {
                continue;
            }
            if node_utilisation_below_cap(node, cap) {
                self.neighbor_ids[count] = Some(node.id.clone());
                count += 1;
            }
        }

        let users_in_range = groundspace.nearby_count(req.source_lat, req.source_lon, NEARBY_RADIUS_KM);
        obs.0[26] = (users_in_range as f64 / 10000.0).min(1.0);
        obs.0[27] = if req.required.demand_timeout > 0 {
            (req.real_timeout as f64 / req.required.demand_timeout as f64).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let current_kind = self.current_endpoint_kind(network);
        let current_node = self.current_node_id.as_ref().and_then(|id| network.get_node(id));
        for i in 0..NUM_NEIGHBOUR_SLOTS {
            let block = match &self.neighbor_ids[i] {
                None => [0.0; 13],
                Some(id) => {
                    let node = network.get_node(id).expect("neighbour exists");
                    neighbour_block(
                        &req, &node, current_pos, current_kind, current_node.as_deref(),
                        network, groundspace, cfg, cap, self.now_s,
                    )
                }
            };
            obs.0[28 + i * 13..28 + (i + 1) * 13].copy_from_slice(&block);
        }

        for j in 0..NUM_NEIGHBOUR_SLOTS {
            obs.0[158 + j] = if self.neighbor_ids[j].is_some() { 1.0 } else { 0.0 };
        }

        obs.0[168] = match &self.current_node_id {
            Some(id) => {
                if network.get_node(id).map(|n| n.is_gs()).unwrap_or(false) {
                    1.0
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        if !self.last_action_valid {
            obs.0[168] = 0.5;
        }

        obs
    }

    /// Apply `action` (an index into the cached top-10 neighbours). Returns
    /// `false` (and leaves state unchanged except the "last action invalid"
    /// flag) if the slot is empty.
    fn apply_action(&mut self, action: usize, network: &NetworkRegistry, cfg: &RoutingConfig) -> bool {
        let cap = self.admission_cap(cfg);
        let limit = self.neighbor_ids.iter().take_while(|n| n.is_some()).count();
        if action >= limit {
            self.last_action_valid = false;
            return false;
        }
        let next_id = self.neighbor_ids[action].clone().expect("within limit");
        let Some(next_node) = network.get_node(&next_id) else {
            self.last_action_valid = false;
            return false;
        };

        let current_pos = self.current_position(network);
        let current_kind = self.current_endpoint_kind(network);
        let distance_m = crate::geo::distance(next_node.position(), current_pos, crate::geo::DistanceMode::ThreeD, cfg.earth_radius_m);

        let req = self.current_request.as_mut().expect("request bound");
        let link_delay = link::hop_latency_ms(distance_m, current_kind, EndpointKind::from(next_node.kind), req.service_type, cfg.speed_of_light_m_s);
        let link_rel = link::link_reliability(current_kind, EndpointKind::from(next_node.kind), distance_m);

        req.path.push(next_node.id.clone());
        self.node_passed_ids.push(next_node.id.clone());
        req.latency_actual_ms += link_delay;
        req.reliability_actual *= link_rel;

        let avail_uplink = next_node.resources.free_capped(ResourceKey::Uplink, cap);
        let avail_downlink = next_node.resources.free_capped(ResourceKey::Downlink, cap);
        req.allocated.uplink = avail_uplink.min(req.allocated.uplink);
        req.allocated.downlink = avail_downlink.min(req.allocated.downlink);

        if next_node.kind == NodeKind::GroundStation {
            let avail_cpu = next_node.resources.free_capped(ResourceKey::Cpu, cap);
            let avail_power = next_node.resources.free_capped(ResourceKey::Power, cap);
            req.allocated.cpu = avail_cpu.min(req.required.cpu);
            req.allocated.power = avail_power.min(req.required.power);
        }

        self.current_node_id = Some(next_node.id.clone());
        self.steps += 1;
        self.last_action_valid = true;
        true
    }

    /// Step the environment: apply `action`, rebuild the observation,
    /// compute the reward, and report how the episode concluded (if at
    /// all). Mirrors `step`/`_apply_action`/`_calculate_reward` in the
    /// original environment.
    pub fn step(&mut self, action: usize, network: &NetworkRegistry, groundspace: &GroundSpace, cfg: &RoutingConfig) -> StepResult {
        let applied = self.apply_action(action, network, cfg);
        let obs = self.build_observation(network, groundspace, cfg);

        if !applied {
            let reward = cfg.invalid_action_penalty / cfg.norm_base;
            return StepResult { observation: obs, reward, outcome: StepOutcome::InvalidAction };
        }

        let reward = self.calculate_reward(&obs, network, cfg);

        let is_gs_terminal = obs.0[168] == 1.0;
        let dead_end = self.neighbor_ids[0].is_none() && !is_gs_terminal;
        let step_limit = self.steps > cfg.max_step;

        let outcome = if step_limit && !is_gs_terminal {
            StepOutcome::StepLimit
        } else if dead_end {
            StepOutcome::DeadEnd
        } else if is_gs_terminal {
            StepOutcome::Success
        } else {
            StepOutcome::Continuing
        };

        StepResult { observation: obs, reward, outcome }
    }

    fn calculate_efficient_usage_bonus(&self, network: &NetworkRegistry, cfg: &RoutingConfig) -> f64 {
        let usage = match &self.current_node_id {
            Some(id) => network.get_node(id).map(|n| n.get_mean_usage()).unwrap_or(0.0),
            None => 0.0,
        };
        if usage < 0.6 {
            cfg.usage_pool
        } else {
            cfg.usage_pool * (1.0 - usage) / (1.0 - 0.6)
        }
    }

    fn calculate_hop_reward(&self, cfg: &RoutingConfig) -> f64 {
        cfg.hop_penalty - (self.steps as f64).powi(2) * 0.35
    }

    fn calculate_base_reward(&self, cfg: &RoutingConfig) -> f64 {
        cfg.base_reward * (1.0 - self.steps as f64 / cfg.max_step as f64)
    }

    fn calculate_reward(&self, obs: &Observation, network: &NetworkRegistry, cfg: &RoutingConfig) -> f64 {
        let req = self.current_request.as_ref().expect("request bound");
        let cap = self.admission_cap(cfg);

        let mut reward = 0.0;
        reward += self.calculate_base_reward(cfg);
        reward += self.calculate_efficient_usage_bonus(network, cfg);
        reward += self.calculate_hop_reward(cfg);

        let timeout_ratio = obs.0[27];
        reward += cfg.timeout_pool * timeout_ratio;

        let weights = req.service_type.reward_weights();
        let lat_ratio = obs.0[21];
        reward += cfg.qos_pool * weights.w_lat * lat_ratio.powf(1.5);
        let rel_ratio = obs.0[19];
        reward += cfg.qos_pool * weights.w_rel * rel_ratio.powf(1.5);
        let up_ratio = obs.0[10];
        reward += cfg.qos_pool * weights.w_up * up_ratio;
        let down_ratio = obs.0[12];
        reward += cfg.qos_pool * weights.w_dn * down_ratio;

        let current_pos = self.current_position(network);
        let (gs_distance, gs_node) = match network.nearest_gs_from_location(current_pos) {
            Some((node, d)) => (Some(d), Some(node)),
            None => (None, None),
        };
        let distance_rate = gs_distance.map(|d| (d / 4e6).min(1.0)).unwrap_or(1.0);
        reward += cfg.gs_proximity_bonus * (1.0 - distance_rate) * 0.75;

        let score = gs_node
            .as_ref()
            .map(|gs| gs_health_score(gs, req, cap) / 10.0)
            .unwrap_or(0.0);
        reward += cfg.gs_proximity_bonus * (score - 7.0 / 10.0) * 0.25;

        let is_gs_terminal = obs.0[168] == 1.0;
        if is_gs_terminal {
            reward += cfg.finished_pool / 2.0;
            if (self.steps as f64) <= cfg.max_step as f64 / 3.0 {
                reward += cfg.special_bonus * (1.0 - ((self.steps as f64 - 1.0) / (cfg.max_step as f64 / 3.0))).powi(2);
            }
            let cpu_bonus = if req.required.cpu > 0.0 { req.allocated.cpu / req.required.cpu } else { 1.0 } * cfg.finished_pool / 4.0;
            let power_bonus = if req.required.power > 0.0 { req.allocated.power / req.required.power } else { 1.0 } * cfg.finished_pool / 4.0;
            reward += cpu_bonus + power_bonus;
        }

        let mut check = false;
        if self.neighbor_ids[0].is_none() && !is_gs_terminal {
            reward += cfg.dead_end_penalty;
            check = true;
        }
        if self.steps > cfg.max_step {
            reward += cfg.step_limit_penalty;
            check = true;
        }

        reward /= cfg.norm_base;
        reward = reward.clamp(-2.0, 2.0);
        if !check && !is_gs_terminal {
            reward /= cfg.inter_step_norm;
        }
        reward
    }
}

fn node_utilisation_below_cap(node: &Node, cap: f64) -> bool {
    ResourceKey::keys_for(node.kind).iter().all(|key| {
        let total = node.resources.total(*key);
        if total <= 0.0 {
            return true;
        }
        node.resources.used(*key) / total < cap
    })
}

/// GS health score in `0..=10`: sum of `floor(rate * 2.5)` across
/// uplink/downlink/cpu/power, minus a penalty when mean usage exceeds 0.6.
fn gs_health_score(gs: &Node, req: &Request, cap: f64) -> f64 {
    let uplink_denominator = if req.allocated.uplink > 0.0 { req.allocated.uplink } else { req.required.uplink };
    let downlink_denominator = if req.allocated.downlink > 0.0 { req.allocated.downlink } else { req.required.downlink };
    let cpu_denominator = if req.required.cpu > 0.0 { req.required.cpu } else { 1.0 };
    let power_denominator = if req.required.power > 0.0 { req.required.power } else { 1.0 };

    let mut mark = 0.0_f64;
    let rate_uplink = safe_div(gs.resources.free_capped(ResourceKey::Uplink, cap), uplink_denominator);
    mark += (rate_uplink * 2.5).floor();
    let rate_downlink = safe_div(gs.resources.free_capped(ResourceKey::Downlink, cap), downlink_denominator);
    mark += (rate_downlink * 2.5).floor();
    let rate_cpu = safe_div(gs.resources.free_capped(ResourceKey::Cpu, cap), cpu_denominator);
    mark += (rate_cpu * 2.5).floor();
    let rate_power = safe_div(gs.resources.free_capped(ResourceKey::Power, cap), power_denominator);
    mark += (rate_power * 2.5).floor();

    let usage = gs.get_mean_usage();
    if usage >= 0.6 {
        mark -= ((usage - 0.6) / 0.4 * 4.0).floor();
    }
    mark.clamp(0.0, 10.0)
}

fn safe_div(num: f64, denom: f64) -> f64 {
    if denom > 0.0 {
        num / denom
    } else {
        0.0
    }
}

#[allow(clippy::too_many_arguments)]
fn neighbour_block(
    req: &Request,
    node: &Node,
    current_pos: crate::geo::Position,
    current_kind: EndpointKind,
    current_node: Option<&Node>,
    network: &NetworkRegistry,
    groundspace: &GroundSpace,
    cfg: &RoutingConfig,
    cap: f64,
    now_s: f64,
) -> [f64; 13] {
    let mut block = [0.0_f64; 13];

    let distance_m = crate::geo::distance(node.position(), current_pos, crate::geo::DistanceMode::ThreeD, cfg.earth_radius_m);
    block[0] = (distance_m / 1e7).min(1.0);

    let node_kind = EndpointKind::from(node.kind);
    let link_delay = link::hop_latency_ms(distance_m, current_kind, node_kind, req.service_type, cfg.speed_of_light_m_s);
    block[1] = (link_delay / 500.0).min(1.0);

    let link_rel = link::link_reliability(current_kind, node_kind, distance_m);
    block[2] = link_rel.min(1.0);

    let uplink_available = node.resources.free_capped(ResourceKey::Uplink, cap);
    block[3] = if req.allocated.uplink > 0.0 { (uplink_available / req.allocated.uplink).min(1.0) } else { 1.0 };
    let downlink_available = node.resources.free_capped(ResourceKey::Downlink, cap);
    block[4] = if req.allocated.downlink > 0.0 { (downlink_available / req.allocated.downlink).min(1.0) } else { 1.0 };

    if node.kind != NodeKind::GroundStation {
        block[5] = 1.0;
        block[6] = 1.0;
    } else {
        let cpu_available = node.resources.free_capped(ResourceKey::Cpu, cap);
        block[5] = if req.required.cpu > 0.0 { (cpu_available / req.required.cpu).min(1.0) } else { 1.0 };
        let power_available = node.resources.free_capped(ResourceKey::Power, cap);
        block[6] = if req.required.power > 0.0 { (power_available / req.required.power).min(1.0) } else { 1.0 };
    }

    block[7] = if node.is_gs() { 1.0 } else { 0.0 };

    // Estimated visibility time relative to `real_timeout`; always 1 when
    // the current node is not a satellite (or this is the first hop, at the
    // user's location, where nothing propagates).
    block[8] = match current_node {
        Some(cur) if cur.kind.is_satellite() => {
            let visible_s = cur.estimate_visible_time(
                node, now_s, cfg.visibility_search_max_time_s,
                cfg.earth_radius_m, cfg.leo_elevation_min_deg, cfg.geo_elevation_min_deg,
            );
            if req.real_timeout > 0 {
                (visible_s / req.real_timeout as f64).min(1.0)
            } else {
                0.0
            }
        }
        _ => 1.0,
    };

    let users_in_range = groundspace.nearby_count(node.position().lat_deg, node.position().lon_deg, NEARBY_RADIUS_KM);
    block[9] = (users_in_range as f64 / 10000.0).min(1.0);

    match network.nearest_gs_from_location(node.position()) {
        Some((gs, d)) => {
            block[10] = (d / 4e6).min(1.0);
            block[11] = gs_health_score(&gs, req, cap) / 10.0;
        }
        None => {
            block[10] = 1.0;
            block[11] = 0.0;
        }
    }

    block[12] = node.get_mean_usage().min(1.0);

    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::GeoParams;
    use crate::node::Node;
    use crate::request::Qos;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn geo_params() -> GeoParams {
        GeoParams {
            earth_radius_m: 6_371_000.0,
            leo_elev_min_deg: 7.5,
            geo_elev_min_deg: 5.0,
            min_propagation_interval_s: 1.0,
        }
    }

    fn gs_pool() -> HashMap<ResourceKey, f64> {
        HashMap::from([
            (ResourceKey::Uplink, 100.0),
            (ResourceKey::Downlink, 100.0),
            (ResourceKey::Cpu, 50.0),
            (ResourceKey::Power, 100.0),
        ])
    }

    fn data_request() -> Request {
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
        let mut req = Request::new("req-1", ServiceType::Data, 13.75, 100.5, 0.0, required.clone());
        req.allocated = Qos { uplink: required.uplink, downlink: required.downlink, ..required };
        req
    }

    #[test]
    fn observation_is_well_formed_and_reaches_gs_in_one_step() {
        let network = NetworkRegistry::new(geo_params());
        let gs = Arc::new(Node::new_ground_or_sea(
            "gs-1", NodeKind::GroundStation, crate::geo::Position::new(13.80, 100.55, 20.0), gs_pool(), 200.0,
        ));
        network.add_node(gs);
        let groundspace = GroundSpace::new(64, 30, geo_params().earth_radius_m);
        let cfg = RoutingConfig::default();

        let mut env = RoutingEnv::new();
        let obs = env.bind_request(data_request(), &network, &groundspace, &cfg, 0.0);

        for &v in &obs.0 {
            assert!(v.is_finite());
            assert!((0.0..=1.0).contains(&v));
        }
        let ones: usize = obs.0[0..8].iter().filter(|&&v| v == 1.0).count();
        assert_eq!(ones, 1);

        let result = env.step(0, &network, &groundspace, &cfg);
        assert_eq!(result.outcome, StepOutcome::Success);
        assert!(result.reward.is_finite());
    }

    #[test]
    fn invalid_action_is_non_terminal_and_penalised() {
        let network = NetworkRegistry::new(geo_params());
        let gs = Arc::new(Node::new_ground_or_sea(
            "gs-1", NodeKind::GroundStation, crate::geo::Position::new(13.80, 100.55, 20.0), gs_pool(), 200.0,
        ));
        network.add_node(gs);
        let groundspace = GroundSpace::new(64, 30, geo_params().earth_radius_m);
        let cfg = RoutingConfig::default();

        let mut env = RoutingEnv::new();
        env.bind_request(data_request(), &network, &groundspace, &cfg, 0.0);
        let result = env.step(5, &network, &groundspace, &cfg);
        assert_eq!(result.outcome, StepOutcome::InvalidAction);
        assert!((result.reward - cfg.invalid_action_penalty / cfg.norm_base).abs() < 1e-9);
    }

    #[test]
    fn dead_end_when_no_gs_in_range() {
        let network = NetworkRegistry::new(geo_params());
        let gs = Arc::new(Node::new_ground_or_sea(
            "gs-1", NodeKind::GroundStation, crate::geo::Position::new(50.0, 50.0, 20.0), gs_pool(), 200.0,
        ));
        network.add_node(gs);
        let groundspace = GroundSpace::new(64, 30, geo_params().earth_radius_m);
        let cfg = RoutingConfig::default();

        let mut env = RoutingEnv::new();
        let obs = env.bind_request(data_request(), &network, &groundspace, &cfg, 0.0);
        assert_eq!(obs.0[158], 0.0);
    }
}
