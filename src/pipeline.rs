//! Request pipeline: a single logical worker that owns the routing
//! environment, serialises planning through a queue, commits resource
//! allocations on success, and retires timed-out requests on every reset.

use std::sync::Arc;

use rand::Rng;
use tokio::sync::{mpsc, oneshot};

use crate::config::RoutingConfig;
use crate::env::{RoutingEnv, StepOutcome};
use crate::network::NetworkRegistry;
use crate::node::ResourceKey;
use crate::planner;
use crate::policy::Policy;
use crate::request::{Qos, Request, ServiceType};
use crate::spatial::GroundSpace;
use crate::stats::{SideResult, StatsManager};

/// A geographic sampling region for random request synthesis, weighted the
/// same way `random_user`'s region table is.
struct Region {
    lat_range: (f64, f64),
    lon_range: (f64, f64),
    weight: u32,
}

const REGIONS: &[Region] = &[
    Region { lat_range: (18.0, 54.0), lon_range: (73.0, 135.0), weight: 14 },
    Region { lat_range: (8.0, 37.0), lon_range: (68.0, 97.0), weight: 14 },
    Region { lat_range: (35.0, 60.0), lon_range: (-10.0, 40.0), weight: 14 },
    Region { lat_range: (25.0, 50.0), lon_range: (-125.0, -66.0), weight: 10 },
    Region { lat_range: (-35.0, 5.0), lon_range: (-74.0, -34.0), weight: 4 },
    Region { lat_range: (4.0, 14.0), lon_range: (3.0, 15.0), weight: 4 },
    Region { lat_range: (30.0, 45.0), lon_range: (129.0, 146.0), weight: 4 },
    Region { lat_range: (-10.0, 20.0), lon_range: (95.0, 120.0), weight: 4 },
    Region { lat_range: (-90.0, 90.0), lon_range: (-180.0, 180.0), weight: 32 },
];

fn sample_region<R: Rng>(rng: &mut R) -> &'static Region {
    let total_weight: u32 = REGIONS.iter().map(|r| r.weight).sum();
    let mut roll = rng.gen_range(0..total_weight) as f64;
    for region in REGIONS {
        if roll < region.weight as f64 {
            return region;
        }
        roll -= region.weight as f64;
    }
    REGIONS.last().expect("regions non-empty")
}

fn sample_qos<R: Rng>(rng: &mut R, service: ServiceType) -> Qos {
    let p = service.qos_profile();
    Qos {
        uplink: rng.gen_range(p.uplink_mbps.0..=p.uplink_mbps.1),
        downlink: rng.gen_range(p.downlink_mbps.0..=p.downlink_mbps.1),
        latency_ms: rng.gen_range(p.latency_ms.0..=p.latency_ms.1),
        reliability: rng.gen_range(p.reliability.0..=p.reliability.1),
        cpu: rng.gen_range(p.cpu.0..=p.cpu.1),
        power: rng.gen_range(p.power.0..=p.power.1),
        priority: rng.gen_range(p.priority.0..=p.priority.1),
        packet_size: rng.gen_range(64.0..=1500.0),
        demand_timeout: rng.gen_range(10..=300),
    }
}

/// Generate a random request, resampling the source location until the
/// network reports at least one connectable node there.
pub fn synthesize_request(network: &NetworkRegistry, id: impl Into<String>) -> Request {
    let mut rng = rand::thread_rng();
    let service = ServiceType::ALL[rng.gen_range(0..ServiceType::ALL.len())];

    let (lat, lon, alt) = loop {
        let region = sample_region(&mut rng);
        let lat = rng.gen_range(region.lat_range.0..=region.lat_range.1);
        let lon = rng.gen_range(region.lon_range.0..=region.lon_range.1);
        let alt = rng.gen_range(0.0..=2000.0);
        if network.check_neighbor_exist(lat, lon, alt) {
            break (lat, lon, alt);
        }
    };

    let required = sample_qos(&mut rng, service);
    Request::new(id, service, lat, lon, alt, required)
}

/// Everything the completion handle reports back to the caller.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub id: String,
    pub success: bool,
    pub path: Vec<String>,
    pub allocated: Qos,
    pub latency_actual_ms: f64,
    pub reliability_actual: f64,
}

struct QueueItem {
    request: Request,
    reply: oneshot::Sender<RequestOutcome>,
}

/// Handle held by the serving plane to enqueue a request and await its
/// completion handle. Cloning shares the same worker.
#[derive(Clone)]
pub struct PipelineHandle {
    sender: mpsc::Sender<QueueItem>,
}

impl PipelineHandle {
    /// Submit a request and await the worker's outcome.
    pub async fn submit(&self, request: Request) -> crate::error::Result<RequestOutcome> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(QueueItem { request, reply: tx })
            .await
            .map_err(|_| crate::error::Error::Config("pipeline worker has shut down".to_string()))?;
        rx.await.map_err(|_| crate::error::Error::Config("pipeline worker dropped the reply channel".to_string()))
    }
}

/// Tracking record for an active (committed) request, kept by the worker so
/// the per-reset retirement sweep can release its holds on expiry.
struct ActiveRequest {
    id: String,
    path: Vec<String>,
    allocated: Qos,
    remaining_resets: i64,
}

/// The single-worker routing plane: owns the environment, the network, the
/// spatial index, and the active-request table. Everything node-level still
/// goes through `Node`'s own lock since the serving plane reads concurrently
/// (scan endpoints); this worker is simply the only writer.
pub struct PipelineWorker {
    network: Arc<NetworkRegistry>,
    groundspace: Arc<GroundSpace>,
    stats: Arc<StatsManager>,
    policy: Arc<dyn Policy>,
    cfg: RoutingConfig,
    env: RoutingEnv,
    active: Vec<ActiveRequest>,
}

fn release_path(network: &NetworkRegistry, path: &[String], allocated: &Qos) {
    for node_id in path {
        let Some(node) = network.get_node(node_id) else { continue };
        let mut amounts = vec![(ResourceKey::Uplink, allocated.uplink), (ResourceKey::Downlink, allocated.downlink)];
        if node.is_gs() {
            amounts.push((ResourceKey::Cpu, allocated.cpu));
            amounts.push((ResourceKey::Power, allocated.power));
        }
        node.release_resource(&amounts);
    }
}

impl PipelineWorker {
    pub fn new(
        network: Arc<NetworkRegistry>,
        groundspace: Arc<GroundSpace>,
        stats: Arc<StatsManager>,
        policy: Arc<dyn Policy>,
        cfg: RoutingConfig,
    ) -> Self {
        Self { network, groundspace, stats, policy, cfg, env: RoutingEnv::new(), active: Vec::new() }
    }

    /// Decrement every active request's remaining-resets counter and retire
    /// (release holds, drop from the spatial index and the active table)
    /// any that reach zero. Runs once per reset, before the new request is
    /// bound.
    fn retire_timed_out(&mut self) {
        let mut still_active = Vec::with_capacity(self.active.len());
        for mut req in self.active.drain(..) {
            req.remaining_resets -= 1;
            if req.remaining_resets <= 0 {
                release_path(&self.network, &req.path, &req.allocated);
                self.groundspace.remove_request(&req.id);
                tracing::debug!(request_id = %req.id, "request retired on timeout");
            } else {
                still_active.push(req);
            }
        }
        self.active = still_active;
    }

    /// Process one request end-to-end: retirement sweep, planner run, agent
    /// step loop, commit-on-success, and an aggregator record.
    fn process(&mut self, request: Request, timestamp_s: f64) -> RequestOutcome {
        self.retire_timed_out();

        // Advance every satellite to "now" once per request before any
        // connectivity check depends on position. Cheap no-op below
        // `min_propagation_interval_s` or for GS/SS/GEO.
        self.network.propagate_all(timestamp_s);

        let (dis_path, dis_qos) = planner::run_dijkstra(&request, &self.network, &self.cfg);
        let mut request = request;
        request.dis_path = dis_path;
        request.dis_qos = dis_qos;

        let mut obs = self.env.bind_request(request, &self.network, &self.groundspace, &self.cfg, timestamp_s);

        // An immediate check of `neighbor_ids[0]`: no feasible first hop
        // means an instant dead end with no agent steps taken at all.
        let outcome = if obs.0[158] == 0.0 {
            StepOutcome::DeadEnd
        } else {
            loop {
                let action = self.policy.predict(&obs);
                let step = self.env.step(action, &self.network, &self.groundspace, &self.cfg);
                obs = step.observation;
                match step.outcome {
                    StepOutcome::InvalidAction | StepOutcome::Continuing => continue,
                    terminal => break terminal,
                }
            }
        };

        let request = self.env.current_request().cloned().expect("request bound");
        let success = matches!(outcome, StepOutcome::Success);

        if success {
            let mut amounts_per_node: Vec<(String, Vec<(ResourceKey, f64)>)> = Vec::new();
            for node_id in &request.path {
                if let Some(node) = self.network.get_node(node_id) {
                    let mut amounts = vec![
                        (ResourceKey::Uplink, request.allocated.uplink),
                        (ResourceKey::Downlink, request.allocated.downlink),
                    ];
                    if node.is_gs() {
                        amounts.push((ResourceKey::Cpu, request.allocated.cpu));
                        amounts.push((ResourceKey::Power, request.allocated.power));
                    }
                    amounts_per_node.push((node_id.clone(), amounts));
                }
            }
            for (node_id, amounts) in &amounts_per_node {
                if let Some(node) = self.network.get_node(node_id) {
                    if let Err(e) = node.allocate_resource(amounts) {
                        tracing::warn!(request_id = %request.id, error = %e, "commit failed at re-check, discarding request");
                        for (node_id, amounts) in &amounts_per_node {
                            if let Some(n) = self.network.get_node(node_id) {
                                n.release_resource(amounts);
                            }
                        }
                        return self.finish(request, false, timestamp_s);
                    }
                }
            }

            self.groundspace.add_request(request.id.clone(), request.source_lat, request.source_lon);
            self.active.push(ActiveRequest {
                id: request.id.clone(),
                path: request.path.clone(),
                allocated: request.allocated.clone(),
                remaining_resets: request.real_timeout,
            });
        }

        self.finish(request, success, timestamp_s)
    }

    fn finish(&self, request: Request, success: bool, timestamp_s: f64) -> RequestOutcome {
        let agent_side = SideResult {
            success,
            hops: request.path.len() as u32,
            latency: request.latency_actual_ms,
            uplink: request.allocated.uplink,
            downlink: request.allocated.downlink,
            reliability: request.reliability_actual,
            cpu: request.allocated.cpu,
            power: request.allocated.power,
        };
        let planner_side = SideResult {
            success: !request.dis_path.is_empty(),
            hops: request.dis_path.len() as u32,
            latency: request.dis_qos.as_ref().map(|q| q.latency_ms).unwrap_or(0.0),
            uplink: request.dis_qos.as_ref().map(|q| q.uplink).unwrap_or(0.0),
            downlink: request.dis_qos.as_ref().map(|q| q.downlink).unwrap_or(0.0),
            reliability: request.dis_qos.as_ref().map(|q| q.reliability).unwrap_or(0.0),
            cpu: request.dis_qos.as_ref().map(|q| q.cpu).unwrap_or(0.0),
            power: request.dis_qos.as_ref().map(|q| q.power).unwrap_or(0.0),
        };
        if let Err(e) = self.stats.record_request(request.id.clone(), timestamp_s, agent_side, planner_side) {
            tracing::warn!(request_id = %request.id, error = %e, "failed to record request stats");
        }

        RequestOutcome {
            id: request.id,
            success,
            path: request.path,
            allocated: request.allocated,
            latency_actual_ms: request.latency_actual_ms,
            reliability_actual: request.reliability_actual,
        }
    }

    /// Drain the queue forever, processing one request at a time. `now_fn`
    /// supplies the wall-clock timestamp for stats rows (threaded in rather
    /// than sampled internally, so the worker itself stays free of a system
    /// clock dependency).
    pub async fn run(mut self, mut receiver: mpsc::Receiver<QueueItem>, now_fn: impl Fn() -> f64) {
        while let Some(item) = receiver.recv().await {
            let outcome = self.process(item.request, now_fn());
            let _ = item.reply.send(outcome);
        }
    }
}

/// Spawn the worker as a background tokio task and return a cloneable
/// handle for the serving plane.
pub fn spawn(worker: PipelineWorker, now_fn: impl Fn() -> f64 + Send + 'static) -> PipelineHandle {
    let (sender, receiver) = mpsc::channel(256);
    tokio::spawn(worker.run(receiver, now_fn));
    PipelineHandle { sender }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::GeoParams;
    use crate::node::{Node, NodeKind};
    use crate::policy::GreedyPolicy;
    use std::collections::HashMap;

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

    fn data_request(id: &str, lat: f64, lon: f64) -> Request {
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
        Request::new(id, ServiceType::Data, lat, lon, 0.0, required)
    }

    fn unique_stats_path(tag: &str) -> std::path::PathBuf {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("sagin_pipeline_test_{tag}_{n}.csv"))
    }

    fn worker_with_single_gs() -> PipelineWorker {
        let network = Arc::new(NetworkRegistry::new(geo_params()));
        let gs = Arc::new(Node::new_ground_or_sea(
            "gs-1", NodeKind::GroundStation, crate::geo::Position::new(13.80, 100.55, 20.0), gs_pool(), 200.0,
        ));
        network.add_node(gs);
        let groundspace = Arc::new(GroundSpace::new(64, 30, geo_params().earth_radius_m));
        let path = unique_stats_path("worker");
        let _ = std::fs::remove_file(&path);
        let stats = Arc::new(StatsManager::load(&path, 50, 10).unwrap());
        PipelineWorker::new(network, groundspace, stats, Arc::new(GreedyPolicy), RoutingConfig::default())
    }

    #[test]
    fn successful_request_commits_holds_and_joins_spatial_index() {
        let mut worker = worker_with_single_gs();
        let req = data_request("req-1", 13.75, 100.5);
        let outcome = worker.process(req, 1000.0);
        assert!(outcome.success);
        assert_eq!(outcome.path, vec!["gs-1".to_string()]);
        assert!(worker.groundspace.len() == 1);
        let gs = worker.network.get_node("gs-1").unwrap();
        assert!(gs.resources.used(ResourceKey::Uplink) > 0.0);
    }

    #[test]
    fn failed_request_leaves_no_holds() {
        let network = Arc::new(NetworkRegistry::new(geo_params()));
        let gs = Arc::new(Node::new_ground_or_sea(
            "gs-1", NodeKind::GroundStation, crate::geo::Position::new(50.0, 50.0, 20.0), gs_pool(), 200.0,
        ));
        network.add_node(gs);
        let groundspace = Arc::new(GroundSpace::new(64, 30, geo_params().earth_radius_m));
        let path = unique_stats_path("failed");
        let _ = std::fs::remove_file(&path);
        let stats = Arc::new(StatsManager::load(&path, 50, 10).unwrap());
        let mut worker = PipelineWorker::new(network, groundspace, stats, Arc::new(GreedyPolicy), RoutingConfig::default());

        let req = data_request("req-1", 13.75, 100.5);
        let outcome = worker.process(req, 1000.0);
        assert!(!outcome.success);
        assert!(worker.groundspace.is_empty());
        let gs = worker.network.get_node("gs-1").unwrap();
        assert_eq!(gs.resources.used(ResourceKey::Uplink), 0.0);
    }

    #[test]
    fn second_identical_request_exhausts_capacity_and_dead_ends() {
        let mut worker = worker_with_single_gs();
        let first = data_request("req-1", 13.75, 100.5);
        let outcome1 = worker.process(first, 1000.0);
        assert!(outcome1.success);

        let gs = worker.network.get_node("gs-1").unwrap();
        gs.allocate_resource(&[(ResourceKey::Uplink, 97.0)]).unwrap();

        let second = data_request("req-2", 13.75, 100.5);
        let outcome2 = worker.process(second, 1001.0);
        assert!(!outcome2.success);
    }

    #[test]
    fn synthesize_request_always_has_a_connectable_source() {
        let network = NetworkRegistry::new(geo_params());
        let gs = Arc::new(Node::new_ground_or_sea(
            "gs-1", NodeKind::GroundStation, crate::geo::Position::new(0.0, 0.0, 0.0), gs_pool(), 20_000.0,
        ));
        network.add_node(gs);
        let req = synthesize_request(&network, "synth-1");
        assert!(network.check_neighbor_exist(req.source_lat, req.source_lon, req.source_alt_m));
    }
}
