//! HTTP adapter: the externally-facing request/scan/stats RPC surface. A
//! thin axum layer — all routing/admission logic lives in
//! [`crate::pipeline`]; handlers here only translate JSON in, shared state
//! out.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::network::NetworkRegistry;
use crate::pipeline::PipelineHandle;
use crate::request::{Qos, Request, ServiceType};
use crate::spatial::GroundSpace;
use crate::stats::StatsManager;

#[derive(Clone)]
pub struct AppState {
    pub network: Arc<NetworkRegistry>,
    pub groundspace: Arc<GroundSpace>,
    pub stats: Arc<StatsManager>,
    pub pipeline: PipelineHandle,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/handlereq", post(handle_request))
        .route("/scan", get(scan))
        .route("/nodes", get(nodes))
        .route("/allnodes", get(all_nodes))
        .route("/get_aggregate_stats", get(aggregate_stats))
        .route("/get_time_series_stats", get(time_series_stats))
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> crate::error::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(crate::error::Error::Io)?;
    tracing::info!(%addr, "HTTP adapter listening");
    axum::serve(listener, app)
        .await
        .map_err(crate::error::Error::Io)?;
    Ok(())
}

/// `POST /handlereq` body. Every field but `lat`/`lon`/`type` is optional,
/// defaulting exactly as the original request constructor does.
#[derive(Debug, Deserialize)]
struct HandleReqBody {
    id: Option<String>,
    #[serde(rename = "type")]
    service_type: Option<u8>,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
    #[serde(default)]
    alt: f64,
    uplink: Option<f64>,
    downlink: Option<f64>,
    latency: Option<f64>,
    reliability: Option<f64>,
    cpu: Option<f64>,
    power: Option<f64>,
    packet_size: Option<f64>,
    priority: Option<u32>,
    demand_timeout: Option<u32>,
    #[serde(rename = "support5G")]
    support_5g: Option<bool>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
struct AllocatedResponse {
    uplink: f64,
    downlink: f64,
    cpu: f64,
    power: f64,
    latency: f64,
    reliability: f64,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
struct HandleReqResponse {
    path: Vec<String>,
    result: String,
    id: String,
    allocated: AllocatedResponse,
}

async fn handle_request(State(state): State<AppState>, Json(body): Json<HandleReqBody>) -> Json<HandleReqResponse> {
    let service_type = body
        .service_type
        .and_then(ServiceType::from_u8)
        .unwrap_or(ServiceType::Data);
    let required = Qos {
        uplink: body.uplink.unwrap_or(1.0),
        downlink: body.downlink.unwrap_or(1.0),
        latency_ms: body.latency.unwrap_or(200.0),
        reliability: body.reliability.unwrap_or(0.95),
        cpu: body.cpu.unwrap_or(10.0),
        power: body.power.unwrap_or(10.0),
        priority: body.priority.unwrap_or(5),
        packet_size: body.packet_size.unwrap_or(1.0),
        demand_timeout: body.demand_timeout.unwrap_or(300),
    };
    let id = body.id.unwrap_or_else(|| format!("req_{}", rand::random::<u32>() % 900_000 + 100_000));
    let mut request = Request::new(id, service_type, body.lat, body.lon, body.alt, required);
    request.direct_sat_support = body.support_5g.unwrap_or(true);
    request.allow_partial = true;

    let outcome = match state.pipeline.submit(request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "pipeline submit failed");
            return Json(HandleReqResponse {
                path: Vec::new(),
                result: "failed".to_string(),
                id: String::new(),
                allocated: AllocatedResponse { uplink: 0.0, downlink: 0.0, cpu: 0.0, power: 0.0, latency: 0.0, reliability: 0.0 },
            });
        }
    };

    Json(HandleReqResponse {
        path: outcome.path,
        result: if outcome.success { "success" } else { "failed" }.to_string(),
        id: outcome.id,
        allocated: AllocatedResponse {
            uplink: outcome.allocated.uplink,
            downlink: outcome.allocated.downlink,
            cpu: outcome.allocated.cpu,
            power: outcome.allocated.power,
            latency: outcome.latency_actual_ms,
            reliability: outcome.reliability_actual,
        },
    })
}

#[derive(Debug, Deserialize)]
struct ScanQuery {
    lat: f64,
    lon: f64,
    #[serde(rename = "support5G", default)]
    #[allow(dead_code)]
    support_5g: bool,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
struct ScanEntry {
    #[serde(rename = "type")]
    kind: String,
    id: String,
    distance_km: f64,
    priority: u8,
}

async fn scan(State(state): State<AppState>, Query(q): Query<ScanQuery>) -> Json<Vec<ScanEntry>> {
    let visible = state.network.find_connectable_nodes_for_location(q.lat, q.lon, 0.0);
    let mut entries: Vec<ScanEntry> = visible
        .iter()
        .map(|node| {
            let mode = if node.kind.is_satellite() { crate::geo::DistanceMode::ThreeD } else { crate::geo::DistanceMode::Surface };
            let distance_m = crate::geo::distance(
                node.position(),
                crate::geo::Position::new(q.lat, q.lon, 0.0),
                mode,
                6_371_000.0,
            );
            ScanEntry { kind: node.kind.type_name().to_string(), id: node.id.clone(), distance_km: distance_m / 1000.0, priority: node.priority }
        })
        .collect();
    entries.sort_by_key(|e| (e.priority, (e.distance_km * 1000.0) as i64));
    Json(entries)
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
struct NodeSummary {
    id: String,
    lat: f64,
    lon: f64,
    alt: f64,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
struct NodesResponse {
    satellites: Vec<NodeSummary>,
    groundstations: Vec<NodeSummary>,
    seastations: Vec<NodeSummary>,
}

async fn nodes(State(state): State<AppState>) -> Json<NodesResponse> {
    let mut out = NodesResponse { satellites: Vec::new(), groundstations: Vec::new(), seastations: Vec::new() };
    for node in state.network.all_nodes() {
        let pos = node.position();
        let summary = NodeSummary { id: node.id.clone(), lat: pos.lat_deg, lon: pos.lon_deg, alt: pos.alt_m };
        match node.kind {
            crate::node::NodeKind::Leo | crate::node::NodeKind::Geo => out.satellites.push(summary),
            crate::node::NodeKind::GroundStation => out.groundstations.push(summary),
            crate::node::NodeKind::SeaStation => out.seastations.push(summary),
        }
    }
    Json(out)
}

#[derive(Debug, Serialize)]
struct OrbitInfo {
    period: f64,
    inclination: f64,
    raan: f64,
}

#[derive(Debug, Serialize)]
struct OrbitStateInfo {
    last_theta: f64,
}

#[derive(Debug, Serialize)]
struct DetailedNode {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    position: NodeSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    sat_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    orbit: Option<OrbitInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    orbit_state: Option<OrbitStateInfo>,
}

/// Altitude display cap mirroring the original system's "avoid
/// unreasonably large values" clamp.
const ALT_DISPLAY_CAP_M: f64 = 3_000_000.0;

async fn all_nodes(State(state): State<AppState>) -> Json<Vec<DetailedNode>> {
    let now_s = chrono::Utc::now().timestamp() as f64;
    state.network.propagate_all(now_s);

    let out: Vec<DetailedNode> = state
        .network
        .all_nodes()
        .iter()
        .map(|node| {
            let pos = node.position();
            let position = NodeSummary { id: node.id.clone(), lat: pos.lat_deg, lon: pos.lon_deg, alt: pos.alt_m.min(ALT_DISPLAY_CAP_M) };
            let (sat_type, orbit, orbit_state) = match (&node.orbit_state, node.kind) {
                (Some(os), kind) => {
                    let sat_type = if kind == crate::node::NodeKind::Geo { "geo" } else { "leo" };
                    (
                        Some(sat_type),
                        Some(OrbitInfo { period: os.orbit.period_s, inclination: os.orbit.inclination_deg, raan: os.orbit.raan_deg }),
                        Some(OrbitStateInfo { last_theta: *os.last_theta.lock() }),
                    )
                }
                (None, _) => (None, None, None),
            };
            DetailedNode { id: node.id.clone(), kind: node.kind.type_name(), position, sat_type, orbit, orbit_state }
        })
        .collect();
    Json(out)
}

async fn aggregate_stats(State(state): State<AppState>) -> Json<crate::stats::AggregateStats> {
    Json(state.stats.aggregate())
}

async fn time_series_stats(State(state): State<AppState>) -> Json<Vec<crate::stats::TimeSeriesPoint>> {
    Json(state.stats.time_series())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutingConfig;
    use crate::network::GeoParams;
    use crate::node::{Node, NodeKind, ResourceKey};
    use crate::pipeline::{self, PipelineWorker};
    use crate::policy::GreedyPolicy;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn geo_params() -> GeoParams {
        GeoParams { earth_radius_m: 6_371_000.0, leo_elev_min_deg: 7.5, geo_elev_min_deg: 5.0, min_propagation_interval_s: 1.0 }
    }

    fn gs_pool() -> HashMap<ResourceKey, f64> {
        HashMap::from([(ResourceKey::Uplink, 100.0), (ResourceKey::Downlink, 100.0), (ResourceKey::Cpu, 50.0), (ResourceKey::Power, 100.0)])
    }

    fn unique_stats_path() -> std::path::PathBuf {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("sagin_http_test_{n}.csv"))
    }

    fn test_state() -> AppState {
        let network = Arc::new(NetworkRegistry::new(geo_params()));
        let gs = Arc::new(Node::new_ground_or_sea(
            "gs-1", NodeKind::GroundStation, crate::geo::Position::new(13.80, 100.55, 20.0), gs_pool(), 200.0,
        ));
        network.add_node(gs);
        let groundspace = Arc::new(GroundSpace::new(64, 30, geo_params().earth_radius_m));
        let path = unique_stats_path();
        let _ = std::fs::remove_file(&path);
        let stats = Arc::new(StatsManager::load(&path, 50, 10).unwrap());
        let worker = PipelineWorker::new(network.clone(), groundspace.clone(), stats.clone(), Arc::new(GreedyPolicy), RoutingConfig::default());
        let pipeline = pipeline::spawn(worker, || 0.0);
        AppState { network, groundspace, stats, pipeline }
    }

    #[tokio::test]
    async fn handlereq_reaches_gs_in_one_hop() {
        let app = router(test_state());
        let body = serde_json::json!({"lat": 13.75, "lon": 100.5, "type": 3, "uplink": 2, "downlink": 10, "cpu": 10, "power": 20});
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/handlereq")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: HandleReqResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.result, "success");
        assert_eq!(parsed.path, vec!["gs-1".to_string()]);
    }

    #[tokio::test]
    async fn nodes_groups_by_kind() {
        let app = router(test_state());
        let response = app.oneshot(HttpRequest::builder().uri("/nodes").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: NodesResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.groundstations.len(), 1);
        assert!(parsed.satellites.is_empty());
    }

    #[tokio::test]
    async fn scan_returns_priority_then_distance_sorted_entries() {
        let app = router(test_state());
        let response = app
            .oneshot(HttpRequest::builder().uri("/scan?lat=13.75&lon=100.5").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: Vec<ScanEntry> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, "gs-1");
    }
}
