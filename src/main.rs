//! SAGIN routing and admission controller — process entry point.
//!
//! Loads configuration and the topology snapshot, wires the single routing
//! worker and the HTTP adapter together, and serves until killed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;

use sagin_router::config::Config;
use sagin_router::http::{self, AppState};
use sagin_router::network::GeoParams;
use sagin_router::pipeline::{self, PipelineWorker};
use sagin_router::policy::GreedyPolicy;
use sagin_router::spatial::GroundSpace;
use sagin_router::stats::StatsManager;
use sagin_router::topology::{JsonFileTopologyLoader, TopologyLoader};
use sagin_router::Result;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the topology snapshot (overrides SAGIN_TOPOLOGY_PATH / config default).
    #[arg(short, long)]
    topology: Option<String>,

    /// HTTP listen address:port override (overrides SAGIN_LISTEN_ADDR/PORT).
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

fn now_s() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs_f64()
}

fn main() -> Result<()> {
    let mut args = Args::parse();
    let mut cfg = Config::load()?;
    if let Some(topology) = args.topology.take() {
        cfg.topology.snapshot_path = topology;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cfg.app.worker_threads)
        .enable_all()
        .build()
        .expect("failed to build the tokio runtime");
    runtime.block_on(run(args, cfg))
}

async fn run(args: Args, cfg: Config) -> Result<()> {
    sagin_router::logging::init_logging(&cfg.app.log_level);
    tracing::info!("starting SAGIN routing and admission controller");

    let geo = GeoParams {
        earth_radius_m: cfg.routing.earth_radius_m,
        leo_elev_min_deg: cfg.routing.leo_elevation_min_deg,
        geo_elev_min_deg: cfg.routing.geo_elevation_min_deg,
        min_propagation_interval_s: cfg.routing.min_propagation_interval_s,
    };

    let loader = JsonFileTopologyLoader::new(cfg.topology.snapshot_path.clone(), geo);
    let network = loader.load()?;
    tracing::info!(path = %cfg.topology.snapshot_path, "topology loaded");

    let groundspace = Arc::new(GroundSpace::new(
        cfg.routing.spatial_rebuild_threshold,
        cfg.routing.spatial_max_stale_secs,
        cfg.routing.earth_radius_m,
    ));
    let stats = Arc::new(StatsManager::load(
        &cfg.stats.log_path,
        cfg.stats.batch_size,
        cfg.stats.time_series_window,
    )?);
    tracing::info!(path = %cfg.stats.log_path, "aggregator log recovered");

    let worker = PipelineWorker::new(
        network.clone(),
        groundspace.clone(),
        stats.clone(),
        Arc::new(GreedyPolicy),
        cfg.routing.clone(),
    );
    let pipeline = pipeline::spawn(worker, now_s);

    let state = AppState { network, groundspace, stats, pipeline };

    let addr = args.listen.unwrap_or_else(|| {
        format!("{}:{}", cfg.http.listen_addr, cfg.http.listen_port)
            .parse()
            .expect("configured listen address is valid")
    });

    http::serve(state, addr).await
}
