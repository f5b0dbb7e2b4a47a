//! GroundSpace: a unit-sphere spatial index over active requests, used for
//! "users within radius" counts and lookups, with lazy/async rebuild.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rstar::{RTree, RTreeObject, AABB};

/// A request's location as tracked by the spatial index. The index only
/// needs id + location, not the whole `Request`.
#[derive(Debug, Clone)]
pub struct RequestLocation {
    pub id: String,
    pub lat_deg: f64,
    pub lon_deg: f64,
}

#[derive(Debug, Clone)]
struct IndexedPoint {
    id: String,
    point: [f64; 3],
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

fn latlon_to_unit_sphere(lat_deg: f64, lon_deg: f64) -> [f64; 3] {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

fn haversine_km(a_lat: f64, a_lon: f64, b_lat: f64, b_lon: f64, earth_radius_m: f64) -> f64 {
    let lat1 = a_lat.to_radians();
    let lat2 = b_lat.to_radians();
    let dlat = (b_lat - a_lat).to_radians();
    let dlon = (b_lon - a_lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * earth_radius_m * h.sqrt().asin() / 1000.0
}

/// Chord length on the unit sphere for an angular radius corresponding to
/// `r_km` on the Earth's surface: `2 sin(alpha/2)` where
/// `alpha = r_km * 1000 / earth_radius_m`.
fn chord_for_radius_km(r_km: f64, earth_radius_m: f64) -> f64 {
    let alpha = (r_km * 1000.0) / earth_radius_m;
    2.0 * (alpha / 2.0).sin()
}

struct GroundSpaceInner {
    locations: HashMap<String, RequestLocation>,
}

/// Lazily-rebuilt spatial index over active requests.
///
/// The fields touched by a rebuild are individually `Arc`-wrapped so that
/// `maybe_rebuild` can hand the snapshot-build-swap sequence to a detached
/// `spawn_blocking` task when a Tokio runtime is reachable, rather than
/// building the tree on the caller's thread.
pub struct GroundSpace {
    inner: Arc<Mutex<GroundSpaceInner>>,
    tree: Arc<Mutex<Arc<RTree<IndexedPoint>>>>,
    dirty: Arc<AtomicU64>,
    rebuild_in_flight: Arc<AtomicBool>,
    last_rebuild: Arc<Mutex<Instant>>,
    rebuild_threshold: u64,
    max_stale: Duration,
    earth_radius_m: f64,
}

impl GroundSpace {
    pub fn new(rebuild_threshold: u64, max_stale_secs: u64, earth_radius_m: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(GroundSpaceInner { locations: HashMap::new() })),
            tree: Arc::new(Mutex::new(Arc::new(RTree::new()))),
            dirty: Arc::new(AtomicU64::new(0)),
            rebuild_in_flight: Arc::new(AtomicBool::new(false)),
            last_rebuild: Arc::new(Mutex::new(Instant::now())),
            rebuild_threshold,
            max_stale: Duration::from_secs(max_stale_secs),
            earth_radius_m,
        }
    }

    pub fn add_request(&self, id: impl Into<String>, lat_deg: f64, lon_deg: f64) {
        let id = id.into();
        self.inner.lock().locations.insert(id.clone(), RequestLocation { id, lat_deg, lon_deg });
        self.dirty.fetch_add(1, Ordering::SeqCst);
        self.maybe_rebuild();
    }

    pub fn remove_request(&self, id: &str) {
        self.inner.lock().locations.remove(id);
        self.dirty.fetch_add(1, Ordering::SeqCst);
        self.maybe_rebuild();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rebuild the tree now if the dirty counter or staleness thresholds
    /// are crossed and no rebuild is currently in flight. Takes a snapshot
    /// of the locations under the inner lock, builds the tree outside any
    /// lock, then swaps it in under the tree lock. Queries concurrent with
    /// a rebuild observe the previous tree.
    ///
    /// When a Tokio runtime is reachable from the caller, the snapshot/build/
    /// swap sequence runs as a detached `spawn_blocking` task so the caller
    /// (the routing plane's request thread) never blocks on the R-tree
    /// build; `rebuild_in_flight` keeps at most one such task outstanding.
    /// Callers with no runtime in scope (plain unit tests) get the same
    /// sequence run inline.
    pub fn maybe_rebuild(&self) {
        let should = self.dirty.load(Ordering::SeqCst) >= self.rebuild_threshold
            || self.last_rebuild.lock().elapsed() >= self.max_stale;
        if !should {
            return;
        }
        if self
            .rebuild_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let inner = self.inner.clone();
        let tree = self.tree.clone();
        let dirty = self.dirty.clone();
        let rebuild_in_flight = self.rebuild_in_flight.clone();
        let last_rebuild = self.last_rebuild.clone();

        let rebuild = move || {
            let snapshot: Vec<IndexedPoint> = {
                let g = inner.lock();
                g.locations
                    .values()
                    .map(|r| IndexedPoint { id: r.id.clone(), point: latlon_to_unit_sphere(r.lat_deg, r.lon_deg) })
                    .collect()
            };
            let new_tree = RTree::bulk_load(snapshot);

            *tree.lock() = Arc::new(new_tree);
            dirty.store(0, Ordering::SeqCst);
            *last_rebuild.lock() = Instant::now();
            rebuild_in_flight.store(false, Ordering::SeqCst);
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(rebuild);
            }
            Err(_) => rebuild(),
        }
    }

    fn snapshot_tree(&self) -> Arc<RTree<IndexedPoint>> {
        self.tree.lock().clone()
    }

    /// Count of active requests within `r_km` of `(lat_deg, lon_deg)`.
    pub fn nearby_count(&self, lat_deg: f64, lon_deg: f64, r_km: f64) -> usize {
        self.nearby_requests(lat_deg, lon_deg, r_km).len()
    }

    /// Requests within `r_km` of `(lat_deg, lon_deg)`, sorted by ascending
    /// exact distance. The chord-distance ball query over-approximates; every
    /// candidate is re-verified with exact haversine before being returned.
    pub fn nearby_requests(&self, lat_deg: f64, lon_deg: f64, r_km: f64) -> Vec<RequestLocation> {
        let tree = self.snapshot_tree();
        let query_point = latlon_to_unit_sphere(lat_deg, lon_deg);
        let chord = chord_for_radius_km(r_km, self.earth_radius_m);
        let chord_sq = chord * chord;

        let inner = self.inner.lock();
        let mut out: Vec<(f64, RequestLocation)> = tree
            .locate_within_distance(query_point, chord_sq)
            .filter_map(|candidate| {
                let loc = inner.locations.get(&candidate.id)?.clone();
                let d_km = haversine_km(lat_deg, lon_deg, loc.lat_deg, loc.lon_deg, self.earth_radius_m);
                if d_km <= r_km {
                    Some((d_km, loc))
                } else {
                    None
                }
            })
            .collect();
        out.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        out.into_iter().map(|(_, loc)| loc).collect()
    }

    /// Requests near another request's own location (resolves the anchor
    /// request's coordinates first).
    pub fn nearby_to_request(&self, id: &str, r_km: f64) -> Option<Vec<RequestLocation>> {
        let anchor = self.inner.lock().locations.get(id)?.clone();
        Some(self.nearby_requests(anchor.lat_deg, anchor.lon_deg, r_km))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EARTH_RADIUS_M: f64 = 6_371_000.0;

    #[test]
    fn nearby_requests_respects_radius() {
        let gs = GroundSpace::new(1, 3600, EARTH_RADIUS_M);
        gs.add_request("r1", 13.75, 100.5);
        gs.add_request("r2", 13.76, 100.51);
        gs.add_request("r3", 50.0, 50.0);

        let found = gs.nearby_requests(13.75, 100.5, 50.0);
        let ids: Vec<&str> = found.iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&"r1"));
        assert!(ids.contains(&"r2"));
        assert!(!ids.contains(&"r3"));
    }

    #[test]
    fn remove_request_drops_it_from_results() {
        let gs = GroundSpace::new(1, 3600, EARTH_RADIUS_M);
        gs.add_request("r1", 13.75, 100.5);
        gs.remove_request("r1");
        let found = gs.nearby_requests(13.75, 100.5, 50.0);
        assert!(found.is_empty());
    }

    #[test]
    fn nearby_to_request_resolves_anchor_location() {
        let gs = GroundSpace::new(1, 3600, EARTH_RADIUS_M);
        gs.add_request("anchor", 13.75, 100.5);
        gs.add_request("other", 13.76, 100.51);
        let found = gs.nearby_to_request("anchor", 50.0).unwrap();
        assert!(found.iter().any(|r| r.id == "other"));
    }

    #[test]
    fn results_sorted_by_ascending_distance() {
        let gs = GroundSpace::new(10, 3600, EARTH_RADIUS_M);
        gs.add_request("far", 13.90, 100.7);
        gs.add_request("near", 13.751, 100.501);
        let found = gs.nearby_requests(13.75, 100.5, 200.0);
        assert_eq!(found[0].id, "near");
    }
}
