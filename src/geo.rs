//! Geometry and orbital primitives: distances, coordinate conversions,
//! circular-orbit propagation, elevation angles, and visibility search.
//!
//! All angles in the public API are degrees; all internal trig uses radians.

use std::f64::consts::PI;

/// A geographic position. `alt_m` is height above the nominal Earth sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_m: f64,
}

impl Position {
    pub fn new(lat_deg: f64, lon_deg: f64, alt_m: f64) -> Self {
        Self { lat_deg, lon_deg, alt_m }
    }
}

/// A point in an Earth-centred Cartesian frame (ECEF/ECI alike — this crate
/// never distinguishes frame rotation speed, since GEO is treated as fixed
/// and LEO propagation folds RAAN rotation into the orbital-plane rotation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cartesian {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Cartesian {
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn dot(&self, other: &Cartesian) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn sub(&self, other: &Cartesian) -> Cartesian {
        Cartesian { x: self.x - other.x, y: self.y - other.y, z: self.z - other.z }
    }
}

/// Distance mode for [`distance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMode {
    /// Great-circle distance on the nominal Earth sphere (altitude ignored).
    Surface,
    /// Straight-line Cartesian distance on the sphere of radius `R + alt`.
    ThreeD,
}

/// Convert a geographic position to Cartesian coordinates on the sphere of
/// radius `earth_radius_m + alt_m`.
pub fn to_cartesian(pos: Position, earth_radius_m: f64) -> Cartesian {
    let lat = pos.lat_deg.to_radians();
    let lon = pos.lon_deg.to_radians();
    let r = earth_radius_m + pos.alt_m;
    Cartesian {
        x: r * lat.cos() * lon.cos(),
        y: r * lat.cos() * lon.sin(),
        z: r * lat.sin(),
    }
}

/// Recover a geographic position from a Cartesian point, given the nominal
/// Earth radius (altitude is `|point| - earth_radius_m`).
pub fn from_cartesian(p: Cartesian, earth_radius_m: f64) -> Position {
    let r = p.norm();
    let lat_deg = (p.z / r).asin().to_degrees();
    let lon_deg = normalize_lon_deg(p.y.atan2(p.x).to_degrees());
    Position { lat_deg, lon_deg, alt_m: r - earth_radius_m }
}

fn normalize_lon_deg(mut lon: f64) -> f64 {
    while lon > 180.0 {
        lon -= 360.0;
    }
    while lon < -180.0 {
        lon += 360.0;
    }
    lon
}

/// Great-circle distance between two points, ignoring altitude, in metres.
pub fn haversine_m(a: Position, b: Position, earth_radius_m: f64) -> f64 {
    let lat1 = a.lat_deg.to_radians();
    let lat2 = b.lat_deg.to_radians();
    let dlat = (b.lat_deg - a.lat_deg).to_radians();
    let dlon = (b.lon_deg - a.lon_deg).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * earth_radius_m * h.sqrt().asin()
}

/// Distance between two positions under the requested mode, in metres.
pub fn distance(a: Position, b: Position, mode: DistanceMode, earth_radius_m: f64) -> f64 {
    match mode {
        DistanceMode::Surface => haversine_m(a, b, earth_radius_m),
        DistanceMode::ThreeD => {
            let ca = to_cartesian(a, earth_radius_m);
            let cb = to_cartesian(b, earth_radius_m);
            ca.sub(&cb).norm()
        }
    }
}

/// Propagation delay in ms for a link of length `d_m` metres.
pub fn propagation_delay_ms(d_m: f64, speed_of_light_m_s: f64) -> f64 {
    (d_m / speed_of_light_m_s) * 1000.0
}

/// Elevation angle (degrees) of a satellite at Cartesian position `sat`, as
/// seen from a ground point at Cartesian position `ground`.
///
/// Computed as the complement of the angle between the ground point's local
/// up vector (its own position vector, on a sphere) and the line of sight to
/// the satellite.
pub fn elevation_angle_deg(ground: Cartesian, sat: Cartesian) -> f64 {
    let up = ground;
    let los = sat.sub(&ground);
    let up_norm = up.norm();
    let los_norm = los.norm();
    if up_norm == 0.0 || los_norm == 0.0 {
        return -90.0;
    }
    let cos_zenith = up.dot(&los) / (up_norm * los_norm);
    let zenith_angle = cos_zenith.clamp(-1.0, 1.0).acos();
    90.0 - zenith_angle.to_degrees()
}

/// Minimum distance from the origin to the line segment `a`-`b`.
///
/// Used for satellite-to-satellite line-of-sight: the segment must stay
/// outside the Earth sphere of radius `earth_radius_m`.
pub fn min_distance_segment_to_origin(a: Cartesian, b: Cartesian) -> f64 {
    let ab = b.sub(&a);
    let ab_len2 = ab.dot(&ab);
    if ab_len2 == 0.0 {
        return a.norm();
    }
    // project origin onto the line through a,b; t is the segment parameter.
    let t = (-(a.dot(&ab))) / ab_len2;
    let t_clamped = t.clamp(0.0, 1.0);
    let closest = Cartesian {
        x: a.x + ab.x * t_clamped,
        y: a.y + ab.y * t_clamped,
        z: a.z + ab.z * t_clamped,
    };
    closest.norm()
}

/// Circular-orbit parameters for a LEO satellite. GEO satellites are treated
/// as fixed in the Earth-fixed frame and never propagated.
#[derive(Debug, Clone, Copy)]
pub struct OrbitParams {
    pub period_s: f64,
    pub inclination_deg: f64,
    pub raan_deg: f64,
}

/// Advance a circular orbit from `theta0` at `t0` to `t_now`, returning the
/// new `theta` and the new geographic position. Idempotent at equal target
/// times: calling with the same `t_now` twice yields the same `theta`.
///
/// Callers must additionally honour `min_propagation_interval_s`: if
/// `t_now - t0` is below that bound the call should be skipped entirely (a
/// no-op) rather than invoking this function; this function itself performs
/// the unconditional math.
pub fn propagate_circular_orbit(
    orbit: OrbitParams,
    theta0: f64,
    t0_s: f64,
    t_now_s: f64,
    alt_m: f64,
    earth_radius_m: f64,
) -> (f64, Position) {
    let dt = t_now_s - t0_s;
    let two_pi = 2.0 * PI;
    let mut theta = (theta0 + two_pi * dt / orbit.period_s) % two_pi;
    if theta < 0.0 {
        theta += two_pi;
    }

    let r = earth_radius_m + alt_m;
    // Position in the orbital plane.
    let (x0, y0, z0) = (r * theta.cos(), r * theta.sin(), 0.0);

    let inc = orbit.inclination_deg.to_radians();
    // Rotate by inclination around the line of nodes (x axis).
    let x1 = x0;
    let y1 = y0 * inc.cos() - z0 * inc.sin();
    let z1 = y0 * inc.sin() + z0 * inc.cos();

    let raan = orbit.raan_deg.to_radians();
    // Rotate by RAAN around z.
    let x2 = x1 * raan.cos() - y1 * raan.sin();
    let y2 = x1 * raan.sin() + y1 * raan.cos();
    let z2 = z1;

    let eci = Cartesian { x: x2, y: y2, z: z2 };
    let pos = from_cartesian(eci, earth_radius_m);
    (theta, pos)
}

/// Estimate how long (seconds, capped at `max_time_s`) visibility holds
/// starting "now", using monotone binary search on a time offset.
///
/// `visible_at` is evaluated on an isolated copy of the orbital state by the
/// caller (it receives only the offset `m` and must not mutate anything this
/// function can observe); the main satellite record is never touched here.
pub fn estimate_visible_time<F>(max_time_s: f64, visible_at: F) -> f64
where
    F: Fn(f64) -> bool,
{
    if !visible_at(0.0) {
        return 0.0;
    }
    if visible_at(max_time_s) {
        return max_time_s;
    }

    let mut lo = 0.0_f64;
    let mut hi = max_time_s;
    // 64 iterations gives sub-second precision well within max_time_s=7200.
    for _ in 0..64 {
        let mid = (lo + hi) / 2.0;
        if visible_at(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-6 {
            break;
        }
    }
    lo
}
