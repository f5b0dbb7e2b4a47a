//! Link-model helpers shared by the planner and the routing environment:
//! processing delay, hop latency, and link reliability.

use crate::node::NodeKind;
use crate::request::ServiceType;

/// Endpoint kind as used by the processing-delay and reliability tables.
/// A superset of [`NodeKind`]: `User` stands for the request's own source
/// location, which is not itself a network node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    GroundStation,
    SeaStation,
    Leo,
    Geo,
    User,
}

impl From<NodeKind> for EndpointKind {
    fn from(k: NodeKind) -> Self {
        match k {
            NodeKind::GroundStation => EndpointKind::GroundStation,
            NodeKind::SeaStation => EndpointKind::SeaStation,
            NodeKind::Leo => EndpointKind::Leo,
            NodeKind::Geo => EndpointKind::Geo,
        }
    }
}

/// Per-kind base processing delay in ms.
fn proc_delay_base_ms(kind: EndpointKind) -> f64 {
    match kind {
        EndpointKind::Leo => 2.5,
        EndpointKind::Geo => 7.0,
        EndpointKind::SeaStation => 4.5,
        EndpointKind::GroundStation => 7.0,
        EndpointKind::User => 3.0,
    }
}

/// Processing delay (ms) for one endpoint, scaled by service class.
pub fn service_proc_delay_ms(kind: EndpointKind, service: ServiceType) -> f64 {
    proc_delay_base_ms(kind) * service.processing_delay_scale()
}

/// Total hop latency (ms): propagation + mean of both endpoints' processing
/// delays.
pub fn hop_latency_ms(
    distance_m: f64,
    a: EndpointKind,
    b: EndpointKind,
    service: ServiceType,
    speed_of_light_m_s: f64,
) -> f64 {
    let prop_ms = (distance_m / speed_of_light_m_s) * 1000.0;
    let proc_ms = 0.5 * (service_proc_delay_ms(a, service) + service_proc_delay_ms(b, service));
    prop_ms + proc_ms
}

/// Gamma (reliability decay constant) for an unordered endpoint-kind pair,
/// falling back to `0.7e-4` when the pair is not in the table.
fn pick_gamma(a: EndpointKind, b: EndpointKind) -> f64 {
    use EndpointKind::*;
    let pair = (a, b);
    let gamma = match pair {
        (GroundStation, User) | (User, GroundStation) => Some(1.2e-4),
        (GroundStation, Leo) | (Leo, GroundStation) => Some(2.5e-5),
        (Leo, Leo) => Some(1.0e-5),
        (Leo, Geo) | (Geo, Leo) => Some(1.5e-6),
        (GroundStation, Geo) | (Geo, GroundStation) => Some(1.5e-6),
        (SeaStation, Leo) | (Leo, SeaStation) => Some(3.0e-5),
        _ => None,
    };
    gamma.unwrap_or(0.7e-4)
}

/// Link reliability `exp(-gamma * d_km)` for a hop of length `distance_m`.
pub fn link_reliability(a: EndpointKind, b: EndpointKind, distance_m: f64) -> f64 {
    let d_km = distance_m / 1000.0;
    let gamma = pick_gamma(a, b);
    (-gamma * d_km).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_latency_matches_link_model_formula() {
        let d_m = 1000.0;
        let service = ServiceType::Data;
        let got = hop_latency_ms(d_m, EndpointKind::User, EndpointKind::GroundStation, service, 3.0e8);
        let expected = (d_m / 3.0e8) * 1000.0
            + 0.5 * (service_proc_delay_ms(EndpointKind::User, service) + service_proc_delay_ms(EndpointKind::GroundStation, service));
        assert!((got - expected).abs() < 1e-9);
    }

    #[test]
    fn emergency_halves_processing_delay() {
        let normal = service_proc_delay_ms(EndpointKind::GroundStation, ServiceType::Data);
        let emergency = service_proc_delay_ms(EndpointKind::GroundStation, ServiceType::Emergency);
        assert!((emergency - normal * 0.5).abs() < 1e-9);
    }

    #[test]
    fn unknown_pair_falls_back_to_default_gamma() {
        let r1 = link_reliability(EndpointKind::SeaStation, EndpointKind::SeaStation, 100.0);
        let expected = (-0.7e-4_f64 * 100.0).exp();
        assert!((r1 - expected).abs() < 1e-9);
    }

    #[test]
    fn gamma_lookup_is_order_independent() {
        let a = link_reliability(EndpointKind::GroundStation, EndpointKind::Leo, 500.0);
        let b = link_reliability(EndpointKind::Leo, EndpointKind::GroundStation, 500.0);
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn reliability_decreases_with_distance() {
        let near = link_reliability(EndpointKind::Leo, EndpointKind::Leo, 100.0);
        let far = link_reliability(EndpointKind::Leo, EndpointKind::Leo, 10_000.0);
        assert!(near > far);
    }
}
