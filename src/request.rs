//! Service requests: the eight service classes, their QoS ranges and
//! reward-weight table, and the `Request` struct that flows through the
//! pipeline, environment, and planner.

use serde::{Deserialize, Serialize};

/// The eight enumerated service classes, numbered as in the source system
/// (VOICE=1 .. EMERGENCY=8) so the HTTP payload's integer `type` field
/// round-trips directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ServiceType {
    Voice = 1,
    Video = 2,
    Data = 3,
    Iot = 4,
    Streaming = 5,
    BulkTransfer = 6,
    Control = 7,
    Emergency = 8,
}

impl ServiceType {
    pub const ALL: [ServiceType; 8] = [
        ServiceType::Voice,
        ServiceType::Video,
        ServiceType::Data,
        ServiceType::Iot,
        ServiceType::Streaming,
        ServiceType::BulkTransfer,
        ServiceType::Control,
        ServiceType::Emergency,
    ];

    pub fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| *s as u8 == v)
    }

    /// Index into the one-hot observation block (0..8).
    pub fn one_hot_index(&self) -> usize {
        (*self as u8 - 1) as usize
    }

    pub fn is_emergency(&self) -> bool {
        matches!(self, ServiceType::Emergency)
    }

    pub fn is_control(&self) -> bool {
        matches!(self, ServiceType::Control)
    }

    /// QoS field ranges for random synthesis.
    pub fn qos_profile(&self) -> QosProfile {
        match self {
            ServiceType::Voice => QosProfile {
                uplink_mbps: (0.1, 0.3),
                downlink_mbps: (0.2, 0.5),
                latency_ms: (20.0, 100.0),
                reliability: (0.95, 0.99),
                priority: (2, 4),
                cpu: (1.0, 4.0),
                power: (2.0, 6.0),
            },
            ServiceType::Video => QosProfile {
                uplink_mbps: (1.0, 3.0),
                downlink_mbps: (5.0, 10.0),
                latency_ms: (50.0, 150.0),
                reliability: (0.90, 0.98),
                priority: (3, 6),
                cpu: (10.0, 30.0),
                power: (20.0, 50.0),
            },
            ServiceType::Data => QosProfile {
                uplink_mbps: (1.0, 5.0),
                downlink_mbps: (5.0, 20.0),
                latency_ms: (50.0, 200.0),
                reliability: (0.90, 0.97),
                priority: (4, 7),
                cpu: (5.0, 20.0),
                power: (10.0, 40.0),
            },
            ServiceType::Iot => QosProfile {
                uplink_mbps: (0.05, 0.3),
                downlink_mbps: (0.05, 0.2),
                latency_ms: (10.0, 100.0),
                reliability: (0.97, 0.999),
                priority: (2, 5),
                cpu: (1.0, 3.0),
                power: (1.0, 5.0),
            },
            ServiceType::Streaming => QosProfile {
                uplink_mbps: (1.0, 3.0),
                downlink_mbps: (8.0, 15.0),
                latency_ms: (50.0, 150.0),
                reliability: (0.90, 0.97),
                priority: (3, 6),
                cpu: (15.0, 40.0),
                power: (20.0, 60.0),
            },
            ServiceType::BulkTransfer => QosProfile {
                uplink_mbps: (5.0, 20.0),
                downlink_mbps: (20.0, 100.0),
                latency_ms: (100.0, 500.0),
                reliability: (0.85, 0.95),
                priority: (7, 10),
                cpu: (20.0, 50.0),
                power: (40.0, 80.0),
            },
            ServiceType::Control => QosProfile {
                uplink_mbps: (0.1, 0.5),
                downlink_mbps: (0.1, 0.5),
                latency_ms: (5.0, 50.0),
                reliability: (0.99, 0.999),
                priority: (1, 3),
                cpu: (2.0, 6.0),
                power: (5.0, 10.0),
            },
            ServiceType::Emergency => QosProfile {
                uplink_mbps: (0.5, 2.0),
                downlink_mbps: (0.5, 2.0),
                latency_ms: (1.0, 20.0),
                reliability: (0.999, 1.0),
                priority: (1, 1),
                cpu: (5.0, 15.0),
                power: (10.0, 20.0),
            },
        }
    }

    /// Reward weight quadruple `(w_lat, w_rel, w_up, w_dn)`.
    pub fn reward_weights(&self) -> RewardWeights {
        match self {
            ServiceType::Voice | ServiceType::Control | ServiceType::Emergency => {
                RewardWeights { w_lat: 0.5, w_rel: 0.3, w_up: 0.1, w_dn: 0.1 }
            }
            ServiceType::Video | ServiceType::Streaming | ServiceType::BulkTransfer => {
                RewardWeights { w_lat: 0.1, w_rel: 0.2, w_up: 0.4, w_dn: 0.3 }
            }
            ServiceType::Data => RewardWeights { w_lat: 0.2, w_rel: 0.1, w_up: 0.35, w_dn: 0.35 },
            ServiceType::Iot => RewardWeights { w_lat: 0.3, w_rel: 0.4, w_up: 0.15, w_dn: 0.15 },
        }
    }

    /// Per-kind processing delay base (ms), scaled by service class in
    /// `processing_delay_scale`.
    pub fn processing_delay_scale(&self) -> f64 {
        match self {
            ServiceType::Emergency => 0.5,
            ServiceType::Control => 0.7,
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QosProfile {
    pub uplink_mbps: (f64, f64),
    pub downlink_mbps: (f64, f64),
    pub latency_ms: (f64, f64),
    pub reliability: (f64, f64),
    pub priority: (u32, u32),
    pub cpu: (f64, f64),
    pub power: (f64, f64),
}

#[derive(Debug, Clone, Copy)]
pub struct RewardWeights {
    pub w_lat: f64,
    pub w_rel: f64,
    pub w_up: f64,
    pub w_dn: f64,
}

/// Required and allocated quantities for a single request, mirroring
/// `Classes/request.py`'s field list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Qos {
    pub uplink: f64,
    pub downlink: f64,
    pub latency_ms: f64,
    pub reliability: f64,
    pub cpu: f64,
    pub power: f64,
    pub priority: u32,
    pub packet_size: f64,
    pub demand_timeout: u32,
}

/// The planner's reference output for a request: the path it found (or empty
/// if none) and the QoS it achieves along that path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannerResult {
    pub path: Vec<String>,
    pub qos: Option<Qos>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub service_type: ServiceType,
    pub source_lat: f64,
    pub source_lon: f64,
    pub source_alt_m: f64,

    pub required: Qos,
    pub allocated: Qos,

    pub latency_actual_ms: f64,
    pub reliability_actual: f64,

    pub path: Vec<String>,
    pub real_timeout: i64,

    pub dis_path: Vec<String>,
    pub dis_qos: Option<Qos>,

    /// Carried for forward compatibility with holders of this struct; this
    /// crate's admission semantics are not partial-allocation-aware, so the
    /// field has no behavioral effect.
    pub allow_partial: bool,
    pub direct_sat_support: bool,
}

impl Request {
    pub fn new(id: impl Into<String>, service_type: ServiceType, source_lat: f64, source_lon: f64, source_alt_m: f64, required: Qos) -> Self {
        let timeout = required.demand_timeout as i64;
        Self {
            id: id.into(),
            service_type,
            source_lat,
            source_lon,
            source_alt_m,
            allocated: Qos {
                // Uplink/downlink allocated starts at the requested amount
                // (narrowed down as the path is built); cpu/power start
                // unallocated until a terminal GS grants them.
                uplink: required.uplink,
                downlink: required.downlink,
                latency_ms: 0.0,
                reliability: 0.0,
                cpu: 0.0,
                power: 0.0,
                priority: required.priority,
                packet_size: required.packet_size,
                demand_timeout: required.demand_timeout,
            },
            required,
            latency_actual_ms: 0.0,
            reliability_actual: 1.0,
            path: Vec::new(),
            real_timeout: timeout,
            dis_path: Vec::new(),
            dis_qos: None,
            allow_partial: false,
            direct_sat_support: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_type_round_trips_through_u8() {
        for s in ServiceType::ALL {
            assert_eq!(ServiceType::from_u8(s as u8), Some(s));
        }
    }

    #[test]
    fn one_hot_index_spans_zero_to_seven() {
        let indices: Vec<usize> = ServiceType::ALL.iter().map(|s| s.one_hot_index()).collect();
        assert_eq!(indices, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn emergency_scales_processing_delay_down() {
        assert_eq!(ServiceType::Emergency.processing_delay_scale(), 0.5);
        assert_eq!(ServiceType::Control.processing_delay_scale(), 0.7);
        assert_eq!(ServiceType::Data.processing_delay_scale(), 1.0);
    }
}
