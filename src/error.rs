//! Error types for the SAGIN routing and admission controller.
//!
//! Only faults that can actually surface as an `Err` to a caller live here.
//! Intra-step faults that the routing plane absorbs (invalid action,
//! propagation skip, empty planner result) are represented as typed values
//! on the domain types instead — see `env::StepOutcome` and
//! `planner::PlanResult`.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories, used to pick a log level and a retry posture at the
/// call site rather than to drive any automatic retry machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Startup/topology loading errors.
    Startup,
    /// Resource admission/commit failures.
    Admission,
    /// Aggregator persistence errors.
    Persistence,
    /// Malformed external input (HTTP payloads, config).
    Validation,
}

impl ErrorCategory {
    /// Severity used to pick a tracing level when logging this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Startup => ErrorSeverity::Critical,
            Self::Admission => ErrorSeverity::High,
            Self::Persistence => ErrorSeverity::High,
            Self::Validation => ErrorSeverity::Low,
        }
    }
}

/// Severity levels for monitoring and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Errors produced by the SAGIN routing and admission controller.
#[derive(Debug, Error)]
pub enum Error {
    /// The topology datastore could not be loaded at startup. Fatal.
    #[error("failed to load topology from {path}: {source}")]
    TopologyLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The topology snapshot failed to parse.
    #[error("malformed topology snapshot: {0}")]
    TopologyParse(#[from] serde_json::Error),

    /// The admission floor was violated at commit time. Not expected under
    /// the single-writer routing plane, but enforced defensively.
    #[error("commit failed: admission floor violated on node {node_id} for resource {resource}")]
    CommitFailure { node_id: String, resource: String },

    /// The statistics log could not be read or written.
    #[error("stats log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The statistics log is malformed (header mismatch, short row, bad field).
    #[error("stats log error: {0}")]
    Csv(#[from] csv::Error),

    /// A configuration value was missing or could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::TopologyLoad { .. } | Error::TopologyParse(_) => ErrorCategory::Startup,
            Error::CommitFailure { .. } => ErrorCategory::Admission,
            Error::Io(_) | Error::Csv(_) => ErrorCategory::Persistence,
            Error::Config(_) => ErrorCategory::Validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_matches_severity_table() {
        let e = Error::CommitFailure { node_id: "gs-1".into(), resource: "uplink".into() };
        assert_eq!(e.category(), ErrorCategory::Admission);
        assert_eq!(e.category().severity(), ErrorSeverity::High);
    }

    #[test]
    fn display_includes_node_id() {
        let e = Error::CommitFailure { node_id: "sat-42".into(), resource: "isl".into() };
        assert!(e.to_string().contains("sat-42"));
    }
}
