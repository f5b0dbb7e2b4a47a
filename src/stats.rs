//! Statistics aggregator: compares the routing environment's agent path
//! against the planner's reference path for every request, and exposes
//! aggregate and time-series win-rate views over the history.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::Result;

/// Welford's online algorithm for running mean/variance.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunningStats {
    n: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn update(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        if self.n < 2 {
            0.0
        } else {
            self.m2 / (self.n - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// One side's (agent or planner) outcome for a single request.
#[derive(Debug, Clone, Default)]
pub struct SideResult {
    pub success: bool,
    pub hops: u32,
    pub latency: f64,
    pub uplink: f64,
    pub downlink: f64,
    pub reliability: f64,
    pub cpu: f64,
    pub power: f64,
}

#[derive(Debug, Clone)]
struct StatEntry {
    timestamp: f64,
    request_id: String,
    agent: SideResult,
    planner: SideResult,
}

/// Per-side running stats, grouped so `record` can update both halves with
/// one call each.
#[derive(Debug, Default, Clone, Copy)]
struct SideStats {
    hops: RunningStats,
    latency: RunningStats,
    uplink: RunningStats,
    downlink: RunningStats,
    reliability: RunningStats,
    cpu: RunningStats,
    power: RunningStats,
}

impl SideStats {
    fn update(&mut self, side: &SideResult) {
        self.hops.update(side.hops as f64);
        self.latency.update(side.latency);
        self.uplink.update(side.uplink);
        self.downlink.update(side.downlink);
        self.reliability.update(side.reliability);
        self.cpu.update(side.cpu);
        self.power.update(side.power);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeSeriesPoint {
    pub name: String,
    pub agent_win_rate: f64,
    pub planner_win_rate: f64,
    pub draw_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateStats {
    pub total_requests: u64,
    pub agent_success_rate: f64,
    pub planner_success_rate: f64,
    pub overall_agent_win_rate: f64,
    pub overall_planner_win_rate: f64,
    pub overall_draw_rate: f64,
    pub agent_avg_hops: f64,
    pub planner_avg_hops: f64,
    pub agent_avg_latency: f64,
    pub planner_avg_latency: f64,
    pub agent_avg_uplink: f64,
    pub planner_avg_uplink: f64,
    pub agent_avg_downlink: f64,
    pub planner_avg_downlink: f64,
    pub agent_avg_reliability: f64,
    pub planner_avg_reliability: f64,
    pub agent_avg_cpu: f64,
    pub planner_avg_cpu: f64,
    pub agent_avg_power: f64,
    pub planner_avg_power: f64,
    pub agent_alloc_uplink_stddev: f64,
    pub agent_alloc_downlink_stddev: f64,
    pub agent_alloc_cpu_stddev: f64,
    pub agent_alloc_power_stddev: f64,
    pub planner_alloc_uplink_stddev: f64,
    pub planner_alloc_downlink_stddev: f64,
    pub planner_alloc_cpu_stddev: f64,
    pub planner_alloc_power_stddev: f64,
}

const CSV_HEADER: &[&str] = &[
    "timestamp", "request_id", "agent_success", "planner_success",
    "agent_hops", "planner_hops",
    "agent_latency", "agent_uplink", "agent_downlink", "agent_reliability", "agent_cpu", "agent_power",
    "planner_latency", "planner_uplink", "planner_downlink", "planner_reliability", "planner_cpu", "planner_power",
];

struct Inner {
    total_requests: u64,
    agent_total_success: u64,
    planner_total_success: u64,
    agent_total_win: u64,
    planner_total_win: u64,
    total_draws: u64,
    agent_stats: SideStats,
    planner_stats: SideStats,
    current_batch: Vec<StatEntry>,
    time_series: Vec<TimeSeriesPoint>,
}

impl Inner {
    fn new() -> Self {
        Self {
            total_requests: 0,
            agent_total_success: 0,
            planner_total_success: 0,
            agent_total_win: 0,
            planner_total_win: 0,
            total_draws: 0,
            agent_stats: SideStats::default(),
            planner_stats: SideStats::default(),
            current_batch: Vec::new(),
            time_series: Vec::new(),
        }
    }

    fn apply(&mut self, entry: &StatEntry) {
        self.total_requests += 1;
        if entry.agent.success {
            self.agent_total_success += 1;
        }
        if entry.planner.success {
            self.planner_total_success += 1;
        }
        self.agent_stats.update(&entry.agent);
        self.planner_stats.update(&entry.planner);

        match winner(entry) {
            Winner::Agent => self.agent_total_win += 1,
            Winner::Planner => self.planner_total_win += 1,
            Winner::Draw => self.total_draws += 1,
        }
    }

    fn push_batch(&mut self, entry: StatEntry, batch_size: usize, window: usize) {
        self.current_batch.push(entry);
        if self.current_batch.len() >= batch_size {
            self.flush_batch(window);
        }
    }

    fn flush_batch(&mut self, window: usize) {
        if self.current_batch.is_empty() {
            return;
        }
        let len = self.current_batch.len();
        let mut agent_wins = 0u64;
        let mut planner_wins = 0u64;
        let mut draws = 0u64;
        for entry in &self.current_batch {
            match winner(entry) {
                Winner::Agent => agent_wins += 1,
                Winner::Planner => planner_wins += 1,
                Winner::Draw => draws += 1,
            }
        }
        let batch_number = self.time_series.len() + 1;
        self.time_series.push(TimeSeriesPoint {
            name: format!("Batch {batch_number}"),
            agent_win_rate: round2(agent_wins as f64 / len as f64 * 100.0),
            planner_win_rate: round2(planner_wins as f64 / len as f64 * 100.0),
            draw_rate: round2(draws as f64 / len as f64 * 100.0),
        });
        if self.time_series.len() > window {
            let excess = self.time_series.len() - window;
            self.time_series.drain(0..excess);
        }
        self.current_batch.clear();
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

enum Winner {
    Agent,
    Planner,
    Draw,
}

/// Per-request winner: majority vote across hops/latency/uplink/downlink/
/// reliability/cpu/power, lower-is-better on every metric. A planner side
/// with zero hops (no reference path found) is an automatic agent win.
fn winner(entry: &StatEntry) -> Winner {
    if entry.planner.hops == 0 {
        return Winner::Agent;
    }

    let mut agent_score = 0i32;
    let mut planner_score = 0i32;

    let mut vote_lower_better = |a: f64, p: f64| {
        if a < p {
            agent_score += 1;
        } else if a > p {
            planner_score += 1;
        }
    };
    vote_lower_better(entry.agent.hops as f64, entry.planner.hops as f64);
    vote_lower_better(entry.agent.latency, entry.planner.latency);

    let mut vote_higher_better = |a: f64, p: f64| {
        if a > p {
            agent_score += 1;
        } else if a < p {
            planner_score += 1;
        }
    };
    vote_higher_better(entry.agent.uplink, entry.planner.uplink);
    vote_higher_better(entry.agent.downlink, entry.planner.downlink);
    vote_higher_better(entry.agent.reliability, entry.planner.reliability);
    vote_higher_better(entry.agent.cpu, entry.planner.cpu);
    vote_higher_better(entry.agent.power, entry.planner.power);

    match agent_score.cmp(&planner_score) {
        std::cmp::Ordering::Greater => Winner::Agent,
        std::cmp::Ordering::Less => Winner::Planner,
        std::cmp::Ordering::Equal => Winner::Draw,
    }
}

/// The live aggregator: in-memory running stats plus an append-only CSV
/// replay log, all guarded by one lock (mirrors the original's single
/// `threading.Lock` around every mutation).
pub struct StatsManager {
    inner: Mutex<Inner>,
    log_path: PathBuf,
    batch_size: usize,
    time_series_window: usize,
}

impl StatsManager {
    /// Construct a manager, replaying `log_path` if it exists and its header
    /// matches; otherwise a fresh header is written (or the file is
    /// recreated if the header mismatches an existing file).
    pub fn load(log_path: impl AsRef<Path>, batch_size: usize, time_series_window: usize) -> Result<Self> {
        let log_path = log_path.as_ref().to_path_buf();
        let mut inner = Inner::new();
        let needs_header = Self::replay(&log_path, &mut inner, batch_size, time_series_window)?;
        if needs_header {
            Self::write_header(&log_path)?;
        }
        Ok(Self { inner: Mutex::new(inner), log_path, batch_size, time_series_window })
    }

    /// Returns `true` if the caller must (re)write the CSV header: either
    /// the file doesn't exist yet, or its header didn't match and it was
    /// truncated.
    fn replay(log_path: &Path, inner: &mut Inner, batch_size: usize, window: usize) -> Result<bool> {
        if !log_path.exists() {
            return Ok(true);
        }
        let mut reader = csv::Reader::from_path(log_path)?;
        let headers = reader.headers()?.clone();
        let expected: Vec<String> = CSV_HEADER.iter().map(|s| s.to_string()).collect();
        if headers.iter().collect::<Vec<_>>() != expected.iter().map(|s| s.as_str()).collect::<Vec<_>>() {
            tracing::warn!(path = %log_path.display(), "stats log header mismatch, recreating");
            std::fs::write(log_path, "")?;
            return Ok(true);
        }

        for record in reader.records() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed stats log row");
                    continue;
                }
            };
            let Some(entry) = parse_record(&record) else {
                tracing::warn!("skipping malformed stats log row");
                continue;
            };
            inner.apply(&entry);
            inner.push_batch(entry, batch_size, window);
        }
        Ok(false)
    }

    fn write_header(log_path: &Path) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().from_path(log_path)?;
        writer.write_record(CSV_HEADER)?;
        writer.flush()?;
        Ok(())
    }

    fn append_row(&self, entry: &StatEntry) -> Result<()> {
        let file = std::fs::OpenOptions::new().append(true).create(true).open(&self.log_path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record([
            entry.timestamp.to_string(),
            entry.request_id.clone(),
            entry.agent.success.to_string(),
            entry.planner.success.to_string(),
            entry.agent.hops.to_string(),
            entry.planner.hops.to_string(),
            entry.agent.latency.to_string(),
            entry.agent.uplink.to_string(),
            entry.agent.downlink.to_string(),
            entry.agent.reliability.to_string(),
            entry.agent.cpu.to_string(),
            entry.agent.power.to_string(),
            entry.planner.latency.to_string(),
            entry.planner.uplink.to_string(),
            entry.planner.downlink.to_string(),
            entry.planner.reliability.to_string(),
            entry.planner.cpu.to_string(),
            entry.planner.power.to_string(),
        ])?;
        writer.flush()?;
        Ok(())
    }

    /// Record one request's agent-vs-planner outcome: updates in-memory
    /// stats, appends a CSV row, and feeds the time-series batcher.
    /// `timestamp_s` is passed in by the caller (seconds since the Unix
    /// epoch) rather than sampled internally, so this stays deterministic
    /// and testable.
    pub fn record_request(&self, request_id: impl Into<String>, timestamp_s: f64, agent: SideResult, planner: SideResult) -> Result<()> {
        let entry = StatEntry { timestamp: timestamp_s, request_id: request_id.into(), agent, planner };
        self.append_row(&entry)?;
        let mut inner = self.inner.lock();
        inner.apply(&entry);
        inner.push_batch(entry, self.batch_size, self.time_series_window);
        Ok(())
    }

    pub fn aggregate(&self) -> AggregateStats {
        let inner = self.inner.lock();
        let total = inner.total_requests;
        let pct = |n: u64| if total == 0 { 0.0 } else { n as f64 / total as f64 * 100.0 };
        AggregateStats {
            total_requests: total,
            agent_success_rate: pct(inner.agent_total_success),
            planner_success_rate: pct(inner.planner_total_success),
            overall_agent_win_rate: pct(inner.agent_total_win),
            overall_planner_win_rate: pct(inner.planner_total_win),
            overall_draw_rate: pct(inner.total_draws),
            agent_avg_hops: inner.agent_stats.hops.mean(),
            planner_avg_hops: inner.planner_stats.hops.mean(),
            agent_avg_latency: inner.agent_stats.latency.mean(),
            planner_avg_latency: inner.planner_stats.latency.mean(),
            agent_avg_uplink: inner.agent_stats.uplink.mean(),
            planner_avg_uplink: inner.planner_stats.uplink.mean(),
            agent_avg_downlink: inner.agent_stats.downlink.mean(),
            planner_avg_downlink: inner.planner_stats.downlink.mean(),
            agent_avg_reliability: inner.agent_stats.reliability.mean(),
            planner_avg_reliability: inner.planner_stats.reliability.mean(),
            agent_avg_cpu: inner.agent_stats.cpu.mean(),
            planner_avg_cpu: inner.planner_stats.cpu.mean(),
            agent_avg_power: inner.agent_stats.power.mean(),
            planner_avg_power: inner.planner_stats.power.mean(),
            agent_alloc_uplink_stddev: inner.agent_stats.uplink.std_dev(),
            agent_alloc_downlink_stddev: inner.agent_stats.downlink.std_dev(),
            agent_alloc_cpu_stddev: inner.agent_stats.cpu.std_dev(),
            agent_alloc_power_stddev: inner.agent_stats.power.std_dev(),
            planner_alloc_uplink_stddev: inner.planner_stats.uplink.std_dev(),
            planner_alloc_downlink_stddev: inner.planner_stats.downlink.std_dev(),
            planner_alloc_cpu_stddev: inner.planner_stats.cpu.std_dev(),
            planner_alloc_power_stddev: inner.planner_stats.power.std_dev(),
        }
    }

    /// Last `time_series_window` batches, flushing a partial in-progress
    /// batch first (mirrors the original always calling `_process_batch`
    /// before reading).
    pub fn time_series(&self) -> Vec<TimeSeriesPoint> {
        let mut inner = self.inner.lock();
        inner.flush_batch(self.time_series_window);
        inner.time_series.clone()
    }
}

fn parse_record(record: &csv::StringRecord) -> Option<StatEntry> {
    let get = |i: usize| record.get(i);
    Some(StatEntry {
        timestamp: get(0)?.parse().ok()?,
        request_id: get(1)?.to_string(),
        agent: SideResult {
            success: get(2)?.eq_ignore_ascii_case("true"),
            hops: get(4)?.parse().ok()?,
            latency: get(6)?.parse().ok()?,
            uplink: get(7)?.parse().ok()?,
            downlink: get(8)?.parse().ok()?,
            reliability: get(9)?.parse().ok()?,
            cpu: get(10)?.parse().ok()?,
            power: get(11)?.parse().ok()?,
        },
        planner: SideResult {
            success: get(3)?.eq_ignore_ascii_case("true"),
            hops: get(5)?.parse().ok()?,
            latency: get(12)?.parse().ok()?,
            uplink: get(13)?.parse().ok()?,
            downlink: get(14)?.parse().ok()?,
            reliability: get(15)?.parse().ok()?,
            cpu: get(16)?.parse().ok()?,
            power: get(17)?.parse().ok()?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile_path::unique_csv_path;

    mod tempfile_path {
        use std::path::PathBuf;
        use std::sync::atomic::{AtomicU64, Ordering};

        static COUNTER: AtomicU64 = AtomicU64::new(0);

        pub fn unique_csv_path(tag: &str) -> PathBuf {
            let n = COUNTER.fetch_add(1, Ordering::SeqCst);
            std::env::temp_dir().join(format!("sagin_stats_test_{tag}_{n}.csv"))
        }
    }

    fn good_agent() -> SideResult {
        SideResult { success: true, hops: 3, latency: 100.0, uplink: 2.0, downlink: 10.0, reliability: 0.98, cpu: 10.0, power: 20.0 }
    }

    fn worse_planner() -> SideResult {
        SideResult { success: true, hops: 5, latency: 150.0, uplink: 2.0, downlink: 10.0, reliability: 0.95, cpu: 10.0, power: 20.0 }
    }

    #[test]
    fn running_stats_matches_known_mean_and_variance() {
        let mut stats = RunningStats::default();
        for x in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stats.update(x);
        }
        assert!((stats.mean() - 5.0).abs() < 1e-9);
        assert!((stats.variance() - 4.571428571428571).abs() < 1e-9);
    }

    #[test]
    fn record_request_updates_aggregate_and_replays() {
        let path = unique_csv_path("replay");
        let _ = std::fs::remove_file(&path);
        {
            let mgr = StatsManager::load(&path, 50, 10).unwrap();
            mgr.record_request("r1", 1000.0, good_agent(), worse_planner()).unwrap();
            let agg = mgr.aggregate();
            assert_eq!(agg.total_requests, 1);
            assert_eq!(agg.overall_agent_win_rate, 100.0);
        }
        {
            let mgr = StatsManager::load(&path, 50, 10).unwrap();
            let agg = mgr.aggregate();
            assert_eq!(agg.total_requests, 1);
        }
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn batch_flush_produces_time_series_point() {
        let path = unique_csv_path("batch");
        let _ = std::fs::remove_file(&path);
        let mgr = StatsManager::load(&path, 2, 10).unwrap();
        mgr.record_request("r1", 1.0, good_agent(), worse_planner()).unwrap();
        mgr.record_request("r2", 2.0, good_agent(), worse_planner()).unwrap();
        let series = mgr.time_series();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].agent_win_rate, 100.0);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn zero_planner_hops_is_automatic_agent_win() {
        let agent = good_agent();
        let planner = SideResult::default();
        let entry = StatEntry { timestamp: 0.0, request_id: "x".into(), agent, planner };
        assert!(matches!(winner(&entry), Winner::Agent));
    }
}
