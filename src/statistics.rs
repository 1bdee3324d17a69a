//! Per-manager usage statistics.
//!
//! Counters and gauges live under a single lock so every read observes one
//! consistent state, never a half-applied update.

use std::fmt::Write as _;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Point-in-time copy of a manager's statistics.
///
/// Serializes to a flat record with camelCase keys:
///
/// ```
/// use ferrous_conn::StatisticsSnapshot;
///
/// let snapshot = StatisticsSnapshot::default();
/// let json = snapshot.to_json().unwrap();
/// assert!(json.starts_with(r#"{"createConnectionTimes":0,"getConnectionTimes":0"#));
/// assert_eq!(snapshot.min_get_connection_time, f64::MAX);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    /// Driver instances created
    pub create_connection_times: u64,
    /// Successful getConnection() calls
    pub get_connection_times: u64,
    /// Connections finalized (explicitly or by a safety net)
    pub release_connection_times: u64,
    /// Connections currently tracked by the manager
    pub total_connection_count: u64,
    /// Tracked connections sitting idle
    pub free_connection_count: u64,
    /// Tracked connections checked out
    pub used_connection_count: u64,
    /// Slowest getConnection() in seconds
    pub max_get_connection_time: f64,
    /// Fastest getConnection() in seconds, `f64::MAX` until the first sample
    pub min_get_connection_time: f64,
    /// Most recent getConnection() in seconds
    pub last_get_connection_time: f64,
}

impl Default for StatisticsSnapshot {
    fn default() -> Self {
        Self {
            create_connection_times: 0,
            get_connection_times: 0,
            release_connection_times: 0,
            total_connection_count: 0,
            free_connection_count: 0,
            used_connection_count: 0,
            max_get_connection_time: 0.0,
            min_get_connection_time: f64::MAX,
            last_get_connection_time: 0.0,
        }
    }
}

impl StatisticsSnapshot {
    /// Serializes the snapshot as a JSON object.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Renders the snapshot in Prometheus text exposition format.
    pub fn export_prometheus(&self, manager: &str) -> String {
        let manager = escape_label_value(manager);
        let mut output = String::new();
        let counters = [
            ("create_connection_times", "Driver instances created", self.create_connection_times),
            ("get_connection_times", "Successful connection acquisitions", self.get_connection_times),
            ("release_connection_times", "Connections released", self.release_connection_times),
        ];
        for (name, help, value) in counters {
            let _ = write!(
                output,
                "# HELP ferrous_conn_{name} {help}\n\
                # TYPE ferrous_conn_{name} counter\n\
                ferrous_conn_{name}{{manager=\"{manager}\"}} {value}\n\n"
            );
        }

        let counts = [
            ("total_connection_count", "Connections tracked by the manager", self.total_connection_count),
            ("free_connection_count", "Idle tracked connections", self.free_connection_count),
            ("used_connection_count", "Checked-out tracked connections", self.used_connection_count),
        ];
        for (name, help, value) in counts {
            let _ = write!(
                output,
                "# HELP ferrous_conn_{name} {help}\n\
                # TYPE ferrous_conn_{name} gauge\n\
                ferrous_conn_{name}{{manager=\"{manager}\"}} {value}\n\n"
            );
        }

        // An unsampled minimum is exported as 0 rather than f64::MAX
        let min = if self.get_connection_times == 0 { 0.0 } else { self.min_get_connection_time };
        let timings = [
            ("max_get_connection_seconds", "Slowest connection acquisition", self.max_get_connection_time),
            ("min_get_connection_seconds", "Fastest connection acquisition", min),
            ("last_get_connection_seconds", "Most recent connection acquisition", self.last_get_connection_time),
        ];
        for (name, help, value) in timings {
            let _ = write!(
                output,
                "# HELP ferrous_conn_{name} {help}\n\
                # TYPE ferrous_conn_{name} gauge\n\
                ferrous_conn_{name}{{manager=\"{manager}\"}} {value}\n\n"
            );
        }

        output
    }
}

/// Escapes a label value for the text exposition format.
fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Statistics recorder owned by one manager.
#[derive(Debug, Default)]
pub(crate) struct Statistics {
    state: Mutex<StatisticsSnapshot>,
}

impl Statistics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_create(&self) {
        self.state.lock().create_connection_times += 1;
    }

    /// Records one completed getConnection() call.
    pub(crate) fn record_get(&self, elapsed: Duration) {
        let seconds = elapsed.as_secs_f64();
        let mut state = self.state.lock();
        state.get_connection_times += 1;
        state.last_get_connection_time = seconds;
        if seconds > state.max_get_connection_time {
            state.max_get_connection_time = seconds;
        }
        if seconds < state.min_get_connection_time {
            state.min_get_connection_time = seconds;
        }
    }

    pub(crate) fn record_release(&self) {
        self.state.lock().release_connection_times += 1;
    }

    /// Applies signed deltas to the total/free/used gauges in one step.
    pub(crate) fn adjust(&self, total: i64, free: i64, used: i64) {
        let mut state = self.state.lock();
        state.total_connection_count = state.total_connection_count.saturating_add_signed(total);
        state.free_connection_count = state.free_connection_count.saturating_add_signed(free);
        state.used_connection_count = state.used_connection_count.saturating_add_signed(used);
    }

    pub(crate) fn snapshot(&self) -> StatisticsSnapshot {
        self.state.lock().clone()
    }
}
