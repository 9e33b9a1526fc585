use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use raystat_common::{ConnectionStatus, StatsEnvelope, StatsPayload, TrafficReport, TrafficStat};

// Counter names of the engine's Go runtime, as they appear in the decoded
// sysStats payload.
pub const SYS_NUM_GOROUTINE: &str = "NumGoroutine";
pub const SYS_NUM_GC: &str = "NumGC";
pub const SYS_ALLOC: &str = "Alloc";
pub const SYS_TOTAL_ALLOC: &str = "TotalAlloc";
pub const SYS_MEMORY: &str = "Sys";
pub const SYS_MALLOCS: &str = "Mallocs";
pub const SYS_FREES: &str = "Frees";
pub const SYS_LIVE_OBJECTS: &str = "LiveObjects";
pub const SYS_PAUSE_TOTAL_NS: &str = "PauseTotalNs";
pub const SYS_UPTIME: &str = "Uptime";

const GC_NONE_MARKER: &str = "none";

/// Cumulative traffic byte totals for the monitored inbound. Each counter is
/// only overwritten when its entry appears in a decoded report, so a missing
/// entry leaves the last-known-good value in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrafficTotals {
    pub uplink: String,
    pub downlink: String,
}

impl Default for TrafficTotals {
    fn default() -> Self {
        Self {
            uplink: "0".to_string(),
            downlink: "0".to_string(),
        }
    }
}

/// Last-known-good view of the engine's counters. Owned by the stats
/// service; readers get clones of a fully committed cycle, never a partial
/// one.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub sys: BTreeMap<String, String>,
    pub traffic: TrafficTotals,
    /// Unix seconds of the last successfully decoded envelope.
    pub updated_at: Option<i64>,
}

/// One label/value line of the stats display.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DisplayRow {
    pub label: &'static str,
    pub value: String,
}

impl DisplayRow {
    fn new(label: &'static str, value: String) -> Self {
        Self { label, value }
    }
}

impl StatsSnapshot {
    pub fn downlink_display(&self) -> String {
        format_bytes(&self.traffic.downlink)
    }

    pub fn uplink_display(&self) -> String {
        format_bytes(&self.traffic.uplink)
    }

    /// Raw counter value, `"0"` when the last decode did not carry the key.
    pub fn sys_counter(&self, key: &str) -> String {
        self.sys.get(key).cloned().unwrap_or_else(|| "0".to_string())
    }

    pub fn gc_runs(&self) -> String {
        self.sys
            .get(SYS_NUM_GC)
            .cloned()
            .unwrap_or_else(|| GC_NONE_MARKER.to_string())
    }

    /// The full display, one row per counter.
    pub fn display(&self) -> Vec<DisplayRow> {
        vec![
            DisplayRow::new("Downlink", self.downlink_display()),
            DisplayRow::new("Uplink", self.uplink_display()),
            DisplayRow::new("Goroutines", self.sys_counter(SYS_NUM_GOROUTINE)),
            DisplayRow::new("GC runs", self.gc_runs()),
            DisplayRow::new("Allocated", format_bytes(&self.sys_counter(SYS_ALLOC))),
            DisplayRow::new(
                "Total allocated",
                format_bytes(&self.sys_counter(SYS_TOTAL_ALLOC)),
            ),
            DisplayRow::new("System memory", format_bytes(&self.sys_counter(SYS_MEMORY))),
            DisplayRow::new("Mallocs", self.sys_counter(SYS_MALLOCS)),
            DisplayRow::new("Frees", self.sys_counter(SYS_FREES)),
            DisplayRow::new("Live objects", self.sys_counter(SYS_LIVE_OBJECTS)),
            DisplayRow::new("GC pause (ns)", self.sys_counter(SYS_PAUSE_TOTAL_NS)),
            DisplayRow::new("Uptime (s)", self.sys_counter(SYS_UPTIME)),
        ]
    }
}

/// Renders a numeric byte-count string with binary (1024-based) units.
/// Unparseable input renders as `"0 bytes"` rather than surfacing an error
/// to the display layer.
pub fn format_bytes(value: &str) -> String {
    let Ok(bytes) = value.parse::<f64>() else {
        return "0 bytes".to_string();
    };

    const KILOBYTE: f64 = 1024.0;
    const MEGABYTE: f64 = KILOBYTE * 1024.0;
    const GIGABYTE: f64 = MEGABYTE * 1024.0;

    if bytes >= GIGABYTE {
        format!("{:.2} GB", bytes / GIGABYTE)
    } else if bytes >= MEGABYTE {
        format!("{:.2} MB", bytes / MEGABYTE)
    } else if bytes >= KILOBYTE {
        format!("{:.2} KB", bytes / KILOBYTE)
    } else {
        format!("{} bytes", bytes as i64)
    }
}
