use serde::{Deserialize, Serialize};

/// Connection state of the packet tunnel, owned by the external tunnel
/// manager. The stats pipeline only reads it.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Outer JSON object carried inside the engine's Base64 query response.
///
/// The engine is untrusted input: every field is defaulted or optional so a
/// partial or evolving response shape deserializes instead of failing.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StatsEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<StatsPayload>,
}

/// The two independently Base64-encoded inner payloads.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct StatsPayload {
    #[serde(rename = "sysStats", default)]
    pub sys_stats: Option<String>,
    #[serde(default)]
    pub stats: Option<String>,
}

/// Decoded form of the `stats` payload.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct TrafficReport {
    #[serde(default)]
    pub stat: Vec<TrafficStat>,
}

/// One named counter from the engine's traffic report, e.g.
/// `inbound>>>socks>>>traffic>>>uplink` with a byte total as its value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrafficStat {
    pub name: String,
    pub value: String,
}
