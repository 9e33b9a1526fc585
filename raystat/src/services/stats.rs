use crate::config::AppConfig;
use crate::error::{AppError, StatsError};
use crate::models::{ConnectionStatus, StatsEnvelope, StatsPayload, StatsSnapshot, TrafficReport};
use crate::services::engine::StatsEngine;
use crate::services::TunnelMonitor;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, Mutex};
use tracing::{debug, error, info, warn};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

// The engine query is a blocking call with no timeout of its own; a hung
// engine must not stall the polling cycle indefinitely.
const QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// The engine's stats listener address in its Base64 wire form. Encoded once
/// at construction and reused for every query.
#[derive(Clone, Debug)]
pub struct QueryEndpoint {
    encoded: String,
}

impl QueryEndpoint {
    pub fn new(port: u16) -> Result<Self, AppError> {
        if port == 0 {
            return Err(AppError::Config("stats query port is not set".to_string()));
        }
        let raw = format!("127.0.0.1:{}", port);
        Ok(Self {
            encoded: STANDARD.encode(raw.as_bytes()),
        })
    }

    pub fn encoded(&self) -> &str {
        &self.encoded
    }
}

/// Full counter names of the monitored inbound, built once.
#[derive(Clone, Debug)]
pub(crate) struct TrafficTags {
    pub(crate) uplink: String,
    pub(crate) downlink: String,
}

impl TrafficTags {
    pub(crate) fn for_inbound(tag: &str) -> Self {
        Self {
            uplink: format!("inbound>>>{}>>>traffic>>>uplink", tag),
            downlink: format!("inbound>>>{}>>>traffic>>>downlink", tag),
        }
    }
}

#[derive(Clone, Debug)]
pub enum StatsEvent {
    Updated(StatsSnapshot),
}

#[async_trait]
pub trait StatsService: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<StatsEvent>;
    async fn start(&self);
    async fn stop(&self);
    async fn snapshot(&self) -> StatsSnapshot;
}

/// Polls an Xray-compatible engine for traffic and runtime statistics while
/// the tunnel is connected, and keeps the last-known-good snapshot.
#[derive(Clone)]
pub struct XrayStatsService {
    event_tx: broadcast::Sender<StatsEvent>,
    snapshot: Arc<Mutex<StatsSnapshot>>,
    engine: Arc<dyn StatsEngine>,
    monitor: Arc<dyn TunnelMonitor>,
    endpoint: Option<QueryEndpoint>,
    tags: TrafficTags,
    stop_tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl XrayStatsService {
    pub fn new(
        engine: Arc<dyn StatsEngine>,
        monitor: Arc<dyn TunnelMonitor>,
        config: &AppConfig,
    ) -> Self {
        let (tx, _) = broadcast::channel(100);

        let endpoint = match QueryEndpoint::new(config.socks_port) {
            Ok(ep) => Some(ep),
            Err(e) => {
                error!("Failed to build stats query endpoint: {}", e);
                None
            }
        };

        Self {
            event_tx: tx,
            snapshot: Arc::new(Mutex::new(StatsSnapshot::default())),
            engine,
            monitor,
            endpoint,
            tags: TrafficTags::for_inbound(&config.inbound_tag),
            stop_tx: Arc::new(Mutex::new(None)),
        }
    }

    /// One poll cycle: queries only while the tunnel is connected, otherwise
    /// the tick is a no-op.
    pub(crate) async fn tick(&self) {
        if self.monitor.status().await != ConnectionStatus::Connected {
            return;
        }
        self.poll_once().await;
    }

    pub(crate) async fn poll_once(&self) {
        let Some(endpoint) = self.endpoint.clone() else {
            debug!("Stats endpoint unavailable; skipping query");
            return;
        };

        let Some(response) = self.query_engine(endpoint).await else {
            return;
        };

        let payload = match decode_envelope(&response) {
            Ok(payload) => payload,
            Err(StatsError::EngineRefused) | Err(StatsError::MissingData) => {
                debug!("Engine returned no stats this cycle");
                return;
            }
            Err(e) => {
                warn!("Failed to decode stats response: {}", e);
                return;
            }
        };

        // The two inner payloads are decoded independently so a malformed
        // one never blocks the other.
        let sys = payload.sys_stats.as_deref().map(decode_sys_stats);
        let traffic = payload.stats.as_deref().map(decode_traffic);

        let updated = {
            let mut snapshot = self.snapshot.lock().await;
            match sys {
                Some(Ok(values)) => snapshot.sys = values,
                Some(Err(e)) => warn!("Skipping malformed sysStats payload: {}", e),
                None => {}
            }
            match traffic {
                Some(Ok(report)) => apply_traffic(&mut snapshot, report, &self.tags),
                Some(Err(e)) => warn!("Skipping malformed traffic payload: {}", e),
                None => {}
            }
            snapshot.updated_at = Some(Utc::now().timestamp());
            snapshot.clone()
        };

        let _ = self.event_tx.send(StatsEvent::Updated(updated));
    }

    async fn query_engine(&self, endpoint: QueryEndpoint) -> Option<String> {
        let engine = self.engine.clone();
        let query = tokio::task::spawn_blocking(move || engine.query_stats(endpoint.encoded()));

        match tokio::time::timeout(QUERY_TIMEOUT, query).await {
            Ok(Ok(response)) => Some(response),
            Ok(Err(e)) => {
                warn!("Stats query task failed: {}", e);
                None
            }
            Err(_) => {
                warn!("Stats query timed out after {:?}", QUERY_TIMEOUT);
                None
            }
        }
    }
}

#[async_trait]
impl StatsService for XrayStatsService {
    fn subscribe(&self) -> broadcast::Receiver<StatsEvent> {
        self.event_tx.subscribe()
    }

    async fn start(&self) {
        let mut stop_lock = self.stop_tx.lock().await;
        if stop_lock.is_some() {
            return;
        }
        let (tx, mut rx) = oneshot::channel();
        *stop_lock = Some(tx);
        drop(stop_lock);

        let svc = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(POLL_INTERVAL);
            loop {
                tokio::select! {
                    _ = &mut rx => {
                        info!("Stopping stats polling");
                        break;
                    }
                    _ = interval.tick() => svc.tick().await,
                }
            }
        });
    }

    async fn stop(&self) {
        let mut lock = self.stop_tx.lock().await;
        if let Some(tx) = lock.take() {
            let _ = tx.send(());
        }
    }

    async fn snapshot(&self) -> StatsSnapshot {
        self.snapshot.lock().await.clone()
    }
}

/// Decodes the outer response: Base64, then UTF-8, then the JSON envelope.
/// `success` absent or false means the engine had no data this cycle; an
/// envelope without a `data` object is treated the same way.
pub(crate) fn decode_envelope(response: &str) -> Result<StatsPayload, StatsError> {
    let bytes = STANDARD.decode(response)?;
    let text = String::from_utf8(bytes)?;
    let envelope: StatsEnvelope = serde_json::from_str(&text)?;

    if !envelope.success {
        return Err(StatsError::EngineRefused);
    }
    envelope.data.ok_or(StatsError::MissingData)
}

/// Decodes the runtime counters: Base64, then UTF-8, then a JSON object of
/// arbitrary key/value pairs, every value stringified uniformly for display.
pub(crate) fn decode_sys_stats(encoded: &str) -> Result<BTreeMap<String, String>, StatsError> {
    let bytes = STANDARD.decode(encoded)?;
    let text = String::from_utf8(bytes)?;
    let values: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&text)?;

    Ok(values
        .into_iter()
        .map(|(key, value)| (key, stat_value_to_string(value)))
        .collect())
}

pub(crate) fn decode_traffic(encoded: &str) -> Result<TrafficReport, StatsError> {
    let bytes = STANDARD.decode(encoded)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Overwrites a counter only when its tag appears in the report; anything
/// else in the array is ignored.
pub(crate) fn apply_traffic(
    snapshot: &mut StatsSnapshot,
    report: TrafficReport,
    tags: &TrafficTags,
) {
    for entry in report.stat {
        if entry.name == tags.uplink {
            snapshot.traffic.uplink = entry.value;
        } else if entry.name == tags.downlink {
            snapshot.traffic.downlink = entry.value;
        }
    }
}

fn stat_value_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}
