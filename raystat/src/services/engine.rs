use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::Rng;
use std::sync::Mutex;
use std::time::Instant;

/// The engine's one stats capability: a blocking query taking the
/// Base64-encoded `"host:port"` of its stats listener and returning a
/// Base64-encoded response. There is no error channel; any engine-side
/// failure surfaces as an undecodable response string.
pub trait StatsEngine: Send + Sync {
    fn query_stats(&self, request: &str) -> String;
}

/// Stand-in engine for development and tests: fabricates well-formed
/// responses with accumulating traffic totals, so the whole pipeline runs
/// without the native library. The real bridge implements [`StatsEngine`]
/// over the embedded engine's FFI.
pub struct SimulationEngine {
    uplink_tag: String,
    downlink_tag: String,
    started: Instant,
    state: Mutex<SimulatedCounters>,
}

struct SimulatedCounters {
    uplink: u64,
    downlink: u64,
    gc_runs: u64,
}

impl SimulationEngine {
    pub fn new(inbound_tag: &str) -> Self {
        Self {
            uplink_tag: format!("inbound>>>{}>>>traffic>>>uplink", inbound_tag),
            downlink_tag: format!("inbound>>>{}>>>traffic>>>downlink", inbound_tag),
            started: Instant::now(),
            state: Mutex::new(SimulatedCounters {
                uplink: 0,
                downlink: 0,
                gc_runs: 0,
            }),
        }
    }
}

impl StatsEngine for SimulationEngine {
    fn query_stats(&self, _request: &str) -> String {
        let (uplink, downlink, gc_runs) = {
            let mut state = self.state.lock().unwrap();
            let mut rng = rand::thread_rng();
            state.uplink += rng.gen_range(2_000..40_000);
            state.downlink += rng.gen_range(20_000..400_000);
            if rng.gen_range(0..10) == 0 {
                state.gc_runs += 1;
            }
            (state.uplink, state.downlink, state.gc_runs)
        };

        let sys = serde_json::json!({
            "NumGoroutine": 24,
            "NumGC": gc_runs,
            "Alloc": 18_874_368u64,
            "TotalAlloc": 104_857_600u64,
            "Sys": 73_400_320u64,
            "Mallocs": 1_204_210u64,
            "Frees": 1_102_405u64,
            "LiveObjects": 101_805u64,
            "PauseTotalNs": 1_250_000u64,
            "Uptime": self.started.elapsed().as_secs(),
        });
        let traffic = serde_json::json!({
            "stat": [
                { "name": self.uplink_tag, "value": uplink.to_string() },
                { "name": self.downlink_tag, "value": downlink.to_string() },
            ]
        });
        let envelope = serde_json::json!({
            "success": true,
            "data": {
                "sysStats": STANDARD.encode(sys.to_string()),
                "stats": STANDARD.encode(traffic.to_string()),
            }
        });

        STANDARD.encode(envelope.to_string())
    }
}
