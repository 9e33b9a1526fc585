#[cfg(test)]
mod tests {
    use crate::config::AppConfig;
    use crate::error::StatsError;
    use crate::models::ConnectionStatus;
    use crate::services::engine::StatsEngine;
    use crate::services::stats::{
        apply_traffic, decode_envelope, decode_sys_stats, decode_traffic, StatsEvent,
        StatsService, TrafficTags, XrayStatsService,
    };
    use crate::services::SharedTunnelMonitor;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use std::sync::{Arc, Mutex};

    const UPLINK_TAG: &str = "inbound>>>socks>>>traffic>>>uplink";
    const DOWNLINK_TAG: &str = "inbound>>>socks>>>traffic>>>downlink";

    fn envelope(sys: &serde_json::Value, stats: &serde_json::Value) -> String {
        let outer = serde_json::json!({
            "success": true,
            "data": {
                "sysStats": STANDARD.encode(sys.to_string()),
                "stats": STANDARD.encode(stats.to_string()),
            }
        });
        STANDARD.encode(outer.to_string())
    }

    fn sample_envelope() -> String {
        envelope(
            &serde_json::json!({ "NumGoroutine": "12", "Alloc": "2097152" }),
            &serde_json::json!({ "stat": [
                { "name": UPLINK_TAG, "value": "500" },
                { "name": DOWNLINK_TAG, "value": "1500" },
            ]}),
        )
    }

    struct ScriptedEngine {
        responses: Mutex<Vec<String>>,
        calls: Arc<Mutex<usize>>,
    }

    impl ScriptedEngine {
        fn new(responses: Vec<String>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Arc::new(Mutex::new(0)),
            }
        }
    }

    impl StatsEngine for ScriptedEngine {
        fn query_stats(&self, _request: &str) -> String {
            *self.calls.lock().unwrap() += 1;
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                String::new()
            } else {
                responses.remove(0)
            }
        }
    }

    fn service_with(
        responses: Vec<String>,
        config: &AppConfig,
    ) -> (XrayStatsService, Arc<SharedTunnelMonitor>, Arc<Mutex<usize>>) {
        let engine = Arc::new(ScriptedEngine::new(responses));
        let calls = engine.calls.clone();
        let monitor = Arc::new(SharedTunnelMonitor::new());
        let service = XrayStatsService::new(engine, monitor.clone(), config);
        (service, monitor, calls)
    }

    #[test]
    fn test_decode_envelope_extracts_payload() {
        let payload = decode_envelope(&sample_envelope()).unwrap();
        assert!(payload.sys_stats.is_some());
        assert!(payload.stats.is_some());
    }

    #[test]
    fn test_decode_envelope_rejects_invalid_base64() {
        let err = decode_envelope("%%%not-base64%%%").unwrap_err();
        assert!(matches!(err, StatsError::Base64(_)));
    }

    #[test]
    fn test_decode_envelope_rejects_non_utf8() {
        let err = decode_envelope(&STANDARD.encode([0xff, 0xfe, 0x90])).unwrap_err();
        assert!(matches!(err, StatsError::Utf8(_)));
    }

    #[test]
    fn test_decode_envelope_rejects_invalid_json() {
        let err = decode_envelope(&STANDARD.encode("not json at all")).unwrap_err();
        assert!(matches!(err, StatsError::Json(_)));
    }

    #[test]
    fn test_decode_envelope_requires_success() {
        let refused = STANDARD.encode(r#"{ "success": false, "data": {} }"#);
        assert!(matches!(
            decode_envelope(&refused).unwrap_err(),
            StatsError::EngineRefused
        ));

        let absent = STANDARD.encode(r#"{ "data": {} }"#);
        assert!(matches!(
            decode_envelope(&absent).unwrap_err(),
            StatsError::EngineRefused
        ));
    }

    #[test]
    fn test_decode_envelope_requires_data_object() {
        let no_data = STANDARD.encode(r#"{ "success": true }"#);
        assert!(matches!(
            decode_envelope(&no_data).unwrap_err(),
            StatsError::MissingData
        ));
    }

    #[test]
    fn test_sys_stats_values_are_stringified() {
        let sys = serde_json::json!({
            "NumGoroutine": 12,
            "Paused": true,
            "Note": "plain"
        });
        let decoded = decode_sys_stats(&STANDARD.encode(sys.to_string())).unwrap();
        assert_eq!(decoded.get("NumGoroutine").map(String::as_str), Some("12"));
        assert_eq!(decoded.get("Paused").map(String::as_str), Some("true"));
        assert_eq!(decoded.get("Note").map(String::as_str), Some("plain"));
    }

    #[test]
    fn test_decode_sys_stats_is_idempotent() {
        let sys = serde_json::json!({ "NumGoroutine": 12, "Alloc": 2097152 });
        let encoded = STANDARD.encode(sys.to_string());
        assert_eq!(
            decode_sys_stats(&encoded).unwrap(),
            decode_sys_stats(&encoded).unwrap()
        );
    }

    #[test]
    fn test_apply_traffic_ignores_unmatched_entries() {
        let tags = TrafficTags::for_inbound("socks");
        let report = decode_traffic(&STANDARD.encode(
            serde_json::json!({ "stat": [
                { "name": "outbound>>>proxy>>>traffic>>>uplink", "value": "9999" },
                { "name": DOWNLINK_TAG, "value": "1500" },
            ]})
            .to_string(),
        ))
        .unwrap();

        let mut snapshot = crate::models::StatsSnapshot::default();
        apply_traffic(&mut snapshot, report, &tags);
        assert_eq!(snapshot.traffic.uplink, "0");
        assert_eq!(snapshot.traffic.downlink, "1500");
    }

    #[test]
    fn test_missing_uplink_retains_previous_value() {
        let tags = TrafficTags::for_inbound("socks");
        let mut snapshot = crate::models::StatsSnapshot::default();
        snapshot.traffic.uplink = "500".to_string();
        snapshot.traffic.downlink = "1500".to_string();

        let report = decode_traffic(&STANDARD.encode(
            serde_json::json!({ "stat": [
                { "name": DOWNLINK_TAG, "value": "2000" },
            ]})
            .to_string(),
        ))
        .unwrap();

        apply_traffic(&mut snapshot, report, &tags);
        assert_eq!(snapshot.traffic.uplink, "500");
        assert_eq!(snapshot.traffic.downlink, "2000");
    }

    #[tokio::test]
    async fn test_tick_skips_query_while_disconnected() {
        let (service, _monitor, calls) = service_with(vec![], &AppConfig::default());

        service.tick().await;

        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_tick_polls_and_publishes_while_connected() {
        let (service, monitor, calls) =
            service_with(vec![sample_envelope()], &AppConfig::default());
        let mut events = service.subscribe();
        monitor.set_status(ConnectionStatus::Connected).await;

        service.tick().await;

        assert_eq!(*calls.lock().unwrap(), 1);
        let snapshot = service.snapshot().await;
        assert_eq!(snapshot.sys.get("NumGoroutine").map(String::as_str), Some("12"));
        assert_eq!(snapshot.traffic.uplink, "500");
        assert_eq!(snapshot.traffic.downlink, "1500");
        assert!(snapshot.updated_at.is_some());

        match events.try_recv() {
            Ok(StatsEvent::Updated(published)) => assert_eq!(published, snapshot),
            other => panic!("Expected an update event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_response_retains_snapshot() {
        let (service, monitor, _calls) = service_with(
            vec![sample_envelope(), "%%%garbage%%%".to_string()],
            &AppConfig::default(),
        );
        monitor.set_status(ConnectionStatus::Connected).await;

        service.tick().await;
        let before = service.snapshot().await;

        service.tick().await;
        assert_eq!(service.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_success_false_leaves_state_untouched() {
        let refused = STANDARD.encode(
            serde_json::json!({
                "success": false,
                "data": {
                    "sysStats": STANDARD.encode(r#"{"NumGoroutine":"99"}"#),
                    "stats": STANDARD.encode(
                        format!(r#"{{"stat":[{{"name":"{}","value":"7"}}]}}"#, UPLINK_TAG)
                    ),
                }
            })
            .to_string(),
        );
        let (service, monitor, _calls) =
            service_with(vec![sample_envelope(), refused], &AppConfig::default());
        monitor.set_status(ConnectionStatus::Connected).await;

        service.tick().await;
        let before = service.snapshot().await;

        service.tick().await;
        assert_eq!(service.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_malformed_sys_stats_does_not_block_traffic() {
        let outer = serde_json::json!({
            "success": true,
            "data": {
                "sysStats": "%%%not-base64%%%",
                "stats": STANDARD.encode(
                    serde_json::json!({ "stat": [
                        { "name": DOWNLINK_TAG, "value": "4096" },
                    ]})
                    .to_string(),
                ),
            }
        });
        let (service, monitor, _calls) = service_with(
            vec![STANDARD.encode(outer.to_string())],
            &AppConfig::default(),
        );
        monitor.set_status(ConnectionStatus::Connected).await;

        service.tick().await;

        let snapshot = service.snapshot().await;
        assert!(snapshot.sys.is_empty());
        assert_eq!(snapshot.traffic.downlink, "4096");
    }

    #[tokio::test]
    async fn test_unset_port_degrades_to_noop() {
        let config = AppConfig {
            socks_port: 0,
            ..AppConfig::default()
        };
        let (service, monitor, calls) = service_with(vec![sample_envelope()], &config);
        monitor.set_status(ConnectionStatus::Connected).await;

        service.tick().await;

        assert_eq!(*calls.lock().unwrap(), 0);
        assert_eq!(service.snapshot().await, crate::models::StatsSnapshot::default());
    }
}
