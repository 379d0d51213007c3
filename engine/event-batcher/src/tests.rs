//! Unit and property tests for the coalescing policy

use std::sync::Arc;

use proptest::prelude::*;

use crate::{
    event_key, ArgValue, BatchEmitter, ChannelSink, EngineConfig, EngineError, EventTable,
    IngressHandler, MetricsCollector, TransportError, DEFAULT_CONTROL_PREFIX,
    DEFAULT_EMISSION_PERIOD_MS,
};

fn create_test_config() -> EngineConfig {
    EngineConfig {
        emission_period_ms: 10, // 10ms for faster testing
        control_prefix: "/control".to_string(),
        shutdown_timeout_ms: 500,
    }
}

struct Fixture {
    table: Arc<EventTable>,
    handler: IngressHandler,
    emitter: BatchEmitter,
    batches: tokio::sync::mpsc::UnboundedReceiver<Arc<crate::Batch>>,
    metrics: Arc<MetricsCollector>,
}

fn fixture() -> Fixture {
    let table = Arc::new(EventTable::new());
    let metrics = Arc::new(MetricsCollector::new());
    let handler = IngressHandler::new(table.clone(), DEFAULT_CONTROL_PREFIX, metrics.clone());
    let (sink, batches) = ChannelSink::new();
    let emitter = BatchEmitter::new(table.clone(), vec![Arc::new(sink)], metrics.clone());
    Fixture { table, handler, emitter, batches, metrics }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults_match_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.emission_period_ms, DEFAULT_EMISSION_PERIOD_MS);
        assert_eq!(config.control_prefix, DEFAULT_CONTROL_PREFIX);
    }

    #[test]
    fn test_config_serialization() {
        let config = create_test_config();

        let serialized = serde_json::to_string(&config).unwrap();
        let deserialized: EngineConfig = serde_json::from_str(&serialized).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_config_file_operations() {
        let config = create_test_config();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        let path = path.to_str().unwrap();

        assert!(config.to_file(path).is_ok());

        let loaded = EngineConfig::from_file(path).unwrap();
        assert_eq!(loaded.emission_period_ms, 10);
        assert_eq!(loaded.shutdown_timeout_ms, 500);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        assert!(EngineConfig::from_file("/nonexistent/engine.toml").is_err());
    }
}

#[cfg(test)]
mod scenario_tests {
    use super::*;

    #[test]
    fn test_repeated_control_command_keeps_first_arguments() {
        let mut f = fixture();
        f.handler.handle("1.2.3.4", "/control/play", vec![]);
        f.handler.handle("1.2.3.4", "/control/play", vec![ArgValue::Bool(true)]);

        assert_eq!(f.emitter.emit_once(), 1);
        let batch = f.batches.try_recv().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.records[0].key, "1.2.3.4/control/play");
        assert!(batch.records[0].arguments.is_empty());
    }

    #[test]
    fn test_repeated_fader_keeps_latest_arguments() {
        let mut f = fixture();
        f.handler.handle("10.0.0.1", "/fader1", vec![ArgValue::Float32(0.5)]);
        f.handler.handle("10.0.0.1", "/fader1", vec![ArgValue::Float32(0.9)]);

        f.emitter.emit_once();
        let batch = f.batches.try_recv().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.get("10.0.0.1/fader1"), Some(&[ArgValue::Float32(0.9)][..]));
    }

    #[test]
    fn test_quiet_period_emits_nothing() {
        let mut f = fixture();
        assert_eq!(f.emitter.emit_once(), 0);
        assert!(f.batches.try_recv().is_err());
        assert_eq!(f.metrics.get_stats().empty_periods, 1);

        f.handler.handle("h", "/x", vec![]);
        assert_eq!(f.emitter.emit_once(), 1);
        assert!(f.batches.try_recv().is_ok());
    }

    #[test]
    fn test_control_accepted_again_after_drain() {
        let mut f = fixture();
        f.handler.handle("h", "/control/next", vec![ArgValue::Int32(1)]);
        f.emitter.emit_once();
        f.handler.handle("h", "/control/next", vec![ArgValue::Int32(2)]);
        f.emitter.emit_once();

        assert_eq!(f.batches.try_recv().unwrap().get("h/control/next"), Some(&[ArgValue::Int32(1)][..]));
        assert_eq!(f.batches.try_recv().unwrap().get("h/control/next"), Some(&[ArgValue::Int32(2)][..]));
    }

    #[test]
    fn test_metrics_follow_the_flow() {
        let f = fixture();
        f.handler.handle("h", "/a", vec![]);
        f.handler.handle("h", "/a", vec![]);
        f.handler.handle("h", "/control", vec![]);
        f.handler.handle("h", "/control", vec![]);
        f.emitter.emit_once();
        f.emitter.emit_once();

        let stats = f.metrics.get_stats();
        assert_eq!(stats.messages_ingested, 4);
        assert_eq!(stats.entries_overwritten, 1);
        assert_eq!(stats.control_suppressed, 1);
        assert_eq!(stats.batches_emitted, 1);
        assert_eq!(stats.events_emitted, 2);
        assert_eq!(stats.max_batch_size, 2);
        assert_eq!(stats.empty_periods, 1);

        f.metrics.reset();
        assert_eq!(f.metrics.get_stats().messages_ingested, 0);
    }
}

#[cfg(test)]
mod error_handling_tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        assert!(EngineError::AlreadyStarted.to_string().contains("already running"));
        assert!(EngineError::NotBound("port in use".into()).to_string().contains("port in use"));
        assert!(EngineError::Config("bad".into()).to_string().contains("bad"));
    }

    #[test]
    fn test_transport_error_display() {
        let error = TransportError::Bind {
            addr: "127.0.0.1:9000".into(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(error.to_string().contains("127.0.0.1:9000"));

        let error: TransportError = std::io::Error::from(std::io::ErrorKind::Other).into();
        assert!(matches!(error, TransportError::Io(_)));
    }
}

fn arb_arg() -> impl Strategy<Value = ArgValue> {
    prop_oneof![
        any::<bool>().prop_map(ArgValue::Bool),
        any::<i32>().prop_map(ArgValue::Int32),
        any::<i64>().prop_map(ArgValue::Int64),
        (-1000i32..1000).prop_map(|v| ArgValue::Float32(v as f32 / 8.0)),
        "[a-z]{0,6}".prop_map(ArgValue::String),
    ]
}

fn arb_write() -> impl Strategy<Value = (usize, bool, Vec<ArgValue>)> {
    (0usize..4, any::<bool>(), prop::collection::vec(arb_arg(), 0..3))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Each emitted key carries the last write for ordinary paths and the first for control paths.
    #[test]
    fn prop_emission_matches_policy(writes in prop::collection::vec(arb_write(), 1..40)) {
        let mut f = fixture();
        let mut expected = std::collections::BTreeMap::new();

        for (sender, control, args) in &writes {
            let sender = format!("10.0.0.{sender}");
            let pattern = if *control { "/control/go" } else { "/fader" };
            f.handler.handle(&sender, pattern, args.clone());

            let key = event_key(&sender, pattern);
            if *control {
                expected.entry(key).or_insert_with(|| args.clone());
            } else {
                expected.insert(key, args.clone());
            }
        }

        f.emitter.emit_once();
        let batch = f.batches.try_recv().unwrap();
        prop_assert_eq!(batch.len(), expected.len());
        for record in &batch.records {
            prop_assert_eq!(Some(&record.arguments), expected.get(&record.key));
        }
        prop_assert!(f.table.is_empty());
    }

    /// Writing key A never changes what is stored for key B.
    #[test]
    fn prop_keys_are_isolated(
        b_args in prop::collection::vec(arb_arg(), 0..3),
        a_writes in prop::collection::vec(prop::collection::vec(arb_arg(), 0..3), 0..20),
    ) {
        let f = fixture();
        f.handler.handle("host", "/b", b_args.clone());
        for args in a_writes {
            f.handler.handle("host", "/a", args);
            prop_assert_eq!(f.table.get("host/b"), Some(b_args.clone()));
        }
    }
}
