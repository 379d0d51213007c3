//! Periodic drain-and-emit

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::metrics::MetricsCollector;
use crate::sink::EventSink;
use crate::table::EventTable;
use crate::value::ArgValue;

/// One key and the arguments it held at drain time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub key: String,
    pub arguments: Vec<ArgValue>,
}

/// Everything captured by one drain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Counts non-empty batches from 1
    pub sequence: u64,
    pub emitted_at: DateTime<Utc>,
    /// Records in key order
    pub records: Vec<EventRecord>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Arguments emitted for `key`, if it is in this batch
    pub fn get(&self, key: &str) -> Option<&[ArgValue]> {
        self.records.iter().find(|r| r.key == key).map(|r| r.arguments.as_slice())
    }
}

/// Drains the shared table and fans the result out to the registered sinks
pub struct BatchEmitter {
    table: Arc<EventTable>,
    sinks: Vec<Arc<dyn EventSink>>,
    metrics: Arc<MetricsCollector>,
    sequence: AtomicU64,
}

impl BatchEmitter {
    pub fn new(
        table: Arc<EventTable>,
        sinks: Vec<Arc<dyn EventSink>>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self { table, sinks, metrics, sequence: AtomicU64::new(0) }
    }

    /// Run one emission: swap the table out, then notify sinks outside the lock.
    ///
    /// Returns the number of records emitted. An empty drain notifies nobody.
    pub fn emit_once(&self) -> usize {
        let detached = self.table.drain();
        let size = detached.len();
        self.metrics.record_batch(size);

        if size == 0 {
            trace!("Emission period elapsed with no pending events");
            return 0;
        }

        let batch = Arc::new(Batch {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            emitted_at: Utc::now(),
            records: detached
                .into_iter()
                .map(|(key, arguments)| EventRecord { key, arguments })
                .collect(),
        });

        trace!(sequence = batch.sequence, size, "Emitting batch");
        for sink in &self.sinks {
            sink.deliver(&batch);
        }

        size
    }

    /// Emit every `period` until `shutdown` fires.
    ///
    /// The wait starts after each emission finishes, so a slow emission pushes the next one
    /// back instead of bunching them up.
    pub async fn run(self: Arc<Self>, period: Duration, shutdown: CancellationToken) {
        debug!(period_ms = period.as_millis() as u64, "Batch emitter started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(period) => {}
            }

            if shutdown.is_cancelled() {
                break;
            }
            self.emit_once();
        }

        debug!("Batch emitter stopped");
    }

    /// Number of non-empty batches emitted so far
    pub fn batches_emitted(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;
    use crate::table::WritePolicy;

    fn emitter() -> (Arc<EventTable>, BatchEmitter, tokio::sync::mpsc::UnboundedReceiver<Arc<Batch>>)
    {
        let table = Arc::new(EventTable::new());
        let (sink, receiver) = ChannelSink::new();
        let emitter =
            BatchEmitter::new(table.clone(), vec![Arc::new(sink)], Arc::new(MetricsCollector::new()));
        (table, emitter, receiver)
    }

    #[test]
    fn emit_once_delivers_current_values_and_empties_table() {
        let (table, emitter, mut receiver) = emitter();
        table.write("h/b".into(), vec![ArgValue::Int32(2)], WritePolicy::Overwrite);
        table.write("h/a".into(), vec![ArgValue::Int32(1)], WritePolicy::Overwrite);

        assert_eq!(emitter.emit_once(), 2);
        assert!(table.is_empty());

        let batch = receiver.try_recv().unwrap();
        assert_eq!(batch.sequence, 1);
        assert_eq!(batch.records[0].key, "h/a");
        assert_eq!(batch.get("h/b"), Some(&[ArgValue::Int32(2)][..]));
    }

    #[test]
    fn empty_drain_notifies_nobody() {
        let (_, emitter, mut receiver) = emitter();
        assert_eq!(emitter.emit_once(), 0);
        assert!(receiver.try_recv().is_err());
        assert_eq!(emitter.batches_emitted(), 0);
    }

    #[test]
    fn sequence_counts_only_non_empty_batches() {
        let (table, emitter, mut receiver) = emitter();
        table.write("k".into(), vec![], WritePolicy::Overwrite);
        emitter.emit_once();
        emitter.emit_once();
        table.write("k".into(), vec![], WritePolicy::Overwrite);
        emitter.emit_once();

        assert_eq!(receiver.try_recv().unwrap().sequence, 1);
        assert_eq!(receiver.try_recv().unwrap().sequence, 2);
        assert_eq!(emitter.batches_emitted(), 2);
    }

    #[test]
    fn writes_after_drain_wait_for_next_emission() {
        let (table, emitter, mut receiver) = emitter();
        table.write("k".into(), vec![ArgValue::Int32(1)], WritePolicy::Overwrite);
        emitter.emit_once();
        table.write("k".into(), vec![ArgValue::Int32(2)], WritePolicy::Overwrite);

        assert_eq!(receiver.try_recv().unwrap().get("k"), Some(&[ArgValue::Int32(1)][..]));
        assert_eq!(table.get("k"), Some(vec![ArgValue::Int32(2)]));
    }

    #[tokio::test(start_paused = true)]
    async fn run_fires_after_each_period() {
        let (table, emitter, mut receiver) = emitter();
        let emitter = Arc::new(emitter);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(emitter.clone().run(Duration::from_millis(200), shutdown.clone()));

        table.write("k".into(), vec![ArgValue::Int32(1)], WritePolicy::Overwrite);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(receiver.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(receiver.try_recv().unwrap().len(), 1);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_without_emitting_after_cancel() {
        let (table, emitter, mut receiver) = emitter();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(Arc::new(emitter).run(Duration::from_millis(200), shutdown.clone()));

        table.write("k".into(), vec![], WritePolicy::Overwrite);
        shutdown.cancel();
        task.await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(receiver.try_recv().is_err());
        assert_eq!(table.len(), 1);
    }
}
