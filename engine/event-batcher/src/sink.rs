//! Downstream subscribers for emitted batches

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::trace;

use crate::emitter::Batch;
use crate::value::ArgValue;

/// Receives every non-empty batch the emitter produces.
///
/// `deliver` runs on the emitter task after the table lock has been released. Implementations
/// should hand the batch off quickly; delivery is fire-and-forget from the emitter's side.
pub trait EventSink: Send + Sync {
    fn deliver(&self, batch: &Arc<Batch>);
}

/// Calls a closure once per key with that key's arguments
pub struct CallbackSink<F> {
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: Fn(&str, &[ArgValue]) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> EventSink for CallbackSink<F>
where
    F: Fn(&str, &[ArgValue]) + Send + Sync,
{
    fn deliver(&self, batch: &Arc<Batch>) {
        for record in &batch.records {
            (self.callback)(&record.key, &record.arguments);
        }
    }
}

/// Forwards whole batches to a single consumer over an unbounded channel
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Arc<Batch>>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Arc<Batch>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, batch: &Arc<Batch>) {
        if self.sender.send(batch.clone()).is_err() {
            trace!(sequence = batch.sequence, "Batch receiver dropped");
        }
    }
}

/// Publishes batches to any number of listeners.
///
/// Slow listeners lag and lose the oldest batches; the emitter never waits for them.
pub struct BroadcastSink {
    sender: broadcast::Sender<Arc<Batch>>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Batch>> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventSink for BroadcastSink {
    fn deliver(&self, batch: &Arc<Batch>) {
        // Err only means nobody is listening right now
        let _ = self.sender.send(batch.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::EventRecord;
    use parking_lot::Mutex;

    fn batch() -> Arc<Batch> {
        Arc::new(Batch {
            sequence: 1,
            emitted_at: chrono::Utc::now(),
            records: vec![
                EventRecord { key: "a/x".into(), arguments: vec![ArgValue::Int32(1)] },
                EventRecord { key: "a/y".into(), arguments: vec![] },
            ],
        })
    }

    #[test]
    fn callback_sink_is_called_per_key() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        let sink = CallbackSink::new(move |key: &str, args: &[ArgValue]| {
            seen_cb.lock().push((key.to_string(), args.to_vec()));
        });

        sink.deliver(&batch());

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], ("a/x".to_string(), vec![ArgValue::Int32(1)]));
        assert_eq!(seen[1].0, "a/y");
    }

    #[test]
    fn channel_sink_forwards_whole_batch() {
        let (sink, mut receiver) = ChannelSink::new();
        sink.deliver(&batch());

        let received = receiver.try_recv().unwrap();
        assert_eq!(received.sequence, 1);
        assert_eq!(received.records.len(), 2);
    }

    #[test]
    fn channel_sink_tolerates_dropped_receiver() {
        let (sink, receiver) = ChannelSink::new();
        drop(receiver);
        sink.deliver(&batch());
    }

    #[test]
    fn broadcast_sink_reaches_every_listener() {
        let sink = BroadcastSink::new(4);
        let mut first = sink.subscribe();
        let mut second = sink.subscribe();
        assert_eq!(sink.receiver_count(), 2);

        sink.deliver(&batch());

        assert_eq!(first.try_recv().unwrap().records.len(), 2);
        assert_eq!(second.try_recv().unwrap().records.len(), 2);
    }

    #[test]
    fn broadcast_sink_without_listeners_is_a_no_op() {
        let sink = BroadcastSink::new(4);
        sink.deliver(&batch());
        assert_eq!(sink.receiver_count(), 0);
    }
}
