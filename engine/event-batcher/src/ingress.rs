//! Ingress handling: keying and the overwrite policy

use std::sync::Arc;

use tracing::{debug, info};

use crate::metrics::MetricsCollector;
use crate::table::{EventTable, WriteOutcome, WritePolicy};
use crate::transport::InboundMessage;
use crate::value::ArgValue;

/// Anything that consumes decoded messages
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, message: InboundMessage);
}

/// Event key for a message: sender and address pattern concatenated as-is.
///
/// No delimiter is inserted, so `"1.2.3" + ".4/x"` and `"1.2.3.4" + "/x"` share a key. Address
/// patterns always start with `/` on the OSC wire, which keeps real senders apart.
pub fn event_key(sender: &str, address_pattern: &str) -> String {
    let mut key = String::with_capacity(sender.len() + address_pattern.len());
    key.push_str(sender);
    key.push_str(address_pattern);
    key
}

/// Applies the coalescing policy to each inbound message
pub struct IngressHandler {
    table: Arc<EventTable>,
    control_prefix: String,
    metrics: Arc<MetricsCollector>,
}

impl IngressHandler {
    pub fn new(
        table: Arc<EventTable>,
        control_prefix: impl Into<String>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self { table, control_prefix: control_prefix.into(), metrics }
    }

    /// Whether `address_pattern` is on the control path
    pub fn is_control(&self, address_pattern: &str) -> bool {
        address_pattern.starts_with(&self.control_prefix)
    }

    /// Store `arguments` for `sender ++ address_pattern`.
    ///
    /// Control-path keys keep their first pending value until the next drain; every other key
    /// is last-write-wins. Never fails.
    pub fn handle(
        &self,
        sender: &str,
        address_pattern: &str,
        arguments: Vec<ArgValue>,
    ) -> WriteOutcome {
        let key = event_key(sender, address_pattern);
        let control = self.is_control(address_pattern);
        let policy = if control { WritePolicy::KeepExisting } else { WritePolicy::Overwrite };

        let outcome = self.table.write(key, arguments, policy);
        self.metrics.record_write(outcome);

        if control {
            match outcome {
                WriteOutcome::Inserted => {
                    info!(sender = sender, pattern = address_pattern, "Accepted control message");
                }
                WriteOutcome::Suppressed => {
                    debug!(
                        sender = sender,
                        pattern = address_pattern,
                        "Control message already pending, dropping repeat"
                    );
                }
                _ => {}
            }
        }
        if outcome == WriteOutcome::Closed {
            debug!(sender = sender, pattern = address_pattern, "Table closed, message ignored");
        }

        outcome
    }
}

impl MessageHandler for IngressHandler {
    fn on_message(&self, message: InboundMessage) {
        self.handle(&message.sender, &message.address_pattern, message.arguments);
    }
}
