//! # EventBatcher
//!
//! Coalesces a stream of small inbound messages into a per-key latest-value table and emits
//! the accumulated table as one batch per fixed period.
//!
//! Messages are keyed by `sender ++ address pattern`. Ordinary keys are last-write-wins;
//! keys under the control prefix keep the first pending value until it has been emitted, so
//! a burst of identical control commands reaches consumers once per period.
//!
//! The [`Engine`] owns the shared [`EventTable`], runs one ingress task reading from a
//! [`Transport`] and one emitter task draining the table every period, and discards anything
//! still pending when it is stopped.

pub mod config;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod ingress;
pub mod metrics;
pub mod sink;
pub mod table;
pub mod transport;
pub mod value;

#[cfg(test)]
mod tests;


pub use config::EngineConfig;
pub use emitter::{Batch, BatchEmitter, EventRecord};
pub use engine::{Engine, EngineState};
pub use error::{EngineError, EngineResult, TransportError};
pub use ingress::{event_key, IngressHandler, MessageHandler};
pub use metrics::{EngineStats, MetricsCollector};
pub use sink::{BroadcastSink, CallbackSink, ChannelSink, EventSink};
pub use table::{EventTable, WriteOutcome, WritePolicy};
pub use transport::{ChannelTransport, InboundMessage, Transport};
pub use value::ArgValue;

/// Current version of the EventBatcher
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default emission period (200ms)
pub const DEFAULT_EMISSION_PERIOD_MS: u64 = 200;

/// Default reserved prefix for control-path address patterns
pub const DEFAULT_CONTROL_PREFIX: &str = "/control";

/// Default upper bound on how long `stop` waits for the worker tasks
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5000;
