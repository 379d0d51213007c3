//! OSC listener service library
//!
//! Configuration loading, logging setup, signal handling and the wiring that connects a UDP
//! transport to the event batcher and prints every batch.

pub mod config;
pub mod logging;
pub mod output;
pub mod service;
pub mod signals;

pub use config::{load_config, Cli, OutputFormat, ServiceConfig};
pub use logging::initialize_logging;
pub use output::LineSink;
pub use service::ListenerService;
pub use signals::setup_signal_handlers;
