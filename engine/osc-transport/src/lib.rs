//! OSC transport for the event batcher
//!
//! Decodes OSC 1.0 packets (messages and bundles) into [`event_batcher::InboundMessage`]s and
//! delivers them from a UDP socket through the [`event_batcher::Transport`] trait.

pub mod codec;
pub mod config;
pub mod encode;
pub mod error;
pub mod udp;

pub use codec::{decode_packet, OscMessage};
pub use config::TransportConfig;
pub use encode::{encode_bundle, encode_message};
pub use error::{ConfigError, DecodeError};
pub use udp::{TransportStats, TransportStatsSnapshot, UdpTransport};

/// Default UDP listen port
pub const DEFAULT_PORT: u16 = 9000;

/// Default receive buffer, large enough for any UDP datagram
pub const DEFAULT_RECV_BUFFER_BYTES: usize = 65536;

/// Bundles nested deeper than this are rejected
pub const MAX_BUNDLE_DEPTH: usize = 8;
