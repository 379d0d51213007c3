//! Error types for the OSC transport

use thiserror::Error;

/// Reasons a packet is dropped at the decode boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Packet truncated at byte {0}")]
    Truncated(usize),

    #[error("Unknown type tag '{0}'")]
    UnknownTypeTag(char),

    #[error("Type tag string missing or not starting with ','")]
    MissingTypeTags,

    #[error("Invalid address pattern: {0:?}")]
    BadAddress(String),

    #[error("String at byte {0} is not valid UTF-8")]
    InvalidUtf8(usize),

    #[error("Bad bundle element: {0}")]
    BadBundleElement(String),
}

/// Invalid transport settings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    #[error("Receive buffer too small: {0} bytes")]
    BufferTooSmall(usize),

    #[error("Invalid listen address {0:?}")]
    InvalidHost(String),
}
