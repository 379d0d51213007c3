//! Transport seam between the wire and the ingress handler

use std::net::SocketAddr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::value::ArgValue;

/// One decoded inbound message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender address as text (an IP address for the UDP transport)
    pub sender: String,

    /// Address pattern of the message, e.g. `/fader1`
    pub address_pattern: String,

    /// Decoded arguments in message order
    pub arguments: Vec<ArgValue>,
}

impl InboundMessage {
    pub fn new(
        sender: impl Into<String>,
        address_pattern: impl Into<String>,
        arguments: Vec<ArgValue>,
    ) -> Self {
        Self { sender: sender.into(), address_pattern: address_pattern.into(), arguments }
    }
}

/// Source of decoded messages for the Engine's ingress task.
///
/// `recv` must be cancel-safe: the Engine races it against its shutdown token and drops the
/// future when a stop is requested. Messages the decoder cannot classify are dropped inside
/// the transport and never returned. Returning [`TransportError::Closed`] ends ingress.
#[async_trait]
pub trait Transport: Send + 'static {
    async fn recv(&mut self) -> Result<InboundMessage, TransportError>;

    /// Address the transport is listening on, if it has one
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// In-process transport fed through an mpsc channel
pub struct ChannelTransport {
    receiver: mpsc::UnboundedReceiver<InboundMessage>,
}

impl ChannelTransport {
    /// Create a transport and the sender that feeds it
    pub fn new() -> (mpsc::UnboundedSender<InboundMessage>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, Self { receiver })
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn recv(&mut self) -> Result<InboundMessage, TransportError> {
        self.receiver.recv().await.ok_or(TransportError::Closed)
    }
}
