//! UDP transport
//!
//! Receives datagrams on a single socket, decodes each one into zero or more OSC messages and
//! hands them to the Engine one at a time. Malformed datagrams are counted and dropped.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use event_batcher::{InboundMessage, Transport, TransportError};
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::codec::decode_packet;
use crate::config::TransportConfig;

/// Counters for the UDP receive path
#[derive(Debug, Default)]
pub struct TransportStats {
    datagrams_received: AtomicU64,
    packets_malformed: AtomicU64,
    messages_decoded: AtomicU64,
}

/// Point-in-time copy of [`TransportStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportStatsSnapshot {
    pub datagrams_received: u64,
    pub packets_malformed: u64,
    pub messages_decoded: u64,
}

impl TransportStats {
    pub fn snapshot(&self) -> TransportStatsSnapshot {
        TransportStatsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            packets_malformed: self.packets_malformed.load(Ordering::Relaxed),
            messages_decoded: self.messages_decoded.load(Ordering::Relaxed),
        }
    }
}

/// OSC over UDP
pub struct UdpTransport {
    socket: UdpSocket,
    buf: Vec<u8>,
    pending: VecDeque<InboundMessage>,
    stats: Arc<TransportStats>,
}

impl UdpTransport {
    /// Bind a socket at the configured host and port
    pub async fn bind(config: &TransportConfig) -> Result<Self, TransportError> {
        let addr = config.listen_addr();
        let socket = UdpSocket::bind(&addr)
            .await
            .map_err(|source| TransportError::Bind { addr: addr.clone(), source })?;

        info!("OSC transport listening on {}", socket.local_addr().map(|a| a.to_string()).unwrap_or(addr));

        Ok(Self {
            socket,
            buf: vec![0u8; config.recv_buffer_bytes],
            pending: VecDeque::new(),
            stats: Arc::new(TransportStats::default()),
        })
    }

    /// Shared handle to the receive counters
    pub fn stats(&self) -> Arc<TransportStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn recv(&mut self) -> Result<InboundMessage, TransportError> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Ok(message);
            }

            let (len, peer) = self.socket.recv_from(&mut self.buf).await?;
            self.stats.datagrams_received.fetch_add(1, Ordering::Relaxed);

            match decode_packet(&self.buf[..len]) {
                Ok(messages) => {
                    self.stats.messages_decoded.fetch_add(messages.len() as u64, Ordering::Relaxed);
                    let sender = peer.ip().to_string();
                    self.pending.extend(
                        messages
                            .into_iter()
                            .map(|m| InboundMessage::new(sender.clone(), m.address, m.arguments)),
                    );
                }
                Err(e) => {
                    self.stats.packets_malformed.fetch_add(1, Ordering::Relaxed);
                    debug!("Dropping malformed packet from {}: {}", peer, e);
                }
            }
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }
}
