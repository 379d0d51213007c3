//! Service wiring: UDP transport, engine and stdout subscriber

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use event_batcher::{Engine, EngineStats, EventSink};
use osc_transport::{TransportStats, UdpTransport};

use crate::config::ServiceConfig;
use crate::output::LineSink;

/// Running listener: one engine fed by one UDP socket
pub struct ListenerService {
    engine: Engine<UdpTransport>,
    transport_stats: Option<Arc<TransportStats>>,
}

impl ListenerService {
    /// Bind the transport and build the engine with a stdout subscriber.
    ///
    /// A bind failure does not fail construction; the engine records it and `start` reports it.
    pub async fn new(config: &ServiceConfig) -> Result<Self> {
        let sink = Arc::new(LineSink::stdout(config.output.format));
        Self::with_sink(config, sink).await
    }

    /// Same as [`ListenerService::new`] with a caller-supplied subscriber
    pub async fn with_sink(config: &ServiceConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        let transport = UdpTransport::bind(&config.transport).await;
        let transport_stats = transport.as_ref().ok().map(UdpTransport::stats);

        let mut engine =
            Engine::new(config.engine.clone(), transport).context("Failed to create engine")?;
        engine.subscribe(sink).context("Failed to attach output subscriber")?;

        Ok(Self { engine, transport_stats })
    }

    pub fn start(&mut self) -> Result<()> {
        self.engine.start().context("Failed to start engine")?;
        match self.engine.local_addr() {
            Some(addr) => info!("Listening for OSC on {}", addr),
            None => info!("Engine started"),
        }
        Ok(())
    }

    /// Why the UDP socket could not be bound; already logged by the engine
    pub fn bind_error(&self) -> Option<&str> {
        self.engine.bind_error()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.engine.local_addr()
    }

    pub fn engine_stats(&self) -> EngineStats {
        self.engine.stats()
    }

    /// Stop the engine, log final counters and return how many pending events were dropped
    pub async fn shutdown(&mut self) -> Result<usize> {
        info!("Starting graceful shutdown...");
        let discarded = self.engine.stop().await.context("Failed to stop engine")?;
        if discarded > 0 {
            warn!("Discarded {} pending events on shutdown", discarded);
        }

        let stats = self.engine.stats();
        info!(
            batches = stats.batches_emitted,
            events = stats.events_emitted,
            ingested = stats.messages_ingested,
            "Engine stopped"
        );
        if let Some(transport) = &self.transport_stats {
            let snapshot = transport.snapshot();
            info!(
                datagrams = snapshot.datagrams_received,
                malformed = snapshot.packets_malformed,
                "Transport closed"
            );
        }

        Ok(discarded)
    }
}
