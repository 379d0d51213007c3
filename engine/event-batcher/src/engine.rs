//! Engine lifecycle: owns the table, the ingress task and the emitter task

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::emitter::BatchEmitter;
use crate::error::{EngineError, EngineResult, TransportError};
use crate::ingress::{IngressHandler, MessageHandler};
use crate::metrics::{EngineStats, MetricsCollector};
use crate::sink::EventSink;
use crate::table::EventTable;
use crate::transport::Transport;

/// Where the Engine is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Transport bound, nothing running yet
    Created,
    /// Ingress and emitter tasks are running
    Started,
    /// Terminal; tasks joined and the table closed
    Stopped,
    /// The transport could not be acquired; the Engine can never start
    Unbound,
}

/// The coalescing engine
pub struct Engine<T: Transport> {
    // Core state
    state: EngineState,
    config: EngineConfig,

    // Ingress side
    transport: Option<T>,
    local_addr: Option<SocketAddr>,
    bind_error: Option<String>,
    handler: Arc<IngressHandler>,

    // Emission side
    table: Arc<EventTable>,
    sinks: Vec<Arc<dyn EventSink>>,

    // Task management
    shutdown: CancellationToken,
    ingress_task: Option<JoinHandle<()>>,
    emitter_task: Option<JoinHandle<()>>,

    // Metrics
    metrics: Arc<MetricsCollector>,
}

impl<T: Transport> Engine<T> {
    /// Create an Engine around the result of binding a transport.
    ///
    /// A bind failure is logged here, once, and leaves the Engine in [`EngineState::Unbound`].
    /// An invalid configuration is returned as an error.
    pub fn new(config: EngineConfig, transport: Result<T, TransportError>) -> EngineResult<Self> {
        config.validate()?;

        let metrics = Arc::new(MetricsCollector::new());
        let table = Arc::new(EventTable::new());
        let handler =
            Arc::new(IngressHandler::new(table.clone(), config.control_prefix.clone(), metrics.clone()));

        let (state, transport, local_addr, bind_error) = match transport {
            Ok(transport) => {
                let local_addr = transport.local_addr();
                match local_addr {
                    Some(addr) => tracing::info!("Engine bound to {}", addr),
                    None => tracing::info!("Engine bound to in-process transport"),
                }
                (EngineState::Created, Some(transport), local_addr, None)
            }
            Err(e) => {
                tracing::error!("Engine transport setup failed: {}", e);
                (EngineState::Unbound, None, None, Some(e.to_string()))
            }
        };

        Ok(Self {
            state,
            config,
            transport,
            local_addr,
            bind_error,
            handler,
            table,
            sinks: Vec::new(),
            shutdown: CancellationToken::new(),
            ingress_task: None,
            emitter_task: None,
            metrics,
        })
    }

    /// Register a subscriber. Only allowed before `start`.
    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) -> EngineResult<()> {
        match self.state {
            EngineState::Created | EngineState::Unbound => {
                self.sinks.push(sink);
                Ok(())
            }
            EngineState::Started => Err(EngineError::AlreadyStarted),
            EngineState::Stopped => Err(EngineError::AlreadyStopped),
        }
    }

    /// Start ingress and schedule the first emission one period from now.
    ///
    /// Fails with [`EngineError::NoRuntime`] when called outside a Tokio runtime.
    pub fn start(&mut self) -> EngineResult<()> {
        match self.state {
            EngineState::Created => {}
            EngineState::Started => return Err(EngineError::AlreadyStarted),
            EngineState::Stopped => return Err(EngineError::AlreadyStopped),
            EngineState::Unbound => {
                let reason = self.bind_error.clone().unwrap_or_else(|| "unknown".to_string());
                return Err(EngineError::NotBound(reason));
            }
        }

        let runtime = Handle::try_current().map_err(|e| EngineError::NoRuntime(e.to_string()))?;

        let transport = self
            .transport
            .take()
            .ok_or_else(|| EngineError::NotBound("transport already released".to_string()))?;

        let emitter = Arc::new(BatchEmitter::new(
            self.table.clone(),
            std::mem::take(&mut self.sinks),
            self.metrics.clone(),
        ));

        let handler: Arc<dyn MessageHandler> = self.handler.clone();
        self.ingress_task =
            Some(runtime.spawn(run_ingress(transport, handler, self.shutdown.clone())));
        self.emitter_task =
            Some(runtime.spawn(emitter.run(self.config.emission_period(), self.shutdown.clone())));
        self.state = EngineState::Started;

        tracing::info!(
            period_ms = self.config.emission_period_ms,
            control_prefix = %self.config.control_prefix,
            "Engine started"
        );
        Ok(())
    }

    /// Stop both tasks, wait for them, and discard anything still pending.
    ///
    /// Always waits for both tasks to finish, including a sink delivery already in progress.
    /// A task still running after `shutdown_timeout_ms` is reported with a warning and then
    /// awaited. Returns the number of discarded entries. When this returns, no further table
    /// mutation or emission will happen.
    pub async fn stop(&mut self) -> EngineResult<usize> {
        if self.state == EngineState::Stopped {
            return Err(EngineError::AlreadyStopped);
        }

        tracing::info!("Stopping Engine...");
        self.shutdown.cancel();

        let timeout = self.config.shutdown_timeout();
        let mut join_error = None;
        for (name, task) in [("ingress", self.ingress_task.take()), ("emitter", self.emitter_task.take())]
        {
            let Some(mut task) = task else { continue };
            let joined = match tokio::time::timeout(timeout, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    tracing::warn!("{} task still running after {:?}, waiting for it", name, timeout);
                    task.await
                }
            };
            match joined {
                Ok(()) => tracing::debug!("{} task stopped", name),
                Err(e) => {
                    tracing::error!("{} task failed: {}", name, e);
                    join_error.get_or_insert_with(|| format!("{name}: {e}"));
                }
            }
        }

        self.transport = None;
        let discarded = self.table.close();
        self.metrics.record_discarded(discarded);
        self.state = EngineState::Stopped;

        if discarded > 0 {
            tracing::info!("Engine stopped, discarded {} pending events", discarded);
        } else {
            tracing::info!("Engine stopped");
        }

        match join_error {
            Some(e) => Err(EngineError::Join(e)),
            None => Ok(discarded),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == EngineState::Started
    }

    /// Handler for feeding messages from additional sources
    pub fn handler(&self) -> Arc<IngressHandler> {
        self.handler.clone()
    }

    /// The shared table, for inspection
    pub fn table(&self) -> Arc<EventTable> {
        self.table.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Why the transport could not be bound, if it couldn't
    pub fn bind_error(&self) -> Option<&str> {
        self.bind_error.as_deref()
    }

    /// Get current metrics
    pub fn stats(&self) -> EngineStats {
        self.metrics.get_stats()
    }
}

impl<T: Transport> Drop for Engine<T> {
    fn drop(&mut self) {
        if self.state == EngineState::Started {
            tracing::warn!("Engine dropped while running; cancelling tasks without joining");
            self.shutdown.cancel();
            self.table.close();
        }
    }
}

const RECV_BACKOFF_INITIAL: Duration = Duration::from_millis(10);
const RECV_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Pull messages from `transport` into `handler` until shutdown or the transport closes.
///
/// Consecutive receive errors back off exponentially up to one second; only the first error
/// of a run is logged at `warn`.
async fn run_ingress<T: Transport>(
    mut transport: T,
    handler: Arc<dyn MessageHandler>,
    shutdown: CancellationToken,
) {
    tracing::debug!("Ingress task started");
    let mut consecutive_errors: u32 = 0;
    let mut backoff = RECV_BACKOFF_INITIAL;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            received = transport.recv() => match received {
                Ok(message) => {
                    if consecutive_errors > 0 {
                        tracing::info!("Transport recovered after {} failed receives", consecutive_errors);
                        consecutive_errors = 0;
                        backoff = RECV_BACKOFF_INITIAL;
                    }
                    handler.on_message(message);
                }
                Err(TransportError::Closed) => {
                    tracing::info!("Transport closed, ingress finished");
                    break;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors == 1 {
                        tracing::warn!("Transport receive failed: {}", e);
                    } else {
                        tracing::debug!(attempt = consecutive_errors, "Transport receive failed: {}", e);
                    }

                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(RECV_BACKOFF_MAX);
                }
            },
        }
    }

    tracing::debug!("Ingress task stopped");
}
