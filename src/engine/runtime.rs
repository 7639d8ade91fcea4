//! Engine builder and runtime loops.
//!
//! [`EngineBuilder::start`] splits the peer stream and spawns three tasks:
//! 1. Read loop: reassembles frames and queues them for dispatch
//! 2. Dispatch loop: feeds every queued message to the engine, then drains
//!    the engine's outbox into the writer
//! 3. Writer task (see [`crate::writer`])
//!
//! Backend events enter the same queue through [`EngineHandle::events`], so
//! frames and events are handled strictly one at a time in arrival order.
//!
//! # Example
//!
//! ```ignore
//! use bearer_dispatch::EngineBuilder;
//!
//! let handle = EngineBuilder::new(bearer, network)
//!     .sip_discovery(sip)
//!     .isim(isim)
//!     .start(socket);
//! handle.enable()?;
//!
//! let events = handle.events();
//! // ... backends call events.send(...) from their own threads ...
//!
//! handle.wait_for_shutdown().await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{Backends, Engine};
use crate::backend::{BearerControlBackend, IsimSource, NetworkBackend, SipDiscovery};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::event::{BackendEvent, Dispatch, EventSender};
use crate::protocol::FrameBuffer;
use crate::writer::{spawn_writer_task, WriterConfig, WriterHandle};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Builder for an engine bound to one peer connection.
pub struct EngineBuilder {
    backends: Backends,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new(bearer: Arc<dyn BearerControlBackend>, network: Arc<dyn NetworkBackend>) -> Self {
        Self {
            backends: Backends::new(bearer, network),
            config: EngineConfig::default(),
        }
    }

    /// Backend for DHCP-based P-CSCF discovery. Without one, DHCP requests
    /// are rejected.
    pub fn sip_discovery(mut self, sip: Arc<dyn SipDiscovery>) -> Self {
        self.backends.sip = Some(sip);
        self
    }

    /// Source of ISIM-provisioned P-CSCF addresses.
    pub fn isim(mut self, isim: Arc<dyn IsimSource>) -> Self {
        self.backends.isim = Some(isim);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Delay before a failed default activation is rejected.
    ///
    /// Default: 5 seconds
    pub fn reject_debounce(mut self, delay: Duration) -> Self {
        self.config.reject_debounce_ms = delay.as_millis() as u64;
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Start serving `stream`. Must be called from within a tokio runtime.
    ///
    /// The engine starts disabled; call [`EngineHandle::enable`] once the
    /// backends are ready.
    pub fn start<S>(self, stream: S) -> EngineHandle
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, write_half) = tokio::io::split(stream);
        let writer_config = WriterConfig {
            channel_capacity: self.config.channel_capacity,
        };
        let (writer, writer_task) = spawn_writer_task(write_half, writer_config);

        let (tx, rx) = mpsc::unbounded_channel();
        let events = EventSender::new(tx);
        let max_payload_size = self.config.max_payload_size;
        let engine = Engine::new(self.backends, self.config, events.clone());

        let read_events = events.clone();
        tokio::spawn(async move {
            match read_loop(reader, &read_events, max_payload_size).await {
                Ok(()) => tracing::info!("Peer closed the connection"),
                Err(e) => tracing::error!("Read loop error: {}", e),
            }
            let _ = read_events.post(Dispatch::Shutdown);
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let dispatch_writer = writer.clone();
        tokio::spawn(async move {
            dispatch_loop(engine, rx, dispatch_writer).await;
            let _ = shutdown_tx.send(());
        });

        EngineHandle {
            events,
            writer,
            shutdown_rx,
            writer_task,
        }
    }
}

/// Reads frames until EOF and queues them for dispatch.
async fn read_loop<R>(mut reader: R, events: &EventSender, max_payload_size: u32) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut frame_buffer = FrameBuffer::with_max_payload(max_payload_size);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            if frame_buffer.is_mid_frame() {
                tracing::warn!(buffered = frame_buffer.len(), "Connection closed mid-frame");
            }
            return Ok(());
        }

        for frame in frame_buffer.push(&buf[..n])? {
            events.post(Dispatch::Frame(frame))?;
        }
    }
}

async fn dispatch_loop(mut engine: Engine, mut rx: mpsc::UnboundedReceiver<Dispatch>, writer: WriterHandle) {
    while let Some(message) = rx.recv().await {
        let shutdown = matches!(message, Dispatch::Shutdown);
        engine.dispatch(message);

        for frame in engine.take_outbox() {
            if let Err(e) = writer.send(frame).await {
                tracing::error!("Dropping outbound frame: {}", e);
            }
        }
        if shutdown {
            break;
        }
    }
    tracing::info!(engine = ?engine, "Dispatch loop stopped");
}

/// A running engine.
///
/// Dropping the handle does not stop the engine; it runs until the peer
/// closes the connection or [`EngineHandle::shutdown`] is called.
pub struct EngineHandle {
    events: EventSender,
    writer: WriterHandle,
    shutdown_rx: oneshot::Receiver<()>,
    writer_task: JoinHandle<Result<()>>,
}

impl EngineHandle {
    /// Start accepting frames and backend events.
    pub fn enable(&self) -> Result<()> {
        self.events.post(Dispatch::Enable)
    }

    /// Drop all pending state and stop both network features.
    pub fn disable(&self) -> Result<()> {
        self.events.post(Dispatch::Disable)
    }

    /// Sender for backend callbacks.
    pub fn events(&self) -> EventSender {
        self.events.clone()
    }

    pub fn send_event(&self, event: BackendEvent) -> Result<()> {
        self.events.send(event)
    }

    /// Frames queued but not yet written.
    pub fn pending_frames(&self) -> usize {
        self.writer.pending_count()
    }

    /// Stop the dispatch loop after the messages already queued.
    pub fn shutdown(&self) -> Result<()> {
        self.events.post(Dispatch::Shutdown)
    }

    /// Wait until the dispatch loop stops and every queued frame is written.
    pub async fn wait_for_shutdown(self) -> Result<()> {
        let _ = self.shutdown_rx.await;
        drop(self.writer);
        self.writer_task
            .await
            .map_err(|e| EngineError::Protocol(format!("writer task failed: {e}")))?
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("pending_frames", &self.pending_frames())
            .finish_non_exhaustive()
    }
}
