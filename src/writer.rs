//! Writer task that owns the socket's write half.
//!
//! The dispatch task never writes to the socket itself. It queues
//! [`OutboundFrame`]s on a bounded mpsc channel and a single writer task
//! drains the queue, coalescing whatever is ready into one vectored write.
//!
//! ```text
//! dispatch task ─► mpsc::Sender<OutboundFrame> ─► writer task ─► socket
//! ```
//!
//! A full queue makes [`WriterHandle::send`] wait, which stalls the dispatch
//! task until the peer drains the socket.

use std::io::IoSlice;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{EngineError, Result};
use crate::protocol::{Frame, HEADER_SIZE};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Upper bound on frames coalesced into one write.
const MAX_BATCH_SIZE: usize = 64;

/// A frame with its header already encoded.
#[derive(Debug)]
pub struct OutboundFrame {
    pub header: [u8; HEADER_SIZE],
    pub payload: Bytes,
}

impl OutboundFrame {
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    fn parts(&self) -> [&[u8]; 2] {
        [&self.header, &self.payload]
    }
}

impl From<Frame> for OutboundFrame {
    fn from(frame: Frame) -> Self {
        Self {
            header: frame.header.encode(),
            payload: frame.payload,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Capacity of the outbound queue.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Cloneable sender side of the writer task.
#[derive(Debug, Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
    /// Frames queued but not yet written.
    pending: Arc<AtomicUsize>,
}

impl WriterHandle {
    /// Queue a frame, waiting while the queue is full.
    pub async fn send(&self, frame: impl Into<OutboundFrame>) -> Result<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.tx.send(frame.into()).await.map_err(|_| {
            self.pending.fetch_sub(1, Ordering::Release);
            EngineError::ConnectionClosed
        })
    }

    /// Queue a frame without waiting.
    ///
    /// # Errors
    ///
    /// `QueueFull` at capacity, `ConnectionClosed` once the writer has exited.
    pub fn try_send(&self, frame: impl Into<OutboundFrame>) -> Result<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.tx.try_send(frame.into()).map_err(|e| {
            self.pending.fetch_sub(1, Ordering::Release);
            match e {
                mpsc::error::TrySendError::Full(_) => EngineError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => EngineError::ConnectionClosed,
            }
        })
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task on `writer`.
///
/// The task exits with `Ok(())` once every [`WriterHandle`] is dropped and
/// the queue is drained, or with the first I/O error.
pub fn spawn_writer_task<W>(writer: W, config: WriterConfig) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let pending = Arc::new(AtomicUsize::new(0));
    let handle = WriterHandle {
        tx,
        pending: Arc::clone(&pending),
    };
    let task = tokio::spawn(writer_loop(rx, writer, pending));
    (handle, task)
}

async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W, pending: Arc<AtomicUsize>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
    while let Some(first) = rx.recv().await {
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        let count = batch.len();
        let result = write_batch(&mut writer, &batch).await;
        batch.clear();
        pending.fetch_sub(count, Ordering::Release);
        if let Err(e) = result {
            tracing::error!("Writer failed after {} frames queued: {}", count, e);
            return Err(e);
        }
    }
    writer.shutdown().await?;
    Ok(())
}

/// Write every frame of `batch`, resuming after short writes.
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total: usize = batch.iter().map(OutboundFrame::size).sum();
    let mut written = 0;
    while written < total {
        let slices = slices_after(batch, written);
        let n = writer.write_vectored(&slices).await?;
        if n == 0 {
            return Err(EngineError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "peer socket accepted no bytes",
            )));
        }
        written += n;
    }
    writer.flush().await?;
    Ok(())
}

/// Non-empty slices of `batch` with the first `skip` bytes dropped.
fn slices_after(batch: &[OutboundFrame], mut skip: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    for part in batch.iter().flat_map(OutboundFrame::parts) {
        if skip >= part.len() {
            skip -= part.len();
            continue;
        }
        slices.push(IoSlice::new(&part[skip..]));
        skip = 0;
    }
    slices
}
