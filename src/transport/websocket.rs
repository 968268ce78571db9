//! Production WebSocket transport backed by `tokio-tungstenite`.
//!
//! Owns one connection at a time. A dedicated background task runs the
//! receive loop and forwards every complete message into a bounded hand-off
//! channel that the session drains from its own task. Frame reassembly is
//! performed by `tungstenite`, so the unit of accounting here is the
//! assembled message.
//!
//! Close is observed exactly once per connection regardless of origin (user
//! close, server close frame, or receive error): whichever path wins flips
//! the shared open flag, and the flag never flips back for that connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::constants::MESSAGE_RING_CAPACITY;
use crate::error::Result;
use crate::transport::{MessageBlock, Transport, TransportTelemetry};

type WriterHalf =
    futures_util::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

// ---------------------------------------------------------------------------
// Shared receive-path state
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Counters {
    bytes_rx: AtomicU64,
    messages_rx: AtomicU64,
    dropped: AtomicU64,
}

struct Shared {
    open: AtomicBool,
    last_rx: std::sync::Mutex<Instant>,
    counters: Counters,
}

impl Shared {
    fn touch_rx(&self) {
        *self.last_rx.lock().expect("last_rx lock poisoned") = Instant::now();
    }
}

// ---------------------------------------------------------------------------
// WebSocketTransport
// ---------------------------------------------------------------------------

/// WebSocket transport for one connection at a time.
///
/// All methods are called from the session task; only the shared open flag,
/// the liveness clock, and the counters cross into the receive task.
pub struct WebSocketTransport {
    writer: Arc<Mutex<Option<WriterHalf>>>,
    rx: Option<mpsc::Receiver<MessageBlock>>,
    read_task: Option<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl WebSocketTransport {
    /// Create an unconnected transport.
    pub fn new() -> Self {
        Self {
            writer: Arc::new(Mutex::new(None)),
            rx: None,
            read_task: None,
            shared: Arc::new(Shared {
                open: AtomicBool::new(false),
                last_rx: std::sync::Mutex::new(Instant::now()),
                counters: Counters::default(),
            }),
        }
    }

    /// The receive loop: runs on a dedicated task until the connection ends.
    async fn read_loop(
        mut read: futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
        tx: mpsc::Sender<MessageBlock>,
        shared: Arc<Shared>,
    ) {
        loop {
            match read.next().await {
                Some(Ok(msg)) => match msg {
                    Message::Text(text) => {
                        shared.touch_rx();
                        Self::publish(&tx, &shared, Bytes::from(text));
                    }
                    Message::Binary(data) => {
                        shared.touch_rx();
                        Self::publish(&tx, &shared, data);
                    }
                    Message::Ping(_) | Message::Pong(_) => {
                        // Control frames count as liveness evidence; the
                        // pong reply is queued by tungstenite itself.
                        shared.touch_rx();
                    }
                    Message::Close(frame) => {
                        tracing::info!(?frame, "WebSocket closed by server");
                        break;
                    }
                    _ => {}
                },
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "WebSocket receive error");
                    break;
                }
                None => {
                    tracing::info!("WebSocket stream ended");
                    break;
                }
            }
        }

        if shared.open.swap(false, Ordering::AcqRel) {
            tracing::debug!("transport close observed (receive path)");
        }
    }

    fn publish(tx: &mpsc::Sender<MessageBlock>, shared: &Shared, payload: Bytes) {
        shared
            .counters
            .bytes_rx
            .fetch_add(payload.len() as u64, Ordering::Relaxed);
        shared.counters.messages_rx.fetch_add(1, Ordering::Relaxed);

        if tx.try_send(MessageBlock::new(payload)).is_err() {
            let dropped = shared.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(dropped, "message ring full, dropping newest message");
        }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&mut self, url: &str) -> Result<()> {
        // One connection at a time: tear down any previous one first.
        self.close().await;

        url::Url::parse(url)?;

        let (ws, _resp) = connect_async(url).await?;
        let (write, read) = ws.split();

        *self.writer.lock().await = Some(write);

        let (tx, rx) = mpsc::channel(MESSAGE_RING_CAPACITY);
        self.rx = Some(rx);

        self.shared.open.store(true, Ordering::Release);
        self.shared.touch_rx();

        let shared = self.shared.clone();
        self.read_task = Some(tokio::spawn(Self::read_loop(read, tx, shared)));

        tracing::info!(url, "WebSocket connected");
        Ok(())
    }

    async fn send(&mut self, payload: &str) -> bool {
        if !self.is_open() {
            return false;
        }

        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return false;
        };

        match writer.send(Message::Text(payload.into())).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "WebSocket send failed");
                // A failed send means the connection is gone.
                self.shared.open.store(false, Ordering::Release);
                false
            }
        }
    }

    async fn close(&mut self) {
        if self.shared.open.swap(false, Ordering::AcqRel) {
            tracing::debug!("transport close requested");
        }

        let mut guard = self.writer.lock().await;
        if let Some(mut writer) = guard.take() {
            let _ = writer.send(Message::Close(None)).await;
        }
        drop(guard);

        if let Some(task) = self.read_task.take() {
            task.abort();
        }
        self.rx = None;
    }

    fn try_recv(&mut self) -> Option<MessageBlock> {
        self.rx.as_mut()?.try_recv().ok()
    }

    fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::Acquire)
    }

    fn is_drained(&self) -> bool {
        self.rx.as_ref().is_none_or(|rx| rx.is_empty())
    }

    fn idle_for(&self) -> Duration {
        self.shared
            .last_rx
            .lock()
            .expect("last_rx lock poisoned")
            .elapsed()
    }

    fn telemetry(&self) -> TransportTelemetry {
        TransportTelemetry {
            bytes_rx: self.shared.counters.bytes_rx.load(Ordering::Relaxed),
            messages_rx: self.shared.counters.messages_rx.load(Ordering::Relaxed),
            dropped: self.shared.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
    }
}
