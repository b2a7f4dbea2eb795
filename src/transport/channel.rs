//! Frame transport channel
//!
//! One WebSocket connection per camera stream. The channel owns a reader
//! task that decodes binary payloads into frame handles and reports every
//! lifecycle transition as a typed event to its single subscriber (the
//! coordinator). No retry or backoff happens here; reconnection policy lives
//! one layer up.
//!
//! Every event carries the channel instance's [`ChannelTag`]. A reconnect
//! allocates a fresh tag, so events racing past a `close()` are recognizable
//! as stale and discarded by the subscriber.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::frame::{FrameHandle, HandleTracker};

/// Connection lifecycle state of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not yet opened
    Idle,
    /// Connect in flight
    Connecting,
    /// Connected, frames flowing
    Open,
    /// Closed deliberately
    Closed,
    /// Transport failed; reason recorded alongside
    Errored,
}

/// Identity of one channel instance
///
/// Monotonically allocated per session; never reused across reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelTag(pub u64);

impl std::fmt::Display for ChannelTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Events a frame channel emits to its subscriber
#[derive(Debug)]
pub enum ChannelEvent {
    /// Transport handshake succeeded; frames will follow
    Opened { tag: ChannelTag },
    /// One decoded frame arrived
    Frame { tag: ChannelTag, handle: FrameHandle },
    /// Transport failed; the channel is dead
    Errored { tag: ChannelTag, reason: String },
    /// Peer closed the stream
    Closed { tag: ChannelTag },
}

impl ChannelEvent {
    /// Tag of the channel instance that produced this event
    pub fn tag(&self) -> ChannelTag {
        match self {
            ChannelEvent::Opened { tag }
            | ChannelEvent::Frame { tag, .. }
            | ChannelEvent::Errored { tag, .. }
            | ChannelEvent::Closed { tag } => *tag,
        }
    }
}

/// Opens frame channels
///
/// The coordinator is generic over this trait so session logic can be tested
/// with stub channels that never touch a socket.
pub trait FrameConnector: Send + Sync + 'static {
    /// Open a channel against `url`, reporting all events (tagged with `tag`)
    /// through `events`.
    fn open(
        &self,
        url: String,
        tag: ChannelTag,
        events: mpsc::Sender<ChannelEvent>,
        tracker: Arc<HandleTracker>,
    ) -> FrameChannel;
}

/// Handle to an open (or opening) frame channel
///
/// Closing is idempotent: the first `close()` signals the reader task, later
/// calls are no-ops. Dropping the handle closes it as well.
#[derive(Debug)]
pub struct FrameChannel {
    tag: ChannelTag,
    close_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl FrameChannel {
    /// Wrap an already-spawned reader task
    pub fn new(tag: ChannelTag, close_tx: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        Self {
            tag,
            close_tx: Some(close_tx),
            task: Some(task),
        }
    }

    /// Tag of this channel instance
    pub fn tag(&self) -> ChannelTag {
        self.tag
    }

    /// Signal the reader task to close the connection.
    ///
    /// Idempotent; returns immediately. Frames still in flight are discarded
    /// by the subscriber via the tag guard.
    pub fn close(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
            tracing::debug!(channel = %self.tag, "Frame channel close requested");
        }
    }

    /// Wait for the reader task to finish (after `close()`)
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for FrameChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// WebSocket-backed frame connector
#[derive(Debug, Clone, Default)]
pub struct WsFrameConnector {
    connect_timeout: Option<Duration>,
}

impl WsFrameConnector {
    /// Create a connector with no connect timeout
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connector that fails connects slower than `timeout`
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            connect_timeout: timeout,
        }
    }
}

impl FrameConnector for WsFrameConnector {
    fn open(
        &self,
        url: String,
        tag: ChannelTag,
        events: mpsc::Sender<ChannelEvent>,
        tracker: Arc<HandleTracker>,
    ) -> FrameChannel {
        let (close_tx, close_rx) = oneshot::channel();
        let timeout = self.connect_timeout;

        let task = tokio::spawn(async move {
            run_frame_channel(url, tag, events, tracker, timeout, close_rx).await;
        });

        FrameChannel::new(tag, close_tx, task)
    }
}

/// Reader task: connect, then pump binary messages into frame events.
///
/// Transport errors never escape this task; they surface only as `Errored`
/// events. Malformed payloads are dropped with a warning and the loop keeps
/// waiting for the next frame.
async fn run_frame_channel(
    url: String,
    tag: ChannelTag,
    events: mpsc::Sender<ChannelEvent>,
    tracker: Arc<HandleTracker>,
    connect_timeout: Option<Duration>,
    mut close_rx: oneshot::Receiver<()>,
) {
    tracing::debug!(channel = %tag, url = %url, "Connecting frame channel");

    let connect = async {
        match connect_timeout {
            Some(limit) => match tokio::time::timeout(limit, connect_async(url.as_str())).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err(format!("connect timed out after {:?}", limit)),
            },
            None => connect_async(url.as_str()).await.map_err(|e| e.to_string()),
        }
    };

    let ws = tokio::select! {
        _ = &mut close_rx => {
            tracing::debug!(channel = %tag, "Closed while connecting");
            let _ = events.send(ChannelEvent::Closed { tag }).await;
            return;
        }
        result = connect => match result {
            Ok((ws, _response)) => ws,
            Err(reason) => {
                tracing::warn!(channel = %tag, url = %url, error = %reason, "Frame channel connect failed");
                let _ = events.send(ChannelEvent::Errored { tag, reason }).await;
                return;
            }
        },
    };

    tracing::info!(channel = %tag, url = %url, "Frame channel open");
    if events.send(ChannelEvent::Opened { tag }).await.is_err() {
        return;
    }

    let (mut write, mut read) = ws.split();
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            _ = &mut close_rx => {
                let _ = write.send(Message::Close(None)).await;
                let _ = events.send(ChannelEvent::Closed { tag }).await;
                tracing::debug!(channel = %tag, frames = seq, "Frame channel closed");
                return;
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Binary(payload))) => {
                    seq += 1;
                    match FrameHandle::from_jpeg(tag, seq, Bytes::from(payload), Arc::clone(&tracker)) {
                        Ok(handle) => {
                            if events.send(ChannelEvent::Frame { tag, handle }).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(channel = %tag, seq = seq, error = %e, "Dropping malformed frame");
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    let _ = events.send(ChannelEvent::Closed { tag }).await;
                    tracing::debug!(channel = %tag, frames = seq, "Frame channel closed by peer");
                    return;
                }
                Some(Ok(_)) => {
                    // Text/pong frames are not part of the stream contract
                }
                Some(Err(e)) => {
                    let reason = e.to_string();
                    tracing::warn!(channel = %tag, error = %reason, "Frame channel transport error");
                    let _ = events.send(ChannelEvent::Errored { tag, reason }).await;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Serve one WebSocket connection: send the given messages, then close.
    async fn spawn_stream_server(messages: Vec<Message>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            for msg in messages {
                ws.send(msg).await.unwrap();
            }
            let _ = ws.close(None).await;
        });

        format!("ws://{}", addr)
    }

    fn jpeg_bytes() -> Vec<u8> {
        vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]
    }

    #[tokio::test]
    async fn test_frames_delivered_in_order() {
        let url = spawn_stream_server(vec![
            Message::Binary(jpeg_bytes()),
            Message::Binary(jpeg_bytes()),
        ])
        .await;

        let tracker = HandleTracker::new();
        let (tx, mut rx) = mpsc::channel(16);
        let connector = WsFrameConnector::new();
        let _channel = connector.open(url, ChannelTag(1), tx, Arc::clone(&tracker));

        let opened = rx.recv().await.unwrap();
        assert!(matches!(opened, ChannelEvent::Opened { tag: ChannelTag(1) }));

        for expected_seq in 1..=2u64 {
            match rx.recv().await.unwrap() {
                ChannelEvent::Frame { handle, .. } => assert_eq!(handle.seq(), expected_seq),
                other => panic!("Expected frame, got {:?}", other),
            }
        }

        let closed = rx.recv().await.unwrap();
        assert!(matches!(closed, ChannelEvent::Closed { .. }));
    }

    #[tokio::test]
    async fn test_malformed_frame_dropped() {
        let url = spawn_stream_server(vec![
            Message::Binary(b"not a jpeg".to_vec()),
            Message::Binary(jpeg_bytes()),
        ])
        .await;

        let tracker = HandleTracker::new();
        let (tx, mut rx) = mpsc::channel(16);
        let connector = WsFrameConnector::new();
        let _channel = connector.open(url, ChannelTag(1), tx, Arc::clone(&tracker));

        assert!(matches!(
            rx.recv().await.unwrap(),
            ChannelEvent::Opened { .. }
        ));

        // The garbage payload is silently dropped; the next event is the
        // valid frame (seq counts arrivals, so the good frame is seq 2).
        match rx.recv().await.unwrap() {
            ChannelEvent::Frame { handle, .. } => assert_eq!(handle.seq(), 2),
            other => panic!("Expected frame, got {:?}", other),
        }

        assert_eq!(tracker.created(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_emits_errored() {
        // Nothing listens here
        let tracker = HandleTracker::new();
        let (tx, mut rx) = mpsc::channel(16);
        let connector = WsFrameConnector::new();
        let _channel = connector.open(
            "ws://127.0.0.1:1/preview/oak0".to_string(),
            ChannelTag(7),
            tx,
            tracker,
        );

        match rx.recv().await.unwrap() {
            ChannelEvent::Errored { tag, reason } => {
                assert_eq!(tag, ChannelTag(7));
                assert!(!reason.is_empty());
            }
            other => panic!("Expected errored, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_close_idempotent() {
        let url = spawn_stream_server(vec![]).await;

        let tracker = HandleTracker::new();
        let (tx, mut rx) = mpsc::channel(16);
        let connector = WsFrameConnector::new();
        let mut channel = connector.open(url, ChannelTag(1), tx, tracker);

        assert!(matches!(
            rx.recv().await.unwrap(),
            ChannelEvent::Opened { .. }
        ));

        channel.close();
        channel.close(); // no-op
        channel.join().await;
    }
}
