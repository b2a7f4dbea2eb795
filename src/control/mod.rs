//! Inference control channel
//!
//! A long-lived WebSocket connection used to start/stop inference on the
//! backend, with a lifecycle independent of the frame transport. Commands
//! are plain text frames carrying the target camera id (the backend's wire
//! contract). The server is the source of truth for the `running` state; it
//! is observed asynchronously via pushed state messages, never inferred from
//! the act of sending a command.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::camera::CameraId;
use crate::error::{Error, Result};

/// Events the control channel emits to its subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// Control connection established
    Opened,
    /// Server pushed an inference state change
    StateChanged { running: bool },
    /// Transport failed
    Errored { reason: String },
    /// Connection closed
    Closed,
}

/// Opens control channels
pub trait ControlConnector: Send + Sync + 'static {
    /// Open a control connection against `url`, reporting events through
    /// `events`. `buffer` bounds the outbound command queue.
    fn open(&self, url: String, events: mpsc::Sender<ControlEvent>, buffer: usize)
        -> ControlChannel;
}

/// Handle to an open (or opening) control connection
#[derive(Debug)]
pub struct ControlChannel {
    outbound: mpsc::Sender<String>,
    close_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ControlChannel {
    /// Wrap an already-spawned control task
    pub fn new(
        outbound: mpsc::Sender<String>,
        close_tx: oneshot::Sender<()>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            outbound,
            close_tx: Some(close_tx),
            task: Some(task),
        }
    }

    /// Request an inference toggle for `camera`.
    ///
    /// Non-blocking: the command is queued for the writer task and the
    /// resulting state is observed via a later [`ControlEvent::StateChanged`]
    /// push. Fails with [`Error::ControlUnavailable`] if the connection is
    /// gone or the queue is full; no transport action is taken in that case.
    pub fn request_toggle(&self, camera: CameraId) -> Result<()> {
        self.outbound
            .try_send(camera.as_str().to_string())
            .map_err(|_| Error::ControlUnavailable)
    }

    /// Close the control connection.
    ///
    /// Idempotent. Any queued toggle commands are abandoned, not retried.
    pub fn close(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
            tracing::debug!("Control channel close requested");
        }
    }

    /// Wait for the control task to finish (after `close()`)
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ControlChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Parse a server push into an inference state, if recognizable.
///
/// The acknowledgment shape is not pinned down upstream, so parsing is
/// deliberately lenient: the first word decides, anything else is ignored.
pub fn parse_push(text: &str) -> Option<bool> {
    let lowered = text.trim().to_ascii_lowercase();
    let head = lowered
        .split(|c: char| c.is_whitespace() || c == ':')
        .next()
        .unwrap_or("");

    match head {
        "running" | "started" => Some(true),
        "stopped" | "idle" => Some(false),
        _ => None,
    }
}

/// WebSocket-backed control connector
#[derive(Debug, Clone, Default)]
pub struct WsControlConnector {
    connect_timeout: Option<Duration>,
}

impl WsControlConnector {
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

impl ControlConnector for WsControlConnector {
    fn open(
        &self,
        url: String,
        events: mpsc::Sender<ControlEvent>,
        buffer: usize,
    ) -> ControlChannel {
        let (outbound_tx, outbound_rx) = mpsc::channel(buffer.max(1));
        let (close_tx, close_rx) = oneshot::channel();
        let timeout = self.connect_timeout;

        let task = tokio::spawn(async move {
            run_control_channel(url, events, outbound_rx, timeout, close_rx).await;
        });

        ControlChannel::new(outbound_tx, close_tx, task)
    }
}

async fn run_control_channel(
    url: String,
    events: mpsc::Sender<ControlEvent>,
    mut outbound_rx: mpsc::Receiver<String>,
    connect_timeout: Option<Duration>,
    mut close_rx: oneshot::Receiver<()>,
) {
    tracing::debug!(url = %url, "Connecting control channel");

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
            let _ = events.send(ControlEvent::Closed).await;
            return;
        }
        result = connect => match result {
            Ok((ws, _response)) => ws,
            Err(reason) => {
                tracing::warn!(url = %url, error = %reason, "Control channel connect failed");
                let _ = events.send(ControlEvent::Errored { reason }).await;
                return;
            }
        },
    };

    tracing::info!(url = %url, "Control channel open");
    if events.send(ControlEvent::Opened).await.is_err() {
        return;
    }

    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            _ = &mut close_rx => {
                let _ = write.send(Message::Close(None)).await;
                let _ = events.send(ControlEvent::Closed).await;
                tracing::debug!("Control channel closed");
                return;
            }
            cmd = outbound_rx.recv() => match cmd {
                Some(camera) => {
                    tracing::info!(camera = %camera, "Sending inference toggle");
                    if let Err(e) = write.send(Message::Text(camera)).await {
                        let reason = e.to_string();
                        tracing::warn!(error = %reason, "Control channel send failed");
                        let _ = events.send(ControlEvent::Errored { reason }).await;
                        return;
                    }
                }
                // Channel handle dropped; treat as close
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    let _ = events.send(ControlEvent::Closed).await;
                    return;
                }
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => match parse_push(&text) {
                    Some(running) => {
                        tracing::info!(running = running, "Inference state push");
                        if events.send(ControlEvent::StateChanged { running }).await.is_err() {
                            return;
                        }
                    }
                    None => {
                        tracing::debug!(payload = %text, "Ignoring unrecognized control push");
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    let _ = events.send(ControlEvent::Closed).await;
                    tracing::debug!("Control channel closed by peer");
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let reason = e.to_string();
                    tracing::warn!(error = %reason, "Control channel transport error");
                    let _ = events.send(ControlEvent::Errored { reason }).await;
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

    #[test]
    fn test_parse_push() {
        assert_eq!(parse_push("running"), Some(true));
        assert_eq!(parse_push("running Oak0"), Some(true));
        assert_eq!(parse_push("started:Oak1"), Some(true));
        assert_eq!(parse_push("  STOPPED "), Some(false));
        assert_eq!(parse_push("idle"), Some(false));
        assert_eq!(parse_push("hello"), None);
        assert_eq!(parse_push(""), None);
    }

    #[tokio::test]
    async fn test_toggle_unavailable_when_task_gone() {
        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(1);
        drop(outbound_rx);
        let (close_tx, _close_rx) = oneshot::channel();
        let task = tokio::spawn(async {});

        let channel = ControlChannel::new(outbound_tx, close_tx, task);

        assert_eq!(
            channel.request_toggle(CameraId::Oak0),
            Err(Error::ControlUnavailable)
        );
    }

    #[tokio::test]
    async fn test_toggle_roundtrip() {
        // Server: read the camera command, acknowledge with a running push.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            match ws.next().await.unwrap().unwrap() {
                Message::Text(camera) => {
                    assert_eq!(camera, "Oak0");
                    ws.send(Message::Text(format!("running {}", camera)))
                        .await
                        .unwrap();
                }
                other => panic!("Expected text command, got {:?}", other),
            }
        });

        let (events_tx, mut events_rx) = mpsc::channel(16);
        let connector = WsControlConnector::new();
        let channel = connector.open(format!("ws://{}", addr), events_tx, 16);

        assert_eq!(events_rx.recv().await.unwrap(), ControlEvent::Opened);

        channel.request_toggle(CameraId::Oak0).unwrap();

        assert_eq!(
            events_rx.recv().await.unwrap(),
            ControlEvent::StateChanged { running: true }
        );
    }
}
