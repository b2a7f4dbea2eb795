//! Feed session coordinator
//!
//! The coordinator is a single task that owns the whole session: the current
//! camera/crop selection, the live frame channel, the control channel, and
//! the latest frame handle. All channel events and presentation commands are
//! funneled through queues and handled strictly one at a time, so
//! `SessionState` needs no locks and frame ordering from a single channel is
//! preserved.
//!
//! ```text
//!  FeedHandle ──commands──►┌──────────────────┐
//!                          │   FeedSession    │──watch──► SessionSnapshot
//!  frame channel ──events─►│  (one task, owns │
//!  control channel ─events►│   SessionState)  │
//!                          └──────────────────┘
//! ```
//!
//! Reconnect cycle: any selection or inference change re-resolves the
//! endpoint; if the descriptor actually changed, the old channel is closed
//! (its frame released), a fresh [`ChannelTag`] is allocated, and a new
//! channel opens. Events still in flight from the old channel carry the old
//! tag and are discarded.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::camera::{CameraId, CropKind};
use crate::config::FeedConfig;
use crate::control::{ControlChannel, ControlConnector, ControlEvent, WsControlConnector};
use crate::error::{Error, Result};
use crate::resolver::{self, EndpointDescriptor};
use crate::session::state::{SessionSnapshot, SessionState};
use crate::transport::{
    ChannelEvent, ChannelTag, ConnectionState, FrameChannel, FrameConnector, HandleTracker,
    WsFrameConnector,
};

/// Commands from the presentation layer
#[derive(Debug)]
enum Command {
    /// Camera or crop selection changed
    Select { camera: CameraId, crop: CropKind },
    /// Toggle inference on the selected camera
    ToggleInference { reply: oneshot::Sender<Result<()>> },
    /// Force a frame channel teardown+reopen (recovery from Errored)
    Reconnect,
    /// End the session
    End,
}

/// Handle the presentation layer uses to drive a running session
#[derive(Debug, Clone)]
pub struct FeedHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl FeedHandle {
    /// Change the camera/crop selection
    pub async fn select(&self, camera: CameraId, crop: CropKind) -> Result<()> {
        self.commands
            .send(Command::Select { camera, crop })
            .await
            .map_err(|_| Error::SessionClosed)
    }

    /// Request an inference toggle for the selected camera.
    ///
    /// Fails with [`Error::ControlUnavailable`] if the control channel is
    /// not open; `running` is left unchanged in that case and the condition
    /// should be surfaced to the user. A successful request does not flip
    /// `running` either — that happens when the server pushes the change.
    pub async fn toggle_inference(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::ToggleInference { reply: reply_tx })
            .await
            .map_err(|_| Error::SessionClosed)?;
        reply_rx.await.map_err(|_| Error::SessionClosed)?
    }

    /// Force a frame channel reconnect at the currently resolved endpoint
    pub async fn reconnect(&self) -> Result<()> {
        self.commands
            .send(Command::Reconnect)
            .await
            .map_err(|_| Error::SessionClosed)
    }

    /// End the session, closing both channels and releasing all resources
    pub async fn end(&self) -> Result<()> {
        self.commands
            .send(Command::End)
            .await
            .map_err(|_| Error::SessionClosed)
    }

    /// Subscribe to session snapshots (republished on every state change)
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Current snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }
}

/// The feed session coordinator
///
/// Generic over the connector traits so session logic is testable with stub
/// channels that never touch a socket.
pub struct FeedSession<F: FrameConnector, C: ControlConnector> {
    config: FeedConfig,
    frame_connector: F,
    control_connector: C,

    state: SessionState,
    tracker: Arc<HandleTracker>,

    /// The one live frame channel (at most one open per session)
    frame_channel: Option<FrameChannel>,
    /// Descriptor the current channel was opened against
    current_descriptor: Option<EndpointDescriptor>,
    /// Tag of the current channel instance; events from any other tag are stale
    current_tag: Option<ChannelTag>,
    next_tag: u64,

    control: Option<ControlChannel>,

    commands_rx: mpsc::Receiver<Command>,
    frame_events_tx: mpsc::Sender<ChannelEvent>,
    frame_events_rx: mpsc::Receiver<ChannelEvent>,
    control_events_tx: mpsc::Sender<ControlEvent>,
    control_events_rx: mpsc::Receiver<ControlEvent>,
    snapshots_tx: watch::Sender<SessionSnapshot>,
}

impl FeedSession<WsFrameConnector, WsControlConnector> {
    /// Create a WebSocket-backed session and spawn its coordinator task.
    ///
    /// The session runs until [`FeedHandle::end`] is called or every handle
    /// is dropped.
    pub fn connect(config: FeedConfig) -> FeedHandle {
        let frame = WsFrameConnector::with_timeout(config.connect_timeout);
        let control = WsControlConnector::with_timeout(config.connect_timeout);
        let (session, handle) = FeedSession::new(config, frame, control);
        tokio::spawn(session.run());
        handle
    }
}

impl<F: FrameConnector, C: ControlConnector> FeedSession<F, C> {
    /// Create a session with explicit connectors
    pub fn new(config: FeedConfig, frame_connector: F, control_connector: C) -> (Self, FeedHandle) {
        let state = SessionState::new(Default::default());
        let (commands_tx, commands_rx) = mpsc::channel(config.command_buffer.max(1));
        let (frame_events_tx, frame_events_rx) = mpsc::channel(config.event_buffer.max(1));
        let (control_events_tx, control_events_rx) = mpsc::channel(config.event_buffer.max(1));
        let (snapshots_tx, snapshots_rx) = watch::channel(state.snapshot());

        let session = Self {
            config,
            frame_connector,
            control_connector,
            state,
            tracker: HandleTracker::new(),
            frame_channel: None,
            current_descriptor: None,
            current_tag: None,
            next_tag: 1,
            control: None,
            commands_rx,
            frame_events_tx,
            frame_events_rx,
            control_events_tx,
            control_events_rx,
            snapshots_tx,
        };

        let handle = FeedHandle {
            commands: commands_tx,
            snapshots: snapshots_rx,
        };

        (session, handle)
    }

    /// Handle tracker for this session (leak diagnostics)
    pub fn handle_tracker(&self) -> Arc<HandleTracker> {
        Arc::clone(&self.tracker)
    }

    /// Run the coordinator until the session ends
    pub async fn run(mut self) {
        self.start();

        loop {
            tokio::select! {
                cmd = self.commands_rx.recv() => match cmd {
                    Some(Command::End) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
                Some(event) = self.frame_events_rx.recv() => self.handle_frame_event(event),
                Some(event) = self.control_events_rx.recv() => self.handle_control_event(event),
            }
        }

        self.shutdown();
    }

    /// Open the control channel and the initial frame channel
    fn start(&mut self) {
        tracing::info!(selection = %self.state.selection, "Feed session starting");

        self.state.control_channel = ConnectionState::Connecting;
        self.control = Some(self.control_connector.open(
            self.config.control_url(),
            self.control_events_tx.clone(),
            self.config.control_buffer,
        ));

        self.resync_stream(false);
        self.publish();
    }

    fn publish(&mut self) {
        let _ = self.snapshots_tx.send(self.state.snapshot());
    }

    /// Re-resolve the endpoint and reconnect the frame channel if it changed.
    ///
    /// With `force` the cycle runs even for an identical descriptor (used to
    /// recover from Errored/Closed). Otherwise an unchanged descriptor on a
    /// healthy channel is a no-op, which makes repeated identical selections
    /// free.
    fn resync_stream(&mut self, force: bool) {
        let desired = resolver::resolve(self.state.selection.camera, self.state.inference.running);

        let healthy = self.frame_channel.is_some()
            && matches!(
                self.state.frame_channel,
                ConnectionState::Connecting | ConnectionState::Open
            );
        if !force && healthy && self.current_descriptor == Some(desired) {
            tracing::debug!(endpoint = %desired, "Endpoint unchanged, skipping reconnect");
            return;
        }

        if let Some(mut channel) = self.frame_channel.take() {
            channel.close();
            self.state.stats.reconnects += 1;
        }
        // Frames in flight from the old channel are now stale by tag.
        self.state.clear_frame();

        let tag = ChannelTag(self.next_tag);
        self.next_tag += 1;
        self.current_tag = Some(tag);
        self.current_descriptor = Some(desired);
        self.state.frame_channel = ConnectionState::Connecting;
        self.state.frame_error = None;

        let url = desired.url(&self.config);
        tracing::info!(endpoint = %desired, channel = %tag, "Opening frame channel");
        self.frame_channel = Some(self.frame_connector.open(
            url,
            tag,
            self.frame_events_tx.clone(),
            Arc::clone(&self.tracker),
        ));
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Select { camera, crop } => {
                let selection = crate::camera::CameraSelection::new(camera, crop);
                if selection != self.state.selection {
                    tracing::info!(from = %self.state.selection, to = %selection, "Selection changed");
                    self.state.selection = selection;
                }
                self.resync_stream(false);
                self.publish();
            }
            Command::ToggleInference { reply } => {
                let result = if self.state.control_channel == ConnectionState::Open {
                    match &self.control {
                        Some(control) => control.request_toggle(self.state.selection.camera),
                        None => Err(Error::ControlUnavailable),
                    }
                } else {
                    Err(Error::ControlUnavailable)
                };

                if let Err(ref e) = result {
                    tracing::warn!(
                        camera = %self.state.selection.camera,
                        error = %e,
                        "Inference toggle rejected"
                    );
                }
                // `running` is untouched here; it flips when the server
                // pushes the state change.
                let _ = reply.send(result);
            }
            Command::Reconnect => {
                self.resync_stream(true);
                self.publish();
            }
            // Handled in run()
            Command::End => {}
        }
    }

    fn handle_frame_event(&mut self, event: ChannelEvent) {
        let tag = event.tag();
        if Some(tag) != self.current_tag {
            match event {
                ChannelEvent::Frame { handle, .. } => {
                    tracing::debug!(channel = %tag, seq = handle.seq(), "Ignoring stale frame");
                    self.state.stats.frames_stale += 1;
                    handle.release();
                }
                _ => tracing::debug!(channel = %tag, "Ignoring stale channel event"),
            }
            return;
        }

        match event {
            ChannelEvent::Opened { tag } => {
                tracing::debug!(channel = %tag, "Frame channel reported open");
                self.state.frame_channel = ConnectionState::Open;
                self.state.frame_error = None;
            }
            ChannelEvent::Frame { handle, .. } => {
                self.state.install_frame(handle);
            }
            ChannelEvent::Errored { tag, reason } => {
                // The last frame is retained: a frozen image plus an error
                // state beats a blank screen until the user reconnects.
                tracing::warn!(channel = %tag, error = %reason, "Frame channel errored");
                self.state.frame_channel = ConnectionState::Errored;
                self.state.frame_error = Some(reason);
            }
            ChannelEvent::Closed { tag } => {
                tracing::debug!(channel = %tag, "Frame channel closed by peer");
                self.state.frame_channel = ConnectionState::Closed;
            }
        }

        self.publish();
    }

    fn handle_control_event(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Opened => {
                self.state.control_channel = ConnectionState::Open;
                self.state.control_error = None;
            }
            ControlEvent::StateChanged { running } => {
                if self.state.inference.running != running {
                    tracing::info!(running = running, "Inference state changed");
                    self.state.inference.running = running;
                    // Mode feeds back into endpoint resolution.
                    self.resync_stream(false);
                }
            }
            ControlEvent::Errored { reason } => {
                tracing::warn!(error = %reason, "Control channel errored");
                self.state.control_channel = ConnectionState::Errored;
                self.state.control_error = Some(reason);
                self.force_inference_stopped();
            }
            ControlEvent::Closed => {
                tracing::debug!("Control channel closed");
                self.state.control_channel = ConnectionState::Closed;
                self.force_inference_stopped();
            }
        }

        self.publish();
    }

    /// Losing the control channel means the server no longer infers for us;
    /// fall back to the preview stream.
    fn force_inference_stopped(&mut self) {
        if self.state.inference.running {
            self.state.inference.running = false;
            self.resync_stream(false);
        }
    }

    /// Close both channels, release the frame, reset to initial state
    fn shutdown(&mut self) {
        tracing::info!(
            frames = self.state.stats.frames_received,
            reconnects = self.state.stats.reconnects,
            "Feed session ending"
        );

        if let Some(mut channel) = self.frame_channel.take() {
            channel.close();
        }
        if let Some(mut control) = self.control.take() {
            control.close();
        }
        self.current_tag = None;
        self.current_descriptor = None;
        self.state.reset();
        self.publish();
    }
}
