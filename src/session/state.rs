//! Session state aggregate
//!
//! Single source of truth for "current camera", "is inferring", "latest
//! frame", and both channel states. Owned exclusively by the coordinator
//! task; the presentation layer only ever sees cloned snapshots.

use crate::camera::CameraSelection;
use crate::transport::{ConnectionState, FrameHandle, FrameRef};

/// Server-side inference state, tracked independently of the control
/// channel's connection state (the channel can be Open while nothing runs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InferenceState {
    /// Whether inference is running on the selected camera
    pub running: bool,
}

/// Per-session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames applied to `latest_frame`
    pub frames_received: u64,
    /// Frames discarded by the stale-channel guard
    pub frames_stale: u64,
    /// Frame channel teardown+reopen cycles after the initial open
    pub reconnects: u64,
    /// Total frame payload bytes applied
    pub bytes_received: u64,
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Active camera/crop selection
    pub selection: CameraSelection,

    /// Inference state
    pub inference: InferenceState,

    /// Frame transport channel state
    pub frame_channel: ConnectionState,

    /// Reason for the last frame channel error, if Errored
    pub frame_error: Option<String>,

    /// Control channel state
    pub control_channel: ConnectionState,

    /// Reason for the last control channel error, if Errored
    pub control_error: Option<String>,

    /// Most recently displayed frame; None until the first frame of the
    /// current channel arrives
    pub latest_frame: Option<FrameHandle>,

    /// Counters
    pub stats: SessionStats,
}

impl SessionState {
    /// Create the initial state for a selection
    pub fn new(selection: CameraSelection) -> Self {
        Self {
            selection,
            inference: InferenceState::default(),
            frame_channel: ConnectionState::Idle,
            frame_error: None,
            control_channel: ConnectionState::Idle,
            control_error: None,
            latest_frame: None,
            stats: SessionStats::default(),
        }
    }

    /// Install a new frame, releasing the superseded handle.
    ///
    /// The old handle is released exactly once, synchronously, at the moment
    /// of replacement.
    pub fn install_frame(&mut self, handle: FrameHandle) {
        self.stats.frames_received += 1;
        self.stats.bytes_received += handle.len() as u64;

        if let Some(prev) = self.latest_frame.replace(handle) {
            prev.release();
        }
    }

    /// Drop the current frame, if any
    pub fn clear_frame(&mut self) {
        if let Some(prev) = self.latest_frame.take() {
            prev.release();
        }
    }

    /// Reset everything except the selection to initial values
    pub fn reset(&mut self) {
        self.clear_frame();
        self.inference = InferenceState::default();
        self.frame_channel = ConnectionState::Idle;
        self.frame_error = None;
        self.control_channel = ConnectionState::Idle;
        self.control_error = None;
        self.stats = SessionStats::default();
    }

    /// Cloneable snapshot for the presentation layer
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            selection: self.selection,
            inference_running: self.inference.running,
            frame_channel: self.frame_channel,
            frame_error: self.frame_error.clone(),
            control_channel: self.control_channel,
            control_error: self.control_error.clone(),
            latest_frame: self.latest_frame.as_ref().map(FrameHandle::as_ref_view),
            stats: self.stats,
        }
    }
}

/// Read-only view of the session published to the presentation layer
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Active camera/crop selection
    pub selection: CameraSelection,
    /// Whether inference is running
    pub inference_running: bool,
    /// Frame transport channel state
    pub frame_channel: ConnectionState,
    /// Frame channel error reason, if Errored
    pub frame_error: Option<String>,
    /// Control channel state
    pub control_channel: ConnectionState,
    /// Control channel error reason, if Errored
    pub control_error: Option<String>,
    /// Latest frame, if one has arrived on the current channel
    pub latest_frame: Option<FrameRef>,
    /// Counters
    pub stats: SessionStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ChannelTag, HandleTracker};
    use bytes::Bytes;
    use std::sync::Arc;

    fn frame(tag: u64, seq: u64, tracker: &Arc<HandleTracker>) -> FrameHandle {
        FrameHandle::from_jpeg(
            ChannelTag(tag),
            seq,
            Bytes::from_static(&[0xFF, 0xD8, 0x00, 0x01]),
            Arc::clone(tracker),
        )
        .unwrap()
    }

    #[test]
    fn test_install_releases_previous() {
        let tracker = HandleTracker::new();
        let mut state = SessionState::new(CameraSelection::default());

        state.install_frame(frame(1, 1, &tracker));
        state.install_frame(frame(1, 2, &tracker));

        assert_eq!(tracker.created(), 2);
        assert_eq!(tracker.released(), 1);
        assert_eq!(state.latest_frame.as_ref().unwrap().seq(), 2);
        assert_eq!(state.stats.frames_received, 2);
        assert_eq!(state.stats.bytes_received, 8);
    }

    #[test]
    fn test_reset_clears_everything() {
        let tracker = HandleTracker::new();
        let mut state = SessionState::new(CameraSelection::default());

        state.install_frame(frame(1, 1, &tracker));
        state.inference.running = true;
        state.frame_channel = ConnectionState::Open;

        state.reset();

        assert!(state.latest_frame.is_none());
        assert!(!state.inference.running);
        assert_eq!(state.frame_channel, ConnectionState::Idle);
        assert_eq!(state.stats, SessionStats::default());
        assert_eq!(tracker.live(), 0);
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let tracker = HandleTracker::new();
        let mut state = SessionState::new(CameraSelection::default());
        state.install_frame(frame(3, 1, &tracker));
        state.frame_channel = ConnectionState::Open;

        let snapshot = state.snapshot();

        assert_eq!(snapshot.frame_channel, ConnectionState::Open);
        let frame_ref = snapshot.latest_frame.unwrap();
        assert_eq!(frame_ref.tag(), ChannelTag(3));
        assert_eq!(frame_ref.seq(), 1);
    }
}
