//! Live camera feed session manager
//!
//! Lets an operator pick a camera, view its live video, and toggle an
//! inference mode that switches the stream from raw preview to annotated
//! output. The session coordinator owns the streaming connection,
//! reconstructs displayable frames from binary WebSocket payloads, and
//! drives a separate control channel that starts/stops inference
//! server-side.
//!
//! # Architecture
//!
//! ```text
//!                       ┌────────────────────────┐
//!   FeedHandle ───────► │     FeedSession        │ ──watch──► SessionSnapshot
//!   select / toggle     │  (coordinator task,    │            (presentation
//!   reconnect / end     │   owns SessionState)   │             layer)
//!                       └───┬────────────────┬───┘
//!                 resolve() │                │
//!                           ▼                ▼
//!                  ┌────────────────┐  ┌───────────────┐
//!                  │ FrameChannel   │  │ ControlChannel│
//!                  │ /preview/oak0  │  │ /inference    │
//!                  │ /annotated/…   │  │ (text cmds)   │
//!                  └────────────────┘  └───────────────┘
//!                     binary JPEG          state pushes
//! ```
//!
//! Selection or inference changes re-resolve the endpoint; a changed
//! descriptor tears the frame channel down and opens a new one under a fresh
//! tag, so frames racing past the teardown are recognized as stale and
//! discarded. Frame handles are a scarce resource: the coordinator holds at
//! most one and releases the superseded handle the moment a newer frame is
//! installed.
//!
//! # Example
//! ```no_run
//! use agrovision_feed::{CameraId, CropKind, FeedConfig, FeedSession};
//!
//! # async fn example() -> agrovision_feed::Result<()> {
//! let handle = FeedSession::connect(FeedConfig::with_host("amiga.local"));
//! let mut snapshots = handle.watch();
//!
//! handle.select(CameraId::Oak1, CropKind::Tomato).await?;
//!
//! while snapshots.changed().await.is_ok() {
//!     let snapshot = snapshots.borrow().clone();
//!     if let Some(frame) = snapshot.latest_frame {
//!         // hand frame.bytes() to the renderer
//!         let _ = frame.bytes();
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod camera;
pub mod config;
pub mod control;
pub mod error;
pub mod resolver;
pub mod session;
pub mod transport;

pub use camera::{CameraId, CameraSelection, CropKind};
pub use config::FeedConfig;
pub use control::{ControlChannel, ControlConnector, ControlEvent, WsControlConnector};
pub use error::{Error, Result};
pub use resolver::{resolve, EndpointDescriptor, StreamMode};
pub use session::{FeedHandle, FeedSession, SessionSnapshot, SessionStats};
pub use transport::{
    ChannelEvent, ChannelTag, ConnectionState, FrameChannel, FrameConnector, FrameHandle, FrameRef,
    HandleTracker, WsFrameConnector,
};
