//! Frame transport: channel lifecycle and frame handles
//!
//! One binary WebSocket connection per camera stream. The channel decodes
//! incoming payloads into owned [`FrameHandle`]s and reports every lifecycle
//! transition as a [`ChannelEvent`] to a single subscriber.
//!
//! ```text
//!   ws://host:8042/preview/oak0
//!          │
//!          ▼
//!   ┌──────────────┐   ChannelEvent::{Opened, Frame, Errored, Closed}
//!   │ reader task  │ ─────────────────────────────────────────────────►
//!   └──────────────┘                 (tagged with ChannelTag)
//!          ▲
//!          │ close()  — idempotent, immediate intent
//!   FrameChannel handle
//! ```

pub mod channel;
pub mod frame;

pub use channel::{
    ChannelEvent, ChannelTag, ConnectionState, FrameChannel, FrameConnector, WsFrameConnector,
};
pub use frame::{FrameHandle, FrameRef, HandleTracker};
