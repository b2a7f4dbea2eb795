//! Feed session: state aggregate and coordinator
//!
//! The coordinator orchestrates the frame transport and control channels
//! around a single [`SessionState`], republishing snapshots to the
//! presentation layer on every change.

pub mod coordinator;
pub mod state;

pub use coordinator::{FeedHandle, FeedSession};
pub use state::{InferenceState, SessionSnapshot, SessionState, SessionStats};
