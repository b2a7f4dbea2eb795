//! Frame handles and payload validation
//!
//! Each binary transport message becomes one `FrameHandle`: an owned,
//! displayable reference to a JPEG byte buffer. Handles are a scarce
//! resource; the coordinator holds at most one and releases the old handle
//! when a newer frame supersedes it. Release is by move (or drop), so a
//! double release cannot compile; the `HandleTracker` counts live handles so
//! tests and stats can prove no handle leaks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::transport::channel::ChannelTag;

/// JPEG start-of-image marker
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// Counts frame handle creations and releases for a session
///
/// Shared between the frame channel (producer) and the coordinator (owner).
#[derive(Debug, Default)]
pub struct HandleTracker {
    created: AtomicU64,
    released: AtomicU64,
}

impl HandleTracker {
    /// Create a fresh tracker
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Total handles ever created
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Total handles released
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    /// Handles currently alive
    pub fn live(&self) -> u64 {
        self.created() - self.released()
    }
}

/// An owned, displayable reference to one decoded frame
///
/// Not `Clone`: exactly one owner at a time. Presentation layers get a cheap
/// [`FrameRef`] view instead.
#[derive(Debug)]
pub struct FrameHandle {
    /// Tag of the channel instance that produced this frame
    tag: ChannelTag,
    /// Arrival sequence number within its channel (starts at 1)
    seq: u64,
    /// JPEG payload (refcounted, zero-copy)
    data: Bytes,
    tracker: Arc<HandleTracker>,
}

impl FrameHandle {
    /// Validate a binary payload and wrap it as a frame handle.
    ///
    /// Only sniffs the JPEG SOI marker; the image content itself is never
    /// decoded at this layer.
    pub fn from_jpeg(
        tag: ChannelTag,
        seq: u64,
        data: Bytes,
        tracker: Arc<HandleTracker>,
    ) -> Result<Self> {
        if data.len() < JPEG_SOI.len() {
            return Err(Error::TransportDecode(format!(
                "payload too short: {} bytes",
                data.len()
            )));
        }
        if data[..2] != JPEG_SOI {
            return Err(Error::TransportDecode(format!(
                "missing JPEG SOI marker (got {:02X} {:02X})",
                data[0], data[1]
            )));
        }

        tracker.created.fetch_add(1, Ordering::Relaxed);
        Ok(Self {
            tag,
            seq,
            data,
            tracker,
        })
    }

    /// Tag of the channel instance that produced this frame
    pub fn tag(&self) -> ChannelTag {
        self.tag
    }

    /// Arrival sequence number within the producing channel
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty (never true for a validated handle)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the JPEG bytes
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// Cheap read-only view for snapshots
    pub fn as_ref_view(&self) -> FrameRef {
        FrameRef {
            tag: self.tag,
            seq: self.seq,
            data: self.data.clone(),
        }
    }

    /// Explicitly release the handle.
    ///
    /// Equivalent to dropping it; exists so call sites that retire a frame
    /// read as resource management rather than as an accidental drop.
    pub fn release(self) {}
}

impl Drop for FrameHandle {
    fn drop(&mut self) {
        self.tracker.released.fetch_add(1, Ordering::Relaxed);
    }
}

/// Read-only view of a frame for the presentation layer
///
/// Cheap to clone: the payload is refcounted. A ref stays readable after the
/// owning handle is released, but holders must not assume it reflects the
/// current frame once a newer one arrives.
#[derive(Debug, Clone)]
pub struct FrameRef {
    tag: ChannelTag,
    seq: u64,
    data: Bytes,
}

impl FrameRef {
    /// Tag of the channel instance that produced this frame
    pub fn tag(&self) -> ChannelTag {
        self.tag
    }

    /// Arrival sequence number
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// The JPEG bytes
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg_payload() -> Bytes {
        Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10])
    }

    #[test]
    fn test_valid_jpeg_accepted() {
        let tracker = HandleTracker::new();
        let handle =
            FrameHandle::from_jpeg(ChannelTag(1), 1, jpeg_payload(), Arc::clone(&tracker)).unwrap();

        assert_eq!(handle.tag(), ChannelTag(1));
        assert_eq!(handle.seq(), 1);
        assert_eq!(handle.len(), 6);
        assert_eq!(tracker.live(), 1);
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let tracker = HandleTracker::new();

        let empty = FrameHandle::from_jpeg(ChannelTag(1), 1, Bytes::new(), Arc::clone(&tracker));
        assert!(matches!(empty, Err(Error::TransportDecode(_))));

        let not_jpeg = FrameHandle::from_jpeg(
            ChannelTag(1),
            1,
            Bytes::from_static(b"hello"),
            Arc::clone(&tracker),
        );
        assert!(matches!(not_jpeg, Err(Error::TransportDecode(_))));

        // Rejected payloads never count as created
        assert_eq!(tracker.created(), 0);
    }

    #[test]
    fn test_release_counted_once() {
        let tracker = HandleTracker::new();
        let handle =
            FrameHandle::from_jpeg(ChannelTag(1), 1, jpeg_payload(), Arc::clone(&tracker)).unwrap();

        let view = handle.as_ref_view();
        handle.release();

        assert_eq!(tracker.created(), 1);
        assert_eq!(tracker.released(), 1);
        assert_eq!(tracker.live(), 0);

        // The view stays readable after release
        assert_eq!(view.seq(), 1);
        assert_eq!(&view.bytes()[..2], &[0xFF, 0xD8]);
    }
}
