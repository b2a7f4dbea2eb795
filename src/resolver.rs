//! Stream mode resolver
//!
//! Pure mapping from `(camera, inference_running)` to the endpoint the frame
//! channel should connect to. Descriptors derive `PartialEq` so the
//! coordinator can detect "no real change" and skip a reconnect.

use crate::camera::CameraId;
use crate::config::FeedConfig;

/// Which stream variant a camera serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamMode {
    /// Raw camera feed
    Preview,
    /// Post-inference feed with detection overlays
    Annotated,
}

impl StreamMode {
    /// Path segment for this mode
    pub fn path_segment(&self) -> &'static str {
        match self {
            StreamMode::Preview => "preview",
            StreamMode::Annotated => "annotated",
        }
    }
}

/// Resolved address of one camera stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointDescriptor {
    /// Target camera
    pub camera: CameraId,
    /// Stream variant
    pub mode: StreamMode,
}

impl EndpointDescriptor {
    /// Endpoint path, e.g. `/preview/oak0`
    pub fn path(&self) -> String {
        format!("/{}/{}", self.mode.path_segment(), self.camera.slug())
    }

    /// Full WebSocket URL under the given config
    pub fn url(&self, config: &FeedConfig) -> String {
        format!("ws://{}:{}{}", config.host, config.frame_port, self.path())
    }
}

impl std::fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}

/// Resolve the endpoint for a camera given the current inference state.
///
/// Pure and idempotent: identical inputs always yield identical descriptors.
pub fn resolve(camera: CameraId, inference_running: bool) -> EndpointDescriptor {
    let mode = if inference_running {
        StreamMode::Annotated
    } else {
        StreamMode::Preview
    };

    EndpointDescriptor { camera, mode }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_modes() {
        let preview = resolve(CameraId::Oak0, false);
        assert_eq!(preview.mode, StreamMode::Preview);
        assert_eq!(preview.path(), "/preview/oak0");

        let annotated = resolve(CameraId::Oak0, true);
        assert_eq!(annotated.mode, StreamMode::Annotated);
        assert_eq!(annotated.path(), "/annotated/oak0");

        // Same camera, different mode: distinct descriptors
        assert_ne!(preview, annotated);
    }

    #[test]
    fn test_resolve_idempotent() {
        let a = resolve(CameraId::Oak1, true);
        let b = resolve(CameraId::Oak1, true);

        assert_eq!(a, b);
    }

    #[test]
    fn test_url() {
        let config = FeedConfig::default();
        let descriptor = resolve(CameraId::Oak1, false);

        assert_eq!(descriptor.url(&config), "ws://localhost:8042/preview/oak1");
    }
}
