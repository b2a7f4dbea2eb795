//! Feed session configuration

use std::time::Duration;

/// Configuration for a feed session
///
/// Defaults match the field deployment: frame and control endpoints on the
/// same host, port 8042.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Host (or IP) of the streaming backend
    pub host: String,

    /// Port serving frame streams
    pub frame_port: u16,

    /// Port serving the inference control endpoint
    pub control_port: u16,

    /// Path of the inference control endpoint
    pub control_path: String,

    /// Capacity of the session event queue (channel events + frames)
    pub event_buffer: usize,

    /// Capacity of the session command queue
    pub command_buffer: usize,

    /// Capacity of the control channel's outbound command queue
    pub control_buffer: usize,

    /// Optional connect timeout for channels (None = rely on the transport)
    pub connect_timeout: Option<Duration>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            frame_port: 8042,
            control_port: 8042,
            control_path: "/inference".to_string(),
            event_buffer: 64,
            command_buffer: 16,
            control_buffer: 16,
            connect_timeout: None,
        }
    }
}

impl FeedConfig {
    /// Create a config pointing at a specific host
    pub fn with_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Set the host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the frame stream port
    pub fn frame_port(mut self, port: u16) -> Self {
        self.frame_port = port;
        self
    }

    /// Set the control endpoint port
    pub fn control_port(mut self, port: u16) -> Self {
        self.control_port = port;
        self
    }

    /// Set the control endpoint path
    pub fn control_path(mut self, path: impl Into<String>) -> Self {
        self.control_path = path.into();
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// URL of the inference control endpoint
    pub fn control_url(&self) -> String {
        format!(
            "ws://{}:{}{}",
            self.host, self.control_port, self.control_path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FeedConfig::default();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.frame_port, 8042);
        assert_eq!(config.control_port, 8042);
        assert_eq!(config.control_path, "/inference");
        assert!(config.connect_timeout.is_none());
    }

    #[test]
    fn test_control_url() {
        let config = FeedConfig::default();

        assert_eq!(config.control_url(), "ws://localhost:8042/inference");
    }

    #[test]
    fn test_builder_chaining() {
        let config = FeedConfig::with_host("amiga.local")
            .frame_port(9000)
            .control_port(9001)
            .control_path("/control")
            .connect_timeout(Duration::from_secs(5));

        assert_eq!(config.host, "amiga.local");
        assert_eq!(config.frame_port, 9000);
        assert_eq!(config.control_port, 9001);
        assert_eq!(config.control_url(), "ws://amiga.local:9001/control");
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(5)));
    }
}
