//! Error types for the feed session manager
//!
//! Transport-level failures are absorbed at the channel boundary and surface
//! as connection-state transitions; only conditions the caller must act on
//! (or surface to the user) travel as `Error` values.

/// Error type for feed session operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Transport connection could not be established
    TransportConnect(String),
    /// Malformed frame payload (dropped, not fatal)
    TransportDecode(String),
    /// Inference toggle requested while the control channel is not open
    ControlUnavailable,
    /// The session coordinator has shut down; the handle is stale
    SessionClosed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::TransportConnect(reason) => write!(f, "Transport connect failed: {}", reason),
            Error::TransportDecode(reason) => write!(f, "Malformed frame payload: {}", reason),
            Error::ControlUnavailable => write!(f, "Control channel unavailable"),
            Error::SessionClosed => write!(f, "Feed session has shut down"),
        }
    }
}

impl std::error::Error for Error {}

/// Result alias for feed session operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::TransportConnect("connection refused".into());
        assert_eq!(
            err.to_string(),
            "Transport connect failed: connection refused"
        );

        assert_eq!(
            Error::ControlUnavailable.to_string(),
            "Control channel unavailable"
        );
    }
}
