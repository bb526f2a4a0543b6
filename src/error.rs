//! Session error taxonomy.
//!
//! `SessionError` covers the failures a connection reports back to its client.
//! `SessionEnd` records why a stream task stopped producing frames; exhaustion and
//! explicit stops are normal terminal conditions, not errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested frame source could not be opened. The session stays idle.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    /// A frame or event could not be delivered. Fatal to the current session only.
    #[error("transport disconnected: {0}")]
    TransportDisconnected(String),
    /// A control message could not be parsed or validated. No session state changes.
    #[error("malformed control message: {0}")]
    MalformedControlMessage(String),
    /// The detector could not be created or failed on a frame.
    #[error("detector failure: {0}")]
    DetectorFailure(String),
}

impl SessionError {
    /// Stable identifier sent to clients in the `kind` field of error events.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::SourceUnavailable(_) => "source_unavailable",
            SessionError::TransportDisconnected(_) => "transport_disconnected",
            SessionError::MalformedControlMessage(_) => "malformed_control_message",
            SessionError::DetectorFailure(_) => "detector_failure",
        }
    }
}

/// Why a stream task terminated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// Cancelled by Stop, a new Start, or connection teardown.
    Stopped,
    /// The frame source has no more frames.
    Exhausted,
    /// The frame source failed mid-stream.
    SourceFailed(String),
    /// The detector raised on a frame.
    DetectorFailed(String),
    /// The transport rejected a frame or event.
    TransportClosed(String),
    /// The stream thread panicked; cleanup still ran through unwinding.
    Panicked,
}

impl SessionEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEnd::Stopped => "stopped",
            SessionEnd::Exhausted => "source_exhausted",
            SessionEnd::SourceFailed(_) => "source_failed",
            SessionEnd::DetectorFailed(_) => "detector_failure",
            SessionEnd::TransportClosed(_) => "transport_disconnected",
            SessionEnd::Panicked => "panicked",
        }
    }

    /// True for terminal conditions that are not failures.
    pub fn is_normal(&self) -> bool {
        matches!(self, SessionEnd::Stopped | SessionEnd::Exhausted)
    }
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEnd::SourceFailed(msg)
            | SessionEnd::DetectorFailed(msg)
            | SessionEnd::TransportClosed(msg) => write!(f, "{}: {}", self.as_str(), msg),
            _ => f.write_str(self.as_str()),
        }
    }
}
