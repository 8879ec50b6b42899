//! Connection-layer error type: everything that can end a session or fail
//! an individual request.

use thiserror::Error;

use crate::session::SessionState;

/// Failures that can end a [`crate::connection::Connection`] or be
/// reported to a caller awaiting a Request's response.
#[derive(Debug, Error, Clone)]
pub enum ConnectionError {
    /// A message arrived that is illegal in the current state.
    #[error("protocol error: {message_kind} message in state {state}")]
    OutOfState {
        /// The session state the message arrived in.
        state: SessionState,
        /// A short description of the offending message kind.
        message_kind: String,
    },

    /// An incoming `FileInfo` violated one of the §3 wire invariants.
    #[error("invalid file info: {0}")]
    InvalidFileInfo(String),

    /// The Hello exchange failed to negotiate a compatible protocol
    /// version.
    #[error("version mismatch: {0}")]
    VersionMismatch(String),

    /// No read or write activity within `ReceiveTimeout`.
    #[error("receive timeout after {elapsed_s}s")]
    Timeout {
        /// Seconds elapsed since the last successful read.
        elapsed_s: u64,
    },

    /// The connection was closed, gracefully or otherwise.
    #[error("connection closed: {reason}")]
    Closed {
        /// Human-readable reason the connection closed.
        reason: String,
    },

    /// A caller's pending Request was cancelled before a Response arrived.
    #[error("request cancelled")]
    Cancelled,

    /// A framing or transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ConnectionError {
    /// Whether retrying the operation that produced this error might
    /// succeed without intervention (as opposed to a fatal protocol
    /// violation).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Cancelled)
    }
}

impl From<bep_proto::ProtocolError> for ConnectionError {
    fn from(err: bep_proto::ProtocolError) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<bep_model::file_info::FileInfoError> for ConnectionError {
    fn from(err: bep_model::file_info::FileInfoError) -> Self {
        Self::InvalidFileInfo(err.to_string())
    }
}
