//! The sans-I/O session state machine: given the current state and an
//! inbound message, produce the next state plus zero or more actions for
//! the driver to carry out. No I/O, no async, fully unit-testable.

use bep_model::file_info::FileInfoError;
use bep_proto::{ClusterConfig, Close, DownloadProgress, Index, IndexUpdate, Message, Request, Response};

use crate::error::ConnectionError;

/// Where a session is in the Hello → ClusterConfig → steady-state
/// lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Hello has completed; only ClusterConfig is a legal inbound message.
    Initial,
    /// ClusterConfig has been exchanged in both directions; steady state.
    Ready,
    /// The session has ended; no further messages are processed.
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initial => "initial",
            Self::Ready => "ready",
            Self::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// Something the driver must do in response to processing a message.
#[derive(Debug)]
pub enum SessionAction {
    /// Deliver a ClusterConfig to the embedder's Model.
    DeliverClusterConfig(ClusterConfig),
    /// Deliver a validated Index to the Model.
    DeliverIndex(Index),
    /// Deliver a validated IndexUpdate to the Model.
    DeliverIndexUpdate(IndexUpdate),
    /// Spawn a request-handler task for an inbound Request.
    SpawnRequestHandler(Request),
    /// Resolve a pending caller's one-shot channel with this Response.
    ResolveResponse(Response),
    /// Deliver a DownloadProgress update to the Model.
    DeliverDownloadProgress(DownloadProgress),
    /// Note that a Ping (or any traffic) was received, for timeout tracking.
    NoteActivity,
    /// Close the session with the given reason.
    Close {
        /// Whether the peer requested the close (as opposed to a local
        /// protocol violation).
        peer_initiated: bool,
        /// Human-readable reason.
        reason: String,
    },
}

/// The sans-I/O session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    state: SessionState,
    local_cluster_config_sent: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh session, immediately after the Hello exchange completed.
    #[must_use]
    pub fn new() -> Self {
        Self { state: SessionState::Initial, local_cluster_config_sent: false }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Record that the local side has sent its own ClusterConfig. Must
    /// happen before any other outbound message; callers enforce the
    /// ordering by checking this before calling `send_*`.
    pub fn mark_cluster_config_sent(&mut self) {
        self.local_cluster_config_sent = true;
    }

    /// Whether an outbound message of any kind other than ClusterConfig is
    /// currently legal.
    #[must_use]
    pub fn can_send_steady_state_message(&self) -> bool {
        self.local_cluster_config_sent && self.state != SessionState::Closed
    }

    /// Process one inbound message, returning the actions the driver should
    /// take. A message illegal in the current state, or a structurally
    /// invalid Index/IndexUpdate, transitions to `Closed` and returns a
    /// single `Close` action instead of delivering anything.
    pub fn handle_message(&mut self, message: Message) -> Result<Vec<SessionAction>, ConnectionError> {
        if self.state == SessionState::Closed {
            return Ok(Vec::new());
        }

        match (self.state, message) {
            (SessionState::Initial, Message::ClusterConfig(cc)) => {
                self.state = SessionState::Ready;
                Ok(vec![SessionAction::NoteActivity, SessionAction::DeliverClusterConfig(cc)])
            },
            (SessionState::Initial, other) => {
                let kind = message_kind(&other);
                self.state = SessionState::Closed;
                Err(ConnectionError::OutOfState { state: SessionState::Initial, message_kind: kind })
            },

            (SessionState::Ready, Message::Index(index)) => {
                self.validate_files(&index.files)?;
                Ok(vec![SessionAction::NoteActivity, SessionAction::DeliverIndex(index)])
            },
            (SessionState::Ready, Message::IndexUpdate(update)) => {
                self.validate_files(&update.files)?;
                Ok(vec![SessionAction::NoteActivity, SessionAction::DeliverIndexUpdate(update)])
            },
            (SessionState::Ready, Message::Request(req)) => {
                Ok(vec![SessionAction::NoteActivity, SessionAction::SpawnRequestHandler(req)])
            },
            (SessionState::Ready, Message::Response(resp)) => {
                Ok(vec![SessionAction::NoteActivity, SessionAction::ResolveResponse(resp)])
            },
            (SessionState::Ready, Message::DownloadProgress(progress)) => {
                Ok(vec![SessionAction::NoteActivity, SessionAction::DeliverDownloadProgress(progress)])
            },
            (SessionState::Ready, Message::Ping(_)) => Ok(vec![SessionAction::NoteActivity]),
            (SessionState::Ready, Message::Close(Close { reason })) => {
                self.state = SessionState::Closed;
                Ok(vec![SessionAction::Close { peer_initiated: true, reason }])
            },
            (SessionState::Ready, Message::ClusterConfig(_)) => {
                self.state = SessionState::Closed;
                Err(ConnectionError::OutOfState {
                    state: SessionState::Ready,
                    message_kind: "clusterconfig".to_string(),
                })
            },

            (SessionState::Closed, _) => Ok(Vec::new()),
        }
    }

    fn validate_files(&mut self, files: &[bep_model::FileInfo]) -> Result<(), ConnectionError> {
        for file in files {
            if let Err(err) = file.check_invariants() {
                self.state = SessionState::Closed;
                return Err(file_info_error(err));
            }
        }
        Ok(())
    }
}

fn file_info_error(err: FileInfoError) -> ConnectionError {
    ConnectionError::from(err)
}

/// Lowercase, single-word name of a message's kind, for embedding in
/// [`ConnectionError::OutOfState`]'s lowercase-register error text.
fn message_kind(message: &Message) -> String {
    match message {
        Message::ClusterConfig(_) => "clusterconfig",
        Message::Index(_) => "index",
        Message::IndexUpdate(_) => "indexupdate",
        Message::Request(_) => "request",
        Message::Response(_) => "response",
        Message::Ping(_) => "ping",
        Message::Close(_) => "close",
        Message::DownloadProgress(_) => "downloadprogress",
    }
    .to_string()
}
