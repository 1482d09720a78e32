//! The `error` module contains the [ProtocolError] type returned by the session manager.

use crate::types::{GamePhase, MessageFamily};

/// Errors raised while handling a protocol message.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The message was classified into a family but matches no known type of that family.
    #[error("unknown {family} message type: {message_type}")]
    UnknownMessageType {
        /// The family the message was classified into.
        family: MessageFamily,
        /// The raw message type.
        message_type: String,
    },
    /// A required payload field is absent or empty.
    #[error("{message_type} payload is missing required field `{field}`")]
    MissingField {
        /// The message whose payload was inspected.
        message_type: &'static str,
        /// The missing field.
        field: &'static str,
    },
    /// The payload could not be decoded into the expected shape.
    #[error("malformed {message_type} payload: {reason}")]
    MalformedPayload {
        /// The message whose payload was decoded.
        message_type: &'static str,
        /// Why decoding failed.
        reason: String,
    },
    /// A session identifier was empty.
    #[error("session identifier `{field}` must not be empty")]
    InvalidIdentifier {
        /// The offending identifier.
        field: &'static str,
    },
    /// A message was handed to a session that was never initialized.
    #[error("session has not been initialized")]
    SessionNotInitialized,
    /// A message was handed to a session that already reached a terminal phase.
    #[error("session {match_id} is closed ({phase})")]
    SessionClosed {
        /// The match the session belongs to.
        match_id: String,
        /// The terminal phase of the session.
        phase: GamePhase,
    },
    /// A strategy capability failed. The error is passed through untouched.
    #[error(transparent)]
    Strategy(anyhow::Error),
}

impl ProtocolError {
    /// Builds a [ProtocolError::MalformedPayload] from a [serde_json::Error].
    pub(crate) fn malformed(message_type: &'static str, err: serde_json::Error) -> Self {
        Self::MalformedPayload {
            message_type,
            reason: err.to_string(),
        }
    }
}

/// Shorthand for results of the session manager.
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;
