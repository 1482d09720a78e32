//! The `transport` module is the boundary between the session manager and the mailbox that
//! carries protocol messages. It defines the [Transport] trait and the subject line format
//! `protocol::role::sender::txid::message_type` every protocol message is addressed with.

use crate::types::MessageFamily;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Protocol tag of match-family messages.
pub const MATCH_PROTOCOL: &str = "Q21G.v1";

/// Protocol tag of league-family messages.
pub const LEAGUE_PROTOCOL: &str = "league.v2";

/// Role tag this participant signs its subjects with.
pub const PLAYER_ROLE_TAG: &str = "PLAYER";

const SUBJECT_SEPARATOR: &str = "::";

/// A raw message as fetched from the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEnvelope {
    /// Transport-specific handle used to acknowledge the message.
    pub id: String,
    /// The subject line.
    pub subject: String,
    /// The attached JSON body, possibly wrapped as `{"payload": {...}}`.
    pub body: Value,
}

/// A message ready to be handed to the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    pub recipient: String,
    pub subject: String,
    pub payload: Value,
}

/// The protocol fields of an [InboundEnvelope].
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
    /// The message type, normalized with [normalize_message_type].
    pub message_type: String,
    /// The message type as it appeared in the subject.
    pub raw_message_type: String,
    pub protocol: String,
    pub sender: String,
    /// The unwrapped payload.
    pub payload: Value,
    /// The game the message refers to, empty for season traffic.
    pub game_id: String,
    pub deadline: Option<String>,
}

/// The [Transport] trait is implemented by every mailbox the scan driver can poll.
#[async_trait]
pub trait Transport: Send {
    /// Fetches up to `max` unacknowledged messages, oldest first.
    async fn fetch(&mut self, max: usize) -> Result<Vec<InboundEnvelope>>;

    /// Marks a message as processed so it is not fetched again.
    async fn acknowledge(&mut self, id: &str) -> Result<()>;

    /// Sends a message.
    async fn send(&mut self, envelope: OutboundEnvelope) -> Result<()>;
}

/// Normalizes a message type. Underscores are stripped from match-family types only, so
/// `Q21_WARMUP_CALL` becomes `Q21WARMUPCALL` while league types are left as they are.
pub fn normalize_message_type(message_type: &str) -> String {
    let upper = message_type.to_ascii_uppercase();
    if upper.starts_with("Q21") {
        upper.replace('_', "")
    } else {
        message_type.to_string()
    }
}

/// Parses the subject and body of an inbound message.
///
/// ### Returns
/// - `Some(ParsedMessage)`: The subject has at least five `::` separated parts.
/// - `None`: The subject is not a protocol subject.
pub fn parse_message(subject: &str, body: &Value) -> Option<ParsedMessage> {
    let parts: Vec<&str> = subject.split(SUBJECT_SEPARATOR).collect();
    let [protocol, _role, sender, _txid, raw_message_type, ..] = parts.as_slice() else {
        return None;
    };

    let payload = match body.get("payload") {
        Some(inner) if inner.is_object() => inner.clone(),
        _ if body.is_object() => body.clone(),
        _ => Value::Object(Default::default()),
    };
    let lookup = |key: &str| {
        [&payload, body]
            .iter()
            .filter_map(|value| value.get(key).and_then(Value::as_str))
            .find(|value| !value.is_empty())
            .map(str::to_string)
    };
    let game_id = lookup("game_id")
        .or_else(|| lookup("match_id"))
        .unwrap_or_default();
    let deadline = lookup("deadline");

    Some(ParsedMessage {
        message_type: normalize_message_type(raw_message_type),
        raw_message_type: raw_message_type.to_string(),
        protocol: protocol.to_string(),
        sender: sender.to_string(),
        payload,
        game_id,
        deadline,
    })
}

/// The protocol tag of an outbound message type.
pub fn protocol_for(message_type: &str) -> &'static str {
    match MessageFamily::classify(message_type) {
        Some(MessageFamily::Match) => MATCH_PROTOCOL,
        _ => LEAGUE_PROTOCOL,
    }
}

/// Builds the subject of an outbound message with a fresh transaction id.
pub fn build_subject(player_email: &str, message_type: &str) -> String {
    [
        protocol_for(message_type),
        PLAYER_ROLE_TAG,
        player_email,
        &Uuid::new_v4().to_string(),
        message_type,
    ]
    .join(SUBJECT_SEPARATOR)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn short_subjects_are_not_protocol_messages() {
        assert!(parse_message("Hello there", &json!({})).is_none());
        assert!(parse_message("Q21G.v1::REFEREE::ref@test.com::tx1", &json!({})).is_none());
    }

    #[test]
    fn parse_unwraps_payload_and_normalizes_type() {
        let parsed = parse_message(
            "Q21G.v1::REFEREE::ref@test.com::tx1::Q21_WARMUP_CALL",
            &json!({"payload": {"match_id": "0101001", "warmup_question": "2+2"}}),
        )
        .unwrap();

        assert_eq!(parsed.message_type, "Q21WARMUPCALL");
        assert_eq!(parsed.raw_message_type, "Q21_WARMUP_CALL");
        assert_eq!(parsed.protocol, "Q21G.v1");
        assert_eq!(parsed.sender, "ref@test.com");
        assert_eq!(parsed.game_id, "0101001");
        assert_eq!(parsed.payload["warmup_question"], "2+2");
        assert_eq!(parsed.deadline, None);
    }

    #[test]
    fn parse_reads_bare_bodies_and_outer_deadline() {
        let parsed = parse_message(
            "league.v2::LEAGUEMANAGER::lm@test.com::tx2::BROADCAST_NEW_LEAGUE_ROUND",
            &json!({"round_number": 2, "deadline": "2026-02-19T10:30:00Z"}),
        )
        .unwrap();
        assert_eq!(parsed.message_type, "BROADCAST_NEW_LEAGUE_ROUND");
        assert_eq!(parsed.payload["round_number"], 2);
        assert_eq!(parsed.deadline.as_deref(), Some("2026-02-19T10:30:00Z"));
        assert_eq!(parsed.game_id, "");
    }

    #[test]
    fn league_types_keep_their_underscores() {
        assert_eq!(
            normalize_message_type("SEASON_REGISTRATION_RESPONSE"),
            "SEASON_REGISTRATION_RESPONSE"
        );
        assert_eq!(normalize_message_type("q21_score_feedback"), "Q21SCOREFEEDBACK");
    }

    #[test]
    fn outbound_subjects_pick_the_protocol_by_family() {
        let subject = build_subject("me@test.com", "Q21WARMUPRESPONSE");
        let parts: Vec<&str> = subject.split("::").collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], "Q21G.v1");
        assert_eq!(parts[1], "PLAYER");
        assert_eq!(parts[2], "me@test.com");
        assert!(Uuid::parse_str(parts[3]).is_ok());
        assert_eq!(parts[4], "Q21WARMUPRESPONSE");

        assert!(build_subject("me@test.com", "MATCH_RESULT_REPORT").starts_with("league.v2::"));
    }
}
