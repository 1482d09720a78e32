//! The `messages` module defines the closed sets of inbound and outbound message types and the
//! payload shapes the session manager reads and writes.

use crate::{
    error::{ProtocolError, Result},
    types::MessageFamily,
};
use q21_player_strategy::Answer;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};

/// Inbound match-family messages sent by the referee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchMessage {
    WarmupCall,
    RoundStart,
    AnswersBatch,
    ScoreFeedback,
}

impl MatchMessage {
    /// The canonical wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MatchMessage::WarmupCall => "Q21WARMUPCALL",
            MatchMessage::RoundStart => "Q21ROUNDSTART",
            MatchMessage::AnswersBatch => "Q21ANSWERSBATCH",
            MatchMessage::ScoreFeedback => "Q21SCOREFEEDBACK",
        }
    }
}

impl FromStr for MatchMessage {
    type Err = ProtocolError;

    /// Parses a match message type. Both `Q21_WARMUP_CALL` and `Q21WARMUPCALL` spellings are
    /// accepted.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match normalized.as_str() {
            "Q21WARMUPCALL" => Ok(MatchMessage::WarmupCall),
            "Q21ROUNDSTART" => Ok(MatchMessage::RoundStart),
            "Q21ANSWERSBATCH" => Ok(MatchMessage::AnswersBatch),
            "Q21SCOREFEEDBACK" => Ok(MatchMessage::ScoreFeedback),
            _ => Err(ProtocolError::UnknownMessageType {
                family: MessageFamily::Match,
                message_type: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for MatchMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound league-family broadcasts sent by the league manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeagueMessage {
    StartSeason,
    RegistrationResponse,
    AssignmentTable,
    NewLeagueRound,
    LeagueCompleted,
}

impl LeagueMessage {
    /// The wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            LeagueMessage::StartSeason => "BROADCAST_START_SEASON",
            LeagueMessage::RegistrationResponse => "SEASON_REGISTRATION_RESPONSE",
            LeagueMessage::AssignmentTable => "BROADCAST_ASSIGNMENT_TABLE",
            LeagueMessage::NewLeagueRound => "BROADCAST_NEW_LEAGUE_ROUND",
            LeagueMessage::LeagueCompleted => "LEAGUE_COMPLETED",
        }
    }
}

impl FromStr for LeagueMessage {
    type Err = ProtocolError;

    /// Parses a league message type, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BROADCAST_START_SEASON" => Ok(LeagueMessage::StartSeason),
            "SEASON_REGISTRATION_RESPONSE" => Ok(LeagueMessage::RegistrationResponse),
            "BROADCAST_ASSIGNMENT_TABLE" => Ok(LeagueMessage::AssignmentTable),
            "BROADCAST_NEW_LEAGUE_ROUND" => Ok(LeagueMessage::NewLeagueRound),
            "LEAGUE_COMPLETED" => Ok(LeagueMessage::LeagueCompleted),
            _ => Err(ProtocolError::UnknownMessageType {
                family: MessageFamily::League,
                message_type: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for LeagueMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every message type this player sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutboundKind {
    #[serde(rename = "Q21WARMUPRESPONSE")]
    WarmupResponse,
    #[serde(rename = "Q21QUESTIONSBATCH")]
    QuestionsBatch,
    #[serde(rename = "Q21GUESSSUBMISSION")]
    GuessSubmission,
    #[serde(rename = "SEASON_REGISTRATION_REQUEST")]
    SeasonRegistrationRequest,
    #[serde(rename = "GROUP_ASSIGNMENT_RESPONSE")]
    GroupAssignmentResponse,
    #[serde(rename = "MATCH_RESULT_REPORT")]
    MatchResultReport,
}

impl OutboundKind {
    /// The wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OutboundKind::WarmupResponse => "Q21WARMUPRESPONSE",
            OutboundKind::QuestionsBatch => "Q21QUESTIONSBATCH",
            OutboundKind::GuessSubmission => "Q21GUESSSUBMISSION",
            OutboundKind::SeasonRegistrationRequest => "SEASON_REGISTRATION_REQUEST",
            OutboundKind::GroupAssignmentResponse => "GROUP_ASSIGNMENT_RESPONSE",
            OutboundKind::MatchResultReport => "MATCH_RESULT_REPORT",
        }
    }

    /// The family the message belongs to.
    pub const fn family(&self) -> MessageFamily {
        match self {
            OutboundKind::WarmupResponse
            | OutboundKind::QuestionsBatch
            | OutboundKind::GuessSubmission => MessageFamily::Match,
            OutboundKind::SeasonRegistrationRequest
            | OutboundKind::GroupAssignmentResponse
            | OutboundKind::MatchResultReport => MessageFamily::League,
        }
    }
}

impl fmt::Display for OutboundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An addressed message ready to be handed to the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// The message type.
    pub message_type: OutboundKind,
    /// The message payload.
    pub payload: Value,
    /// Address of the recipient.
    pub recipient: String,
}

impl OutboundMessage {
    /// Creates a new [OutboundMessage].
    pub fn new(message_type: OutboundKind, payload: Value, recipient: impl Into<String>) -> Self {
        Self {
            message_type,
            payload,
            recipient: recipient.into(),
        }
    }
}

/// Extracts the match identifier from a match-family payload, falling back to `game_id`.
pub fn match_id_of(payload: &Value) -> Option<&str> {
    ["match_id", "game_id"]
        .iter()
        .filter_map(|key| payload.get(key).and_then(Value::as_str))
        .find(|id| !id.is_empty())
}

/// Decodes a typed payload. A `null` payload decodes as an empty object so that structs whose
/// fields all have defaults still decode.
pub(crate) fn decode<T: DeserializeOwned>(message_type: &'static str, payload: &Value) -> Result<T> {
    let value = if payload.is_null() {
        Value::Object(Map::new())
    } else {
        payload.clone()
    };
    serde_json::from_value(value).map_err(|e| ProtocolError::malformed(message_type, e))
}

/// Deserializes an explicit `null` as the default value of the field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The first non-empty spelling of a field, or an empty string.
fn first_non_empty<const N: usize>(spellings: [Option<String>; N]) -> String {
    spellings
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

/// Payload of [MatchMessage::WarmupCall].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawWarmupCall")]
pub struct WarmupCallPayload {
    pub warmup_question: String,
}

#[derive(Deserialize)]
struct RawWarmupCall {
    #[serde(default)]
    warmup_question: Option<String>,
    #[serde(default)]
    question: Option<String>,
}

impl From<RawWarmupCall> for WarmupCallPayload {
    fn from(raw: RawWarmupCall) -> Self {
        Self {
            warmup_question: first_non_empty([raw.warmup_question, raw.question]),
        }
    }
}

/// Payload of [MatchMessage::RoundStart]. Carries the book content of the match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawRoundStart")]
pub struct RoundStartPayload {
    pub book_name: String,
    pub book_hint: String,
    pub association_word: String,
}

#[derive(Deserialize)]
struct RawRoundStart {
    #[serde(default)]
    book_name: Option<String>,
    #[serde(default)]
    book_hint: Option<String>,
    #[serde(default)]
    book_description: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    association_word: Option<String>,
    #[serde(default)]
    associative_domain: Option<String>,
    #[serde(default)]
    association_domain: Option<String>,
}

impl From<RawRoundStart> for RoundStartPayload {
    fn from(raw: RawRoundStart) -> Self {
        Self {
            book_name: raw.book_name.unwrap_or_default(),
            book_hint: first_non_empty([raw.book_hint, raw.book_description, raw.description]),
            association_word: first_non_empty([
                raw.association_word,
                raw.associative_domain,
                raw.association_domain,
            ]),
        }
    }
}

/// Payload of [MatchMessage::AnswersBatch].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AnswersBatchPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub answers: Vec<Answer>,
}

/// Payload of [MatchMessage::ScoreFeedback].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScoreFeedbackPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub league_points: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub private_score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub breakdown: Map<String, Value>,
}
