//! The `termination` module contains the audit records emitted for matches: the
//! [TerminationReport] for sessions that were force-ended and the [CompletionReport] for sessions
//! that reached their natural end. Both become a `MATCH_RESULT_REPORT` for the league manager.

use crate::{
    gprm::GameResult,
    messages::{MatchMessage, OutboundKind},
    types::{GameId, GamePhase, LastActor},
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Version of the `MATCH_RESULT_REPORT` message.
pub const MATCH_REPORT_VERSION: &str = "1.0";

/// Reason code of a completion report.
pub const GAME_COMPLETED: &str = "GAME_COMPLETED";

/// Why a session was force-ended.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TerminationReason {
    /// A new round started while the match was in flight.
    NewRoundStarted,
    /// The league finished while the match was in flight.
    LeagueCompleted,
    /// Any other caller supplied code, e.g. a deadline sweep.
    Other(String),
}

impl TerminationReason {
    /// The wire code.
    pub fn as_str(&self) -> &str {
        match self {
            TerminationReason::NewRoundStarted => "NEW_ROUND_STARTED",
            TerminationReason::LeagueCompleted => "LEAGUE_COMPLETED",
            TerminationReason::Other(code) => code,
        }
    }
}

impl From<&str> for TerminationReason {
    fn from(code: &str) -> Self {
        match code {
            "NEW_ROUND_STARTED" => TerminationReason::NewRoundStarted,
            "LEAGUE_COMPLETED" => TerminationReason::LeagueCompleted,
            other => TerminationReason::Other(other.to_string()),
        }
    }
}

impl From<String> for TerminationReason {
    fn from(code: String) -> Self {
        TerminationReason::from(code.as_str())
    }
}

impl From<TerminationReason> for String {
    fn from(reason: TerminationReason) -> Self {
        reason.as_str().to_string()
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the participant sending a match report. The session manager does not know its own
/// address, so the caller supplies it when converting a report into a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reporter {
    pub email: String,
    pub role: String,
}

impl Reporter {
    /// Creates a new [Reporter].
    pub fn new(email: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            role: role.into(),
        }
    }
}

/// Snapshot of a session taken at the moment it was force-ended before completing.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminationReport {
    pub match_id: String,
    pub game_id: GameId,
    pub round_number: u32,
    pub season_id: String,
    pub phase_at_termination: GamePhase,
    /// Always `phase_at_termination.last_actor()`.
    pub last_actor: LastActor,
    pub last_message_sent: Option<OutboundKind>,
    pub last_message_received: Option<MatchMessage>,
    pub terminated_at: DateTime<Utc>,
    pub reason: TerminationReason,
}

impl TerminationReport {
    /// Converts the report into a `MATCH_RESULT_REPORT` payload.
    pub fn to_protocol_message(&self, reporter: &Reporter) -> Value {
        json!({
            "message_type": OutboundKind::MatchResultReport.as_str(),
            "version": MATCH_REPORT_VERSION,
            "match_id": self.match_id,
            "game_id": self.game_id,
            "round_number": self.round_number,
            "season_id": self.season_id,
            "status": GamePhase::Terminated.as_str(),
            "phase_at_termination": self.phase_at_termination.as_str(),
            "last_actor": self.last_actor.as_str(),
            "last_message_sent": self.last_message_sent.map(|m| m.as_str()).unwrap_or_default(),
            "last_message_received": self.last_message_received.map(|m| m.as_str()).unwrap_or_default(),
            "reported_at": timestamp(&self.terminated_at),
            "reason": self.reason.as_str(),
            "reporter": reporter,
        })
    }
}

/// Record of a session that reached [GamePhase::Completed].
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReport {
    pub game_id: GameId,
    pub round_number: u32,
    pub season_id: String,
    pub result: GameResult,
    pub last_message_sent: Option<OutboundKind>,
    pub last_message_received: Option<MatchMessage>,
    pub reported_at: DateTime<Utc>,
}

impl CompletionReport {
    /// Converts the report into a `MATCH_RESULT_REPORT` payload carrying the final score.
    pub fn to_protocol_message(&self, reporter: &Reporter) -> Value {
        json!({
            "message_type": OutboundKind::MatchResultReport.as_str(),
            "version": MATCH_REPORT_VERSION,
            "match_id": self.result.match_id,
            "game_id": self.game_id,
            "round_number": self.round_number,
            "season_id": self.season_id,
            "status": self.result.status,
            "phase_at_termination": GamePhase::Completed.as_str(),
            "last_actor": GamePhase::Completed.last_actor().as_str(),
            "last_message_sent": self.last_message_sent.map(|m| m.as_str()).unwrap_or_default(),
            "last_message_received": self.last_message_received.map(|m| m.as_str()).unwrap_or_default(),
            "reported_at": timestamp(&self.reported_at),
            "reason": GAME_COMPLETED,
            "league_points": self.result.league_points,
            "private_score": self.result.private_score,
            "breakdown": self.result.breakdown,
            "reporter": reporter,
        })
    }
}

/// Any report destined for the league manager.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchReport {
    Terminated(TerminationReport),
    Completed(CompletionReport),
}

impl MatchReport {
    /// The match the report is about.
    pub fn match_id(&self) -> &str {
        match self {
            MatchReport::Terminated(report) => &report.match_id,
            MatchReport::Completed(report) => &report.result.match_id,
        }
    }

    /// Converts the report into a `MATCH_RESULT_REPORT` payload.
    pub fn to_protocol_message(&self, reporter: &Reporter) -> Value {
        match self {
            MatchReport::Terminated(report) => report.to_protocol_message(reporter),
            MatchReport::Completed(report) => report.to_protocol_message(reporter),
        }
    }
}

impl From<TerminationReport> for MatchReport {
    fn from(report: TerminationReport) -> Self {
        MatchReport::Terminated(report)
    }
}

impl From<CompletionReport> for MatchReport {
    fn from(report: CompletionReport) -> Self {
        MatchReport::Completed(report)
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
