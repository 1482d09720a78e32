//! The `log` module renders protocol traffic as one line per message under the `q21-protocol`
//! tracing target. The game a line belongs to is carried by an explicit [LogContext] that the
//! caller builds per message.

use chrono::DateTime;
use std::fmt;

/// Display names of the protocol message types, keyed by their underscore-free wire name.
const DISPLAY_NAMES: &[(&str, &str)] = &[
    ("BROADCASTSTARTSEASON", "START-SEASON"),
    ("SEASONREGISTRATIONRESPONSE", "SIGNUP-RESPONSE"),
    ("BROADCASTASSIGNMENTTABLE", "ASSIGNMENT-TABLE"),
    ("BROADCASTNEWLEAGUEROUND", "START-ROUND"),
    ("Q21WARMUPCALL", "PING-CALL"),
    ("Q21ROUNDSTART", "START-GAME"),
    ("Q21ANSWERSBATCH", "QUESTION-ANSWERS"),
    ("Q21SCOREFEEDBACK", "ROUND-SCORE-REPORT"),
    ("LEAGUECOMPLETED", "SEASON-ENDED"),
    ("SEASONREGISTRATIONREQUEST", "SEASON-SIGNUP"),
    ("GROUPASSIGNMENTRESPONSE", "ASSIGNMENT-ACK"),
    ("MATCHRESULTREPORT", "MATCH-REPORT"),
    ("Q21WARMUPRESPONSE", "PING-RESPONSE"),
    ("Q21QUESTIONSBATCH", "ASK-20-QUESTIONS"),
    ("Q21GUESSSUBMISSION", "MY-GUESS"),
];

/// What the other side does next after each message type.
const EXPECTED_RESPONSES: &[(&str, &str)] = &[
    ("BROADCASTSTARTSEASON", "SEASON-SIGNUP"),
    ("SEASONREGISTRATIONREQUEST", "SIGNUP-RESPONSE"),
    ("SEASONREGISTRATIONRESPONSE", "Wait for ASSIGNMENT-TABLE"),
    ("BROADCASTASSIGNMENTTABLE", "Wait for START-ROUND"),
    ("GROUPASSIGNMENTRESPONSE", "Wait for START-ROUND"),
    ("BROADCASTNEWLEAGUEROUND", "Wait for PING-CALL"),
    ("Q21WARMUPCALL", "PING-RESPONSE"),
    ("Q21WARMUPRESPONSE", "Wait for START-GAME"),
    ("Q21ROUNDSTART", "ASK-20-QUESTIONS"),
    ("Q21QUESTIONSBATCH", "QUESTION-ANSWERS"),
    ("Q21ANSWERSBATCH", "MY-GUESS"),
    ("Q21GUESSSUBMISSION", "ROUND-SCORE-REPORT"),
    ("Q21SCOREFEEDBACK", "None (terminal)"),
    ("MATCHRESULTREPORT", "None (terminal)"),
    ("LEAGUECOMPLETED", "None (terminal)"),
];

/// Game id shown before a game context is known.
const UNKNOWN_GAME_ID: &str = "0000000";

/// Whether this player takes part in the game a log line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Active,
    Inactive,
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerStatus::Active => f.write_str("PLAYER-ACTIVE"),
            PlayerStatus::Inactive => f.write_str("PLAYER-INACTIVE"),
        }
    }
}

/// The game and role shown on a protocol log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogContext {
    game_id: String,
    status: Option<PlayerStatus>,
}

impl LogContext {
    /// Context of season-level traffic: game id `SS99999`, no role.
    pub fn season(season_number: u32) -> Self {
        Self {
            game_id: format!("{:02}99999", season_number % 100),
            status: None,
        }
    }

    /// Context of a round broadcast: game id `SSRR999`, active iff this player has games in the
    /// round.
    pub fn round(season_number: u32, round_number: u32, has_assignments: bool) -> Self {
        Self {
            game_id: format!("{:02}{:02}999", season_number % 100, round_number % 100),
            status: Some(if has_assignments {
                PlayerStatus::Active
            } else {
                PlayerStatus::Inactive
            }),
        }
    }

    /// Context of match traffic, always active.
    pub fn game(raw_game_id: &str) -> Self {
        Self {
            game_id: normalize_game_id(raw_game_id),
            status: Some(PlayerStatus::Active),
        }
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn status(&self) -> Option<PlayerStatus> {
        self.status
    }
}

impl Default for LogContext {
    fn default() -> Self {
        Self {
            game_id: UNKNOWN_GAME_ID.to_string(),
            status: None,
        }
    }
}

/// Reduces a game id to its trailing 7 digits, left padded with zeros.
pub fn normalize_game_id(raw: &str) -> String {
    let digits: Vec<char> = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return UNKNOWN_GAME_ID.to_string();
    }
    let tail: String = digits[digits.len().saturating_sub(7)..].iter().collect();
    format!("{:0>7}", tail)
}

/// The season number encoded in the trailing digits of a season id, e.g. `S01` is season 1.
pub fn season_number(season_id: &str) -> u32 {
    let digits: String = season_id
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().unwrap_or(0)
}

fn lookup(table: &'static [(&'static str, &'static str)], message_type: &str) -> Option<&'static str> {
    let key: String = message_type
        .chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    table
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, value)| *value)
}

/// The display name of a message type, or the type itself when it has none.
pub fn display_name(message_type: &str) -> &str {
    lookup(DISPLAY_NAMES, message_type).unwrap_or(message_type)
}

/// What the other side is expected to do after `message_type`.
pub fn expected_response(message_type: &str) -> &'static str {
    lookup(EXPECTED_RESPONSES, message_type).unwrap_or("Unknown")
}

fn format_deadline(deadline: Option<&str>) -> String {
    match deadline.filter(|d| !d.is_empty()) {
        None => "--:--:--".to_string(),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|at| at.format("%H:%M:%S").to_string())
            .unwrap_or_else(|_| raw.to_string()),
    }
}

fn role_segment(ctx: &LogContext) -> String {
    ctx.status
        .map(|status| format!(" | ROLE: {status}"))
        .unwrap_or_default()
}

/// Logs a received protocol message.
pub fn log_received(ctx: &LogContext, message_type: &str, sender: &str, deadline: Option<&str>) {
    tracing::info!(
        target: "q21-protocol",
        "GAME-ID: {} | RECEIVED | from {:<30} | {:<20} | EXPECTED-RESPONSE: {:<25}{} | DEADLINE: {}",
        ctx.game_id,
        sender,
        display_name(message_type),
        expected_response(message_type),
        role_segment(ctx),
        format_deadline(deadline)
    );
}

/// Logs a sent protocol message.
pub fn log_sent(ctx: &LogContext, message_type: &str, recipient: &str) {
    tracing::info!(
        target: "q21-protocol",
        "GAME-ID: {} | SENT     | to {:<32} | {:<20} | EXPECTED-RESPONSE: {:<25}{}",
        ctx.game_id,
        recipient,
        display_name(message_type),
        expected_response(message_type),
        role_segment(ctx)
    );
}

/// Logs a message that could not be handled.
pub fn log_rejected(message_type: &str, sender: &str, reason: &str) {
    tracing::error!(
        target: "q21-protocol",
        "REJECTED {} from {}: {}",
        display_name(message_type),
        sender,
        reason
    );
}

/// Logs the invocation of a strategy capability.
pub fn log_callback_call(callback: &str) {
    tracing::debug!(target: "q21-protocol", "CALLBACK: {:<20} | CALL     | ROLE: PLAYER", callback);
}

/// Logs the return of a strategy capability.
pub fn log_callback_response(callback: &str) {
    tracing::debug!(target: "q21-protocol", "CALLBACK: {:<20} | RESPONSE | ROLE: PLAYER", callback);
}
