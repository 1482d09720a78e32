//! Small value types shared by every layer of the session manager.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The [GamePhase] enum tracks a session's position in the match protocol. The declaration order
/// is the protocol order, so `Ord` compares protocol progress. [GamePhase::Terminated] is the
/// orthogonal absorbing state and is never reached by advancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    Initialized,
    WarmupComplete,
    QuestionsSent,
    GuessSubmitted,
    Completed,
    Terminated,
}

impl GamePhase {
    /// The wire name of the phase.
    pub const fn as_str(&self) -> &'static str {
        match self {
            GamePhase::Initialized => "INITIALIZED",
            GamePhase::WarmupComplete => "WARMUP_COMPLETE",
            GamePhase::QuestionsSent => "QUESTIONS_SENT",
            GamePhase::GuessSubmitted => "GUESS_SUBMITTED",
            GamePhase::Completed => "COMPLETED",
            GamePhase::Terminated => "TERMINATED",
        }
    }

    /// Returns true for [GamePhase::Completed] and [GamePhase::Terminated].
    pub const fn is_terminal(&self) -> bool {
        matches!(self, GamePhase::Completed | GamePhase::Terminated)
    }

    /// Who sent the most recent message of a session sitting in this phase.
    pub const fn last_actor(&self) -> LastActor {
        match self {
            GamePhase::WarmupComplete | GamePhase::QuestionsSent | GamePhase::GuessSubmitted => {
                LastActor::Player
            }
            GamePhase::Initialized | GamePhase::Completed | GamePhase::Terminated => {
                LastActor::None
            }
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The party that sent the last message of a session, derived from its [GamePhase].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LastActor {
    None,
    Player,
}

impl LastActor {
    /// The wire name of the actor.
    pub const fn as_str(&self) -> &'static str {
        match self {
            LastActor::None => "NONE",
            LastActor::Player => "PLAYER",
        }
    }
}

impl fmt::Display for LastActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// This participant's seat in a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerRole {
    #[default]
    #[serde(rename = "PLAYER1")]
    Player1,
    #[serde(rename = "PLAYER2")]
    Player2,
}

impl PlayerRole {
    /// The wire name of the role.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PlayerRole::Player1 => "PLAYER1",
            PlayerRole::Player2 => "PLAYER2",
        }
    }
}

impl fmt::Display for PlayerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A game identifier in the 7-digit `SSRRGGG` format: season, round and sequence number within
/// the round. Identifiers that do not follow the format are kept verbatim and simply yield `None`
/// from the accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    /// Wraps a raw game identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `SS` digits.
    pub fn season_number(&self) -> Option<u32> {
        self.digits(0..2)
    }

    /// The `RR` digits.
    pub fn round_number(&self) -> Option<u32> {
        self.digits(2..4)
    }

    /// The `GGG` digits.
    pub fn sequence_number(&self) -> Option<u32> {
        self.digits(4..7)
    }

    fn digits(&self, range: std::ops::Range<usize>) -> Option<u32> {
        let part = self.0.get(range)?;
        if !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        part.parse().ok()
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GameId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Prefixes of league-family message types.
const LEAGUE_PREFIXES: &[&str] = &["BROADCAST_", "SEASON_REGISTRATION", "LEAGUE_"];

/// Prefix of match-family message types.
const MATCH_PREFIX: &str = "Q21";

/// The two disjoint message families the router dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageFamily {
    League,
    Match,
}

impl MessageFamily {
    /// Classifies a message type by its prefix, ignoring ASCII case. New message types of a
    /// family need no change here as long as they keep the family prefix.
    pub fn classify(message_type: &str) -> Option<Self> {
        let upper = message_type.to_ascii_uppercase();
        if LEAGUE_PREFIXES.iter().any(|prefix| upper.starts_with(prefix)) {
            Some(MessageFamily::League)
        } else if upper.starts_with(MATCH_PREFIX) {
            Some(MessageFamily::Match)
        } else {
            None
        }
    }
}

impl fmt::Display for MessageFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageFamily::League => f.write_str("league"),
            MessageFamily::Match => f.write_str("match"),
        }
    }
}
