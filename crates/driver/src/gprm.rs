//! The `gprm` module contains the immutable match parameters ([Gprm]), the [Assignment] records
//! they are built from, and the [GameResult] produced when a match completes.

use crate::types::{GameId, PlayerRole};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A match this player has been assigned to play, as parsed from an assignment table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// The match identifier. Equal to the game identifier in the current protocol.
    pub match_id: String,
    /// The structured game identifier.
    pub game_id: GameId,
    /// The round the match is played in.
    pub round_number: u32,
    /// Address of the referee running the match.
    pub referee_address: String,
    /// Address of the other player, if known.
    pub opponent_address: Option<String>,
    /// This player's seat.
    pub role: PlayerRole,
    /// The grouping key of the match within the round.
    pub group_id: String,
}

/// Game parameters: everything needed to play one match. Created once when the round starts and
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gprm {
    pub match_id: String,
    pub game_id: GameId,
    pub season_id: String,
    pub round_number: u32,
    /// Sequence number of the game within its round.
    pub game_number: u32,
    pub referee_address: String,
    pub opponent_address: Option<String>,
    pub role: PlayerRole,
    /// Book content. Empty at creation; it only arrives with the referee's round start.
    pub book_name: String,
    pub book_hint: String,
    pub association_word: String,
    pub auth_token: String,
}

/// Builds [Gprm] values from [Assignment]s using the season and credentials currently known.
#[derive(Debug, Clone, Default)]
pub struct GprmBuilder {
    season_id: String,
    auth_token: String,
}

impl GprmBuilder {
    /// Creates a new [GprmBuilder].
    pub fn new(season_id: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            season_id: season_id.into(),
            auth_token: auth_token.into(),
        }
    }

    /// Sets the season id stamped on built parameters.
    pub fn season_id(mut self, season_id: impl Into<String>) -> Self {
        self.season_id = season_id.into();
        self
    }

    /// Sets the auth token stamped on built parameters.
    pub fn auth_token(mut self, auth_token: impl Into<String>) -> Self {
        self.auth_token = auth_token.into();
        self
    }

    /// Builds the parameters of `assignment` for the given round.
    pub fn build(&self, assignment: &Assignment, round_number: u32) -> Gprm {
        Gprm {
            match_id: assignment.match_id.clone(),
            game_id: assignment.game_id.clone(),
            season_id: self.season_id.clone(),
            round_number,
            game_number: assignment.game_id.sequence_number().unwrap_or(1),
            referee_address: assignment.referee_address.clone(),
            opponent_address: assignment.opponent_address.clone(),
            role: assignment.role,
            book_name: String::new(),
            book_hint: String::new(),
            association_word: String::new(),
            auth_token: self.auth_token.clone(),
        }
    }
}

/// Final status of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Completed,
    Failed,
    Timeout,
}

/// The outcome of a match that reached its natural end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub match_id: String,
    pub status: GameStatus,
    pub league_points: u32,
    pub private_score: f64,
    #[serde(default)]
    pub breakdown: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GameResult {
    /// A [GameStatus::Completed] result with the given score.
    pub fn completed(
        match_id: impl Into<String>,
        league_points: u32,
        private_score: f64,
        breakdown: Map<String, Value>,
    ) -> Self {
        Self {
            match_id: match_id.into(),
            status: GameStatus::Completed,
            league_points,
            private_score,
            breakdown,
            error: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn assignment(game_id: &str) -> Assignment {
        Assignment {
            match_id: game_id.to_string(),
            game_id: GameId::new(game_id),
            round_number: 2,
            referee_address: "ref@test.com".to_string(),
            opponent_address: Some("opp@test.com".to_string()),
            role: PlayerRole::Player2,
            group_id: "G1".to_string(),
        }
    }

    #[test]
    fn build_from_assignment_leaves_book_content_empty() {
        let gprm = GprmBuilder::new("S01", "token").build(&assignment("0102003"), 2);

        assert_eq!(gprm.match_id, "0102003");
        assert_eq!(gprm.season_id, "S01");
        assert_eq!(gprm.round_number, 2);
        assert_eq!(gprm.game_number, 3);
        assert_eq!(gprm.role, PlayerRole::Player2);
        assert_eq!(gprm.opponent_address.as_deref(), Some("opp@test.com"));
        assert_eq!(gprm.auth_token, "token");
        assert!(gprm.book_name.is_empty());
        assert!(gprm.book_hint.is_empty());
        assert!(gprm.association_word.is_empty());
    }

    #[test]
    fn short_game_id_defaults_to_first_game() {
        let gprm = GprmBuilder::default()
            .season_id("S02")
            .build(&assignment("0102"), 2);
        assert_eq!(gprm.game_number, 1);
        assert_eq!(gprm.season_id, "S02");
    }

    #[test]
    fn game_result_status_uses_wire_names() {
        let result = GameResult::completed("0101001", 85, 0.9, Map::new());
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "COMPLETED");
        assert!(value.get("error").is_none());
        assert_eq!(serde_json::to_value(GameStatus::Timeout).unwrap(), "TIMEOUT");
    }
}
