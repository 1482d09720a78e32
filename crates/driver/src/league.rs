//! The `league` module contains the [LeagueHandler], which translates league-manager broadcasts
//! into responses and into the season, round and assignment data the lifecycle manager consumes.

use crate::{
    error::{ProtocolError, Result},
    gprm::Assignment,
    messages::{decode, LeagueMessage, OutboundKind, OutboundMessage},
    types::{GameId, PlayerRole},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Registration statuses that mean the player takes part in the season.
const REGISTERED_STATUSES: &[&str] = &["REGISTERED", "ACCEPTED", "OK"];

/// The response to a season start, plus the season it announced.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonStart {
    pub season_id: String,
    pub response: OutboundMessage,
}

/// The parsed assignment table.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentTable {
    /// The acknowledgement for the league manager.
    pub response: OutboundMessage,
    /// The season named by the table, if any.
    pub season_id: Option<String>,
    /// This player's assignments, partitioned by round number.
    pub rounds: BTreeMap<u32, Vec<Assignment>>,
}

/// This player's final standing in a season.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonSummary {
    pub season_id: String,
    /// `0` when the player is missing from the final standings.
    pub final_rank: u32,
    pub total_points: u32,
    pub season_complete: bool,
}

#[derive(Debug, Default, Deserialize)]
struct StartSeasonPayload {
    #[serde(default)]
    season_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct RegistrationResponsePayload {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Default, Deserialize)]
struct AssignmentTablePayload {
    #[serde(default)]
    season_id: Option<String>,
    #[serde(default)]
    round_number: Option<u32>,
    #[serde(default)]
    assignments: Option<Vec<AssignmentRow>>,
}

#[derive(Debug, Default, Deserialize)]
struct AssignmentRow {
    #[serde(default)]
    role: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    game_id: String,
    #[serde(default)]
    group_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct NewRoundPayload {
    #[serde(default)]
    round_number: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LeagueCompletedPayload {
    #[serde(default)]
    season_id: Option<String>,
    #[serde(default)]
    final_standings: Vec<StandingRow>,
}

#[derive(Debug, Default, Deserialize)]
struct StandingRow {
    #[serde(default)]
    rank: u32,
    #[serde(default)]
    participant_id: String,
    #[serde(default)]
    total_points: u32,
}

/// Participants of one game of the assignment table.
#[derive(Debug, Default)]
struct TableGame {
    group_id: String,
    player1: Option<String>,
    player2: Option<String>,
    referee: Option<String>,
}

/// Translates league broadcasts for one player. Holds only the player's identity; season state
/// is kept by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeagueHandler {
    player_email: String,
    player_name: String,
}

impl LeagueHandler {
    /// Creates a new [LeagueHandler] for the given player.
    pub fn new(player_email: impl Into<String>, player_name: impl Into<String>) -> Self {
        Self {
            player_email: player_email.into(),
            player_name: player_name.into(),
        }
    }

    pub fn player_email(&self) -> &str {
        &self.player_email
    }

    /// Answers a season start with a registration request.
    ///
    /// ### Returns
    /// - `Ok(SeasonStart)`: The season id and the `SEASON_REGISTRATION_REQUEST` for `sender`.
    /// - `Err(ProtocolError::MissingField)`: The payload names no season.
    pub fn handle_start_season(&self, payload: &Value, sender: &str) -> Result<SeasonStart> {
        let name = LeagueMessage::StartSeason.as_str();
        let StartSeasonPayload { season_id } = decode(name, payload)?;
        if season_id.is_empty() {
            return Err(ProtocolError::MissingField {
                message_type: name,
                field: "season_id",
            });
        }

        let response = OutboundMessage::new(
            OutboundKind::SeasonRegistrationRequest,
            json!({
                "season_id": season_id,
                "player_email": self.player_email,
                "player_name": self.player_name,
                "machine_state": "READY",
            }),
            sender,
        );
        Ok(SeasonStart {
            season_id,
            response,
        })
    }

    /// Reads a registration response. Returns true when the status means the player is
    /// registered.
    pub fn handle_registration_response(&self, payload: &Value) -> Result<bool> {
        let name = LeagueMessage::RegistrationResponse.as_str();
        let RegistrationResponsePayload { status } = decode(name, payload)?;
        if status.is_empty() {
            return Err(ProtocolError::MissingField {
                message_type: name,
                field: "status",
            });
        }
        Ok(REGISTERED_STATUSES
            .iter()
            .any(|s| s.eq_ignore_ascii_case(&status)))
    }

    /// Parses an assignment table and acknowledges it.
    ///
    /// Rows are grouped by game id. Every game in which this player sits as player 1 or player 2
    /// becomes an [Assignment], filed under the round encoded in its game id. Games whose id
    /// carries no round fall back to the table's `round_number`, then to round 1.
    ///
    /// ### Takes
    /// - `payload`: The table payload.
    /// - `sender`: The league manager, recipient of the acknowledgement.
    /// - `known_season`: The season the caller knows of, used when the table names none.
    ///
    /// ### Returns
    /// - `Ok(AssignmentTable)`: The acknowledgement and this player's assignments.
    /// - `Err(ProtocolError)`: The table is missing or malformed.
    pub fn handle_assignment_table(
        &self,
        payload: &Value,
        sender: &str,
        known_season: &str,
    ) -> Result<AssignmentTable> {
        let name = LeagueMessage::AssignmentTable.as_str();
        let table: AssignmentTablePayload = decode(name, payload)?;
        let rows = table.assignments.ok_or(ProtocolError::MissingField {
            message_type: name,
            field: "assignments",
        })?;

        let mut games: BTreeMap<String, TableGame> = BTreeMap::new();
        for row in rows.into_iter().filter(|row| !row.game_id.is_empty()) {
            let game = games.entry(row.game_id).or_default();
            if game.group_id.is_empty() {
                game.group_id = row.group_id;
            }
            let seat = match row.role.to_ascii_lowercase().as_str() {
                "player1" => &mut game.player1,
                "player2" => &mut game.player2,
                "referee" => &mut game.referee,
                other => {
                    tracing::debug!(target: "q21-protocol", "Ignoring assignment row with role {:?}", other);
                    continue;
                }
            };
            *seat = Some(row.email);
        }

        let fallback_round = table.round_number.unwrap_or(1);
        let mut rounds: BTreeMap<u32, Vec<Assignment>> = BTreeMap::new();
        for (game_id, game) in games {
            let mine = |seat: &Option<String>| seat.as_deref() == Some(self.player_email.as_str());
            let (role, opponent) = if mine(&game.player1) {
                (PlayerRole::Player1, game.player2)
            } else if mine(&game.player2) {
                (PlayerRole::Player2, game.player1)
            } else {
                continue;
            };

            let game_id = GameId::new(game_id);
            let round_number = game_id.round_number().unwrap_or(fallback_round);
            rounds.entry(round_number).or_default().push(Assignment {
                match_id: game_id.to_string(),
                game_id,
                round_number,
                referee_address: game.referee.unwrap_or_default(),
                opponent_address: opponent,
                role,
                group_id: game.group_id,
            });
        }

        let received: usize = rounds.values().map(Vec::len).sum();
        let season_id = table.season_id.filter(|s| !s.is_empty());
        let response = OutboundMessage::new(
            OutboundKind::GroupAssignmentResponse,
            json!({
                "season_id": season_id.as_deref().unwrap_or(known_season),
                "player_email": self.player_email,
                "assignments_received": received,
                "status": "ACKNOWLEDGED",
            }),
            sender,
        );

        Ok(AssignmentTable {
            response,
            season_id,
            rounds,
        })
    }

    /// Reads the round number of a new round broadcast.
    pub fn handle_new_round(&self, payload: &Value) -> Result<u32> {
        let name = LeagueMessage::NewLeagueRound.as_str();
        let NewRoundPayload { round_number } = decode(name, payload)?;
        round_number.ok_or(ProtocolError::MissingField {
            message_type: name,
            field: "round_number",
        })
    }

    /// Looks this player up in the final standings of a completed league.
    pub fn handle_league_completed(
        &self,
        payload: &Value,
        known_season: &str,
    ) -> Result<SeasonSummary> {
        let name = LeagueMessage::LeagueCompleted.as_str();
        let completed: LeagueCompletedPayload = decode(name, payload)?;
        let standing = completed
            .final_standings
            .iter()
            .find(|row| row.participant_id == self.player_email);

        Ok(SeasonSummary {
            season_id: completed
                .season_id
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| known_season.to_string()),
            final_rank: standing.map_or(0, |row| row.rank),
            total_points: standing.map_or(0, |row| row.total_points),
            season_complete: true,
        })
    }
}
