//! The `controller` module contains the [SessionController], the single entry point for both
//! message families.

use crate::{
    error::Result,
    gprm::Gprm,
    league::{LeagueHandler, SeasonSummary},
    lifecycle::{MatchOutcome, RoundLifecycleManager},
    messages::{LeagueMessage, MatchMessage, OutboundMessage},
    termination::{TerminationReason, TerminationReport},
};
use q21_player_strategy::Strategy;
use serde_json::Value;
use std::sync::Arc;

/// The outcome of a league message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeagueOutcome {
    /// The immediate reply for the league manager, if the message demands one.
    pub response: Option<OutboundMessage>,
    /// Parameters of the sessions started by the message.
    pub started: Vec<Gprm>,
    /// Reports for the sessions the message force-ended.
    pub terminated: Vec<TerminationReport>,
}

/// Composes the [LeagueHandler] and the [RoundLifecycleManager] and keeps the season state of
/// the player: the current season, its registration status and, once the league finished, the
/// final standing.
pub struct SessionController {
    league: LeagueHandler,
    lifecycle: RoundLifecycleManager,
    registered: bool,
    season_summary: Option<SeasonSummary>,
}

impl SessionController {
    /// Creates a new [SessionController] for the given player.
    pub fn new(
        player_email: impl Into<String>,
        player_name: impl Into<String>,
        strategy: Arc<dyn Strategy>,
    ) -> Self {
        Self {
            league: LeagueHandler::new(player_email, player_name),
            lifecycle: RoundLifecycleManager::new(strategy),
            registered: false,
            season_summary: None,
        }
    }

    /// Sets the token stamped on the parameters of every session started afterwards.
    pub fn set_auth_token(&mut self, auth_token: impl Into<String>) {
        self.lifecycle.set_auth_token(auth_token);
    }

    /// Handles a league-family message.
    ///
    /// ### Takes
    /// - `message_type`: The raw message type.
    /// - `payload`: The message payload.
    /// - `sender`: The league manager address, recipient of any reply.
    ///
    /// ### Returns
    /// - `Ok(LeagueOutcome)`: The reply, the sessions started and the sessions terminated.
    /// - `Err(ProtocolError)`: The type is unknown or the payload is missing required data.
    pub fn process_league_message(
        &mut self,
        message_type: &str,
        payload: &Value,
        sender: &str,
    ) -> Result<LeagueOutcome> {
        let mut outcome = LeagueOutcome::default();
        match message_type.parse::<LeagueMessage>()? {
            LeagueMessage::StartSeason => {
                let start = self.league.handle_start_season(payload, sender)?;
                tracing::info!(target: "q21-router", "Season {} started", start.season_id);
                self.lifecycle.set_season(start.season_id);
                self.registered = false;
                self.season_summary = None;
                outcome.response = Some(start.response);
            }
            LeagueMessage::RegistrationResponse => {
                self.registered = self.league.handle_registration_response(payload)?;
                tracing::info!(
                    target: "q21-router",
                    "Registration for season {}: {}",
                    self.lifecycle.season_id(),
                    if self.registered { "accepted" } else { "not accepted" }
                );
            }
            LeagueMessage::AssignmentTable => {
                let table = self.league.handle_assignment_table(
                    payload,
                    sender,
                    self.lifecycle.season_id(),
                )?;
                if let Some(season_id) = table.season_id {
                    if self.lifecycle.season_id().is_empty() {
                        self.lifecycle.set_season(season_id);
                    }
                }
                for (round_number, assignments) in table.rounds {
                    self.lifecycle.set_assignments(round_number, assignments);
                }
                outcome.response = Some(table.response);
            }
            LeagueMessage::NewLeagueRound => {
                let round_number = self.league.handle_new_round(payload)?;
                let transition = self.lifecycle.start_round(round_number);
                outcome.started = transition.started;
                outcome.terminated = transition.terminated;
            }
            LeagueMessage::LeagueCompleted => {
                let summary = self
                    .league
                    .handle_league_completed(payload, self.lifecycle.season_id())?;
                outcome.terminated = self
                    .lifecycle
                    .stop_current_round(TerminationReason::LeagueCompleted);
                tracing::info!(
                    target: "q21-router",
                    "Season {} complete: rank {}, {} points",
                    summary.season_id,
                    summary.final_rank,
                    summary.total_points
                );
                self.season_summary = Some(summary);
            }
        }
        Ok(outcome)
    }

    /// Handles a match-family message by routing it to the session it addresses.
    pub fn process_match_message(
        &mut self,
        message_type: &str,
        payload: &Value,
        sender: &str,
    ) -> Result<MatchOutcome> {
        let message_type = message_type.parse::<MatchMessage>()?;
        self.lifecycle.route_message(message_type, payload, sender)
    }

    /// Terminates a single match, e.g. once its deadline passed.
    pub fn terminate_match(
        &mut self,
        match_id: &str,
        reason: TerminationReason,
    ) -> Option<TerminationReport> {
        self.lifecycle.terminate_match(match_id, reason)
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// The current season, empty before the first season start.
    pub fn season_id(&self) -> &str {
        self.lifecycle.season_id()
    }

    /// The final standing of the player, once the league completed.
    pub fn season_summary(&self) -> Option<&SeasonSummary> {
        self.season_summary.as_ref()
    }

    pub fn player_email(&self) -> &str {
        self.league.player_email()
    }

    pub fn lifecycle(&self) -> &RoundLifecycleManager {
        &self.lifecycle
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{messages::OutboundKind, types::GamePhase};
    use q21_player_strategy::DemoStrategy;
    use serde_json::json;

    const ME: &str = "me@test.com";
    const MANAGER: &str = "lm@test.com";

    fn controller() -> SessionController {
        let mut controller = SessionController::new(ME, "Tester", Arc::new(DemoStrategy));
        controller.set_auth_token("token");
        controller
    }

    fn assignment_table() -> Value {
        json!({
            "season_id": "S01",
            "assignments": [
                {"role": "player1", "email": ME, "game_id": "0101001", "group_id": "G1"},
                {"role": "referee", "email": "ref@test.com", "game_id": "0101001", "group_id": "G1"},
                {"role": "player2", "email": ME, "game_id": "0102001", "group_id": "G1"},
                {"role": "referee", "email": "ref@test.com", "game_id": "0102001", "group_id": "G1"}
            ]
        })
    }

    #[test]
    fn season_flow_tracks_registration_and_rounds() {
        let mut controller = controller();

        let outcome = controller
            .process_league_message("BROADCAST_START_SEASON", &json!({"season_id": "S01"}), MANAGER)
            .unwrap();
        assert_eq!(
            outcome.response.unwrap().message_type,
            OutboundKind::SeasonRegistrationRequest
        );
        assert_eq!(controller.season_id(), "S01");
        assert!(!controller.is_registered());

        controller
            .process_league_message(
                "SEASON_REGISTRATION_RESPONSE",
                &json!({"status": "registered"}),
                MANAGER,
            )
            .unwrap();
        assert!(controller.is_registered());

        let outcome = controller
            .process_league_message("BROADCAST_ASSIGNMENT_TABLE", &assignment_table(), MANAGER)
            .unwrap();
        assert_eq!(
            outcome.response.unwrap().message_type,
            OutboundKind::GroupAssignmentResponse
        );
        assert!(controller.lifecycle().has_assignments_for_round(1));
        assert!(controller.lifecycle().has_assignments_for_round(2));

        let outcome = controller
            .process_league_message("BROADCAST_NEW_LEAGUE_ROUND", &json!({"round_number": 1}), MANAGER)
            .unwrap();
        assert!(outcome.response.is_none());
        assert_eq!(outcome.started.len(), 1);
        assert_eq!(outcome.started[0].auth_token, "token");
        assert_eq!(outcome.started[0].season_id, "S01");

        let outcome = controller
            .process_league_message("BROADCAST_NEW_LEAGUE_ROUND", &json!({"round_number": 2}), MANAGER)
            .unwrap();
        assert_eq!(outcome.terminated.len(), 1);
        assert_eq!(outcome.terminated[0].match_id, "0101001");
        assert_eq!(controller.lifecycle().active_match_ids(), vec!["0102001"]);
    }

    #[test]
    fn assignment_table_sets_season_when_unknown() {
        let mut controller = controller();
        controller
            .process_league_message("BROADCAST_ASSIGNMENT_TABLE", &assignment_table(), MANAGER)
            .unwrap();
        assert_eq!(controller.season_id(), "S01");
    }

    #[test]
    fn match_messages_reach_the_session() {
        let mut controller = controller();
        controller
            .process_league_message("BROADCAST_ASSIGNMENT_TABLE", &assignment_table(), MANAGER)
            .unwrap();
        controller
            .process_league_message("BROADCAST_NEW_LEAGUE_ROUND", &json!({"round_number": 1}), MANAGER)
            .unwrap();

        let outcome = controller
            .process_match_message(
                "Q21_WARMUP_CALL",
                &json!({"match_id": "0101001", "warmup_question": "2+2"}),
                "ref@test.com",
            )
            .unwrap();
        assert_eq!(
            outcome.response.unwrap().message_type,
            OutboundKind::WarmupResponse
        );
        assert_eq!(
            controller.lifecycle().get_session("0101001").unwrap().phase(),
            GamePhase::WarmupComplete
        );

        let report = controller
            .terminate_match("0101001", TerminationReason::from("DEADLINE_MISSED"))
            .unwrap();
        assert_eq!(report.phase_at_termination, GamePhase::WarmupComplete);
        assert!(controller.lifecycle().active_match_ids().is_empty());
    }

    #[test]
    fn league_completed_stops_the_round() {
        let mut controller = controller();
        controller
            .process_league_message("BROADCAST_ASSIGNMENT_TABLE", &assignment_table(), MANAGER)
            .unwrap();
        controller
            .process_league_message("BROADCAST_NEW_LEAGUE_ROUND", &json!({"round_number": 1}), MANAGER)
            .unwrap();

        let outcome = controller
            .process_league_message(
                "LEAGUE_COMPLETED",
                &json!({"final_standings": [{"rank": 2, "participant_id": ME, "total_points": 120}]}),
                MANAGER,
            )
            .unwrap();
        assert_eq!(outcome.terminated.len(), 1);
        assert_eq!(outcome.terminated[0].reason, TerminationReason::LeagueCompleted);

        let summary = controller.season_summary().unwrap();
        assert_eq!(summary.final_rank, 2);
        assert_eq!(summary.total_points, 120);
        assert!(controller.lifecycle().active_match_ids().is_empty());
    }

    #[test]
    fn unknown_types_are_rejected() {
        let mut controller = controller();
        assert!(controller
            .process_league_message("BROADCAST_KEEP_ALIVE", &json!({}), MANAGER)
            .is_err());
        assert!(controller
            .process_match_message("Q21KEEPALIVE", &json!({}), "ref@test.com")
            .is_err());
    }
}
