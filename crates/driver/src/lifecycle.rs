//! The `lifecycle` module contains the [RoundLifecycleManager], the single owner of the sessions
//! of the current round.

use crate::{
    error::Result,
    executor::GameExecutor,
    gprm::{Assignment, Gprm, GprmBuilder},
    messages::{match_id_of, MatchMessage, OutboundMessage},
    session::GameSession,
    termination::{MatchReport, TerminationReason, TerminationReport},
    types::GamePhase,
};
use q21_player_strategy::Strategy;
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};

/// The outcome of a round transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundTransition {
    /// Parameters of every session created for the new round.
    pub started: Vec<Gprm>,
    /// Reports for the sessions of the previous round that had not finished.
    pub terminated: Vec<TerminationReport>,
}

/// The outcome of routing one match message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    /// The reply for the referee, if the message demands one.
    pub response: Option<OutboundMessage>,
    /// Reports for the league manager. Holds the completion report when the message finished
    /// its session.
    pub reports: Vec<MatchReport>,
}

/// The [RoundLifecycleManager] owns the active sessions of the current round, keyed by match id,
/// and performs round transitions. After any [RoundLifecycleManager::start_round] the active set
/// holds the sessions of exactly one round.
pub struct RoundLifecycleManager {
    strategy: Arc<dyn Strategy>,
    season_id: String,
    auth_token: String,
    current_round: u32,
    active: BTreeMap<String, GameSession>,
    assignments: BTreeMap<u32, Vec<Assignment>>,
}

impl RoundLifecycleManager {
    /// Creates a new [RoundLifecycleManager] whose sessions play with `strategy`.
    pub fn new(strategy: Arc<dyn Strategy>) -> Self {
        Self {
            strategy,
            season_id: String::new(),
            auth_token: String::new(),
            current_round: 0,
            active: BTreeMap::new(),
            assignments: BTreeMap::new(),
        }
    }

    pub fn set_season(&mut self, season_id: impl Into<String>) {
        self.season_id = season_id.into();
    }

    pub fn set_auth_token(&mut self, auth_token: impl Into<String>) {
        self.auth_token = auth_token.into();
    }

    pub fn season_id(&self) -> &str {
        &self.season_id
    }

    /// The round started last, or `0` before the first round.
    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    /// Stores the assignments of a round. A later call for the same round replaces them.
    pub fn set_assignments(&mut self, round_number: u32, assignments: Vec<Assignment>) {
        tracing::debug!(
            target: "q21-lifecycle",
            "Stored {} assignments for round {}",
            assignments.len(),
            round_number
        );
        self.assignments.insert(round_number, assignments);
    }

    pub fn has_assignments_for_round(&self, round_number: u32) -> bool {
        self.assignments
            .get(&round_number)
            .map_or(false, |assignments| !assignments.is_empty())
    }

    /// Atomically replaces the current round.
    ///
    /// Every unfinished session of the previous round is reported and terminated, then one
    /// session is created for each stored assignment of `round_number`. Assignments whose
    /// session cannot be initialized are logged and skipped.
    ///
    /// ### Takes
    /// - `round_number`: The round to start.
    ///
    /// ### Returns
    /// - [RoundTransition]: The parameters of the new sessions and the termination reports of
    ///    the old ones.
    pub fn start_round(&mut self, round_number: u32) -> RoundTransition {
        let terminated = self.stop_current_round(TerminationReason::NewRoundStarted);
        self.current_round = round_number;

        let builder = GprmBuilder::new(self.season_id.as_str(), self.auth_token.as_str());
        let mut started = Vec::new();
        for assignment in self.assignments.get(&round_number).into_iter().flatten() {
            if self.active.contains_key(&assignment.match_id) {
                tracing::warn!(
                    target: "q21-lifecycle",
                    "Duplicate assignment for match {} in round {}, skipping",
                    assignment.match_id,
                    round_number
                );
                continue;
            }

            let gprm = builder.build(assignment, round_number);
            let mut session = GameSession::new(GameExecutor::new(Arc::clone(&self.strategy)));
            if let Err(e) = session.initialize(
                gprm.match_id.as_str(),
                gprm.game_id.clone(),
                round_number,
                gprm.season_id.as_str(),
                gprm.referee_address.as_str(),
            ) {
                tracing::warn!(
                    target: "q21-lifecycle",
                    "Skipping assignment {:?} in round {}: {}",
                    assignment.match_id,
                    round_number,
                    e
                );
                continue;
            }

            self.active.insert(gprm.match_id.clone(), session);
            started.push(gprm);
        }

        tracing::info!(
            target: "q21-lifecycle",
            "Round {} started with {} sessions, {} terminated",
            round_number,
            started.len(),
            terminated.len()
        );
        RoundTransition { started, terminated }
    }

    /// Stops the current round. Every session that is neither completed nor terminated yields a
    /// [TerminationReport] and is terminated. The active set is cleared unconditionally.
    pub fn stop_current_round(&mut self, reason: TerminationReason) -> Vec<TerminationReport> {
        let reports: Vec<_> = std::mem::take(&mut self.active)
            .into_values()
            .filter_map(|mut session| Self::terminate_session(&mut session, &reason))
            .collect();

        if !reports.is_empty() {
            tracing::info!(
                target: "q21-lifecycle",
                "Terminated {} unfinished sessions ({})",
                reports.len(),
                reason
            );
        }
        reports
    }

    /// Removes a single session through the same path as a round stop.
    ///
    /// ### Returns
    /// - `Some(TerminationReport)`: The session existed and had not finished.
    /// - `None`: The match is unknown or its session had already finished.
    pub fn terminate_match(
        &mut self,
        match_id: &str,
        reason: TerminationReason,
    ) -> Option<TerminationReport> {
        let mut session = self.active.remove(match_id)?;
        Self::terminate_session(&mut session, &reason)
    }

    /// Routes a match message to the session it addresses.
    ///
    /// Messages for unknown matches and for sessions that already finished are logged and
    /// dropped.
    ///
    /// ### Returns
    /// - `Ok(MatchOutcome)`: The reply and any completion report.
    /// - `Err(ProtocolError)`: The session failed to handle the message. Its phase is unchanged.
    pub fn route_message(
        &mut self,
        message_type: MatchMessage,
        payload: &Value,
        sender: &str,
    ) -> Result<MatchOutcome> {
        let Some(match_id) = match_id_of(payload) else {
            tracing::warn!(
                target: "q21-lifecycle",
                "{} without a match id, dropping",
                message_type
            );
            return Ok(MatchOutcome::default());
        };
        let Some(session) = self.active.get_mut(match_id) else {
            tracing::warn!(
                target: "q21-lifecycle",
                "{} for unknown match {}, possibly stale, dropping",
                message_type,
                match_id
            );
            return Ok(MatchOutcome::default());
        };
        if session.phase().is_terminal() {
            tracing::warn!(
                target: "q21-lifecycle",
                "{} for {} match {}, dropping",
                message_type,
                session.phase(),
                match_id
            );
            return Ok(MatchOutcome::default());
        }

        let response = session.handle_message(message_type, payload, sender)?;
        let reports = session
            .completion_report()
            .map(MatchReport::from)
            .into_iter()
            .collect();
        Ok(MatchOutcome { response, reports })
    }

    pub fn get_session(&self, match_id: &str) -> Option<&GameSession> {
        self.active.get(match_id)
    }

    /// Match ids of the active sessions, in ascending order.
    pub fn active_match_ids(&self) -> Vec<&str> {
        self.active.keys().map(String::as_str).collect()
    }

    /// True when there are no active sessions or every active session finished.
    pub fn is_round_complete(&self) -> bool {
        self.active
            .values()
            .all(|session| session.phase().is_terminal())
    }

    fn terminate_session(
        session: &mut GameSession,
        reason: &TerminationReason,
    ) -> Option<TerminationReport> {
        if matches!(session.phase(), GamePhase::Completed | GamePhase::Terminated) {
            return None;
        }
        let report = session.get_termination_report(reason.clone());
        session.terminate();
        tracing::debug!(
            target: "q21-lifecycle",
            "Terminated match {} in phase {}",
            report.match_id,
            report.phase_at_termination
        );
        Some(report)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        error::ProtocolError,
        messages::OutboundKind,
        types::{GameId, LastActor, PlayerRole},
    };
    use anyhow::anyhow;
    use q21_player_strategy::{
        DemoStrategy, Guess, GuessInput, QuestionSet, QuestionsInput, ScoreInput,
        StrategyContext, WarmupAnswer, WarmupInput,
    };
    use serde_json::json;

    /// Fails every capability.
    struct BrokenStrategy;

    impl Strategy for BrokenStrategy {
        fn warmup_answer(&self, _: &StrategyContext<WarmupInput>) -> anyhow::Result<WarmupAnswer> {
            Err(anyhow!("no answer"))
        }

        fn generate_questions(
            &self,
            _: &StrategyContext<QuestionsInput>,
        ) -> anyhow::Result<QuestionSet> {
            Err(anyhow!("no questions"))
        }

        fn formulate_guess(&self, _: &StrategyContext<GuessInput>) -> anyhow::Result<Guess> {
            Err(anyhow!("no guess"))
        }

        fn on_score_received(&self, _: &StrategyContext<ScoreInput>) -> anyhow::Result<()> {
            Err(anyhow!("no score"))
        }
    }

    fn assignment(game_id: &str) -> Assignment {
        Assignment {
            match_id: game_id.to_string(),
            game_id: GameId::new(game_id),
            round_number: 1,
            referee_address: "ref@test.com".to_string(),
            opponent_address: None,
            role: PlayerRole::Player1,
            group_id: "G1".to_string(),
        }
    }

    fn manager() -> RoundLifecycleManager {
        let mut manager = RoundLifecycleManager::new(Arc::new(DemoStrategy));
        manager.set_season("S01");
        manager.set_auth_token("token");
        manager
    }

    #[test]
    fn start_round_without_assignments_is_empty() {
        let mut manager = manager();
        let transition = manager.start_round(3);
        assert!(transition.started.is_empty());
        assert!(transition.terminated.is_empty());
        assert_eq!(manager.current_round(), 3);
        assert!(manager.is_round_complete());
    }

    #[test]
    fn invalid_and_duplicate_assignments_are_skipped() {
        let mut manager = manager();
        manager.set_assignments(
            1,
            vec![assignment("0101001"), assignment(""), assignment("0101001")],
        );
        let transition = manager.start_round(1);
        assert_eq!(transition.started.len(), 1);
        assert_eq!(transition.started[0].auth_token, "token");
        assert_eq!(manager.active_match_ids(), vec!["0101001"]);
    }

    #[test]
    fn terminate_match_removes_one_session() {
        let mut manager = manager();
        manager.set_assignments(1, vec![assignment("0101001"), assignment("0101002")]);
        manager.start_round(1);

        let report = manager
            .terminate_match("0101001", TerminationReason::from("DEADLINE_MISSED"))
            .unwrap();
        assert_eq!(report.reason.as_str(), "DEADLINE_MISSED");
        assert_eq!(manager.active_match_ids(), vec!["0101002"]);
        assert!(manager
            .terminate_match("0101001", TerminationReason::NewRoundStarted)
            .is_none());
    }

    #[test]
    fn redelivered_score_yields_no_second_report() {
        let mut manager = manager();
        manager.set_assignments(1, vec![assignment("0101001")]);
        manager.start_round(1);

        let score = json!({"match_id": "0101001", "league_points": 10});
        let first = manager
            .route_message(MatchMessage::ScoreFeedback, &score, "ref@test.com")
            .unwrap();
        assert_eq!(first.reports.len(), 1);

        let second = manager
            .route_message(MatchMessage::ScoreFeedback, &score, "ref@test.com")
            .unwrap();
        assert_eq!(second, MatchOutcome::default());
        assert!(manager.is_round_complete());
    }

    fn play_to_completion(manager: &mut RoundLifecycleManager, match_id: &str) -> MatchOutcome {
        let steps = [
            (MatchMessage::WarmupCall, json!({"match_id": match_id, "warmup_question": "2+2"})),
            (
                MatchMessage::RoundStart,
                json!({"match_id": match_id, "book_name": "Dune", "book_hint": "sand"}),
            ),
            (MatchMessage::AnswersBatch, json!({"match_id": match_id, "answers": []})),
        ];
        for (message_type, payload) in steps {
            manager
                .route_message(message_type, &payload, "ref@test.com")
                .unwrap();
        }
        manager
            .route_message(
                MatchMessage::ScoreFeedback,
                &json!({"match_id": match_id, "league_points": 15, "private_score": 0.8}),
                "ref@test.com",
            )
            .unwrap()
    }

    #[test]
    fn completed_sessions_are_not_reported_on_round_stop() {
        let mut manager = manager();
        manager.set_assignments(1, vec![assignment("0101001"), assignment("0101002")]);
        let transition = manager.start_round(1);
        assert_eq!(transition.started.len(), 2);

        let outcome = play_to_completion(&mut manager, "0101001");
        assert_eq!(outcome.reports.len(), 1);
        assert_eq!(outcome.reports[0].match_id(), "0101001");
        assert!(matches!(outcome.reports[0], MatchReport::Completed(_)));
        assert_eq!(
            manager.get_session("0101001").unwrap().phase(),
            GamePhase::Completed
        );
        assert!(!manager.is_round_complete());

        let reports = manager.stop_current_round(TerminationReason::NewRoundStarted);
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.match_id, "0101002");
        assert_eq!(report.phase_at_termination, GamePhase::Initialized);
        assert_eq!(report.last_actor, LastActor::None);
        assert_eq!(report.last_message_sent, None);
        assert!(manager.active_match_ids().is_empty());
    }

    #[test]
    fn new_round_replaces_the_previous_one() {
        let mut manager = manager();
        manager.set_assignments(1, vec![assignment("0101001")]);
        let mut second = assignment("0102001");
        second.round_number = 2;
        manager.set_assignments(2, vec![second]);

        manager.start_round(1);
        let transition = manager.start_round(2);

        assert_eq!(transition.terminated.len(), 1);
        assert_eq!(transition.terminated[0].match_id, "0101001");
        assert_eq!(transition.terminated[0].reason, TerminationReason::NewRoundStarted);
        assert_eq!(transition.started.len(), 1);
        assert_eq!(transition.started[0].round_number, 2);
        assert_eq!(manager.active_match_ids(), vec!["0102001"]);
        assert_eq!(manager.current_round(), 2);
    }

    #[test]
    fn messages_only_touch_their_own_session() {
        let mut manager = manager();
        manager.set_assignments(1, vec![assignment("0101001"), assignment("0101002")]);
        manager.start_round(1);

        manager
            .route_message(
                MatchMessage::RoundStart,
                &json!({"match_id": "0101002", "book_name": "Dune"}),
                "ref@test.com",
            )
            .unwrap();

        let touched = manager.get_session("0101002").unwrap();
        assert_eq!(touched.phase(), GamePhase::QuestionsSent);
        assert_eq!(touched.book().book_name, "Dune");
        let untouched = manager.get_session("0101001").unwrap();
        assert_eq!(untouched.phase(), GamePhase::Initialized);
        assert!(untouched.history().is_empty());
    }

    #[test]
    fn unknown_match_is_dropped() {
        let mut manager = manager();
        manager.set_assignments(1, vec![assignment("0101001")]);
        manager.start_round(1);

        let outcome = manager
            .route_message(
                MatchMessage::WarmupCall,
                &json!({"match_id": "GHOST", "warmup_question": "2+2"}),
                "ref@test.com",
            )
            .unwrap();
        assert_eq!(outcome, MatchOutcome::default());
        assert_eq!(
            manager.get_session("0101001").unwrap().phase(),
            GamePhase::Initialized
        );

        let outcome = manager
            .route_message(MatchMessage::WarmupCall, &json!({}), "ref@test.com")
            .unwrap();
        assert_eq!(outcome, MatchOutcome::default());
    }

    #[test]
    fn termination_after_warmup_names_the_player() {
        let mut manager = manager();
        manager.set_assignments(1, vec![assignment("0101001")]);
        manager.start_round(1);

        let outcome = manager
            .route_message(
                MatchMessage::WarmupCall,
                &json!({"match_id": "0101001", "warmup_question": "2+2"}),
                "ref@test.com",
            )
            .unwrap();
        let response = outcome.response.unwrap();
        assert_eq!(response.message_type, OutboundKind::WarmupResponse);
        assert_eq!(response.recipient, "ref@test.com");

        let reports = manager.stop_current_round(TerminationReason::LeagueCompleted);
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.phase_at_termination, GamePhase::WarmupComplete);
        assert_eq!(report.last_actor, LastActor::Player);
        assert_eq!(report.last_message_sent, Some(OutboundKind::WarmupResponse));
        assert_eq!(report.last_message_received, Some(MatchMessage::WarmupCall));
        assert_eq!(report.season_id, "S01");
        assert_eq!(report.reason, TerminationReason::LeagueCompleted);
    }

    #[test]
    fn failed_strategy_leaves_phase_unchanged() {
        let mut manager = RoundLifecycleManager::new(Arc::new(BrokenStrategy));
        manager.set_season("S01");
        manager.set_assignments(1, vec![assignment("0101001")]);
        manager.start_round(1);

        let err = manager
            .route_message(
                MatchMessage::WarmupCall,
                &json!({"match_id": "0101001", "warmup_question": "2+2"}),
                "ref@test.com",
            )
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Strategy(_)));

        let session = manager.get_session("0101001").unwrap();
        assert_eq!(session.phase(), GamePhase::Initialized);
        assert!(session.history().is_empty());
    }
}
