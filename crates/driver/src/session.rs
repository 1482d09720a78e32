//! The `session` module contains the [GameSession], the per-match state machine.

use crate::{
    error::{ProtocolError, Result},
    executor::{BookContent, GameExecutor},
    gprm::GameResult,
    messages::{
        decode, AnswersBatchPayload, MatchMessage, OutboundKind, OutboundMessage,
        RoundStartPayload, ScoreFeedbackPayload, WarmupCallPayload,
    },
    termination::{CompletionReport, TerminationReason, TerminationReport},
    types::{GameId, GamePhase},
};
use chrono::Utc;
use q21_player_strategy::ServiceInfo;
use serde_json::Value;

/// One entry of a session's message history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    /// A message received from the referee.
    Received(MatchMessage),
    /// A message sent to the referee.
    Sent(OutboundKind),
}

/// Identifiers a session is initialized with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    pub match_id: String,
    pub game_id: GameId,
    pub round_number: u32,
    pub season_id: String,
    pub referee_address: String,
}

impl SessionInfo {
    fn service(&self) -> ServiceInfo {
        ServiceInfo {
            match_id: self.match_id.clone(),
            game_id: self.game_id.to_string(),
            season_id: self.season_id.clone(),
            round_number: self.round_number,
        }
    }
}

/// The [GameSession] drives one match through the warmup, questions, guess and score exchanges.
///
/// [GameSession::handle_message] is the only operation that advances the phase. The phase and
/// history are committed only after the strategy capability succeeded, so a failed message can
/// be handed in again.
#[derive(Debug)]
pub struct GameSession {
    info: SessionInfo,
    initialized: bool,
    phase: GamePhase,
    history: Vec<Exchange>,
    result: Option<GameResult>,
    executor: GameExecutor,
}

impl GameSession {
    /// Creates a new, uninitialized [GameSession].
    pub fn new(executor: GameExecutor) -> Self {
        Self {
            info: SessionInfo::default(),
            initialized: false,
            phase: GamePhase::Initialized,
            history: Vec::new(),
            result: None,
            executor,
        }
    }

    /// Initializes the session for a match and resets it to [GamePhase::Initialized].
    ///
    /// ### Takes
    /// - `match_id`, `game_id`, `round_number`, `season_id`: The identifiers of the match.
    /// - `referee_address`: Where replies go when a message carries no sender.
    ///
    /// ### Returns
    /// - `Ok(())`: The session is ready to handle messages.
    /// - `Err(ProtocolError::InvalidIdentifier)`: One of the identifiers was empty. The session
    ///    is left untouched.
    pub fn initialize(
        &mut self,
        match_id: impl Into<String>,
        game_id: GameId,
        round_number: u32,
        season_id: impl Into<String>,
        referee_address: impl Into<String>,
    ) -> Result<()> {
        let info = SessionInfo {
            match_id: match_id.into(),
            game_id,
            round_number,
            season_id: season_id.into(),
            referee_address: referee_address.into(),
        };
        for (field, value) in [
            ("match_id", info.match_id.as_str()),
            ("game_id", info.game_id.as_str()),
            ("season_id", info.season_id.as_str()),
            ("referee_address", info.referee_address.as_str()),
        ] {
            if value.is_empty() {
                return Err(ProtocolError::InvalidIdentifier { field });
            }
        }

        self.info = info;
        self.initialized = true;
        self.phase = GamePhase::Initialized;
        self.history.clear();
        self.result = None;
        Ok(())
    }

    /// Handles one referee message.
    ///
    /// ### Takes
    /// - `message_type`: The match message type.
    /// - `payload`: The message payload.
    /// - `sender`: The address the message came from. Replies are addressed to it, or to the
    ///    referee address when it is empty.
    ///
    /// ### Returns
    /// - `Ok(Some(OutboundMessage))`: The reply to send.
    /// - `Ok(None)`: The message needs no reply (score feedback).
    /// - `Err(ProtocolError)`: The session is uninitialized or closed, the payload was malformed
    ///    or the strategy failed. The phase is unchanged in every case.
    pub fn handle_message(
        &mut self,
        message_type: MatchMessage,
        payload: &Value,
        sender: &str,
    ) -> Result<Option<OutboundMessage>> {
        if !self.initialized {
            return Err(ProtocolError::SessionNotInitialized);
        }
        if self.phase.is_terminal() {
            return Err(ProtocolError::SessionClosed {
                match_id: self.info.match_id.clone(),
                phase: self.phase,
            });
        }

        let span = tracing::info_span!(
            target: "q21-session",
            "game_session",
            match_id = %self.info.match_id,
            game_id = %self.info.game_id
        );
        let _enter = span.enter();

        let service = self.info.service();
        let name = message_type.as_str();
        let (reply, target) = match message_type {
            MatchMessage::WarmupCall => {
                let payload: WarmupCallPayload = decode(name, payload)?;
                let body = self.executor.execute_warmup(&service, &payload)?;
                (Some((OutboundKind::WarmupResponse, body)), GamePhase::WarmupComplete)
            }
            MatchMessage::RoundStart => {
                let payload: RoundStartPayload = decode(name, payload)?;
                self.executor.handle_round_start(&payload);
                let body = self.executor.execute_questions(&service)?;
                (Some((OutboundKind::QuestionsBatch, body)), GamePhase::QuestionsSent)
            }
            MatchMessage::AnswersBatch => {
                let payload: AnswersBatchPayload = decode(name, payload)?;
                self.executor.receive_answers(payload);
                let body = self.executor.execute_guess(&service)?;
                (Some((OutboundKind::GuessSubmission, body)), GamePhase::GuessSubmitted)
            }
            MatchMessage::ScoreFeedback => {
                let payload: ScoreFeedbackPayload = decode(name, payload)?;
                self.result = Some(self.executor.handle_score(&service, payload)?);
                (None, GamePhase::Completed)
            }
        };

        self.history.push(Exchange::Received(message_type));
        if let Some((kind, _)) = &reply {
            self.history.push(Exchange::Sent(*kind));
        }
        let previous = self.phase;
        self.phase = previous.max(target);
        if self.phase != target {
            tracing::debug!(
                target: "q21-session",
                "{} arrived late, phase stays at {}",
                message_type,
                self.phase
            );
        } else {
            tracing::debug!(target: "q21-session", "Phase {} -> {}", previous, self.phase);
        }

        let recipient = if sender.is_empty() {
            self.info.referee_address.as_str()
        } else {
            sender
        };
        Ok(reply.map(|(kind, body)| OutboundMessage::new(kind, body, recipient)))
    }

    /// Takes a snapshot of the session for a forced termination. The phase is not modified.
    pub fn get_termination_report(&self, reason: TerminationReason) -> TerminationReport {
        TerminationReport {
            match_id: self.info.match_id.clone(),
            game_id: self.info.game_id.clone(),
            round_number: self.info.round_number,
            season_id: self.info.season_id.clone(),
            phase_at_termination: self.phase,
            last_actor: self.phase.last_actor(),
            last_message_sent: self.last_message_sent(),
            last_message_received: self.last_message_received(),
            terminated_at: Utc::now(),
            reason,
        }
    }

    /// The completion record, once the session reached [GamePhase::Completed].
    pub fn completion_report(&self) -> Option<CompletionReport> {
        if self.phase != GamePhase::Completed {
            return None;
        }
        self.result.as_ref().map(|result| CompletionReport {
            game_id: self.info.game_id.clone(),
            round_number: self.info.round_number,
            season_id: self.info.season_id.clone(),
            result: result.clone(),
            last_message_sent: self.last_message_sent(),
            last_message_received: self.last_message_received(),
            reported_at: Utc::now(),
        })
    }

    /// Forces the session into [GamePhase::Terminated]. Terminal sessions are left as they are.
    pub fn terminate(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = GamePhase::Terminated;
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn match_id(&self) -> &str {
        &self.info.match_id
    }

    pub fn history(&self) -> &[Exchange] {
        &self.history
    }

    /// The book content received with the round start, if any.
    pub fn book(&self) -> &BookContent {
        self.executor.book()
    }

    /// The result of a completed session.
    pub fn game_result(&self) -> Option<&GameResult> {
        self.result.as_ref()
    }

    pub fn last_message_sent(&self) -> Option<OutboundKind> {
        self.history.iter().rev().find_map(|entry| match entry {
            Exchange::Sent(kind) => Some(*kind),
            Exchange::Received(_) => None,
        })
    }

    pub fn last_message_received(&self) -> Option<MatchMessage> {
        self.history.iter().rev().find_map(|entry| match entry {
            Exchange::Received(kind) => Some(*kind),
            Exchange::Sent(_) => None,
        })
    }
}
