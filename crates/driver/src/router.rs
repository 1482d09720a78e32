//! The `router` module contains the [MessageRouter], the top-level dispatch of inbound messages.

use crate::{
    controller::SessionController,
    error::Result,
    gprm::Gprm,
    messages::OutboundMessage,
    termination::MatchReport,
    types::MessageFamily,
};
use serde_json::Value;

/// The outcome of routing one inbound message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingResult {
    /// The immediate reply, if any.
    pub response: Option<OutboundMessage>,
    /// Parameters of the sessions started by the message.
    pub games_to_run: Vec<Gprm>,
    /// False when the message type matches neither family.
    pub handled: bool,
    /// Reports for the league manager: terminations caused by the message and the completion
    /// of the session it finished.
    pub reports: Vec<MatchReport>,
}

/// Classifies inbound messages by family and forwards them to the [SessionController].
pub struct MessageRouter {
    controller: SessionController,
}

impl MessageRouter {
    /// Creates a new [MessageRouter] in front of `controller`.
    pub fn new(controller: SessionController) -> Self {
        Self { controller }
    }

    /// Routes one inbound message.
    ///
    /// ### Returns
    /// - `Ok(RoutingResult)`: With `handled = false` when the message type matches no family.
    /// - `Err(ProtocolError)`: The message was classified but could not be handled.
    pub fn route(
        &mut self,
        message_type: &str,
        payload: &Value,
        sender: &str,
    ) -> Result<RoutingResult> {
        let Some(family) = MessageFamily::classify(message_type) else {
            tracing::debug!(target: "q21-router", "Unclassified message type {:?}", message_type);
            return Ok(RoutingResult::default());
        };

        let result = match family {
            MessageFamily::League => {
                let outcome = self
                    .controller
                    .process_league_message(message_type, payload, sender)?;
                RoutingResult {
                    response: outcome.response,
                    games_to_run: outcome.started,
                    handled: true,
                    reports: outcome
                        .terminated
                        .into_iter()
                        .map(MatchReport::from)
                        .collect(),
                }
            }
            MessageFamily::Match => {
                let outcome = self
                    .controller
                    .process_match_message(message_type, payload, sender)?;
                RoutingResult {
                    response: outcome.response,
                    games_to_run: Vec::new(),
                    handled: true,
                    reports: outcome.reports,
                }
            }
        };
        Ok(result)
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut SessionController {
        &mut self.controller
    }
}
