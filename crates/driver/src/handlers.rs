//! Sends everything a routed message produced: the immediate response to its recipient and every
//! match report to the league manager.

use crate::{
    log::{self, LogContext},
    messages::{OutboundKind, OutboundMessage},
    router::RoutingResult,
    transport::{build_subject, OutboundEnvelope, Transport},
    DriverConfig,
};

/// Sends the response and the reports of `result`.
///
/// A failed send is logged and does not stop the remaining sends.
///
/// ### Takes
/// - `transport`: Where the messages go.
/// - `config`: Provides the player address for subjects, the league manager address and the
///    reporter identity.
/// - `ctx`: Log context of the message that produced `result`.
/// - `result`: The routing outcome.
///
/// ### Returns
/// - The number of messages sent.
pub async fn send_routing_result<T: Transport + ?Sized>(
    transport: &mut T,
    config: &DriverConfig,
    ctx: &LogContext,
    result: RoutingResult,
) -> usize {
    let mut sent = 0;

    if let Some(response) = result.response {
        if send(transport, config, ctx, response).await {
            sent += 1;
        }
    }

    let reporter = config.reporter();
    for report in result.reports {
        let message = OutboundMessage::new(
            OutboundKind::MatchResultReport,
            report.to_protocol_message(&reporter),
            config.manager_email.as_str(),
        );
        if send(transport, config, &LogContext::game(report.match_id()), message).await {
            sent += 1;
        }
    }

    sent
}

async fn send<T: Transport + ?Sized>(
    transport: &mut T,
    config: &DriverConfig,
    ctx: &LogContext,
    message: OutboundMessage,
) -> bool {
    let message_type = message.message_type.as_str();
    let recipient = message.recipient.clone();
    let envelope = OutboundEnvelope {
        subject: build_subject(&config.player_email, message_type),
        recipient: message.recipient,
        payload: message.payload,
    };

    match transport.send(envelope).await {
        Ok(()) => {
            log::log_sent(ctx, message_type, &recipient);
            true
        }
        Err(e) => {
            // Soft failure, log the error and continue.
            tracing::error!(target: "q21-scan-driver", "Failed to send {} to {}: {:#}", message_type, recipient, e);
            false
        }
    }
}
