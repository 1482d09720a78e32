//! The `drivers` module contains implementations of the [Driver] trait.

use crate::{
    handlers,
    log::{self, season_number, LogContext},
    messages::LeagueMessage,
    router::MessageRouter,
    transport::{parse_message, InboundEnvelope, ParsedMessage, Transport},
    Driver, DriverConfig, ProtocolError, SessionController,
};
use anyhow::Result;
use async_trait::async_trait;
use q21_player_strategy::Strategy;
use serde_json::Value;
use std::sync::Arc;

/// Statistics of a single scan pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Messages fetched from the transport.
    pub found: usize,
    /// Messages routed and acknowledged.
    pub processed: usize,
    /// Messages without a protocol subject. They are acknowledged without routing.
    pub skipped: usize,
    /// Messages sent in reply.
    pub sent: usize,
    /// One entry per message that failed.
    pub errors: Vec<String>,
}

/// The [ScanDriver] polls a [Transport], routes every protocol message through the
/// [MessageRouter] and sends back whatever the routing produced.
pub struct ScanDriver<T> {
    /// The configuration of the driver.
    pub config: DriverConfig,
    transport: T,
    router: MessageRouter,
}

impl<T: Transport> ScanDriver<T> {
    /// Creates a new [ScanDriver] in front of an existing router.
    pub fn new(config: DriverConfig, transport: T, router: MessageRouter) -> Self {
        Self {
            config,
            transport,
            router,
        }
    }

    /// Creates a new [ScanDriver] whose sessions play with `strategy`.
    pub fn with_strategy(config: DriverConfig, transport: T, strategy: Arc<dyn Strategy>) -> Self {
        let mut controller = SessionController::new(
            config.player_email.as_str(),
            config.player_name.as_str(),
            strategy,
        );
        if let Some(token) = &config.auth_token {
            controller.set_auth_token(token.as_str());
        }
        Self::new(config, transport, MessageRouter::new(controller))
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Handles up to `max_messages` pending messages, oldest first.
    ///
    /// Failures never abort the scan. A message whose strategy call failed stays
    /// unacknowledged so the next scan retries it; any other failure is logged as a rejection
    /// and the message is acknowledged.
    pub async fn scan_once(&mut self) -> ScanStats {
        let mut stats = ScanStats::default();

        let envelopes = match self.transport.fetch(self.config.max_messages).await {
            Ok(envelopes) => envelopes,
            Err(e) => {
                tracing::error!(target: "q21-scan-driver", "Failed to fetch messages: {:#}", e);
                stats.errors.push(e.to_string());
                return stats;
            }
        };
        stats.found = envelopes.len();

        for envelope in envelopes {
            let id = envelope.id.clone();
            if let Err(e) = self.process(envelope, &mut stats).await {
                tracing::error!(target: "q21-scan-driver", "Failed to process {}: {:#}", id, e);
                stats.errors.push(format!("{id}: {e}"));
            }
        }

        tracing::info!(
            target: "q21-scan-driver",
            "Scan done: {} found, {} processed, {} skipped, {} sent, {} errors",
            stats.found,
            stats.processed,
            stats.skipped,
            stats.sent,
            stats.errors.len()
        );
        stats
    }

    async fn process(&mut self, envelope: InboundEnvelope, stats: &mut ScanStats) -> Result<()> {
        let InboundEnvelope { id, subject, body } = envelope;
        let Some(parsed) = parse_message(&subject, &body) else {
            tracing::debug!(target: "q21-scan-driver", "Skipping non-protocol message {}: {:?}", id, subject);
            stats.skipped += 1;
            return self.transport.acknowledge(&id).await;
        };

        let ctx = self.log_context(&parsed);
        log::log_received(&ctx, &parsed.message_type, &parsed.sender, parsed.deadline.as_deref());

        let result = match self
            .router
            .route(&parsed.message_type, &parsed.payload, &parsed.sender)
        {
            Ok(result) => result,
            Err(ProtocolError::Strategy(e)) => {
                log::log_rejected(&parsed.message_type, &parsed.sender, &format!("{e:#}"));
                return Err(e.context(format!("{} left for retry", parsed.message_type)));
            }
            Err(e) => {
                log::log_rejected(&parsed.message_type, &parsed.sender, &e.to_string());
                self.transport.acknowledge(&id).await?;
                return Err(e.into());
            }
        };

        if result.handled {
            stats.sent +=
                handlers::send_routing_result(&mut self.transport, &self.config, &ctx, result).await;
        } else {
            tracing::debug!(target: "q21-scan-driver", "Unhandled message type {}", parsed.message_type);
        }

        self.transport.acknowledge(&id).await?;
        stats.processed += 1;
        Ok(())
    }

    /// Builds the log context of a message: season traffic, a round broadcast or match traffic.
    fn log_context(&self, parsed: &ParsedMessage) -> LogContext {
        let controller = self.router.controller();
        let season = parsed
            .payload
            .get("season_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(controller.season_id());

        match parsed.message_type.parse::<LeagueMessage>() {
            Ok(LeagueMessage::NewLeagueRound) => {
                let round_number = parsed
                    .payload
                    .get("round_number")
                    .and_then(Value::as_u64)
                    .and_then(|n| u32::try_from(n).ok())
                    .unwrap_or(1);
                LogContext::round(
                    season_number(season),
                    round_number,
                    controller.lifecycle().has_assignments_for_round(round_number),
                )
            }
            Ok(_) => LogContext::season(season_number(season)),
            Err(_) if parsed.message_type.starts_with("Q21") => LogContext::game(&parsed.game_id),
            Err(_) => LogContext::default(),
        }
    }
}

#[async_trait]
impl<T: Transport> Driver for ScanDriver<T> {
    /// Runs one scan, or keeps scanning every `poll_interval` until Ctrl-C when the interval is
    /// set.
    async fn start_loop(mut self) -> Result<()> {
        let Some(poll_interval) = self.config.poll_interval else {
            self.scan_once().await;
            return Ok(());
        };

        tracing::info!(
            target: "q21-scan-driver",
            "Polling every {}s. Ctrl-C to stop.",
            poll_interval.as_secs()
        );
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    tracing::info!(target: "q21-scan-driver", "Interrupted, stopping.");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.scan_once().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::OutboundEnvelope;
    use anyhow::anyhow;
    use q21_player_strategy::{
        DemoStrategy, Guess, GuessInput, QuestionSet, QuestionsInput, ScoreInput,
        StrategyContext, WarmupAnswer, WarmupInput,
    };
    use serde_json::json;
    use std::collections::VecDeque;

    const ME: &str = "me@test.com";
    const MANAGER: &str = "lm@test.com";
    const REFEREE: &str = "ref@test.com";

    /// Keeps messages in memory. Unacknowledged messages are fetched again.
    #[derive(Default)]
    struct MemoryTransport {
        inbox: VecDeque<InboundEnvelope>,
        acknowledged: Vec<String>,
        sent: Vec<OutboundEnvelope>,
    }

    impl MemoryTransport {
        fn push(&mut self, subject: &str, body: Value) {
            let id = format!("m{}", self.inbox.len() + self.acknowledged.len());
            self.inbox.push_back(InboundEnvelope {
                id,
                subject: subject.to_string(),
                body,
            });
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn fetch(&mut self, max: usize) -> Result<Vec<InboundEnvelope>> {
            Ok(self.inbox.iter().take(max).cloned().collect())
        }

        async fn acknowledge(&mut self, id: &str) -> Result<()> {
            self.inbox.retain(|envelope| envelope.id != id);
            self.acknowledged.push(id.to_string());
            Ok(())
        }

        async fn send(&mut self, envelope: OutboundEnvelope) -> Result<()> {
            self.sent.push(envelope);
            Ok(())
        }
    }

    /// Answers the warmup only once `healthy` is set.
    struct FlakyStrategy {
        healthy: std::sync::atomic::AtomicBool,
    }

    impl Strategy for FlakyStrategy {
        fn warmup_answer(&self, ctx: &StrategyContext<WarmupInput>) -> Result<WarmupAnswer> {
            if self.healthy.load(std::sync::atomic::Ordering::SeqCst) {
                DemoStrategy.warmup_answer(ctx)
            } else {
                Err(anyhow!("strategy unavailable"))
            }
        }

        fn generate_questions(&self, ctx: &StrategyContext<QuestionsInput>) -> Result<QuestionSet> {
            DemoStrategy.generate_questions(ctx)
        }

        fn formulate_guess(&self, ctx: &StrategyContext<GuessInput>) -> Result<Guess> {
            DemoStrategy.formulate_guess(ctx)
        }

        fn on_score_received(&self, ctx: &StrategyContext<ScoreInput>) -> Result<()> {
            DemoStrategy.on_score_received(ctx)
        }
    }

    fn league_subject(message_type: &str) -> String {
        format!("league.v2::LEAGUEMANAGER::{MANAGER}::tx::{message_type}")
    }

    fn match_subject(message_type: &str) -> String {
        format!("Q21G.v1::REFEREE::{REFEREE}::tx::{message_type}")
    }

    fn seeded_transport() -> MemoryTransport {
        let mut transport = MemoryTransport::default();
        transport.push(
            &league_subject("BROADCAST_ASSIGNMENT_TABLE"),
            json!({"payload": {
                "season_id": "S01",
                "assignments": [
                    {"role": "player1", "email": ME, "game_id": "0101001"},
                    {"role": "referee", "email": REFEREE, "game_id": "0101001"}
                ]
            }}),
        );
        transport.push(
            &league_subject("BROADCAST_NEW_LEAGUE_ROUND"),
            json!({"payload": {"round_number": 1}}),
        );
        transport
    }

    fn driver(transport: MemoryTransport, strategy: Arc<dyn Strategy>) -> ScanDriver<MemoryTransport> {
        let mut config = DriverConfig::new(ME, "Tester", MANAGER);
        config.auth_token = Some("token".to_string());
        ScanDriver::with_strategy(config, transport, strategy)
    }

    #[tokio::test]
    async fn scan_routes_replies_and_acknowledges() {
        let mut transport = seeded_transport();
        transport.push("Lunch on Friday?", json!({}));
        transport.push(
            &match_subject("Q21_WARMUP_CALL"),
            json!({"payload": {"match_id": "0101001", "warmup_question": "2+2"}}),
        );
        let mut driver = driver(transport, Arc::new(DemoStrategy));

        let stats = driver.scan_once().await;
        assert_eq!(stats.found, 4);
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.sent, 2);
        assert!(stats.errors.is_empty());

        let transport = driver.transport();
        assert!(transport.inbox.is_empty());
        assert_eq!(transport.acknowledged.len(), 4);

        let assignment_ack = &transport.sent[0];
        assert_eq!(assignment_ack.recipient, MANAGER);
        assert!(assignment_ack.subject.starts_with("league.v2::PLAYER::me@test.com::"));
        assert!(assignment_ack.subject.ends_with("::GROUP_ASSIGNMENT_RESPONSE"));

        let warmup = &transport.sent[1];
        assert_eq!(warmup.recipient, REFEREE);
        assert!(warmup.subject.ends_with("::Q21WARMUPRESPONSE"));
        assert_eq!(warmup.payload["match_id"], "0101001");
    }

    #[tokio::test]
    async fn round_change_reports_to_the_manager() {
        let mut transport = seeded_transport();
        transport.push(
            &league_subject("BROADCAST_NEW_LEAGUE_ROUND"),
            json!({"payload": {"round_number": 2}}),
        );
        let mut driver = driver(transport, Arc::new(DemoStrategy));

        let stats = driver.scan_once().await;
        assert_eq!(stats.processed, 3);

        let report = driver
            .transport()
            .sent
            .iter()
            .find(|envelope| envelope.subject.ends_with("::MATCH_RESULT_REPORT"))
            .unwrap();
        assert_eq!(report.recipient, MANAGER);
        assert_eq!(report.payload["match_id"], "0101001");
        assert_eq!(report.payload["status"], "TERMINATED");
        assert_eq!(report.payload["reason"], "NEW_ROUND_STARTED");
        assert_eq!(report.payload["reporter"]["email"], ME);
        assert!(driver.router().controller().lifecycle().active_match_ids().is_empty());
    }

    #[tokio::test]
    async fn strategy_failures_are_retried_on_the_next_scan() {
        let mut transport = seeded_transport();
        transport.push(
            &match_subject("Q21WARMUPCALL"),
            json!({"payload": {"match_id": "0101001", "warmup_question": "2+2"}}),
        );
        let strategy = Arc::new(FlakyStrategy {
            healthy: std::sync::atomic::AtomicBool::new(false),
        });
        let mut driver = driver(transport, strategy.clone());

        let stats = driver.scan_once().await;
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.errors.len(), 1);
        assert_eq!(driver.transport().inbox.len(), 1);

        strategy
            .healthy
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let stats = driver.scan_once().await;
        assert_eq!(stats.found, 1);
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.sent, 1);
        assert!(stats.errors.is_empty());
        assert!(driver.transport().inbox.is_empty());
    }

    #[tokio::test]
    async fn rejected_messages_are_acknowledged() {
        let mut transport = MemoryTransport::default();
        transport.push(&league_subject("BROADCAST_NEW_LEAGUE_ROUND"), json!({"payload": {}}));
        transport.push(&league_subject("BROADCAST_KEEP_ALIVE"), json!({}));
        let mut driver = driver(transport, Arc::new(DemoStrategy));

        let stats = driver.scan_once().await;
        assert_eq!(stats.found, 2);
        assert_eq!(stats.processed, 0);
        assert_eq!(stats.errors.len(), 2);
        assert!(driver.transport().inbox.is_empty());
        assert!(driver.transport().sent.is_empty());
    }
}
