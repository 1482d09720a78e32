#![doc = include_str!("../README.md")]

use anyhow::Result;
use async_trait::async_trait;

/// Contains the [ProtocolError] type.
mod error;
pub use error::ProtocolError;

/// Contains the phase, role, game id and message family types.
mod types;
pub use types::*;

/// Contains the inbound and outbound message types and their payloads.
mod messages;
pub use messages::*;

/// Contains the game parameters and results.
mod gprm;
pub use gprm::*;

/// Contains the termination and completion reports.
mod termination;
pub use termination::*;

/// Contains the adapter between sessions and the strategy.
mod executor;
pub use executor::{BookContent, GameExecutor};

/// Contains the per-match state machine.
mod session;
pub use session::{Exchange, GameSession, SessionInfo};

/// Contains the owner of the current round's sessions.
mod lifecycle;
pub use lifecycle::{MatchOutcome, RoundLifecycleManager, RoundTransition};

/// Contains the translation of league broadcasts.
mod league;
pub use league::{AssignmentTable, LeagueHandler, SeasonStart, SeasonSummary};

/// Contains the entry point for both message families.
mod controller;
pub use controller::{LeagueOutcome, SessionController};

/// Contains the top-level message dispatch.
mod router;
pub use router::{MessageRouter, RoutingResult};

/// Contains the protocol log line helpers.
pub mod log;

/// Contains the transport boundary and the subject line format.
pub mod transport;
pub use transport::{InboundEnvelope, OutboundEnvelope, Transport};

/// Contains the directory-backed transport.
mod mailbox;
pub use mailbox::MailboxTransport;

/// Contains the configuration of the drivers.
mod config;
pub use config::*;

/// Contains the sending of routing results.
mod handlers;

/// Contains the implementations of the [Driver] trait.
mod drivers;
pub use drivers::{ScanDriver, ScanStats};

/// The [Driver] trait defines the interface for all driver loops that are ran by the `q21-player`
/// binary.
#[async_trait]
pub trait Driver {
    /// Starts the [Driver] loop.
    async fn start_loop(self) -> Result<()>;
}
