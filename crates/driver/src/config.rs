//! The `config` module contains the [DriverConfig].

use crate::termination::Reporter;
use std::time::Duration;

/// Default number of messages handled per scan.
pub const DEFAULT_MAX_MESSAGES: usize = 20;

/// Role stamped on match reports unless configured otherwise.
pub const DEFAULT_REPORTER_ROLE: &str = "PLAYER";

/// The [DriverConfig] struct contains the configuration for the [Driver](crate::Driver)
/// implementations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// This player's address. Signs outbound subjects and identifies the player in league
    /// messages.
    pub player_email: String,
    /// This player's display name, sent with the season registration.
    pub player_name: String,
    /// The league manager's address. Match reports are sent there.
    pub manager_email: String,
    /// Token stamped on the parameters of every game.
    pub auth_token: Option<String>,
    /// Role this player reports match results under.
    pub reporter_role: String,
    /// Maximum number of messages handled per scan.
    pub max_messages: usize,
    /// When set, the driver keeps scanning at this interval until interrupted.
    pub poll_interval: Option<Duration>,
}

impl DriverConfig {
    /// Creates a new [DriverConfig] that scans once, with default limits.
    pub fn new(
        player_email: impl Into<String>,
        player_name: impl Into<String>,
        manager_email: impl Into<String>,
    ) -> Self {
        Self {
            player_email: player_email.into(),
            player_name: player_name.into(),
            manager_email: manager_email.into(),
            auth_token: None,
            reporter_role: DEFAULT_REPORTER_ROLE.to_string(),
            max_messages: DEFAULT_MAX_MESSAGES,
            poll_interval: None,
        }
    }

    /// The identity match reports are signed with.
    pub fn reporter(&self) -> Reporter {
        Reporter::new(self.player_email.as_str(), self.reporter_role.as_str())
    }
}
