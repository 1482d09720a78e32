use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser};
use q21_player_driver::{
    Driver, DriverConfig, MailboxTransport, ScanDriver, DEFAULT_REPORTER_ROLE,
};
use q21_player_strategy::DemoStrategy;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::Level;

/// Arguments for the `q21-player` binary.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Verbosity level (0-4)
    #[arg(long, short, help = "Verbosity level (0-4)", action = ArgAction::Count, env = "VERBOSITY")]
    v: u8,

    /// The address this player sends and receives protocol messages with.
    #[arg(
        long,
        short = 'e',
        help = "The address this player sends and receives protocol messages with.",
        env = "Q21_PLAYER_EMAIL"
    )]
    player_email: String,

    /// The display name sent with the season registration.
    #[arg(
        long,
        short = 'n',
        help = "The display name sent with the season registration.",
        env = "Q21_PLAYER_NAME"
    )]
    player_name: String,

    /// The league manager's address. Match reports are sent there.
    #[arg(
        long,
        short = 'm',
        help = "The league manager's address. Match reports are sent there.",
        env = "Q21_MANAGER_EMAIL"
    )]
    manager_email: String,

    /// The token stamped on the parameters of every game.
    #[arg(
        long,
        help = "The token stamped on the parameters of every game.",
        env = "Q21_AUTH_TOKEN"
    )]
    auth_token: Option<String>,

    /// The role match reports are signed with.
    #[arg(
        long,
        help = "The role match reports are signed with.",
        default_value = DEFAULT_REPORTER_ROLE
    )]
    reporter_role: String,

    /// The directory inbound messages are read from.
    #[arg(
        long,
        short,
        help = "The directory inbound messages are read from.",
        env = "Q21_INBOX"
    )]
    inbox: PathBuf,

    /// The directory outbound messages are written to.
    #[arg(
        long,
        short,
        help = "The directory outbound messages are written to.",
        env = "Q21_OUTBOX"
    )]
    outbox: PathBuf,

    /// Keep polling the inbox until interrupted.
    #[arg(long, short, help = "Keep polling the inbox until interrupted.")]
    watch: bool,

    /// Seconds between two scans in watch mode.
    #[arg(long, help = "Seconds between two scans in watch mode.", default_value_t = 30)]
    poll_interval: u64,

    /// Maximum number of messages handled per scan.
    #[arg(long, help = "Maximum number of messages handled per scan.", default_value_t = 20)]
    max_messages: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse the command arguments
    let Args {
        v,
        player_email,
        player_name,
        manager_email,
        auth_token,
        reporter_role,
        inbox,
        outbox,
        watch,
        poll_interval,
        max_messages,
    } = Args::parse();

    // Initialize the tracing subscriber
    init_tracing_subscriber(v)?;

    if watch && poll_interval == 0 {
        return Err(anyhow!("--poll-interval must be at least one second"));
    }

    // Create the driver config.
    let mut driver_config = DriverConfig::new(player_email, player_name, manager_email);
    driver_config.auth_token = auth_token;
    driver_config.reporter_role = reporter_role;
    driver_config.max_messages = max_messages;
    driver_config.poll_interval = watch.then(|| Duration::from_secs(poll_interval));
    tracing::info!(target: "q21-cli", "Driver config created successfully.");

    // Create the driver on top of the mailbox directories.
    let transport = MailboxTransport::new(inbox, outbox);
    tracing::debug!(
        target: "q21-cli",
        "Mailbox ready, inbox @ {}, outbox @ {}",
        transport.inbox().display(),
        transport.outbox().display()
    );
    let driver = ScanDriver::with_strategy(driver_config, transport, Arc::new(DemoStrategy));
    tracing::info!(target: "q21-cli", "Driver created successfully for {}", &driver.config.player_email);

    // Start the driver loop.
    driver.start_loop().await?;

    Ok(())
}

/// Initializes the tracing subscriber
///
/// # Arguments
/// * `verbosity_level` - The verbosity level (0-4)
///
/// # Returns
/// * `Result<()>` - Ok if successful, Err otherwise.
fn init_tracing_subscriber(verbosity_level: u8) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(match verbosity_level {
            0 => Level::ERROR,
            1 => Level::WARN,
            2 => Level::INFO,
            3 => Level::DEBUG,
            _ => Level::TRACE,
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber).map_err(|e| anyhow!(e))
}
