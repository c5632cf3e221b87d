//! studydash - collaborative study sessions from the terminal
//!
#![doc = "studydash - collaborative study sessions from the terminal"]
#![doc = "Main entry point for the studydash application."]

use anyhow::Result;

use studydash::cli::{AuthCommand, Cli, Commands, SessionCommand, TimerCommand};
use studydash::commands;
use studydash::config::Config;
use studydash::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // `timer format` is pure and runs without configuration
    if let Commands::Timer {
        command: TimerCommand::Format { seconds },
    } = &cli.command
    {
        commands::timer::print_formatted(*seconds);
        return Ok(());
    }

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    init_logging(&config.logging)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Sessions { command } => match command {
            SessionCommand::List { json } => {
                tracing::info!("Listing study sessions");
                commands::sessions::list_sessions(&config, json).await
            }
            SessionCommand::Create { title, duration } => {
                tracing::info!("Creating study session");
                commands::sessions::create_session(&config, &title, &duration).await
            }
            SessionCommand::Join { session_id } => {
                tracing::info!(%session_id, "Joining study session");
                commands::sessions::join_session(&config, session_id).await
            }
        },
        Commands::Watch => {
            tracing::info!("Starting live dashboard");
            commands::watch::run_watch(config).await
        }
        Commands::Timer { command } => match command {
            TimerCommand::Run => commands::timer::run_timer().await,
            TimerCommand::Format { seconds } => {
                commands::timer::print_formatted(seconds);
                Ok(())
            }
        },
        Commands::Auth { command } => match command {
            AuthCommand::Login { email, password } => {
                commands::auth::login(config, email, password).await
            }
            AuthCommand::Logout => commands::auth::logout(config).await,
            AuthCommand::Status => commands::auth::status(config).await,
        },
    }
}
