//! Command-line interface definition for studydash
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for browsing and joining study sessions, the live
//! dashboard, the stopwatch, and authentication.

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// studydash - collaborative study sessions from the terminal
///
/// Browse, create and join study sessions, watch the list update live,
/// and time your study blocks.
#[derive(Parser, Debug, Clone)]
#[command(name = "studydash")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for studydash
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List, create and join study sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Live dashboard: reloads on every change until Ctrl-C or sign-out
    Watch,

    /// Study stopwatch
    Timer {
        #[command(subcommand)]
        command: TimerCommand,
    },

    /// Sign in, sign out, or show the current user
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
}

/// Session subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// List all sessions with participant counts
    List {
        /// Output as JSON instead of a table
        #[arg(short, long)]
        json: bool,
    },

    /// Create a new session
    Create {
        /// Session title
        #[arg(short, long)]
        title: String,

        /// Planned length, e.g. "2 hours"
        #[arg(short, long, default_value = "")]
        duration: String,
    },

    /// Join a session as the signed-in user
    Join {
        /// Session id
        session_id: Uuid,
    },
}

/// Stopwatch subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum TimerCommand {
    /// Interactive stopwatch (start, pause, toggle, reset, status, quit)
    Run,

    /// Print a number of seconds as HH:MM:SS
    Format {
        /// Elapsed seconds
        seconds: u64,
    },
}

/// Authentication subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum AuthCommand {
    /// Sign in with email and password
    Login {
        /// Account email (prompted when omitted)
        #[arg(short, long)]
        email: Option<String>,

        /// Account password (prompted when omitted)
        #[arg(short, long, env = "STUDYDASH_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in user
    Status,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            command: Commands::Auth {
                command: AuthCommand::Status,
            },
        }
    }
}
