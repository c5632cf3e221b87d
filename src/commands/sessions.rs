//! Session commands: list, create, join
//!
//! Each command opens a dashboard without a live subscription, performs one
//! action, and reports the outcome through the console notifier.

use std::sync::Arc;

use prettytable::{cell, row, Table};
use uuid::Uuid;

use crate::commands::{connect, print_sign_in_hint};
use crate::config::Config;
use crate::dashboard::{CreateOutcome, Dashboard, JoinOutcome, MountOutcome, MountedDashboard};
use crate::error::{Result, StudyError};
use crate::notify::ConsoleNotifier;
use crate::sessions::StudySession;

async fn open_dashboard(config: &Config) -> Result<MountedDashboard> {
    let connection = connect(config).await?;
    match Dashboard::open(connection.backend, connection.auth, Arc::new(ConsoleNotifier)).await {
        MountOutcome::Mounted(dashboard) => Ok(dashboard),
        MountOutcome::Unauthenticated => {
            print_sign_in_hint();
            Err(StudyError::Unauthenticated.into())
        }
    }
}

/// List sessions as a table, or as JSON with `json`
///
/// # Examples
///
/// ```no_run
/// use studydash::config::Config;
/// use studydash::commands::sessions::list_sessions;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::load("config/config.yaml", &Default::default())?;
/// list_sessions(&config, false).await?;
/// # Ok(())
/// # }
/// ```
pub async fn list_sessions(config: &Config, json: bool) -> Result<()> {
    let dashboard = open_dashboard(config).await?;
    if !dashboard.is_loaded() {
        return Err(StudyError::Fetch("study sessions could not be loaded".to_string()).into());
    }

    let sessions = dashboard.sessions();
    if json {
        let json = serde_json::to_string_pretty(&sessions).map_err(StudyError::Serialization)?;
        println!("{}", json);
    } else {
        output_sessions_table(&sessions);
        println!("Total sessions: {}\n", dashboard.stats().total_sessions);
    }
    Ok(())
}

/// Create a session and print its id
pub async fn create_session(config: &Config, title: &str, duration: &str) -> Result<()> {
    let dashboard = open_dashboard(config).await?;
    match dashboard.create_session(title, duration).await {
        CreateOutcome::Created(session) => {
            println!("{}", session.id);
            Ok(())
        }
        CreateOutcome::Invalid => {
            Err(StudyError::Create("a session title is required".to_string()).into())
        }
        CreateOutcome::Failed => {
            Err(StudyError::Create("the backend rejected the session".to_string()).into())
        }
        CreateOutcome::Unauthenticated => {
            print_sign_in_hint();
            Err(StudyError::Unauthenticated.into())
        }
    }
}

/// Join a session as the signed-in user
///
/// Joining a session twice is reported but is not an error.
pub async fn join_session(config: &Config, session_id: Uuid) -> Result<()> {
    let dashboard = open_dashboard(config).await?;
    match dashboard.join(session_id).await {
        JoinOutcome::Joined | JoinOutcome::AlreadyJoined => Ok(()),
        JoinOutcome::Failed => {
            Err(StudyError::Join(format!("could not join session {}", session_id)).into())
        }
        JoinOutcome::Unauthenticated => {
            print_sign_in_hint();
            Err(StudyError::Unauthenticated.into())
        }
    }
}

/// Render sessions in backend order
pub(crate) fn output_sessions_table(sessions: &[StudySession]) {
    if sessions.is_empty() {
        println!("\nNo study sessions yet.\n");
        return;
    }

    let mut table = Table::new();
    table.add_row(row!["Title", "Duration", "Participants", "Session ID"]);
    for session in sessions {
        let duration = if session.duration.is_empty() {
            "-"
        } else {
            session.duration.as_str()
        };
        table.add_row(row![
            session.title,
            duration,
            session.participant_count,
            session.id
        ]);
    }

    println!("\nStudy sessions:\n");
    table.printstd();
    println!();
}
