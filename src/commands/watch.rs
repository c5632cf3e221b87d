//! Live dashboard command
//!
//! Mounts the dashboard, redraws after every change to the sessions table,
//! and exits on Ctrl-C, sign-out, or when the change feed ends. The
//! subscription is released on every exit path.

use std::sync::Arc;

use colored::Colorize;
use tokio::sync::broadcast::error::RecvError;

use crate::auth::{AuthEvent, AuthProvider};
use crate::commands::sessions::output_sessions_table;
use crate::commands::{connect, print_sign_in_hint};
use crate::config::Config;
use crate::dashboard::{Dashboard, MountOutcome, MountedDashboard};
use crate::error::{Result, StudyError};
use crate::notify::ConsoleNotifier;

fn render(dashboard: &MountedDashboard) {
    output_sessions_table(&dashboard.sessions());
    println!(
        "{} {}   {}",
        "Your stats:".bold(),
        format!("{} sessions", dashboard.stats().total_sessions).cyan(),
        "(Ctrl-C to quit)".dimmed()
    );
}

/// Run the live dashboard until interrupted
pub async fn run_watch(config: Config) -> Result<()> {
    let connection = connect(&config).await?;
    let mut auth_events = connection.auth.on_auth_state_change();

    println!("Loading study sessions...");
    let outcome = Dashboard::mount(
        connection.backend,
        connection.auth,
        Arc::new(ConsoleNotifier),
    )
    .await?;
    let MountOutcome::Mounted(mut dashboard) = outcome else {
        print_sign_in_hint();
        return Err(StudyError::Unauthenticated.into());
    };

    render(&dashboard);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, leaving dashboard");
                break;
            }
            event = auth_events.recv() => match event {
                Ok(AuthEvent::SignedOut) => {
                    println!("Signed out.");
                    break;
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            change = dashboard.next_change() => match change {
                Some(event) => {
                    tracing::debug!(table = %event.table, kind = %event.kind, "Session change");
                    if dashboard.refresh().await {
                        render(&dashboard);
                    }
                }
                None => {
                    tracing::warn!("Change feed ended");
                    eprintln!("Live updates stopped.");
                    break;
                }
            },
        }
    }

    dashboard.teardown().await;
    Ok(())
}
