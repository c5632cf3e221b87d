//! studydash - collaborative study session dashboard library
//!
//! This library provides the core functionality for studydash: a live list
//! of study sessions with participant counts, joining and creating sessions,
//! and a study stopwatch.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `backend`: Table store abstraction, REST/SSE client and in-memory store
//! - `auth`: Auth provider abstraction, REST client and keyring persistence
//! - `sessions`: Session records and the list synchronizer
//! - `dashboard`: Mount/refresh/join/create controller with notifications
//! - `timer`: Stopwatch and elapsed-time formatting
//! - `notify`: User-facing notifications
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use studydash::commands::connect;
//! use studydash::dashboard::{Dashboard, MountOutcome};
//! use studydash::notify::ConsoleNotifier;
//! use studydash::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let connection = connect(&config).await?;
//!     let outcome =
//!         Dashboard::mount(connection.backend, connection.auth, Arc::new(ConsoleNotifier)).await?;
//!     if let MountOutcome::Mounted(dashboard) = outcome {
//!         println!("{} sessions", dashboard.stats().total_sessions);
//!         dashboard.teardown().await;
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod backend;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod notify;
pub mod sessions;
pub mod timer;

// Re-export commonly used types
pub use config::Config;
pub use dashboard::{Dashboard, JoinOutcome, MountOutcome, MountedDashboard};
pub use error::{BackendError, Result, StudyError};
pub use sessions::{SessionSynchronizer, StudySession, Subscription};
pub use timer::{format_elapsed, Stopwatch};

#[cfg(test)]
pub mod test_utils;
