//! Auth commands: login, logout, status

use colored::Colorize;
use dialoguer::Password;
use rustyline::DefaultEditor;

use crate::auth::AuthProvider;
use crate::commands::connect;
use crate::config::Config;
use crate::error::{Result, StudyError};

fn required(label: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StudyError::Authentication(format!("{} cannot be empty", label)).into());
    }
    Ok(value.to_string())
}

fn prompt(rl: &mut DefaultEditor, label: &str) -> Result<String> {
    let value = rl.readline(&format!("{}: ", label))?;
    required(label, &value)
}

/// Read the password without echoing it. Fails when stdin is not a terminal.
fn prompt_password() -> Result<String> {
    let value = Password::new()
        .with_prompt("Password")
        .interact()
        .map_err(|e| {
            StudyError::Authentication(format!(
                "cannot prompt for a password ({}); pass --password or set STUDYDASH_PASSWORD",
                e
            ))
        })?;
    required("Password", &value)
}

/// Sign in with email and password, prompting for whichever is missing
///
/// The session is kept in the OS keyring when `auth.persist_session` is set.
pub async fn login(config: Config, email: Option<String>, password: Option<String>) -> Result<()> {
    let connection = connect(&config).await?;

    let (email, password) = match (email, password) {
        (Some(email), Some(password)) => (email, password),
        (email, password) => {
            let email = match email {
                Some(email) => email,
                None => prompt(&mut DefaultEditor::new()?, "Email")?,
            };
            let password = match password {
                Some(password) => password,
                None => prompt_password()?,
            };
            (email, password)
        }
    };

    match connection.auth.sign_in(&email, &password).await {
        Ok(session) => {
            let who = session.user.email.unwrap_or_else(|| session.user.id.to_string());
            println!("{} {}", "Signed in as".green().bold(), who);
            if !config.auth.persist_session {
                println!("Session persistence is off; this login lasts for this command only.");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "Sign in failed:".red().bold(), e);
            Err(StudyError::Authentication(e.to_string()).into())
        }
    }
}

/// Sign out and forget the stored session
pub async fn logout(config: Config) -> Result<()> {
    let connection = connect(&config).await?;
    connection
        .auth
        .sign_out()
        .await
        .map_err(|e| StudyError::Authentication(e.to_string()))?;
    println!("Signed out.");
    Ok(())
}

/// Print the signed-in user, or a hint when nobody is signed in
pub async fn status(config: Config) -> Result<()> {
    let connection = connect(&config).await?;
    let user = connection
        .auth
        .get_user()
        .await
        .map_err(|e| StudyError::Authentication(e.to_string()))?;

    match user {
        Some(user) => {
            println!(
                "{} {} ({})",
                "Signed in as".green().bold(),
                user.email.as_deref().unwrap_or("<no email>"),
                user.id
            );
        }
        None => println!("{}", "Not signed in.".yellow()),
    }
    Ok(())
}
