//! Subcommand handlers. Each one bootstraps the session the way a page load
//! would: `initialize` first, then the gate for its kind of view.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use chrono::{Local, NaiveDate};
use tracing::{error, info, warn};

use hwtracker_core::auth::{
    ExpiryCheck, InitOutcome, LoginRequest, Provider, Route, SessionManager, SessionState,
    SignInOptions, SignInOutcome,
};
use hwtracker_core::models::{Homework, NewHomework};
use hwtracker_core::{ApiError, Config, HomeworkClient, Navigator};

use crate::terminal::TerminalNavigator;

/// Longest accepted username
const MAX_USERNAME_LENGTH: usize = 50;

pub struct Context {
    pub config: Config,
    pub session: Arc<SessionManager>,
    pub navigator: Arc<TerminalNavigator>,
}

/// Page-load equivalent: finish a pending handshake or restore the session
async fn bootstrap(ctx: &Context) {
    if let InitOutcome::HandshakeFailed(e) = ctx.session.initialize().await {
        eprintln!("Sign-in failed: {}", e.user_message());
    }
}

// =========================================================================
// Public views
// =========================================================================

pub async fn login(ctx: &mut Context, username: Option<String>) -> Result<()> {
    bootstrap(ctx).await;
    if ctx.session.redirect_if_authenticated() {
        return Ok(());
    }

    let options = match ctx.session.provider_kind() {
        Provider::ExternalRedirect => SignInOptions::Redirect,
        Provider::BearerToken => {
            let username = resolve_username(username, ctx.config.last_username.as_deref())?;
            let password = read_password("Password: ")?;
            SignInOptions::Password(LoginRequest::new(username, password))
        }
    };

    match ctx.session.sign_in(&options).await {
        Ok(SignInOutcome::Authenticated(credential)) => {
            println!("Welcome, {}!", credential.subject_name());
            remember_username(ctx, credential.subject_name());
            ctx.navigator.navigate(Route::Protected);
            Ok(())
        }
        // The navigator has printed the provider URL
        Ok(SignInOutcome::Redirected) => Ok(()),
        Err(e) => {
            error!(error = %e, "Login failed");
            bail!(e.user_message())
        }
    }
}

pub async fn register(ctx: &mut Context, username: Option<String>) -> Result<()> {
    bootstrap(ctx).await;
    if ctx.session.provider_kind() != Provider::BearerToken {
        bail!("Accounts are managed by the identity provider. Run `hwtracker login` instead.");
    }
    if ctx.session.redirect_if_authenticated() {
        return Ok(());
    }

    let username = resolve_username(username, None)?;
    let password = read_password("Choose a password: ")?;
    let confirm = read_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }

    match ctx.session.register(&LoginRequest::new(username, password)).await {
        Ok(credential) => {
            println!("Account created. Welcome, {}!", credential.subject_name());
            remember_username(ctx, credential.subject_name());
            ctx.navigator.navigate(Route::Protected);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Registration failed");
            bail!(e.user_message())
        }
    }
}

pub async fn logout(ctx: &Context) -> Result<()> {
    bootstrap(ctx).await;
    if !ctx.session.sign_out().await {
        println!("Not signed in.");
    }
    Ok(())
}

pub async fn status(ctx: &Context) -> Result<()> {
    bootstrap(ctx).await;
    match ctx.session.state() {
        SessionState::Authenticated(credential) => {
            println!(
                "Signed in as {} ({}) via {}",
                credential.subject_name(),
                credential.initials(),
                provider_label(credential.provider())
            );
            if let Some(minutes) = credential.minutes_until_expiry() {
                println!("Session expires in {} minutes", minutes);
            }
        }
        SessionState::Expired => println!("Your session has expired. Run `hwtracker login`."),
        SessionState::Unauthenticated => println!("Not signed in."),
    }
    Ok(())
}

/// Re-entry after an external sign-in: `initialize` consumes the callback
pub async fn callback(ctx: &Context) -> Result<()> {
    match ctx.session.initialize().await {
        InitOutcome::HandshakeCompleted(credential) => {
            info!(subject = credential.subject_name(), "Signed in through provider");
        }
        InitOutcome::HandshakeFailed(e) => {
            eprintln!("Sign-in failed: {}", e.user_message());
            ctx.session.require_authenticated();
        }
        InitOutcome::Restored(_) | InitOutcome::Unauthenticated => {
            println!("That URL does not complete a sign-in.");
            ctx.session.redirect_if_authenticated();
        }
    }
    Ok(())
}

// =========================================================================
// Protected views
// =========================================================================

pub async fn list_homework(ctx: &Context) -> Result<()> {
    bootstrap(ctx).await;
    if !ctx.session.require_authenticated() {
        return Ok(());
    }

    let client = HomeworkClient::new(&ctx.config)?;
    let items = match client.list(&ctx.session).await {
        Ok(items) => items,
        Err(e) => return report_api_error(ctx, e, "Error loading tasks"),
    };

    if items.is_empty() {
        println!("No homework yet. Add some with `hwtracker homework add`.");
        return Ok(());
    }

    let today = Local::now().date_naive();
    for item in &items {
        println!("{}", format_row(item, today));
    }
    Ok(())
}

pub async fn add_homework(
    ctx: &Context,
    title: &str,
    due: NaiveDate,
    description: Option<&str>,
    child: Option<String>,
) -> Result<()> {
    bootstrap(ctx).await;
    if !ctx.session.require_authenticated() {
        return Ok(());
    }

    let Some(mut new) = NewHomework::new(title, due) else {
        bail!("Please provide a title");
    };
    if let Some(description) = description {
        new = new.with_description(description);
    }
    new = new.with_child(child.unwrap_or_else(|| ctx.config.default_child_id.clone()));

    let client = HomeworkClient::new(&ctx.config)?;
    match client.add(&ctx.session, &new).await {
        Ok(created) => {
            println!("Task \"{}\" added (id {})", created.title, created.id);
            Ok(())
        }
        Err(e) => report_api_error(ctx, e, "Failed to add task"),
    }
}

pub async fn complete_homework(ctx: &Context, id: &str, child: Option<String>) -> Result<()> {
    bootstrap(ctx).await;
    if !ctx.session.require_authenticated() {
        return Ok(());
    }

    let child = child.unwrap_or_else(|| ctx.config.default_child_id.clone());
    let client = HomeworkClient::new(&ctx.config)?;
    match client.complete(&ctx.session, id, &child).await {
        Ok(updated) => {
            println!("Task \"{}\" {}!", updated.title, updated.status_display());
            Ok(())
        }
        Err(e) => report_api_error(ctx, e, "Failed to update task status"),
    }
}

pub async fn watch(ctx: &Context) -> Result<()> {
    bootstrap(ctx).await;
    if !ctx.session.require_authenticated() {
        return Ok(());
    }

    let interval = ctx.config.expiry_check_interval();
    println!("Watching session (checked every {}s). Press Ctrl+C to stop.", interval.as_secs());
    let mut watch = ctx.session.spawn_expiry_watch(interval);

    tokio::select! {
        ended = watch.finished() => {
            if ended == Some(ExpiryCheck::NoSession) {
                println!("Session ended.");
            }
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
        }
    }
    // Dropping the handle stops the watch
    Ok(())
}

// =========================================================================
// Helpers
// =========================================================================

fn report_api_error(ctx: &Context, err: anyhow::Error, message: &str) -> Result<()> {
    error!(error = %err, "{}", message);
    match err.downcast_ref::<ApiError>() {
        Some(api_err) if api_err.needs_sign_in() => {
            eprintln!("{}: the server did not accept your session.", message);
            ctx.navigator.navigate(Route::SignIn);
            Ok(())
        }
        _ => bail!("{}. Please try again. ({})", message, err),
    }
}

fn format_row(item: &Homework, today: NaiveDate) -> String {
    let mark = if item.completed { "x" } else { " " };
    let overdue = if item.is_overdue(today) { "  (overdue)" } else { "" };
    format!(
        "[{}] {:<12} {:<32} Due: {}{}",
        mark,
        item.id,
        item.title,
        item.due_display(),
        overdue
    )
}

fn provider_label(provider: Provider) -> &'static str {
    match provider {
        Provider::BearerToken => "password",
        Provider::ExternalRedirect => "identity provider",
    }
}

fn remember_username(ctx: &mut Context, username: &str) {
    ctx.config.last_username = Some(username.to_string());
    if let Err(e) = ctx.config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

fn resolve_username(given: Option<String>, last: Option<&str>) -> Result<String> {
    let username = match given {
        Some(name) => name,
        None => prompt_username(last)?,
    };
    let username = username.trim().to_string();
    if !is_valid_username(&username) {
        bail!("Username must be 1-{} printable characters", MAX_USERNAME_LENGTH);
    }
    Ok(username)
}

fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.chars().count() <= MAX_USERNAME_LENGTH
        && !username.chars().any(char::is_control)
}

fn prompt_username(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => print!("Username [{}]: ", last),
        None => print!("Username: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(match (input.is_empty(), last) {
        (true, Some(last)) => last.to_string(),
        _ => input.to_string(),
    })
}

/// `HWTRACKER_PASSWORD` if set, else an interactive prompt
fn read_password(prompt: &str) -> Result<String> {
    if let Ok(password) = std::env::var("HWTRACKER_PASSWORD") {
        return Ok(password);
    }
    let password = rpassword::prompt_password(prompt)?;
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(completed: bool, due: &str) -> Homework {
        Homework {
            id: "hw-1".to_string(),
            title: "Fractions".to_string(),
            description: None,
            due_date: due.to_string(),
            completed,
            child_id: None,
            created_by: None,
            created_at: None,
            completed_by: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_is_valid_username() {
        assert!(is_valid_username("alice"));
        assert!(is_valid_username(&"a".repeat(50)));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username(&"a".repeat(51)));
        assert!(!is_valid_username("ali\tce"));
    }

    #[test]
    fn test_resolve_username_trims() {
        assert_eq!(resolve_username(Some("  alice ".to_string()), None).unwrap(), "alice");
        assert!(resolve_username(Some("   ".to_string()), None).is_err());
    }

    #[test]
    fn test_format_row() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

        let row = format_row(&item(false, "2026-10-18"), today);
        assert!(row.starts_with("[ ] hw-1"));
        assert!(row.ends_with("(overdue)"));

        let row = format_row(&item(true, "2026-10-18"), today);
        assert!(row.starts_with("[x]"));
        assert!(!row.contains("overdue"));
    }
}
