//! hwtracker - a command-line homework tracker.
//!
//! Sign in against the homework backend (or an external identity provider),
//! then list, add and complete homework. Each subcommand behaves like a page
//! load: it bootstraps the session first and protected commands refuse to
//! run without one.

mod terminal;
mod views;

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

use hwtracker_core::auth::{IdentityProvider, SessionManager};
use hwtracker_core::Config;

use terminal::{TerminalNavigator, TerminalNotifier};

/// Log file prefix inside `<cache>/logs`
const LOG_FILE_PREFIX: &str = "hwtracker.log";

#[derive(Parser)]
#[command(name = "hwtracker", version, about = "Track homework from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in
    Login {
        #[arg(short, long, env = "HWTRACKER_USERNAME")]
        username: Option<String>,
    },
    /// Create an account and sign in
    Register {
        #[arg(short, long, env = "HWTRACKER_USERNAME")]
        username: Option<String>,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show who is signed in
    Status,
    /// Finish an external sign-in with the URL the provider redirected to
    Callback { url: Url },
    /// Work with homework items
    #[command(subcommand)]
    Homework(HomeworkCommand),
    /// Stay on the protected view and sign out when the session expires
    Watch,
}

#[derive(Subcommand)]
enum HomeworkCommand {
    /// List all homework, earliest due first
    List,
    /// Add a homework item
    Add {
        #[arg(short, long)]
        title: String,
        /// Due date (YYYY-MM-DD)
        #[arg(short, long)]
        due: chrono::NaiveDate,
        #[arg(short = 'm', long)]
        description: Option<String>,
        #[arg(short, long)]
        child: Option<String>,
    },
    /// Mark a homework item complete
    Done {
        id: String,
        #[arg(short, long)]
        child: Option<String>,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// Use RUST_LOG to control the level (e.g. RUST_LOG=debug). Logs go to
/// stderr and, when the cache directory is writable, to a daily file.
fn init_tracing(cache_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match cache_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir.join("logs"), LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

/// One session manager per process, wired to the configured provider and store
fn build_session(
    config: &Config,
    callback: Option<Url>,
    navigator: Arc<TerminalNavigator>,
) -> Result<Arc<SessionManager>> {
    let store = config.credential_store()?;

    let provider: Arc<dyn IdentityProvider> = match config.redirect_provider()? {
        Some(redirect) => match callback {
            Some(url) => Arc::new(redirect.with_callback(url)),
            None => Arc::new(redirect),
        },
        None => {
            if callback.is_some() {
                warn!("Ignoring callback URL: this deployment signs in with bearer tokens");
            }
            Arc::new(config.bearer_provider()?)
        }
    };

    Ok(Arc::new(SessionManager::new(
        store,
        provider,
        navigator,
        Arc::new(TerminalNotifier),
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config ({}), using defaults", e);
            Config::default()
        }
    };

    let cache_dir = config.cache_dir().ok();
    let _log_guard = init_tracing(cache_dir.as_deref());
    info!(provider = ?config.provider, "hwtracker starting");

    let callback = match &cli.command {
        Command::Callback { url } => Some(url.clone()),
        _ => None,
    };
    let navigator = Arc::new(TerminalNavigator::default());
    let session = build_session(&config, callback, navigator.clone())?;

    let mut ctx = views::Context {
        config,
        session,
        navigator,
    };

    match cli.command {
        Command::Login { username } => views::login(&mut ctx, username).await,
        Command::Register { username } => views::register(&mut ctx, username).await,
        Command::Logout => views::logout(&ctx).await,
        Command::Status => views::status(&ctx).await,
        Command::Callback { .. } => views::callback(&ctx).await,
        Command::Homework(HomeworkCommand::List) => views::list_homework(&ctx).await,
        Command::Homework(HomeworkCommand::Add {
            title,
            due,
            description,
            child,
        }) => views::add_homework(&ctx, &title, due, description.as_deref(), child).await,
        Command::Homework(HomeworkCommand::Done { id, child }) => {
            views::complete_homework(&ctx, &id, child).await
        }
        Command::Watch => views::watch(&ctx).await,
    }
}
