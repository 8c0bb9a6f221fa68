use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use shm_api::{ShmClient, menu_request_path};
use shm_nav::{Document, FailurePolicy, MenuRenderer, RenderOutcome};
use shm_types::{MenuTitles, SessionToken};
use shm_util::{JsonSessionStore, SESSION_ID_KEY, SessionStore, read_session_token};
use tracing::{debug, info, warn};

#[derive(Debug, Parser)]
#[command(name = "shm-admin", version, about = "SHM admin panel navigation tools")]
struct Cli {
    /// Session storage file (defaults to $SHM_SESSION_PATH or the config directory)
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch the permitted menu and print the admin page with it rendered
    Render(RenderArgs),
    /// Manage the stored session id
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Print the menu request path for the current session
    Url {
        #[arg(long)]
        session_id: Option<String>,
    },
}

#[derive(Debug, Args)]
struct RenderArgs {
    /// Show raw menu keys instead of localized titles
    #[arg(long, conflicts_with = "titles")]
    raw: bool,
    /// JSON object mapping menu keys to titles
    #[arg(long)]
    titles: Option<PathBuf>,
    /// Use this session id instead of the stored one
    #[arg(long)]
    session_id: Option<String>,
    /// Backend base URL (overrides $SHM_API_BASE)
    #[arg(long)]
    base_url: Option<String>,
    /// Item text shown in the menu when it cannot be fetched
    #[arg(long)]
    placeholder: Option<String>,
    /// Abort the menu request after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum SessionAction {
    /// Print the stored session id
    Get,
    /// Store a session id
    Set { session_id: String },
    /// Forget the stored session id
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Render(args) => run_render(args, cli.session_file, &mut io::stdout().lock()).await,
        Command::Session { action } => run_session(action, cli.session_file),
        Command::Url { session_id } => {
            println!("{}", menu_request_path(&session_token(session_id, cli.session_file)));
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Render the admin page into `out`.
///
/// A failed fetch still writes the page; only configuration errors fail.
async fn run_render(args: RenderArgs, session_file: Option<PathBuf>, out: &mut impl Write) -> Result<()> {
    let token = session_token(args.session_id, session_file);
    let client = match &args.base_url {
        Some(base_url) => ShmClient::new(base_url),
        None => ShmClient::new_from_env(),
    }
    .context("configure SHM client")?;

    let mut renderer = MenuRenderer::new(client);
    if !args.raw {
        let titles = match &args.titles {
            Some(path) => MenuTitles::load(path).with_context(|| format!("load titles from {}", path.display()))?,
            None => MenuTitles::russian_defaults(),
        };
        renderer = renderer.with_labels(titles);
    }
    if let Some(text) = args.placeholder {
        renderer = renderer.with_failure_policy(FailurePolicy::Placeholder(text));
    }
    if let Some(seconds) = args.timeout_secs {
        renderer = renderer.with_timeout(Duration::from_secs(seconds));
    }

    let mut document = Document::admin_page();
    match renderer.render(&mut document, &token).await {
        RenderOutcome::Rendered { items } => info!(items, "admin menu rendered"),
        RenderOutcome::ContainerMissing => debug!("admin page has no navigation container"),
        RenderOutcome::Failed(_) => debug!("admin menu left unrendered"),
    }
    writeln!(out, "{}", document.to_html()).context("write rendered page")?;
    Ok(())
}

fn run_session(action: SessionAction, session_file: Option<PathBuf>) -> Result<()> {
    let store = JsonSessionStore::new(session_file).context("open session storage")?;
    match action {
        SessionAction::Get => {
            if let Some(session_id) = store.get(SESSION_ID_KEY)? {
                println!("{session_id}");
            }
        }
        SessionAction::Set { session_id } => {
            store.set(SESSION_ID_KEY, &session_id)?;
            info!(path = %store.path().display(), "session id stored");
        }
        SessionAction::Clear => {
            if !store.remove(SESSION_ID_KEY)? {
                info!("no session id stored");
            }
        }
    }
    Ok(())
}

/// Resolve the token for a request: an explicit id wins, then storage.
fn session_token(session_id: Option<String>, session_file: Option<PathBuf>) -> SessionToken {
    if let Some(session_id) = session_id {
        return SessionToken::new(session_id);
    }
    match JsonSessionStore::new(session_file) {
        Ok(store) => read_session_token(&store),
        Err(error) => {
            warn!(error = %error, "Failed to open session storage; continuing without a session");
            SessionToken::absent()
        }
    }
}
