use std::env;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use time::OffsetDateTime;
use tokio::runtime::Runtime;
use tracing_subscriber::{fmt, EnvFilter};

use crate::api::{ActionKind, ApiClient, HttpTransport};
use crate::app::App;
use crate::config::{ConfigLoader, ConfigPaths, CONFIG_ENV, DATA_ENV};
use crate::session::Session;
use crate::storage::{self, MemoryStateStore, StateStore};

pub mod commands;

use self::commands::{ListArgs, LoginArgs, RecordArgs, TitleSearchArgs};

const DASHBOARD_LOG: &str = "dashboard.log";

#[derive(Parser, Debug)]
#[command(
    name = "estatedesk",
    version,
    about = "Admin desk for the property marketplace: review, verify and clean up listings"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over ESTATEDESK_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over ESTATEDESK_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Override the marketplace API base URL from the config file
    #[arg(long)]
    pub api_url: Option<String>,

    /// Keep session state in memory only
    #[arg(long)]
    pub ephemeral: bool,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive dashboard (default)
    Dashboard,
    /// Print a section's records, optionally filtered
    List(ListArgs),
    /// Accept a pending property or verify a contractor
    Accept(RecordArgs),
    /// Reject a pending property or contractor
    Reject(RecordArgs),
    /// Delete an appointment, enquiry or admin
    Delete(RecordArgs),
    /// Store the admin bearer token
    Login(LoginArgs),
    /// Forget the stored token
    Logout,
    /// Show who the stored token belongs to
    Whoami,
    /// Submit a title search request with supporting documents
    TitleSearch(TitleSearchArgs),
}

pub fn run() -> Result<()> {
    let mut cli = Cli::parse();
    let command = cli.command.take().unwrap_or(Commands::Dashboard);

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    init_tracing(&cli.log_level, &log_target(&command, loader.paths()))
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let mut config = loader.load_or_init()?;
    if let Some(url) = &cli.api_url {
        config
            .override_base_url(url)
            .context("applying --api-url")?;
    }

    let store: Arc<dyn StateStore> = if cli.ephemeral {
        Arc::new(MemoryStateStore::new())
    } else {
        Arc::new(storage::init(&config.state)?)
    };
    let mut session = Session::restore(store)?;
    let transport = HttpTransport::new(&config.api)?;
    tracing::debug!(base_url = %transport.base_url(), "api transport ready");
    let api = ApiClient::new(Arc::new(transport)).with_token(session.token().map(str::to_string));

    let config = Arc::new(config);
    match command {
        Commands::Dashboard => {
            let mut app = App::new(config.clone(), api, session)?;
            commands::run_dashboard(&mut app)
        }
        Commands::List(args) => print_async(commands::list_records(&api, &args)),
        Commands::Accept(args) => {
            print_async(commands::record_action(&api, ActionKind::Accept, &args))
        }
        Commands::Reject(args) => {
            print_async(commands::record_action(&api, ActionKind::Reject, &args))
        }
        Commands::Delete(args) => {
            print_async(commands::record_action(&api, ActionKind::Delete, &args))
        }
        Commands::Login(args) => {
            print!("{}", commands::login(&mut session, &args)?);
            Ok(())
        }
        Commands::Logout => {
            print!("{}", commands::logout(&mut session)?);
            Ok(())
        }
        Commands::Whoami => {
            print!("{}", commands::whoami(&session, OffsetDateTime::now_utc()));
            Ok(())
        }
        Commands::TitleSearch(args) => print_async(commands::submit_title_search(&api, &args)),
    }
}

fn runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting async runtime")
}

fn print_async<F>(future: F) -> Result<()>
where
    F: std::future::Future<Output = Result<String>>,
{
    let output = runtime()?.block_on(future)?;
    print!("{output}");
    Ok(())
}

/// Where log lines go. The dashboard owns the terminal, so it logs to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogTarget {
    Stderr,
    File(PathBuf),
}

fn log_target(command: &Commands, paths: &ConfigPaths) -> LogTarget {
    match command {
        Commands::Dashboard => LogTarget::File(paths.log_dir.join(DASHBOARD_LOG)),
        _ => LogTarget::Stderr,
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}

fn init_tracing(level: &str, target: &LogTarget) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        let builder = fmt().with_env_filter(env_filter);
        let installed = match target {
            LogTarget::Stderr => builder.with_writer(std::io::stderr).try_init(),
            LogTarget::File(path) => {
                let file = open_log_file(path)?;
                builder
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .try_init()
            }
        };
        installed.map_err(|err| anyhow::anyhow!(err))
    })
    .map(|_| ())
}
