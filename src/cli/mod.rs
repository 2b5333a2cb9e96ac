use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigLoader;
use crate::storage::{self, KvStore};

pub mod commands;

use self::commands::{AddArgs, CalendarArgs, MoodArgs, RemoveArgs, SweepArgs, ToggleArgs};

#[derive(Parser, Debug)]
#[command(
    name = "fadelog",
    version,
    about = "Local-first ephemeral diary whose entries fade after the retention window"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over FADELOG_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over FADELOG_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a new entry
    Add(AddArgs),
    /// List live entries with their remaining lifetime (default)
    List,
    /// Delete an entry, asking for confirmation unless --yes
    Remove(RemoveArgs),
    /// Toggle an entry's completed flag
    Toggle(ToggleArgs),
    /// Let go of the entries whose time is up
    Sweep(SweepArgs),
    /// Record the mood for a day
    Mood(MoodArgs),
    /// Show a month of recorded moods
    Calendar(CalendarArgs),
    /// Summarize the diary: visit gap, entry counts, next fade
    Status,
    /// Keep the diary open and sweep on the periodic tick
    Watch,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("FADELOG_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("FADELOG_DATA", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;
    let store = storage::init(&paths, &config.storage)?;

    let config = Arc::new(config);
    let store: Arc<dyn KvStore> = Arc::new(store);
    match cli.command.unwrap_or(Commands::List) {
        Commands::Add(args) => commands::add_entry(config, store, args),
        Commands::List => commands::list_entries(config, store),
        Commands::Remove(args) => commands::remove_entry(config, store, args),
        Commands::Toggle(args) => commands::toggle_entry(config, store, args),
        Commands::Sweep(args) => commands::sweep_entries(config, store, args),
        Commands::Mood(args) => commands::record_mood(config, store, args),
        Commands::Calendar(args) => commands::show_calendar(config, store, args),
        Commands::Status => commands::show_status(config, store),
        Commands::Watch => commands::watch(config, store),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
