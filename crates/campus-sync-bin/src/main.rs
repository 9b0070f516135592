//! campus-sync - live view and editing of the campus administration tables.

mod app;
mod backend;

use std::path::PathBuf;

use campus_config_and_utils::{init_logging, Config, LogOptions, Paths};
use campus_records::ResourceKind;
use clap::{Parser, Subcommand};

/// campus-sync command-line interface.
#[derive(Parser)]
#[command(name = "campus-sync")]
#[command(about = "Live sync of courses, faculty, students and rooms")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the config value
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config and logs. Defaults to ~/.campus-sync
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Use an in-process table store instead of Supabase
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a table once and print its rows as JSON lines
    List {
        /// courses, faculty, students or rooms
        resource: ResourceKind,
    },
    /// Keep a table in sync and print every change until Ctrl-C
    Watch { resource: ResourceKind },
    /// Insert a row
    Add {
        resource: ResourceKind,
        /// Row fields as a JSON object
        #[arg(long)]
        json: String,
    },
    /// Partially update a row
    Update {
        resource: ResourceKind,
        id: String,
        /// Changed fields as a JSON object
        #[arg(long)]
        json: String,
    },
    /// Delete a row
    Remove { resource: ResourceKind, id: String },
    /// Write the effective configuration to the config file
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let log_options = if config.log_to_file {
        LogOptions::with_file(level, &paths)
    } else {
        LogOptions::stderr(level)
    };
    init_logging(&log_options)?;

    let backend = backend::Backend::connect(&config, cli.offline)?;

    match cli.command {
        Commands::List { resource } => app::list(&backend, resource).await?,
        Commands::Watch { resource } => app::watch(&backend, resource).await?,
        Commands::Add { resource, json } => app::add(&backend, resource, &json).await?,
        Commands::Update { resource, id, json } => {
            app::update(&backend, resource, &id, &json).await?
        }
        Commands::Remove { resource, id } => app::remove(&backend, resource, &id).await?,
        Commands::InitConfig => {
            config.save(&paths)?;
            println!("{}", paths.config_file().display());
        }
    }

    Ok(())
}
