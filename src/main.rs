use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use playlog::cli::{history, init, load, stats};
use playlog::config::{Config, ResolverStrategy};
use playlog::store::WarehouseStore;

#[derive(Parser)]
#[command(name = "playlog")]
#[command(about = "Load song catalogs and listening logs into a star-schema warehouse")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "playlog.yaml")]
    config: String,

    /// Database path (overrides config)
    #[arg(long)]
    database: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the warehouse tables
    Init {
        /// Drop all tables first
        #[arg(long)]
        reset: bool,
    },

    /// Load the catalog directory, then the log directory
    Load {
        /// Catalog directory (one song per JSON file)
        #[arg(long)]
        catalog_dir: Option<PathBuf>,

        /// Log directory (newline-delimited JSON events)
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// How log events are matched to catalog songs
        #[arg(long, value_enum)]
        resolver: Option<ResolverStrategy>,
    },

    /// Load only a catalog directory
    LoadCatalog {
        dir: PathBuf,
    },

    /// Load only a log directory
    LoadLogs {
        dir: PathBuf,

        /// How log events are matched to catalog songs
        #[arg(long, value_enum)]
        resolver: Option<ResolverStrategy>,
    },

    /// Show row counts per table
    Stats,

    /// Show recent per-file load results
    History {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    // Load config
    let mut config = Config::load(&cli.config)?;
    if let Some(path) = cli.database {
        config.database.path = path.to_string_lossy().to_string();
    }

    // Initialize store; failing here stops the whole run
    let mut store = WarehouseStore::open(&config.database_path(), config.busy_timeout())?;

    match cli.command {
        Commands::Init { reset } => {
            init::run(&store, reset)?;
        }
        Commands::Load {
            catalog_dir,
            log_dir,
            resolver,
        } => {
            let mut options = config.pipeline_options();
            if let Some(strategy) = resolver {
                options.resolver = strategy;
            }
            let catalog_dir = catalog_dir.or_else(|| config.catalog_dir());
            let log_dir = log_dir.or_else(|| config.log_dir());
            load::run(&mut store, options, catalog_dir.as_deref(), log_dir.as_deref())?;
        }
        Commands::LoadCatalog { dir } => {
            load::run(&mut store, config.pipeline_options(), Some(dir.as_path()), None)?;
        }
        Commands::LoadLogs { dir, resolver } => {
            let mut options = config.pipeline_options();
            if let Some(strategy) = resolver {
                options.resolver = strategy;
            }
            load::run(&mut store, options, None, Some(dir.as_path()))?;
        }
        Commands::Stats => {
            stats::run(&store)?;
        }
        Commands::History { limit } => {
            history::run(&store, limit)?;
        }
    }

    Ok(())
}
