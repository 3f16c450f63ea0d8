//! Listing Watch CLI application
//!
//! Command-line interface for watching marketplace queries and pushing new
//! listings to WebSocket subscribers and an optional Telegram chat.

use std::fs::OpenOptions;
use std::process;
use std::sync::Mutex;

use tracing::info;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::{fmt, EnvFilter};

use listing_watch::cli::{
    handle_config, handle_ledger, handle_run, Cli, Commands, ConfigAction, ConfigArgs,
};
use listing_watch::config::{AppConfig, LoggingConfig};
use listing_watch::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    // `config init` must work before any configuration exists
    let config = match &cli.command {
        Commands::Config(ConfigArgs {
            action: ConfigAction::Init { .. },
        }) => AppConfig::default(),
        _ => AppConfig::load(cli.global.config.clone()).await?,
    };

    init_logging(&cli, &config.logging);

    info!("Listing Watch v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run(args) => {
            info!("Executing run command");
            handle_run(config, args).await
        }
        Commands::Config(args) => {
            info!("Executing config command");
            handle_config(cli.global.config.clone(), &config, args).await
        }
        Commands::Ledger(args) => {
            info!("Executing ledger command");
            handle_ledger(&config, args).await
        }
    }
}

/// Initialize logging from CLI verbosity, falling back to the configured level
fn init_logging(cli: &Cli, logging: &LoggingConfig) {
    let level = cli
        .log_level()
        .map(|level| level.to_string().to_lowercase())
        .unwrap_or_else(|| logging.level.clone());

    let directive: Directive = match format!("listing_watch={}", level).parse() {
        Ok(directive) => directive,
        Err(_) => {
            eprintln!("Warning: unknown log level '{}', using info", level);
            Directive::from(LevelFilter::INFO)
        }
    };
    let filter = EnvFilter::from_default_env().add_directive(directive);

    match &logging.file {
        Some(path) => {
            let limit = logging.max_file_size_bytes();
            let oversized = std::fs::metadata(path)
                .map(|meta| meta.len() > limit)
                .unwrap_or(false);
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .append(!oversized)
                .truncate(oversized)
                .open(path);

            match file {
                Ok(file) => fmt()
                    .with_env_filter(filter)
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init(),
                Err(e) => {
                    eprintln!("Warning: cannot open log file {}: {}", path.display(), e);
                    fmt().with_env_filter(filter).with_target(false).init();
                }
            }
        }
        None => fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(cli.global.very_verbose)
            .init(),
    }

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
