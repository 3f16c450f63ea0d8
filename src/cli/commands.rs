//! Command handlers for Listing Watch CLI
//!
//! This module implements the command handlers that turn CLI arguments and
//! the loaded configuration into dispatcher runs and file operations.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::app::dispatcher::{DispatchSummary, Dispatcher};
use crate::app::fetcher::HttpFetcher;
use crate::app::ledger::LedgerStore;
use crate::app::notify::{Notifier, TelegramNotifier};
use crate::cli::{ConfigAction, ConfigArgs, LedgerAction, LedgerArgs, RunArgs};
use crate::config::{AppConfig, LOCAL_CONFIG_FILE};
use crate::errors::{AppError, ConfigError, Result};

/// Handle the run command
///
/// Validates the configuration, builds the fetcher and optional notifier,
/// and runs the dispatcher until Ctrl-C or SIGTERM.
pub async fn handle_run(mut config: AppConfig, args: RunArgs) -> Result<()> {
    args.validate().map_err(AppError::generic)?;
    apply_run_overrides(&mut config, &args);
    config.validate()?;

    let queries = config.query_configs()?;
    let dispatcher_config = config.dispatcher_config()?;
    let fetcher = Arc::new(HttpFetcher::new(&config.fetcher)?);
    let notifier: Option<Arc<dyn Notifier>> = match &config.telegram {
        Some(telegram) => Some(Arc::new(TelegramNotifier::new(telegram)?)),
        None => None,
    };

    info!(
        queries = queries.len(),
        telegram = notifier.is_some(),
        "Starting dispatcher"
    );
    let dispatcher = Dispatcher::new(dispatcher_config, queries, fetcher, notifier).await?;

    println!("👀 Watching {} queries", config.queries.len());
    match dispatcher.local_addr() {
        Some(addr) => println!("   Subscribe at ws://{}", addr),
        None => println!("   Subscription endpoint disabled"),
    }
    println!("   Press Ctrl+C to stop");

    let summary = dispatcher.run_until_signal().await?;
    print_summary(&summary);

    if !summary.is_clean() {
        warn!("Dispatcher stopped with errors");
    }
    Ok(())
}

/// Apply `run` flags on top of the loaded configuration
pub fn apply_run_overrides(config: &mut AppConfig, args: &RunArgs) {
    if let Some(port) = args.port {
        config.dispatcher.port = port;
    }
    if let Some(host) = &args.host {
        config.dispatcher.host = host.clone();
    }
    if args.no_server {
        config.dispatcher.serve_subscriptions = false;
    }
    if let Some(path) = &args.ledger_file {
        config.ledger.file = Some(path.clone());
    }
}

fn print_summary(summary: &DispatchSummary) {
    println!("\n📊 Session Summary:");
    println!("  Uptime: {:?}", summary.uptime);
    println!(
        "  Ledger: {}/{} ids ({} evicted)",
        summary.ledger.len, summary.ledger.capacity, summary.ledger.evicted
    );
    println!(
        "  Broadcasts: {} ({} deliveries, {} subscribers dropped)",
        summary.hub.broadcasts, summary.hub.deliveries, summary.hub.failures
    );
    for worker in &summary.workers {
        let stats = &worker.stats;
        println!(
            "  {}: {} cycles, {} new, {} sent, {} stale, {} exhausted, {} restarts",
            worker.query,
            stats.cycles,
            stats.novel,
            stats.broadcast,
            stats.stale,
            stats.fetch_exhausted,
            stats.restarts
        );
    }
    if let Some(outcome) = &summary.persisted {
        println!(
            "  Ledger saved ({} lines{})",
            outcome.lines_after,
            if outcome.compacted { ", compacted" } else { "" }
        );
    }
    if !summary.shutdown_errors.is_empty() {
        println!("\nShutdown errors:");
        for error in &summary.shutdown_errors {
            println!("  • {}", error);
        }
    }
}

/// Handle configuration commands
pub async fn handle_config(
    config_path: Option<PathBuf>,
    config: &AppConfig,
    args: ConfigArgs,
) -> Result<()> {
    match args.action {
        ConfigAction::Init { force } => {
            let path = config_path.unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE));
            AppConfig::write_default(&path, force).await?;
            println!("📁 Created configuration file:");
            println!("   {}", path.display());
            println!("   Edit the [[queries]] section, then run 'listing_watch run'.");
            Ok(())
        }
        ConfigAction::Show => {
            print!("{}", redacted(config).to_toml()?);
            Ok(())
        }
        ConfigAction::Validate => match config.validate() {
            Ok(()) => {
                println!("✅ Configuration is valid ({} queries)", config.queries.len());
                Ok(())
            }
            Err(ConfigError::ValidationFailed { errors }) => {
                println!("❌ Configuration has {} problem(s):", errors.len());
                for error in &errors {
                    println!("  • {}", error);
                }
                Err(ConfigError::ValidationFailed { errors }.into())
            }
            Err(e) => Err(e.into()),
        },
    }
}

/// Copy of `config` with secrets masked for display
fn redacted(config: &AppConfig) -> AppConfig {
    let mut shown = config.clone();
    if let Some(telegram) = shown.telegram.as_mut() {
        if telegram.token.is_some() {
            telegram.token = Some("********".to_string());
        }
    }
    shown
}

/// Handle ledger file commands
pub async fn handle_ledger(config: &AppConfig, args: LedgerArgs) -> Result<()> {
    match args.action {
        LedgerAction::Stats { file } => {
            let store = ledger_store(config, file)?;
            match store.file_stats().await? {
                Some(stats) => {
                    println!("🗂️  Ledger file: {}", store.path().display());
                    println!("  Entries: {}", stats.lines);
                    println!("  Size: {:.1} KB", stats.bytes as f64 / 1024.0);
                    println!(
                        "  Compaction threshold: {:.1} MB",
                        config.ledger.compaction_threshold_bytes as f64 / (1024.0 * 1024.0)
                    );
                }
                None => println!("No ledger file at {}", store.path().display()),
            }
            Ok(())
        }
        LedgerAction::Compact { file } => {
            let store = ledger_store(config, file)?;
            let outcome = store.compact().await?;
            if outcome.compacted {
                println!(
                    "🧹 Compacted {}: {} -> {} entries ({} -> {} bytes)",
                    store.path().display(),
                    outcome.lines_before,
                    outcome.lines_after,
                    outcome.bytes_before,
                    outcome.bytes_after
                );
            } else {
                println!(
                    "Nothing to compact in {} ({} bytes)",
                    store.path().display(),
                    outcome.bytes_before
                );
            }
            Ok(())
        }
    }
}

/// Store for an explicit file or the configured one
fn ledger_store(config: &AppConfig, file: Option<PathBuf>) -> Result<LedgerStore> {
    let path = file
        .or_else(|| config.ledger.file.clone())
        .ok_or_else(|| AppError::generic("No ledger file given (use --file or set [ledger] file)"))?;
    Ok(LedgerStore::new(path).with_compaction_threshold(config.ledger.compaction_threshold_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::notify::TelegramConfig;
    use tempfile::TempDir;

    #[test]
    fn test_run_overrides() {
        let mut config = AppConfig::default();
        let args = RunArgs {
            port: Some(4000),
            host: Some("127.0.0.1".to_string()),
            no_server: false,
            ledger_file: Some(PathBuf::from("seen.txt")),
        };
        apply_run_overrides(&mut config, &args);

        assert_eq!(config.dispatcher.port, 4000);
        assert_eq!(config.dispatcher.host, "127.0.0.1");
        assert!(config.dispatcher.serve_subscriptions);
        assert_eq!(config.ledger.file, Some(PathBuf::from("seen.txt")));

        apply_run_overrides(
            &mut config,
            &RunArgs {
                no_server: true,
                ..Default::default()
            },
        );
        assert!(!config.dispatcher.serve_subscriptions);
        assert_eq!(config.dispatcher.port, 4000);
    }

    #[test]
    fn test_redacted_hides_token() {
        let mut config = AppConfig::default();
        config.telegram = Some(TelegramConfig {
            token: Some("123:secret".to_string()),
            chat_id: Some("42".to_string()),
            ..Default::default()
        });

        let shown = redacted(&config);
        let telegram = shown.telegram.unwrap();
        assert_eq!(telegram.token.as_deref(), Some("********"));
        assert_eq!(telegram.chat_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_ledger_store_requires_path() {
        let config = AppConfig::default();
        assert!(ledger_store(&config, None).is_err());

        let store = ledger_store(&config, Some(PathBuf::from("a.txt"))).unwrap();
        assert_eq!(store.path(), PathBuf::from("a.txt").as_path());
    }

    #[tokio::test]
    async fn test_ledger_compact_command() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("seen.txt");
        let ids: Vec<String> = (0..100).map(|i| format!("id-{:04}", i)).collect();
        tokio::fs::write(&path, ids.join("\n") + "\n").await.unwrap();

        let mut config = AppConfig::default();
        config.ledger.compaction_threshold_bytes = 64;
        let args = LedgerArgs {
            action: LedgerAction::Compact {
                file: Some(path.clone()),
            },
        };
        handle_ledger(&config, args).await.unwrap();

        let remaining = LedgerStore::new(&path).load().await.unwrap();
        assert_eq!(remaining.len(), 50);
        assert_eq!(remaining.first().map(String::as_str), Some("id-0050"));
    }

    #[tokio::test]
    async fn test_config_init_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("listing-watch.toml");
        let args = ConfigArgs {
            action: ConfigAction::Init { force: false },
        };

        handle_config(Some(path.clone()), &AppConfig::default(), args)
            .await
            .unwrap();
        let written = AppConfig::load_from_file(&path).await.unwrap();
        assert!(written.validate().is_ok());
    }
}
