//! citadel CLI entry point

use citadel::{
    api::{ApiClient, ListQuery},
    catalog::CatalogDb,
    commands::{
        cmd_health, cmd_init, cmd_sync, print_health, print_history, print_item, print_page,
        print_summary, print_sync_stats, InitOptions, SyncOptions,
    },
    config::Config,
    error::{Error, Result},
    ledger::SearchLedger,
    models::EntityKind,
    progress::LogWriterFactory,
    resolve::{DataSource, FallbackResolver, Request},
    sync::Reconciler,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "citadel")]
#[command(version, about = "Browse and mirror the Rick and Morty catalog", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize citadel configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Sweep upstream list pages into the local catalog
    ///
    /// Syncs every kind unless one or more kinds are selected
    Sync {
        #[arg(long)]
        characters: bool,

        #[arg(long)]
        episodes: bool,

        #[arg(long)]
        locations: bool,

        /// Maximum pages per kind (defaults to sync.page_limit)
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Show a single record by upstream id
    Show {
        #[arg(value_enum)]
        kind: EntityKind,

        id: i64,
    },

    /// List one page of records
    List {
        #[arg(value_enum)]
        kind: EntityKind,

        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Upstream filter as key=value (e.g. status=alive), repeatable
        #[arg(short, long, value_parser = parse_filter)]
        filter: Vec<(String, String)>,
    },

    /// Search by name, falling back to species, episode code or type
    Search {
        #[arg(value_enum)]
        kind: EntityKind,

        query: String,

        #[arg(short, long, default_value = "1")]
        page: u32,
    },

    /// Show catalog totals and recent searches
    Summary,

    /// Show recent searches
    History {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Check the local catalog
    Health,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_filter(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        let code = if matches!(e, Error::NotFound { .. }) { 2 } else { 1 };
        std::process::exit(code);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    // Handle init command specially (doesn't need existing config)
    if matches!(cli.command, Commands::Init { .. }) {
        return handle_init(cli).await;
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "citadel", &mut std::io::stdout());
        return Ok(());
    }

    // Health reports on a missing setup instead of refusing to run
    if matches!(cli.command, Commands::Health) {
        let config = match cli.config.as_deref() {
            Some(path) => Config::load(path)?,
            None => Config::load_from(None)?,
        };
        let report = cmd_health(&config).await;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_health(&report);
        }
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;

    // Composition root: one client and one reconciler shared by every request
    let db = CatalogDb::connect(&config).await?;
    let api = Arc::new(ApiClient::from_config(&config)?);
    let reconciler = Reconciler::new(api, db.clone());
    let ledger = SearchLedger::new(db);
    let resolver = FallbackResolver::new(reconciler.clone(), ledger.clone(), &config.resolver);

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } | Commands::Health => unreachable!(),

        Commands::Sync {
            characters,
            episodes,
            locations,
            limit,
        } => {
            let selected = [
                (characters, EntityKind::Character),
                (episodes, EntityKind::Episode),
                (locations, EntityKind::Location),
            ]
            .into_iter()
            .filter_map(|(on, kind)| on.then_some(kind))
            .collect();

            let mut options = SyncOptions::new(selected, &config.sync);
            if let Some(limit) = limit {
                options.page_limit = limit;
            }

            let stats = cmd_sync(&reconciler, &options).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_sync_stats(&stats);
            }
        }

        Commands::Show { kind, id } => {
            let (payload, source) = resolver.resolve(&Request::Item { kind, id }).await.into_found()?;
            if cli.json {
                print_sourced(&payload, source)?;
            } else {
                print_item(kind, &payload, source);
            }
        }

        Commands::List { kind, page, filter } => {
            let mut query = ListQuery::page(page);
            for (key, value) in &filter {
                if !kind.list_filters().contains(&key.as_str()) {
                    return Err(Error::Config(format!(
                        "Unknown {} filter '{}' (expected one of: {})",
                        kind,
                        key,
                        kind.list_filters().join(", ")
                    )));
                }
                query = query.with_filter(key, value);
            }

            let (payload, source) = resolver
                .resolve(&Request::List { kind, query })
                .await
                .into_found()?;
            if cli.json {
                print_sourced(&payload, source)?;
            } else {
                print_page(kind, &payload, page, source);
            }
        }

        Commands::Search { kind, query, page } => {
            let (payload, source) = resolver
                .resolve(&Request::Search {
                    kind,
                    text: query,
                    page,
                })
                .await
                .into_found()?;
            if cli.json {
                print_sourced(&payload, source)?;
            } else {
                print_page(kind, &payload, page, source);
            }
        }

        Commands::Summary => {
            let (payload, source) = resolver.resolve(&Request::Summary).await.into_found()?;
            if cli.json {
                print_sourced(&payload, source)?;
            } else {
                print_summary(&payload, source);
            }
        }

        Commands::History { limit } => {
            let records = ledger.recent(limit).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print_history(&records);
            }
        }
    }
    Ok(())
}

fn print_sourced(payload: &Value, source: DataSource) -> Result<()> {
    let output = json!({ "source": source, "data": payload });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn handle_init(cli: Cli) -> Result<()> {
    let Commands::Init { force } = cli.command else {
        unreachable!()
    };

    // A .toml path names the config file; anything else is a base directory
    let (base_dir, config_path) = match cli.config {
        Some(path) if path.extension().is_some_and(|e| e == "toml") => {
            let base = path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(Config::default_base_dir);
            (base, path)
        }
        Some(dir) => {
            let config = dir.join("config.toml");
            (dir, config)
        }
        None => {
            let base = Config::default_base_dir();
            (base.clone(), base.join("config.toml"))
        }
    };

    let config = cmd_init(InitOptions {
        base_dir,
        config_path,
        force,
    })
    .await?;

    println!("✓ citadel initialized successfully");
    println!("  Config: {}", config.paths.config_file.display());
    println!("  Database: {}", config.paths.db_file.display());
    println!("\nNext steps:");
    println!("  1. Edit the config file to point at another API mirror if needed");
    println!("  2. Fill the catalog: citadel sync --limit 5");
    println!("  3. Browse: citadel search character rick");
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        eprintln!(
            "Config file not found: {}\nRun 'citadel init' first.",
            config_path.display()
        );
        std::process::exit(1);
    }

    Config::load(&config_path)
}
