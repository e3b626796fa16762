//! citelink-linker - Reading list linker
//!
//! Reads a course document (one paragraph per line), classifies each
//! paragraph and links readings to open-access copies. Long documents are
//! processed in budgeted batches; a paused run continues automatically after
//! the configured delay, or on the next `run` of the same document.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use citelink_common::config::{
    default_config_path, get_user_agent, load_toml_config, resolve_root_folder,
    RootFolderInitializer, TomlConfig, ROOT_FOLDER_ENV,
};
use citelink_linker::config::{
    engine_config, resolve_contact_email, resolve_core_api_key, resolver_settings,
    sync_credentials_to_toml,
};
use citelink_linker::db::{settings, SqliteProgressStore, SqliteResultCache};
use citelink_linker::models::{ProgressState, RunStatus};
use citelink_linker::services::document::{document_id, links_path, read_items, JsonlLinkSink};
use citelink_linker::services::engine::{ProgressStore, WallClock};
use citelink_linker::services::resolver::http::ReqwestFetcher;
use citelink_linker::services::{
    BatchEngine, BatchOutcome, CitationResolver, LibraryIndex, Resolver, ResultCache,
    TokioScheduler,
};

/// Command-line arguments for citelink-linker
#[derive(Parser, Debug)]
#[command(name = "citelink-linker")]
#[command(about = "Link course reading lists to open-access copies")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(long, global = true)]
    root_folder: Option<String>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a document, continuing a paused run if there is one
    Run {
        document: PathBuf,

        /// Directory of PDFs already held; matching readings link to them
        #[arg(long, value_name = "DIR")]
        library: Option<PathBuf>,
    },
    /// Show saved progress for a document
    Status { document: PathBuf },
    /// List items queued for manual review
    Uncertain { document: PathBuf },
    /// Forget saved progress for a document
    Reset { document: PathBuf },
    /// Delete expired cache entries
    PurgeCache,
    /// Store the contact email sent to scholarly APIs
    SetEmail { email: String },
    /// Store the CORE API key
    SetCoreKey { key: String },
}

/// Shared state for every subcommand
struct AppContext {
    db: SqlitePool,
    toml_config: TomlConfig,
    config_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = match args.config.clone() {
        Some(path) => path,
        None => default_config_path()?,
    };
    let toml_config = load_toml_config(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&toml_config.logging.level)),
        )
        .init();

    info!("Starting citelink-linker {}", env!("CARGO_PKG_VERSION"));

    let root_folder = resolve_root_folder(
        args.root_folder.as_deref(),
        ROOT_FOLDER_ENV,
        Some(&toml_config),
    );
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db = citelink_common::db::init_database(&db_path).await?;

    let ctx = AppContext {
        db,
        toml_config,
        config_path,
    };

    match args.command {
        Command::Run { document, library } => run_document(&ctx, &document, library.as_deref()).await,
        Command::Status { document } => {
            let state = load_progress(&ctx, &document).await?;
            print_status(&state);
            Ok(())
        }
        Command::Uncertain { document } => {
            let state = load_progress(&ctx, &document).await?;
            print_uncertain(&state);
            Ok(())
        }
        Command::Reset { document } => {
            reset_document(&ctx, &document).await?;
            println!("Progress cleared for {}", document.display());
            Ok(())
        }
        Command::PurgeCache => {
            let purged = SqliteResultCache::new(ctx.db.clone()).purge_expired().await?;
            println!("Purged {} expired cache entries", purged);
            Ok(())
        }
        Command::SetEmail { email } => {
            settings::set_contact_email(&ctx.db, email.clone()).await?;
            sync_credentials_to_toml(Some(&email), None, &ctx.config_path)?;
            println!("Contact email saved");
            Ok(())
        }
        Command::SetCoreKey { key } => {
            settings::set_core_api_key(&ctx.db, key.clone()).await?;
            sync_credentials_to_toml(None, Some(&key), &ctx.config_path)?;
            println!("CORE API key saved");
            Ok(())
        }
    }
}

fn progress_store(ctx: &AppContext, document: &Path) -> Result<SqliteProgressStore> {
    let id = document_id(document)
        .with_context(|| format!("Cannot resolve document path {}", document.display()))?;
    Ok(SqliteProgressStore::new(ctx.db.clone(), id))
}

async fn load_progress(ctx: &AppContext, document: &Path) -> Result<ProgressState> {
    let store = progress_store(ctx, document)?;
    Ok(store.load().await?.unwrap_or_default())
}

/// Clear saved progress; the document itself may already be gone
async fn reset_document(ctx: &AppContext, document: &Path) -> Result<()> {
    let cache: Arc<dyn ResultCache> = Arc::new(SqliteResultCache::new(ctx.db.clone()));
    let (scheduler, _resume_rx) = TokioScheduler::new(CancellationToken::new());

    let engine = BatchEngine::new(
        engine_config(&ctx.toml_config.engine),
        Arc::new(progress_store(ctx, document)?),
        Arc::new(WallClock::start()),
        Arc::new(scheduler),
        Arc::new(JsonlLinkSink::new(links_path(document))),
        Arc::new(Resolver::new(cache, ctx.toml_config.engine.cache_ttl()?)),
    );
    engine.reset().await?;
    Ok(())
}

/// Run batches until the document completes or the user interrupts
async fn run_document(ctx: &AppContext, document: &Path, library: Option<&Path>) -> Result<()> {
    let items = read_items(document).await?;
    info!(document = %document.display(), items = items.len(), "Document loaded");

    let contact_email = resolve_contact_email(&ctx.db, &ctx.toml_config).await?;
    let core_api_key = resolve_core_api_key(&ctx.db, &ctx.toml_config).await?;
    let config = engine_config(&ctx.toml_config.engine);
    let resolver_config = resolver_settings(&ctx.toml_config.engine, contact_email, core_api_key)?;

    let fetcher = Arc::new(ReqwestFetcher::new(&get_user_agent())?);
    let cache: Arc<dyn ResultCache> = Arc::new(SqliteResultCache::new(ctx.db.clone()));
    let resolver: Arc<dyn CitationResolver> =
        Arc::new(Resolver::standard(fetcher, cache, &resolver_config));

    let store = Arc::new(progress_store(ctx, document)?);
    let sink = Arc::new(JsonlLinkSink::new(links_path(document)));

    let library = match library {
        Some(dir) => Some(Arc::new(LibraryIndex::from_directory(dir)?)),
        None => None,
    };

    let shutdown = CancellationToken::new();
    let (scheduler, mut resume_rx) = TokioScheduler::new(shutdown.clone());
    let scheduler = Arc::new(scheduler);

    loop {
        // Each continuation gets a fresh budget
        let mut engine = BatchEngine::new(
            config.clone(),
            store.clone(),
            Arc::new(WallClock::start()),
            scheduler.clone(),
            sink.clone(),
            resolver.clone(),
        );
        if let Some(index) = &library {
            engine = engine.with_library(index.clone());
        }

        let outcome = engine.run_batch(&items).await?;
        print_outcome(&outcome);

        if outcome.status != RunStatus::Paused {
            break;
        }

        tokio::select! {
            fired = resume_rx.recv() => {
                if fired.is_none() {
                    break;
                }
                info!("Continuing paused run");
            }
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C; progress is saved, run again to continue");
                shutdown.cancel();
                break;
            }
        }
    }

    println!("Links written to {}", links_path(document).display());
    Ok(())
}

fn print_outcome(outcome: &BatchOutcome) {
    let stats = &outcome.statistics;
    println!(
        "{}: {} citations, {} linked ({} web, {} library), {} not found, {} uncertain",
        outcome.status,
        stats.citations_seen,
        stats.linked,
        stats.web_links,
        stats.matched_existing,
        stats.not_found,
        outcome.uncertain_items.len()
    );
    if let Some(delay) = outcome.continuation {
        println!("Continuing in {}s", delay.as_secs());
    }
}

fn print_status(state: &ProgressState) {
    let stats = &state.statistics;
    println!("Status:         {}", state.status);
    println!("Next index:     {}", state.current_index);
    println!("Processed:      {}", state.processed_indices.len());
    println!("Citations:      {}", stats.citations_seen);
    println!("Linked:         {}", stats.linked);
    println!("  web links:    {}", stats.web_links);
    println!("  from library: {}", stats.matched_existing);
    println!("Not found:      {}", stats.not_found);
    println!("Uncertain:      {}", state.uncertain_items.len());
    println!("Updated:        {}", state.updated_at.to_rfc3339());
}

fn print_uncertain(state: &ProgressState) {
    if state.uncertain_items.is_empty() {
        println!("No uncertain items");
        return;
    }
    for item in &state.uncertain_items {
        let section = item.section_marker.as_deref().unwrap_or("-");
        println!(
            "[{}] line {} ({}) score {}: {}",
            item.index,
            item.line + 1,
            section,
            item.score,
            item.text
        );
        for reason in &item.reasons {
            println!("      {}", reason);
        }
    }
}
