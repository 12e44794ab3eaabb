// storymap entry point.
//
// Every subcommand starts the same way:
// 1. Initialize tracing (stderr)
// 2. Load config from `<base-dir>/config`, copying defaults on first run
// 3. Open the store, seeding it from the static snapshot when empty
// 4. Build the classification pipeline
// then either serves the API or runs one maintenance task and exits.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use storymap_classify::evaluate::{evaluate, write_mismatches};
use storymap_classify::{read_rows, StoryRow};
use storymap_core::config;
use storymap_server::{maintenance, router, AppState};
use tracing::info;

#[derive(Parser)]
#[command(name = "storymap", about = "Newsroom story catalogue and geographic classifier")]
struct Cli {
    /// Directory holding `config/`, `defaults/`, and `data/`.
    #[arg(long, global = true, default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the JSON API.
    Serve,
    /// Import new articles listed in the configured sitemaps.
    ImportSitemap {
        /// Process at most this many new URLs.
        #[arg(long)]
        max_articles: Option<usize>,
    },
    /// Classify a CSV or Excel story list and merge it into the store.
    Classify { file: PathBuf },
    /// Re-classify stored stories missing geography and backfill metadata.
    Reprocess,
    /// Remove non-news pages from the store.
    Clean {
        /// Write a JSON report of removed stories here.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Report what would be removed without deleting anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Score a predicted story list against a hand-labelled one.
    Evaluate {
        predicted: PathBuf,
        manual: PathBuf,
        /// Write per-story disagreements to this CSV file.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write all stories and filter lists to a snapshot file, or the review
    /// tables to a directory of CSV files.
    Export {
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    /// Snapshot JSON, the format the map loads.
    Json,
    /// One CSV per review table.
    Csv,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let config = config::load_config_in(&cli.base_dir).context("failed to load configuration")?;
    info!("Config loaded from {}", cli.base_dir.join("config").display());

    let state = Arc::new(AppState::from_config(&config)?);

    match cli.command {
        Command::Serve => {
            let addr = format!("{}:{}", config.server.host, config.server.port);
            let app = router(state.clone(), config.server.max_upload_bytes);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            info!("storymap API listening on http://{addr}");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("server error")?;
            info!("storymap shut down cleanly");
        }
        Command::ImportSitemap { max_articles } => {
            let report = state.importer.run(&state.db, max_articles).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Classify { file } => {
            let rows = read_story_list(&file)?;
            let output = state.pipeline.run(rows).await;
            let merged = state.db.insert_new(&output.stories)?;
            info!(
                "Classified {} stories: {} new, {} duplicates, {} with places (avg confidence {:.2})",
                output.stories.len(),
                merged.new_count,
                merged.duplicate_count,
                output.report.stories_with_places,
                output.report.average_confidence
            );
            println!("{}", serde_json::to_string_pretty(&output.report)?);
        }
        Command::Reprocess => {
            let updated = maintenance::reprocess_stories(&state.db, &state.pipeline).await?;
            println!("Updated {updated} stories");
        }
        Command::Clean { report, dry_run } => {
            let result = maintenance::clean_non_news(&state.db, dry_run)?;
            if let Some(path) = report {
                maintenance::write_clean_report(&result, &path)?;
                info!("Cleaning report written to {}", path.display());
            }
            println!(
                "{} of {} stories {} ({} kept)",
                result.removed_count,
                result.original_count,
                if dry_run { "would be removed" } else { "removed" },
                result.kept_count
            );
            for (reason, count) in &result.reason_counts {
                println!("  {reason}: {count}");
            }
        }
        Command::Evaluate { predicted, manual, out } => {
            let evaluation = evaluate(&read_story_list(&predicted)?, &read_story_list(&manual)?);
            info!(
                "Compared {} stories, {} disagreements",
                evaluation.matched_stories,
                evaluation.mismatches.len()
            );
            if let Some(path) = out {
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                write_mismatches(&evaluation.mismatches, file)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!("Disagreements written to {}", path.display());
            }
            println!("{}", serde_json::to_string_pretty(&evaluation)?);
        }
        Command::Export { path, format: ExportFormat::Json } => {
            let count = maintenance::export_snapshot(&state.db, &path)?;
            println!("Exported {count} stories to {}", path.display());
        }
        Command::Export { path, format: ExportFormat::Csv } => {
            for file in maintenance::export_review(&state.db, &path)? {
                println!("{}", file.display());
            }
        }
    }

    Ok(())
}

fn read_story_list(path: &Path) -> anyhow::Result<Vec<StoryRow>> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    read_rows(&file_name, &bytes).with_context(|| format!("failed to parse {}", path.display()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// Log to stderr so command output on stdout stays machine-readable.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("storymap=info,tower_http=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
