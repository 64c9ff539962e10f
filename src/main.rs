use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use chat_engagement::config::AppConfig;
use chat_engagement::logging::{init_logging, OperationTimer};
use chat_engagement::models::NewMember;
use chat_engagement::parser::TranscriptParser;
use chat_engagement::stats::MessageStats;
use chat_engagement::validation::InputValidator;
use chat_engagement::{Database, IngestPipeline, RecalculationSummary, RunSummary};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file layered over the defaults
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a transcript, resolve senders and update engagement metrics
    Import {
        /// Path to the exported transcript
        file: PathBuf,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recompute engagement metrics from every stored matched message
    Recalculate {
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Parse a transcript and print statistics without storing anything
    Stats {
        /// Path to the exported transcript
        file: PathBuf,
    },
    /// Add a member to the directory, or update an existing one
    AddMember {
        /// Stable member id
        #[arg(long)]
        id: String,

        /// Full name as it should be matched against sender names
        #[arg(short, long)]
        name: String,

        /// Phone number
        #[arg(short, long)]
        phone: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;

    // Initialize logging; the guard keeps the file writer alive
    let log_file = config.logging.file_path.as_deref().map(Path::new);
    let _log_guard = init_logging(Some(&config.get_log_level()), log_file, config.json_logs())
        .context("Failed to initialize logging")?;

    info!("Starting chat-engagement");

    match &cli.command {
        Commands::Import { file, json } => import_transcript(&config, file, *json).await?,
        Commands::Recalculate { json } => recalculate_metrics(&config, *json).await?,
        Commands::Stats { file } => transcript_stats(file)?,
        Commands::AddMember { id, name, phone } => add_member(&config, id, name, phone.as_deref())?,
    }

    Ok(())
}

fn open_database(config: &AppConfig) -> Result<Database> {
    Database::with_pool_size(&config.database.url, config.database.max_connections)
        .with_context(|| format!("Failed to open database at {}", config.database.url))
}

fn read_transcript(file: &Path) -> Result<String> {
    InputValidator::validate_transcript_path(file)?;
    std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read transcript {}", file.display()))
}

/// Abort flag raised on Ctrl-C; the pipeline stops before its next batch
fn abort_on_interrupt() -> Arc<AtomicBool> {
    let abort = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&abort);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current batch");
            flag.store(true, Ordering::SeqCst);
        }
    });
    abort
}

/// Import one transcript into the database
async fn import_transcript(config: &AppConfig, file: &Path, json: bool) -> Result<()> {
    let timer = OperationTimer::new("import_transcript");
    let transcript = read_transcript(file)?;
    let db = open_database(config)?;

    let pipeline = IngestPipeline::new(&db, &db, &db)?
        .with_config(&config.ingest)
        .with_abort_flag(abort_on_interrupt());

    let summary = pipeline
        .run(&transcript, Local::now().naive_local())
        .await
        .with_context(|| format!("Import of {} failed", file.display()))?;
    timer.finish();

    print_run_summary(&summary, config.ingest.unmatched_preview, json)
}

/// Recompute metrics for every member with stored messages
async fn recalculate_metrics(config: &AppConfig, json: bool) -> Result<()> {
    let db = open_database(config)?;

    let pipeline = IngestPipeline::new(&db, &db, &db)?
        .with_config(&config.ingest)
        .with_abort_flag(abort_on_interrupt());

    let summary = pipeline
        .recalculate(Local::now().naive_local())
        .await
        .context("Metrics recalculation failed")?;

    print_recalculation_summary(&summary, json)
}

/// Parse only and report what the transcript contains
#[allow(clippy::print_stdout)]
fn transcript_stats(file: &Path) -> Result<()> {
    let transcript = read_transcript(file)?;
    let messages = TranscriptParser::new()?.parse(&transcript)?;
    let stats = MessageStats::from_messages(&messages);

    println!("Messages:       {}", stats.total_messages);
    println!("Unique senders: {}", stats.unique_sender_count());
    if let (Some(first), Some(last)) = (stats.first_timestamp, stats.last_timestamp) {
        println!("Span:           {first} .. {last}");
    }
    println!("By type:");
    for (message_type, count) in &stats.by_type {
        println!("  {message_type:<8} {count}");
    }
    println!("By sender:");
    for (sender, count) in &stats.by_sender {
        println!("  {sender}: {count}");
    }

    Ok(())
}

/// Add or update a directory member
#[allow(clippy::print_stdout)]
fn add_member(config: &AppConfig, id: &str, name: &str, phone: Option<&str>) -> Result<()> {
    let db = open_database(config)?;

    let member = db
        .add_or_update_member(NewMember {
            id: id.to_string(),
            full_name: name.to_string(),
            phone_number: phone.map(str::to_string),
        })
        .with_context(|| format!("Failed to save member {id}"))?;

    info!(member_id = %member.id, "Member saved");
    println!("{} {}", member.id, member.full_name);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_run_summary(summary: &RunSummary, preview: usize, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("Parsed:           {}", summary.total_parsed);
    println!(
        "Senders:          {} ({} matched, {} unmatched)",
        summary.unique_senders,
        summary.matched_senders,
        summary.unmatched_senders.len()
    );
    for name in summary.unmatched_senders.iter().take(preview) {
        println!("  unmatched: {name}");
    }
    if summary.unmatched_senders.len() > preview {
        println!("  ... and {} more", summary.unmatched_senders.len() - preview);
    }
    println!(
        "Imported:         {} new, {} already stored ({} errors in {} failed batches)",
        summary.messages_imported,
        summary.duplicates_skipped,
        summary.import_errors,
        summary.failed_batches
    );
    println!(
        "Metrics updated:  {} ({} errors)",
        summary.metrics_updated, summary.metrics_errors
    );
    print_distribution(&summary.behavior_distribution);
    if summary.aborted {
        println!("Run aborted before completion");
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_recalculation_summary(summary: &RecalculationSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("Messages considered: {}", summary.messages_considered);
    println!("Members scored:      {}", summary.members_scored);
    println!(
        "Metrics updated:     {} ({} errors)",
        summary.metrics_updated, summary.metrics_errors
    );
    print_distribution(&summary.behavior_distribution);
    if summary.aborted {
        println!("Recalculation aborted before completion");
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_distribution(distribution: &chat_engagement::models::BehaviorDistribution) {
    println!("Behavior types:");
    println!("  champion:     {}", distribution.champion);
    println!("  contributing: {}", distribution.contributing);
    println!("  curious:      {}", distribution.curious);
    println!("  encouraging:  {}", distribution.encouraging);
    println!("  quiet:        {}", distribution.quiet);
}
