//! Tenets CLI
//!
//! Thin operator tool over `tenets-core`'s dedup/merge engine: run a scan
//! against the reference SQLite backend, or tail the decision log.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use tenets_core::cancellation::NeverCancelled;
use tenets_core::dedup::{CrossStoreDeduplicator, DeduplicatorConfig, IntraStoreDeduplicator};
use tenets_core::store::SqliteGraphStore;

/// Tenets - behavior dedup/merge engine operator CLI
#[derive(Parser)]
#[command(name = "tenets")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator CLI for the tenets behavior dedup/merge engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Intra-Store Deduplicator against a SQLite behavior graph.
    DedupStore {
        /// Path to the SQLite database file.
        db_path: PathBuf,

        /// Merge and write back clusters of duplicates instead of only reporting them.
        #[arg(long)]
        auto_merge: bool,

        /// Enable the LLM/embedding similarity branches (requires a configured client; off by default uses Jaccard only).
        #[arg(long)]
        use_llm: bool,

        /// Lexical/LLM similarity threshold.
        #[arg(long, default_value_t = 0.9)]
        threshold: f64,

        /// Embedding-specific threshold; 0 falls back to --threshold.
        #[arg(long, default_value_t = 0.7)]
        embedding_threshold: f64,
    },

    /// Run the Cross-Store Deduplicator between a local and a global SQLite graph.
    DedupCross {
        /// Path to the local (project-scoped) database.
        local_db: PathBuf,

        /// Path to the global (user-wide) database.
        global_db: PathBuf,

        /// Merge matches above threshold and redirect edges instead of only reporting them.
        #[arg(long)]
        auto_merge: bool,

        /// Similarity threshold for a cross-store match.
        #[arg(long, default_value_t = 0.9)]
        threshold: f64,
    },

    /// Pretty-print the last N lines of a decisions.jsonl audit log.
    TailDecisions {
        /// Path to the decisions.jsonl file.
        path: PathBuf,

        /// Number of trailing lines to show.
        #[arg(short = 'n', long, default_value_t = 20)]
        lines: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::DedupStore {
            db_path,
            auto_merge,
            use_llm,
            threshold,
            embedding_threshold,
        } => run_dedup_store(db_path, auto_merge, use_llm, threshold, embedding_threshold),
        Commands::DedupCross {
            local_db,
            global_db,
            auto_merge,
            threshold,
        } => run_dedup_cross(local_db, global_db, auto_merge, threshold),
        Commands::TailDecisions { path, lines } => run_tail_decisions(path, lines),
    }
}

fn run_dedup_store(
    db_path: PathBuf,
    auto_merge: bool,
    use_llm: bool,
    threshold: f64,
    embedding_threshold: f64,
) -> anyhow::Result<()> {
    tracing::info!(db = %db_path.display(), auto_merge, use_llm, "starting intra-store scan");
    let store = SqliteGraphStore::open(&db_path)?;
    let dedup = IntraStoreDeduplicator {
        store: &store,
        scoped_store: Some(&store),
        config: DeduplicatorConfig {
            similarity_threshold: threshold,
            embedding_threshold,
            auto_merge,
            use_llm,
            max_batch_size: 100,
        },
        llm_client: None,
        embedding_client: None,
        logger: None,
    };

    let report = dedup.deduplicate_store(&NeverCancelled);
    tracing::info!(merges = report.merges_performed, errors = report.errors.len(), "intra-store scan complete");

    println!("{}", "=== Dedup Store Report ===".cyan().bold());
    println!("{}: {}", "Total behaviors".white().bold(), report.total_behaviors);
    println!("{}: {}", "Duplicates found".white().bold(), report.duplicates_found);
    println!("{}: {}", "Merges performed".white().bold(), report.merges_performed);

    if !report.merged_behavior_ids.is_empty() {
        println!("{}", "Merged ids:".dimmed());
        for id in &report.merged_behavior_ids {
            println!("  - {id}");
        }
    }
    if !report.errors.is_empty() {
        println!("{}", "Errors:".red().bold());
        for err in &report.errors {
            println!("  {} {err}", "!".red());
        }
    }

    store.sync().ok();
    Ok(())
}

fn run_dedup_cross(local_db: PathBuf, global_db: PathBuf, auto_merge: bool, threshold: f64) -> anyhow::Result<()> {
    tracing::info!(local = %local_db.display(), global = %global_db.display(), auto_merge, "starting cross-store scan");
    let local = SqliteGraphStore::open(&local_db)?;
    let global = SqliteGraphStore::open(&global_db)?;

    let dedup = CrossStoreDeduplicator {
        local: &local,
        global: &global,
        config: DeduplicatorConfig {
            similarity_threshold: threshold,
            embedding_threshold: 0.0,
            auto_merge,
            use_llm: false,
            max_batch_size: 100,
        },
        llm_client: None,
        embedding_client: None,
        logger: None,
    };

    let results = dedup.deduplicate_across()?;

    println!("{}", "=== Dedup Cross Report ===".cyan().bold());
    for result in &results {
        let action_label = match result.action {
            tenets_core::behavior::DedupAction::None => "none".dimmed(),
            tenets_core::behavior::DedupAction::Skip => "skip".yellow(),
            tenets_core::behavior::DedupAction::Merge => "merge".green().bold(),
        };
        print!("{:<24} {action_label}", result.local.id);
        if let Some(score) = result.similarity {
            print!("  score={score:.3}");
        }
        if let Some(global) = &result.global_match {
            print!("  vs={}", global.id);
        }
        if let Some(err) = &result.error {
            print!("  {} {err}", "error:".red());
        }
        println!();
    }

    local.sync().ok();
    global.sync().ok();
    Ok(())
}

fn run_tail_decisions(path: PathBuf, lines: usize) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(&path)?;
    let all_lines: Vec<&str> = contents.lines().collect();
    let start = all_lines.len().saturating_sub(lines);

    for line in &all_lines[start..] {
        let parsed: serde_json::Value = serde_json::from_str(line)?;
        let event = parsed["event"].as_str().unwrap_or("unknown");
        let colored_event = match event {
            "similarity_computed" => event.blue(),
            "auto_merge_triggered" => event.green(),
            "auto_merge_skipped" => event.yellow(),
            _ => event.normal(),
        };
        println!("{colored_event} {parsed}");
    }

    Ok(())
}
