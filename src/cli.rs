//! CLI argument parsing and command dispatch

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use roster_overlap::{
    create_checkpoint, list_checkpoints, list_runs, open_ledger, record_run, restore_checkpoint,
    ledger::issues_for_run, ChangeBatch, EngineConfig, OverlapEngine, RosterBatch, RunEntry,
};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Roster Overlap - check proposed roster changes against the current roster
#[derive(Parser, Debug)]
#[command(name = "roster-overlap")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Set log level (error, warn, info, debug, trace); RUST_LOG wins if set
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a change batch against the roster and write the overlap report
    Check(CheckArgs),

    /// Create, list, or restore roster checkpoints
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointCommand,
    },

    /// Show previous runs recorded in a ledger
    History(HistoryArgs),
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Current full roster (CSV with provider_npi, tax_id, contract_id)
    #[arg(short, long)]
    roster: PathBuf,

    /// Change file(s); several are merged and sorted by contract, action, NPI
    #[arg(short, long, required = true)]
    changes: Vec<PathBuf>,

    /// Where to write the overlap report CSV
    #[arg(short, long)]
    output: PathBuf,

    /// Write the text summary here
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Write the summary as JSON here
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Engine configuration JSON
    #[arg(long, env = "ROSTER_OVERLAP_CONFIG")]
    config: Option<PathBuf>,

    /// Record this run in a SQLite ledger
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// Match on the current thread only
    #[arg(long)]
    sequential: bool,
}

#[derive(Subcommand, Debug)]
enum CheckpointCommand {
    /// Snapshot a roster file
    Create {
        roster_file: PathBuf,
        #[arg(short, long)]
        label: Option<String>,
        #[arg(short, long, default_value = "rosters/checkpoints")]
        dir: PathBuf,
    },
    /// List checkpoints, newest first
    List {
        #[arg(short, long, default_value = "rosters/checkpoints")]
        dir: PathBuf,
    },
    /// Copy a checkpoint (path or name pattern) back out
    Restore {
        checkpoint: String,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long, default_value = "rosters/checkpoints")]
        dir: PathBuf,
    },
}

#[derive(Args, Debug)]
struct HistoryArgs {
    #[arg(long)]
    ledger: PathBuf,

    #[arg(short = 'n', long, default_value_t = 20)]
    limit: usize,

    /// Show the flagged rows of one run instead of the run list
    #[arg(long, value_name = "RUN_ID")]
    run: Option<String>,
}

impl Cli {
    pub fn init_logging(&self) {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&self.log_level))
            .format_timestamp(None)
            .init();
    }

    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Check(args) => run_check(args),
            Commands::Checkpoint { action } => run_checkpoint(action),
            Commands::History(args) => run_history(args),
        }
    }
}

fn run_check(args: CheckArgs) -> Result<()> {
    println!("🔍 Roster Overlap Check");
    println!("{}", RULE);

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_path(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if args.sequential {
        config.parallel = false;
    }
    let engine = OverlapEngine::new(config)?;

    // 1. Load roster
    println!("\n📂 Loading roster...");
    let roster_bytes = std::fs::read(&args.roster)
        .with_context(|| format!("Failed to read roster {}", args.roster.display()))?;
    let roster = RosterBatch::from_reader(args.roster.display().to_string(), roster_bytes.as_slice())
        .with_context(|| format!("Failed to load roster {}", args.roster.display()))?;
    println!("✓ Loaded {} roster records", roster.len());

    // 2. Load change batch(es)
    println!("\n📂 Loading changes...");
    let mut batches = Vec::new();
    for path in &args.changes {
        let batch = ChangeBatch::from_csv_path(path)
            .with_context(|| format!("Failed to load change file {}", path.display()))?;
        println!("✓ {} ({} rows)", path.display(), batch.len());
        batches.push(batch);
    }
    let changes = if batches.len() == 1 {
        batches.remove(0)
    } else {
        ChangeBatch::concat(batches)
    };

    // 3. Overlap pass
    println!("\n⚖️  Checking overlaps...");
    let mut run = engine.run(&roster, &changes)?;
    let report_sha256 = run
        .report
        .save(&args.output)
        .with_context(|| format!("Failed to write report {}", args.output.display()))?;
    run.summary.report_sha256 = Some(report_sha256.clone());
    println!("✓ Report saved: {} ({} rows)", args.output.display(), run.report.len());

    // 4. Summary
    let text = run.summary.render_text();
    if let Some(path) = &args.summary {
        std::fs::write(path, &text)
            .with_context(|| format!("Failed to write summary {}", path.display()))?;
        println!("✓ Summary saved: {}", path.display());
    }
    if let Some(path) = &args.summary_json {
        std::fs::write(path, run.summary.to_json()?)
            .with_context(|| format!("Failed to write summary {}", path.display()))?;
        println!("✓ JSON summary saved: {}", path.display());
    }

    // 5. Ledger
    if let Some(path) = &args.ledger {
        let mut conn = open_ledger(path)
            .with_context(|| format!("Failed to open ledger {}", path.display()))?;
        let entry = RunEntry::new(
            &run.summary,
            &roster_overlap::report::sha256_hex(&roster_bytes),
            &report_sha256,
        );
        record_run(&mut conn, &entry, &run.report)?;
        println!("✓ Run {} recorded in {}", entry.run_id, path.display());
    }

    println!("\n{}", text);

    if run.summary.excluded_records > 0 {
        println!(
            "\n⚠ {} records were excluded from matching; see ISSUES in the report",
            run.summary.excluded_records
        );
    }

    Ok(())
}

fn run_checkpoint(action: CheckpointCommand) -> Result<()> {
    match action {
        CheckpointCommand::Create {
            roster_file,
            label,
            dir,
        } => {
            let metadata = create_checkpoint(&roster_file, &dir, label.as_deref())
                .with_context(|| format!("Failed to checkpoint {}", roster_file.display()))?;
            println!("✓ Checkpoint created: {}", metadata.checkpoint_name);
            println!("  Location: {}", dir.join(&metadata.checkpoint_name).display());
            println!("  Size: {} bytes", metadata.file_size);
            if let Some(label) = &metadata.label {
                println!("  Label: {}", label);
            }
        }
        CheckpointCommand::List { dir } => {
            let checkpoints = list_checkpoints(&dir)?;
            if checkpoints.is_empty() {
                println!("No checkpoints found in {}", dir.display());
                return Ok(());
            }
            println!("AVAILABLE CHECKPOINTS ({})\n", checkpoints.len());
            for (i, cp) in checkpoints.iter().enumerate() {
                println!("{}. {}", i + 1, cp.checkpoint_name);
                println!("   Created: {}", cp.created_at.format("%Y-%m-%d %H:%M:%S"));
                if let Some(label) = &cp.label {
                    println!("   Label: {}", label);
                }
                println!("   Size: {} bytes", cp.file_size);
            }
        }
        CheckpointCommand::Restore {
            checkpoint,
            output,
            dir,
        } => {
            let source = restore_checkpoint(&checkpoint, &dir, &output)?;
            println!("✓ Checkpoint restored");
            println!("  From: {}", source.display());
            println!("  To: {}", output.display());
        }
    }
    Ok(())
}

fn run_history(args: HistoryArgs) -> Result<()> {
    let conn = open_ledger(&args.ledger)
        .with_context(|| format!("Failed to open ledger {}", args.ledger.display()))?;

    if let Some(run_id) = &args.run {
        let issues = issues_for_run(&conn, run_id)?;
        if issues.is_empty() {
            println!("No flagged rows for run {}", run_id);
        }
        for (position, tags) in issues {
            println!("row {}: {}", position, tags);
        }
        return Ok(());
    }

    let runs = list_runs(&conn, args.limit)?;

    if runs.is_empty() {
        println!("No runs recorded in {}", args.ledger.display());
        return Ok(());
    }

    for run in runs {
        println!(
            "{}  {}  {} records ({} excluded), {} duplicate ADDs, {} unmatched TERMs",
            run.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            run.run_id,
            run.total_records,
            run.excluded_records,
            run.duplicate_adds,
            run.terms_without_match
        );
        println!("    roster: {}  changes: {}", run.roster_source, run.change_source);
    }
    Ok(())
}
