use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use call_sheets::app::append_use_case::{AppendOutcome, AppendUseCase};
use call_sheets::app::log_use_case::{LogOutcome, NormalizeLogUseCase};
use call_sheets::app::ports::ContactStorePort;
use call_sheets::config::{self, Config};
use call_sheets::infra::google_sheets::GoogleSheetsStore;
use call_sheets::logging;
use call_sheets::pipeline::reconcile::ContactColumns;
use call_sheets::workbook;

#[derive(Parser)]
#[command(name = "call_sheets")]
#[command(about = "Load new phone numbers into the contact spreadsheet and split call logs by category")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file; optional unless given explicitly
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the outcome as JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append phones from a workbook that the contact spreadsheet does not have yet
    Append {
        /// Workbook (.xlsx) whose sheets carry the phone and date columns
        #[arg(long)]
        workbook: PathBuf,
        /// Report the new phones without writing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Split a call-log export into one sheet per category
    Normalize {
        /// Call-log export (.csv or .xlsx)
        #[arg(long)]
        input: PathBuf,
        /// Workbook to write
        #[arg(long)]
        output: PathBuf,
        /// Category keywords in priority order (comma-separated)
        #[arg(long)]
        categories: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenv::dotenv();
    logging::init_logging();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path, true),
        None => Config::load(Path::new("config.toml"), false),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            report_failure(cli.json, &e.to_string());
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = std::io::stdout().lock();
    let result = match cli.command {
        Commands::Append { workbook, dry_run } => {
            run_append(&config, &workbook, dry_run, cli.json, &mut stdout).await
        }
        Commands::Normalize {
            input,
            output,
            categories,
        } => run_normalize(&config, &input, &output, categories, cli.json, &mut stdout),
    };
    drop(stdout);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Run failed: {:#}", e);
            report_failure(cli.json, &format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn report_failure(json: bool, message: &str) {
    if json {
        eprintln!("❌ {}", message);
    } else {
        println!("❌ {}", message);
    }
}

/// Progress lines are only for humans; with `--json` stdout carries the outcome alone.
fn progress(out: &mut impl Write, json: bool, line: &str) -> Result<()> {
    if !json {
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

async fn run_append(config: &Config, path: &Path, dry_run: bool, json: bool, out: &mut impl Write) -> Result<()> {
    progress(out, json, &format!("📞 Loading phones from {}...", path.display()))?;
    let sheets = workbook::read_workbook_file(path).with_context(|| format!("reading {}", path.display()))?;

    let token = config.access_token()?;
    let store = GoogleSheetsStore::connect(&config.store, token)
        .await
        .context("connecting to the contact spreadsheet")?;
    progress(out, json, &format!("🔗 Connected to worksheet '{}'", store.worksheet()))?;
    let store: Arc<dyn ContactStorePort> = Arc::new(store);

    let columns = ContactColumns {
        phone: config.append.phone_column.clone(),
        date: config.append.date_column.clone(),
    };
    let use_case = AppendUseCase::new(store, columns, config.timestamps.fallback).dry_run(dry_run);
    let outcome = use_case.run(&sheets).await?;

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&outcome)?)?;
    } else {
        print_append_summary(out, &outcome)?;
    }
    Ok(())
}

fn print_append_summary(out: &mut impl Write, outcome: &AppendOutcome) -> std::io::Result<()> {
    writeln!(out, "\n📊 Append results:")?;
    writeln!(out, "   Phones already in the store: {}", outcome.existing_count)?;
    writeln!(out, "   Sheets read: {}", outcome.sheets_total - outcome.skipped_sheets.len())?;
    writeln!(out, "   Rows seen: {}", outcome.rows_seen)?;

    for skipped in &outcome.skipped_sheets {
        writeln!(
            out,
            "⚠️  Sheet '{}' skipped, missing column(s): {}",
            skipped.name,
            skipped.missing.join(", ")
        )?;
    }

    if outcome.is_empty() {
        writeln!(out, "👍 No new phones found, the store is already up to date")?;
    } else if outcome.dry_run {
        writeln!(out, "🔎 {} new phones would be appended (dry run)", outcome.appended.len())?;
        for record in &outcome.appended {
            writeln!(out, "   - {} {}", record.phone, record.first_seen_at)?;
        }
    } else {
        writeln!(out, "✅ Appended {} new phones", outcome.appended.len())?;
    }
    Ok(())
}

fn run_normalize(
    config: &Config,
    input: &Path,
    output: &Path,
    categories: Option<String>,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let categories = match categories {
        Some(list) => parse_categories(&list)?,
        None => config.log.categories.clone(),
    };
    if categories.is_empty() {
        bail!("no category keywords given");
    }

    progress(out, json, &format!("🔨 Normalizing call log {}...", input.display()))?;
    let delimiter = config.log.delimiter as u8;
    let sheet = workbook::read_table_file(input, delimiter).with_context(|| format!("reading {}", input.display()))?;

    let use_case = NormalizeLogUseCase::new(categories, config.timestamps.fallback);
    let (outcome, bytes) = use_case.run_to_workbook(&sheet)?;

    if outcome.is_empty() {
        info!("No rows matched any category, nothing written");
    } else {
        std::fs::write(output, &bytes).with_context(|| format!("writing {}", output.display()))?;
        info!("Wrote {}", output.display());
    }

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&outcome)?)?;
    } else {
        print_log_summary(out, &outcome, output)?;
    }
    Ok(())
}

fn print_log_summary(out: &mut impl Write, outcome: &LogOutcome, output: &Path) -> std::io::Result<()> {
    writeln!(out, "\n📊 Call log results:")?;
    writeln!(out, "   Rows read: {}", outcome.rows_in)?;
    writeln!(out, "   Rows kept: {}", outcome.rows_out)?;
    if outcome.is_empty() {
        writeln!(out, "⚠️  No rows matched any category, no workbook written")?;
        return Ok(());
    }
    for (category, rows) in &outcome.tables {
        writeln!(out, "   {}: {}", category, rows.len())?;
    }
    writeln!(out, "✅ Workbook written to {}", output.display())
}

/// Split a comma-separated keyword list; every keyword must be usable as a sheet name.
fn parse_categories(list: &str) -> Result<Vec<String>> {
    let categories: Vec<String> = list
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    config::check_category_names(&categories)?;
    Ok(categories)
}
