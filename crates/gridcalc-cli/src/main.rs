//! gridcalc CLI - evaluate spreadsheet formulas against a JSON workbook

mod load;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use gridcalc::{
    evaluate_formula_at, evaluate_formula_with, find_function_call, split_arguments,
    CalculationOptions, Calculator, CellAddress, CellValue, EvaluationOptions,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gridcalc")]
#[command(author, version, about = "Spreadsheet formula evaluator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v debug, -vv trace); -q keeps only warnings
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Maximum nesting of cell references before giving up with #ERROR!
    #[arg(long, global = true, default_value_t = EvaluationOptions::default().max_depth)]
    max_depth: usize,

    /// Fixed clock for TODAY()/NOW(): YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS
    #[arg(long, global = true, value_parser = parse_now)]
    now: Option<NaiveDateTime>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a formula against a workbook
    Eval {
        /// Workbook JSON file
        input: PathBuf,

        /// Formula to evaluate, e.g. "=SUM(A1:A3)"
        formula: String,

        /// Sheet that unqualified references point at (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Calling cell, e.g. B4 (used by ROW()/COLUMN() and cycle detection)
        #[arg(short, long)]
        cell: Option<String>,
    },

    /// Calculate a sheet and print it as tab-separated values
    #[command(alias = "tsv")]
    Calc {
        /// Workbook JSON file
        input: PathBuf,

        /// Sheet to calculate (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,
    },

    /// Show the top-level function call of a formula and its arguments
    Inspect {
        /// Formula text
        formula: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let options = EvaluationOptions {
        max_depth: cli.max_depth,
        now: cli.now,
    };

    match cli.command {
        Commands::Eval {
            input,
            formula,
            sheet,
            cell,
        } => eval(&input, &formula, sheet.as_deref(), cell.as_deref(), &options),
        Commands::Calc { input, sheet } => calc(&input, sheet.as_deref(), options),
        Commands::Inspect { formula } => inspect(&formula),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn parse_now(s: &str) -> std::result::Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .map_err(|e| format!("expected YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS: {}", e))
}

fn eval(
    input: &Path,
    formula: &str,
    sheet: Option<&str>,
    cell: Option<&str>,
    options: &EvaluationOptions,
) -> Result<()> {
    let workbook = load::load_workbook(input)?;
    let sheet_id = load::select_sheet(&workbook, sheet)?;

    let value = match cell {
        None => evaluate_formula_with(formula, &workbook, &sheet_id, options),
        Some(cell) => {
            let addr = CellAddress::parse(cell)
                .with_context(|| format!("Invalid calling cell '{}'", cell))?;
            debug!(sheet = %sheet_id, cell = %addr, "evaluating at calling cell");
            evaluate_formula_at(formula, &workbook, &sheet_id, addr.row, addr.col, options)
        }
    };

    println!("{}", value);
    Ok(())
}

fn calc(input: &Path, sheet: Option<&str>, options: EvaluationOptions) -> Result<()> {
    let workbook = load::load_workbook(input)?;
    let sheet_id = load::select_sheet(&workbook, sheet)?;

    let mut calculator = Calculator::new(CalculationOptions {
        evaluation: options,
        ..CalculationOptions::default()
    });
    let (grid, stats) = calculator
        .calculate_sheet(&workbook, &sheet_id)
        .context("Failed to calculate sheet")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    out.write_all(to_tsv(&grid).as_bytes())
        .context("Failed to write to stdout")?;
    out.flush().context("Failed to write to stdout")?;

    info!(
        sheet = %sheet_id,
        formulas = stats.formula_count,
        errors = stats.errors,
        circular = stats.circular,
        "calculated sheet"
    );
    Ok(())
}

/// Render a materialised grid as tab-separated lines
fn to_tsv(grid: &[Vec<CellValue>]) -> String {
    let mut output = String::new();
    for row in grid {
        let line: Vec<String> = row.iter().map(tsv_field).collect();
        output.push_str(&line.join("\t"));
        output.push('\n');
    }
    output
}

fn tsv_field(value: &CellValue) -> String {
    value.to_string().replace(['\t', '\n', '\r'], " ")
}

fn inspect(formula: &str) -> Result<()> {
    let body = formula.trim().strip_prefix('=').unwrap_or(formula.trim());
    let call = match find_function_call(body) {
        Some(call) => call,
        None => {
            println!("no function call at the start of '{}'", body);
            return Ok(());
        }
    };

    let whole = if call.is_whole(body) { "whole formula" } else { "prefix" };
    println!("{} ({})", call.name, whole);
    for (i, arg) in split_arguments(&call.args_text).iter().enumerate() {
        println!("  {}: {}", i + 1, arg);
    }
    Ok(())
}
