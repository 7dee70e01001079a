//! Command-line interface for the telemetry pipeline.

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::core::loaders::{load_telemetry_csvs, RawRow};
use crate::core::writers::{write_enhanced_csv, write_kml};
use crate::processors::fields::resolve_row;
use crate::processors::normalize::normalize_rows;
use crate::processors::outliers::{detect, Verdict};
use crate::processors::track::{sanitize_track, TrackSummary};
use crate::visualization::assemble_track;

#[derive(Parser)]
#[command(name = "telemetry-pipeline")]
#[command(about = "Flight telemetry GPS sanitization pipeline", version)]
pub struct Cli {
    /// Path to YAML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sanitize telemetry CSV logs and export a KML flight path
    Convert {
        /// Input CSV log files, concatenated in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output KML path (defaults to the last input with a .kml extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Sanitize telemetry CSV logs and write the enhanced CSV
    ExportCsv {
        /// Input CSV log files, concatenated in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output CSV path (defaults to the last input stem + _enhanced.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report fix verdict statistics without writing any output
    Inspect {
        /// Input CSV log files, concatenated in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.len() > 39 {
            format!("{}...", &value[..36])
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn track_name(inputs: &[PathBuf]) -> String {
    inputs
        .last()
        .and_then(|path| path.file_stem())
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "telemetry".to_string())
}

fn default_output(inputs: &[PathBuf], extension: &str, suffix: &str) -> PathBuf {
    let last = inputs.last().cloned().unwrap_or_else(|| PathBuf::from("track"));
    let stem = last
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "track".to_string());
    last.with_file_name(format!("{}{}.{}", stem, suffix, extension))
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load settings; a malformed file aborts before any record is touched
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded settings from: {}", path.display());
                cfg
            }
            Err(e) => {
                error!("Invalid settings file {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Convert { inputs, output } => {
            cmd_convert(&inputs, output, &config);
        }
        Commands::ExportCsv { inputs, output } => {
            cmd_export_csv(&inputs, output, &config);
        }
        Commands::Inspect { inputs } => {
            cmd_inspect(&inputs, &config);
        }
    }
}

fn sanitize_inputs(
    inputs: &[PathBuf],
    config: &PipelineConfig,
    spinner: &ProgressBar,
) -> (Vec<crate::TelemetryRecord>, TrackSummary) {
    let rows = match load_telemetry_csvs(inputs, &config.header_renames) {
        Ok(rows) => rows,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to read telemetry logs: {}", e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Sanitizing GPS fixes...");

    match sanitize_track(&rows, config) {
        Ok(result) => result,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Sanitization failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn summary_items<'a>(
    inputs: &[PathBuf],
    output: Option<&Path>,
    summary: &TrackSummary,
    start: Instant,
) -> Vec<(&'a str, String)> {
    let input_names: Vec<String> = inputs.iter().map(|p| p.display().to_string()).collect();
    let mut items = vec![("Input files", input_names.join(", "))];
    if let Some(output) = output {
        items.push(("Output", output.display().to_string()));
    }
    items.extend([
        ("Points", summary.points.to_string()),
        ("Valid fixes", summary.valid.to_string()),
        ("Repaired fixes", summary.repaired.to_string()),
        ("Duration", format!("{:.2?}", start.elapsed())),
    ]);
    items
}

fn cmd_convert(inputs: &[PathBuf], output: Option<PathBuf>, config: &PipelineConfig) {
    let start = Instant::now();
    let output = output.unwrap_or_else(|| default_output(inputs, "kml", ""));

    let spinner = create_spinner("Reading telemetry logs...");
    let (records, summary) = sanitize_inputs(inputs, config, &spinner);

    spinner.set_message("Writing KML...");

    let track = match assemble_track(&track_name(inputs), &records, config) {
        Ok(track) => track,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Assembly failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = write_kml(&output, &track) {
        spinner.finish_and_clear();
        error!("Failed to write KML: {}", e);
        std::process::exit(1);
    }

    spinner.finish_and_clear();
    print_summary(
        "Conversion Complete",
        &summary_items(inputs, Some(&output), &summary, start),
    );
}

fn cmd_export_csv(inputs: &[PathBuf], output: Option<PathBuf>, config: &PipelineConfig) {
    let start = Instant::now();
    let output = output.unwrap_or_else(|| default_output(inputs, "csv", "_enhanced"));

    let spinner = create_spinner("Reading telemetry logs...");
    let (records, summary) = sanitize_inputs(inputs, config, &spinner);

    spinner.set_message("Writing enhanced CSV...");

    if let Err(e) = write_enhanced_csv(&output, &records, config) {
        spinner.finish_and_clear();
        error!("Failed to write CSV: {}", e);
        std::process::exit(1);
    }

    spinner.finish_and_clear();
    print_summary(
        "Export Complete",
        &summary_items(inputs, Some(&output), &summary, start),
    );
}

fn inspect_verdicts(rows: &[RawRow], config: &PipelineConfig) -> anyhow::Result<Vec<Verdict>> {
    let canonical: Vec<_> = rows
        .iter()
        .map(|row| resolve_row(row, &config.field_mappings, &config.displayed_fields))
        .collect();

    let records = normalize_rows(&canonical, config).context("normalizing records")?;
    let verdicts = detect(&records, config).context("detecting outliers")?;
    Ok(verdicts)
}

fn cmd_inspect(inputs: &[PathBuf], config: &PipelineConfig) {
    let start = Instant::now();

    let spinner = create_spinner("Reading telemetry logs...");

    let rows = match load_telemetry_csvs(inputs, &config.header_renames) {
        Ok(rows) => rows,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to read telemetry logs: {}", e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Detecting outliers...");

    let verdicts = match inspect_verdicts(&rows, config) {
        Ok(verdicts) => verdicts,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Inspection failed: {:#}", e);
            std::process::exit(1);
        }
    };

    spinner.finish_and_clear();

    let summary = TrackSummary::from_verdicts(&verdicts);
    print_summary(
        "Inspection Complete",
        &[
            (
                "Input files",
                inputs
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            ("Points", summary.points.to_string()),
            ("Valid fixes", summary.valid.to_string()),
            ("No GPS fix", summary.missing_fix.to_string()),
            ("Bad satellites", summary.bad_satellites.to_string()),
            ("Median outliers", summary.median_outliers.to_string()),
            ("Rate outliers", summary.rate_outliers.to_string()),
            ("Duplicates", summary.duplicates.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}
