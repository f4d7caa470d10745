//! Command-line interface for the radio map pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Instant;

use crate::config::{NeighborAggregation, PipelineConfig};
use crate::core::loaders::load_table_csv;
use crate::core::writers::{write_radiomap_csv, write_table_csv};
use crate::processors::correction::correct;
use crate::processors::filling::{count_sentinel_cells, fill_missing};
use crate::processors::interpolation::interpolate;
use crate::processors::radiomap::build_radio_maps;
use crate::processors::scaling::{scale, ScaleParams};
use crate::processors::smoothing::rolling_mean;

#[derive(Parser)]
#[command(name = "radiomap-pipeline")]
#[command(about = "WiFi RSS radio map preparation pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
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
    /// Run the full pipeline and write both radio maps
    Process {
        /// Checkpoint root directory (<root>/<label>/*.csv)
        input_dir: PathBuf,
        /// Output directory for the radio maps
        output_dir: PathBuf,
    },

    /// Read checkpoints, bound sampling duration, fill sentinels
    Correct {
        /// Checkpoint root directory
        input_dir: PathBuf,
        /// Output table CSV
        output: PathBuf,
        /// Maximum sampling duration per session (seconds)
        #[arg(long)]
        max_sampling: Option<f32>,
    },

    /// Impute sentinel cells from spatially nearby rows
    Interpolate {
        /// Input table CSV
        input: PathBuf,
        /// Output table CSV
        output: PathBuf,
        /// Neighbor radius in meters
        #[arg(long)]
        threshold: Option<f32>,
        /// Aggregation statistic: mean, nearest or inverse-distance
        #[arg(long)]
        strategy: Option<String>,
    },

    /// Collapse overlapping scan windows into mean rows
    Smooth {
        /// Input table CSV
        input: PathBuf,
        /// Output radio map CSV
        output: PathBuf,
        /// Window size in rows
        #[arg(long)]
        window: Option<usize>,
        /// Window step in rows
        #[arg(long)]
        step: Option<usize>,
    },

    /// Min-max scale a table, fitting or reusing persisted parameters
    Scale {
        /// Input table CSV
        input: PathBuf,
        /// Output table CSV
        output: PathBuf,
        /// Where to persist the fitted parameters
        #[arg(long)]
        params_out: Option<PathBuf>,
        /// Previously fitted parameters to apply instead of fitting
        #[arg(long)]
        params_in: Option<PathBuf>,
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

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Process {
            input_dir,
            output_dir,
        } => {
            cmd_process(&input_dir, &output_dir, &config);
        }
        Commands::Correct {
            input_dir,
            output,
            max_sampling,
        } => {
            cmd_correct(&input_dir, &output, max_sampling, &config);
        }
        Commands::Interpolate {
            input,
            output,
            threshold,
            strategy,
        } => {
            cmd_interpolate(&input, &output, threshold, strategy, &config);
        }
        Commands::Smooth {
            input,
            output,
            window,
            step,
        } => {
            cmd_smooth(&input, &output, window, step, &config);
        }
        Commands::Scale {
            input,
            output,
            params_out,
            params_in,
        } => {
            cmd_scale(&input, &output, params_out, params_in, &config);
        }
    }
}

fn cmd_process(input_dir: &PathBuf, output_dir: &PathBuf, config: &PipelineConfig) {
    let start = Instant::now();

    println!("Building radio maps...");
    println!("Input directory: {}", input_dir.display());
    println!("Output directory: {}", output_dir.display());

    let spinner = create_spinner("Running preparation pipeline...");

    match build_radio_maps(input_dir, output_dir, config) {
        Ok(summary) => {
            spinner.finish_and_clear();

            print_summary(
                "Radio Map Build Complete",
                &[
                    ("Scans loaded", summary.records_read.to_string()),
                    ("Scans kept", summary.scans_kept.to_string()),
                    ("Late scans dropped", summary.dropped_late.to_string()),
                    (
                        "Unknown-label drops",
                        summary.dropped_unknown_label.to_string(),
                    ),
                    ("Labels skipped", summary.labels_skipped.len().to_string()),
                    ("Files skipped", summary.files_skipped.to_string()),
                    ("Missing cells", summary.cells_missing.to_string()),
                    ("Interpolated", summary.cells_interpolated.to_string()),
                    ("Unresolved", summary.cells_unresolved.to_string()),
                    ("Raw rows", summary.raw_rows.to_string()),
                    ("Processed rows", summary.processed_rows.to_string()),
                    ("Raw map", summary.raw_path.display().to_string()),
                    ("Processed map", summary.processed_path.display().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Pipeline failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_correct(
    input_dir: &PathBuf,
    output: &PathBuf,
    max_sampling: Option<f32>,
    config: &PipelineConfig,
) {
    use crate::core::loaders::read_checkpoints;

    let start = Instant::now();
    let max_sampling_secs = max_sampling.unwrap_or(config.correction.max_sampling_secs);
    let labels = config.sorted_labels();

    println!("Correcting checkpoint recordings...");
    println!("Input directory: {}", input_dir.display());
    println!("Max sampling: {}s", max_sampling_secs);

    let spinner = create_spinner("Reading and correcting scans...");

    let result = read_checkpoints(input_dir, &labels, &config.radio.session_pattern)
        .map_err(anyhow::Error::from)
        .and_then(|(records, report)| {
            let (table, correction) = correct(records, max_sampling_secs, &config.labels)?;
            let table = fill_missing(table, config.radio.sentinel_rss);
            write_table_csv(output, &table)?;
            Ok((report, correction, table))
        });

    match result {
        Ok((report, correction, table)) => {
            spinner.finish_and_clear();

            print_summary(
                "Correction Complete",
                &[
                    ("Scans loaded", report.records.to_string()),
                    ("Labels skipped", report.labels_skipped.len().to_string()),
                    ("Files skipped", report.files_skipped.to_string()),
                    ("Late scans dropped", correction.dropped_late.to_string()),
                    (
                        "Unknown-label drops",
                        correction.dropped_unknown_label.to_string(),
                    ),
                    ("Rows", table.len().to_string()),
                    ("Access points", table.num_aps().to_string()),
                    ("Output", output.display().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Correction failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_interpolate(
    input: &PathBuf,
    output: &PathBuf,
    threshold: Option<f32>,
    strategy: Option<String>,
    config: &PipelineConfig,
) {
    let start = Instant::now();
    let threshold_m = threshold.unwrap_or(config.interpolation.distance_threshold_m);
    let strategy = match strategy {
        Some(raw) => match raw.parse::<NeighborAggregation>() {
            Ok(s) => s,
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        },
        None => config.interpolation.strategy,
    };
    let sentinel = config.radio.sentinel_rss;

    println!("Interpolating missing readings...");
    println!("Input: {}", input.display());
    println!("Threshold: {}m", threshold_m);

    let spinner = create_spinner("Querying spatial neighbors...");

    let result = load_table_csv(input).map_err(anyhow::Error::from).and_then(|table| {
        let before = count_sentinel_cells(&table, sentinel);
        let table = interpolate(table, threshold_m, strategy, sentinel);
        let after = count_sentinel_cells(&table, sentinel);
        write_table_csv(output, &table)?;
        Ok((before, after, table))
    });

    match result {
        Ok((before, after, table)) => {
            spinner.finish_and_clear();

            print_summary(
                "Interpolation Complete",
                &[
                    ("Rows", table.len().to_string()),
                    ("Missing cells", before.to_string()),
                    ("Interpolated", (before - after).to_string()),
                    ("Unresolved", after.to_string()),
                    ("Threshold", format!("{}m", threshold_m)),
                    ("Output", output.display().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Interpolation failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_smooth(
    input: &PathBuf,
    output: &PathBuf,
    window: Option<usize>,
    step: Option<usize>,
    config: &PipelineConfig,
) {
    let start = Instant::now();
    let window_size = window.unwrap_or(config.smoothing.window_size);
    let step = step.unwrap_or(config.smoothing.step);

    println!("Smoothing scan windows...");
    println!("Input: {}", input.display());
    println!("Window: {} rows, step {}", window_size, step);

    let spinner = create_spinner("Aggregating windows...");

    let result = load_table_csv(input).map_err(anyhow::Error::from).and_then(|table| {
        let rows_in = table.len();
        let smoothed = rolling_mean(table, window_size, step)?;
        write_radiomap_csv(output, &smoothed)?;
        Ok((rows_in, smoothed))
    });

    match result {
        Ok((rows_in, smoothed)) => {
            spinner.finish_and_clear();

            print_summary(
                "Smoothing Complete",
                &[
                    ("Input rows", rows_in.to_string()),
                    ("Output rows", smoothed.len().to_string()),
                    ("Window size", window_size.to_string()),
                    ("Step", step.to_string()),
                    ("Output", output.display().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Smoothing failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_scale(
    input: &PathBuf,
    output: &PathBuf,
    params_out: Option<PathBuf>,
    params_in: Option<PathBuf>,
    config: &PipelineConfig,
) {
    let start = Instant::now();
    let sentinel = config.radio.sentinel_rss;

    println!("Scaling radio map values...");
    println!("Input: {}", input.display());

    let spinner = create_spinner("Applying min-max transform...");

    let result = load_table_csv(input).map_err(anyhow::Error::from).and_then(|table| {
        let params = match &params_in {
            Some(path) => ScaleParams::load_yaml(path)?,
            None => ScaleParams::fit(&table, sentinel, &config.scaling)?,
        };
        if let Some(path) = &params_out {
            params.save_yaml(path)?;
        }
        let table = scale(table, &params);
        write_table_csv(output, &table)?;
        Ok((params, table))
    });

    match result {
        Ok((params, table)) => {
            spinner.finish_and_clear();

            print_summary(
                "Scaling Complete",
                &[
                    ("Rows", table.len().to_string()),
                    ("Fit min", params.rss_min.to_string()),
                    ("Fit max", params.rss_max.to_string()),
                    (
                        "Range",
                        format!("[{}, {}]", params.range_min, params.range_max),
                    ),
                    ("Output", output.display().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Scaling failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
