//! Command-line interface for the trial pipeline.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use crate::config::{CollectConfig, FilterConfig, MergeConfig};
use crate::core::pipeline::ArrayJob;
use crate::core::transforms;
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "trial-pipeline")]
#[command(about = "One-shot transforms for per-trial behavioral data", version)]
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
    /// Print the square of an integer
    Square {
        /// Integer to square
        #[arg(allow_negative_numbers = true)]
        number: i64,
    },

    /// Greet the user
    Greet {
        /// Name of the user
        name: String,
    },

    /// Standardize an .npy array to zero mean and unit variance
    Standardize {
        /// Input .npy file
        input: PathBuf,
        /// Output .npy file
        output: PathBuf,
    },

    /// Rescale an .npy array into [min-val, max-val] (default [0, 1])
    Normalize {
        /// Input .npy file
        input: PathBuf,
        /// Output .npy file
        output: PathBuf,
        /// Lower bound of the target interval
        #[arg(long, allow_negative_numbers = true)]
        min_val: Option<f64>,
        /// Upper bound of the target interval
        #[arg(long, allow_negative_numbers = true)]
        max_val: Option<f64>,
    },

    /// Concatenate per-trial CSV files and add a metadata column
    CollectCsv {
        /// Directory containing one CSV file per trial
        input_dir: PathBuf,
        /// Output CSV file
        output: PathBuf,
        /// Metadata field to broadcast onto every row
        #[arg(long)]
        field: Option<String>,
        /// Only use files whose name matches this regex
        #[arg(long, value_parser = parse_regex)]
        pattern: Option<Regex>,
        /// Keep directory listing order instead of sorting by name
        #[arg(long)]
        unsorted: bool,
        /// Write a leading per-file row index column
        #[arg(long)]
        index: bool,
    },

    /// Keep the rows of a CSV whose flag column is true
    FilterValid {
        /// Input CSV file
        input: PathBuf,
        /// Output CSV file
        output: PathBuf,
        /// Boolean column to filter on
        #[arg(long)]
        column: Option<String>,
    },

    /// Stack per-trial .npy files along a new leading axis
    MergeNpy {
        /// Directory containing one .npy file per trial
        input_dir: PathBuf,
        /// Output .npy file
        output: PathBuf,
        /// Only use files whose name matches this regex
        #[arg(long, value_parser = parse_regex)]
        pattern: Option<Regex>,
        /// Keep directory listing order instead of sorting by name
        #[arg(long)]
        unsorted: bool,
    },

    /// Extract one variable from per-trial .mat files and stack it
    MergeMat {
        /// Directory containing one .mat file per trial
        input_dir: PathBuf,
        /// Name of the variable to extract
        variable: String,
        /// Output .npy file
        output: PathBuf,
        /// Only use files whose name matches this regex
        #[arg(long, value_parser = parse_regex)]
        pattern: Option<Regex>,
        /// Keep directory listing order instead of sorting by name
        #[arg(long)]
        unsorted: bool,
    },
}

fn parse_regex(s: &str) -> Result<Regex, regex::Error> {
    Regex::new(s)
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a per-file progress bar; the length is set once files are listed
fn create_file_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_message(message.to_string());
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

/// Load the config named by `--config`, or defaults when none is given.
///
/// An explicit path that cannot be read or parsed is an error.
fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };

    let config = PipelineConfig::from_yaml(path)
        .map_err(|e| anyhow!("{}", e))
        .with_context(|| format!("loading config '{}'", path.display()))?;
    info!("Loaded config from: {}", path.display());
    Ok(config)
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

    if let Err(e) = execute(cli) {
        error!("{:#}", e);
        process::exit(1);
    }
}

/// Run a parsed command line. Errors carry the failed command and stage.
pub fn execute(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Square { number } => cmd_square(number),
        Commands::Greet { name } => cmd_greet(&name),
        Commands::Standardize { input, output } => cmd_standardize(&input, &output),
        Commands::Normalize { input, output, min_val, max_val } => {
            cmd_normalize(&input, &output, min_val, max_val, &config)
        }
        Commands::CollectCsv { input_dir, output, field, pattern, unsorted, index } => {
            let collect = CollectConfig {
                metadata_field: field.unwrap_or_else(|| config.collect.metadata_field.clone()),
                sort_files: config.collect.sort_files && !unsorted,
                write_index: config.collect.write_index || index,
                ..config.collect.clone()
            };
            cmd_collect_csv(&input_dir, &output, &collect, pattern.as_ref())
        }
        Commands::FilterValid { input, output, column } => {
            let filter = FilterConfig {
                flag_column: column.unwrap_or_else(|| config.filter.flag_column.clone()),
            };
            cmd_filter_valid(&input, &output, &filter)
        }
        Commands::MergeNpy { input_dir, output, pattern, unsorted } => {
            let merge = MergeConfig {
                sort_files: config.merge.sort_files && !unsorted,
            };
            cmd_merge_npy(&input_dir, &output, &merge, pattern.as_ref())
        }
        Commands::MergeMat { input_dir, variable, output, pattern, unsorted } => {
            let merge = MergeConfig {
                sort_files: config.merge.sort_files && !unsorted,
            };
            cmd_merge_mat(&input_dir, &variable, &output, &merge, pattern.as_ref())
        }
    }
}

fn cmd_square(number: i64) -> Result<()> {
    let message = transforms::square_message(number).context("Square failed")?;
    println!("{}", message);
    Ok(())
}

fn cmd_greet(name: &str) -> Result<()> {
    println!("{}", transforms::greeting(name));
    Ok(())
}

fn cmd_standardize(input: &Path, output: &Path) -> Result<()> {
    let start = Instant::now();
    let spinner = create_spinner("Standardizing array...");

    let result = ArrayJob::new(input, output, transforms::standardize).run();
    spinner.finish_and_clear();
    let report = result.context("Standardization failed")?;

    print_summary(
        "Standardization Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Output file", output.display().to_string()),
            ("Shape", format!("{:?}", report.output_shape)),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_normalize(
    input: &Path,
    output: &Path,
    min_val: Option<f64>,
    max_val: Option<f64>,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();

    // CLI bounds override config bounds
    let min_val = min_val.unwrap_or(config.normalize.min_val);
    let max_val = max_val.unwrap_or(config.normalize.max_val);

    let spinner = create_spinner("Normalizing array...");

    let job = ArrayJob::new(input, output, |data: &ndarray::ArrayD<f64>| {
        transforms::normalize_to_range(data, min_val, max_val)
    });
    let result = job.run();
    spinner.finish_and_clear();
    let report = result.context("Normalization failed")?;

    print_summary(
        "Normalization Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Output file", output.display().to_string()),
            ("Shape", format!("{:?}", report.output_shape)),
            ("Interval", format!("[{}, {}]", min_val, max_val)),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_collect_csv(
    input_dir: &Path,
    output: &Path,
    config: &CollectConfig,
    pattern: Option<&Regex>,
) -> Result<()> {
    use crate::processors::collecting;

    let start = Instant::now();

    println!("Collecting CSV files...");
    println!("Input directory: {}", input_dir.display());
    println!("Output file: {}", output.display());
    println!("Metadata field: {}", config.metadata_field);

    let bar = create_file_bar("Collecting");
    let result = collecting::collect_csv_files(input_dir, output, config, pattern, &bar);
    bar.finish_and_clear();
    let summary = result.context("CSV collection failed")?;

    print_summary(
        "CSV Collection Complete",
        &[
            ("Input directory", input_dir.display().to_string()),
            ("Output file", output.display().to_string()),
            ("Files", summary.files.len().to_string()),
            ("Rows", summary.rows.to_string()),
            ("Metadata file", summary.metadata_path.display().to_string()),
            (config.metadata_field.as_str(), summary.metadata_value),
            ("Sorted", config.sort_files.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_filter_valid(input: &Path, output: &Path, config: &FilterConfig) -> Result<()> {
    use crate::processors::filtering;

    let start = Instant::now();
    let spinner = create_spinner("Filtering rows...");

    let result = filtering::filter_valid_trials(input, output, config);
    spinner.finish_and_clear();
    let report = result.context("Filter failed")?;

    print_summary(
        "Filter Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Output file", output.display().to_string()),
            ("Flag column", config.flag_column.clone()),
            ("Rows in", report.rows_in.to_string()),
            ("Rows kept", report.rows_out.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_merge_npy(
    input_dir: &Path,
    output: &Path,
    config: &MergeConfig,
    pattern: Option<&Regex>,
) -> Result<()> {
    use crate::processors::merging;

    let start = Instant::now();

    let label = input_dir
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "trial".to_string());
    let bar = create_file_bar(&format!("Merging the {} data", label));

    let result = merging::merge_npy_files(input_dir, config, pattern, &bar)
        .and_then(|(merged, files)| merging::save_merged(output, &merged, files));
    bar.finish_and_clear();
    let summary = result.context("NPY merge failed")?;

    print_summary(
        "NPY Merge Complete",
        &[
            ("Input directory", input_dir.display().to_string()),
            ("Output file", output.display().to_string()),
            ("Files", summary.files.len().to_string()),
            ("Shape", format!("{:?}", summary.shape)),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_merge_mat(
    input_dir: &Path,
    variable: &str,
    output: &Path,
    config: &MergeConfig,
    pattern: Option<&Regex>,
) -> Result<()> {
    use crate::processors::merging;

    let start = Instant::now();
    let bar = create_file_bar(&format!("Merging the {} position data", variable));

    let result = merging::merge_mat_files(input_dir, variable, config, pattern, &bar)
        .and_then(|(merged, files)| merging::save_merged(output, &merged, files));
    bar.finish_and_clear();
    let summary = result.context("MAT merge failed")?;

    print_summary(
        "MAT Merge Complete",
        &[
            ("Input directory", input_dir.display().to_string()),
            ("Variable", variable.to_string()),
            ("Output file", output.display().to_string()),
            ("Files", summary.files.len().to_string()),
            ("Shape", format!("{:?}", summary.shape)),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}
