//! SimQuant CLI - interactive review reports for quantification results

#![deny(warnings)]

// Global invariants enforced:
// - Deterministic output ordering
// - Identical input yields byte-for-byte identical output
// - A failed run never leaves a partial report behind

use anyhow::Context;
use clap::{Parser, Subcommand};
use simquant_core::config::{self, InitialValues, ResolvedConfig};
use simquant_core::{render_json, render_results_file, render_text, summarize_results_file};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "simquant-report")]
#[command(about = "Render SimQuant results as a self-contained interactive HTML report")]
#[command(version = env!("SIMQUANT_VERSION"))]
struct Cli {
    /// Log debug details to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a results file (JSON or YAML) to HTML
    Render {
        /// Path to the producer's results file
        input: PathBuf,

        /// Output file path (default: <input stem>.html next to the input)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Path to config file (default: auto-discover next to the input)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory holding scan charts (overrides config file)
        #[arg(long)]
        visual_dir: Option<PathBuf>,

        /// Do not embed scan charts
        #[arg(long)]
        no_visuals: bool,

        /// Show recomputed aggregates instead of the producer's values
        #[arg(long)]
        recomputed: bool,

        /// Fail when a recomputed aggregate differs from the producer's value
        #[arg(long)]
        strict_baseline: bool,

        /// Document title (overrides config file)
        #[arg(long)]
        title: Option<String>,
    },
    /// Load and index a results file without rendering
    Summary {
        /// Path to the producer's results file
        input: PathBuf,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Path to config file (default: auto-discover next to the input)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate a configuration file
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file without rendering
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Render {
            input,
            output,
            config: config_path,
            visual_dir,
            no_visuals,
            recomputed,
            strict_baseline,
            title,
        } => {
            let input = normalize_input(&input)?;
            let mut resolved = load_config_for(&input, config_path.as_deref())?;

            // CLI flags override config file values
            if let Some(dir) = visual_dir {
                resolved.visual_dir = Some(dir);
            }
            if no_visuals {
                resolved.visuals = false;
            }
            if recomputed {
                resolved.initial_values = InitialValues::Recomputed;
            }
            if strict_baseline {
                resolved.strict_baseline = true;
            }
            if let Some(title) = title {
                resolved.title = title;
            }

            let report = render_results_file(&input, &resolved)
                .with_context(|| format!("Failed to render report for {}", input.display()))?;

            let output_path = output.unwrap_or_else(|| default_output_path(&input));
            simquant_core::write_report(&output_path, &report.html)?;

            print!("{}", render_text(&report.summary));
            eprintln!("Report written to: {}", output_path.display());
        }
        Commands::Summary {
            input,
            format,
            config: config_path,
        } => {
            let input = normalize_input(&input)?;
            let resolved = load_config_for(&input, config_path.as_deref())?;
            let summary = summarize_results_file(&input, &resolved)
                .with_context(|| format!("Failed to summarize {}", input.display()))?;
            match format {
                OutputFormat::Text => print!("{}", render_text(&summary)),
                OutputFormat::Json => println!("{}", render_json(&summary)),
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let project_root = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&project_root, path.as_deref());

                match resolved {
                    Ok(config) => {
                        if let Some(ref p) = config.config_path {
                            println!("Config valid: {}", p.display());
                        } else {
                            println!("No config file found. Using defaults.");
                        }
                    }
                    Err(e) => {
                        eprintln!("Config validation failed: {:#}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigAction::Show { path } => {
                let project_root = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&project_root, path.as_deref())
                    .context("failed to load configuration")?;
                print_config(&resolved);
            }
        },
    }

    Ok(())
}

/// stderr logging; RUST_LOG wins over the verbosity flag
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Absolute path of an existing input file
fn normalize_input(path: &Path) -> anyhow::Result<PathBuf> {
    let normalized = if path.is_relative() {
        std::env::current_dir()?.join(path)
    } else {
        path.to_path_buf()
    };
    if !normalized.is_file() {
        anyhow::bail!("Results file does not exist: {}", normalized.display());
    }
    Ok(normalized)
}

fn load_config_for(input: &Path, explicit: Option<&Path>) -> anyhow::Result<ResolvedConfig> {
    let dir = input.parent().unwrap_or_else(|| Path::new("."));
    let resolved =
        config::load_and_resolve(dir, explicit).context("failed to load configuration")?;
    if let Some(config_path) = &resolved.config_path {
        tracing::info!(path = %config_path.display(), "using config");
    }
    Ok(resolved)
}

fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("html")
}

fn print_config(resolved: &ResolvedConfig) {
    println!("Configuration:");
    if let Some(ref p) = resolved.config_path {
        println!("  Source: {}", p.display());
    } else {
        println!("  Source: defaults (no config file found)");
    }
    println!();
    println!("Report:");
    println!("  title: {}", resolved.title);
    println!(
        "  initial_values: {}",
        match resolved.initial_values {
            InitialValues::Baseline => "baseline",
            InitialValues::Recomputed => "recomputed",
        }
    );
    println!();
    println!("Display:");
    println!("  value_cap: {}", resolved.format.cap);
    println!("  decimal_places: {}", resolved.format.places);
    println!();
    println!("Baseline:");
    println!("  tolerance: {}", resolved.baseline_tolerance);
    println!("  strict: {}", resolved.strict_baseline);
    println!();
    println!("Visuals:");
    println!("  enabled: {}", resolved.visuals);
    println!(
        "  dir: {}",
        resolved
            .visual_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "results directory".to_string())
    );
}
