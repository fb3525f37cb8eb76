//! xref CLI
//!
//! Command-line front end: index dumped translation units and merge record
//! files into the per-file databases.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;
use xref_core::{IndexerConfig, RunMetrics};
use xref_indexer::{index_translation_unit, merge_into, write_output, TranslationUnit};

#[derive(Parser)]
#[command(name = "xref")]
#[command(about = "xref - Cross-reference indexer for C++ sources")]
#[command(version)]
struct Cli {
    /// Configuration file (default: <config dir>/xref/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index one translation unit dumped as JSON
    Index {
        /// Translation unit file
        unit: PathBuf,

        /// Source root
        #[arg(long)]
        src: Option<PathBuf>,

        /// Build root
        #[arg(long)]
        obj: Option<PathBuf>,

        /// Output root
        #[arg(long)]
        out: Option<PathBuf>,

        /// Platform tag for generated files
        #[arg(long)]
        platform: Option<String>,
    },

    /// Merge a raw record file into a database
    Merge {
        /// Database file
        database: PathBuf,

        /// File with one record per line
        records: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Index {
            unit,
            src,
            obj,
            out,
            platform,
        } => {
            let mut config = config;
            if let Some(src) = src {
                config.src_dir = src;
            }
            if let Some(obj) = obj {
                config.obj_dir = obj;
            }
            if let Some(out) = out {
                config.out_dir = out;
            }
            if let Some(platform) = platform {
                config.platform = platform;
            }
            cmd_index(&config, &unit)
        }
        Commands::Merge { database, records } => cmd_merge(&database, &records),
        Commands::Config => cmd_config(&config),
    }
}

fn load_config(path: Option<&Path>) -> Result<IndexerConfig> {
    match path {
        Some(path) => IndexerConfig::load_from(path)
            .map(IndexerConfig::with_env_overrides)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(IndexerConfig::load()),
    }
}

fn cmd_index(config: &IndexerConfig, unit: &Path) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let tu = TranslationUnit::from_json_file(unit)
        .with_context(|| format!("Failed to read translation unit {}", unit.display()))?;

    let metrics = RunMetrics::new();
    let output = index_translation_unit(config, &tu, &metrics)
        .with_context(|| format!("Failed to index {}", unit.display()))?;
    let files = write_output(config, &output, &metrics).context("Failed to write records")?;

    info!(unit = ?unit, files, "Run complete");
    print_summary(&metrics);
    Ok(())
}

fn cmd_merge(database: &Path, records: &Path) -> Result<()> {
    let content = std::fs::read_to_string(records)
        .with_context(|| format!("Failed to read {}", records.display()))?;
    let lines: Vec<String> = content
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| format!("{line}\n"))
        .collect();

    let metrics = RunMetrics::new();
    let start = Instant::now();
    let stats = merge_into(database, &lines)
        .with_context(|| format!("Failed to merge into {}", database.display()))?;
    metrics.record_merge(stats.written, stats.deduplicated, start.elapsed());

    print_summary(&metrics);
    Ok(())
}

fn cmd_config(config: &IndexerConfig) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    print!("{yaml}");
    Ok(())
}

fn print_summary(metrics: &RunMetrics) {
    let load = |counter: &std::sync::atomic::AtomicU64| counter.load(Ordering::Relaxed);

    println!("Records:    {} emitted", metrics.records_total());
    println!("  target:     {}", load(&metrics.target_records));
    println!("  source:     {}", load(&metrics.source_records));
    println!("  structured: {}", load(&metrics.structured_records));
    println!("  dropped:    {}", load(&metrics.dropped_occurrences));
    println!();
    println!("Files:      {} merged", load(&metrics.files_merged));
    println!("  written:      {} lines", load(&metrics.lines_written));
    println!("  deduplicated: {} lines", load(&metrics.lines_deduplicated));
    println!(
        "  merge p50/p99/max: {:.2}ms / {:.2}ms / {:.2}ms",
        metrics.merge_latency.p50().as_secs_f64() * 1000.0,
        metrics.merge_latency.p99().as_secs_f64() * 1000.0,
        metrics.merge_latency.max().as_secs_f64() * 1000.0
    );
    println!("Elapsed:    {:.2}s", metrics.elapsed().as_secs_f64());
}
