//! # CLI Module
//!
//! Command-line interface for the image fingerprint index.
//!
//! ## Usage
//! ```bash
//! # Index a folder under a source label
//! image-finder scan /Volumes/Photos --prefix archive
//!
//! # Re-fingerprint everything, ignoring stored modification times
//! image-finder scan /Volumes/Photos --prefix archive --force
//!
//! # Find images that look like a query image
//! image-finder search ~/Desktop/IMG_0042.JPG --threshold 0.85 --limit 10
//!
//! # JSON output
//! image-finder search ~/Desktop/IMG_0042.JPG --output json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use image_finder::core::decoder::{DecoderConfig, DecoderRegistry};
use image_finder::core::pipeline::{default_worker_count, ScanOptions, ScanPipeline, ScanSummary};
use image_finder::core::search::{SearchConfig, SearchEngine, SearchQuery, SearchReport};
use image_finder::core::store::{FingerprintStore, SqliteStore, StoreStats};
use image_finder::error::Result;
use image_finder::events::{Event, EventChannel, ScanEvent, SearchEvent};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

/// Image Finder - index photo collections and find similar images
#[derive(Parser, Debug)]
#[command(name = "image-finder")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fingerprint every supported image under a folder
    Scan {
        /// Folder to index
        folder: PathBuf,

        /// Label stored with every record (e.g. a drive or import batch)
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// Re-fingerprint files even if they are unchanged
        #[arg(short, long)]
        force: bool,

        /// Concurrent workers (default: 3/4 of CPU cores)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Index database path
        #[arg(long)]
        database: Option<PathBuf>,

        /// Include hidden files and folders
        #[arg(long)]
        include_hidden: bool,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Find indexed images similar to a query image
    Search {
        /// Query image
        image: PathBuf,

        /// Minimum pixel similarity (0.0-1.0)
        #[arg(short, long, default_value = "0.8")]
        threshold: f64,

        /// Only search records with this label
        #[arg(short, long)]
        prefix: Option<String>,

        /// Maximum number of matches to show
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Concurrent verifications (default: 3/4 of CPU cores)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Index database path
        #[arg(long)]
        database: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show index statistics
    Stats {
        /// Only count records with this label
        #[arg(short, long)]
        prefix: Option<String>,

        /// Index database path
        #[arg(long)]
        database: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            folder,
            prefix,
            force,
            workers,
            database,
            include_hidden,
            output,
            verbose,
        } => {
            image_finder::init_tracing(verbose);
            let options = ScanOptions::new(folder)
                .source_prefix(prefix)
                .force_rewrite(force);
            run_scan(&options, workers, database, include_hidden, output, verbose)
        }
        Commands::Search {
            image,
            threshold,
            prefix,
            limit,
            workers,
            database,
            output,
            verbose,
        } => {
            image_finder::init_tracing(verbose);
            let mut query = SearchQuery::new(image, threshold);
            if let Some(prefix) = prefix {
                query = query.source_prefix(prefix);
            }
            run_search(&query, limit, workers, database, output, verbose)
        }
        Commands::Stats {
            prefix,
            database,
            output,
        } => {
            image_finder::init_tracing(false);
            run_stats(prefix.as_deref(), database, output)
        }
    }
}

fn database_path(database: Option<PathBuf>) -> PathBuf {
    database.unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("image-finder")
            .join("images.db")
    })
}

fn progress_bar(template: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    pb
}

fn run_scan(
    options: &ScanOptions,
    workers: Option<usize>,
    database: Option<PathBuf>,
    include_hidden: bool,
    output: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let term = Term::stderr();
    let pretty = matches!(output, OutputFormat::Pretty);

    if pretty {
        print_header(&term);
    }

    let store = Arc::new(SqliteStore::open(&database_path(database))?);
    let decoders = DecoderRegistry::with_defaults(&DecoderConfig::default());
    let pipeline = ScanPipeline::builder(store.clone(), decoders)
        .max_workers(workers.unwrap_or_else(default_worker_count))
        .include_hidden(include_hidden)
        .build();

    let (sender, receiver) = EventChannel::new();
    let progress = pretty.then(|| progress_bar("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}"));
    let progress_clone = progress.clone();

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let Some(ref pb) = progress_clone else {
                continue;
            };
            match event {
                Event::Scan(ScanEvent::Started { total_files, .. }) => {
                    pb.set_length(total_files as u64);
                }
                Event::Scan(ScanEvent::Progress(p)) => {
                    pb.set_position(p.processed as u64);
                    pb.set_message(format!(
                        "RAW {}/{}, TIF {}/{}, errors {}",
                        p.raw_processed, p.raw_total, p.tif_processed, p.tif_total, p.errors
                    ));
                }
                Event::Scan(ScanEvent::FileFailed { path, message }) if verbose => {
                    pb.println(format!("{} {}: {}", style("✗").red(), path.display(), message));
                }
                Event::Scan(ScanEvent::Completed { .. }) => pb.finish_and_clear(),
                _ => {}
            }
        }
    });

    let result = pipeline.scan_with_events(options, &sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let summary = result?;
    match output {
        OutputFormat::Pretty => print_scan_summary(&term, &summary, store.path()),
        OutputFormat::Json => print_json(&summary),
    }

    Ok(())
}

fn run_search(
    query: &SearchQuery,
    limit: usize,
    workers: Option<usize>,
    database: Option<PathBuf>,
    output: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let term = Term::stderr();
    let pretty = matches!(output, OutputFormat::Pretty);

    if pretty {
        print_header(&term);
    }

    let store: Arc<dyn FingerprintStore> = Arc::new(SqliteStore::open_existing(&database_path(database))?);
    let decoders = DecoderRegistry::with_defaults(&DecoderConfig::default());
    let config = SearchConfig {
        max_workers: workers.unwrap_or_else(default_worker_count),
        ..SearchConfig::default()
    };
    let engine = SearchEngine::new(store, decoders, config);

    let (sender, receiver) = EventChannel::new();
    let progress = pretty.then(|| progress_bar("{spinner:.green} {pos} matches among {len} candidates {msg}"));
    let progress_clone = progress.clone();

    let event_thread = thread::spawn(move || {
        let mut found = 0u64;
        for event in receiver.iter() {
            match event {
                Event::Search(SearchEvent::CandidateFound { .. }) => {
                    found += 1;
                    if let Some(ref pb) = progress_clone {
                        pb.set_length(found);
                    }
                }
                Event::Search(SearchEvent::MatchConfirmed { path, similarity_score }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.inc(1);
                        if verbose {
                            pb.println(format!("{} {} ({:.3})", style("✓").green(), path, similarity_score));
                        }
                    }
                }
                Event::Search(SearchEvent::Completed { .. }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.finish_and_clear();
                    }
                }
                _ => {}
            }
        }
    });

    let result = engine.search_with_events(query, &sender);

    drop(sender);
    event_thread.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let mut report = result?;
    report.matches.truncate(limit);

    match output {
        OutputFormat::Pretty => print_search_report(&term, query, &report),
        OutputFormat::Json => print_json(&report),
    }

    Ok(())
}

fn run_stats(prefix: Option<&str>, database: Option<PathBuf>, output: OutputFormat) -> Result<()> {
    let store = SqliteStore::open_existing(&database_path(database))?;
    let stats = store.stats(prefix)?;

    match output {
        OutputFormat::Pretty => print_stats(&Term::stdout(), prefix, &stats, store.path()),
        OutputFormat::Json => print_json(&stats),
    }

    Ok(())
}

fn print_header(term: &Term) {
    term.write_line(&format!(
        "{} {}",
        style("Image Finder").bold().cyan(),
        style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
    ))
    .ok();
    term.write_line("").ok();
}

fn print_scan_summary(term: &Term, summary: &ScanSummary, database: &Path) {
    let heading = if summary.cancelled {
        format!("{} Scan Cancelled", style("!").yellow().bold())
    } else {
        format!("{} Scan Complete", style("✓").green().bold())
    };
    term.write_line(&heading).ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} images processed in {:.1}s",
        style(summary.total_processed).cyan(),
        summary.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!(
        "  {} fingerprinted, {} unchanged",
        style(summary.stored).cyan(),
        style(summary.skipped).dim()
    ))
    .ok();
    term.write_line(&format!(
        "  {} RAW, {} TIF fingerprinted",
        style(summary.raw_count).cyan(),
        style(summary.tif_count).cyan()
    ))
    .ok();

    if summary.errors > 0 {
        term.write_line(&format!(
            "  {} errors ({} RAW, {} TIF, {} index writes)",
            style(summary.errors).red(),
            summary.raw_errors,
            summary.tif_errors,
            summary.store_errors
        ))
        .ok();
    }
    if summary.walk_errors > 0 {
        term.write_line(&format!(
            "  {} unreadable directory entries",
            style(summary.walk_errors).yellow()
        ))
        .ok();
    }
    if summary.dropped_results > 0 {
        term.write_line(&format!(
            "  {} results dropped (result queue stayed full)",
            style(summary.dropped_results).red()
        ))
        .ok();
    }

    term.write_line("").ok();
    term.write_line(&format!("{}", style(format!("Index: {}", database.display())).dim()))
        .ok();
}

fn print_search_report(term: &Term, query: &SearchQuery, report: &SearchReport) {
    term.write_line(&format!(
        "{} {} candidates from {} records, {} verified in {:.1}s",
        style("✓").green().bold(),
        report.candidates,
        report.records_examined,
        report.verified,
        report.duration_ms as f64 / 1000.0
    ))
    .ok();
    if report.skipped_missing > 0 || report.failed > 0 {
        term.write_line(&format!(
            "  {}",
            style(format!(
                "{} no longer on disk, {} could not be decoded",
                report.skipped_missing, report.failed
            ))
            .dim()
        ))
        .ok();
    }
    term.write_line("").ok();

    if report.matches.is_empty() {
        term.write_line(&format!(
            "  No images similar to {} at threshold {:.2}",
            query.path.display(),
            query.threshold
        ))
        .ok();
        return;
    }

    term.write_line(&format!("{}", style("Matches:").bold().underlined()))
        .ok();
    for (i, found) in report.matches.iter().enumerate() {
        let label = if found.source_prefix.is_empty() {
            String::new()
        } else {
            format!(" [{}]", found.source_prefix)
        };
        let raw = if found.is_raw_format { " RAW" } else { "" };
        term.write_line(&format!(
            "  {}. {} {}{}{}",
            i + 1,
            style(format!("{:.4}", found.similarity_score)).cyan(),
            found.path.display(),
            style(label).dim(),
            style(raw).yellow()
        ))
        .ok();
    }
}

fn print_stats(term: &Term, prefix: Option<&str>, stats: &StoreStats, database: &Path) {
    let scope = prefix.filter(|p| !p.is_empty()).unwrap_or("all sources");
    term.write_line(&format!(
        "{} ({})",
        style("Index statistics").bold(),
        style(scope).dim()
    ))
    .ok();
    term.write_line(&format!("  Total images:           {}", style(stats.total_records).cyan()))
        .ok();
    term.write_line(&format!(
        "  Unique average hashes:  {}",
        style(stats.unique_average_hashes).cyan()
    ))
    .ok();
    term.write_line(&format!("  RAW images:             {}", style(stats.raw_records).cyan()))
        .ok();
    term.write_line(&format!("{}", style(format!("Index: {}", database.display())).dim()))
        .ok();
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::warn!("Failed to serialize output: {}", e),
    }
}
