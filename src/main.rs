//! renarc CLI - Command-line tool for Ren'Py archive extraction.
//!
//! This is the main entry point for the renarc command-line application.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glob::{MatchOptions, Pattern};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use renarc::prelude::*;
use renarc::rpa::MAX_INDEX_SIZE;

/// renarc - Ren'Py archive extraction tool
#[derive(Parser)]
#[command(name = "renarc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (use RUST_LOG=debug for more detail)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Maximum index size in bytes, compressed and decompressed
    #[arg(long, global = true, env = "RENARC_MAX_INDEX_SIZE", default_value_t = MAX_INDEX_SIZE)]
    max_index_size: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// List contents of an RPA archive
    List {
        /// Path to the RPA file
        archive: PathBuf,

        /// Filter pattern (glob-style, case-insensitive)
        #[arg(short, long)]
        filter: Option<String>,

        /// Show offsets and lengths
        #[arg(short, long)]
        detailed: bool,

        /// Print entries as JSON
        #[arg(long, conflicts_with = "detailed")]
        json: bool,
    },

    /// Extract RPA archives; directories are searched for *.rpa files
    Extract {
        /// Archives or directories containing archives
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, env = "RENARC_OUTPUT")]
        output: PathBuf,

        /// Filter pattern (glob-style, case-insensitive)
        #[arg(short, long)]
        filter: Option<String>,

        /// Extract entries on all cores
        #[arg(long)]
        parallel: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(if cli.verbose {
                "renarc=debug".parse()?
            } else {
                "renarc=warn".parse()?
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::List {
            archive,
            filter,
            detailed,
            json,
        } => {
            let filter = filter.as_deref().map(EntryFilter::new).transpose()?;
            cmd_list(&archive, cli.max_index_size, filter.as_ref(), detailed, json)?;
        }
        Commands::Extract {
            inputs,
            output,
            filter,
            parallel,
        } => {
            let filter = filter.as_deref().map(EntryFilter::new).transpose()?;
            cmd_extract(&inputs, &output, cli.max_index_size, filter.as_ref(), parallel)?;
        }
    }

    Ok(())
}

fn cmd_list(
    path: &Path,
    max_index_size: u64,
    filter: Option<&EntryFilter>,
    detailed: bool,
    json: bool,
) -> Result<()> {
    let archive = Archive::open(path)
        .context("Failed to open RPA archive")?
        .with_max_index_size(max_index_size);
    let entries: Vec<FileEntry> = archive
        .read_index()
        .context("Failed to read archive index")?
        .into_iter()
        .filter(|e| filter.map_or(true, |f| f.matches(&e.path)))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in &entries {
        if detailed {
            println!(
                "{:>12} {:>12} {} {}",
                entry.offset,
                entry.length,
                if entry.prefix.is_empty() { " " } else { "P" },
                entry.path
            );
        } else {
            println!("{}", entry.path);
        }
    }

    println!(
        "\nTotal: {} entries ({}, key {:#x})",
        entries.len(),
        archive.version(),
        archive.key()
    );

    Ok(())
}

fn cmd_extract(
    inputs: &[PathBuf],
    output: &Path,
    max_index_size: u64,
    filter: Option<&EntryFilter>,
    parallel: bool,
) -> Result<()> {
    let archives = collect_archives(inputs);
    if archives.is_empty() {
        anyhow::bail!("No RPA archives found");
    }

    let start = Instant::now();
    let summary = extract_archives(&archives, output, max_index_size, filter, parallel);

    println!(
        "Extraction of {} archive(s) completed in {:?}: {} extracted, {} skipped",
        archives.len(),
        start.elapsed(),
        summary.extracted,
        summary.skipped
    );

    if summary.failed_archives > 0 || summary.failed_entries > 0 {
        anyhow::bail!(
            "{} archive(s) could not be read, {} entries failed to extract",
            summary.failed_archives,
            summary.failed_entries
        );
    }

    Ok(())
}

/// Totals over a multi-archive run.
#[derive(Debug, Default)]
struct ExtractSummary {
    extracted: usize,
    skipped: usize,
    failed_entries: usize,
    /// Archives that failed before any entry was processed.
    failed_archives: usize,
}

/// Extract each archive in turn. A broken archive is reported and counted,
/// and the run moves on to the next one.
fn extract_archives(
    archives: &[PathBuf],
    output: &Path,
    max_index_size: u64,
    filter: Option<&EntryFilter>,
    parallel: bool,
) -> ExtractSummary {
    let mut summary = ExtractSummary::default();

    for path in archives {
        println!("Opening RPA archive: {}", path.display());

        match extract_archive(path, output, max_index_size, filter, parallel) {
            Ok(result) => {
                println!(
                    "  {} extracted, {} skipped, {} failed ({} bytes)",
                    result.extracted,
                    result.skipped,
                    result.failures.len(),
                    result.bytes_written
                );
                for failure in &result.failures {
                    eprintln!("  error: {}: {}", failure.path, failure.error);
                }
                summary.extracted += result.extracted;
                summary.skipped += result.skipped;
                summary.failed_entries += result.failures.len();
            }
            Err(e) => {
                eprintln!("  error: {e:#}");
                summary.failed_archives += 1;
            }
        }
    }

    summary
}

fn extract_archive(
    path: &Path,
    output: &Path,
    max_index_size: u64,
    filter: Option<&EntryFilter>,
    parallel: bool,
) -> Result<ExtractResult> {
    let archive = Archive::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .with_max_index_size(max_index_size);
    let entries: Vec<FileEntry> = archive
        .read_index()
        .with_context(|| format!("Failed to read index of {}", path.display()))?
        .into_iter()
        .filter(|e| filter.map_or(true, |f| f.matches(&e.path)))
        .collect();

    info!(archive = %path.display(), entries = entries.len(), "extracting");

    let pb = ProgressBar::new(entries.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    // The CLI never cancels; an interrupt ends the process outright.
    let options = ExtractOptions::default();
    let result = if parallel {
        archive.extract_files_parallel(&entries, output, &options, |_, _| pb.inc(1))
    } else {
        archive.extract_files_with(&entries, output, &options, |_, _| pb.inc(1))
    }
    .with_context(|| format!("Failed to extract {}", path.display()))?;

    pb.finish_and_clear();
    Ok(result)
}

/// Expand directories into the `*.rpa` files beneath them.
fn collect_archives(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut archives = Vec::new();

    for input in inputs {
        if !input.is_dir() {
            archives.push(input.clone());
            continue;
        }

        let mut found: Vec<PathBuf> = WalkDir::new(input)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("rpa"))
            })
            .collect();
        found.sort();
        debug!(dir = %input.display(), archives = found.len(), "scanned directory");
        archives.extend(found);
    }

    archives
}

/// Case-insensitive glob over archive paths.
struct EntryFilter {
    pattern: Pattern,
}

impl EntryFilter {
    fn new(pattern: &str) -> Result<Self> {
        let pattern = Pattern::new(pattern).with_context(|| format!("Invalid filter: {pattern}"))?;
        Ok(Self { pattern })
    }

    fn matches(&self, path: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        self.pattern.matches_with(path, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_is_case_insensitive() {
        let filter = EntryFilter::new("images/*.PNG").unwrap();
        assert!(filter.matches("images/bg.png"));
        assert!(filter.matches("images/sub/bg.png"));
        assert!(!filter.matches("audio/theme.ogg"));
    }

    #[test]
    fn test_invalid_filter() {
        assert!(EntryFilter::new("[").is_err());
    }

    /// A version 2 archive holding `a.txt` = "hello".
    fn tiny_archive() -> Vec<u8> {
        let mut bytes = format!("RPA-2.0 {:016x}\n", 30).into_bytes();
        assert_eq!(bytes.len(), 25);
        bytes.extend_from_slice(b"hello");

        let mut pickle = vec![0x80, 2, b'}', b'X', 5, 0, 0, 0];
        pickle.extend_from_slice(b"a.txt");
        pickle.extend_from_slice(&[b']', b'(', b'K', 25, b'K', 5, 0x87, b'a', b's', b'.']);

        // Single final stored deflate block.
        let len = pickle.len() as u16;
        bytes.push(0x01);
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&(!len).to_le_bytes());
        bytes.extend_from_slice(&pickle);
        bytes
    }

    #[test]
    fn test_bad_archive_does_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let game = dir.path().join("game");
        std::fs::create_dir(&game).unwrap();
        std::fs::write(game.join("a.rpa"), b"RPA-4.0 custom format\n").unwrap();
        std::fs::write(game.join("b.rpa"), tiny_archive()).unwrap();
        let out = dir.path().join("out");

        let archives = collect_archives(&[game]);
        let summary = extract_archives(&archives, &out, MAX_INDEX_SIZE, None, false);

        assert_eq!(summary.failed_archives, 1);
        assert_eq!(summary.extracted, 1);
        assert_eq!(summary.failed_entries, 0);
        assert_eq!(std::fs::read(out.join("a.txt")).unwrap(), b"hello");
    }

    #[test]
    fn test_filter_applies_to_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.rpa");
        std::fs::write(&path, tiny_archive()).unwrap();
        let out = dir.path().join("out");
        let filter = EntryFilter::new("*.png").unwrap();

        let result = extract_archive(&path, &out, MAX_INDEX_SIZE, Some(&filter), false).unwrap();
        assert_eq!(result.processed(), 0);
        assert!(!out.join("a.txt").exists());
    }

    #[test]
    fn test_collect_archives_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("game/sub")).unwrap();
        std::fs::write(dir.path().join("game/b.rpa"), b"").unwrap();
        std::fs::write(dir.path().join("game/sub/a.RPA"), b"").unwrap();
        std::fs::write(dir.path().join("game/script.rpy"), b"").unwrap();
        let single = dir.path().join("single.rpa");

        let found = collect_archives(&[dir.path().join("game"), single.clone()]);
        assert_eq!(
            found,
            vec![
                dir.path().join("game/b.rpa"),
                dir.path().join("game/sub/a.RPA"),
                single,
            ]
        );
    }
}
