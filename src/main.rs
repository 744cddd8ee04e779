//! repodigest - Turn a source tree into a text digest for LLM consumption.
//!
//! Usage:
//!   repodigest [PATH]                  Write digest.txt for PATH
//!   repodigest [PATH] -o -             Print the digest to stdout
//!   repodigest [PATH] -i '*.rs'        Only include matching files
//!   repodigest [PATH] --gzip           Write a gzip-compressed digest
//!   repodigest --help                  Show help

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use repodigest_core::IngestConfig;
use repodigest_digest::{Ingestor, write_digest};
use repodigest_scan::ChunkCache;

#[derive(Parser)]
#[command(
    name = "repodigest",
    version,
    about = "Turn a source tree into a text digest",
    long_about = "repodigest walks a directory (or reads a single file) and writes a \
                  summary, a directory tree and the concatenated file contents to one \
                  text file.\n\nLogging is controlled with RUST_LOG (default: warn)."
)]
struct Cli {
    /// Directory or file to digest (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Only include files matching these patterns (comma or space separated)
    #[arg(short = 'i', long = "include-pattern")]
    include: Vec<String>,

    /// Exclude files matching these patterns, on top of the defaults
    #[arg(short = 'e', long = "exclude-pattern")]
    exclude: Vec<String>,

    /// Skip files larger than this (e.g., "500KB", "10MB")
    #[arg(short = 's', long = "max-size")]
    max_size: Option<String>,

    /// Stop after this many files
    #[arg(long)]
    max_files: Option<u64>,

    /// Restrict the digest to this subtree of PATH
    #[arg(long, default_value = "/")]
    subpath: String,

    /// Read files on a worker pool
    #[arg(long)]
    parallel: bool,

    /// Number of workers for --parallel (0 = one per CPU)
    #[arg(long, default_value = "0")]
    threads: usize,

    /// Reuse chunks cached by previous runs
    #[arg(long)]
    cache: bool,

    /// Cache file location (implies --cache)
    #[arg(long)]
    cache_file: Option<PathBuf>,

    /// Do not mask detected secrets
    #[arg(long)]
    no_redact: bool,

    /// Output file, or "-" for stdout
    #[arg(short, long, default_value = "digest.txt")]
    output: PathBuf,

    /// Gzip the output file (replaces its extension with .gz)
    #[arg(long)]
    gzip: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    let cache = if cli.cache || cli.cache_file.is_some() {
        Some(match &cli.cache_file {
            Some(path) => ChunkCache::open(path),
            None => ChunkCache::open_default(),
        })
    } else {
        None
    };

    let digest = Ingestor::new()
        .ingest(&config, cache.as_ref())
        .with_context(|| format!("Failed to ingest {}", cli.path.display()))?;

    if let Some(cache) = &cache {
        if let Err(e) = cache.flush() {
            tracing::warn!("{e}");
        }
    }

    let text = digest.to_text();
    if cli.output.as_os_str() == "-" {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
        return Ok(());
    }

    let written = write_digest(&text, &cli.output, cli.gzip).context("Failed to write digest")?;

    eprintln!("Analysis complete! Output written to: {}", written.display());
    eprintln!(" ({})", format_size(text.len() as u64));
    eprintln!();
    eprintln!("Summary:");
    eprintln!("{}", digest.summary);
    Ok(())
}

/// Log to stderr so stdout carries only the digest.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(cli: &Cli) -> Result<IngestConfig> {
    let path = cli.path.canonicalize().context("Invalid path")?;
    let mut config = IngestConfig::new(path)
        .with_patterns(&cli.include, &cli.exclude)
        .context("Invalid pattern")?;

    config.subpath = cli.subpath.clone();
    config.parallel = cli.parallel;
    config.threads = cli.threads;
    config.redact_secrets = !cli.no_redact;

    if let Some(size) = &cli.max_size {
        config.max_file_size = parse_size(size)?;
    }
    if let Some(max_files) = cli.max_files {
        if max_files == 0 {
            bail!("--max-files must be at least 1");
        }
        config.max_files = max_files;
    }
    Ok(config)
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Parse a size string (e.g., "1KB", "10MB", "1GB").
fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();
    let number = |s: &str| -> Result<f64> {
        s.trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.')
            .parse()
            .with_context(|| format!("Invalid size: {s}"))
    };

    let (num, multiplier) = if s.ends_with("GB") || s.ends_with('G') {
        (number(&s)?, 1024 * 1024 * 1024)
    } else if s.ends_with("MB") || s.ends_with('M') {
        (number(&s)?, 1024 * 1024)
    } else if s.ends_with("KB") || s.ends_with('K') {
        (number(&s)?, 1024)
    } else {
        (number(&s)?, 1)
    };

    Ok((num * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("10B").unwrap(), 10);
        assert_eq!(parse_size("1kb").unwrap(), 1024);
        assert_eq!(parse_size("1.5M").unwrap(), 1536 * 1024);
        assert_eq!(parse_size("2GB").unwrap(), 2 * 1024 * 1024 * 1024);
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::parse_from([
            "repodigest",
            "src",
            "-i",
            "*.rs",
            "-e",
            "target/",
            "--max-files",
            "5",
            "-o",
            "-",
        ]);
        assert_eq!(cli.path, PathBuf::from("src"));
        assert_eq!(cli.include, vec!["*.rs"]);
        assert_eq!(cli.max_files, Some(5));
        assert_eq!(cli.output, PathBuf::from("-"));
        assert!(!cli.gzip);
    }
}
