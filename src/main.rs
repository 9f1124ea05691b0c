//! Voidtweak CLI - Command-line tool for Void engine resource archives.
//!
//! This is the main entry point for the voidtweak command-line application.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use voidtweak::prelude::*;

/// Voidtweak - browse, extract and patch Void engine resource archives
#[derive(Parser)]
#[command(name = "voidtweak")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory containing master.index
    #[arg(short, long, global = true, env = "VOIDTWEAK_BASE_DIR", default_value = ".")]
    base_dir: PathBuf,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show containers and their resource pools
    Info,

    /// List entries
    List {
        /// Filter pattern on destination paths (glob-style)
        #[arg(short, long)]
        filter: Option<String>,

        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,

        /// Print entries as JSON
        #[arg(long, conflicts_with = "detailed")]
        json: bool,
    },

    /// Find entries whose source or destination path contains QUERY
    Search {
        /// Case-sensitive substring
        query: String,

        /// Result order (none, size, size-desc, type, type-desc, src,
        /// src-desc, dst, dst-desc)
        #[arg(short, long, default_value = "none")]
        sort: SortOrder,
    },

    /// Extract one entry to a file
    Extract {
        /// Container number
        #[arg(short, long)]
        container: usize,

        /// Entry number within the container
        #[arg(short, long)]
        entry: usize,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replace one entry's payload with a file, in place
    Import {
        /// Container number
        #[arg(short, long)]
        container: usize,

        /// Entry number within the container
        #[arg(short, long)]
        entry: usize,

        /// Input file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Extract every entry below a directory
    ExportAll {
        /// Output directory
        #[arg(short, long, env = "OUTPUT_FOLDER")]
        output: PathBuf,
    },

    /// Check that every entry fits inside its resource pool
    Verify,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let base_dir = cli.base_dir.as_path();
    match cli.command {
        Commands::Info => cmd_info(base_dir)?,
        Commands::List {
            filter,
            detailed,
            json,
        } => cmd_list(base_dir, filter.as_deref(), detailed, json)?,
        Commands::Search { query, sort } => cmd_search(base_dir, &query, sort)?,
        Commands::Extract {
            container,
            entry,
            output,
        } => cmd_extract(base_dir, EntryRef::new(container, entry), &output)?,
        Commands::Import {
            container,
            entry,
            input,
        } => cmd_import(base_dir, EntryRef::new(container, entry), &input)?,
        Commands::ExportAll { output } => cmd_export_all(base_dir, &output)?,
        Commands::Verify => cmd_verify(base_dir)?,
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn open_archive(base_dir: &Path) -> Result<ResourceArchive> {
    let start = Instant::now();
    let archive = ResourceArchive::open(base_dir)
        .with_context(|| format!("Failed to load indexes from {}", base_dir.display()))?;
    tracing::info!(
        "Loaded {} entries from {} containers in {:?}",
        archive.entry_count(),
        archive.container_count(),
        start.elapsed()
    );
    Ok(archive)
}

/// Start the worker and load the indexes through it.
fn start_service(base_dir: &Path) -> Result<ArchiveService> {
    let service = ArchiveService::spawn(base_dir).context("Failed to start archive worker")?;
    let summary = service
        .load_indexes()?
        .wait()
        .with_context(|| format!("Failed to load indexes from {}", base_dir.display()))?;
    tracing::info!(
        "Loaded {} entries from {} containers ({} deleted records skipped)",
        summary.entries,
        summary.containers,
        summary.tombstones
    );
    Ok(service)
}

fn cmd_info(base_dir: &Path) -> Result<()> {
    let archive = open_archive(base_dir)?;

    for (i, container) in archive.containers().iter().enumerate() {
        println!("[{}] {} ({} entries)", i, container.path, container.entry_count());
        for (r, resource) in container.resources.iter().enumerate() {
            println!("    {:>3} {}", r, resource);
        }
    }

    println!(
        "\nTotal: {} containers, {} entries",
        archive.container_count(),
        archive.entry_count()
    );

    Ok(())
}

fn cmd_list(base_dir: &Path, filter: Option<&str>, detailed: bool, json: bool) -> Result<()> {
    let archive = open_archive(base_dir)?;
    let pattern = filter
        .map(glob::Pattern::new)
        .transpose()
        .context("Invalid filter pattern")?;

    let entries: Vec<&Entry> = archive
        .iter()
        .filter(|e| pattern.as_ref().map_or(true, |p| p.matches(&e.dst)))
        .collect();

    if json {
        let out = serde_json::to_string_pretty(&entries).context("Failed to serialize entries")?;
        println!("{}", out);
        return Ok(());
    }

    for entry in &entries {
        if detailed {
            let resource = archive.containers()[entry.container]
                .resource_name(entry.flags2)
                .unwrap_or("?");
            println!(
                "{:>8} {:>12} {:>12} {} {:<24} {:<16} {}",
                entry.reference().to_string(),
                entry.size,
                entry.size_packed,
                if entry.is_compressed() { "Z" } else { " " },
                resource,
                entry.type_name,
                entry.dst
            );
        } else {
            println!("{}", entry.dst);
        }
    }

    println!("\nTotal: {} entries", entries.len());

    Ok(())
}

fn cmd_search(base_dir: &Path, query: &str, sort: SortOrder) -> Result<()> {
    let service = start_service(base_dir)?;

    let search = service.search(query)?;
    let mut matches: Vec<SearchMatch> = search.matches().iter().collect();
    search.finish().context("Search failed")?;

    matches.sort_by(|a, b| sort.compare(&a.entry, &b.entry));
    for found in &matches {
        println!(
            "{:>8} {:>12} {:<16} {}",
            found.reference.to_string(),
            found.entry.size,
            found.entry.type_name,
            found.entry.dst
        );
    }

    println!("\nFound {} entries", matches.len());

    Ok(())
}

fn cmd_extract(base_dir: &Path, reference: EntryRef, output: &Path) -> Result<()> {
    let service = start_service(base_dir)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let written = service
        .export_to_file(reference, output)?
        .wait()
        .with_context(|| format!("Failed to extract entry {}", reference))?;

    println!("Wrote {} bytes to {}", written, output.display());

    Ok(())
}

fn cmd_import(base_dir: &Path, reference: EntryRef, input: &Path) -> Result<()> {
    let service = start_service(base_dir)?;

    service
        .import_from_file(reference, input)?
        .wait()
        .with_context(|| format!("Failed to import {} into entry {}", input.display(), reference))?;

    println!("Patched entry {} from {}", reference, input.display());

    Ok(())
}

fn cmd_export_all(base_dir: &Path, output: &Path) -> Result<()> {
    let archive = open_archive(base_dir)?;

    println!("Exporting {} entries to {}...", archive.entry_count(), output.display());

    let pb = ProgressBar::new(archive.entry_count() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let summary = archive
        .export_all_with(output, |done, _, _| pb.set_position(done as u64))
        .context("Export failed")?;

    pb.finish_with_message("Done");
    println!(
        "Exported {} files ({} bytes) in {:?}",
        summary.files,
        summary.bytes,
        start.elapsed()
    );

    Ok(())
}

fn cmd_verify(base_dir: &Path) -> Result<()> {
    let archive = open_archive(base_dir)?;

    let failures = archive.verify();
    for (reference, error) in &failures {
        let dst = archive.get(*reference).map(|e| e.dst.as_str()).unwrap_or("?");
        println!("{:>8} {}: {}", reference.to_string(), dst, error);
    }

    if !failures.is_empty() {
        anyhow::bail!("{} of {} entries failed verification", failures.len(), archive.entry_count());
    }
    println!("All {} entries fit their resource pools", archive.entry_count());

    Ok(())
}
