use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dlocate::index::build::{BuildOptions, build_index};
use dlocate::index::stats::show_stats;
use dlocate::index::{FileIndex, MetadataBounds};
use dlocate::output::{print_find_result, print_metadata};
use dlocate::query::Searcher;
use dlocate::utils::{AppConfig, resolve_index_dir};
use log::{debug, warn};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "dlocate")]
#[command(about = "Partitioned file name, content and metadata search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the index
    #[arg(long, env = "DLOCATE_INDEX_DIR", global = true)]
    index_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or rebuild the index for a directory tree
    Index {
        /// Directory to index
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Hide progress output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Search file names, and optionally contents
    Search {
        /// Search terms
        #[arg(required = true)]
        terms: Vec<String>,

        /// Path to search in
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Also search file contents
        #[arg(short, long)]
        content: bool,

        /// Show name match scores
        #[arg(short, long)]
        scores: bool,
    },
    /// Find files by size and timestamps (unix seconds); 0 leaves a bound open
    Meta {
        /// Path to search in
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        #[arg(long)]
        min_size: Option<u64>,
        #[arg(long)]
        max_size: Option<u64>,
        #[arg(long)]
        changed_after: Option<u64>,
        #[arg(long)]
        changed_before: Option<u64>,
        #[arg(long)]
        modified_after: Option<u64>,
        #[arg(long)]
        modified_before: Option<u64>,
        #[arg(long)]
        accessed_after: Option<u64>,
        #[arg(long)]
        accessed_before: Option<u64>,

        /// Show size and timestamps
        #[arg(short, long)]
        long: bool,
    },
    /// Show index statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let app_config = AppConfig::load().unwrap_or_else(|e| {
        warn!("using default configuration: {e:#}");
        AppConfig::default()
    });
    let index_dir = resolve_index_dir(cli.index_dir.as_deref())?;
    debug!("index directory: {}", index_dir.display());

    let mut index = FileIndex::open(&index_dir, app_config.index.clone())
        .with_context(|| format!("Failed to open index at {}", index_dir.display()))?;
    let color = !cli.no_color;

    match cli.command {
        Commands::Index { path, quiet } => {
            let options = BuildOptions {
                silent: quiet,
                threads: app_config.effective_index_threads(),
            };
            build_index(&mut index, &path, &options)?;
            if !quiet {
                println!("Index stored at: {}", index_dir.display());
            }
        }
        Commands::Search {
            terms,
            path,
            content,
            scores,
        } => {
            ensure_indexed(&index)?;
            let path = search_path(&path)?;
            let query = terms.join(" ");
            let result = Searcher::new(&mut index).find_by_name(&query, &path, content);
            print_find_result(&result, color, scores)?;
        }
        Commands::Meta {
            path,
            min_size,
            max_size,
            changed_after,
            changed_before,
            modified_after,
            modified_before,
            accessed_after,
            accessed_before,
            long,
        } => {
            ensure_indexed(&index)?;
            let path = search_path(&path)?;
            let start = MetadataBounds {
                size: min_size.unwrap_or(0),
                ctime: changed_after.unwrap_or(0),
                mtime: modified_after.unwrap_or(0),
                atime: accessed_after.unwrap_or(0),
            };
            let end = MetadataBounds {
                size: max_size.unwrap_or(0),
                ctime: changed_before.unwrap_or(0),
                mtime: modified_before.unwrap_or(0),
                atime: accessed_before.unwrap_or(0),
            };
            let records = Searcher::new(&mut index).meta_search(&path, &start, &end);
            print_metadata(&records, color, long)?;
        }
        Commands::Stats => {
            show_stats(&index)?;
        }
    }

    index.close().context("Failed to save index")?;
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn ensure_indexed(index: &FileIndex) -> Result<()> {
    if index.partitions.is_empty() {
        anyhow::bail!("No index found. Run `dlocate index <dir>` first");
    }
    Ok(())
}

/// Search paths are matched against canonical partition roots
fn search_path(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("Invalid path: {}", path.display()))
}
