use crate::index::FileIndex;
use crate::index::content::FileTerms;
use crate::index::metadata::{FileMetadata, KdTree};
use crate::index::partition::PartitionNode;
use crate::index::types::PartitionId;
use crate::utils::progress::{bar, spinner};
use crate::utils::{is_binary, term_frequencies};
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Options for one indexing run
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Hide progress output
    pub silent: bool,
    /// Worker threads for reading and tokenizing files; 0 lets rayon decide
    pub threads: usize,
}

/// Summary of an indexing run
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Root that was actually indexed
    pub root: PathBuf,
    pub partitions: usize,
    pub removed_partitions: usize,
    pub files: usize,
    /// Files indexed by metadata only (binary or over the size cap)
    pub metadata_only: usize,
    pub errors: usize,
}

/// Result of reading a single file (computed in parallel)
struct ProcessedFile {
    metadata: FileMetadata,
    terms: Option<Vec<(String, f32)>>,
}

/// Read metadata and, for text files under the size cap, term frequencies
fn process_file(path: &Path, max_file_size: u64, fold_case: bool) -> Option<ProcessedFile> {
    let fs_meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            debug!("skipping {}: {e}", path.display());
            return None;
        }
    };
    let metadata = FileMetadata::from_fs(path.to_string_lossy().into_owned(), &fs_meta);

    if fs_meta.len() > max_file_size {
        return Some(ProcessedFile {
            metadata,
            terms: None,
        });
    }

    let content = match fs::read(path) {
        Ok(c) => c,
        Err(e) => {
            debug!("skipping {}: {e}", path.display());
            return None;
        }
    };

    let terms = if is_binary(&content) {
        None
    } else {
        Some(term_frequencies(&String::from_utf8_lossy(&content), fold_case))
    };

    Some(ProcessedFile { metadata, terms })
}

/// Walk `root` collecting every file, skipping ignored directory names and
/// the index directory itself
fn collect_files(root: &Path, ignored: &[String], index_dir: &Path) -> Vec<PathBuf> {
    let ignored = ignored.to_vec();
    let index_dir = index_dir.to_path_buf();

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(true)
        .filter_entry(move |entry| {
            let name = entry.file_name().to_string_lossy();
            !ignored.iter().any(|i| i == name.as_ref()) && entry.path() != index_dir
        })
        .build();

    let mut files: Vec<PathBuf> = walker
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Index (or re-index) a directory tree.
///
/// A path inside an already indexed root re-indexes that whole root, so the
/// partition forest never holds overlapping roots. Partition and file ids of
/// surviving paths are kept.
pub fn build_index(index: &mut FileIndex, path: &Path, options: &BuildOptions) -> Result<BuildReport> {
    let mut root = path
        .canonicalize()
        .with_context(|| format!("Invalid path: {}", path.display()))?;
    if !root.is_dir() {
        anyhow::bail!("Not a directory: {}", root.display());
    }
    if let Some(enclosing) = index.partitions.enclosing_root(&root) {
        info!(
            "{} is inside indexed root {}, re-indexing the root",
            root.display(),
            enclosing.display()
        );
        root = enclosing.to_path_buf();
    }

    let config = index.config().clone();
    let index_dir = index.dir().canonicalize().unwrap_or_else(|_| index.dir());

    if !options.silent {
        println!("Indexing: {}", root.display());
    }

    // Phase 1: discover files and lay out partitions
    let discover = spinner("Discovering files...", options.silent);
    let files = collect_files(&root, &config.ignored_paths, &index_dir);
    let node = PartitionNode::from_files(&root, &files, config.partition_max_files);
    if let Some(spinner) = discover {
        spinner.finish_with_message(format!(
            "Found {} files in {} partitions",
            files.len(),
            node.partition_count()
        ));
    }

    let update = index
        .partitions
        .replace_tree(node)
        .context("Failed to install partition tree")?;
    for &removed in &update.removed {
        index.content.drop_partition(removed);
        if let Err(e) = index.metadata.remove(removed) {
            warn!("could not remove metadata of partition {removed}: {e}");
        }
    }

    // Phase 2: read and tokenize each partition's own files
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads)
        .build()
        .context("Failed to start indexing threads")?;
    let progress = bar(files.len() as u64, "Processing files...".to_string(), options.silent);
    let error_count = AtomicUsize::new(0);

    let mut report = BuildReport {
        root: root.clone(),
        partitions: update.installed.len(),
        removed_partitions: update.removed.len(),
        ..BuildReport::default()
    };

    for (partition, partition_root) in &update.installed {
        let own = index.partitions.own_files(*partition);
        debug!(
            "partition {partition} ({}): {} files",
            partition_root.display(),
            own.len()
        );

        let processed: Vec<ProcessedFile> = pool.install(|| {
            own.par_iter()
                .filter_map(|path| {
                    let result = process_file(path, config.max_file_size, config.fold_case);
                    if result.is_none() {
                        error_count.fetch_add(1, Ordering::Relaxed);
                    }
                    if let Some(ref pb) = progress {
                        pb.inc(1);
                    }
                    result
                })
                .collect()
        });

        store_partition(index, *partition, processed, &mut report)?;
    }

    if let Some(pb) = progress {
        pb.finish_with_message(format!("Processed {} files", report.files));
    }

    // Phase 3: flush counters and the partition table
    let finalize = spinner("Finalizing index...", options.silent);
    index.flush().context("Failed to write index metadata")?;
    if let Some(spinner) = finalize {
        spinner.finish_with_message("Index complete");
    }

    report.errors = error_count.load(Ordering::Relaxed);
    if report.errors > 0 && !options.silent {
        eprintln!("({} files could not be read)", report.errors);
    }
    info!(
        "indexed {} files under {} ({} partitions)",
        report.files,
        root.display(),
        report.partitions
    );

    Ok(report)
}

fn store_partition(
    index: &mut FileIndex,
    partition: PartitionId,
    processed: Vec<ProcessedFile>,
    report: &mut BuildReport,
) -> Result<()> {
    let mut records = Vec::with_capacity(processed.len());
    let mut file_terms = Vec::with_capacity(processed.len());

    for file in processed {
        match file.terms {
            Some(terms) => file_terms.push(FileTerms {
                path: file.metadata.path.clone(),
                terms,
            }),
            None => report.metadata_only += 1,
        }
        records.push(file.metadata);
    }

    report.files += records.len();
    // Parents are stored before children, so a file that moved into a new
    // child partition has already left its old one when the child inserts it
    let keep: HashSet<&str> = file_terms.iter().map(|f| f.path.as_str()).collect();
    let dropped = index.content.retain_files(partition, &keep);
    if dropped > 0 {
        debug!("partition {partition}: {dropped} file(s) left the content index");
    }
    index.content.insert_many(partition, file_terms);
    index
        .metadata
        .put(partition, KdTree::build(records))
        .with_context(|| format!("Failed to store metadata of partition {partition}"))?;
    Ok(())
}
