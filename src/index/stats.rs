use crate::cache::CacheStats;
use crate::index::FileIndex;
use anyhow::Result;
use std::io::{self, Write};

/// Snapshot of index size and cache behaviour.
///
/// Cache counters cover the lifetime of the [`FileIndex`] they were taken
/// from, not the index on disk.
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub roots: Vec<String>,
    pub partitions: usize,
    pub files: usize,
    pub size_on_disk: u64,
    pub created_at: u64,
    pub updated_at: u64,
    pub listing_cache: CacheStats,
    pub directory_cache: CacheStats,
    pub content_cache: CacheStats,
    pub metadata_cache: CacheStats,
}

impl IndexStats {
    pub fn collect(index: &FileIndex) -> Self {
        let (directory_cache, content_cache) = index.content.cache_stats();
        Self {
            roots: index
                .partitions
                .roots()
                .map(|p| p.root.display().to_string())
                .collect(),
            partitions: index.partitions.len(),
            files: index.partitions.partitions().map(|p| p.files_number).sum(),
            size_on_disk: index.size_on_disk(),
            created_at: index.content.meta().created_at,
            updated_at: index.content.meta().updated_at,
            listing_cache: index.partitions.cache_stats(),
            directory_cache,
            content_cache,
            metadata_cache: index.metadata.cache_stats(),
        }
    }
}

/// Display index statistics
pub fn show_stats(index: &FileIndex) -> Result<()> {
    write_stats(&mut io::stdout().lock(), index)
}

pub fn write_stats<W: Write>(out: &mut W, index: &FileIndex) -> Result<()> {
    let stats = IndexStats::collect(index);

    writeln!(out, "Index Statistics")?;
    writeln!(out, "================")?;
    writeln!(out)?;
    writeln!(out, "Index location:   {}", index.dir().display())?;
    writeln!(out, "Partitions:       {}", stats.partitions)?;
    writeln!(out, "Files:            {}", stats.files)?;
    writeln!(out, "Index size:       {}", format_size(stats.size_on_disk))?;

    writeln!(out)?;
    writeln!(out, "Roots:")?;
    if stats.roots.is_empty() {
        writeln!(out, "  (none indexed)")?;
    }
    for root in &stats.roots {
        writeln!(out, "  {}", root)?;
    }

    writeln!(out)?;
    writeln!(out, "Cache capacities:")?;
    for (name, cache) in [
        ("listings", &stats.listing_cache),
        ("directories", &stats.directory_cache),
        ("terms", &stats.content_cache),
        ("metadata", &stats.metadata_cache),
    ] {
        writeln!(out, "  {:12} {}", name, cache.capacity)?;
    }

    writeln!(out)?;
    writeln!(out, "Created:          {}", format_timestamp(stats.created_at))?;
    writeln!(out, "Updated:          {}", format_timestamp(stats.updated_at))?;

    Ok(())
}

/// Format byte size to human readable
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Format unix timestamp
pub fn format_timestamp(ts: u64) -> String {
    use std::time::{Duration, UNIX_EPOCH};
    let datetime = UNIX_EPOCH + Duration::from_secs(ts);
    format!("{:?}", datetime)
}
