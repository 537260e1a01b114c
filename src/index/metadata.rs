//! Metadata range index: one k-d tree per partition over
//! (size, change time, modify time, access time).
//!
//! The tree is stored implicitly in a single vector. For any subslice the
//! median element sits at `len / 2` and splits on axis `depth % 4`; smaller
//! or equal keys go left, greater or equal keys go right.

use crate::cache::{CacheStats, CachedUnit, UnitCache};
use crate::error::Result;
use crate::index::types::{IndexConfig, PartitionId};
use crate::store::{UnitKey, UnitStore};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

/// Number of indexed attributes
pub const DIMENSIONS: usize = 4;

/// Indexed metadata of one file. Times are seconds since the unix epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// Last change of name, path or inode
    pub ctime: u64,
    /// Last content change
    pub mtime: u64,
    /// Last access
    pub atime: u64,
}

impl FileMetadata {
    /// Capture the indexed attributes from filesystem metadata
    pub fn from_fs(path: String, meta: &fs::Metadata) -> Self {
        let mtime = epoch_secs(meta.modified().ok());
        let atime = epoch_secs(meta.accessed().ok());

        #[cfg(unix)]
        let ctime = {
            use std::os::unix::fs::MetadataExt;
            meta.ctime().max(0) as u64
        };
        #[cfg(not(unix))]
        let ctime = epoch_secs(meta.created().ok());

        Self {
            path,
            size: meta.len(),
            ctime,
            mtime,
            atime,
        }
    }

    #[inline]
    fn value(&self, axis: usize) -> u64 {
        match axis {
            0 => self.size,
            1 => self.ctime,
            2 => self.mtime,
            _ => self.atime,
        }
    }
}

fn epoch_secs(time: Option<SystemTime>) -> u64 {
    time.and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs())
}

/// One side of a partial range query. A zero field leaves that side of the
/// dimension open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataBounds {
    pub size: u64,
    pub ctime: u64,
    pub mtime: u64,
    pub atime: u64,
}

impl MetadataBounds {
    fn values(&self) -> [Option<u64>; DIMENSIONS] {
        [self.size, self.ctime, self.mtime, self.atime].map(|v| (v != 0).then_some(v))
    }
}

/// Balanced k-d tree over file metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KdTree {
    records: Vec<FileMetadata>,
}

impl KdTree {
    pub fn build(mut records: Vec<FileMetadata>) -> Self {
        arrange(&mut records, 0);
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records satisfying every bound that is set in `start` (lower) and
    /// `end` (upper). Both bounds are inclusive.
    pub fn search_partial(&self, start: &MetadataBounds, end: &MetadataBounds) -> Vec<&FileMetadata> {
        let range = QueryRange {
            lower: start.values(),
            upper: end.values(),
        };
        let mut found = Vec::new();
        search(&self.records, 0, &range, &mut found);
        found
    }
}

fn arrange(records: &mut [FileMetadata], depth: usize) {
    if records.len() <= 1 {
        return;
    }
    let axis = depth % DIMENSIONS;
    let mid = records.len() / 2;
    records.select_nth_unstable_by_key(mid, |r| r.value(axis));

    let (left, right) = records.split_at_mut(mid);
    arrange(left, depth + 1);
    arrange(&mut right[1..], depth + 1);
}

struct QueryRange {
    lower: [Option<u64>; DIMENSIONS],
    upper: [Option<u64>; DIMENSIONS],
}

impl QueryRange {
    fn contains(&self, record: &FileMetadata) -> bool {
        (0..DIMENSIONS).all(|axis| {
            let value = record.value(axis);
            self.lower[axis].is_none_or(|lo| value >= lo)
                && self.upper[axis].is_none_or(|hi| value <= hi)
        })
    }
}

fn search<'a>(
    records: &'a [FileMetadata],
    depth: usize,
    range: &QueryRange,
    found: &mut Vec<&'a FileMetadata>,
) {
    if records.is_empty() {
        return;
    }
    let axis = depth % DIMENSIONS;
    let mid = records.len() / 2;
    let node = &records[mid];
    let split = node.value(axis);

    if range.contains(node) {
        found.push(node);
    }
    if range.lower[axis].is_none_or(|lo| lo <= split) {
        search(&records[..mid], depth + 1, range, found);
    }
    if range.upper[axis].is_none_or(|hi| hi >= split) {
        search(&records[mid + 1..], depth + 1, range, found);
    }
}

/// Per-partition metadata trees, loaded through a bounded cache
pub struct MetadataIndex {
    store: UnitStore,
    cache: UnitCache,
}

impl MetadataIndex {
    pub fn open(store: UnitStore, config: &IndexConfig) -> Self {
        Self {
            store,
            cache: UnitCache::new(config.metadata_cache_capacity),
        }
    }

    /// Persist the tree of a partition and make it the cached copy
    pub fn put(&mut self, partition: PartitionId, tree: KdTree) -> Result<()> {
        let key = UnitKey::Metadata(partition);
        let written = self.store.write(&key, &tree);
        // Cache even on failure so this session still answers from it
        self.cache.set(key, CachedUnit::Metadata(tree));
        written
    }

    pub fn remove(&mut self, partition: PartitionId) -> Result<()> {
        let key = UnitKey::Metadata(partition);
        self.cache.delete(&key);
        self.store.remove(&key)
    }

    /// Tree of a partition; an absent unit is an empty tree
    pub fn tree(&mut self, partition: PartitionId) -> Option<&KdTree> {
        let key = UnitKey::Metadata(partition);
        if self.cache.get(&key).is_none() {
            let tree = match self.store.read::<KdTree>(&key) {
                Ok(Some(tree)) => tree,
                Ok(None) => {
                    debug!("no metadata unit for partition {partition}");
                    KdTree::default()
                }
                Err(e) => {
                    warn!("unreadable metadata for partition {partition}, treating as empty: {e}");
                    KdTree::default()
                }
            };
            self.cache.set(key.clone(), CachedUnit::Metadata(tree));
        }
        self.cache.peek(&key).and_then(CachedUnit::as_metadata)
    }

    pub fn search_partial(
        &mut self,
        partition: PartitionId,
        start: &MetadataBounds,
        end: &MetadataBounds,
    ) -> Vec<FileMetadata> {
        self.tree(partition)
            .map(|tree| tree.search_partial(start, end).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
