use crate::query::scorer::NameWeights;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of a partition in the partition forest
pub type PartitionId = u32;

/// Identifier of a file, unique within its partition
pub type FileId = u32;

/// Current on-disk format version, stored in meta.json
pub const FORMAT_VERSION: u32 = 1;

/// What happens to a cached (term, partition) unit after it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Drop the cache entry; the next read reloads the unit from disk.
    #[default]
    Invalidate,
    /// Keep the freshly written map in the cache.
    Refresh,
}

/// Index metadata stored in meta.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    /// Next unassigned file identifier per partition
    #[serde(default)]
    pub next_file_id: BTreeMap<PartitionId, FileId>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Default for IndexMeta {
    fn default() -> Self {
        let now = unix_now();
        Self {
            version: FORMAT_VERSION,
            next_file_id: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A content search hit with its accumulated score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPath {
    pub partition: PartitionId,
    pub file_id: FileId,
    pub path: String,
    pub score: f32,
}

/// Configuration for the index and its caches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Capacity of the (term, partition) score map cache
    pub content_cache_capacity: usize,
    /// Capacity of the per-partition file directory cache
    pub directory_cache_capacity: usize,
    /// Capacity of the per-partition listing cache
    pub listing_cache_capacity: usize,
    /// Capacity of the per-partition metadata tree cache
    pub metadata_cache_capacity: usize,
    pub write_policy: WritePolicy,
    /// A subdirectory holding more files than this gets its own partition
    pub partition_max_files: usize,
    pub max_file_size: u64,
    pub ignored_paths: Vec<String>,
    /// Lowercase terms at index and query time
    pub fold_case: bool,
    /// Weights for file name matching
    pub name_weights: NameWeights,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            content_cache_capacity: 100,
            directory_cache_capacity: 10,
            listing_cache_capacity: 10,
            metadata_cache_capacity: 10,
            write_policy: WritePolicy::Invalidate,
            partition_max_files: 1000,
            max_file_size: 10 * 1024 * 1024,
            ignored_paths: vec![
                ".git".to_string(),
                "node_modules".to_string(),
                "target".to_string(),
            ],
            fold_case: true,
            name_weights: NameWeights::default(),
        }
    }
}

/// Seconds since the unix epoch, 0 if the clock is before it
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_partial_json() {
        let json = r#"{"write_policy": "refresh", "partition_max_files": 5}"#;
        let config: IndexConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.write_policy, WritePolicy::Refresh);
        assert_eq!(config.partition_max_files, 5);
        assert_eq!(config.content_cache_capacity, 100);
        assert!(config.fold_case);
    }

    #[test]
    fn test_meta_counters_survive_json() {
        let mut meta = IndexMeta::default();
        meta.next_file_id.insert(3, 17);

        let json = serde_json::to_string(&meta).unwrap();
        let parsed: IndexMeta = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.next_file_id.get(&3), Some(&17));
        assert_eq!(parsed.version, FORMAT_VERSION);
    }
}
