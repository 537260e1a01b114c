//! Partition forest mirroring the indexed directory trees.
//!
//! Each partition owns the files of a directory subtree minus the subtrees
//! that were large enough to become child partitions. The partition table is
//! small and stays in memory; per-partition listings are separate units
//! loaded lazily through a bounded cache.

use crate::cache::{CacheStats, CachedUnit, UnitCache};
use crate::error::{IndexError, Result};
use crate::index::types::{IndexConfig, PartitionId};
use crate::store::{UnitKey, UnitStore};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// A node of the partition forest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub id: PartitionId,
    /// Absolute directory this partition covers
    pub root: PathBuf,
    /// Files owned directly by this partition (children excluded)
    pub files_number: usize,
    pub children: Vec<PartitionId>,
    pub parent: Option<PartitionId>,
}

impl Partition {
    /// True if `path` is an ancestor of, a descendant of, or equal to the
    /// partition root. Comparison is per path component.
    pub fn in_same_direction(&self, path: &Path) -> bool {
        path.starts_with(&self.root) || self.root.starts_with(path)
    }
}

/// Files owned by a partition: sub-path relative to the partition root
/// ("" for the root itself) to file names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionListing {
    pub entries: BTreeMap<String, Vec<String>>,
}

impl PartitionListing {
    pub fn file_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Absolute paths of the listed files
    pub fn paths<'a>(&'a self, root: &'a Path) -> impl Iterator<Item = PathBuf> + 'a {
        self.entries.iter().flat_map(move |(sub, names)| {
            let dir = if sub.is_empty() {
                root.to_path_buf()
            } else {
                root.join(sub)
            };
            names.iter().map(move |name| dir.join(name))
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PartitionTable {
    next_id: PartitionId,
    roots: Vec<PartitionId>,
    partitions: BTreeMap<PartitionId, Partition>,
}

/// A freshly built partition subtree, before ids are assigned
#[derive(Debug, Clone, Default)]
pub struct PartitionNode {
    pub root: PathBuf,
    pub listing: PartitionListing,
    pub children: Vec<PartitionNode>,
}

impl PartitionNode {
    /// Decompose the files under `root` into partitions. A subdirectory whose
    /// subtree holds more than `max_files` files becomes a child partition;
    /// smaller subdirectories are folded into the enclosing partition.
    pub fn from_files(root: &Path, files: &[PathBuf], max_files: usize) -> Self {
        let mut dirs: BTreeMap<PathBuf, DirEntry> = BTreeMap::new();
        dirs.entry(PathBuf::new()).or_default();

        for file in files {
            let Ok(rel) = file.strip_prefix(root) else {
                debug!("skipping {} outside of {}", file.display(), root.display());
                continue;
            };
            let (Some(parent), Some(name)) = (rel.parent(), rel.file_name()) else {
                continue;
            };
            dirs.entry(parent.to_path_buf())
                .or_default()
                .files
                .push(name.to_string_lossy().into_owned());

            // Link every ancestor to its child directory
            let mut child = parent;
            while let Some(up) = child.parent() {
                dirs.entry(up.to_path_buf())
                    .or_default()
                    .subdirs
                    .insert(child.to_path_buf());
                child = up;
            }
        }

        let mut counts = HashMap::new();
        subtree_count(&dirs, Path::new(""), &mut counts);

        let builder = TreeBuilder {
            root,
            dirs: &dirs,
            counts: &counts,
            max_files,
        };
        builder.node(Path::new(""))
    }

    /// Number of partitions in this subtree
    pub fn partition_count(&self) -> usize {
        1 + self.children.iter().map(PartitionNode::partition_count).sum::<usize>()
    }
}

#[derive(Debug, Default)]
struct DirEntry {
    files: Vec<String>,
    subdirs: BTreeSet<PathBuf>,
}

fn subtree_count(
    dirs: &BTreeMap<PathBuf, DirEntry>,
    dir: &Path,
    counts: &mut HashMap<PathBuf, usize>,
) -> usize {
    let Some(entry) = dirs.get(dir) else {
        return 0;
    };
    let total = entry.files.len()
        + entry
            .subdirs
            .iter()
            .map(|sub| subtree_count(dirs, sub, counts))
            .sum::<usize>();
    counts.insert(dir.to_path_buf(), total);
    total
}

struct TreeBuilder<'a> {
    root: &'a Path,
    dirs: &'a BTreeMap<PathBuf, DirEntry>,
    counts: &'a HashMap<PathBuf, usize>,
    max_files: usize,
}

impl TreeBuilder<'_> {
    fn node(&self, dir: &Path) -> PartitionNode {
        let root = if dir.as_os_str().is_empty() {
            self.root.to_path_buf()
        } else {
            self.root.join(dir)
        };
        let mut node = PartitionNode {
            root,
            ..PartitionNode::default()
        };
        self.fold(dir, dir, &mut node);
        node
    }

    /// Add `dir` and its small subdirectories to `node`
    fn fold(&self, partition_dir: &Path, dir: &Path, node: &mut PartitionNode) {
        let Some(entry) = self.dirs.get(dir) else {
            return;
        };

        if !entry.files.is_empty() {
            let sub = dir
                .strip_prefix(partition_dir)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut names = entry.files.clone();
            names.sort();
            node.listing.entries.insert(sub, names);
        }

        for sub in &entry.subdirs {
            let count = self.counts.get(sub).copied().unwrap_or(0);
            if count > self.max_files {
                node.children.push(self.node(sub));
            } else {
                self.fold(partition_dir, sub, node);
            }
        }
    }
}

/// Result of installing a partition subtree
#[derive(Debug, Clone, Default)]
pub struct TreeUpdate {
    /// (id, root) of every installed partition, parents before children
    pub installed: Vec<(PartitionId, PathBuf)>,
    /// Partitions that no longer exist
    pub removed: Vec<PartitionId>,
}

/// The partition forest and lazily loaded listings
pub struct PartitionStore {
    store: UnitStore,
    table: PartitionTable,
    listings: UnitCache,
}

impl PartitionStore {
    pub fn open(store: UnitStore, config: &IndexConfig) -> Result<Self> {
        let table = store
            .read::<PartitionTable>(&UnitKey::PartitionTable)?
            .unwrap_or_default();
        debug!("loaded {} partitions", table.partitions.len());
        Ok(Self {
            store,
            table,
            listings: UnitCache::new(config.listing_cache_capacity),
        })
    }

    pub fn save(&self) -> Result<()> {
        self.store.write(&UnitKey::PartitionTable, &self.table)
    }

    pub fn get_partition(&self, id: PartitionId) -> Result<&Partition> {
        self.table
            .partitions
            .get(&id)
            .ok_or(IndexError::PartitionNotFound(id))
    }

    pub fn len(&self) -> usize {
        self.table.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.partitions.is_empty()
    }

    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.table.partitions.values()
    }

    /// Top-level partitions, one per indexed root
    pub fn roots(&self) -> impl Iterator<Item = &Partition> {
        self.table
            .roots
            .iter()
            .filter_map(|id| self.table.partitions.get(id))
    }

    /// Deepest partition whose root is a prefix of `path`
    pub fn get_path_partition(&self, path: &Path) -> Option<PartitionId> {
        let mut current = self
            .roots()
            .filter(|p| path.starts_with(&p.root))
            .max_by_key(|p| p.root.components().count())?;

        while let Some(child) = current
            .children
            .iter()
            .filter_map(|id| self.table.partitions.get(id))
            .filter(|p| path.starts_with(&p.root))
            .max_by_key(|p| p.root.components().count())
        {
            current = child;
        }
        Some(current.id)
    }

    /// Indexed root that strictly contains `path`, if any
    pub fn enclosing_root(&self, path: &Path) -> Option<&Path> {
        self.roots()
            .find(|p| path.starts_with(&p.root) && p.root != path)
            .map(|p| p.root.as_path())
    }

    pub fn in_same_direction(&self, id: PartitionId, path: &Path) -> bool {
        self.get_partition(id)
            .is_ok_and(|partition| partition.in_same_direction(path))
    }

    /// Listing of a partition; a missing unit is an empty listing
    pub fn listing(&mut self, id: PartitionId) -> Option<&PartitionListing> {
        let key = UnitKey::Listing(id);
        if self.listings.get(&key).is_none() {
            let listing = match self.store.read::<PartitionListing>(&key) {
                Ok(listing) => listing.unwrap_or_default(),
                Err(e) => {
                    warn!("unreadable listing for partition {id}, treating as empty: {e}");
                    PartitionListing::default()
                }
            };
            self.listings.set(key.clone(), CachedUnit::Listing(listing));
        }
        self.listings.peek(&key).and_then(CachedUnit::as_listing)
    }

    /// Absolute paths of the files a partition owns directly
    pub fn own_files(&mut self, id: PartitionId) -> Vec<PathBuf> {
        let Ok(root) = self.get_partition(id).map(|p| p.root.clone()) else {
            return Vec::new();
        };
        self.listing(id)
            .map(|listing| listing.paths(&root).collect())
            .unwrap_or_default()
    }

    /// Files of a partition followed by those of every descendant related to
    /// `path`. Unrelated partitions are pruned with their whole subtree.
    pub fn get_partition_files(&mut self, id: PartitionId, path: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        self.collect_files(id, path, &mut files);
        files
    }

    fn collect_files(&mut self, id: PartitionId, path: &Path, files: &mut Vec<PathBuf>) {
        let (root, children) = match self.get_partition(id) {
            Ok(p) if p.in_same_direction(path) => (p.root.clone(), p.children.clone()),
            Ok(_) => return,
            Err(e) => {
                warn!("{e}");
                return;
            }
        };

        if let Some(listing) = self.listing(id) {
            files.extend(listing.paths(&root));
        }
        for child in children {
            self.collect_files(child, path, files);
        }
    }

    /// The partition and every descendant related to `path`
    pub fn get_partition_children(&self, id: PartitionId, path: &Path) -> Vec<PartitionId> {
        let mut ids = Vec::new();
        self.collect_children(id, path, &mut ids);
        ids
    }

    fn collect_children(&self, id: PartitionId, path: &Path, ids: &mut Vec<PartitionId>) {
        let Ok(partition) = self.get_partition(id) else {
            return;
        };
        if !partition.in_same_direction(path) {
            return;
        }
        ids.push(id);
        for &child in &partition.children {
            self.collect_children(child, path, ids);
        }
    }

    /// Install a built subtree as a top-level root.
    ///
    /// Existing roots at or below `node.root` are replaced. Partitions whose
    /// root directory survives keep their id, so file ids stored against
    /// them stay valid.
    pub fn replace_tree(&mut self, node: PartitionNode) -> Result<TreeUpdate> {
        let replaced: Vec<PartitionId> = self
            .roots()
            .filter(|p| p.root.starts_with(&node.root))
            .map(|p| p.id)
            .collect();

        let mut reusable: HashMap<PathBuf, PartitionId> = HashMap::new();
        for root_id in &replaced {
            for id in self.subtree_ids(*root_id) {
                if let Some(partition) = self.table.partitions.remove(&id) {
                    reusable.insert(partition.root, id);
                }
            }
        }
        self.table.roots.retain(|id| !replaced.contains(id));

        let mut update = TreeUpdate::default();
        let top = self.install(node, None, &mut reusable, &mut update)?;
        self.table.roots.push(top);

        for (root, id) in reusable {
            debug!("partition {id} ({}) no longer exists", root.display());
            self.listings.delete(&UnitKey::Listing(id));
            self.store.remove(&UnitKey::Listing(id))?;
            update.removed.push(id);
        }
        update.removed.sort_unstable();

        self.save()?;
        info!(
            "installed {} partition(s), removed {}",
            update.installed.len(),
            update.removed.len()
        );
        Ok(update)
    }

    fn install(
        &mut self,
        node: PartitionNode,
        parent: Option<PartitionId>,
        reusable: &mut HashMap<PathBuf, PartitionId>,
        update: &mut TreeUpdate,
    ) -> Result<PartitionId> {
        let id = match reusable.remove(&node.root) {
            Some(id) => id,
            None => {
                let id = self.table.next_id;
                self.table.next_id += 1;
                id
            }
        };

        let key = UnitKey::Listing(id);
        self.store.write(&key, &node.listing)?;
        let files_number = node.listing.file_count();
        self.listings.set(key, CachedUnit::Listing(node.listing));

        self.table.partitions.insert(
            id,
            Partition {
                id,
                root: node.root.clone(),
                files_number,
                children: Vec::new(),
                parent,
            },
        );
        update.installed.push((id, node.root));

        let mut children = Vec::with_capacity(node.children.len());
        for child in node.children {
            children.push(self.install(child, Some(id), reusable, update)?);
        }
        if let Some(partition) = self.table.partitions.get_mut(&id) {
            partition.children = children;
        }
        Ok(id)
    }

    fn subtree_ids(&self, id: PartitionId) -> Vec<PartitionId> {
        let mut ids = Vec::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(partition) = self.table.partitions.get(&id) {
                ids.push(id);
                stack.extend(&partition.children);
            }
        }
        ids
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.listings.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paths(root: &str, rels: &[&str]) -> Vec<PathBuf> {
        rels.iter().map(|r| Path::new(root).join(r)).collect()
    }

    fn open(tmp: &TempDir) -> PartitionStore {
        PartitionStore::open(UnitStore::open(tmp.path()).unwrap(), &IndexConfig::default()).unwrap()
    }

    /// /data with /data/big split out (3 files > threshold 2)
    fn sample_store(tmp: &TempDir) -> PartitionStore {
        let files = paths(
            "/data",
            &["a.txt", "small/b.txt", "big/c1", "big/c2", "big/deep/c3"],
        );
        let node = PartitionNode::from_files(Path::new("/data"), &files, 2);
        let mut store = open(tmp);
        store.replace_tree(node).unwrap();
        store
    }

    #[test]
    fn test_in_same_direction() {
        let partition = Partition {
            id: 0,
            root: PathBuf::from("/data/big"),
            files_number: 0,
            children: vec![],
            parent: None,
        };
        assert!(partition.in_same_direction(Path::new("/data/big")));
        assert!(partition.in_same_direction(Path::new("/data")));
        assert!(partition.in_same_direction(Path::new("/data/big/deep")));
        assert!(!partition.in_same_direction(Path::new("/data/small")));
        // Component-wise, not a string prefix
        assert!(!partition.in_same_direction(Path::new("/data/bigger")));
    }

    #[test]
    fn test_from_files_splits_large_subtrees() {
        let files = paths(
            "/data",
            &["a.txt", "small/b.txt", "big/c1", "big/c2", "big/deep/c3"],
        );
        let node = PartitionNode::from_files(Path::new("/data"), &files, 2);

        assert_eq!(node.partition_count(), 2);
        assert_eq!(node.listing.entries.get(""), Some(&vec!["a.txt".to_string()]));
        assert_eq!(node.listing.entries.get("small"), Some(&vec!["b.txt".to_string()]));

        let big = &node.children[0];
        assert_eq!(big.root, PathBuf::from("/data/big"));
        assert_eq!(big.listing.file_count(), 3);
        assert_eq!(big.listing.entries.get("deep"), Some(&vec!["c3".to_string()]));
    }

    #[test]
    fn test_get_path_partition_longest_prefix() {
        let tmp = TempDir::new().unwrap();
        let store = sample_store(&tmp);

        let root = store.get_path_partition(Path::new("/data")).unwrap();
        let big = store.get_path_partition(Path::new("/data/big/deep/c3")).unwrap();
        assert_ne!(root, big);
        assert_eq!(store.get_partition(big).unwrap().root, PathBuf::from("/data/big"));
        assert_eq!(store.get_path_partition(Path::new("/data/small")), Some(root));
        assert_eq!(store.get_path_partition(Path::new("/elsewhere")), None);
    }

    #[test]
    fn test_unknown_partition_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp);
        let err = store.get_partition(42).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_files_scoped_to_related_partitions() {
        let tmp = TempDir::new().unwrap();
        let mut store = sample_store(&tmp);
        let root = store.get_path_partition(Path::new("/data")).unwrap();

        let all = store.get_partition_files(root, Path::new("/data"));
        assert_eq!(all.len(), 5);
        assert_eq!(all[0], PathBuf::from("/data/a.txt"));

        // /data/small is unrelated to the /data/big partition
        let small = store.get_partition_files(root, Path::new("/data/small"));
        assert_eq!(small.len(), 2);
        assert!(!small.iter().any(|p| p.starts_with("/data/big")));
    }

    #[test]
    fn test_partition_children() {
        let tmp = TempDir::new().unwrap();
        let store = sample_store(&tmp);
        let root = store.get_path_partition(Path::new("/data")).unwrap();
        let big = store.get_path_partition(Path::new("/data/big")).unwrap();

        assert_eq!(store.get_partition_children(root, Path::new("/data")), vec![root, big]);
        assert_eq!(store.get_partition_children(root, Path::new("/data/small")), vec![root]);
        assert_eq!(store.get_partition_children(big, Path::new("/data/small")), Vec::<PartitionId>::new());
    }

    #[test]
    fn test_missing_listing_is_empty() {
        let tmp = TempDir::new().unwrap();
        let mut store = sample_store(&tmp);
        let big = store.get_path_partition(Path::new("/data/big")).unwrap();
        store.store.remove(&UnitKey::Listing(big)).unwrap();
        store.listings.clear();

        assert!(store.own_files(big).is_empty());
    }

    #[test]
    fn test_reindex_keeps_partition_ids() {
        let tmp = TempDir::new().unwrap();
        let mut store = sample_store(&tmp);
        let big = store.get_path_partition(Path::new("/data/big")).unwrap();

        let files = paths("/data", &["a.txt", "big/c1", "big/c2", "big/c4"]);
        let update = store
            .replace_tree(PartitionNode::from_files(Path::new("/data"), &files, 2))
            .unwrap();

        assert!(update.removed.is_empty());
        assert_eq!(store.get_path_partition(Path::new("/data/big")), Some(big));
        assert_eq!(store.roots().count(), 1);
    }

    #[test]
    fn test_reindex_removes_vanished_partitions() {
        let tmp = TempDir::new().unwrap();
        let mut store = sample_store(&tmp);
        let big = store.get_path_partition(Path::new("/data/big")).unwrap();

        let files = paths("/data", &["a.txt"]);
        let update = store
            .replace_tree(PartitionNode::from_files(Path::new("/data"), &files, 2))
            .unwrap();

        assert_eq!(update.removed, vec![big]);
        assert!(store.get_partition(big).is_err());
    }

    #[test]
    fn test_table_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let big = sample_store(&tmp)
            .get_path_partition(Path::new("/data/big"))
            .unwrap();

        let mut store = open(&tmp);
        assert_eq!(store.len(), 2);
        assert_eq!(store.own_files(big).len(), 3);
    }
}
