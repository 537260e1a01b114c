//! Partitioned inverted index over file contents.
//!
//! Postings are stored as one unit per (term, partition): a map from file id
//! to score. Each partition also has a directory unit mapping file ids to
//! paths, and a terms unit recording which terms each file was indexed under
//! so postings can be pruned when files leave the partition. Directory and
//! score reads go through bounded caches.

use crate::cache::{CacheStats, CachedUnit, UnitCache};
use crate::error::Result;
use crate::index::normalize::{IdentityNormalizer, TermNormalizer};
use crate::index::types::{
    FileId, IndexConfig, IndexMeta, PartitionId, ScoredPath, WritePolicy, unix_now,
};
use crate::store::{UnitKey, UnitStore};
use ahash::AHashMap;
use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Scores of one term within one partition, by file id
pub type ScoreMap = BTreeMap<FileId, f32>;

/// Normalized terms each file of a partition has postings under
type TermSets = BTreeMap<FileId, BTreeSet<String>>;

/// File id <-> path mapping for one partition.
///
/// Only the id -> path side is persisted; the reverse map is rebuilt on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<FileId, String>",
    into = "BTreeMap<FileId, String>"
)]
pub struct FileDirectory {
    paths: BTreeMap<FileId, String>,
    ids: HashMap<String, FileId>,
}

impl FileDirectory {
    pub fn id_of(&self, path: &str) -> Option<FileId> {
        self.ids.get(path).copied()
    }

    pub fn path_of(&self, id: FileId) -> Option<&str> {
        self.paths.get(&id).map(String::as_str)
    }

    pub fn insert(&mut self, id: FileId, path: String) {
        self.ids.insert(path.clone(), id);
        self.paths.insert(id, path);
    }

    pub fn remove(&mut self, id: FileId) -> Option<String> {
        let path = self.paths.remove(&id)?;
        self.ids.remove(&path);
        Some(path)
    }

    /// Smallest id greater than every assigned id
    pub fn next_free_id(&self) -> FileId {
        self.paths.keys().next_back().map_or(0, |id| id + 1)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FileId, &str)> {
        self.paths.iter().map(|(id, path)| (*id, path.as_str()))
    }
}

impl From<BTreeMap<FileId, String>> for FileDirectory {
    fn from(paths: BTreeMap<FileId, String>) -> Self {
        let ids = paths.iter().map(|(id, path)| (path.clone(), *id)).collect();
        Self { paths, ids }
    }
}

impl From<FileDirectory> for BTreeMap<FileId, String> {
    fn from(directory: FileDirectory) -> Self {
        directory.paths
    }
}

/// One file's worth of term scores for [`ContentIndex::insert_many`]
#[derive(Debug, Clone)]
pub struct FileTerms {
    pub path: String,
    pub terms: Vec<(String, f32)>,
}

/// Disk-backed inverted index mapping terms to scored files per partition
pub struct ContentIndex {
    store: UnitStore,
    meta: IndexMeta,
    directories: UnitCache,
    scores: UnitCache,
    normalizer: Box<dyn TermNormalizer>,
    write_policy: WritePolicy,
    /// Units whose last write failed; in-memory state is ahead of disk
    unpersisted: HashSet<UnitKey>,
}

impl ContentIndex {
    /// Open the content index stored under `store`
    pub fn open(store: UnitStore, config: &IndexConfig) -> Result<Self> {
        let meta = store.read::<IndexMeta>(&UnitKey::Meta)?.unwrap_or_default();
        debug!(
            "content index opened at {} ({} partitions with files)",
            store.dir().display(),
            meta.next_file_id.len()
        );

        Ok(Self {
            store,
            meta,
            directories: UnitCache::new(config.directory_cache_capacity),
            scores: UnitCache::new(config.content_cache_capacity),
            normalizer: Box::new(IdentityNormalizer),
            write_policy: config.write_policy,
            unpersisted: HashSet::new(),
        })
    }

    /// Replace the term normalizer
    pub fn with_normalizer(mut self, normalizer: Box<dyn TermNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Persist the file id counters and release the index
    pub fn close(mut self) -> Result<()> {
        self.save_meta()?;
        if !self.unpersisted.is_empty() {
            warn!(
                "closing content index with {} unit(s) that failed to persist",
                self.unpersisted.len()
            );
        }
        Ok(())
    }

    pub fn save_meta(&mut self) -> Result<()> {
        self.meta.updated_at = unix_now();
        self.store.write(&UnitKey::Meta, &self.meta)
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    /// Add or update one file's term scores, returning its file id.
    ///
    /// Scores replace previous values for the same (term, file); they are
    /// never accumulated.
    pub fn insert<I, K>(&mut self, partition: PartitionId, path: &str, terms: I) -> FileId
    where
        I: IntoIterator<Item = (K, f32)>,
        K: AsRef<str>,
    {
        let file = FileTerms {
            path: path.to_string(),
            terms: terms
                .into_iter()
                .map(|(term, score)| (term.as_ref().to_string(), score))
                .collect(),
        };
        self.insert_many(partition, vec![file])
            .pop()
            .unwrap_or_default()
    }

    /// Insert several files of one partition, writing each touched
    /// (term, partition) unit once. Returns file ids in input order.
    pub fn insert_many(&mut self, partition: PartitionId, files: Vec<FileTerms>) -> Vec<FileId> {
        let ids = self.assign_file_ids(partition, files.iter().map(|f| f.path.as_str()));

        let mut by_term: BTreeMap<String, Vec<(FileId, f32)>> = BTreeMap::new();
        for (file, &file_id) in files.iter().zip(&ids) {
            for (term, score) in &file.terms {
                let Some(term) = self.normalizer.normalize(term) else {
                    continue;
                };
                by_term
                    .entry(term.into_owned())
                    .or_default()
                    .push((file_id, *score));
            }
        }
        if by_term.is_empty() {
            return ids;
        }

        let terms_key = UnitKey::Terms(partition);
        let mut term_sets: TermSets = self.read_unit(&terms_key).unwrap_or_default();
        for (term, updates) in &by_term {
            for (file_id, _) in updates {
                term_sets.entry(*file_id).or_default().insert(term.clone());
            }
        }
        self.persist(&terms_key, &term_sets);

        for (term, updates) in by_term {
            self.update_scores(partition, &term, updates);
        }

        ids
    }

    /// Forget every file of `partition` whose path is not in `keep`.
    ///
    /// Their postings and directory entries are removed. Their ids are not
    /// handed out again. Returns the number of files dropped.
    pub fn retain_files(&mut self, partition: PartitionId, keep: &HashSet<&str>) -> usize {
        let dir_key = UnitKey::Directory(partition);
        let mut directory = self.take_directory(partition);
        let departed: Vec<FileId> = directory
            .iter()
            .filter(|(_, path)| !keep.contains(path))
            .map(|(id, _)| id)
            .collect();
        if departed.is_empty() {
            self.directories.set(dir_key, CachedUnit::Directory(directory));
            return 0;
        }

        let terms_key = UnitKey::Terms(partition);
        let mut term_sets: TermSets = self.read_unit(&terms_key).unwrap_or_default();
        let mut by_term: BTreeMap<String, Vec<FileId>> = BTreeMap::new();
        for id in &departed {
            for term in term_sets.remove(id).unwrap_or_default() {
                by_term.entry(term).or_default().push(*id);
            }
        }

        for (term, ids) in by_term {
            let key = UnitKey::scores(&term, partition);
            let mut scores = match self.scores.take(&key) {
                Some(CachedUnit::Scores(scores)) => scores,
                _ => self.read_unit::<ScoreMap>(&key).unwrap_or_default(),
            };
            for id in ids {
                scores.remove(&id);
            }
            if scores.is_empty() {
                self.remove_unit(&key);
            } else if !self.persist(&key, &scores) || self.write_policy == WritePolicy::Refresh {
                self.scores.set(key, CachedUnit::Scores(scores));
            }
        }

        // Ids stay reserved: the counter never moves back below them
        let counter = self.meta.next_file_id.entry(partition).or_insert(0);
        *counter = (*counter).max(directory.next_free_id());
        for id in &departed {
            directory.remove(*id);
        }

        self.persist(&dir_key, &directory);
        self.directories.set(dir_key, CachedUnit::Directory(directory));
        self.persist(&terms_key, &term_sets);

        debug!(
            "dropped {} departed file(s) from partition {partition}",
            departed.len()
        );
        departed.len()
    }

    /// Delete every content unit of a partition that no longer exists
    pub fn drop_partition(&mut self, partition: PartitionId) {
        let terms_key = UnitKey::Terms(partition);
        let term_sets: TermSets = self.read_unit(&terms_key).unwrap_or_default();
        let terms: BTreeSet<String> = term_sets.into_values().flatten().collect();

        for term in &terms {
            let key = UnitKey::scores(term, partition);
            self.scores.delete(&key);
            self.remove_unit(&key);
        }

        let dir_key = UnitKey::Directory(partition);
        self.directories.delete(&dir_key);
        self.remove_unit(&dir_key);
        self.remove_unit(&terms_key);
        self.meta.next_file_id.remove(&partition);

        debug!(
            "dropped content of partition {partition} ({} term unit(s))",
            terms.len()
        );
    }

    /// Look up (or allocate) ids for paths, persisting the directory once
    fn assign_file_ids<'a>(
        &mut self,
        partition: PartitionId,
        paths: impl Iterator<Item = &'a str>,
    ) -> Vec<FileId> {
        let key = UnitKey::Directory(partition);
        let mut directory = self.take_directory(partition);
        let mut changed = false;

        let ids = paths
            .map(|path| {
                if let Some(id) = directory.id_of(path) {
                    return id;
                }
                let counter = self.meta.next_file_id.entry(partition).or_insert(0);
                // The directory guards against a counter that was never saved
                let id = (*counter).max(directory.next_free_id());
                *counter = id + 1;
                directory.insert(id, path.to_string());
                changed = true;
                id
            })
            .collect();

        if changed {
            self.persist(&key, &directory);
        }
        self.directories.set(key, CachedUnit::Directory(directory));
        ids
    }

    fn take_directory(&mut self, partition: PartitionId) -> FileDirectory {
        let key = UnitKey::Directory(partition);
        match self.directories.take(&key) {
            Some(CachedUnit::Directory(directory)) => directory,
            _ => self.read_unit(&key).unwrap_or_default(),
        }
    }

    fn update_scores(&mut self, partition: PartitionId, term: &str, updates: Vec<(FileId, f32)>) {
        let key = UnitKey::scores(term, partition);
        // take() drops any cached copy, which is what Invalidate wants
        let mut scores = match self.scores.take(&key) {
            Some(CachedUnit::Scores(scores)) => scores,
            _ => self.read_unit::<ScoreMap>(&key).unwrap_or_default(),
        };

        for (file_id, score) in updates {
            scores.insert(file_id, score);
        }

        let saved = self.persist(&key, &scores);
        if !saved || self.write_policy == WritePolicy::Refresh {
            self.scores.set(key, CachedUnit::Scores(scores));
        }
    }

    /// Search `partitions` for the whitespace-separated terms of `query`.
    ///
    /// Returns paths ordered by descending accumulated score. `limit` of
    /// `None` returns every file with a nonzero score.
    pub fn search(
        &mut self,
        partitions: &[PartitionId],
        query: &str,
        limit: Option<usize>,
    ) -> Vec<String> {
        self.search_scored(partitions, query, limit)
            .into_iter()
            .map(|hit| hit.path)
            .collect()
    }

    pub fn search_scored(
        &mut self,
        partitions: &[PartitionId],
        query: &str,
        limit: Option<usize>,
    ) -> Vec<ScoredPath> {
        let terms: Vec<String> = query
            .split_whitespace()
            .filter_map(|word| self.normalizer.normalize(word).map(|t| t.into_owned()))
            .collect();

        let mut partitions = partitions.to_vec();
        partitions.sort_unstable();
        partitions.dedup();

        if terms.is_empty() || partitions.is_empty() {
            debug!("content search for {query:?} has no terms or no partitions");
            return Vec::new();
        }

        let mut totals: AHashMap<(PartitionId, FileId), f32> = AHashMap::new();
        for term in &terms {
            for &partition in &partitions {
                if let Some(scores) = self.scores_for(partition, term) {
                    for (&file_id, &score) in scores {
                        *totals.entry((partition, file_id)).or_insert(0.0) += score;
                    }
                }
            }
        }

        let mut ranked: Vec<((PartitionId, FileId), f32)> =
            totals.into_iter().filter(|(_, score)| *score != 0.0).collect();
        // Best first; equal scores fall back to (partition, file id)
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if let Some(limit) = limit {
            ranked.truncate(limit);
        }

        ranked
            .into_iter()
            .filter_map(|((partition, file_id), score)| {
                let path = self.path_of(partition, file_id);
                if path.is_none() {
                    warn!("file id {file_id} in partition {partition} has no directory entry");
                }
                path.map(|path| ScoredPath {
                    partition,
                    file_id,
                    path,
                    score,
                })
            })
            .collect()
    }

    /// Score map for (term, partition), loading it into the cache on a miss
    fn scores_for(&mut self, partition: PartitionId, term: &str) -> Option<&ScoreMap> {
        let key = UnitKey::scores(term, partition);
        if self.scores.get(&key).is_none() {
            let loaded = self.read_unit::<ScoreMap>(&key).unwrap_or_default();
            self.scores.set(key.clone(), CachedUnit::Scores(loaded));
        }
        self.scores.peek(&key).and_then(CachedUnit::as_scores)
    }

    fn directory(&mut self, partition: PartitionId) -> Option<&FileDirectory> {
        let key = UnitKey::Directory(partition);
        if self.directories.get(&key).is_none() {
            let loaded = self.read_unit::<FileDirectory>(&key).unwrap_or_default();
            self.directories.set(key.clone(), CachedUnit::Directory(loaded));
        }
        self.directories.peek(&key).and_then(CachedUnit::as_directory)
    }

    /// Path recorded for a file id
    pub fn path_of(&mut self, partition: PartitionId, file_id: FileId) -> Option<String> {
        self.directory(partition)
            .and_then(|dir| dir.path_of(file_id))
            .map(str::to_string)
    }

    /// File id recorded for a path
    pub fn file_id(&mut self, partition: PartitionId, path: &str) -> Option<FileId> {
        self.directory(partition).and_then(|dir| dir.id_of(path))
    }

    /// Number of files with an id in a partition
    pub fn file_count(&mut self, partition: PartitionId) -> usize {
        self.directory(partition).map_or(0, FileDirectory::len)
    }

    /// Units whose most recent write failed
    pub fn unpersisted(&self) -> impl Iterator<Item = &UnitKey> {
        self.unpersisted.iter()
    }

    /// (directory cache, score cache) statistics
    pub fn cache_stats(&self) -> (CacheStats, CacheStats) {
        (self.directories.stats(), self.scores.stats())
    }

    fn read_unit<T: DeserializeOwned>(&self, key: &UnitKey) -> Option<T> {
        match self.store.read(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("unreadable unit {key}, treating as empty: {e}");
                None
            }
        }
    }

    fn remove_unit(&mut self, key: &UnitKey) {
        self.unpersisted.remove(key);
        if let Err(e) = self.store.remove(key) {
            error!("failed to delete unit {key}: {e}");
        }
    }

    fn persist<T: Serialize>(&mut self, key: &UnitKey, value: &T) -> bool {
        match self.store.write(key, value) {
            Ok(()) => {
                self.unpersisted.remove(key);
                true
            }
            Err(e) => {
                error!("{e}");
                self.unpersisted.insert(key.clone());
                false
            }
        }
    }
}
