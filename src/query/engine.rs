use crate::index::FileIndex;
use crate::index::metadata::{FileMetadata, MetadataBounds};
use crate::index::types::{PartitionId, ScoredPath};
use crate::query::scorer::NameScorer;
use log::{debug, info};
use std::path::{Path, PathBuf};

/// A name search hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatch {
    pub path: PathBuf,
    pub score: u32,
}

/// Result of [`Searcher::find_by_name`]
#[derive(Debug, Clone, Default)]
pub struct FindResult {
    pub name_matches: Vec<NameMatch>,
    pub content_matches: Vec<String>,
}

/// Query engine scoped by the partition forest
pub struct Searcher<'a> {
    index: &'a mut FileIndex,
}

impl<'a> Searcher<'a> {
    pub fn new(index: &'a mut FileIndex) -> Self {
        Self { index }
    }

    /// Partition subtree related to `path`, `None` if nothing covers it
    fn scope(&self, path: &Path) -> Option<Vec<PartitionId>> {
        let partition = self.index.partitions.get_path_partition(path)?;
        Some(self.index.partitions.get_partition_children(partition, path))
    }

    /// Match file names under `path`, and optionally file contents.
    ///
    /// Every file with a nonzero name score is returned, best first. Content
    /// matches are unlimited and ordered by descending content score.
    pub fn find_by_name(&mut self, query: &str, path: &Path, search_content: bool) -> FindResult {
        let Some(partition) = self.index.partitions.get_path_partition(path) else {
            info!("no indexed partition covers {}", path.display());
            return FindResult::default();
        };

        let scorer = NameScorer::new(query, self.index.config().name_weights);
        if scorer.is_empty() {
            debug!("blank query {query:?}");
            return FindResult::default();
        }

        debug!("searching file names under partition {partition}");
        let files = self.index.partitions.get_partition_files(partition, path);

        let mut name_matches: Vec<NameMatch> = files
            .into_iter()
            .filter_map(|file| {
                let score = scorer.score(&file);
                (score > 0).then_some(NameMatch { path: file, score })
            })
            .collect();
        name_matches.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.path.cmp(&b.path)));

        let content_matches = if search_content {
            debug!("searching file contents");
            let related = self.index.partitions.get_partition_children(partition, path);
            self.index.content.search(&related, query, None)
        } else {
            Vec::new()
        };

        FindResult {
            name_matches,
            content_matches,
        }
    }

    /// Ranked content search under `path`
    pub fn search_content(&mut self, query: &str, path: &Path, limit: Option<usize>) -> Vec<ScoredPath> {
        match self.scope(path) {
            Some(related) => self.index.content.search_scored(&related, query, limit),
            None => Vec::new(),
        }
    }

    /// Files under `path` whose metadata falls inside the partial range
    /// `start..=end` (zero fields are open), sorted by path.
    pub fn meta_search(
        &mut self,
        path: &Path,
        start: &MetadataBounds,
        end: &MetadataBounds,
    ) -> Vec<FileMetadata> {
        let Some(related) = self.scope(path) else {
            info!("no indexed partition covers {}", path.display());
            return Vec::new();
        };

        let mut found: Vec<FileMetadata> = related
            .into_iter()
            .flat_map(|partition| self.index.metadata.search_partial(partition, start, end))
            .collect();
        found.sort_by(|a, b| a.path.cmp(&b.path));
        found
    }

    /// Paths of [`Searcher::meta_search`]
    pub fn meta_search_paths(
        &mut self,
        path: &Path,
        start: &MetadataBounds,
        end: &MetadataBounds,
    ) -> Vec<String> {
        self.meta_search(path, start, end)
            .into_iter()
            .map(|record| record.path)
            .collect()
    }
}
