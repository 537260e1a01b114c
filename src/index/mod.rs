pub mod build;
pub mod content;
pub mod metadata;
pub mod normalize;
pub mod partition;
pub mod stats;
pub mod types;

pub use content::{ContentIndex, FileTerms};
pub use metadata::{FileMetadata, KdTree, MetadataBounds, MetadataIndex};
pub use partition::{Partition, PartitionNode, PartitionStore};
pub use types::*;

use crate::error::Result;
use crate::index::normalize::normalizer_for;
use crate::store::UnitStore;
use std::path::{Path, PathBuf};

/// The on-disk index as one owned service: partition forest, content index
/// and metadata trees sharing one index directory.
pub struct FileIndex {
    pub partitions: PartitionStore,
    pub content: ContentIndex,
    pub metadata: MetadataIndex,
    config: IndexConfig,
    store: UnitStore,
}

impl FileIndex {
    /// Open (or create) the index stored in `dir`
    pub fn open(dir: &Path, config: IndexConfig) -> Result<Self> {
        let store = UnitStore::open(dir)?;
        let partitions = PartitionStore::open(store.clone(), &config)?;
        let content = ContentIndex::open(store.clone(), &config)?
            .with_normalizer(normalizer_for(config.fold_case));
        let metadata = MetadataIndex::open(store.clone(), &config);

        Ok(Self {
            partitions,
            content,
            metadata,
            config,
            store,
        })
    }

    /// Write the partition table and file id counters
    pub fn flush(&mut self) -> Result<()> {
        self.partitions.save()?;
        self.content.save_meta()
    }

    /// Flush and release the index
    pub fn close(self) -> Result<()> {
        self.partitions.save()?;
        self.content.close()
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn dir(&self) -> PathBuf {
        self.store.dir().to_path_buf()
    }

    pub fn size_on_disk(&self) -> u64 {
        self.store.size_on_disk()
    }
}
