//! # dlocate - Partitioned File Search
//!
//! dlocate answers two kinds of queries over indexed directory trees
//! without loading the index into memory: name/content term search and
//! metadata range search (size, change, modify and access time).
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`index`] - Partition forest, content index, metadata trees and the indexing driver
//! - [`query`] - Name scoring and the partition-scoped query engine
//! - [`cache`] - Bounded LRU cache in front of every on-disk unit
//! - [`store`] - Unit naming and atomic persistence in the index directory
//! - [`output`] - Result formatting
//! - [`utils`] - Tokenizer, app data directory, progress bars
//!
//! ## Quick Start
//!
//! ```no_run
//! use dlocate::index::build::{build_index, BuildOptions};
//! use dlocate::index::{FileIndex, IndexConfig};
//! use dlocate::query::Searcher;
//! use std::path::Path;
//!
//! let mut index = FileIndex::open(Path::new("/tmp/dlocate-index"), IndexConfig::default())?;
//! build_index(&mut index, Path::new("/home/me/projects"), &BuildOptions::default())?;
//!
//! let found = Searcher::new(&mut index).find_by_name("main", Path::new("/home/me/projects"), true);
//! for m in &found.name_matches {
//!     println!("{} ({})", m.path.display(), m.score);
//! }
//! index.close()?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Storage
//!
//! Every unit (one partition listing, one file directory, one
//! (term, partition) score map, one metadata tree) is its own file, so a
//! query touches only the partitions under its search path.

pub mod cache;
pub mod error;
pub mod index;
pub mod output;
pub mod query;
pub mod store;
pub mod utils;

pub use error::{IndexError, Result};
