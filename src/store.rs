//! Unit storage: one file per independently persisted structure.
//!
//! Units are encoded with `bincode`, except `meta.json` which stays human
//! readable. A missing unit is reported as `Ok(None)`; callers substitute an
//! empty structure.

use crate::error::{IndexError, Result};
use crate::index::types::PartitionId;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::fs::{self, File};
use std::hash::{Hash, Hasher};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

const CONTENT_DIR: &str = "content";
const DIRECTORIES_DIR: &str = "directories";
const PARTITIONS_DIR: &str = "partitions";
const METADATA_DIR: &str = "metadata";

/// Escaped terms longer than this are shortened and suffixed with a hash
const MAX_TERM_FILE_LEN: usize = 160;

/// Name of one persisted unit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UnitKey {
    /// Index metadata (file id counters)
    Meta,
    /// The partition table
    PartitionTable,
    /// Per-partition listing of sub-paths and file names
    Listing(PartitionId),
    /// Per-partition file id -> path directory
    Directory(PartitionId),
    /// Per-partition file id -> indexed terms, used to prune postings
    Terms(PartitionId),
    /// Per-(term, partition) score map
    Scores { term: String, partition: PartitionId },
    /// Per-partition metadata range tree
    Metadata(PartitionId),
}

impl UnitKey {
    pub fn scores(term: &str, partition: PartitionId) -> Self {
        UnitKey::Scores {
            term: term.to_string(),
            partition,
        }
    }

    /// Location of the unit relative to the index directory
    pub fn relative_path(&self) -> PathBuf {
        match self {
            UnitKey::Meta => PathBuf::from("meta.json"),
            UnitKey::PartitionTable => PathBuf::from("partitions.bin"),
            UnitKey::Listing(id) => Path::new(PARTITIONS_DIR).join(format!("listing-{id}.bin")),
            UnitKey::Directory(id) => Path::new(DIRECTORIES_DIR).join(format!("dir-{id}.bin")),
            UnitKey::Terms(id) => Path::new(DIRECTORIES_DIR).join(format!("terms-{id}.bin")),
            UnitKey::Scores { term, partition } => Path::new(CONTENT_DIR)
                .join(format!("{}-{partition}.bin", escape_term(term))),
            UnitKey::Metadata(id) => Path::new(METADATA_DIR).join(format!("meta-{id}.bin")),
        }
    }

    fn is_json(&self) -> bool {
        matches!(self, UnitKey::Meta)
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKey::Meta => write!(f, "meta"),
            UnitKey::PartitionTable => write!(f, "partitions"),
            UnitKey::Listing(id) => write!(f, "listing-{id}"),
            UnitKey::Directory(id) => write!(f, "dir-{id}"),
            UnitKey::Terms(id) => write!(f, "terms-{id}"),
            UnitKey::Scores { term, partition } => write!(f, "{term}-{partition}"),
            UnitKey::Metadata(id) => write!(f, "meta-{id}"),
        }
    }
}

/// Turn a term into a file-name-safe, case-insensitive-filesystem-safe stem.
/// Lowercase ASCII letters, digits and `_` pass through, every other byte
/// becomes `%XX`.
fn escape_term(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for byte in term.bytes() {
        if byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'_' {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{byte:02X}"));
        }
    }

    if escaped.len() > MAX_TERM_FILE_LEN {
        let mut hasher = DefaultHasher::new();
        term.hash(&mut hasher);
        let mut cut = MAX_TERM_FILE_LEN;
        // Never split an escape sequence
        while cut > 0 && escaped.as_bytes()[cut - 1] == b'%'
            || cut > 1 && escaped.as_bytes()[cut - 2] == b'%'
        {
            cut -= 1;
        }
        escaped.truncate(cut);
        escaped.push_str(&format!("~{:016x}", hasher.finish()));
    }

    escaped
}

/// Reads and writes units under one index directory
#[derive(Debug, Clone)]
pub struct UnitStore {
    dir: PathBuf,
}

impl UnitStore {
    /// Open (creating if needed) the index directory layout
    pub fn open(dir: &Path) -> Result<Self> {
        for sub in [CONTENT_DIR, DIRECTORIES_DIR, PARTITIONS_DIR, METADATA_DIR] {
            fs::create_dir_all(dir.join(sub))?;
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, key: &UnitKey) -> PathBuf {
        self.dir.join(key.relative_path())
    }

    /// Read a unit, `Ok(None)` when it has never been written
    pub fn read<T: DeserializeOwned>(&self, key: &UnitKey) -> Result<Option<T>> {
        let path = self.path_of(key);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let reader = BufReader::new(file);

        let value = if key.is_json() {
            serde_json::from_reader(reader)?
        } else {
            bincode::deserialize_from(reader)?
        };
        Ok(Some(value))
    }

    /// Write a unit through a temporary file so readers never see a torn unit
    pub fn write<T: Serialize>(&self, key: &UnitKey, value: &T) -> Result<()> {
        self.write_inner(key, value).map_err(|source| IndexError::Persist {
            unit: key.to_string(),
            source: Box::new(source),
        })
    }

    fn write_inner<T: Serialize>(&self, key: &UnitKey, value: &T) -> Result<()> {
        let path = self.path_of(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("tmp");

        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            if key.is_json() {
                serde_json::to_writer_pretty(&mut writer, value)?;
            } else {
                bincode::serialize_into(&mut writer, value)?;
            }
            writer.flush()?;
        }

        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Delete a unit; deleting a missing unit is not an error
    pub fn remove(&self, key: &UnitKey) -> Result<()> {
        match fs::remove_file(self.path_of(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Total size in bytes of everything under the index directory
    pub fn size_on_disk(&self) -> u64 {
        dir_size(&self.dir).unwrap_or(0)
    }
}

fn dir_size(path: &Path) -> std::io::Result<u64> {
    let mut size = 0;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_dir() {
            size += dir_size(&entry.path())?;
        } else {
            size += meta.len();
        }
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_unit_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = UnitStore::open(tmp.path()).unwrap();
        let value: Option<BTreeMap<u32, f32>> = store.read(&UnitKey::scores("hello", 0)).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_write_then_read() {
        let tmp = TempDir::new().unwrap();
        let store = UnitStore::open(tmp.path()).unwrap();
        let key = UnitKey::scores("hello", 2);

        let mut scores = BTreeMap::new();
        scores.insert(0u32, 1.5f32);
        store.write(&key, &scores).unwrap();

        let loaded: BTreeMap<u32, f32> = store.read(&key).unwrap().unwrap();
        assert_eq!(loaded, scores);
        assert!(!store.path_of(&key).with_extension("tmp").exists());
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let tmp = TempDir::new().unwrap();
        let store = UnitStore::open(tmp.path()).unwrap();
        assert!(store.remove(&UnitKey::Directory(9)).is_ok());
    }

    #[test]
    fn test_unit_names_are_deterministic() {
        assert_eq!(UnitKey::scores("hello", 3).to_string(), "hello-3");
        assert_eq!(
            UnitKey::scores("hello", 3).relative_path(),
            Path::new("content").join("hello-3.bin")
        );
        assert_eq!(
            UnitKey::Directory(4).relative_path(),
            Path::new("directories").join("dir-4.bin")
        );
    }

    #[test]
    fn test_term_units_never_shadow_partition_units() {
        for term in ["dir", "terms"] {
            let scores = UnitKey::scores(term, 3).relative_path();
            assert_ne!(scores, UnitKey::Directory(3).relative_path());
            assert_ne!(scores, UnitKey::Terms(3).relative_path());
        }
    }

    #[test]
    fn test_escape_term() {
        assert_eq!(escape_term("get_user"), "get_user");
        assert_eq!(escape_term("Hello"), "%48ello");
        assert_eq!(escape_term("a/b"), "a%2Fb");
        assert_ne!(escape_term("Hello"), escape_term("hello"));
    }

    #[test]
    fn test_escape_long_term() {
        let long = "x".repeat(500);
        let escaped = escape_term(&long);
        assert!(escaped.len() < 200);
        assert_eq!(escaped, escape_term(&long));
        assert_ne!(escaped, escape_term(&"x".repeat(501)));
    }
}
