//! End-to-end tests: index a real directory tree, then query it.

use dlocate::index::build::{BuildOptions, build_index};
use dlocate::index::{ContentIndex, FileIndex, IndexConfig, MetadataBounds};
use dlocate::query::Searcher;
use dlocate::store::UnitStore;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Fixture {
    _data: TempDir,
    _index: TempDir,
    root: PathBuf,
    index_dir: PathBuf,
}

impl Fixture {
    fn new(files: &[(&str, &str)]) -> Self {
        let data = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        for (rel, content) in files {
            let path = data.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let root = data.path().canonicalize().unwrap();
        let index_dir = index.path().to_path_buf();
        Self {
            _data: data,
            _index: index,
            root,
            index_dir,
        }
    }

    fn build(&self, config: IndexConfig) -> FileIndex {
        let mut index = FileIndex::open(&self.index_dir, config).unwrap();
        let options = BuildOptions {
            silent: true,
            threads: 2,
        };
        build_index(&mut index, &self.root, &options).unwrap();
        index
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    fn string(&self, rel: &str) -> String {
        self.path(rel).to_string_lossy().into_owned()
    }
}

#[test]
fn test_scenario_search_all_and_limited() {
    let tmp = TempDir::new().unwrap();
    let store = UnitStore::open(tmp.path()).unwrap();
    let mut content = ContentIndex::open(store, &IndexConfig::default()).unwrap();

    content.insert(0, "a.txt", [("hello", 1.0)]);
    content.insert(0, "b.txt", [("hello", 2.0)]);

    let all = content.search(&[0], "hello", None);
    assert_eq!(all.len(), 2);
    assert!(all.contains(&"a.txt".to_string()));
    assert!(all.contains(&"b.txt".to_string()));

    assert_eq!(content.search(&[0], "hello", Some(1)), vec!["b.txt".to_string()]);
}

#[test]
fn test_scenario_exact_name_ranks_first() {
    let fx = Fixture::new(&[("x/report", "q1"), ("x/report.txt", "q2"), ("x/readme", "r")]);
    let mut index = fx.build(IndexConfig::default());

    let result = Searcher::new(&mut index).find_by_name("report", &fx.root, false);
    let paths: Vec<&Path> = result.name_matches.iter().map(|m| m.path.as_path()).collect();

    assert_eq!(paths, vec![fx.path("x/report").as_path(), fx.path("x/report.txt").as_path()]);
    assert!(result.name_matches[0].score > result.name_matches[1].score);
    assert!(result.name_matches[1].score > 0);
    assert!(result.content_matches.is_empty());
}

#[test]
fn test_content_search_ranks_by_term_frequency() {
    let fx = Fixture::new(&[
        ("a.txt", "hello world"),
        ("b.txt", "hello hello"),
        ("c.txt", "nothing to see"),
    ]);
    let mut index = fx.build(IndexConfig::default());

    let result = Searcher::new(&mut index).find_by_name("hello", &fx.root, true);
    assert!(result.name_matches.is_empty());
    assert_eq!(result.content_matches, vec![fx.string("b.txt"), fx.string("a.txt")]);

    let top = Searcher::new(&mut index).search_content("HELLO", &fx.root, Some(1));
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].path, fx.string("b.txt"));
    assert_eq!(top[0].score, 1.0);
}

#[test]
fn test_search_is_scoped_to_partition_subtree() {
    let fx = Fixture::new(&[
        ("a/one.txt", "txt"),
        ("a/two.txt", "txt"),
        ("b/three.txt", "txt"),
        ("top.txt", "txt"),
    ]);
    let config = IndexConfig {
        partition_max_files: 1,
        ..IndexConfig::default()
    };
    let mut index = fx.build(config);
    assert_eq!(index.partitions.len(), 2);

    let mut searcher = Searcher::new(&mut index);
    let everywhere = searcher.find_by_name("txt", &fx.root, true);
    assert_eq!(everywhere.name_matches.len(), 4);
    assert_eq!(everywhere.content_matches.len(), 4);

    let scoped = searcher.find_by_name("txt", &fx.path("a"), true);
    let mut names: Vec<PathBuf> = scoped.name_matches.into_iter().map(|m| m.path).collect();
    names.sort();
    assert_eq!(names, vec![fx.path("a/one.txt"), fx.path("a/two.txt")]);
    assert_eq!(scoped.content_matches.len(), 2);
}

#[test]
fn test_unindexed_path_finds_nothing() {
    let fx = Fixture::new(&[("a.txt", "hello")]);
    let mut index = fx.build(IndexConfig::default());
    let elsewhere = TempDir::new().unwrap();

    let result = Searcher::new(&mut index).find_by_name("a.txt", elsewhere.path(), true);
    assert!(result.name_matches.is_empty());
    assert!(result.content_matches.is_empty());
}

#[test]
fn test_blank_query_finds_nothing() {
    let fx = Fixture::new(&[("a.txt", "hello"), ("b c.txt", "world")]);
    let mut index = fx.build(IndexConfig::default());

    let result = Searcher::new(&mut index).find_by_name("   ", &fx.root, true);
    assert!(result.name_matches.is_empty());
    assert!(result.content_matches.is_empty());
}

#[test]
fn test_reindex_drops_deleted_file_from_content_search() {
    let fx = Fixture::new(&[("keep.txt", "common"), ("old.txt", "common unique")]);
    let mut index = fx.build(IndexConfig::default());

    fs::remove_file(fx.path("old.txt")).unwrap();
    let options = BuildOptions {
        silent: true,
        threads: 1,
    };
    build_index(&mut index, &fx.root, &options).unwrap();

    let mut searcher = Searcher::new(&mut index);
    assert!(searcher.search_content("unique", &fx.root, None).is_empty());
    let common = searcher.find_by_name("common", &fx.root, true);
    assert_eq!(common.content_matches, vec![fx.string("keep.txt")]);
}

#[test]
fn test_meta_search_by_size() {
    let fx = Fixture::new(&[
        ("small", &"s".repeat(10)),
        ("medium", &"m".repeat(100)),
        ("large", &"l".repeat(1000)),
    ]);
    let mut index = fx.build(IndexConfig::default());

    let start = MetadataBounds {
        size: 50,
        ..MetadataBounds::default()
    };
    let end = MetadataBounds {
        size: 500,
        ..MetadataBounds::default()
    };
    let found = Searcher::new(&mut index).meta_search_paths(&fx.root, &start, &end);
    assert_eq!(found, vec![fx.string("medium")]);

    let open = MetadataBounds::default();
    let all = Searcher::new(&mut index).meta_search_paths(&fx.root, &open, &open);
    assert_eq!(all, vec![fx.string("large"), fx.string("medium"), fx.string("small")]);
}

#[test]
fn test_index_survives_reopen() {
    let fx = Fixture::new(&[("notes/todo.md", "buy milk"), ("notes/done.md", "milk bought")]);
    {
        let index = fx.build(IndexConfig::default());
        index.close().unwrap();
    }

    let mut index = FileIndex::open(&fx.index_dir, IndexConfig::default()).unwrap();
    let result = Searcher::new(&mut index).find_by_name("todo", &fx.root, true);
    assert_eq!(result.name_matches.len(), 1);

    let milk = Searcher::new(&mut index).search_content("milk", &fx.root, None);
    assert_eq!(milk.len(), 2);
}

#[test]
fn test_reindex_picks_up_new_files() {
    let fx = Fixture::new(&[("a.txt", "alpha")]);
    let mut index = fx.build(IndexConfig::default());

    fs::write(fx.path("b.txt"), "alpha beta").unwrap();
    let options = BuildOptions {
        silent: true,
        threads: 1,
    };
    let report = build_index(&mut index, &fx.root, &options).unwrap();
    assert_eq!(report.files, 2);

    let beta = Searcher::new(&mut index).search_content("beta", &fx.root, None);
    assert_eq!(beta.len(), 1);
    assert_eq!(beta[0].path, fx.string("b.txt"));
}
