#![no_main]

use arbitrary::Arbitrary;
use dlocate::index::{FileMetadata, KdTree, MetadataBounds};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    records: Vec<(u8, u8, u8, u8)>,
    start: (u8, u8, u8, u8),
    end: (u8, u8, u8, u8),
}

fn bounds((size, ctime, mtime, atime): (u8, u8, u8, u8)) -> MetadataBounds {
    MetadataBounds {
        size: size.into(),
        ctime: ctime.into(),
        mtime: mtime.into(),
        atime: atime.into(),
    }
}

fn inside(value: u64, start: u64, end: u64) -> bool {
    (start == 0 || value >= start) && (end == 0 || value <= end)
}

fuzz_target!(|input: Input| {
    let records: Vec<FileMetadata> = input
        .records
        .iter()
        .enumerate()
        .map(|(i, &(size, ctime, mtime, atime))| FileMetadata {
            path: i.to_string(),
            size: size.into(),
            ctime: ctime.into(),
            mtime: mtime.into(),
            atime: atime.into(),
        })
        .collect();

    let start = bounds(input.start);
    let end = bounds(input.end);
    let expected = records
        .iter()
        .filter(|r| {
            inside(r.size, start.size, end.size)
                && inside(r.ctime, start.ctime, end.ctime)
                && inside(r.mtime, start.mtime, end.mtime)
                && inside(r.atime, start.atime, end.atime)
        })
        .count();

    // The tree must agree with a linear scan
    let tree = KdTree::build(records);
    assert_eq!(tree.search_partial(&start, &end).len(), expected);
});
