use std::num::NonZeroU32;

use super::*;
use crate::format::PairStreamWriter;

fn write_pairs(path: &std::path::Path, pairs: &[(u32, u32)]) {
    let mut w = PairStreamWriter::create_new(path).unwrap();
    for &(m, s) in pairs {
        w.write_pair(m, s).unwrap();
    }
    w.flush().unwrap();
}

fn read_block(members: &[u8], offset: u32) -> Vec<u32> {
    let mut out = Vec::new();
    let mut i = offset as usize;
    loop {
        let word = u32::from_le_bytes(members[i..i + 4].try_into().unwrap());
        if word == 0 {
            break;
        }
        out.push(word);
        i += 4;
    }
    out
}

#[test]
fn enumerates_set_ids_in_first_appearance_order() {
    let dir = tempfile::tempdir().unwrap();
    let pairs_path = dir.path().join("pairs.bin");
    write_pairs(&pairs_path, &[(1, 20), (2, 10), (3, 20), (4, 30)]);

    let dir_path = dir.path().join("set_ids.bin");
    let ids = enumerate_or_load_set_ids(&pairs_path, &dir_path).unwrap();
    assert_eq!(ids, vec![20, 10, 30]);
}

#[test]
fn loads_existing_directory_instead_of_reenumerating() {
    let dir = tempfile::tempdir().unwrap();
    let pairs_path = dir.path().join("pairs.bin");
    write_pairs(&pairs_path, &[(1, 20)]);

    let dir_path = dir.path().join("set_ids.bin");
    crate::format::write_u32_array(&dir_path, &[99, 100]).unwrap();

    let ids = enumerate_or_load_set_ids(&pairs_path, &dir_path).unwrap();
    assert_eq!(ids, vec![99, 100]);
}

#[test]
fn materializes_sorted_deduplicated_terminated_arrays() {
    let dir = tempfile::tempdir().unwrap();
    let pairs_path = dir.path().join("pairs.bin");
    write_pairs(
        &pairs_path,
        &[(3, 10), (1, 10), (2, 10), (1, 10), (1, 20), (2, 20)],
    );
    let members_path = dir.path().join("members.bin");

    let (offsets, stats) = materialize(
        &pairs_path,
        &members_path,
        &[10, 20],
        NonZeroU32::new(10_000).unwrap(),
    )
    .unwrap();

    assert_eq!(stats.surviving_sets, 2);
    assert_eq!(stats.dropped_singleton_sets, 0);

    let members = std::fs::read(&members_path).unwrap();
    let set_10 = read_block(&members, offsets[&10]);
    assert_eq!(set_10, vec![1, 2, 3]);
    let set_20 = read_block(&members, offsets[&20]);
    assert_eq!(set_20, vec![1, 2]);
}

#[test]
fn drops_post_dedup_singleton_sets() {
    let dir = tempfile::tempdir().unwrap();
    let pairs_path = dir.path().join("pairs.bin");
    // set 30 has two raw pairs but they're duplicates of the same member,
    // so after dedup it has cardinality 1 and must be dropped here even
    // though ingest's threshold already let it through.
    write_pairs(&pairs_path, &[(1, 30), (1, 30), (1, 10), (2, 10)]);
    let members_path = dir.path().join("members.bin");

    let (offsets, stats) = materialize(
        &pairs_path,
        &members_path,
        &[30, 10],
        NonZeroU32::new(10_000).unwrap(),
    )
    .unwrap();

    assert_eq!(stats.dropped_singleton_sets, 1);
    assert!(!offsets.contains_key(&30));
    assert!(offsets.contains_key(&10));
}

#[test]
fn segments_smaller_than_directory_cover_every_set() {
    let dir = tempfile::tempdir().unwrap();
    let pairs_path = dir.path().join("pairs.bin");
    let mut pairs = Vec::new();
    for set_id in 1..=25u32 {
        pairs.push((1, set_id));
        pairs.push((2, set_id));
    }
    write_pairs(&pairs_path, &pairs);
    let members_path = dir.path().join("members.bin");

    let set_ids: Vec<u32> = (1..=25).collect();
    let (offsets, stats) = materialize(
        &pairs_path,
        &members_path,
        &set_ids,
        NonZeroU32::new(10).unwrap(),
    )
    .unwrap();

    assert_eq!(stats.segments, 3);
    assert_eq!(offsets.len(), 25);
}

#[test]
fn refuses_to_overwrite_existing_members_file() {
    let dir = tempfile::tempdir().unwrap();
    let pairs_path = dir.path().join("pairs.bin");
    write_pairs(&pairs_path, &[(1, 10), (2, 10)]);
    let members_path = dir.path().join("members.bin");
    std::fs::write(&members_path, b"existing").unwrap();

    let result = materialize(
        &pairs_path,
        &members_path,
        &[10],
        NonZeroU32::new(10_000).unwrap(),
    );
    assert!(result.is_err());
}
