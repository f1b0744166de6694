use std::collections::HashMap;

use super::*;

#[test]
fn build_pads_gaps_with_zero() {
    let mut offsets = HashMap::new();
    offsets.insert(2u32, 100u32);
    offsets.insert(5u32, 200u32);

    let index = build(&offsets);
    assert_eq!(index.len(), 6); // max(set_id) + 1 == 5 + 1
    assert_eq!(index, vec![0, 0, 100, 0, 0, 200]);
}

#[test]
fn verify_accepts_well_formed_members_file() {
    let dir = tempfile::tempdir().unwrap();
    let members_path = dir.path().join("members.bin");

    // reserved leading pad at offset 0; block for set A at offset 4:
    // [1, 2, 0]; block for set B at offset 16: [3, 0]
    let mut bytes = Vec::new();
    for word in [0u32, 1, 2, 0, 3, 0] {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    std::fs::write(&members_path, &bytes).unwrap();

    let mut offsets = HashMap::new();
    offsets.insert(10u32, 4u32);
    offsets.insert(20u32, 16u32);

    assert!(verify(&members_path, &offsets).is_ok());
}

#[test]
fn verify_rejects_missing_terminator() {
    let dir = tempfile::tempdir().unwrap();
    let members_path = dir.path().join("members.bin");

    // reserved leading pad, then set A's block, then set B's block
    // starting without a preceding zero terminator
    let mut bytes = Vec::new();
    for word in [0u32, 1, 2, 3, 4] {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    std::fs::write(&members_path, &bytes).unwrap();

    let mut offsets = HashMap::new();
    offsets.insert(10u32, 4u32);
    offsets.insert(20u32, 12u32);

    assert!(verify(&members_path, &offsets).is_err());
}

#[test]
fn verify_rejects_an_offset_inside_the_reserved_gap_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let members_path = dir.path().join("members.bin");
    let mut bytes = Vec::new();
    for word in [0u32, 1, 2, 0] {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    std::fs::write(&members_path, &bytes).unwrap();

    // offset 0 can never be a real block: it's the gap sentinel.
    let mut offsets = HashMap::new();
    offsets.insert(10u32, 0u32);

    assert!(verify(&members_path, &offsets).is_err());
}

#[test]
fn verify_accepts_the_first_real_block_right_after_the_reserved_pad() {
    let dir = tempfile::tempdir().unwrap();
    let members_path = dir.path().join("members.bin");
    let mut bytes = Vec::new();
    for word in [0u32, 1, 2, 0] {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    std::fs::write(&members_path, &bytes).unwrap();

    let mut offsets = HashMap::new();
    offsets.insert(10u32, 4u32);

    assert!(verify(&members_path, &offsets).is_ok());
}
