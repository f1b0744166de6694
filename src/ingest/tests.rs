use super::*;
use crate::format::PairStreamReader;

fn write_csv(dir: &std::path::Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn read_all_pairs(path: &std::path::Path) -> Vec<(u32, u32)> {
    let mut reader = PairStreamReader::open(path).unwrap();
    let mut out = Vec::new();
    while let Some(p) = reader.next_pair().unwrap() {
        out.push((p.member_id, p.set_id));
    }
    out
}

#[test]
fn scenario_1_drops_small_set_and_preserves_order() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_csv(
        &dir,
        "members.csv",
        "1,10\n2,10\n3,10\n1,20\n2,20\n1,30\n",
    );
    let pair_stream = dir.path().join("pairs.bin");

    let stats = run(&csv, &pair_stream, 1).unwrap();

    assert_eq!(stats.lines_read, 6);
    assert_eq!(stats.malformed_lines, 0);
    // set 30 has a single member and gets blacklisted at threshold 1
    assert_eq!(stats.sets_blacklisted, 1);
    assert_eq!(stats.pairs_kept, 5);

    let pairs = read_all_pairs(&pair_stream);
    assert_eq!(pairs, vec![(1, 10), (2, 10), (3, 10), (1, 20), (2, 20)]);
}

#[test]
fn malformed_lines_are_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_csv(
        &dir,
        "members.csv",
        "1,10\nnot-a-number\n2,10\n1,2,3\n,10\n10,\n3,10\n",
    );
    let pair_stream = dir.path().join("pairs.bin");

    let stats = run(&csv, &pair_stream, 0).unwrap();
    assert_eq!(stats.malformed_lines, 5);
    assert_eq!(stats.pairs_kept, 3);
}

#[test]
fn zero_ids_are_treated_as_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_csv(&dir, "members.csv", "0,10\n1,0\n1,10\n");
    let pair_stream = dir.path().join("pairs.bin");

    let stats = run(&csv, &pair_stream, 0).unwrap();
    assert_eq!(stats.malformed_lines, 2);
    assert_eq!(stats.pairs_kept, 1);
}

#[test]
fn refuses_to_overwrite_existing_pair_stream() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_csv(&dir, "members.csv", "1,10\n2,10\n");
    let pair_stream = dir.path().join("pairs.bin");
    std::fs::write(&pair_stream, b"existing").unwrap();

    assert!(run(&csv, &pair_stream, 0).is_err());
}

#[test]
fn no_deduplication_at_ingest_stage() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_csv(&dir, "members.csv", "1,10\n1,10\n2,10\n");
    let pair_stream = dir.path().join("pairs.bin");

    let stats = run(&csv, &pair_stream, 0).unwrap();
    assert_eq!(stats.pairs_kept, 3);
    assert_eq!(
        read_all_pairs(&pair_stream),
        vec![(1, 10), (1, 10), (2, 10)]
    );
}
