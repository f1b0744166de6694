use super::*;

#[test]
fn pair_stream_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pairs.bin");

    let mut writer = PairStreamWriter::create_new(&path).unwrap();
    writer.write_pair(1, 10).unwrap();
    writer.write_pair(2, 10).unwrap();
    writer.write_pair(3, 20).unwrap();
    writer.flush().unwrap();

    let mut reader = PairStreamReader::open(&path).unwrap();
    let mut pairs = Vec::new();
    while let Some(p) = reader.next_pair().unwrap() {
        pairs.push((p.member_id, p.set_id));
    }
    assert_eq!(pairs, vec![(1, 10), (2, 10), (3, 20)]);

    reader.rewind().unwrap();
    assert_eq!(reader.next_pair().unwrap(), Some(Pair { member_id: 1, set_id: 10 }));
}

#[test]
fn pair_stream_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pairs.bin");
    PairStreamWriter::create_new(&path).unwrap();
    assert!(PairStreamWriter::create_new(&path).is_err());
}

#[test]
fn u32_array_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ids.bin");
    let values = vec![10u32, 20, 30, 0, 40];
    write_u32_array(&path, &values).unwrap();
    let read_back = read_u32_array(&path).unwrap();
    assert_eq!(read_back, values);
}

#[test]
fn u32_array_rejects_truncated_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.bin");
    std::fs::write(&path, [1u8, 2, 3]).unwrap();
    assert!(read_u32_array(&path).is_err());
}
