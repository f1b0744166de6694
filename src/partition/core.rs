//! Segmented, bounded-memory materialization of per-set sorted member
//! arrays from the pair stream.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::num::NonZeroU32;
use std::path::Path;

use crate::format::{PairStreamReader, read_u32_array, write_u32_array};
use crate::{Error, Result};

/// Default segment size: 10,000 set ids per segment, matching the
/// original tooling's `SEGSIZE`.
pub const DEFAULT_SEGMENT_SIZE: u32 = 10_000;

/// Recorded byte offsets, keyed by set_id, for sets that survived both
/// the ingest threshold and the post-dedup singleton filter. Absent keys
/// mean "no members file block" — the index builder fills a zero there.
pub type OffsetTable = HashMap<u32, u32>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionStats {
    pub directory_set_count: usize,
    pub segments: usize,
    pub surviving_sets: usize,
    pub dropped_singleton_sets: usize,
}

/// Enumerate distinct set_ids from the pair stream in first-appearance
/// order, or load a previously written directory if one already exists
/// at `set_id_dir_path` (idempotence across restarted runs).
pub fn enumerate_or_load_set_ids(
    pair_stream_path: &Path,
    set_id_dir_path: &Path,
) -> Result<Vec<u32>> {
    if set_id_dir_path.exists() {
        log::info!(
            "partition: loading existing set-id directory {}",
            set_id_dir_path.display()
        );
        return read_u32_array(set_id_dir_path);
    }

    log::info!("partition: enumerating set ids from the pair stream");
    let mut reader = PairStreamReader::open(pair_stream_path)?;
    let mut seen: HashSet<u32> = HashSet::new();
    let mut order: Vec<u32> = Vec::new();
    while let Some(pair) = reader.next_pair().map_err(|e| Error::io(pair_stream_path, e))? {
        if seen.insert(pair.set_id) {
            order.push(pair.set_id);
        }
    }
    log::info!("partition: {} unique set ids found", order.len());
    write_u32_array(set_id_dir_path, &order)?;
    Ok(order)
}

/// Materialize per-set sorted member arrays for every set in
/// `set_ids`, one segment of `segment_size` sets at a time. Each
/// segment makes one full rewind-and-rescan pass over the pair stream,
/// trading I/O for a bounded per-segment working set.
///
/// `members_path` must not already exist.
pub fn materialize(
    pair_stream_path: &Path,
    members_path: &Path,
    set_ids: &[u32],
    segment_size: NonZeroU32,
) -> Result<(OffsetTable, PartitionStats)> {
    let file = File::options()
        .write(true)
        .create_new(true)
        .open(members_path)
        .map_err(|e| Error::io(members_path, e))?;
    let mut writer = BufWriter::new(file);
    // Reserve byte offset 0 with a throwaway zero word so no surviving
    // set's block can ever legitimately start there. Without this, a
    // recorded offset of 0 would be ambiguous between "this set's block
    // really is the first thing in the file" and "this set has no block
    // at all" (the index's own gap marker) — a distinction the scoring
    // engine otherwise has no way to make, since directory membership
    // alone can't tell the two cases apart (a set dropped by this
    // function's own singleton filter still appears in the directory
    // file written in step 1).
    writer
        .write_all(&0u32.to_le_bytes())
        .map_err(|e| Error::io(members_path, e))?;
    let mut position: u64 = 4;

    let mut reader = PairStreamReader::open(pair_stream_path)?;
    let mut offsets: OffsetTable = HashMap::new();
    let mut dropped_singleton_sets = 0usize;
    let segment_size = segment_size.get() as usize;
    let segments: Vec<&[u32]> = set_ids.chunks(segment_size).collect();

    for (segment_index, segment) in segments.iter().enumerate() {
        log::info!(
            "partition: segment {}/{} ({} sets)",
            segment_index + 1,
            segments.len(),
            segment.len()
        );

        let segment_set: HashSet<u32> = segment.iter().copied().collect();
        let mut membership: HashMap<u32, Vec<u32>> =
            segment.iter().map(|&id| (id, Vec::new())).collect();

        reader.rewind().map_err(|e| Error::io(pair_stream_path, e))?;
        while let Some(pair) = reader.next_pair().map_err(|e| Error::io(pair_stream_path, e))? {
            if segment_set.contains(&pair.set_id) {
                membership.get_mut(&pair.set_id).unwrap().push(pair.member_id);
            }
        }

        for &set_id in segment.iter() {
            let mut members = membership.remove(&set_id).expect("every segment set_id was seeded");
            members.sort_unstable();
            members.dedup();

            if members.len() <= 1 {
                dropped_singleton_sets += 1;
                continue;
            }

            let start_offset = position;
            for member_id in &members {
                writer
                    .write_all(&member_id.to_le_bytes())
                    .map_err(|e| Error::io(members_path, e))?;
                position += 4;
            }
            writer
                .write_all(&0u32.to_le_bytes())
                .map_err(|e| Error::io(members_path, e))?;
            position += 4;

            offsets.insert(set_id, start_offset as u32);
        }
    }

    writer.flush().map_err(|e| Error::io(members_path, e))?;

    let stats = PartitionStats {
        directory_set_count: set_ids.len(),
        segments: segments.len(),
        surviving_sets: offsets.len(),
        dropped_singleton_sets,
    };
    log::info!(
        "partition: {} sets survived, {} dropped as post-dedup singletons",
        stats.surviving_sets,
        stats.dropped_singleton_sets
    );

    Ok((offsets, stats))
}
