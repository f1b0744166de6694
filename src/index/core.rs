//! Builds the dense offset index over the concatenated members file, and
//! verifies its zero-terminator invariant.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::format::write_u32_array;
use crate::partition::OffsetTable;
use crate::{Error, Result};

/// Build the offset index: a dense array of length `max(set_id) + 1`,
/// with entry `s` equal to the recorded offset for `s`, or 0 for a gap.
/// Offset 0 is never assigned to a real block — the partitioner reserves
/// it with a leading pad word — so 0 unambiguously means "no block".
///
/// The partitioner writes blocks in directory (first-appearance) order,
/// not ascending set_id order, so a neighboring index entry `index[s+1]`
/// does not bound set `s`'s block in the members file — the two orders
/// only coincide by accident. The scoring engine therefore extracts a
/// set's members by scanning forward from `index[s]` for the block's own
/// zero terminator (the sentinel-zero convention this format already
/// guarantees per-block), rather than trusting a neighboring offset. See
/// DESIGN.md for the full rationale.
pub fn build(offsets: &OffsetTable) -> Vec<u32> {
    let max_set_id = offsets.keys().copied().max().unwrap_or(0);
    let mut index = vec![0u32; max_set_id as usize + 1];
    for (&set_id, &offset) in offsets {
        index[set_id as usize] = offset;
    }
    index
}

/// For every recorded offset `o`, assert `o >= 4` (offset 0 is reserved
/// as the gap sentinel, see [`build`]) and that the word at byte `o - 4`
/// in the members file is zero (the previous block's terminator, or the
/// partitioner's reserved leading pad for the very first block). A
/// violation means the members file and the offset table have drifted
/// apart — fatal, since it indicates on-disk corruption rather than a
/// bug we can route around.
pub fn verify(members_path: &Path, offsets: &OffsetTable) -> Result<()> {
    let mut file = std::fs::File::open(members_path).map_err(|e| Error::io(members_path, e))?;
    let mut recorded: Vec<u32> = offsets.values().copied().collect();
    recorded.sort_unstable();

    for offset in recorded {
        if offset < 4 {
            return Err(Error::invariant(format!(
                "offset {offset} in {}: byte offset 0 is reserved as the gap sentinel, no \
                 surviving set's block may start there",
                members_path.display()
            )));
        }
        file.seek(SeekFrom::Start((offset - 4) as u64))
            .map_err(|e| Error::io(members_path, e))?;
        let mut buf = [0u8; 4];
        file.read_exact(&mut buf).map_err(|e| Error::io(members_path, e))?;
        let word = u32::from_le_bytes(buf);
        if word != 0 {
            return Err(Error::invariant(format!(
                "offset {offset} in {}: expected zero terminator at {}, found {word}",
                members_path.display(),
                offset - 4
            )));
        }
    }
    Ok(())
}

/// Build and persist the offset index, after verifying it against the
/// members file.
pub fn build_and_persist(
    members_path: &Path,
    index_path: &Path,
    offsets: &OffsetTable,
) -> Result<Vec<u32>> {
    verify(members_path, offsets)?;
    let index = build(offsets);
    write_u32_array(index_path, &index)?;
    Ok(index)
}
