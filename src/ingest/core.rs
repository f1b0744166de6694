//! Two-pass CSV ingest: tally membership counts, then emit the binary
//! pair stream for sets that survive the small-group filter.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use memmap2::Mmap;

use crate::format::PairStreamWriter;
use crate::{Error, Result, SENTINEL};

/// Log a progress line every this many CSV lines scanned, matching the
/// cadence the original Python ingest tooling used.
const PROGRESS_EVERY: u64 = 1_000_000;

/// Counts from a completed ingest run, for the CLI to log at `info`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub lines_read: u64,
    pub malformed_lines: u64,
    pub pairs_kept: u64,
    pub sets_blacklisted: u64,
}

/// Split `data` into lines on `\n`, trimming a trailing `\r` from each.
fn split_lines(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut start = 0usize;
    let len = data.len();
    std::iter::from_fn(move || {
        if start >= len {
            return None;
        }
        let end = memchr::memchr(b'\n', &data[start..])
            .map(|p| start + p)
            .unwrap_or(len);
        let mut line = &data[start..end];
        if let Some(&b'\r') = line.last() {
            line = &line[..line.len() - 1];
        }
        start = end + 1;
        Some(line)
    })
}

/// Parse one `member_id,set_id` line. Returns `None` on any malformed
/// field: missing comma, non-decimal content, extra commas, or a zero id
/// (zero is reserved as the sentinel and must never appear in real
/// input).
fn parse_pair(line: &[u8]) -> Option<(u32, u32)> {
    if line.is_empty() {
        return None;
    }
    let comma = memchr::memchr(b',', line)?;
    let rest = &line[comma + 1..];
    if memchr::memchr(b',', rest).is_some() {
        return None;
    }
    let member_str = std::str::from_utf8(&line[..comma]).ok()?;
    let set_str = std::str::from_utf8(rest).ok()?;
    let member_id: u32 = member_str.trim().parse().ok()?;
    let set_id: u32 = set_str.trim().parse().ok()?;
    if member_id == SENTINEL || set_id == SENTINEL {
        return None;
    }
    Some((member_id, set_id))
}

/// Run ingest: tally membership counts (pass 1), compute the blacklist of
/// sets at or below `small_group_threshold`, then reread the CSV and
/// write surviving pairs to `pair_stream_path` (pass 2). Refuses to
/// overwrite an existing pair-stream file.
pub fn run(
    csv_path: &Path,
    pair_stream_path: &Path,
    small_group_threshold: u32,
) -> Result<IngestStats> {
    let file = std::fs::File::open(csv_path).map_err(|e| Error::io(csv_path, e))?;
    // SAFETY: read-only mapping; the CSV is not modified while ingest runs.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::io(csv_path, e))?;
    let data: &[u8] = &mmap;

    log::info!("ingest: pass 1 — tallying membership counts");
    let mut counts: HashMap<u32, u32> = HashMap::new();
    let mut lines_read = 0u64;
    let mut malformed_lines = 0u64;

    for line in split_lines(data) {
        lines_read += 1;
        match parse_pair(line) {
            Some((_, set_id)) => {
                *counts.entry(set_id).or_insert(0) += 1;
            }
            None => {
                malformed_lines += 1;
                log::warn!(
                    "ingest: skipping malformed line {}: {:?}",
                    lines_read,
                    String::from_utf8_lossy(line)
                );
            }
        }
        if lines_read % PROGRESS_EVERY == 0 {
            log::info!("ingest: pass 1 — {lines_read} lines scanned");
        }
    }

    let blacklist: HashSet<u32> = counts
        .iter()
        .filter(|(_, &count)| count <= small_group_threshold)
        .map(|(&set_id, _)| set_id)
        .collect();
    log::info!(
        "ingest: {} distinct sets, {} blacklisted (threshold {})",
        counts.len(),
        blacklist.len(),
        small_group_threshold
    );

    log::info!("ingest: pass 2 — writing surviving pairs");
    let mut writer = PairStreamWriter::create_new(pair_stream_path)?;
    let mut pairs_kept = 0u64;
    let mut scanned = 0u64;
    for line in split_lines(data) {
        scanned += 1;
        if let Some((member_id, set_id)) = parse_pair(line) {
            if !blacklist.contains(&set_id) {
                writer
                    .write_pair(member_id, set_id)
                    .map_err(|e| Error::io(pair_stream_path, e))?;
                pairs_kept += 1;
            }
        }
        if scanned % PROGRESS_EVERY == 0 {
            log::info!("ingest: pass 2 — {scanned} lines scanned, {pairs_kept} pairs kept");
        }
    }
    writer.flush().map_err(|e| Error::io(pair_stream_path, e))?;

    Ok(IngestStats {
        lines_read,
        malformed_lines,
        pairs_kept,
        sets_blacklisted: blacklist.len() as u64,
    })
}
