//! On-disk binary layouts shared by every pipeline stage.
//!
//! Every file is little-endian, packed `u32`, no header. Four formats are
//! defined: the pair stream (repeated `(member_id, set_id)`), the set-id
//! directory (packed unique set ids), the offset index (packed per-set
//! byte offsets into the members file, 0 = gap), and the concatenated
//! members file (per-set sorted-unique-ascending arrays, each terminated
//! by a single zero word).

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::{Error, Result};

/// Size in bytes of one packed `u32` word.
pub const WORD: usize = 4;

/// Read buffer size used when streaming the pair file. Chosen to amortize
/// syscall overhead while keeping a single buffer comfortably in cache.
pub const STREAM_BUFFER: usize = 1024 * 1024;

#[cfg(test)]
mod tests;

/// One record of the pair stream: a member belongs to a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pair {
    pub member_id: u32,
    pub set_id: u32,
}

/// Buffered, rewindable reader over a pair-stream file.
///
/// Both ingest's blacklist tally and the partitioner's segment scans need
/// to make repeated full passes over this file; `rewind` lets callers
/// reuse one open handle instead of reopening the path each time.
pub struct PairStreamReader {
    reader: BufReader<File>,
}

impl PairStreamReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        Ok(Self {
            reader: BufReader::with_capacity(STREAM_BUFFER, file),
        })
    }

    /// Seek back to the start of the stream for another full pass.
    pub fn rewind(&mut self) -> io::Result<()> {
        self.reader.rewind()
    }

    /// Read the next pair, if any. Returns `Ok(None)` at a clean EOF
    /// boundary (a multiple of 8 bytes read); a trailing partial record
    /// is treated as EOF as well, since a well-formed stream never
    /// produces one.
    pub fn next_pair(&mut self) -> io::Result<Option<Pair>> {
        let mut buf = [0u8; 8];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => Ok(Some(Pair {
                member_id: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
                set_id: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            })),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Append-only writer for a pair-stream file.
pub struct PairStreamWriter {
    writer: BufWriter<File>,
}

impl PairStreamWriter {
    /// Create a new pair-stream file. Refuses to overwrite an existing
    /// one, per the ingest contract: a prior run's output is never
    /// silently clobbered.
    pub fn create_new(path: &Path) -> Result<Self> {
        let file = File::options()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        Ok(Self {
            writer: BufWriter::with_capacity(STREAM_BUFFER, file),
        })
    }

    pub fn write_pair(&mut self, member_id: u32, set_id: u32) -> io::Result<()> {
        let mut buf = [0u8; 8];
        buf[0..4].copy_from_slice(&member_id.to_le_bytes());
        buf[4..8].copy_from_slice(&set_id.to_le_bytes());
        self.writer.write_all(&buf)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Read a whole packed-`u32` file into memory. Used for the set-id
/// directory and the offset index, both of which are small enough
/// (O(distinct set ids)) to hold comfortably in RAM.
pub fn read_u32_array(path: &Path) -> Result<Vec<u32>> {
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let len = file
        .metadata()
        .map_err(|e| Error::io(path, e))?
        .len() as usize;
    if len % WORD != 0 {
        return Err(Error::corrupt(
            "packed u32 array",
            format!("{}: file size {len} is not a multiple of 4", path.display()),
        ));
    }
    let mut bytes = vec![0u8; len];
    file.read_exact(&mut bytes).map_err(|e| Error::io(path, e))?;
    Ok(bytes
        .chunks_exact(WORD)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect())
}

/// Write a packed-`u32` array to a new file.
pub fn write_u32_array(path: &Path, values: &[u32]) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    for v in values {
        writer
            .write_all(&v.to_le_bytes())
            .map_err(|e| Error::io(path, e))?;
    }
    writer.flush().map_err(|e| Error::io(path, e))
}
