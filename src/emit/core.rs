//! Renders and appends `SourceResult`s to the suggestions output.
//!
//! Workers never touch the output file directly. Each renders its
//! completed source's lines into one `String` and sends it down an mpsc
//! channel to a single writer thread, which owns the file handle and
//! appends each batch whole — a single-writer funnel, so one worker's
//! flush can never interleave with another's lines.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread::JoinHandle;

use itoa::Buffer;

use crate::score::SourceResult;
use crate::{Error, Result};

/// Significant digits carried in a formatted score — enough to
/// distinguish ties within a top-K list without implying false
/// precision.
pub const SCORE_SIGNIFICANT_DIGITS: i32 = 6;

/// Format a score to `SCORE_SIGNIFICANT_DIGITS` significant digits,
/// trimming trailing zeros but always leaving one fractional digit.
pub fn format_score(score: f64) -> String {
    if score == 0.0 {
        return "0.0".to_string();
    }
    let magnitude = score.abs().log10().floor() as i32;
    let decimals = (SCORE_SIGNIFICANT_DIGITS - 1 - magnitude).clamp(0, 17) as usize;
    let mut rendered = format!("{score:.decimals$}");
    if rendered.contains('.') {
        while rendered.ends_with('0') {
            rendered.pop();
        }
        if rendered.ends_with('.') {
            rendered.push('0');
        }
    }
    rendered
}

/// Render one source's suggestions as `source,target,score\n` lines, in
/// the order they already appear in (descending score, per
/// `score::Engine::score_source`). Integers go through `itoa` for
/// allocation-free formatting; only the final string is heap-allocated.
pub fn render(result: &SourceResult) -> String {
    let mut buf = String::with_capacity(result.suggestions.len() * 24);
    let mut int_buf = Buffer::new();
    for suggestion in &result.suggestions {
        buf.push_str(int_buf.format(result.source_id));
        buf.push(',');
        buf.push_str(int_buf.format(suggestion.target_id));
        buf.push(',');
        buf.push_str(&format_score(suggestion.score));
        buf.push('\n');
    }
    buf
}

/// Owns the suggestions output file and a background thread that drains
/// rendered batches from a channel and appends them one at a time. Drop
/// (or call `join`) to flush and wait for every in-flight batch to land.
pub struct Writer {
    // `mpsc::Sender` is `Send` but not `Sync`; `send` is called from every
    // rayon worker through a shared `&Writer`, so the handle itself needs
    // interior synchronization even though each send is independent.
    sender: Option<Mutex<mpsc::Sender<String>>>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl Writer {
    /// Open `path` in append mode (creating it if absent) and spawn the
    /// writer thread. Output is always append-only, so resuming a killed
    /// run with `--begin-at` never truncates prior results.
    pub fn open(path: &Path) -> Result<Self> {
        let file: File = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(file);
        let path_owned = path.to_path_buf();

        let (sender, receiver) = mpsc::channel::<String>();
        let handle = std::thread::spawn(move || -> Result<()> {
            for batch in receiver {
                writer
                    .write_all(batch.as_bytes())
                    .map_err(|e| Error::io(&path_owned, e))?;
            }
            writer.flush().map_err(|e| Error::io(&path_owned, e))
        });

        Ok(Self {
            sender: Some(Mutex::new(sender)),
            handle: Some(handle),
        })
    }

    /// Hand one source's rendered batch to the writer thread. A no-op
    /// (other than dropping the batch) if the source had no suggestions.
    pub fn send(&self, result: &SourceResult) -> Result<()> {
        if result.suggestions.is_empty() {
            return Ok(());
        }
        let batch = render(result);
        self.sender
            .as_ref()
            .expect("writer channel only closed by join/drop")
            .lock()
            .expect("writer mutex is never poisoned: send never panics while held")
            .send(batch)
            .map_err(|_| Error::invariant("emit: writer thread exited early".to_string()))
    }

    /// Close the channel, wait for the writer thread to drain and flush,
    /// and surface any I/O error it hit.
    pub fn join(mut self) -> Result<()> {
        self.sender.take();
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::invariant("emit: writer thread panicked".to_string()))?,
            None => Ok(()),
        }
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
