//! The scoring engine: for every source set, compute the asymmetric
//! overlap score against every candidate target and keep the top-K.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, OnceLock};

use memmap2::Mmap;

use crate::format::{WORD, read_u32_array};
use crate::intersect::{intersection_count, is_sorted_ascending_unique};
use crate::{Error, Result};

/// Tuning knobs for a scoring run, mirroring the `causomatic-score` CLI
/// flags one-to-one.
#[derive(Debug, Clone)]
pub struct ScoreConfig {
    pub top_k: NonZeroU32,
    pub begin_at: u32,
    pub min_score: f64,
    pub workers: NonZeroUsize,
    pub progress_every: NonZeroU32,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            top_k: NonZeroU32::new(25).unwrap(),
            begin_at: 0,
            min_score: 0.0,
            workers: NonZeroUsize::new(1).unwrap(),
            progress_every: NonZeroU32::new(1000).unwrap(),
        }
    }
}

/// One ranked recommendation: `target_id` with its asymmetric overlap
/// score against the enclosing source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Suggestion {
    pub target_id: u32,
    pub score: f64,
}

/// A source set's full top-K result, already sorted descending by score
/// (ties broken ascending by `target_id`).
#[derive(Debug, Clone, PartialEq)]
pub struct SourceResult {
    pub source_id: u32,
    pub suggestions: Vec<Suggestion>,
}

/// Candidate ordering used by the bounded top-K heap. "Greater" means
/// "more worth keeping": higher score wins; a tied score is won by the
/// *lower* target_id (Scenario 3's tie-break).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    score: f64,
    target_id: u32,
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .partial_cmp(&other.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.target_id.cmp(&self.target_id))
    }
}

/// Holds the three read-only inputs a scoring run needs: the
/// memory-mapped concatenated members file, the offset index, and the
/// set-id directory (iteration order for both sources and targets), plus
/// a decode cache so a set's member array is parsed out of the mmap at
/// most once for the lifetime of the engine no matter how many sources
/// score against it. Cheap to clone — everything behind it is `Arc`'d —
/// so it can be handed to each rayon worker by value.
#[derive(Clone)]
pub struct Engine {
    mmap: Arc<Mmap>,
    index: Arc<Vec<u32>>,
    directory: Arc<Vec<u32>>,
    config: Arc<ScoreConfig>,
    members_cache: Arc<Vec<OnceLock<Arc<[u32]>>>>,
}

impl Engine {
    pub fn open(
        members_path: &Path,
        index_path: &Path,
        set_id_path: &Path,
        config: ScoreConfig,
    ) -> Result<Self> {
        let file = std::fs::File::open(members_path).map_err(|e| Error::io(members_path, e))?;
        // SAFETY: the members file is immutable for the lifetime of a
        // scoring run; nothing else in this process writes to it.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::io(members_path, e))?;

        let index = read_u32_array(index_path)?;
        let directory = read_u32_array(set_id_path)?;
        let members_cache = (0..index.len()).map(|_| OnceLock::new()).collect();

        Ok(Self {
            mmap: Arc::new(mmap),
            index: Arc::new(index),
            directory: Arc::new(directory),
            config: Arc::new(config),
            members_cache: Arc::new(members_cache),
        })
    }

    pub fn directory(&self) -> &[u32] {
        &self.directory
    }

    pub fn config(&self) -> &ScoreConfig {
        &self.config
    }

    /// Extract set `set_id`'s sorted-unique member array, decoding it out
    /// of the mmap by scanning forward from its recorded offset for the
    /// block's own zero terminator. Returns `None` if `set_id` has no
    /// recorded offset — either it's outside the index's range entirely,
    /// or its entry is the gap sentinel 0. Offset 0 is reserved by the
    /// partitioner (see `partition::materialize`) so it never collides
    /// with a genuine first block; without that reservation this check
    /// couldn't tell a real set at byte 0 apart from one dropped by
    /// partition's post-dedup singleton filter but still present in the
    /// set-id directory.
    ///
    /// The decoded array is cached behind a cheaply-cloned `Arc` keyed by
    /// `set_id`, so a set visited as a target by many sources is only
    /// ever decoded once: the cache is shared by every clone of this
    /// `Engine`, so concurrent workers scoring different sources still
    /// share one decode per target. A race to decode the same set for
    /// the first time is resolved by keeping whichever decode wins the
    /// `OnceLock`, not by re-decoding.
    pub fn extract(&self, set_id: u32) -> Result<Option<Arc<[u32]>>> {
        let Some(&start) = self.index.get(set_id as usize) else {
            return Ok(None);
        };
        if start == 0 {
            return Ok(None);
        }

        let slot = &self.members_cache[set_id as usize];
        if let Some(cached) = slot.get() {
            return Ok(Some(Arc::clone(cached)));
        }

        let bytes = &self.mmap[..];
        let mut pos = start as usize;
        let mut members = Vec::new();
        loop {
            if pos + WORD > bytes.len() {
                return Err(Error::corrupt(
                    "members file",
                    format!("set {set_id}: ran off the end of the file looking for a terminator"),
                ));
            }
            let word = u32::from_le_bytes(bytes[pos..pos + WORD].try_into().unwrap());
            pos += WORD;
            if word == 0 {
                break;
            }
            members.push(word);
        }

        let decoded: Arc<[u32]> = members.into();
        match slot.set(Arc::clone(&decoded)) {
            Ok(()) => Ok(Some(decoded)),
            // another worker decoded and cached this set first; use its copy.
            Err(_) => Ok(Some(Arc::clone(slot.get().expect("just set by the winner")))),
        }
    }

    /// Compute set A's top-K recommendations against every set in the
    /// directory. Returns `Ok(None)` if A's own member array is
    /// malformed (not strictly ascending) — the caller logs and skips it
    /// instead of failing the whole run.
    pub fn score_source(&self, source_id: u32) -> Result<Option<SourceResult>> {
        let Some(source_members) = self.extract(source_id)? else {
            return Ok(None);
        };
        if source_members.is_empty() {
            return Ok(None);
        }
        if !is_sorted_ascending_unique(&source_members) {
            log::warn!("score: source set {source_id} is not sorted/unique, skipping");
            return Ok(None);
        }

        let k = self.config.top_k.get() as usize;
        let mut heap: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(k);

        for &target_id in self.directory.iter() {
            if target_id == source_id {
                continue;
            }
            let Some(target_members) = self.extract(target_id)? else {
                continue;
            };
            if !is_sorted_ascending_unique(&target_members) {
                log::warn!("score: target set {target_id} is not sorted/unique, skipping pair");
                continue;
            }

            let overlap = intersection_count(&source_members, &target_members);
            if overlap == 0 {
                continue;
            }
            let score = overlap as f64 / source_members.len() as f64;
            if score <= self.config.min_score {
                continue;
            }

            let candidate = Candidate { score, target_id };
            if heap.len() < k {
                heap.push(Reverse(candidate));
            } else if let Some(Reverse(worst)) = heap.peek() {
                if candidate > *worst {
                    heap.pop();
                    heap.push(Reverse(candidate));
                }
            }
        }

        let mut suggestions: Vec<Candidate> = heap.into_iter().map(|Reverse(c)| c).collect();
        suggestions.sort_by(|a, b| b.cmp(a));

        Ok(Some(SourceResult {
            source_id,
            suggestions: suggestions
                .into_iter()
                .map(|c| Suggestion {
                    target_id: c.target_id,
                    score: c.score,
                })
                .collect(),
        }))
    }

    /// Score every source from `config.begin_at` onward, in parallel,
    /// handing each completed `SourceResult` to `on_result` as soon as
    /// it's ready. Runs on a dedicated `rayon` thread pool sized by
    /// `config.workers`, not the process-global pool, so embedding this
    /// engine elsewhere doesn't fight over thread count.
    pub fn run<F>(&self, on_result: F) -> Result<()>
    where
        F: Fn(SourceResult) + Send + Sync,
    {
        let begin_at = self.config.begin_at as usize;
        let sources: &[u32] = self.directory.get(begin_at..).unwrap_or(&[]);
        log::info!(
            "score: {} of {} sources to process (begin-at={})",
            sources.len(),
            self.directory.len(),
            begin_at
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.get())
            .build()
            .map_err(|e| Error::config(format!("failed to build worker pool: {e}")))?;

        let processed = AtomicUsize::new(0);
        let progress_every = self.config.progress_every.get() as usize;

        pool.install(|| -> Result<()> {
            use rayon::prelude::*;
            sources
                .par_iter()
                .map(|&source_id| -> Result<()> {
                    if let Some(result) = self.score_source(source_id)? {
                        on_result(result);
                    }
                    let done = processed.fetch_add(1, AtomicOrdering::Relaxed) + 1;
                    if done % progress_every == 0 {
                        log::info!("score: {done}/{} sources processed", sources.len());
                    }
                    Ok(())
                })
                .collect::<Result<Vec<()>>>()?;
            Ok(())
        })?;

        log::info!("score: done, {} sources processed", sources.len());
        Ok(())
    }
}

/// Paths bundling a scoring run's three inputs, for CLI-level convenience.
#[derive(Debug, Clone)]
pub struct ScoreInputs {
    pub members_path: PathBuf,
    pub index_path: PathBuf,
    pub set_id_path: PathBuf,
}
