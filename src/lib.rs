//! Top-K asymmetric set-overlap recommendations over a (member, set)
//! membership relation.
//!
//! The crate mirrors the pipeline stages described in the design docs:
//! [`ingest`] turns a membership CSV into a binary pair stream,
//! [`partition`] materializes per-set sorted member arrays in
//! bounded-memory segments, [`index`] builds the offset index over those
//! arrays, [`score`] computes top-K asymmetric overlap recommendations by
//! memory-mapping the members file, and [`emit`] writes the ranked
//! suggestions out. [`format`] owns the on-disk binary layouts shared by
//! every stage.

#![allow(clippy::too_many_arguments)]

/// Use mimalloc as the global allocator for both binaries.
/// The scoring engine's per-source top-K heaps, decoded member arrays,
/// and result buffers are a many-small-allocations workload spread across
/// every worker thread; mimalloc's thread-local caching keeps that
/// allocation traffic cheap under concurrent load.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod emit;
pub mod error;
pub mod format;
pub mod index;
pub mod ingest;
pub mod intersect;
pub mod partition;
pub mod score;

pub use error::{Error, Result};

/// Zero is reserved as a sentinel: the end-of-array terminator in the
/// members file, and the "no offset recorded" marker in the index. It
/// must never appear as a real member or set id.
pub const SENTINEL: u32 = 0;
