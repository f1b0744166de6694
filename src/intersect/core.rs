//! Sorted-array intersection, counting-only (no intermediate set is ever
//! materialized). Two algorithms are provided and selected by operand
//! size ratio, per the "galloping vs. linear merge" split in the design
//! docs — the same split the reference set-intersection benchmarks in
//! this workspace's lineage use for search-based vs. merge-based
//! algorithms.

use std::cmp::Ordering;

/// Above this size ratio (larger / smaller), galloping wins: binary
/// search over the larger set costs `O(m log n)` against a merge's
/// `O(m + n)`, and a skewed pair makes the log factor pay for itself.
pub const GALLOPING_RATIO_THRESHOLD: usize = 32;

/// Count `|a ∩ b|` for two sorted, unique `u32` slices, choosing the
/// cheaper algorithm for the pair's size ratio. Both algorithms agree on
/// every sorted-unique input; this is only a performance choice.
pub fn intersection_count(a: &[u32], b: &[u32]) -> usize {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if small.is_empty() {
        return 0;
    }
    if large.len() >= small.len() * GALLOPING_RATIO_THRESHOLD {
        galloping_count(small, large)
    } else {
        linear_merge_count(small, large)
    }
}

/// Two-finger merge intersection, `O(|a| + |b|)`. Preferred when the
/// operands are comparably sized.
pub fn linear_merge_count(a: &[u32], b: &[u32]) -> usize {
    let mut i = 0usize;
    let mut j = 0usize;
    let mut count = 0usize;

    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                count += 1;
                i += 1;
                j += 1;
            }
        }
    }
    count
}

/// Galloping (exponential then binary search) intersection,
/// `O(|small| * log(|large|))`. Preferred when one operand dwarfs the
/// other — doubling the search window from the last match means a hit
/// near the front of `large` costs almost nothing, and even a hit near
/// the end costs only `log(|large|)` comparisons rather than a full
/// linear scan.
pub fn galloping_count(small: &[u32], large: &[u32]) -> usize {
    if small.is_empty() || large.is_empty() {
        return 0;
    }

    let mut base = 0usize;
    let mut count = 0usize;

    for &target in small {
        if base >= large.len() {
            break;
        }
        let mut offset = 1usize;
        while base + offset < large.len() && large[base + offset] <= target {
            offset *= 2;
        }

        let lo = base + offset / 2;
        let hi = (large.len() - 1).min(base + offset);
        base = binary_search_from(large, target, lo, hi);

        if base < large.len() && large[base] == target {
            count += 1;
        }
    }
    count
}

/// Binary search `target` in `set[lo..=hi]`, returning the index of an
/// exact match, or the insertion point if absent (matching
/// `bisect_left` semantics — the caller checks for equality itself).
fn binary_search_from(set: &[u32], target: u32, lo: usize, hi: usize) -> usize {
    let mut lower = lo as isize;
    let mut upper = hi as isize;

    while lower <= upper {
        let mid = lower + (upper - lower) / 2;
        match set[mid as usize].cmp(&target) {
            Ordering::Less => lower = mid + 1,
            Ordering::Greater => upper = mid - 1,
            Ordering::Equal => return mid as usize,
        }
    }
    lower as usize
}

/// Check that `data` is strictly ascending with no duplicates — the
/// invariant every per-set member array must uphold. Used to detect a
/// malformed set before it reaches either intersection algorithm, since
/// both assume it silently.
pub fn is_sorted_ascending_unique(data: &[u32]) -> bool {
    data.windows(2).all(|w| w[0] < w[1])
}
