//! UCSC-style hierarchical interval binning.
//!
//! The genome browser binning scheme partitions each region into five levels
//! of power-of-two-sized bins, each level 8x finer than its parent, with
//! starting offsets chosen so bin numbers never collide across levels. A
//! feature is stored in the smallest bin fully containing it; a range query
//! collects candidate bins at every level it touches, so the candidate set is
//! always a superset of the bins holding truly overlapping features. The bin
//! membership test is only a prefilter; the exact interval comparison stays
//! the authoritative overlap condition.
//!
//! Constants match the standard UCSC/BAI layout (finest bin 128 kb, 512 Mb
//! addressable span). Both sides of the scheme treat intervals as closed
//! `[start, end]`; using the same convention at insertion and query time is
//! what keeps the superset guarantee, so changing either side alone silently
//! breaks the prefilter.

/// Per-level bin number offsets, finest level first.
const BIN_OFFSETS: [u32; 5] = [512 + 64 + 8 + 1, 64 + 8 + 1, 8 + 1, 1, 0];

/// Right-shift from a coordinate to a finest-level bin index (128 kb bins).
const BIN_FIRST_SHIFT: u32 = 17;

/// Additional right-shift per coarser level (8x size ratio).
const BIN_NEXT_SHIFT: u32 = 3;

/// Largest addressable coordinate; positions beyond it are clamped.
pub const MAX_BIN_POSITION: u64 = (1 << 29) - 1;

/// Smallest bin fully containing the closed interval `[start, end]`.
///
/// This is the insertion-side function: a feature row's `bin` column holds
/// this value.
pub fn bin_from_range(start: u64, end: u64) -> u32 {
    let start = start.min(MAX_BIN_POSITION);
    let end = end.clamp(start, MAX_BIN_POSITION);
    let mut start_bin = start >> BIN_FIRST_SHIFT;
    let mut end_bin = end >> BIN_FIRST_SHIFT;
    for offset in BIN_OFFSETS {
        if start_bin == end_bin {
            return offset + start_bin as u32;
        }
        start_bin >>= BIN_NEXT_SHIFT;
        end_bin >>= BIN_NEXT_SHIFT;
    }
    // Unreachable after clamping: the coarsest level has a single bin.
    BIN_OFFSETS[BIN_OFFSETS.len() - 1]
}

/// Candidate bins for a query over the closed interval `[start, end]`.
///
/// Returns the deduplicated, ascending set of bin numbers at every level the
/// query range touches. Any feature whose interval overlaps the query is
/// stored in one of these bins (no false negatives); bins may also contain
/// non-overlapping features, which the exact interval test filters out.
pub fn overlapping_bins(start: u64, end: u64) -> Vec<u32> {
    let start = start.min(MAX_BIN_POSITION);
    let end = end.clamp(start, MAX_BIN_POSITION);
    let mut bins = Vec::new();
    let mut shift = BIN_FIRST_SHIFT;
    for offset in BIN_OFFSETS {
        for bin in (start >> shift)..=(end >> shift) {
            bins.push(offset + bin as u32);
        }
        shift += BIN_NEXT_SHIFT;
    }
    bins.sort_unstable();
    bins
}

#[cfg(test)]
mod tests {
    use super::*;

    const BIN_SIZE: u64 = 1 << BIN_FIRST_SHIFT;

    #[test]
    fn test_bin_from_range_finest_level() {
        assert_eq!(bin_from_range(0, 100), 585);
        assert_eq!(bin_from_range(0, BIN_SIZE - 1), 585);
        assert_eq!(bin_from_range(BIN_SIZE, BIN_SIZE + 10), 586);
    }

    #[test]
    fn test_bin_from_range_promotes_across_boundary() {
        // Straddles the first 128 kb boundary, so it lands one level up.
        assert_eq!(bin_from_range(BIN_SIZE - 1, BIN_SIZE), 73);
        // Spans more than 1 Mb, two levels up.
        assert_eq!(bin_from_range(0, 8 * BIN_SIZE), 9);
    }

    #[test]
    fn test_bin_from_range_whole_region() {
        assert_eq!(bin_from_range(0, MAX_BIN_POSITION), 0);
    }

    #[test]
    fn test_bin_from_range_clamps_oversized_coordinates() {
        let clamped = bin_from_range(MAX_BIN_POSITION + 100, MAX_BIN_POSITION + 200);
        assert_eq!(clamped, bin_from_range(MAX_BIN_POSITION, MAX_BIN_POSITION));
    }

    #[test]
    fn test_overlapping_bins_point_query() {
        let bins = overlapping_bins(0, 0);
        // One bin per level.
        assert_eq!(bins, vec![0, 1, 9, 73, 585]);
    }

    #[test]
    fn test_overlapping_bins_never_collide_across_levels() {
        let bins = overlapping_bins(0, MAX_BIN_POSITION);
        let mut deduped = bins.clone();
        deduped.dedup();
        assert_eq!(bins, deduped);
        // 4096 + 512 + 64 + 8 + 1 bins across the full span.
        assert_eq!(bins.len(), 4681);
    }

    #[test]
    fn test_candidate_set_is_superset_of_overlapping_feature_bins() {
        // Features and queries chosen to straddle level boundaries.
        let features = [
            (0u64, 50u64),
            (100, 200),
            (BIN_SIZE - 1, BIN_SIZE),
            (BIN_SIZE, 2 * BIN_SIZE - 1),
            (7 * BIN_SIZE, 9 * BIN_SIZE),
            (0, 64 * BIN_SIZE),
            (63 * BIN_SIZE, 65 * BIN_SIZE),
            (MAX_BIN_POSITION - 10, MAX_BIN_POSITION),
        ];
        let queries = [
            (0u64, 10u64),
            (150, 160),
            (BIN_SIZE - 5, BIN_SIZE + 5),
            (0, MAX_BIN_POSITION),
            (8 * BIN_SIZE, 8 * BIN_SIZE),
            (64 * BIN_SIZE - 1, 64 * BIN_SIZE),
            (MAX_BIN_POSITION, MAX_BIN_POSITION),
        ];
        for &(fs, fe) in &features {
            let feature_bin = bin_from_range(fs, fe);
            for &(qs, qe) in &queries {
                let overlaps = fs <= qe && fe >= qs;
                if overlaps {
                    let candidates = overlapping_bins(qs, qe);
                    assert!(
                        candidates.contains(&feature_bin),
                        "feature [{fs}, {fe}] (bin {feature_bin}) missing from \
                         candidates of query [{qs}, {qe}]"
                    );
                }
            }
        }
    }

    #[test]
    fn test_candidate_set_allows_false_positives() {
        // A query inside bin 585 also lists every ancestor bin, which may
        // hold features that do not overlap the query.
        let bins = overlapping_bins(10, 20);
        assert!(bins.contains(&585));
        assert!(bins.contains(&73));
        assert!(bins.contains(&9));
        assert!(bins.contains(&1));
        assert!(bins.contains(&0));
    }
}
