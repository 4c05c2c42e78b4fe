//! Alignment Reconstructor (§4.4): turns a [`MasterMolecule`]'s three
//! footprints into a SAM POS/CIGAR, resolving covered/skipped conflicts.

use crate::interval::GenomicIntervals;
use crate::molecule::MasterMolecule;

/// One CIGAR operation letter, in the `M > N > D` tie-break priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum OpKind {
    Match,
    RefSkip,
    Del,
}

impl OpKind {
    fn letter(self) -> char {
        match self {
            OpKind::Match => 'M',
            OpKind::RefSkip => 'N',
            OpKind::Del => 'D',
        }
    }
}

/// Result of §4.4: the SAM POS/CIGAR plus conflict diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconstruction {
    /// 1-based SAM coordinate.
    pub pos: i64,
    pub cigar: String,
    pub conflict: bool,
    pub conflict_count: i64,
    /// Flattened, even-length endpoint list for the `IL:B:I` tag.
    pub conflict_endpoints: Vec<i64>,
}

/// `reconstruct(master) -> Reconstruction` (§4.4).
pub fn reconstruct(master: &MasterMolecule) -> Reconstruction {
    let conflict_region = master.covered.intersection(&master.skipped);

    let (conflict, conflict_count, conflict_endpoints, skipped) = if conflict_region.is_empty() {
        (false, 0, Vec::new(), master.skipped.clone())
    } else {
        let count = conflict_region.cardinality();
        let endpoints = conflict_region
            .iter()
            .flat_map(|&(lo, hi)| vec![lo, hi])
            .collect();
        let resolved_skipped = master.skipped.difference(&conflict_region);
        (true, count, endpoints, resolved_skipped)
    };

    let hull = master.covered.hull().expect("covered footprint is non-empty (I2)");

    // Drop the unbounded complement tails: the deleted footprint passed in
    // is already restricted to `hull` (§3, "Deleted footprint"), so no tail
    // trimming is needed beyond that restriction.
    let deleted = master.deleted.clone();

    let mut ops: Vec<(i64, i64, OpKind)> = Vec::new();
    ops.extend(
        master
            .covered
            .iter()
            .map(|&(lo, hi)| (lo, hi, OpKind::Match)),
    );
    ops.extend(skipped.iter().map(|&(lo, hi)| (lo, hi, OpKind::RefSkip)));
    ops.extend(deleted.iter().map(|&(lo, hi)| (lo, hi, OpKind::Del)));

    // Smallest `lo` first; ties broken by the fixed M > N > D priority.
    ops.sort_by_key(|&(lo, _, kind)| (lo, kind));

    let mut cigar = String::new();
    for (lo, hi, kind) in ops {
        let len = hi - lo + 1;
        if len <= 0 {
            continue;
        }
        cigar.push_str(&len.to_string());
        cigar.push(kind.letter());
    }

    Reconstruction {
        pos: hull.0 + 1,
        cigar,
        conflict,
        conflict_count,
        conflict_endpoints,
    }
}

/// Footprint-partition check used by tests (§8 property 5): covered,
/// skipped, and deleted are pairwise disjoint and their union is the hull.
#[cfg(test)]
fn assert_partition(covered: &GenomicIntervals, skipped: &GenomicIntervals, deleted: &GenomicIntervals) {
    assert!(covered.intersection(skipped).is_empty());
    assert!(covered.intersection(deleted).is_empty());
    assert!(skipped.intersection(deleted).is_empty());
}
