//! Closed integer interval algebra over reference positions (§4.2).
//!
//! A [`GenomicIntervals`] is always kept normalized: sorted by lower bound,
//! disjoint, and with adjacent intervals (`b+1 == c`) coalesced into one.

use std::cmp::{max, min};

/// A disjoint, sorted, coalesced set of closed integer intervals `[lo, hi]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenomicIntervals {
    intervals: Vec<(i64, i64)>,
}

impl GenomicIntervals {
    pub fn empty() -> Self {
        GenomicIntervals {
            intervals: Vec::new(),
        }
    }

    /// Build the minimal set of maximal runs of consecutive integers from an
    /// arbitrary (possibly unsorted, possibly duplicated) sequence.
    pub fn from_points<I: IntoIterator<Item = i64>>(points: I) -> Self {
        let mut sorted: Vec<i64> = points.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut intervals = Vec::new();
        let mut iter = sorted.into_iter();
        if let Some(first) = iter.next() {
            let mut lo = first;
            let mut hi = first;
            for p in iter {
                if p == hi + 1 {
                    hi = p;
                } else {
                    intervals.push((lo, hi));
                    lo = p;
                    hi = p;
                }
            }
            intervals.push((lo, hi));
        }
        GenomicIntervals { intervals }
    }

    /// Build from a sequence of (lo, hi) pairs, normalizing overlaps and
    /// adjacency via [`GenomicIntervals::union`].
    pub fn from_pairs<I: IntoIterator<Item = (i64, i64)>>(pairs: I) -> Self {
        let mut result = GenomicIntervals::empty();
        for (lo, hi) in pairs {
            if lo > hi {
                continue;
            }
            result = result.union(&GenomicIntervals {
                intervals: vec![(lo, hi)],
            });
        }
        result
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Sum of lengths of the constituent intervals.
    pub fn cardinality(&self) -> i64 {
        self.intervals.iter().map(|(lo, hi)| hi - lo + 1).sum()
    }

    /// Constituent closed intervals in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &(i64, i64)> {
        self.intervals.iter()
    }

    pub fn into_pairs(self) -> Vec<(i64, i64)> {
        self.intervals
    }

    pub fn min(&self) -> Option<i64> {
        self.intervals.first().map(|(lo, _)| *lo)
    }

    pub fn max(&self) -> Option<i64> {
        self.intervals.last().map(|(_, hi)| *hi)
    }

    /// Inclusive hull `[min, max]` of all constituent intervals, or `None` if
    /// this set is empty.
    pub fn hull(&self) -> Option<(i64, i64)> {
        match (self.min(), self.max()) {
            (Some(lo), Some(hi)) => Some((lo, hi)),
            _ => None,
        }
    }

    pub fn union(&self, other: &GenomicIntervals) -> GenomicIntervals {
        let mut merged: Vec<(i64, i64)> = self
            .intervals
            .iter()
            .chain(other.intervals.iter())
            .copied()
            .collect();
        merged.sort_unstable();

        let mut out: Vec<(i64, i64)> = Vec::with_capacity(merged.len());
        for (lo, hi) in merged {
            match out.last_mut() {
                Some((_, last_hi)) if lo <= *last_hi + 1 => {
                    *last_hi = max(*last_hi, hi);
                }
                _ => out.push((lo, hi)),
            }
        }
        GenomicIntervals { intervals: out }
    }

    pub fn intersection(&self, other: &GenomicIntervals) -> GenomicIntervals {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.intervals.len() && j < other.intervals.len() {
            let (a_lo, a_hi) = self.intervals[i];
            let (b_lo, b_hi) = other.intervals[j];

            let lo = max(a_lo, b_lo);
            let hi = min(a_hi, b_hi);
            if lo <= hi {
                out.push((lo, hi));
            }
            if a_hi < b_hi {
                i += 1;
            } else {
                j += 1;
            }
        }
        GenomicIntervals { intervals: out }
    }

    pub fn difference(&self, other: &GenomicIntervals) -> GenomicIntervals {
        let mut out = Vec::new();
        for &(lo, hi) in &self.intervals {
            let mut cur_lo = lo;
            for &(b_lo, b_hi) in &other.intervals {
                if b_hi < cur_lo || b_lo > hi {
                    continue;
                }
                if b_lo > cur_lo {
                    out.push((cur_lo, min(b_lo - 1, hi)));
                }
                cur_lo = max(cur_lo, b_hi + 1);
                if cur_lo > hi {
                    break;
                }
            }
            if cur_lo <= hi {
                out.push((cur_lo, hi));
            }
        }
        GenomicIntervals { intervals: out }
    }

    /// Complement relative to an enclosing hull `[lo, hi]`.
    pub fn complement(&self, hull: (i64, i64)) -> GenomicIntervals {
        let enclosing = GenomicIntervals {
            intervals: vec![hull],
        };
        enclosing.difference(self)
    }

    /// Ascending iteration of every individual integer position covered by
    /// this set (used for `IL` diagnostic endpoint enumeration and tests).
    pub fn iter_points(&self) -> impl Iterator<Item = i64> + '_ {
        self.intervals.iter().flat_map(|&(lo, hi)| lo..=hi)
    }
}
