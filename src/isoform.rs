//! Isoform Resolver (§4.5): annotates a molecule's compatible isoform set
//! against precomputed exon-coverage and splice-junction interval indices.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;

use crate::interval::GenomicIntervals;
use crate::molecule::MasterMolecule;

const INTRONIC_SENTINEL: &str = "intronic";

/// One gene's `interval -> isoform set` dictionary (§4.5). The sentinel
/// value `{"intronic"}` marks intervals intronic for every isoform.
#[derive(Debug, Clone, Default)]
pub struct IntervalIndex {
    entries: Vec<((i64, i64), HashSet<String>)>,
}

impl IntervalIndex {
    pub fn new(entries: Vec<((i64, i64), HashSet<String>)>) -> Self {
        IntervalIndex { entries }
    }

    /// Sets of all entries overlapping `query` by more than 4 positions.
    fn overlapping_sets(&self, query: &GenomicIntervals) -> Vec<&HashSet<String>> {
        self.entries
            .iter()
            .filter(|(key, _)| {
                let key_set = GenomicIntervals::from_pairs(vec![*key]);
                key_set.intersection(query).cardinality() > 4
            })
            .map(|(_, set)| set)
            .collect()
    }
}

/// `gene_id -> IntervalIndex`, scoped to one run (both the exonic-coverage
/// and junction dictionaries share this shape).
pub type IsoformDictionary = HashMap<String, IntervalIndex>;

fn intronic_sentinel() -> HashSet<String> {
    let mut s = HashSet::new();
    s.insert(INTRONIC_SENTINEL.to_owned());
    s
}

/// Drop the `{"intronic"}` entry from `sets` if it is present alongside at
/// least one other set (§4.5 algorithm, step 4).
fn drop_redundant_intronic(mut sets: Vec<HashSet<String>>) -> Vec<HashSet<String>> {
    let sentinel = intronic_sentinel();
    if sets.len() > 1 {
        if let Some(pos) = sets.iter().position(|s| *s == sentinel) {
            sets.remove(pos);
        }
    }
    sets
}

fn intersect_all(sets: &[HashSet<String>]) -> Option<HashSet<String>> {
    let mut iter = sets.iter();
    let first = iter.next()?.clone();
    Some(iter.fold(first, |acc, s| acc.intersection(s).cloned().collect()))
}

/// Splice-junction intervals implied by a reconstructed CIGAR: the gap
/// between consecutive covered (`M`) blocks wherever the separating op is a
/// reference skip (§4.5).
fn junction_intervals(covered: &GenomicIntervals) -> Vec<(i64, i64)> {
    covered
        .iter()
        .copied()
        .tuple_windows()
        .map(|(a, b)| (a.1, b.0))
        .collect()
}

/// Resolve compatible isoforms for `molecule` against the two interval
/// indices already sliced down to its gene, and return the comma-joined
/// `CT:Z` tag value, or `None` if resolution fails (empty intersection, or
/// the gene has no entry in one of the dictionaries — §4.5 Failures, not
/// logged).
pub fn resolve(
    molecule: &MasterMolecule,
    exon_index: &IntervalIndex,
    junction_index: &IntervalIndex,
) -> Option<String> {
    let cov_sets: Vec<HashSet<String>> = exon_index
        .overlapping_sets(&molecule.covered)
        .into_iter()
        .cloned()
        .collect();
    let cov_sets = drop_redundant_intronic(cov_sets);

    // Only meaningful if the molecule's own alignment spans a reference
    // skip; an un-spliced molecule contributes no junction constraint.
    let jun_query = GenomicIntervals::from_pairs(junction_intervals(&molecule.covered));
    let jun_sets: Vec<HashSet<String>> = if jun_query.is_empty() {
        Vec::new()
    } else {
        let sets: Vec<HashSet<String>> = junction_index
            .overlapping_sets(&jun_query)
            .into_iter()
            .cloned()
            .collect();
        drop_redundant_intronic(sets)
    };

    let cov_compat = intersect_all(&cov_sets)?;
    let compatible = if jun_sets.is_empty() {
        cov_compat
    } else {
        let jun_compat = intersect_all(&jun_sets)?;
        cov_compat.intersection(&jun_compat).cloned().collect()
    };

    if compatible.is_empty() {
        return None;
    }

    let mut sorted: Vec<&str> = compatible.iter().map(|s| s.as_str()).collect();
    sorted.sort_unstable();
    Some(sorted.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::GroupKey;

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn molecule(covered: Vec<(i64, i64)>) -> MasterMolecule {
        let covered = GenomicIntervals::from_pairs(covered);
        MasterMolecule {
            key: GroupKey::new("AAAA", "Actb", "UMI1"),
            ref_name: "chr1".to_owned(),
            is_reverse: false,
            covered,
            skipped: GenomicIntervals::empty(),
            deleted: GenomicIntervals::empty(),
            seq: vec![],
            qual: vec![],
            nr: 1,
            ir: 0,
            er: 1,
        }
    }

    #[test]
    fn intersects_covered_isoform_sets() {
        let molecule = molecule(vec![(100, 200)]);
        let exon_index = IntervalIndex::new(vec![
            ((90, 150), set(&["iso1", "iso2"])),
            ((140, 210), set(&["iso1", "iso3"])),
        ]);
        let junction_index = IntervalIndex::default();
        let ct = resolve(&molecule, &exon_index, &junction_index);
        assert_eq!(ct, Some("iso1".to_owned()));
    }

    #[test]
    fn drops_intronic_sentinel_when_other_isoforms_present() {
        let sets = vec![intronic_sentinel(), set(&["iso1"])];
        let kept = drop_redundant_intronic(sets);
        assert_eq!(kept, vec![set(&["iso1"])]);
    }

    #[test]
    fn empty_exon_index_yields_no_tag() {
        let molecule = molecule(vec![(100, 200)]);
        let exon_index = IntervalIndex::default();
        let junction_index = IntervalIndex::default();
        assert_eq!(resolve(&molecule, &exon_index, &junction_index), None);
    }
}
