//! Stitcher Kernel (§4.3): the pure, side-effect-free core that turns a read
//! group into a [`MasterMolecule`].

use std::collections::HashMap;

use bio::stats::LogProb;
use thiserror::Error;

use crate::constants::{self, CONSENSUS_THRESHOLD, MAX_QUAL};
use crate::interval::GenomicIntervals;
use crate::molecule::MasterMolecule;
use crate::read::{AlignedRead, GroupKey};

/// Group-level failures (§4.3, §7). Reported upstream as a sidecar-log line
/// identified by the group's key; the group is skipped, not the whole run.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StitchError {
    #[error("empty-group")]
    EmptyGroup,
    #[error("no-strand-evidence")]
    NoStrandEvidence,
    #[error("reads in group reference more than one contig")]
    MixedContigs,
}

const NUCLEOTIDES: [u8; 4] = [b'A', b'T', b'C', b'G'];

/// `stitch(reads, single_end, key) -> MasterMolecule` (§4.3).
///
/// `reads` must already be grouped by `(cell, gene, umi)` and filtered per
/// §6/§7 (missing tags, unmapped, ambiguous gene assignment already removed).
pub fn stitch(
    reads: &[AlignedRead],
    single_end: bool,
    key: &GroupKey,
) -> Result<MasterMolecule, StitchError> {
    let ref_name = match reads.first() {
        Some(r) => r.ref_name.clone(),
        None => return Err(StitchError::EmptyGroup),
    };
    if reads.iter().any(|r| r.ref_name != ref_name) {
        return Err(StitchError::MixedContigs);
    }

    // Step 2: union reference-position set, dense column index.
    let mut columns: Vec<i64> = reads
        .iter()
        .flat_map(|r| r.ref_positions.iter().copied())
        .collect();
    columns.sort_unstable();
    columns.dedup();

    if columns.is_empty() {
        return Err(StitchError::EmptyGroup);
    }

    let column_index: HashMap<i64, usize> = columns
        .iter()
        .enumerate()
        .map(|(idx, &pos)| (pos, idx))
        .collect();

    // Step 3: accumulate per-column, per-candidate-base log-likelihoods.
    let mut sums: Vec<[LogProb; 4]> = vec![[LogProb::ln_one(); 4]; columns.len()];
    for read in reads {
        for ((&pos, &base), &qual) in read
            .ref_positions
            .iter()
            .zip(read.bases.iter())
            .zip(read.quals.iter())
        {
            let col = column_index[&pos];
            let q = constants::clamp_qual(qual);
            for (c, &cand) in NUCLEOTIDES.iter().enumerate() {
                let ll = if base.to_ascii_uppercase() == b'N' {
                    *constants::LL_N
                } else if base.to_ascii_uppercase() == cand {
                    constants::LL_CORRECT[q]
                } else {
                    constants::LL_WRONG[q]
                };
                sums[col][c] = sums[col][c] + ll;
            }
        }
    }

    // Steps 4-5: per-column posterior, consensus base, Phred quality.
    let mut seq = Vec::with_capacity(columns.len());
    let mut qual = Vec::with_capacity(columns.len());
    for col_sums in &sums {
        let l = LogProb::ln_sum_exp(col_sums);
        let (argmax, &m) = col_sums
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .unwrap();
        let p = (*m - *l).exp();

        let base = if p > CONSENSUS_THRESHOLD {
            NUCLEOTIDES[argmax]
        } else {
            b'N'
        };
        let phred = (-10.0 * (1.0 - p + 1e-13).log10()).round();
        let phred = phred.max(0.0).min(MAX_QUAL as f64) as u8;

        seq.push(base);
        qual.push(phred);
    }

    // Step 6: strand majority vote. Reads reaching the kernel already carry
    // a non-empty UMI (filtered in `read::extract`), so the "read1 with
    // non-empty UMI" condition reduces to "is_read1" here.
    let strand_votes: Vec<bool> = reads
        .iter()
        .filter(|r| single_end || r.is_read1)
        .map(|r| r.is_reverse)
        .collect();
    if strand_votes.is_empty() {
        return Err(StitchError::NoStrandEvidence);
    }
    let n_reverse = strand_votes.iter().filter(|&&v| v).count();
    let n_forward = strand_votes.len() - n_reverse;
    // Tie broken toward `false` (forward), per the open question in §9.
    let is_reverse = n_reverse > n_forward;

    // Step 7: footprints and counts.
    let covered = GenomicIntervals::from_points(columns.iter().copied());
    let skipped = GenomicIntervals::from_pairs(reads.iter().flat_map(|r| r.skipped.clone()));
    let hull = covered.hull().expect("covered is non-empty");
    let deleted = covered.union(&skipped).complement(hull);

    let ir = reads.iter().filter(|r| r.intronic).count() as u32;
    let er = reads.iter().filter(|r| r.exonic).count() as u32;

    Ok(MasterMolecule {
        key: key.clone(),
        ref_name,
        is_reverse,
        covered,
        skipped,
        deleted,
        seq,
        qual,
        nr: reads.len() as u32,
        ir,
        er,
    })
}
