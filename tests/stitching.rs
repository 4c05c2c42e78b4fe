//! End-to-end scenarios (§8 S1-S6): a read group goes in, a consensus
//! molecule and its reconstructed alignment come out.

use umistitch::isoform::{IntervalIndex, IsoformDictionary};
use umistitch::read::{AlignedRead, GroupKey};
use umistitch::reconstruct;
use umistitch::stitch;

fn read(
    pos: i64,
    seq: &str,
    qual: u8,
    skipped: Vec<(i64, i64)>,
    is_reverse: bool,
    is_read1: bool,
) -> AlignedRead {
    let ref_positions = (pos..pos + seq.len() as i64).collect();
    AlignedRead {
        ref_name: "chr1".to_owned(),
        ref_positions,
        bases: seq.bytes().collect(),
        quals: vec![qual; seq.len()],
        skipped,
        is_reverse,
        is_read1,
        exonic: true,
        intronic: false,
        cell: "AAAACCCCGGGGTTTT".to_owned(),
        gene: "Actb".to_owned(),
        umi: "AAAAAAAAAAAA".to_owned(),
    }
}

fn key() -> GroupKey {
    GroupKey::new("AAAACCCCGGGGTTTT", "Actb", "AAAAAAAAAAAA")
}

#[test]
fn s1_single_read_round_trips_unchanged() {
    let r = read(1000, "ACGTACGTAC", 35, vec![], false, true);
    let molecule = stitch::stitch(&[r.clone()], true, &key()).unwrap();
    assert_eq!(molecule.seq, r.bases);
    assert_eq!(molecule.nr, 1);

    let recon = reconstruct::reconstruct(&molecule);
    assert_eq!(recon.pos, 1001);
    assert_eq!(recon.cigar, "10M");
    assert!(!recon.conflict);
}

#[test]
fn s2_mate_gap_is_reconstructed_as_deletion() {
    let r1 = read(1000, "ACGTACGTAC", 35, vec![], false, true);
    let r2 = read(1020, "TTTTTTTTTT", 35, vec![], false, false);
    let molecule = stitch::stitch(&[r1, r2], false, &key()).unwrap();
    let recon = reconstruct::reconstruct(&molecule);
    assert_eq!(recon.cigar, "10M10D10M");
}

#[test]
fn s3_reference_skip_is_reconstructed_as_n_op() {
    let r = read(1000, "ACGTA", 35, vec![(1005, 1014)], false, true);
    let molecule = stitch::stitch(&[r.clone()], true, &key()).unwrap();
    // the read's own skip interval becomes part of the molecule's skipped
    // footprint even though it contributes no covered columns there
    let recon = reconstruct::reconstruct(&molecule);
    assert!(recon.cigar.contains('N'));
}

#[test]
fn s4_disagreeing_bases_yield_low_confidence_consensus() {
    let a = read(1000, "A", 35, vec![], false, true);
    let b = read(1000, "T", 35, vec![], false, true);
    let molecule = stitch::stitch(&[a, b], true, &key()).unwrap();
    assert!(molecule.qual[0] <= 4);
}

#[test]
fn s5_covered_skipped_conflict_is_flagged_and_resolved() {
    // One read's own alignment block overlaps another's intron call.
    let a = read(1000, &"A".repeat(53), 35, vec![], false, true);
    let mut b = read(1050, &"A".repeat(3), 35, vec![], false, false);
    b.skipped = vec![(1050, 1070)];
    // strip b's bases from the overlapping columns so the conflict is purely
    // about footprint classification, not base disagreement
    b.ref_positions = vec![];
    b.bases = vec![];
    b.quals = vec![];

    let molecule = stitch::stitch(&[a, b], false, &key()).unwrap();
    let recon = reconstruct::reconstruct(&molecule);
    assert!(recon.conflict);
    assert_eq!(recon.conflict_count, 3);
}

#[test]
fn s6_isoform_resolution_narrows_to_the_compatible_set() {
    let exon_index = IntervalIndex::new(vec![
        ((900, 1100), ["iso1", "iso2"].iter().map(|s| s.to_string()).collect()),
        ((1050, 1300), ["iso1", "iso3"].iter().map(|s| s.to_string()).collect()),
    ]);
    let junction_index = IntervalIndex::default();

    let mut dict: IsoformDictionary = IsoformDictionary::new();
    dict.insert("Actb".to_owned(), exon_index);
    let mut jdict: IsoformDictionary = IsoformDictionary::new();
    jdict.insert("Actb".to_owned(), junction_index);

    let r = read(1000, &"A".repeat(10), 35, vec![], false, true);
    let molecule = stitch::stitch(&[r], true, &key()).unwrap();

    let ct = umistitch::isoform::resolve(
        &molecule,
        dict.get("Actb").unwrap(),
        jdict.get("Actb").unwrap(),
    );
    assert_eq!(ct, Some("iso1".to_owned()));
}
