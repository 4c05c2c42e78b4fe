//! Read (input view), §3. Converts a `rust_htslib::bam::Record` into the
//! flattened per-base view the stitcher kernel operates on, applying the
//! read-level drops of §6/§7.

use rust_htslib::bam;
use rust_htslib::bam::record::Cigar;

/// One aligned fragment, reduced to exactly what the kernel needs: reference
/// positions with insertions stripped so bases/quals/ref_positions stay
/// parallel, the read's skipped (intron) intervals, and the tag-derived
/// grouping/strand metadata.
#[derive(Debug, Clone)]
pub struct AlignedRead {
    pub ref_name: String,
    pub ref_positions: Vec<i64>,
    pub bases: Vec<u8>,
    pub quals: Vec<u8>,
    pub skipped: Vec<(i64, i64)>,
    pub is_reverse: bool,
    pub is_read1: bool,
    pub exonic: bool,
    pub intronic: bool,
    pub cell: String,
    pub gene: String,
    pub umi: String,
}

/// Reasons a read is silently dropped before grouping (§7, read-level drops).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drop {
    Unmapped,
    MateUnmapped,
    NotProperPair,
    MissingCell,
    MissingOrEmptyUmi,
    AmbiguousGene,
    Unassigned,
}

/// Read a string-valued aux tag, following
/// `examples/PROSIC-libprosic/src/model/evidence/reads.rs`'s
/// `record.aux(b"XA")` / `.string()` pattern.
fn string_tag(record: &bam::Record, tag: &[u8]) -> Option<String> {
    record
        .aux(tag)
        .map(|aux| String::from_utf8_lossy(aux.string()).into_owned())
}

/// Resolve the gene tag per §3's "read group key" rule: exon-gene if both
/// agree, whichever is assigned if only one is, `None` (drop) if they
/// disagree.
fn resolve_gene(exon: Option<&str>, intron: Option<&str>) -> Option<String> {
    match (exon, intron) {
        (Some(e), Some(i)) if e == i => Some(e.to_owned()),
        (Some(e), None) => Some(e.to_owned()),
        (None, Some(i)) => Some(i.to_owned()),
        (Some(_), Some(_)) => None,
        (None, None) => None,
    }
}

/// Extract the skipped (intron) intervals implied by `N` CIGAR operations,
/// as `(ref_pos_before_skip + 1, ref_pos_after_skip - 1)` inclusive tuples.
fn skipped_intervals(cigar: &bam::record::CigarStringView) -> Vec<(i64, i64)> {
    let mut ref_pos = cigar.pos();
    let mut skipped = Vec::new();
    for op in cigar.iter() {
        match op {
            Cigar::Match(len) | Cigar::Equal(len) | Cigar::Diff(len) => {
                ref_pos += *len as i64;
            }
            Cigar::Del(len) => {
                ref_pos += *len as i64;
            }
            Cigar::RefSkip(len) => {
                let before = ref_pos - 1;
                let after = ref_pos + *len as i64;
                skipped.push((before + 1, after - 1));
                ref_pos += *len as i64;
            }
            Cigar::Ins(_) | Cigar::SoftClip(_) | Cigar::HardClip(_) | Cigar::Pad(_) => {}
        }
    }
    skipped
}

/// Walk the CIGAR, pairing each reference-consuming, query-consuming base
/// with its reference position (insertions and clips contribute no entry).
fn aligned_bases(
    cigar: &bam::record::CigarStringView,
    seq: &bam::record::Seq,
    qual: &[u8],
) -> (Vec<i64>, Vec<u8>, Vec<u8>) {
    let mut ref_pos = cigar.pos();
    let mut qpos: usize = 0;
    let mut positions = Vec::new();
    let mut bases = Vec::new();
    let mut quals = Vec::new();

    for op in cigar.iter() {
        match op {
            Cigar::Match(len) | Cigar::Equal(len) | Cigar::Diff(len) => {
                for _ in 0..*len {
                    positions.push(ref_pos);
                    bases.push(seq[qpos]);
                    quals.push(qual[qpos]);
                    ref_pos += 1;
                    qpos += 1;
                }
            }
            Cigar::Ins(len) | Cigar::SoftClip(len) => {
                qpos += *len as usize;
            }
            Cigar::Del(len) | Cigar::RefSkip(len) => {
                ref_pos += *len as i64;
            }
            Cigar::HardClip(_) | Cigar::Pad(_) => {}
        }
    }
    (positions, bases, quals)
}

/// Extract the [`AlignedRead`] view from a BAM record, or the [`Drop`]
/// reason it was excluded for (§6/§7). `record` must belong to `ref_name`'s
/// reference (the caller fetched it from there).
pub fn extract(
    record: &bam::Record,
    ref_name: &str,
    umi_tag: &str,
    single_end: bool,
) -> Result<AlignedRead, Drop> {
    if record.is_unmapped() {
        return Err(Drop::Unmapped);
    }
    if !single_end {
        if !record.is_paired() || record.is_mate_unmapped() {
            return Err(Drop::MateUnmapped);
        }
        if !record.is_proper_pair() {
            return Err(Drop::NotProperPair);
        }
    }

    let cell = string_tag(record, b"BC").ok_or(Drop::MissingCell)?;
    let umi = string_tag(record, umi_tag.as_bytes())
        .filter(|u| !u.is_empty())
        .ok_or(Drop::MissingOrEmptyUmi)?;

    let exon = string_tag(record, b"GE");
    let intron = string_tag(record, b"GI");
    let has_exon = exon.is_some();
    let has_intron = intron.is_some();
    let gene = match resolve_gene(exon.as_deref(), intron.as_deref()) {
        Some(g) => g,
        None if has_exon && has_intron => return Err(Drop::AmbiguousGene),
        None => return Err(Drop::Unassigned),
    };

    let cigar = record.cigar();
    let seq = record.seq();
    let qual = record.qual();
    let (ref_positions, bases, quals) = aligned_bases(&cigar, &seq, qual);
    let skipped = skipped_intervals(&cigar);

    Ok(AlignedRead {
        ref_name: ref_name.to_owned(),
        ref_positions,
        bases,
        quals,
        skipped,
        is_reverse: record.is_reverse(),
        is_read1: record.is_read1(),
        exonic: has_exon,
        intronic: has_intron,
        cell,
        gene,
        umi,
    })
}

/// The `(cell, gene, umi)` read group key (§3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub cell: String,
    pub gene: String,
    pub umi: String,
}

impl GroupKey {
    pub fn new(cell: impl Into<String>, gene: impl Into<String>, umi: impl Into<String>) -> Self {
        GroupKey {
            cell: cell.into(),
            gene: gene.into(),
            umi: umi.into(),
        }
    }

    /// `gene:cell:umi`, the key format used in the sidecar error log (§6).
    pub fn log_key(&self) -> String {
        format!("{}:{}:{}", self.gene, self.cell, self.umi)
    }
}
