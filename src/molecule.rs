//! The master molecule (§3): the kernel's output bundle.

use crate::interval::GenomicIntervals;
use crate::read::GroupKey;

/// Bundle of consensus sequence/quality, the three footprints, strand and
/// read-count metadata, and the originating key, per §3.
#[derive(Debug, Clone)]
pub struct MasterMolecule {
    pub key: GroupKey,
    pub ref_name: String,
    pub is_reverse: bool,
    pub covered: GenomicIntervals,
    pub skipped: GenomicIntervals,
    pub deleted: GenomicIntervals,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
    pub nr: u32,
    pub ir: u32,
    pub er: u32,
}
