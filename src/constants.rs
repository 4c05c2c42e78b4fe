//! Error-model tables (§4.1). Precomputed once, process-wide, immutable.
//!
//! Mirrors `examples/PROSIC-libprosic/src/model/evidence/reads.rs`'s use of
//! `bio::stats::LogProb`/`PHREDProb` for numerically stable log-probability
//! arithmetic instead of raw `f64` logs.

use bio::stats::LogProb;

/// Maximum representable Phred quality, matching SAM's encoding ceiling.
pub const MAX_QUAL: u8 = 93;

/// Posterior threshold above which a column's consensus base is called
/// instead of `N` (§4.3 step 5).
pub const CONSENSUS_THRESHOLD: f64 = 0.30;

lazy_static::lazy_static! {
    /// `ll_correct[q] = ln(1 - 10^(-q/10))`, indexed by Phred quality (index 0 unused).
    pub static ref LL_CORRECT: Vec<LogProb> = {
        let mut table = vec![LogProb::ln_zero(); MAX_QUAL as usize + 1];
        for q in 1..=MAX_QUAL as usize {
            let p_err = 10f64.powf(-(q as f64) / 10.0);
            table[q] = LogProb((1.0 - p_err).ln());
        }
        table
    };

    /// `ll_wrong[q] = -(q * ln 10) / 10 - ln 3`, the log-probability of any
    /// one specific alternative base under a uniform error spread.
    pub static ref LL_WRONG: Vec<LogProb> = {
        let mut table = vec![LogProb::ln_zero(); MAX_QUAL as usize + 1];
        for q in 1..=MAX_QUAL as usize {
            table[q] = LogProb(-(q as f64 * 10f64.ln()) / 10.0 - 3f64.ln());
        }
        table
    };

    /// `ll_n = -ln 4`: an observed `N` supports all four bases equally.
    pub static ref LL_N: LogProb = LogProb(-4f64.ln());
}

/// Clamp a quality value into the table's supported range `[1, MAX_QUAL]`.
pub fn clamp_qual(q: u8) -> usize {
    (q.max(1).min(MAX_QUAL)) as usize
}
