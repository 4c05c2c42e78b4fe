use std::path::PathBuf;

use thiserror::Error;

/// Configuration and annotation errors. These are the only errors that abort
/// the process outright (§7); read- and group-level failures are recorded
/// in the sidecar log and do not produce an `Error`.
#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("input BAM not found, unreadable, or missing an index: {path}")]
    InvalidInput { path: PathBuf },
    #[error("GTF file not found or unreadable: {path}")]
    InvalidGtf { path: PathBuf },
    #[error("isoform index file not found or unreadable: {path}")]
    InvalidIsoformIndex { path: PathBuf },
    #[error("unable to open output BAM at {path}")]
    InvalidOutput { path: PathBuf },
    #[error("--isoform and --junction are required unless --skip-iso is given")]
    MissingIsoformArgs,
    #[error("unknown gene identifier attribute {name}, expected gene_id or gene_name")]
    InvalidGeneIdentifier { name: String },
    #[error("whitelist file not found or unreadable: {path}")]
    InvalidWhitelist { path: PathBuf },
    #[error("contig {contig} given via --contig is absent from the BAM header")]
    UnknownContig { contig: String },
}
