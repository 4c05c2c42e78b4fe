use std::path::PathBuf;

use serde_derive::{Deserialize, Serialize};
use structopt::StructOpt;

use crate::errors::Error;
use crate::gtf::GeneIdentifier;

/// Stitch single-cell RNA-seq reads sharing a cell/UMI/gene key into
/// consensus molecule alignments.
#[derive(Debug, StructOpt, Serialize, Deserialize, Clone)]
#[structopt(
    name = "stitcher",
    about = "Collapse UMI-tagged read groups into consensus molecules.",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
pub struct Opt {
    /// Indexed input BAM, tagged with cell barcode, UMI, and gene.
    #[structopt(long, parse(from_os_str))]
    pub input: PathBuf,

    /// Output BAM for the stitched consensus molecules.
    #[structopt(long, parse(from_os_str))]
    pub output: PathBuf,

    /// GTF annotation used to build the gene coordinate table.
    #[structopt(long, parse(from_os_str))]
    pub gtf: PathBuf,

    /// Exon-coverage interval index, required unless --skip-iso is given.
    #[structopt(long, parse(from_os_str))]
    pub isoform: Option<PathBuf>,

    /// Splice-junction interval index, required unless --skip-iso is given.
    #[structopt(long, parse(from_os_str))]
    pub junction: Option<PathBuf>,

    /// Worker thread count.
    #[structopt(long, default_value = "1")]
    pub threads: usize,

    /// Treat the input as single-end (skip mate-pairing checks).
    #[structopt(long)]
    pub single_end: bool,

    /// Skip isoform-compatibility resolution; omit the CT tag.
    #[structopt(long)]
    pub skip_iso: bool,

    /// UMI aux tag name.
    #[structopt(long, default_value = "UB")]
    pub umi_tag: String,

    /// Newline-separated cell-barcode whitelist restricting which cells are
    /// stitched.
    #[structopt(long, parse(from_os_str))]
    pub cells: Option<PathBuf>,

    /// Newline-separated gene whitelist restricting which genes are
    /// stitched.
    #[structopt(long, parse(from_os_str))]
    pub genes: Option<PathBuf>,

    /// Restrict processing to a single contig.
    #[structopt(long)]
    pub contig: Option<String>,

    /// Which GTF attribute identifies a gene: gene_id or gene_name.
    #[structopt(long, default_value = "gene_id")]
    pub gene_identifier: String,
}

impl Opt {
    pub fn gene_identifier(&self) -> Result<GeneIdentifier, Error> {
        self.gene_identifier.parse()
    }

    /// The command line as it will be recorded in the output BAM's `@PG` line.
    pub fn command_line(&self) -> String {
        std::env::args().collect::<Vec<_>>().join(" ")
    }
}

/// Run the stitcher end to end against a parsed [`Opt`] (§4.7).
pub fn run(opt: Opt) -> Result<(), Error> {
    if !opt.skip_iso && (opt.isoform.is_none() || opt.junction.is_none()) {
        return Err(Error::MissingIsoformArgs);
    }
    crate::dispatch::run(&opt)
}
