//! Alignment file I/O (§4.8): indexed BAM reading per worker, consensus BAM
//! writing, the sidecar error log, and the isoform/junction index JSON format
//! (§6). Grounded in `examples/original_source/stitcher.py`'s
//! `create_write_function` and `construct_stitched_molecules`'s
//! `json.load(...)` + `P.from_string(...)` isoform/junction loading, and the
//! teacher's `bam::IndexedReader` usage.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use rust_htslib::bam;
use rust_htslib::bam::Read as BamRead;

use crate::errors::Error;
use crate::isoform::{IntervalIndex, IsoformDictionary};

/// Open an indexed BAM reader, failing fast if the index is missing (§4.8).
pub fn open_indexed(path: &Path) -> Result<bam::IndexedReader, Error> {
    bam::IndexedReader::from_path(path).map_err(|_| Error::InvalidInput {
        path: path.to_owned(),
    })
}

/// Open a BAM writer at `path` whose header is `template`'s header plus a
/// `@PG` line recording this invocation, following the teacher's
/// `bin/varlociraptor.rs` writer setup.
pub fn open_writer(
    path: &Path,
    template: &bam::IndexedReader,
    pg_line: &str,
) -> Result<bam::Writer, Error> {
    let mut header = bam::Header::from_template(template.header());
    let mut pg = bam::header::HeaderRecord::new(b"PG");
    pg.push_tag(b"ID", "umistitch");
    pg.push_tag(b"CL", pg_line);
    header.push_record(&pg);

    bam::Writer::from_path(path, &header, bam::Format::Bam).map_err(|_| Error::InvalidOutput {
        path: path.to_owned(),
    })
}

/// One contig's size, read from the BAM header (used to resolve a `--contig`
/// restriction into a fetch region and to validate it exists, §6).
pub fn contig_names(reader: &bam::IndexedReader) -> HashSet<String> {
    reader
        .header()
        .target_names()
        .into_iter()
        .map(|n| String::from_utf8_lossy(n).into_owned())
        .collect()
}

/// Parse a `[a,b]`-style closed-interval string into its endpoints (§6),
/// following `portion`'s `P.from_string` textual form that
/// `construct_stitched_molecules` reads back with `conv=int`.
fn parse_interval_string(s: &str) -> Option<(i64, i64)> {
    let trimmed = s.trim().trim_start_matches(['[', '(']).trim_end_matches([']', ')']);
    let mut parts = trimmed.splitn(2, ',');
    let start: i64 = parts.next()?.trim().parse().ok()?;
    let end: i64 = parts.next()?.trim().parse().ok()?;
    Some((start, end))
}

/// Load an isoform or junction index (§6): a JSON object mapping
/// `gene_id -> { interval_string: comma_joined_isoform_set }`, matching
/// `stitcher.py`'s `isoform_unique_intervals`/`refskip_unique_intervals`
/// (loaded there with `json.load` and indexed per gene before being handed to
/// `assemble_reads`).
pub fn load_interval_index(path: &Path) -> Result<IsoformDictionary, Error> {
    let file = File::open(path).map_err(|_| Error::InvalidIsoformIndex {
        path: path.to_owned(),
    })?;

    let raw: HashMap<String, HashMap<String, String>> = serde_json::from_reader(BufReader::new(file))
        .map_err(|_| Error::InvalidIsoformIndex {
            path: path.to_owned(),
        })?;

    let mut per_gene = IsoformDictionary::new();
    for (gene, intervals) in raw {
        let mut entries = Vec::new();
        for (interval_str, isoforms) in intervals {
            let bounds = parse_interval_string(&interval_str).ok_or_else(|| Error::InvalidIsoformIndex {
                path: path.to_owned(),
            })?;
            let isoform_set: HashSet<String> = isoforms.split(',').map(|s| s.to_owned()).collect();
            entries.push((bounds, isoform_set));
        }
        per_gene.insert(gene, IntervalIndex::new(entries));
    }

    Ok(per_gene)
}

/// The sidecar error log (§6): one `gene:cell:umi  reason` line per dropped
/// group, plus a trailing `Gene:<gene_id>` line marking the end of each
/// gene's batch.
pub struct ErrorLog {
    writer: BufWriter<File>,
}

impl ErrorLog {
    pub fn create(path: &Path) -> Result<Self, Error> {
        let file = File::create(path).map_err(|_| Error::InvalidOutput {
            path: path.to_owned(),
        })?;
        Ok(ErrorLog {
            writer: BufWriter::new(file),
        })
    }

    pub fn record_drop(&mut self, log_key: &str, reason: &str) {
        let _ = writeln!(self.writer, "{}\t{}", log_key, reason);
    }

    pub fn end_gene(&mut self, gene_id: &str) {
        let _ = writeln!(self.writer, "Gene:{}", gene_id);
    }
}

/// Derive the sidecar log path from the output BAM path: `<stem>_error.log`
/// alongside it (§6).
pub fn error_log_path(output_bam: &Path) -> std::path::PathBuf {
    let stem = output_bam
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_owned());
    let mut path = output_bam.to_owned();
    path.set_file_name(format!("{}_error.log", stem));
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_log_path_appends_suffix_to_stem() {
        let p = error_log_path(Path::new("/tmp/out.bam"));
        assert_eq!(p, Path::new("/tmp/out_error.log"));
    }

    #[test]
    fn parses_interval_string() {
        assert_eq!(parse_interval_string("[100,200]"), Some((100, 200)));
        assert_eq!(parse_interval_string(" [5,9] "), Some((5, 9)));
    }

    #[test]
    fn parses_nested_gene_interval_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idx.json");
        let mut f = File::create(&path).unwrap();
        writeln!(
            f,
            r#"{{"Actb": {{"[100,200]": "iso1,iso2", "[300,400]": "iso1"}}}}"#
        )
        .unwrap();
        drop(f);

        let idx = load_interval_index(&path).unwrap();
        assert!(idx.contains_key("Actb"));
        assert!(!idx.contains_key("Gapdh"));
    }
}
