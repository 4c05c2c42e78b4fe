//! GTF gene-table loader (§4.6, SPEC_FULL). Reads only `gene` feature rows
//! and extracts the gene identifier via a configurable attribute regex, with
//! a positional fallback when the regex fails to match — following
//! `examples/original_source/stitcher.py`'s `construct_stitched_molecules`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use regex::Regex;

use crate::errors::Error;

/// Which GTF attribute identifies a gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneIdentifier {
    GeneId,
    GeneName,
}

impl std::str::FromStr for GeneIdentifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gene_id" => Ok(GeneIdentifier::GeneId),
            "gene_name" => Ok(GeneIdentifier::GeneName),
            other => Err(Error::InvalidGeneIdentifier {
                name: other.to_owned(),
            }),
        }
    }
}

/// One `gene` feature row's coordinates, as consulted by the dispatcher to
/// restrict a worker's BAM fetch to the gene's span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneEntry {
    pub gene_id: String,
    pub seqid: String,
    pub start: u32,
    pub end: u32,
}

lazy_static::lazy_static! {
    static ref GENE_ID_RE: Regex = Regex::new(r#"gene_id\s+"([^;"]*)""#).unwrap();
    static ref GENE_NAME_RE: Regex = Regex::new(r#"gene_name\s+"([^;"]*)""#).unwrap();
}

/// Extract the gene identifier attribute from a GTF attributes field, using
/// the regex for `identifier` first, falling back to the second
/// whitespace-separated token of the raw attributes string (stripped of
/// `"` and trailing `;`/`\n`) if the regex does not match (§6).
fn extract_gene_id(identifier: GeneIdentifier, attributes: &str) -> Option<String> {
    let re = match identifier {
        GeneIdentifier::GeneId => &*GENE_ID_RE,
        GeneIdentifier::GeneName => &*GENE_NAME_RE,
    };
    if let Some(caps) = re.captures(attributes) {
        return Some(caps[1].to_owned());
    }
    attributes
        .split_whitespace()
        .nth(1)
        .map(|tok| tok.trim_matches('"').trim_end_matches(&[';', '\n'][..]).to_owned())
}

/// Load the `gene_id -> GeneEntry` table from a GTF file, restricted to
/// `contig` if given (§6).
pub fn load_gene_table<P: AsRef<Path>>(
    path: P,
    identifier: GeneIdentifier,
    contig: Option<&str>,
) -> Result<HashMap<String, GeneEntry>, Error> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|_| Error::InvalidGtf {
        path: path.to_owned(),
    })?;

    let mut genes = HashMap::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|_| Error::InvalidGtf {
            path: path.to_owned(),
        })?;
        if line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.splitn(9, '\t').collect();
        if fields.len() < 9 {
            continue;
        }
        let seqid = fields[0];
        let feature = fields[2];
        if feature != "gene" {
            continue;
        }
        if let Some(c) = contig {
            if seqid != c {
                continue;
            }
        }
        let (start, end) = match (fields[3].parse(), fields[4].parse()) {
            (Ok(s), Ok(e)) => (s, e),
            _ => continue,
        };
        let gene_id = match extract_gene_id(identifier, fields[8]) {
            Some(id) => id,
            None => continue,
        };
        genes.insert(
            gene_id.clone(),
            GeneEntry {
                gene_id,
                seqid: seqid.to_owned(),
                start,
                end,
            },
        );
    }
    Ok(genes)
}

/// Load a newline-separated whitelist file (cells or genes, §6).
pub fn load_whitelist<P: AsRef<Path>>(path: P) -> Result<std::collections::HashSet<String>, Error> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|_| Error::InvalidWhitelist {
        path: path.to_owned(),
    })?;
    let mut set = std::collections::HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|_| Error::InvalidWhitelist {
            path: path.to_owned(),
        })?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            set.insert(trimmed.to_owned());
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn extracts_gene_id_via_regex() {
        let attrs = r#"gene_id "ENSG001"; gene_name "Actb";"#;
        assert_eq!(
            extract_gene_id(GeneIdentifier::GeneId, attrs),
            Some("ENSG001".to_owned())
        );
        assert_eq!(
            extract_gene_id(GeneIdentifier::GeneName, attrs),
            Some("Actb".to_owned())
        );
    }

    #[test]
    fn falls_back_to_positional_token_when_regex_fails() {
        let attrs = r#"ENSG001; gene_name "Actb";"#;
        assert_eq!(
            extract_gene_id(GeneIdentifier::GeneId, attrs),
            Some("gene_name".to_owned())
        );
    }

    #[test]
    fn gene_identifier_rejects_unknown_attribute() {
        assert!("transcript_id".parse::<GeneIdentifier>().is_err());
    }

    #[test]
    fn load_gene_table_keeps_only_gene_rows_on_the_requested_contig() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genes.gtf");
        let mut f = File::create(&path).unwrap();
        writeln!(
            f,
            "chr1\tsrc\tgene\t100\t200\t.\t+\t.\tgene_id \"Actb\"; gene_name \"Actb\";"
        )
        .unwrap();
        writeln!(
            f,
            "chr1\tsrc\ttranscript\t100\t200\t.\t+\t.\tgene_id \"Actb\";"
        )
        .unwrap();
        writeln!(
            f,
            "chr2\tsrc\tgene\t1\t50\t.\t+\t.\tgene_id \"Gapdh\";"
        )
        .unwrap();
        drop(f);

        let all = load_gene_table(&path, GeneIdentifier::GeneId, None).unwrap();
        assert_eq!(all.len(), 2);

        let restricted = load_gene_table(&path, GeneIdentifier::GeneId, Some("chr1")).unwrap();
        assert_eq!(restricted.len(), 1);
        assert!(restricted.contains_key("Actb"));
    }

    #[test]
    fn load_whitelist_trims_and_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.txt");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "AAAACCCCGGGGTTTT").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "  TTTTGGGGCCCCAAAA  ").unwrap();
        drop(f);

        let set = load_whitelist(&path).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("AAAACCCCGGGGTTTT"));
        assert!(set.contains("TTTTGGGGCCCCAAAA"));
    }
}
