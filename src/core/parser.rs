use color_eyre::{Result, eyre::eyre};
use rand::seq::IndexedRandom;
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use tracing::{debug, error, trace};

/// minimum amino-acid character fraction required to classify input as amino acid.
const AMINO_ACID_CLASSIFICATION_THRESHOLD: f32 = 0.5;

/// Literal every CLUSTAL header line starts with.
pub const CLUSTAL_HEADER_PREFIX: &str = "CLUSTAL";

/// `<id><whitespace><residues>`, anything after the residues (column counters) is ignored.
static SEQUENCE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)\s+([A-Za-z-]+)(?:\s.*)?$").expect("sequence line pattern is valid")
});

/// Type of sequences in the alignment: either DNA or amino acid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceType {
    Dna,
    AminoAcid,
}

impl std::fmt::Display for SequenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SequenceType::Dna => write!(f, "DNA"),
            SequenceType::AminoAcid => write!(f, "amino acid"),
        }
    }
}

/// One aligned row: identifier plus residue/gap bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    pub id: Arc<str>,
    pub sequence: Arc<[u8]>,
}

/// Tries to classify alignments as DNA or amino acid.
///
/// Samples up to 100 random alignments, counts suspected amino acid chars, and returns `AminoAcid`
/// when their fraction is at least `AMINO_ACID_CLASSIFICATION_THRESHOLD`, otherwise falls back to `Dna`.
#[must_use]
pub fn detect_sequence_type(alignments: &[Alignment]) -> SequenceType {
    let amino_acid_chars = b"DEFHIKLMNPQRSVWY";
    let mut rng = rand::rng();
    let (amino_acid_count, total_count) = alignments.sample(&mut rng, 100).fold(
        (0, 0),
        |(amino_acid_count, total_count), alignment| {
            let sequence = alignment.sequence.as_ref();
            let amino_acid_in_sequence = sequence
                .iter()
                .filter(|&&byte| amino_acid_chars.contains(&byte.to_ascii_uppercase()))
                .count();

            (
                amino_acid_count + amino_acid_in_sequence,
                total_count + sequence.len(),
            )
        },
    );

    if total_count == 0 {
        debug!("defaulted sequence type to DNA because sampled sequences had zero total length");
        return SequenceType::Dna;
    }

    let amino_acid_fraction = amino_acid_count as f32 / total_count as f32;
    let sequence_type = if amino_acid_fraction >= AMINO_ACID_CLASSIFICATION_THRESHOLD {
        SequenceType::AminoAcid
    } else {
        SequenceType::Dna
    };
    debug!(
        amino_acid_count,
        total_count,
        amino_acid_fraction,
        sequence_type = ?sequence_type,
        "detected sequence type"
    );
    sequence_type
}

/// Returns true for consensus rows, which only contain whitespace, `*`, `:` and `.`.
fn is_conservation_line(line: &str) -> bool {
    line.chars()
        .all(|c| c.is_whitespace() || matches!(c, '*' | ':' | '.'))
}

/// A `CLUSTAL` header line: the keyword on its own or followed by whitespace, so ids that merely
/// start with `CLUSTAL` are still read as rows.
fn is_header_line(line: &str) -> bool {
    line.strip_prefix(CLUSTAL_HEADER_PREFIX)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
}

/// Parses CLUSTAL text into `Alignment`s in order of first appearance.
///
/// Residues of an id split across blocks are concatenated in file order. Header, blank and
/// conservation lines are skipped, as is any line that does not look like a sequence row, so
/// malformed input degrades to fewer (possibly zero) rows rather than an error.
#[must_use]
pub fn parse_clustal(text: &str) -> Vec<Alignment> {
    let mut order: Vec<(String, Vec<u8>)> = Vec::new();
    let mut index_by_id: HashMap<String, usize> = HashMap::new();
    let mut skipped_lines = 0usize;

    for line in text.lines() {
        if is_header_line(line) || is_conservation_line(line) {
            continue;
        }

        let Some(captures) = SEQUENCE_LINE.captures(line) else {
            trace!(line, "skipping unparseable clustal line");
            skipped_lines += 1;
            continue;
        };
        let id = &captures[1];
        let residues = captures[2].as_bytes();

        match index_by_id.get(id) {
            Some(&index) => order[index].1.extend_from_slice(residues),
            None => {
                index_by_id.insert(id.to_string(), order.len());
                order.push((id.to_string(), residues.to_vec()));
            }
        }
    }

    debug!(
        sequence_count = order.len(),
        skipped_lines, "completed clustal parse"
    );

    order
        .into_iter()
        .map(|(id, sequence)| Alignment {
            id: Arc::from(id),
            sequence: Arc::from(sequence),
        })
        .collect()
}

/// Reads the raw text of an alignment file on a blocking worker.
pub async fn read_alignment_text(path: PathBuf) -> Result<String> {
    tokio::task::spawn_blocking(move || -> Result<String> {
        std::fs::read_to_string(&path).map_err(|e| {
            error!(path = ?path, error = %e, "failed to read alignment file");
            eyre!("Failed to read file {:?}: {}", path, e)
        })
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_temp_clustal(content: &str) -> NamedTempFile {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), content).unwrap();
        temp_file
    }

    fn alignment(id: &str, sequence: &str) -> Alignment {
        Alignment {
            id: Arc::from(id),
            sequence: Arc::from(sequence.as_bytes().to_vec()),
        }
    }

    #[test]
    fn test_parse_single_block() {
        let content = "CLUSTAL W (1.83) multiple sequence alignment\n\nseq1      A-CG\nseq2      TGCA\n          *  .\n";
        let alignments = parse_clustal(content);
        assert_eq!(alignments.len(), 2);
        assert_eq!(alignments[0].id.as_ref(), "seq1");
        assert_eq!(alignments[0].sequence.as_ref(), b"A-CG");
        assert_eq!(alignments[1].id.as_ref(), "seq2");
        assert_eq!(alignments[1].sequence.as_ref(), b"TGCA");
    }

    #[test]
    fn test_parse_concatenates_blocks_in_order() {
        let content = "CLUSTAL O(1.2.4) multiple sequence alignment\n\n\
                       b_seq     ACGT\n\
                       a_seq     AC-T\n\
                       \x20         ** *\n\n\
                       b_seq     GG\n\
                       a_seq     G-\n";
        let alignments = parse_clustal(content);
        assert_eq!(
            alignments,
            vec![alignment("b_seq", "ACGTGG"), alignment("a_seq", "AC-TG-")]
        );
    }

    #[test]
    fn test_parse_ignores_trailing_column_counter() {
        let content = "CLUSTAL\n\nseq1      ACGTACGT 8\nseq2      ACGTAC-- 6\n";
        let alignments = parse_clustal(content);
        assert_eq!(alignments[0].sequence.as_ref(), b"ACGTACGT");
        assert_eq!(alignments[1].sequence.as_ref(), b"ACGTAC--");
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_clustal("").is_empty());
    }

    #[test]
    fn test_parse_garbage_yields_no_rows() {
        assert!(parse_clustal("CLUSTAL\n\n%%%% 1234\n>fasta\n").is_empty());
        assert!(parse_clustal("just_one_token\n").is_empty());
    }

    #[test]
    fn test_parse_keeps_ids_starting_with_clustal() {
        let content = "CLUSTAL\n\nCLUSTALseq   ACGT\nother   ACGT\n";
        let alignments = parse_clustal(content);
        assert_eq!(
            alignments,
            vec![alignment("CLUSTALseq", "ACGT"), alignment("other", "ACGT")]
        );
    }

    #[test]
    fn test_header_line_detection() {
        assert!(is_header_line("CLUSTAL"));
        assert!(is_header_line("CLUSTAL W (1.83) multiple sequence alignment"));
        assert!(is_header_line("CLUSTAL\tO(1.2.4)"));
        assert!(!is_header_line("CLUSTALseq   ACGT"));
        assert!(!is_header_line("seq CLUSTAL"));
    }

    #[test]
    fn test_parse_skips_conservation_only_lines() {
        let content = "seq1   ACGT\n   .:*  \n***\n";
        let alignments = parse_clustal(content);
        assert_eq!(alignments, vec![alignment("seq1", "ACGT")]);
    }

    #[tokio::test]
    async fn test_read_alignment_text() {
        let temp_file = create_temp_clustal("CLUSTAL\n");
        let text = read_alignment_text(temp_file.path().to_path_buf())
            .await
            .unwrap();
        assert_eq!(text, "CLUSTAL\n");
    }

    #[test]
    fn test_detect_sequence_type_dna() {
        let alignments = vec![alignment("seq1", "ACGTACGT"), alignment("seq2", "TGCA")];
        assert_eq!(detect_sequence_type(&alignments), SequenceType::Dna);
    }

    #[test]
    fn test_detect_sequence_type_aa() {
        let alignments = vec![
            alignment("seq1", "ACDEFGHIKLMNPQRSTVWY"),
            alignment("seq2", "acdefghiklmnpqrstvwy"),
        ];
        assert_eq!(detect_sequence_type(&alignments), SequenceType::AminoAcid);
    }

    #[test]
    fn test_detect_sequence_type_no_rows_default_to_dna() {
        assert_eq!(detect_sequence_type(&[]), SequenceType::Dna);
    }
}
