use crate::core::parser::Alignment;

/// Header emitted on every rebuilt alignment, whatever the input header was.
pub const CLUSTAL_HEADER: &str = "CLUSTAL O(1.2.4) multiple sequence alignment";
/// Residue columns per block.
pub const BLOCK_WIDTH: usize = 60;
/// Narrowest id column before the gutter is added.
pub const MIN_ID_WIDTH: usize = 10;
/// Spaces between the id column and the residues.
pub const ID_GUTTER: usize = 6;

/// Serialises `alignments` as CLUSTAL text.
///
/// Each row is the id left-justified in a column of `max(longest id, MIN_ID_WIDTH) + ID_GUTTER`
/// characters followed by a `BLOCK_WIDTH` slice of residues. The block count follows the longest
/// sequence; rows are not padded, so shorter sequences give shorter or empty trailing slices.
/// Returns an empty string when there is nothing to write.
#[must_use]
pub fn write_clustal(alignments: &[Alignment]) -> String {
    if alignments.is_empty() {
        return String::new();
    }

    let id_width = alignments
        .iter()
        .map(|alignment| alignment.id.chars().count())
        .max()
        .unwrap_or(0)
        .max(MIN_ID_WIDTH)
        + ID_GUTTER;
    let longest = alignments
        .iter()
        .map(|alignment| alignment.sequence.len())
        .max()
        .unwrap_or(0);

    let blocks: Vec<String> = (0..longest)
        .step_by(BLOCK_WIDTH)
        .map(|start| {
            alignments
                .iter()
                .map(|alignment| {
                    let sequence = alignment.sequence.as_ref();
                    let end = (start + BLOCK_WIDTH).min(sequence.len());
                    let slice = sequence.get(start..end).unwrap_or_default();
                    format!(
                        "{:<id_width$}{}",
                        alignment.id,
                        String::from_utf8_lossy(slice)
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect();

    let mut output = String::with_capacity(CLUSTAL_HEADER.len() + 2);
    output.push_str(CLUSTAL_HEADER);
    output.push_str("\n\n");
    output.push_str(&blocks.join("\n\n"));
    output.push('\n');
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn alignment(id: &str, sequence: &str) -> Alignment {
        Alignment {
            id: Arc::from(id),
            sequence: Arc::from(sequence.as_bytes().to_vec()),
        }
    }

    #[test]
    fn test_empty_writes_nothing() {
        assert_eq!(write_clustal(&[]), "");
    }

    #[test]
    fn test_short_ids_use_minimum_width() {
        let text = write_clustal(&[alignment("seq1", "AC-T"), alignment("seq2", "ACGT")]);
        insta::assert_snapshot!(text, @r"
        CLUSTAL O(1.2.4) multiple sequence alignment

        seq1            AC-T
        seq2            ACGT
        ");
    }

    #[test]
    fn test_id_column_follows_longest_id() {
        let text = write_clustal(&[
            alignment("000_Trp53_NM_011640.3", "ACGT"),
            alignment("x", "A-GT"),
        ]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[2], format!("{:<27}ACGT", "000_Trp53_NM_011640.3"));
        assert_eq!(lines[3], format!("{:<27}A-GT", "x"));
    }

    #[test]
    fn test_blocks_of_sixty_with_short_final_block() {
        let long = "A".repeat(60) + &"C".repeat(60) + "GGG";
        let text = write_clustal(&[alignment("seq1", &long), alignment("seq2", &long)]);
        let blocks: Vec<&str> = text.trim_end().split("\n\n").collect();

        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0], CLUSTAL_HEADER);
        assert_eq!(
            blocks[1],
            format!("seq1{}{}\nseq2{}{}", " ".repeat(12), "A".repeat(60), " ".repeat(12), "A".repeat(60))
        );
        assert!(blocks[2].lines().all(|line| line.ends_with(&"C".repeat(60))));
        assert_eq!(blocks[3], format!("seq1{0}GGG\nseq2{0}GGG", " ".repeat(12)));
    }

    #[test]
    fn test_exact_multiple_has_no_empty_block() {
        let text = write_clustal(&[alignment("seq1", &"T".repeat(120))]);
        assert_eq!(text.trim_end().split("\n\n").count(), 3);
        assert!(text.ends_with(&format!("{}\n", "T".repeat(60))));
    }

    #[test]
    fn test_ragged_rows_are_not_padded() {
        let text = write_clustal(&[
            alignment("long", &"A".repeat(61)),
            alignment("short", &"A".repeat(3)),
        ]);
        let last_block = text.trim_end_matches('\n').rsplit("\n\n").next().unwrap();
        assert_eq!(
            last_block,
            format!("long{}A\nshort{}", " ".repeat(12), " ".repeat(11))
        );
    }
}
