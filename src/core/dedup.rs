use crate::core::metadata::MetadataMap;
use crate::core::naming::{self, NameClass};
use crate::core::parser::{self, Alignment};
use crate::core::writer;
use std::collections::HashSet;
use tracing::{debug, trace};

/// Whether a row is an unmodified transcript or carries embedded variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Reference,
    Variant,
}

/// Where a row's classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationSource {
    Metadata,
    Name,
}

/// Result of [`deduplicate`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DedupOutput {
    /// Rebuilt CLUSTAL text, empty when the input had no parseable rows.
    pub alignment_text: String,
    /// Input metadata restricted to surviving ids.
    pub metadata: MetadataMap,
    pub duplicates_removed: usize,
}

/// Classifies one row, preferring metadata over the naming heuristic.
#[must_use]
pub fn classify(id: &str, metadata: &MetadataMap) -> (RowKind, ClassificationSource) {
    if let Some(entry) = metadata.get(id) {
        let kind = if entry.is_reference() {
            RowKind::Reference
        } else {
            RowKind::Variant
        };
        return (kind, ClassificationSource::Metadata);
    }

    let kind = match naming::classify_by_name(id) {
        NameClass::Variant => RowKind::Variant,
        NameClass::Reference(_) => RowKind::Reference,
    };
    (kind, ClassificationSource::Name)
}

/// Drops reference rows whose base name was already seen, first occurrence wins.
///
/// Variant rows are always kept. Returns the surviving rows in input order and the number of
/// rows dropped.
#[must_use]
pub fn remove_duplicate_references(
    alignments: Vec<Alignment>,
    metadata: &MetadataMap,
) -> (Vec<Alignment>, usize) {
    let mut seen_references: HashSet<String> = HashSet::new();
    let mut duplicates_removed = 0usize;
    let mut kept = Vec::with_capacity(alignments.len());

    for alignment in alignments {
        let (kind, source) = classify(&alignment.id, metadata);
        if kind == RowKind::Variant {
            trace!(id = %alignment.id, source = ?source, "keeping variant row");
            kept.push(alignment);
            continue;
        }

        let base = naming::base_name(&alignment.id);
        if seen_references.contains(base) {
            trace!(id = %alignment.id, base, source = ?source, "dropping duplicate reference row");
            duplicates_removed += 1;
            continue;
        }

        seen_references.insert(base.to_string());
        kept.push(alignment);
    }

    (kept, duplicates_removed)
}

/// Removes duplicate reference rows from a CLUSTAL alignment.
///
/// Rows are classified from `metadata` when it has an entry for the id, otherwise from the id
/// itself. References sharing a base name collapse to the first one, variants are always kept.
/// The result is rebuilt as CLUSTAL text with a fixed header, alongside the metadata of the
/// surviving rows. Never fails: text without parseable rows gives the empty result.
#[must_use]
pub fn deduplicate(alignment_text: &str, metadata: &MetadataMap) -> DedupOutput {
    let alignments = parser::parse_clustal(alignment_text);
    if alignments.is_empty() {
        debug!("no sequences parsed, returning empty deduplication result");
        return DedupOutput::default();
    }

    let input_count = alignments.len();
    let (kept, duplicates_removed) = remove_duplicate_references(alignments, metadata);

    let pruned_metadata: MetadataMap = kept
        .iter()
        .filter_map(|alignment| {
            metadata
                .get_key_value(alignment.id.as_ref())
                .map(|(id, entry)| (id.clone(), entry.clone()))
        })
        .collect();

    debug!(
        input_count,
        kept_count = kept.len(),
        duplicates_removed,
        metadata_entries = pruned_metadata.len(),
        "deduplicated alignment"
    );

    DedupOutput {
        alignment_text: writer::write_clustal(&kept),
        metadata: pruned_metadata,
        duplicates_removed,
    }
}
