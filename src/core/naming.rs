//! Sequence identifier conventions.
//!
//! Submitted rows are named `{index}_{gene}_{transcript}[_{suffix}]`. The zero-padded index only
//! orders the submission, so the remainder (the base name) is what identifies a transcript.

use regex::Regex;
use std::sync::LazyLock;
use tracing::trace;

static NUMERIC_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+_").expect("numeric prefix pattern is valid"));

static VARIANT_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)_alt\d+$").expect("variant suffix pattern is valid"));

/// Prefixes of transcript/gene identifiers that survive an underscore split intact.
const TRANSCRIPT_PREFIXES: [&str; 10] = [
    "ENSMUST", "ENSMUSG", "ENST", "ENSG", "WBGene", "FBgn", "FBtr", "ZDB-", "SGD:", "RGD:",
];

/// RefSeq accession prefixes, which carry their own underscore (`NM_011640.3`).
const REFSEQ_PREFIXES: [&str; 4] = ["NM", "NR", "XM", "XR"];

/// Minimum length of a bare numeric token treated as a transcript identifier.
const MIN_NUMERIC_TRANSCRIPT_LEN: usize = 6;

/// Outcome of classifying a sequence by its name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameClass {
    /// Base name ends in an `_alt<digits>` suffix.
    Variant,
    Reference(ReferenceEvidence),
}

/// Why a name was classified as a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceEvidence {
    /// A transcript identifier terminates the name (optionally followed by a version token).
    TranscriptTerminal,
    /// Nothing conclusive was found.
    Default,
}

impl NameClass {
    #[must_use]
    pub fn is_reference(self) -> bool {
        matches!(self, NameClass::Reference(_))
    }
}

/// Strips the leading `\d+_` ordinal from `id`.
#[must_use]
pub fn base_name(id: &str) -> &str {
    NUMERIC_PREFIX
        .find(id)
        .map_or(id, |prefix| &id[prefix.end()..])
}

/// Splits a base name on `_`, keeping RefSeq accessions (`NM_011640.3`) as one token.
fn tokenize(base: &str) -> Vec<String> {
    let parts: Vec<&str> = base.split('_').collect();
    let mut tokens = Vec::with_capacity(parts.len());
    let mut index = 0;

    while index < parts.len() {
        let part = parts[index];
        if REFSEQ_PREFIXES.contains(&part) && index + 1 < parts.len() {
            tokens.push(format!("{part}_{}", parts[index + 1]));
            index += 2;
        } else {
            tokens.push(part.to_string());
            index += 1;
        }
    }

    tokens
}

fn is_transcript_token(token: &str) -> bool {
    REFSEQ_PREFIXES
        .iter()
        .any(|prefix| token.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('_')))
        || TRANSCRIPT_PREFIXES
            .iter()
            .any(|prefix| token.starts_with(prefix))
        || (token.len() >= MIN_NUMERIC_TRANSCRIPT_LEN && token.bytes().all(|b| b.is_ascii_digit()))
}

fn is_version_token(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// Classifies a sequence id from its name when no metadata describes it.
///
/// This is best effort: names that merely happen to end in `_alt<digits>` are reported as
/// variants, and anything undetermined is a reference.
#[must_use]
pub fn classify_by_name(id: &str) -> NameClass {
    let base = base_name(id);
    if VARIANT_SUFFIX.is_match(base) {
        trace!(id, base, "name carries variant suffix");
        return NameClass::Variant;
    }

    let tokens = tokenize(base);
    let terminal = match tokens.as_slice() {
        [.., last] if is_transcript_token(last) => true,
        [.., transcript, version] => is_transcript_token(transcript) && is_version_token(version),
        _ => false,
    };

    let evidence = if terminal {
        ReferenceEvidence::TranscriptTerminal
    } else {
        ReferenceEvidence::Default
    };
    trace!(id, base, evidence = ?evidence, "name classified as reference");
    NameClass::Reference(evidence)
}
