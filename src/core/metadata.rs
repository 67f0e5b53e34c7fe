use color_eyre::{Result, eyre::eyre};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, error, warn};

/// Per-sequence metadata keyed by sequence id.
pub type MetadataMap = BTreeMap<String, SequenceMetadata>;

/// How a variant changes the transcript at its position range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstitutionKind {
    Substitution,
    Deletion,
    Insertion,
    Other(String),
}

impl From<String> for SubstitutionKind {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "substitution" => SubstitutionKind::Substitution,
            "deletion" => SubstitutionKind::Deletion,
            "insertion" => SubstitutionKind::Insertion,
            _ => SubstitutionKind::Other(value),
        }
    }
}

impl<'de> Deserialize<'de> for SubstitutionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(SubstitutionKind::from)
    }
}

/// A variant embedded into a sequence row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EmbeddedVariant {
    /// First affected alignment column, 1-based inclusive.
    pub start: usize,
    /// Last affected alignment column, 1-based inclusive.
    pub end: usize,
    #[serde(rename = "type", alias = "kind", alias = "substitutionType")]
    pub kind: SubstitutionKind,
    #[serde(default, alias = "identifiers")]
    pub ids: Vec<String>,
}

/// A `Vec` that always holds at least one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyVec<T> {
    first: T,
    rest: Vec<T>,
}

impl<T> NonEmptyVec<T> {
    /// Returns `None` for an empty `items`.
    #[must_use]
    pub fn from_vec(items: Vec<T>) -> Option<Self> {
        let mut items = items.into_iter();
        let first = items.next()?;
        Some(Self {
            first,
            rest: items.collect(),
        })
    }

    #[must_use]
    pub fn first(&self) -> &T {
        &self.first
    }

    #[must_use]
    pub fn len(&self) -> usize {
        1 + self.rest.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        std::iter::once(&self.first).chain(self.rest.iter())
    }
}

/// One entry of a variant list.
///
/// Entries that do not decode as an [`EmbeddedVariant`] are kept as their JSON value: they still
/// mark the row as a variant holder.
#[derive(Debug, Clone, PartialEq)]
pub enum VariantRecord {
    Parsed(EmbeddedVariant),
    Unrecognised(Value),
}

impl VariantRecord {
    fn from_value(value: Value) -> Self {
        match EmbeddedVariant::deserialize(&value) {
            Ok(variant) => VariantRecord::Parsed(variant),
            Err(e) => {
                warn!(error = %e, "keeping unrecognised variant record as raw json");
                VariantRecord::Unrecognised(value)
            }
        }
    }

    #[must_use]
    pub fn parsed(&self) -> Option<&EmbeddedVariant> {
        match self {
            VariantRecord::Parsed(variant) => Some(variant),
            VariantRecord::Unrecognised(_) => None,
        }
    }
}

/// What the metadata says about a row.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceInfo {
    /// No embedded variants.
    Reference,
    VariantHolder { variants: NonEmptyVec<VariantRecord> },
}

/// Keys a variant list may be stored under, in lookup order.
const VARIANT_KEYS: [&str; 3] = ["variants", "embeddedVariants", "embedded_variants"];

/// First non-empty variant list found under [`VARIANT_KEYS`].
fn variant_list(raw: &Value) -> Option<&Vec<Value>> {
    let object = raw.as_object()?;
    VARIANT_KEYS.iter().find_map(|key| match object.get(*key)? {
        Value::Array(items) if !items.is_empty() => Some(items),
        Value::Array(_) | Value::Null => None,
        other => {
            warn!(key = *key, value = %other, "ignoring variant list that is not an array");
            None
        }
    })
}

/// Metadata for one sequence.
///
/// Keeps the JSON value it was read from so it can be written back unchanged; `info` is the
/// typed view used for classification.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceMetadata {
    pub info: SequenceInfo,
    raw: Value,
}

impl SequenceMetadata {
    /// Builds metadata from a JSON value.
    ///
    /// Any value without a non-empty variant list describes a reference. A non-empty list always
    /// makes a variant holder, whatever its entries look like.
    #[must_use]
    pub fn from_value(raw: Value) -> Self {
        let records = variant_list(&raw)
            .map(|items| items.iter().cloned().map(VariantRecord::from_value).collect::<Vec<_>>())
            .and_then(NonEmptyVec::from_vec);
        let info = match records {
            Some(variants) => SequenceInfo::VariantHolder { variants },
            None => SequenceInfo::Reference,
        };
        Self { info, raw }
    }

    /// Reference metadata with no extra fields.
    #[must_use]
    pub fn reference() -> Self {
        Self {
            info: SequenceInfo::Reference,
            raw: Value::Object(serde_json::Map::new()),
        }
    }

    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self.info, SequenceInfo::Reference)
    }

    /// All entries of the variant list, empty for references.
    pub fn records(&self) -> impl Iterator<Item = &VariantRecord> {
        let records = match &self.info {
            SequenceInfo::Reference => None,
            SequenceInfo::VariantHolder { variants } => Some(variants.iter()),
        };
        records.into_iter().flatten()
    }

    /// Embedded variants that decoded cleanly.
    pub fn variants(&self) -> impl Iterator<Item = &EmbeddedVariant> {
        self.records().filter_map(VariantRecord::parsed)
    }

    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

impl<'de> Deserialize<'de> for SequenceMetadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(SequenceMetadata::from_value)
    }
}

impl Serialize for SequenceMetadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

/// Parses a JSON object of `id -> metadata`.
pub fn parse_metadata(text: &str) -> Result<MetadataMap> {
    if text.trim().is_empty() {
        return Ok(MetadataMap::new());
    }
    serde_json::from_str(text).map_err(|e| eyre!("Invalid metadata: {}", e))
}

/// Reads a JSON metadata file.
pub fn load_metadata(path: &Path) -> Result<MetadataMap> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        error!(path = ?path, error = %e, "failed to read metadata file");
        eyre!("Failed to read metadata {:?}: {}", path, e)
    })?;
    let metadata = parse_metadata(&text)?;
    debug!(path = ?path, entry_count = metadata.len(), "loaded metadata");
    Ok(metadata)
}

/// Writes `metadata` as pretty JSON.
pub fn write_metadata(path: &Path, metadata: &MetadataMap) -> Result<()> {
    let json = serde_json::to_string_pretty(metadata)?;
    std::fs::write(path, json).map_err(|e| {
        error!(path = ?path, error = %e, "failed to write metadata file");
        eyre!("Failed to write metadata {:?}: {}", path, e)
    })
}
