//! Domain models for the catalog mirror
//!
//! Records arrive as [`SnapshotRecord`]s, are validated once at that boundary
//! and from then on travel as [`CatalogRecord`]s. Only the source fields take
//! part in the content fingerprint; enrichment and embedding state are
//! bookkeeping layered on top.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

use crate::error::{LibraryError, Result};
use crate::fingerprint;

/// Keys that never count as source data even when upstream sends them.
/// Enrichment fields are owned by the edition lookup, bookkeeping by the
/// mirror; either would otherwise be written twice through `extra`.
const RESERVED_KEYS: &[&str] = &[
    "subjects",
    "summary",
    "contributors",
    "embedded",
    "embedding",
    "contentFingerprint",
];

fn is_source_key(key: &str) -> bool {
    !RESERVED_KEYS.contains(&key)
}

// =============================================================================
// Source structure
// =============================================================================

/// One edition of a material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Edition {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub publication_date: Option<String>,
}

/// A physical or digital form in which a title is held
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub material_type: Option<String>,
    #[serde(default)]
    pub call_number: Option<String>,
    #[serde(default)]
    pub editions: Vec<Edition>,
}

/// Borrowed view over the fields that define a record's content.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceFields<'a> {
    id: &'a str,
    title: &'a Option<String>,
    author: &'a Option<String>,
    publication_date: &'a Option<String>,
    materials: &'a [Material],
    #[serde(flatten)]
    extra: BTreeMap<&'a str, &'a Value>,
}

impl<'a> SourceFields<'a> {
    fn fingerprint(&self) -> Result<String> {
        fingerprint::fingerprint(self)
    }
}

fn source_extra(extra: &BTreeMap<String, Value>) -> BTreeMap<&str, &Value> {
    extra
        .iter()
        .filter(|(key, _)| is_source_key(key))
        .map(|(key, value)| (key.as_str(), value))
        .collect()
}

// =============================================================================
// Snapshot records
// =============================================================================

/// Raw record from the canonical snapshot.
///
/// Unknown upstream fields are kept in `extra` and take part in the
/// fingerprint, so a change to any of them is still detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl SnapshotRecord {
    /// Id with surrounding whitespace removed; blank ids count as missing.
    pub fn record_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Fingerprint over the source fields.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::MissingId`] when the record has no usable id.
    pub fn fingerprint(&self) -> Result<String> {
        let id = self.record_id().ok_or(LibraryError::MissingId)?;
        SourceFields {
            id,
            title: &self.title,
            author: &self.author,
            publication_date: &self.publication_date,
            materials: &self.materials,
            extra: source_extra(&self.extra),
        }
        .fingerprint()
    }

    /// Converts into a bare working record (no enrichment, no fingerprint).
    pub fn into_record(self) -> Result<CatalogRecord> {
        let id = self
            .record_id()
            .ok_or(LibraryError::MissingId)?
            .to_string();

        let extra = self
            .extra
            .into_iter()
            .filter(|(key, _)| is_source_key(key))
            .collect();

        Ok(CatalogRecord {
            id,
            title: self.title,
            author: self.author,
            publication_date: self.publication_date,
            materials: self.materials,
            subjects: None,
            summary: None,
            contributors: Vec::new(),
            content_fingerprint: None,
            embedded: false,
            embedding: None,
            extra,
        })
    }
}

// =============================================================================
// Working records
// =============================================================================

/// Fields merged into a record from its edition metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EditionEnrichment {
    pub subjects: Option<String>,
    pub summary: Option<String>,
    pub contributors: Vec<String>,
}

/// Catalog record with enrichment and embedding state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub materials: Vec<Material>,

    // Enrichment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subjects: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contributors: Vec<String>,

    // Bookkeeping
    /// Fingerprint of the source fields at the time enrichment landed.
    /// Absent until enrichment succeeds, which keeps the record re-detectable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_fingerprint: Option<String>,
    #[serde(default)]
    pub embedded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl CatalogRecord {
    /// Fingerprint over the current source fields.
    pub fn source_fingerprint(&self) -> Result<String> {
        SourceFields {
            id: &self.id,
            title: &self.title,
            author: &self.author,
            publication_date: &self.publication_date,
            materials: &self.materials,
            extra: source_extra(&self.extra),
        }
        .fingerprint()
    }

    /// Stamps the record with the fingerprint of its current source fields.
    pub fn mark_fingerprinted(&mut self) -> Result<()> {
        self.content_fingerprint = Some(self.source_fingerprint()?);
        Ok(())
    }

    /// Edition used to look up enrichment: the first edition of the first material.
    pub fn primary_edition_id(&self) -> Option<&str> {
        self.materials
            .first()
            .and_then(|material| material.editions.first())
            .and_then(|edition| edition.id.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Name of the first material, if any.
    pub fn primary_material(&self) -> Option<&str> {
        self.materials.first().and_then(|m| m.name.as_deref())
    }

    /// Merges enrichment fields. Any previous embedding is discarded since the
    /// text it was computed from no longer matches.
    pub fn apply_enrichment(&mut self, enrichment: EditionEnrichment) {
        self.subjects = enrichment.subjects;
        self.summary = enrichment.summary;
        self.contributors = enrichment.contributors;
        self.clear_embedding();
    }

    pub fn set_embedding(&mut self, vector: Vec<f32>) {
        self.embedding = Some(vector);
        self.embedded = true;
    }

    pub fn clear_embedding(&mut self) {
        self.embedding = None;
        self.embedded = false;
    }

    /// Embedded with a usable vector.
    pub fn has_embedding(&self) -> bool {
        self.embedded && self.embedding.as_ref().is_some_and(|v| !v.is_empty())
    }
}

/// Public projection of a [`CatalogRecord`] without bookkeeping fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanRecord {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subjects: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contributors: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl From<&CatalogRecord> for CleanRecord {
    fn from(record: &CatalogRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            author: record.author.clone(),
            publication_date: record.publication_date.clone(),
            materials: record.materials.clone(),
            subjects: record.subjects.clone(),
            summary: record.summary.clone(),
            contributors: record.contributors.clone(),
            extra: record.extra.clone(),
        }
    }
}

// =============================================================================
// Sync state
// =============================================================================

/// Persisted working set: every known record plus the rebuild flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    #[serde(default)]
    pub records: Vec<CatalogRecord>,
    #[serde(default)]
    pub needs_index_rebuild: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_rebuild_at: Option<DateTime<Utc>>,
}

impl SyncState {
    /// Checks the id uniqueness invariant.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.records.len());
        for record in &self.records {
            if record.id.trim().is_empty() {
                return Err(LibraryError::MissingId);
            }
            if !seen.insert(record.id.as_str()) {
                return Err(LibraryError::DuplicateId(record.id.clone()));
            }
        }
        Ok(())
    }

    /// Sorts records by id, the order every artifact is written in.
    pub fn sort_records(&mut self) {
        self.records.sort_by(|a, b| a.id.cmp(&b.id));
    }

    pub fn embedded_count(&self) -> usize {
        self.records.iter().filter(|r| r.has_embedding()).count()
    }

    pub fn pending_embedding_count(&self) -> usize {
        self.records.iter().filter(|r| !r.has_embedding()).count()
    }

    /// Clean projection of every record, in current order.
    pub fn clean_records(&self) -> Vec<CleanRecord> {
        self.records.iter().map(CleanRecord::from).collect()
    }
}

// =============================================================================
// Serde helpers
// =============================================================================

/// Accepts a string, a number or null for identifier-like fields.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, found {}",
            other
        ))),
    }
}
