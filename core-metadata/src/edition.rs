//! Edition Metadata Source
//!
//! Fetches edition documents from the catalog's edition endpoint and derives
//! the enrichment fields merged into a record.
//!
//! ## API Endpoint
//!
//! - **Edition**: `GET {base_url}/{edition_id}` returning `{"edition": {...}}`
//!
//! ## Field derivation
//!
//! - `subjects`: every string under keys starting with `subj`, joined with `"; "`
//! - `summary`: every string under keys starting with `note`, joined with `" "`
//! - `contributors`: the `contributors` list
//!
//! Nested objects are flattened and lists are joined with `", "` before the
//! values are combined. Keys are visited in lexicographic order.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use core_library::EditionEnrichment;
use core_runtime::config::EditionApiConfig;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{MetadataError, Result};

const SUBJECT_PREFIX: &str = "subj";
const NOTE_PREFIX: &str = "note";

/// Source of edition metadata keyed by edition id.
#[async_trait]
pub trait EditionMetadataSource: Send + Sync {
    /// Fetches one edition and derives its enrichment fields.
    ///
    /// # Errors
    ///
    /// - [`MetadataError::TransientNetwork`] for timeouts, connection failures
    ///   and retryable statuses
    /// - [`MetadataError::NonRetryableRequest`] for any other non-2xx status
    /// - [`MetadataError::MalformedResponse`] when the body is not an edition document
    async fn fetch_edition(&self, edition_id: &str) -> Result<EditionEnrichment>;
}

/// Edition source backed by the host [`HttpClient`].
pub struct HttpEditionSource {
    http_client: Arc<dyn HttpClient>,
    config: EditionApiConfig,
}

impl HttpEditionSource {
    pub fn new(http_client: Arc<dyn HttpClient>, config: EditionApiConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }
}

#[async_trait]
impl EditionMetadataSource for HttpEditionSource {
    #[instrument(skip(self), level = "debug")]
    async fn fetch_edition(&self, edition_id: &str) -> Result<EditionEnrichment> {
        let url = self.config.edition_url(edition_id);

        let request = HttpRequest::new(HttpMethod::Get, url)
            .header("Accept", "application/json")
            .headers(&self.config.headers);

        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            return Err(MetadataError::from_status("Edition endpoint", &response));
        }

        let document: Value = serde_json::from_slice(&response.body).map_err(|e| {
            MetadataError::MalformedResponse(format!(
                "Edition {} is not valid JSON: {}",
                edition_id, e
            ))
        })?;

        let enrichment = parse_edition_document(&document)?;
        debug!(
            edition_id,
            has_subjects = enrichment.subjects.is_some(),
            has_summary = enrichment.summary.is_some(),
            contributors = enrichment.contributors.len(),
            "Parsed edition document"
        );

        Ok(enrichment)
    }
}

/// Derives enrichment fields from an edition document.
///
/// # Errors
///
/// Returns [`MetadataError::MalformedResponse`] if the document has no
/// `edition` object.
pub fn parse_edition_document(document: &Value) -> Result<EditionEnrichment> {
    let edition = document
        .get("edition")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            MetadataError::MalformedResponse("Document has no \"edition\" object".to_string())
        })?;

    let mut subjects = Vec::new();
    let mut notes = Vec::new();

    for (key, value) in sorted_entries(edition) {
        if key.starts_with(SUBJECT_PREFIX) {
            flatten_strings(value, &mut subjects);
        } else if key.starts_with(NOTE_PREFIX) {
            flatten_strings(value, &mut notes);
        }
    }

    let contributors = edition
        .get("contributors")
        .map(parse_contributors)
        .unwrap_or_default();

    Ok(EditionEnrichment {
        subjects: join_non_empty(subjects, "; "),
        summary: join_non_empty(notes, " "),
        contributors,
    })
}

/// Collects the string leaves of `value`; a list contributes one entry.
fn flatten_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() {
                out.push(s.to_string());
            }
        }
        Value::Array(items) => {
            let mut parts = Vec::new();
            for item in items {
                flatten_strings(item, &mut parts);
            }
            if !parts.is_empty() {
                out.push(parts.join(", "));
            }
        }
        Value::Object(map) => {
            for (_, inner) in sorted_entries(map) {
                flatten_strings(inner, out);
            }
        }
        _ => {}
    }
}

fn sorted_entries(map: &Map<String, Value>) -> Vec<(&String, &Value)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

fn join_non_empty(parts: Vec<String>, separator: &str) -> Option<String> {
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(separator))
    }
}

/// Contributors arrive either as plain names or as objects with a label.
fn parse_contributors(value: &Value) -> Vec<String> {
    let Some(items) = value.as_array() else {
        return match value.as_str() {
            Some(name) if !name.trim().is_empty() => vec![name.trim().to_string()],
            _ => Vec::new(),
        };
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(name.trim().to_string()),
            Value::Object(map) => ["label", "name", "displayName"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .map(|name| name.trim().to_string()),
            _ => None,
        })
        .filter(|name| !name.is_empty())
        .collect()
}
