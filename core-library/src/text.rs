//! Canonical embedding text
//!
//! Every record is embedded from the same fixed layout so that vectors stay
//! comparable across passes.

use crate::models::CatalogRecord;

/// Renders the text submitted to the embedding model.
///
/// Fields appear in a fixed order: title, author, material, publication date,
/// contributors, subjects and description. Missing values render as empty.
pub fn render_embedding_text(record: &CatalogRecord) -> String {
    format!(
        "Title: {}\nAuthor: {}\nMaterial: {}\nPublication Date: {}\nContributors: {}\nSubjects: {}\nDescription: {}",
        record.title.as_deref().unwrap_or_default(),
        record.author.as_deref().unwrap_or_default(),
        record.primary_material().unwrap_or_default(),
        record.publication_date.as_deref().unwrap_or_default(),
        record.contributors.join(", "),
        record.subjects.as_deref().unwrap_or_default(),
        record.summary.as_deref().unwrap_or_default(),
    )
}
