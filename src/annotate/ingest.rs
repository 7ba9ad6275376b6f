//! Boundary mapping: backend analysis payload -> annotation requests.
//!
//! The analysis service reports, per analyzed sentence, the sentence text,
//! the derived search term, the named entities found in it, and the web
//! sources discovered for it. Those objects arrive in slightly different
//! shapes depending on the producer (the NLP service reports entities as
//! `{name, label}`, the frontend as `{text, type, confidence}`); this
//! module absorbs both and emits the fixed [`AnnotationRequest`] shape so
//! the engine never sees upstream schema drift.

use serde::{Deserialize, Serialize};

use super::request::AnnotationRequest;

// =============================================================================
// Payload types
// =============================================================================

/// A discovered web source (news article or website)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

/// A named entity reported for a sentence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTag {
    #[serde(alias = "name")]
    pub text: String,
    #[serde(alias = "type")]
    pub label: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// One analyzed sentence with its search term, entities, and sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSection {
    pub sentence: String,
    pub search_term: String,
    #[serde(default)]
    pub entities: Vec<EntityTag>,
    #[serde(default)]
    pub news_results: Vec<SourceRef>,
    #[serde(default)]
    pub website_results: Vec<SourceRef>,
    /// Oldest known source for this sentence, when the backend reports one
    #[serde(default)]
    pub oldest: Option<SourceRef>,
}

/// The full analysis payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisPayload {
    #[serde(alias = "result")]
    pub sections: Vec<AnalysisSection>,
    #[serde(default)]
    pub oldest_result: Option<SourceRef>,
}

impl AnalysisSection {
    /// The source shown in the sentence tooltip: the section's oldest
    /// result when known, otherwise the first discovered source.
    fn tooltip_source<'a>(&'a self, fallback: Option<&'a SourceRef>) -> Option<&'a SourceRef> {
        self.oldest
            .as_ref()
            .or_else(|| self.news_results.first())
            .or_else(|| self.website_results.first())
            .or(fallback)
    }
}

// =============================================================================
// Mapping
// =============================================================================

/// Map an analysis payload into annotation requests.
///
/// - every sentence becomes a `Sentence` request carrying its search term
///   and tooltip source as metadata;
/// - every search term becomes a `SearchTerm` request;
/// - entities are deduplicated by `(text, label)` case-insensitively across
///   sections (the same surface form is often reported once per sentence)
///   and become whole-word `Entity` requests.
pub fn requests_from_payload(payload: &AnalysisPayload) -> Vec<AnnotationRequest> {
    let mut requests = Vec::new();
    let mut seen_entities: Vec<(String, String)> = Vec::new();

    for section in &payload.sections {
        if section.sentence.trim().is_empty() {
            continue;
        }

        let mut sentence = AnnotationRequest::sentence(&section.sentence)
            .with_metadata("search_term", &section.search_term);
        if let Some(source) = section.tooltip_source(payload.oldest_result.as_ref()) {
            sentence = sentence
                .with_metadata("source_title", &source.title)
                .with_metadata("source_url", &source.url);
        }
        requests.push(sentence);

        if !section.search_term.trim().is_empty() {
            requests.push(AnnotationRequest::search_term(&section.search_term));
        }

        for entity in &section.entities {
            if entity.text.trim().is_empty() {
                continue;
            }
            let dedup_key = (entity.text.to_lowercase(), entity.label.clone());
            if seen_entities.contains(&dedup_key) {
                continue;
            }
            seen_entities.push(dedup_key);

            let mut req = AnnotationRequest::entity(&entity.text, &entity.label);
            if let Some(confidence) = entity.confidence {
                req = req.with_metadata("confidence", format!("{:.2}", confidence));
            }
            requests.push(req);
        }
    }

    requests
}

// =============================================================================
// Tests
// =============================================================================
