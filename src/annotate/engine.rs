//! Annotator: Unified Annotation Engine
//!
//! Single annotate() call for the whole pipeline:
//! - Whitespace normalization with offset maps (NormalizedText)
//! - Multi-needle matching (SpanMatcher)
//! - Overlap resolution into a span forest (resolver)
//!
//! The engine is synchronous and holds no background state beyond the
//! cached last result; renderers consume the returned forest.

use serde::{Deserialize, Serialize};

use super::change::ChangeDetector;
use super::ingest::{requests_from_payload, AnalysisPayload};
use super::matcher::SpanMatcher;
use super::normalize::NormalizedText;
use super::request::{AnnotationRequest, Category};
use super::resolver::{resolve, span_count, Span};

// =============================================================================
// Types
// =============================================================================

/// Configuration for the Annotator
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AnnotatorConfig {
    #[serde(default = "default_true")]
    pub enable_sentences: bool,
    #[serde(default = "default_true")]
    pub enable_search_terms: bool,
    #[serde(default = "default_true")]
    pub enable_entities: bool,
    /// Serve cached results for unchanged haystacks
    #[serde(default = "default_true")]
    pub cache_unchanged: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            enable_sentences: true,
            enable_search_terms: true,
            enable_entities: true,
            cache_unchanged: true,
        }
    }
}

/// Timing statistics for each pipeline phase
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnnotateTimings {
    pub total_us: u64,
    pub normalize_us: u64,
    pub match_us: u64,
    pub resolve_us: u64,
}

/// Aggregate statistics for one annotate() call
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnnotateStats {
    pub timings: AnnotateTimings,
    /// Content hash as hex string (u64 would overflow JS Number.MAX_SAFE_INTEGER)
    pub content_hash: String,
    pub was_skipped: bool,
    pub text_length: usize,
    pub request_count: usize,
    pub match_count: usize,
    pub span_count: usize,
}

/// Resolved spans plus run statistics
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnnotateResult {
    pub spans: Vec<Span>,
    pub stats: AnnotateStats,
}

// =============================================================================
// Annotator
// =============================================================================

/// Unified annotation engine
pub struct Annotator {
    config: AnnotatorConfig,
    requests: Vec<AnnotationRequest>,
    matcher: SpanMatcher,
    change_detector: ChangeDetector,
    last_result: Option<AnnotateResult>,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new(AnnotatorConfig::default())
    }
}

impl Annotator {
    pub fn new(config: AnnotatorConfig) -> Self {
        Self {
            config,
            requests: Vec::new(),
            matcher: SpanMatcher::build(&[]),
            change_detector: ChangeDetector::new(),
            last_result: None,
        }
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    pub fn requests(&self) -> &[AnnotationRequest] {
        &self.requests
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    /// Hydrate the engine with annotation requests, rebuilding the matcher.
    /// Requests whose category is disabled in the config are dropped here.
    pub fn hydrate_requests(&mut self, requests: Vec<AnnotationRequest>) {
        self.requests = requests
            .into_iter()
            .filter(|r| match r.category {
                Category::Sentence => self.config.enable_sentences,
                Category::SearchTerm => self.config.enable_search_terms,
                Category::Entity(_) => self.config.enable_entities,
            })
            .collect();
        self.matcher = SpanMatcher::build(&self.requests);
        self.reset();
    }

    /// Hydrate straight from a backend analysis payload
    pub fn hydrate_payload(&mut self, payload: &AnalysisPayload) {
        self.hydrate_requests(requests_from_payload(payload));
    }

    /// Run the full pipeline against `text`.
    ///
    /// An empty haystack or an empty request set yields an empty result,
    /// never an error: a failed highlight must not block content display.
    /// Unchanged text is served from the cached last result.
    pub fn annotate(&mut self, text: &str) -> AnnotateResult {
        let overall_start = instant::Instant::now();

        let change = self.change_detector.check(text);
        if self.config.cache_unchanged && !change.has_changed {
            if let Some(ref cached) = self.last_result {
                let mut result = cached.clone();
                result.stats.was_skipped = true;
                result.stats.timings.total_us = overall_start.elapsed().as_micros() as u64;
                return result;
            }
        }

        let mut result = AnnotateResult::default();
        result.stats.content_hash = format!("{:x}", change.content_hash);
        result.stats.text_length = text.len();
        result.stats.request_count = self.requests.len();

        if !text.is_empty() && self.matcher.is_built() {
            let normalize_start = instant::Instant::now();
            let normalized = NormalizedText::new(text);
            result.stats.timings.normalize_us = normalize_start.elapsed().as_micros() as u64;

            let match_start = instant::Instant::now();
            let matches = self.matcher.find_matches(normalized.normalized());
            result.stats.timings.match_us = match_start.elapsed().as_micros() as u64;
            result.stats.match_count = matches.len();

            let resolve_start = instant::Instant::now();
            let candidates: Vec<Span> = matches
                .into_iter()
                .map(|m| {
                    let request = &self.requests[m.request];
                    Span::new(
                        normalized.original_range(m.range),
                        request.category.clone(),
                        request.priority,
                        m.request,
                        request.metadata.clone(),
                    )
                })
                .collect();
            result.spans = resolve(candidates);
            result.stats.timings.resolve_us = resolve_start.elapsed().as_micros() as u64;
            result.stats.span_count = span_count(&result.spans);
        }

        result.stats.timings.total_us = overall_start.elapsed().as_micros() as u64;
        self.last_result = Some(result.clone());
        result
    }

    /// Clear the change detector and cached result
    pub fn reset(&mut self) {
        self.change_detector.reset();
        self.last_result = None;
    }

    /// The last annotate() result, if any
    pub fn last_result(&self) -> Option<&AnnotateResult> {
        self.last_result.as_ref()
    }

    /// Share of annotate() calls served from cache, as a percentage
    pub fn skip_rate(&self) -> f64 {
        self.change_detector.skip_rate()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::range::TextRange;

    fn annotator_with(requests: Vec<AnnotationRequest>) -> Annotator {
        let mut annotator = Annotator::default();
        annotator.hydrate_requests(requests);
        annotator
    }

    // -------------------------------------------------------------------------
    // Requirement 1: Empty inputs produce empty results, not errors
    // -------------------------------------------------------------------------
    #[test]
    fn test_empty_haystack_yields_empty_result() {
        let mut annotator = annotator_with(vec![AnnotationRequest::sentence("anything")]);
        let result = annotator.annotate("");
        assert!(result.spans.is_empty());
        assert_eq!(result.stats.span_count, 0);
    }

    #[test]
    fn test_no_requests_yields_empty_result() {
        let mut annotator = annotator_with(vec![]);
        let result = annotator.annotate("some page text");
        assert!(result.spans.is_empty());
        assert!(!result.stats.was_skipped);
    }

    // -------------------------------------------------------------------------
    // Requirement 2: Case-insensitive matching in original coordinates
    // -------------------------------------------------------------------------
    #[test]
    fn test_case_insensitive_original_offsets() {
        let mut annotator = annotator_with(vec![AnnotationRequest::search_term("earth")]);
        let text = "They say the Earth is flat";
        let result = annotator.annotate(text);

        assert_eq!(result.spans.len(), 1);
        assert_eq!(result.spans[0].range, TextRange::new(13, 18));
        assert_eq!(result.spans[0].range.slice(text), "Earth");
    }

    // -------------------------------------------------------------------------
    // Requirement 3: Irregular whitespace in the haystack still matches
    // -------------------------------------------------------------------------
    #[test]
    fn test_whitespace_irregular_haystack() {
        let mut annotator =
            annotator_with(vec![AnnotationRequest::sentence("The sky is blue today.")]);
        let text = "Intro.\n  The sky\tis\n\nblue   today. Outro.";
        let result = annotator.annotate(text);

        assert_eq!(result.spans.len(), 1);
        let matched = result.spans[0].range.slice(text);
        assert!(matched.starts_with("The sky"));
        assert!(matched.ends_with("today."));
    }

    // -------------------------------------------------------------------------
    // Requirement 4: Category precedence and nesting
    // -------------------------------------------------------------------------
    #[test]
    fn test_entity_nests_inside_sentence() {
        let sentence = "Dr. Oz met President Trump on Wednesday.";
        let mut annotator = annotator_with(vec![
            AnnotationRequest::sentence(sentence),
            AnnotationRequest::entity("Trump", "PERSON"),
        ]);
        let text = format!("Breaking: {} More follows.", sentence);
        let result = annotator.annotate(&text);

        assert_eq!(result.spans.len(), 1);
        let outer = &result.spans[0];
        assert_eq!(outer.category, Category::Sentence);
        assert_eq!(outer.range.slice(&text), sentence);
        assert_eq!(outer.children.len(), 1);
        assert_eq!(outer.children[0].range.slice(&text), "Trump");
        assert_eq!(result.stats.span_count, 2);
    }

    #[test]
    fn test_scenario_entity_in_search_term() {
        let text = "Paris is the capital of France.";
        let mut annotator = annotator_with(vec![
            AnnotationRequest::entity("France", "GPE"),
            AnnotationRequest::search_term("capital of France"),
        ]);
        let result = annotator.annotate(text);

        assert_eq!(result.spans.len(), 1);
        assert_eq!(result.spans[0].category, Category::SearchTerm);
        assert_eq!(result.spans[0].range, TextRange::new(13, 30));
        assert_eq!(result.spans[0].children.len(), 1);
        assert_eq!(result.spans[0].children[0].range, TextRange::new(24, 30));
    }

    // -------------------------------------------------------------------------
    // Requirement 5: Unchanged text is served from cache
    // -------------------------------------------------------------------------
    #[test]
    fn test_unchanged_text_skipped() {
        let mut annotator = annotator_with(vec![AnnotationRequest::search_term("cache")]);
        let first = annotator.annotate("warm the cache");
        assert!(!first.stats.was_skipped);

        let second = annotator.annotate("warm the cache");
        assert!(second.stats.was_skipped);
        assert_eq!(second.spans.len(), first.spans.len());
        assert_eq!(second.stats.content_hash, first.stats.content_hash);
    }

    #[test]
    fn test_changed_text_rescanned() {
        let mut annotator = annotator_with(vec![AnnotationRequest::search_term("x")]);
        annotator.annotate("x one");
        let result = annotator.annotate("x two");
        assert!(!result.stats.was_skipped);
    }

    #[test]
    fn test_reset_clears_cache() {
        let mut annotator = annotator_with(vec![AnnotationRequest::search_term("x")]);
        annotator.annotate("x");
        annotator.reset();
        assert!(annotator.last_result().is_none());
        assert!(!annotator.annotate("x").stats.was_skipped);
    }

    #[test]
    fn test_rehydrate_invalidates_cache() {
        let mut annotator = annotator_with(vec![AnnotationRequest::search_term("one")]);
        annotator.annotate("one two");
        annotator.hydrate_requests(vec![AnnotationRequest::search_term("two")]);
        let result = annotator.annotate("one two");
        assert!(!result.stats.was_skipped);
        assert_eq!(result.spans.len(), 1);
        assert_eq!(result.spans[0].range.slice("one two"), "two");
    }

    // -------------------------------------------------------------------------
    // Requirement 6: Config gates categories at hydration
    // -------------------------------------------------------------------------
    #[test]
    fn test_disabled_categories_dropped() {
        let config = AnnotatorConfig {
            enable_entities: false,
            ..AnnotatorConfig::default()
        };
        let mut annotator = Annotator::new(config);
        annotator.hydrate_requests(vec![
            AnnotationRequest::entity("Paris", "GPE"),
            AnnotationRequest::search_term("Paris"),
        ]);
        assert_eq!(annotator.request_count(), 1);

        let result = annotator.annotate("Paris");
        assert_eq!(result.spans.len(), 1);
        assert_eq!(result.spans[0].category, Category::SearchTerm);
    }

    // -------------------------------------------------------------------------
    // Requirement 7: Stats are populated
    // -------------------------------------------------------------------------
    #[test]
    fn test_stats_populated() {
        let mut annotator = annotator_with(vec![
            AnnotationRequest::sentence("A fact about things."),
            AnnotationRequest::search_term("fact"),
        ]);
        let text = "A fact about things.";
        let result = annotator.annotate(text);

        assert_eq!(result.stats.text_length, text.len());
        assert_eq!(result.stats.request_count, 2);
        assert_eq!(result.stats.match_count, 2);
        assert_eq!(result.stats.span_count, 2);
        assert!(!result.stats.content_hash.is_empty());
    }

    // -------------------------------------------------------------------------
    // Requirement 8: End-to-end from a backend payload
    // -------------------------------------------------------------------------
    #[test]
    fn test_annotate_from_payload() {
        let payload: AnalysisPayload = serde_json::from_str(
            r#"{
                "sections": [{
                    "sentence": "Paris is the capital of France.",
                    "search_term": "capital of France",
                    "entities": [{"name": "France", "label": "GPE"}],
                    "news_results": [{"title": "Source", "url": "https://n.example/1"}]
                }]
            }"#,
        )
        .unwrap();

        let mut annotator = Annotator::default();
        annotator.hydrate_payload(&payload);

        let text = "As reported, Paris is the capital of France. End.";
        let result = annotator.annotate(text);

        assert_eq!(result.spans.len(), 1);
        let root = &result.spans[0];
        assert_eq!(root.category, Category::Sentence);
        assert_eq!(
            root.metadata.get("source_url").map(String::as_str),
            Some("https://n.example/1")
        );
        assert_eq!(result.stats.span_count, 3);
    }
}
