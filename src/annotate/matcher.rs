//! SpanMatcher - multi-needle matching via Aho-Corasick
//!
//! Finds every occurrence of every annotation request's needle inside the
//! normalized haystack in a single automaton pass. Needles are untrusted
//! free-form content (sentences, entity surface forms), so matching is
//! strictly literal: there is no pattern language to escape.
//!
//! # Features
//! - One automaton over all needles, case-folded for Unicode-aware
//!   case-insensitive comparison
//! - Greedy left-to-right occurrences per needle (search resumes at the
//!   end of each accepted match)
//! - Whole-word filtering for entity needles via Unicode word boundaries
//! - Position-accurate results in normalized byte coordinates

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

use super::normalize::NormalizedText;
use super::range::TextRange;
use super::request::AnnotationRequest;

// =============================================================================
// Case folding
// =============================================================================

/// Case-fold a string character by character.
///
/// Both needles and haystack go through this same routine so that
/// multi-character expansions (ß -> ss) fold identically on both sides.
fn fold_chars(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

/// A case-folded view of a haystack with a byte map back to the unfolded
/// coordinates. Folding can change byte lengths, so match offsets in the
/// folded string must be translated before anyone else sees them.
struct FoldedText {
    folded: String,
    /// Per folded byte: start of the originating character
    starts: Vec<usize>,
    /// Per folded byte: end of the originating character
    ends: Vec<usize>,
}

impl FoldedText {
    fn new(source: &str) -> Self {
        let mut folded = String::with_capacity(source.len());
        let mut starts = Vec::with_capacity(source.len());
        let mut ends = Vec::with_capacity(source.len());

        for (offset, ch) in source.char_indices() {
            let char_end = offset + ch.len_utf8();
            for lower in ch.to_lowercase() {
                folded.push(lower);
                for _ in 0..lower.len_utf8() {
                    starts.push(offset);
                    ends.push(char_end);
                }
            }
        }

        Self { folded, starts, ends }
    }

    /// Translate a non-empty folded match back to unfolded coordinates
    fn unfold(&self, start: usize, end: usize) -> TextRange {
        debug_assert!(start < end && end <= self.folded.len());
        TextRange::new(self.starts[start], self.ends[end - 1])
    }
}

// =============================================================================
// SpanMatcher
// =============================================================================

/// A raw needle occurrence, in normalized haystack coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeedleMatch {
    /// Index of the originating request in the hydrated request list
    pub request: usize,
    pub range: TextRange,
}

/// Multi-needle matcher over a set of annotation requests.
///
/// Build once per request set, then run against any number of haystacks.
pub struct SpanMatcher {
    /// The built automaton (None when no usable needles exist)
    automaton: Option<AhoCorasick>,
    /// Per pattern: index of the originating request
    pattern_requests: Vec<usize>,
    /// Per pattern: whole-word restriction flag
    pattern_whole_word: Vec<bool>,
}

impl SpanMatcher {
    /// Build a matcher from the request list.
    ///
    /// Each needle is whitespace-normalized with the same rule as the
    /// haystack, trimmed, and case-folded. Empty needles contribute no
    /// patterns. A failed highlight must never block content display, so
    /// this never errors: an unbuildable automaton simply matches nothing.
    pub fn build(requests: &[AnnotationRequest]) -> Self {
        let mut patterns = Vec::new();
        let mut pattern_requests = Vec::new();
        let mut pattern_whole_word = Vec::new();

        for (idx, request) in requests.iter().enumerate() {
            let normalized = NormalizedText::new(&request.text);
            let needle = normalized.normalized().trim();
            if needle.is_empty() {
                continue;
            }
            patterns.push(fold_chars(needle));
            pattern_requests.push(idx);
            pattern_whole_word.push(request.whole_word);
        }

        let automaton = if patterns.is_empty() {
            None
        } else {
            AhoCorasickBuilder::new()
                .match_kind(MatchKind::Standard)
                .build(&patterns)
                .ok()
        };

        Self {
            automaton,
            pattern_requests,
            pattern_whole_word,
        }
    }

    pub fn is_built(&self) -> bool {
        self.automaton.is_some()
    }

    pub fn pattern_count(&self) -> usize {
        self.pattern_requests.len()
    }

    /// Find every needle occurrence in the normalized haystack.
    ///
    /// Per needle, occurrences are greedy left-to-right: after an accepted
    /// match, that needle's search resumes at the match end. Whole-word
    /// needles must start and end on a Unicode word boundary. Results are
    /// in normalized byte coordinates.
    pub fn find_matches(&self, normalized_haystack: &str) -> Vec<NeedleMatch> {
        let automaton = match self.automaton.as_ref() {
            Some(a) => a,
            None => return Vec::new(),
        };

        let folded = FoldedText::new(normalized_haystack);
        let boundaries = if self.pattern_whole_word.iter().any(|&w| w) {
            Some(word_boundaries(&folded.folded))
        } else {
            None
        };

        let mut resume_at = vec![0usize; self.pattern_requests.len()];
        let mut matches = Vec::new();

        for m in automaton.find_overlapping_iter(&folded.folded) {
            let pattern = m.pattern().as_usize();
            if m.start() < resume_at[pattern] {
                continue;
            }
            if self.pattern_whole_word[pattern] {
                let on_boundary = boundaries
                    .as_ref()
                    .map(|b| b.contains(&m.start()) && b.contains(&m.end()))
                    .unwrap_or(true);
                if !on_boundary {
                    continue;
                }
            }
            resume_at[pattern] = m.end();
            matches.push(NeedleMatch {
                request: self.pattern_requests[pattern],
                range: folded.unfold(m.start(), m.end()),
            });
        }

        matches
    }

    /// Occurrences of a single request's needle (normalized coordinates)
    pub fn find_all(&self, normalized_haystack: &str, request: usize) -> Vec<TextRange> {
        self.find_matches(normalized_haystack)
            .into_iter()
            .filter(|m| m.request == request)
            .map(|m| m.range)
            .collect()
    }
}

/// Byte offsets of every Unicode word boundary in `text`
fn word_boundaries(text: &str) -> HashSet<usize> {
    let mut set: HashSet<usize> = text.split_word_bound_indices().map(|(i, _)| i).collect();
    set.insert(text.len());
    set
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::request::AnnotationRequest;

    fn matcher(requests: &[AnnotationRequest]) -> SpanMatcher {
        SpanMatcher::build(requests)
    }

    #[test]
    fn test_case_insensitive_match() {
        let m = matcher(&[AnnotationRequest::search_term("earth")]);
        let found = m.find_all("They say the Earth is flat", 0);

        assert_eq!(found, vec![TextRange::new(13, 18)]);
        assert_eq!(&"They say the Earth is flat"[13..18], "Earth");
    }

    #[test]
    fn test_multiple_occurrences_are_greedy() {
        let m = matcher(&[AnnotationRequest::search_term("aaa")]);
        // Self-overlapping needle: search resumes at each match end
        let found = m.find_all("aaaaaa", 0);
        assert_eq!(found, vec![TextRange::new(0, 3), TextRange::new(3, 6)]);
    }

    #[test]
    fn test_empty_needle_matches_nothing() {
        let m = matcher(&[
            AnnotationRequest::search_term(""),
            AnnotationRequest::search_term("   "),
        ]);
        assert!(!m.is_built());
        assert!(m.find_matches("anything").is_empty());
    }

    #[test]
    fn test_not_found_is_silent() {
        let m = matcher(&[AnnotationRequest::search_term("absent")]);
        assert!(m.find_all("nothing to see here", 0).is_empty());
    }

    #[test]
    fn test_metacharacters_match_literally() {
        let needle = "1+1=2 (true?)";
        let m = matcher(&[AnnotationRequest::search_term(needle)]);
        let haystack = "we claim 1+1=2 (true?) daily";
        let found = m.find_all(haystack, 0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].slice(haystack), needle);
    }

    #[test]
    fn test_whole_word_entity() {
        let m = matcher(&[AnnotationRequest::entity("Trump", "PERSON")]);
        let haystack = "Trumpism is not Trump";
        let found = m.find_all(haystack, 0);
        assert_eq!(found, vec![TextRange::new(16, 21)]);
    }

    #[test]
    fn test_substring_needle_ignores_word_bounds() {
        let m = matcher(&[AnnotationRequest::search_term("cat")]);
        let found = m.find_all("concatenate cat", 0);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_needle_whitespace_is_normalized() {
        let m = matcher(&[AnnotationRequest::sentence("  two\t words  ")]);
        let found = m.find_all("say two words now", 0);
        assert_eq!(found, vec![TextRange::new(4, 13)]);
    }

    #[test]
    fn test_fold_expansion_offsets() {
        // ß folds to "ss": offsets must come back in unfolded coordinates
        let m = matcher(&[AnnotationRequest::search_term("GROSSE")]);
        let haystack = "die große Zahl";
        let found = m.find_all(haystack, 0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].slice(haystack), "große");
    }

    #[test]
    fn test_independent_needles_same_region() {
        let m = matcher(&[
            AnnotationRequest::search_term("capital of France"),
            AnnotationRequest::entity("France", "GPE"),
        ]);
        let haystack = "Paris is the capital of France.";
        let matches = m.find_matches(haystack);

        assert_eq!(matches.len(), 2, "needles are matched independently");
        assert_eq!(m.find_all(haystack, 0), vec![TextRange::new(13, 30)]);
        assert_eq!(m.find_all(haystack, 1), vec![TextRange::new(24, 30)]);
    }
}
