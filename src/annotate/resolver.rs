//! Overlap resolution across annotation categories.
//!
//! Raw matches from every request are merged into a span *forest*:
//! higher-precedence categories claim their ranges first, a span fully
//! contained in an accepted span nests inside it (entities layer over the
//! sentence that contains them), and a span that only partially overlaps
//! anything already accepted is rejected whole - no truncation, a half
//! highlight reads as a bug.
//!
//! Invariants on the output:
//! - top-level spans are pairwise non-overlapping and sorted by start;
//! - each span's children are pairwise non-overlapping, sorted by start,
//!   and fully inside their parent;
//! - `span_id` is assigned in document order, parents before children.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::range::TextRange;
use super::request::Category;

/// A resolved annotation span in original-text byte coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub range: TextRange,
    pub category: Category,
    pub priority: u8,
    /// Identity rendered into wrappers for event correlation
    pub span_id: usize,
    /// Index of the originating request in the hydrated request list
    pub request_id: usize,
    pub metadata: BTreeMap<String, String>,
    /// Nested annotations fully contained in this one
    pub children: Vec<Span>,
}

impl Span {
    pub fn new(
        range: TextRange,
        category: Category,
        priority: u8,
        request_id: usize,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self {
            range,
            category,
            priority,
            span_id: 0,
            request_id,
            metadata,
            children: Vec::new(),
        }
    }

    /// Number of spans in this subtree, self included
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Span::subtree_len).sum::<usize>()
    }
}

/// Total span count across a forest
pub fn span_count(spans: &[Span]) -> usize {
    spans.iter().map(Span::subtree_len).sum()
}

/// Resolve raw candidate spans into the final forest.
///
/// Candidates are processed in precedence order (priority ascending, then
/// start ascending, then longer first so that equal-priority containers
/// precede their containees). Identical `(range, category)` duplicates
/// collapse to one span, preferring the one with richer metadata.
pub fn resolve(mut candidates: Vec<Span>) -> Vec<Span> {
    candidates.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(a.range.start.cmp(&b.range.start))
            .then(b.range.len().cmp(&a.range.len()))
    });

    let mut roots: Vec<Span> = Vec::new();
    for candidate in candidates {
        insert(&mut roots, candidate);
    }

    let mut next_id = 0;
    assign_ids(&mut roots, &mut next_id);
    roots
}

/// Try to place a candidate among `siblings`; returns false on rejection.
fn insert(siblings: &mut Vec<Span>, candidate: Span) -> bool {
    let overlapping: Vec<usize> = siblings
        .iter()
        .enumerate()
        .filter(|(_, s)| s.range.overlaps(&candidate.range))
        .map(|(i, _)| i)
        .collect();

    if overlapping.is_empty() {
        insert_sorted(siblings, candidate);
        return true;
    }

    if overlapping.len() == 1 {
        let idx = overlapping[0];

        if siblings[idx].range == candidate.range {
            if siblings[idx].category == candidate.category {
                // Duplicate needle: keep one, richer metadata wins
                if siblings[idx].metadata.is_empty() && !candidate.metadata.is_empty() {
                    siblings[idx].metadata = candidate.metadata;
                }
                return false;
            }
            // Same range, different category: the later (lower-precedence)
            // one renders as the inner wrapper
            return insert(&mut siblings[idx].children, candidate);
        }

        if siblings[idx].range.contains(&candidate.range) {
            return insert(&mut siblings[idx].children, candidate);
        }

        if candidate.range.contains(&siblings[idx].range) {
            let mut candidate = candidate;
            let child = siblings.remove(idx);
            candidate.children.push(child);
            insert_sorted(siblings, candidate);
            return true;
        }

        // Partial overlap: reject whole
        return false;
    }

    // Several siblings intersect the candidate: acceptable only as their
    // common parent
    if overlapping
        .iter()
        .all(|&i| candidate.range.contains(&siblings[i].range))
    {
        let mut candidate = candidate;
        for &i in overlapping.iter().rev() {
            candidate.children.insert(0, siblings.remove(i));
        }
        insert_sorted(siblings, candidate);
        return true;
    }

    false
}

fn insert_sorted(siblings: &mut Vec<Span>, span: Span) {
    let at = siblings.partition_point(|s| s.range.start < span.range.start);
    siblings.insert(at, span);
}

fn assign_ids(spans: &mut [Span], next: &mut usize) {
    for span in spans {
        span.span_id = *next;
        *next += 1;
        assign_ids(&mut span.children, next);
    }
}

// =============================================================================
// Tests
// =============================================================================
