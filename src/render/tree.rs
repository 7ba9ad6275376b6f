//! TreeApplier - applies a resolved span forest to a FragmentTree
//!
//! For every span, the text leaves intersecting it are split at the span
//! boundaries and the matched portions wrapped in annotation nodes. A span
//! crossing several leaves produces one wrapper per leaf, all tagged with
//! the same span identity so the host can treat them as one logical
//! annotation. Nested spans produce nested wrappers inside the same leaf
//! segment.
//!
//! `apply` starts by reverting any wrappers left from a previous call, so
//! re-annotating never accumulates stale wrappers. `revert` undoes exactly
//! the wrappers recorded in the handle and is idempotent.

use std::collections::BTreeMap;

use crate::annotate::range::TextRange;
use crate::annotate::resolver::Span;

use super::fragment::{FragmentTree, NodeData, NodeId, TextLeaf, WRAPPER_CATEGORY_ATTR};
use super::style::StyleRegistry;

// =============================================================================
// Errors
// =============================================================================

/// Fatal-to-this-call inconsistencies between the span list and the tree.
/// Already-applied wrappers are left in place; the caller decides whether
/// to rebuild the fragment and retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// A span reaches past the fragment's content text
    SpanOutOfBounds {
        span_id: usize,
        end: usize,
        text_len: usize,
    },
    /// A leaf recorded in the pre-pass no longer matches the tree
    StaleLeaf { node: NodeId },
}

impl std::fmt::Display for ApplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyError::SpanOutOfBounds {
                span_id,
                end,
                text_len,
            } => write!(
                f,
                "span {} ends at {} but fragment text is {} bytes",
                span_id, end, text_len
            ),
            ApplyError::StaleLeaf { node } => {
                write!(f, "text leaf {} changed between pre-pass and apply", node)
            }
        }
    }
}

impl std::error::Error for ApplyError {}

// =============================================================================
// Handle
// =============================================================================

/// Record of one apply() call, consumed by revert()
#[derive(Debug, Clone, Default)]
pub struct AnnotationHandle {
    /// Wrapper nodes created by the call, in document order
    wrappers: Vec<NodeId>,
}

impl AnnotationHandle {
    pub fn wrappers(&self) -> &[NodeId] {
        &self.wrappers
    }

    pub fn is_empty(&self) -> bool {
        self.wrappers.is_empty()
    }
}

// =============================================================================
// Apply
// =============================================================================

/// Apply a resolved span forest to the fragment.
///
/// Span coordinates must be in the fragment's content-text space (the
/// concatenation returned by `leaf_inventory`). Any wrappers from an
/// earlier apply are reverted first.
pub fn apply(
    tree: &mut FragmentTree,
    spans: &[Span],
    styles: &StyleRegistry,
) -> Result<AnnotationHandle, ApplyError> {
    revert_all(tree);

    let (text, leaves) = tree.leaf_inventory();
    let mut handle = AnnotationHandle::default();

    if let Some(end) = max_end(spans) {
        if end > text.len() {
            return Err(ApplyError::SpanOutOfBounds {
                span_id: first_exceeding(spans, text.len()),
                end,
                text_len: text.len(),
            });
        }
    }

    for leaf in &leaves {
        let intersecting: Vec<&Span> = spans
            .iter()
            .filter(|s| s.range.overlaps(&leaf.range))
            .collect();
        if intersecting.is_empty() {
            continue;
        }
        splice_leaf(tree, leaf, &intersecting, styles, &mut handle)?;
    }

    Ok(handle)
}

fn max_end(spans: &[Span]) -> Option<usize> {
    spans
        .iter()
        .map(|s| s.range.end.max(max_end(&s.children).unwrap_or(0)))
        .max()
}

fn first_exceeding(spans: &[Span], len: usize) -> usize {
    spans
        .iter()
        .find(|s| s.range.end > len)
        .map(|s| s.span_id)
        .unwrap_or(0)
}

/// Replace one text leaf with the split text/wrapper sequence
fn splice_leaf(
    tree: &mut FragmentTree,
    leaf: &TextLeaf,
    spans: &[&Span],
    styles: &StyleRegistry,
    handle: &mut AnnotationHandle,
) -> Result<(), ApplyError> {
    let parent = tree
        .parent(leaf.node)
        .ok_or(ApplyError::StaleLeaf { node: leaf.node })?;
    let leaf_text = match tree.data(leaf.node) {
        Some(NodeData::Text(content)) if content.len() == leaf.range.len() => content.clone(),
        _ => return Err(ApplyError::StaleLeaf { node: leaf.node }),
    };

    let mut replacements = Vec::new();
    build_segments(
        tree,
        &leaf_text,
        leaf.range.start,
        leaf.range,
        spans,
        styles,
        handle,
        &mut replacements,
    );

    if !tree.splice_child(parent, leaf.node, replacements) {
        return Err(ApplyError::StaleLeaf { node: leaf.node });
    }
    Ok(())
}

/// Emit the node sequence for `range` (global coordinates within one
/// leaf): plain text between spans, a wrapper per intersecting span, with
/// child spans recursing inside their parent's wrapper.
#[allow(clippy::too_many_arguments)]
fn build_segments(
    tree: &mut FragmentTree,
    leaf_text: &str,
    leaf_start: usize,
    range: TextRange,
    spans: &[&Span],
    styles: &StyleRegistry,
    handle: &mut AnnotationHandle,
    out: &mut Vec<NodeId>,
) {
    let mut cursor = range.start;

    for &span in spans {
        let segment = match span.range.intersect(&range) {
            Some(s) => s,
            None => continue,
        };

        if segment.start > cursor {
            let gap = TextRange::new(cursor, segment.start).rebase(leaf_start);
            out.push(tree.new_text(&leaf_text[gap.start..gap.end]));
        }

        let wrapper = new_wrapper(tree, span, styles);
        handle.wrappers.push(wrapper);

        let children: Vec<&Span> = span
            .children
            .iter()
            .filter(|c| c.range.overlaps(&segment))
            .collect();
        let mut inner = Vec::new();
        if children.is_empty() {
            let local = segment.rebase(leaf_start);
            inner.push(tree.new_text(&leaf_text[local.start..local.end]));
        } else {
            build_segments(
                tree, leaf_text, leaf_start, segment, &children, styles, handle, &mut inner,
            );
        }
        for node in inner {
            tree.append_child(wrapper, node);
        }
        out.push(wrapper);

        cursor = segment.end;
    }

    if cursor < range.end {
        let tail = TextRange::new(cursor, range.end).rebase(leaf_start);
        out.push(tree.new_text(&leaf_text[tail.start..tail.end]));
    }
}

fn new_wrapper(tree: &mut FragmentTree, span: &Span, styles: &StyleRegistry) -> NodeId {
    let mut attrs = BTreeMap::new();
    attrs.insert(
        WRAPPER_CATEGORY_ATTR.to_string(),
        span.category.key(),
    );
    for (key, value) in &span.metadata {
        attrs.insert(format!("data-ft-{}", attr_name(key)), value.clone());
    }
    tree.new_node(NodeData::Wrapper {
        span_id: span.span_id,
        classes: styles.classes_for(&span.category),
        attrs,
    })
}

/// Lower-case a metadata key into a data-attribute suffix
fn attr_name(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '-',
        })
        .collect()
}

// =============================================================================
// Revert
// =============================================================================

/// Remove the wrappers recorded in `handle`, restoring the text they
/// wrapped and merging adjacent text nodes back together. Idempotent:
/// wrappers already detached (including by a later implicit revert) are
/// skipped silently.
pub fn revert(tree: &mut FragmentTree, handle: &AnnotationHandle) {
    remove_wrappers(tree, &handle.wrappers);
}

/// Remove every engine-created wrapper currently in the tree. Wrapper
/// nodes exist only through this module, so this touches nothing the
/// engine did not create.
pub fn revert_all(tree: &mut FragmentTree) {
    let wrappers = tree.attached_wrappers();
    remove_wrappers(tree, &wrappers);
}

fn remove_wrappers(tree: &mut FragmentTree, wrappers: &[NodeId]) {
    let mut touched_parents = Vec::new();

    for &wrapper in wrappers {
        if !tree.is_attached(wrapper) {
            continue;
        }
        let parent = match tree.parent(wrapper) {
            Some(p) => p,
            None => continue,
        };
        // Flatten the wrapper (nested wrappers included) back to the text
        // it covered
        let mut covered = String::new();
        collect_subtree_text(tree, wrapper, &mut covered);
        let replacement = tree.new_text(covered);
        if tree.splice_child(parent, wrapper, vec![replacement]) && !touched_parents.contains(&parent)
        {
            touched_parents.push(parent);
        }
    }

    for parent in touched_parents {
        tree.merge_adjacent_text(parent);
    }
}

fn collect_subtree_text(tree: &FragmentTree, node: NodeId, out: &mut String) {
    match tree.data(node) {
        Some(NodeData::Text(content)) => out.push_str(content),
        Some(_) => {
            for &child in tree.children(node) {
                collect_subtree_text(tree, child, out);
            }
        }
        None => {}
    }
}

// =============================================================================
// Tests
// =============================================================================
