//! FragmentTree - owned node tree mirroring a DOM subtree
//!
//! The browser side walks the real DOM and mirrors the subtree it wants
//! annotated into this tree (elements with tag + attributes, text leaves);
//! after annotation it syncs the result back. Keeping an owned tree on
//! this side of the boundary means leaf splitting, wrapper insertion, and
//! revert are ordinary in-place mutations with no JS object churn.
//!
//! Nodes live in an arena indexed by [`NodeId`]. Detached nodes stay in
//! the arena as tombstones; traversals only ever follow child links from
//! the root, so tombstones are invisible.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::annotate::range::TextRange;

pub type NodeId = usize;

/// Elements whose text never participates in matching
const NON_CONTENT_TAGS: &[&str] = &["script", "style", "noscript"];

/// Attribute carrying the span identity on annotation wrappers
pub const WRAPPER_ID_ATTR: &str = "data-ft-id";
/// Attribute carrying the category key on annotation wrappers
pub const WRAPPER_CATEGORY_ATTR: &str = "data-ft-category";

// =============================================================================
// Node data
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeData {
    Element {
        tag: String,
        attrs: BTreeMap<String, String>,
    },
    Text(String),
    /// Annotation wrapper inserted by the tree applier. Only the applier
    /// creates these, so their presence alone marks engine-owned nodes.
    Wrapper {
        span_id: usize,
        classes: String,
        attrs: BTreeMap<String, String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A text leaf located in the concatenated content text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLeaf {
    pub node: NodeId,
    /// Range of this leaf in the concatenated document-order text
    pub range: TextRange,
}

// =============================================================================
// FragmentTree
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for FragmentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentTree {
    /// An empty fragment (root element with no children)
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Element {
                    tag: "fragment".to_string(),
                    attrs: BTreeMap::new(),
                },
                parent: None,
                children: Vec::new(),
            }],
            root: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn data(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node).map(|n| &n.data)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|n| n.parent)
    }

    /// True if the node is reachable from the root
    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                // A parent link alone is not enough: the parent must still
                // list this node among its children
                Some(parent) if self.children(parent).contains(&current) => current = parent,
                _ => return false,
            }
        }
    }

    pub(crate) fn new_node(&mut self, data: NodeData) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub(crate) fn new_text(&mut self, text: impl Into<String>) -> NodeId {
        self.new_node(NodeData::Text(text.into()))
    }

    pub(crate) fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    /// Replace `child` in `parent`'s child list with `replacements`.
    /// Returns false if `child` is not a child of `parent`.
    pub(crate) fn splice_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
        replacements: Vec<NodeId>,
    ) -> bool {
        let position = match self.nodes[parent].children.iter().position(|&c| c == child) {
            Some(p) => p,
            None => return false,
        };
        self.nodes[child].parent = None;
        for &r in &replacements {
            self.nodes[r].parent = Some(parent);
        }
        self.nodes[parent]
            .children
            .splice(position..=position, replacements);
        true
    }

    // -------------------------------------------------------------------------
    // Content inventory
    // -------------------------------------------------------------------------

    /// Walk the text-bearing leaves in document order, skipping leaves
    /// under non-content elements (script/style/noscript/hidden) and
    /// leaves already inside an annotation wrapper. Returns the
    /// concatenated content text and each leaf's range inside it.
    pub fn leaf_inventory(&self) -> (String, Vec<TextLeaf>) {
        let mut text = String::new();
        let mut leaves = Vec::new();
        self.collect_leaves(self.root, false, &mut text, &mut leaves);
        (text, leaves)
    }

    fn collect_leaves(
        &self,
        node: NodeId,
        in_wrapper: bool,
        text: &mut String,
        leaves: &mut Vec<TextLeaf>,
    ) {
        match &self.nodes[node].data {
            NodeData::Text(content) => {
                if !in_wrapper {
                    let start = text.len();
                    text.push_str(content);
                    leaves.push(TextLeaf {
                        node,
                        range: TextRange::new(start, text.len()),
                    });
                }
            }
            NodeData::Element { tag, attrs } => {
                if Self::is_non_content(tag, attrs) {
                    return;
                }
                for &child in &self.nodes[node].children {
                    self.collect_leaves(child, in_wrapper, text, leaves);
                }
            }
            NodeData::Wrapper { .. } => {
                for &child in &self.nodes[node].children {
                    self.collect_leaves(child, true, text, leaves);
                }
            }
        }
    }

    fn is_non_content(tag: &str, attrs: &BTreeMap<String, String>) -> bool {
        NON_CONTENT_TAGS.contains(&tag.to_ascii_lowercase().as_str())
            || attrs.contains_key("hidden")
    }

    /// All text in document order, wrappers included
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(self.root, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node].data {
            NodeData::Text(content) => out.push_str(content),
            _ => {
                for &child in &self.nodes[node].children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Wrapper nodes currently attached, in document order
    pub fn attached_wrappers(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_wrappers(self.root, &mut out);
        out
    }

    fn collect_wrappers(&self, node: NodeId, out: &mut Vec<NodeId>) {
        if matches!(self.nodes[node].data, NodeData::Wrapper { .. }) {
            out.push(node);
        }
        for &child in &self.nodes[node].children {
            self.collect_wrappers(child, out);
        }
    }

    /// Number of nodes reachable from the root
    pub fn attached_node_count(&self) -> usize {
        self.count_attached(self.root)
    }

    fn count_attached(&self, node: NodeId) -> usize {
        1 + self
            .nodes[node]
            .children
            .iter()
            .map(|&c| self.count_attached(c))
            .sum::<usize>()
    }

    /// Merge adjacent text children of `parent` into single nodes
    /// (the DOM `Node.normalize()` of this tree)
    pub fn merge_adjacent_text(&mut self, parent: NodeId) {
        let children = self.nodes[parent].children.clone();
        let mut merged: Vec<NodeId> = Vec::with_capacity(children.len());
        for child in children {
            let is_text = matches!(self.nodes[child].data, NodeData::Text(_));
            if is_text {
                if let Some(&last) = merged.last() {
                    if matches!(self.nodes[last].data, NodeData::Text(_)) {
                        let addition = match &self.nodes[child].data {
                            NodeData::Text(t) => t.clone(),
                            _ => unreachable!(),
                        };
                        if let NodeData::Text(existing) = &mut self.nodes[last].data {
                            existing.push_str(&addition);
                        }
                        self.nodes[child].parent = None;
                        continue;
                    }
                }
            }
            merged.push(child);
        }
        self.nodes[parent].children = merged;
    }

    // -------------------------------------------------------------------------
    // Serialization
    // -------------------------------------------------------------------------

    /// Serialize the fragment as markup (wrapper nodes render as spans)
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        for &child in &self.nodes[self.root].children {
            self.write_markup(child, &mut out);
        }
        out
    }

    fn write_markup(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node].data {
            NodeData::Text(content) => {
                out.push_str(&html_escape::encode_safe(content));
            }
            NodeData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (key, value) in attrs {
                    Self::write_attr(key, value, out);
                }
                out.push('>');
                for &child in &self.nodes[node].children {
                    self.write_markup(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            NodeData::Wrapper {
                span_id,
                classes,
                attrs,
            } => {
                out.push_str("<span");
                Self::write_attr("class", classes, out);
                Self::write_attr(WRAPPER_ID_ATTR, &span_id.to_string(), out);
                for (key, value) in attrs {
                    Self::write_attr(key, value, out);
                }
                out.push('>');
                for &child in &self.nodes[node].children {
                    self.write_markup(child, out);
                }
                out.push_str("</span>");
            }
        }
    }

    fn write_attr(key: &str, value: &str, out: &mut String) {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&html_escape::encode_double_quoted_attribute(value));
        out.push('"');
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Incremental fragment construction, document order
pub struct FragmentBuilder {
    tree: FragmentTree,
    stack: Vec<NodeId>,
}

impl Default for FragmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentBuilder {
    pub fn new() -> Self {
        let tree = FragmentTree::new();
        let root = tree.root();
        Self {
            tree,
            stack: vec![root],
        }
    }

    fn current(&self) -> NodeId {
        *self.stack.last().unwrap_or(&0)
    }

    pub fn open_element(&mut self, tag: impl Into<String>) -> &mut Self {
        let node = self.tree.new_node(NodeData::Element {
            tag: tag.into(),
            attrs: BTreeMap::new(),
        });
        self.tree.append_child(self.current(), node);
        self.stack.push(node);
        self
    }

    /// Set an attribute on the currently open element
    pub fn attr(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let current = self.current();
        if let NodeData::Element { attrs, .. } = &mut self.tree.nodes[current].data {
            attrs.insert(key.into(), value.into());
        }
        self
    }

    pub fn text(&mut self, content: impl Into<String>) -> &mut Self {
        let node = self.tree.new_text(content);
        self.tree.append_child(self.current(), node);
        self
    }

    pub fn close_element(&mut self) -> &mut Self {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
        self
    }

    pub fn finish(self) -> FragmentTree {
        self.tree
    }
}

// =============================================================================
// JSON boundary shape
// =============================================================================

/// Nested JSON shape the host exchanges fragments in
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FragmentJson {
    Element {
        tag: String,
        #[serde(default)]
        attrs: BTreeMap<String, String>,
        #[serde(default)]
        children: Vec<FragmentJson>,
    },
    Text {
        text: String,
    },
}

impl FragmentTree {
    pub fn from_json(json: &FragmentJson) -> Self {
        let mut tree = FragmentTree::new();
        let root = tree.root();
        match json {
            FragmentJson::Element { tag, children, .. } if tag == "fragment" => {
                for child in children {
                    let node = tree.import_json(child);
                    tree.append_child(root, node);
                }
            }
            other => {
                let node = tree.import_json(other);
                tree.append_child(root, node);
            }
        }
        tree
    }

    fn import_json(&mut self, json: &FragmentJson) -> NodeId {
        match json {
            FragmentJson::Text { text } => self.new_text(text.clone()),
            FragmentJson::Element {
                tag,
                attrs,
                children,
            } => {
                // Spans carrying the wrapper identity attribute are
                // re-imported as engine-owned wrappers, so a reloaded
                // fragment stays revertable.
                let node = if tag == "span" && attrs.contains_key(WRAPPER_ID_ATTR) {
                    let span_id = attrs
                        .get(WRAPPER_ID_ATTR)
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0);
                    let classes = attrs.get("class").cloned().unwrap_or_default();
                    let extra: BTreeMap<String, String> = attrs
                        .iter()
                        .filter(|(k, _)| k.as_str() != WRAPPER_ID_ATTR && k.as_str() != "class")
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    self.new_node(NodeData::Wrapper {
                        span_id,
                        classes,
                        attrs: extra,
                    })
                } else {
                    self.new_node(NodeData::Element {
                        tag: tag.clone(),
                        attrs: attrs.clone(),
                    })
                };
                for child in children {
                    let imported = self.import_json(child);
                    self.append_child(node, imported);
                }
                node
            }
        }
    }

    pub fn to_json(&self) -> FragmentJson {
        self.export_json(self.root)
    }

    /// Parse the JSON boundary shape from a string
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let parsed: FragmentJson = serde_json::from_str(json)?;
        Ok(Self::from_json(&parsed))
    }

    /// Serialize to the JSON boundary shape as a string
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_json())
    }

    fn export_json(&self, node: NodeId) -> FragmentJson {
        match &self.nodes[node].data {
            NodeData::Text(text) => FragmentJson::Text { text: text.clone() },
            NodeData::Element { tag, attrs } => FragmentJson::Element {
                tag: tag.clone(),
                attrs: attrs.clone(),
                children: self.nodes[node]
                    .children
                    .iter()
                    .map(|&c| self.export_json(c))
                    .collect(),
            },
            NodeData::Wrapper {
                span_id,
                classes,
                attrs,
            } => {
                let mut all_attrs = attrs.clone();
                all_attrs.insert("class".to_string(), classes.clone());
                all_attrs.insert(WRAPPER_ID_ATTR.to_string(), span_id.to_string());
                FragmentJson::Element {
                    tag: "span".to_string(),
                    attrs: all_attrs,
                    children: self.nodes[node]
                        .children
                        .iter()
                        .map(|&c| self.export_json(c))
                        .collect(),
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
