//! Annotation categories and requests.
//!
//! Upstream analysis produces three kinds of needles: full analyzed
//! sentences, the search term derived from each sentence, and named
//! entities. Each becomes an [`AnnotationRequest`] with a category, a
//! precedence priority, and opaque metadata carried through to the
//! rendered wrapper (tooltip title/URL, entity label, ...).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default priorities, lowest number wins precedence.
/// Entities are the most specific match, sentences the least.
pub const PRIORITY_ENTITY: u8 = 1;
pub const PRIORITY_SEARCH_TERM: u8 = 2;
pub const PRIORITY_SENTENCE: u8 = 3;

/// Kind of annotation a request produces
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// A full analyzed sentence (click-to-filter sources)
    Sentence,
    /// The web-search term derived from a sentence
    SearchTerm,
    /// A named entity with its label (PERSON, LOCATION, ...)
    Entity(String),
}

impl Category {
    pub fn default_priority(&self) -> u8 {
        match self {
            Category::Entity(_) => PRIORITY_ENTITY,
            Category::SearchTerm => PRIORITY_SEARCH_TERM,
            Category::Sentence => PRIORITY_SENTENCE,
        }
    }

    /// Stable key used for style lookup and data attributes,
    /// e.g. "sentence", "search_term", "entity:PERSON"
    pub fn key(&self) -> String {
        match self {
            Category::Sentence => "sentence".to_string(),
            Category::SearchTerm => "search_term".to_string(),
            Category::Entity(label) => format!("entity:{}", label),
        }
    }
}

/// A single "find this text and annotate it" request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationRequest {
    pub text: String,
    pub category: Category,
    /// Lower number = higher precedence during overlap resolution
    pub priority: u8,
    /// Restrict matches to word boundaries (entities only by default)
    #[serde(default)]
    pub whole_word: bool,
    /// Opaque payload rendered as data attributes on the wrapper
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl AnnotationRequest {
    pub fn sentence(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: Category::Sentence,
            priority: PRIORITY_SENTENCE,
            whole_word: false,
            metadata: BTreeMap::new(),
        }
    }

    pub fn search_term(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: Category::SearchTerm,
            priority: PRIORITY_SEARCH_TERM,
            whole_word: false,
            metadata: BTreeMap::new(),
        }
    }

    /// Entity requests match whole words only: "Trump" must not light up
    /// inside "Trumpism".
    pub fn entity(text: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        let mut metadata = BTreeMap::new();
        metadata.insert("label".to_string(), label.clone());
        Self {
            text: text.into(),
            category: Category::Entity(label),
            priority: PRIORITY_ENTITY,
            whole_word: true,
            metadata,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
