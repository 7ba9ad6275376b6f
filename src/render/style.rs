//! StyleRegistry - category to CSS class lookup
//!
//! The engine treats styling as an opaque mapping from category keys to
//! class attribute strings; the host ships the actual CSS. Defaults cover
//! the entity labels the analysis service emits, with a generic fallback
//! for labels it grows later.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::annotate::request::Category;

/// Base class carried by every wrapper (used by delegated event handlers)
pub const BASE_CLASS: &str = "ft-highlight";

/// Entity labels with a dedicated modifier class
const KNOWN_ENTITY_LABELS: &[&str] = &[
    "PERSON",
    "ORGANIZATION",
    "LOCATION",
    "GPE",
    "DATE",
    "LAW",
    "EVENT",
];

/// Category key -> class attribute lookup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StyleRegistry {
    overrides: HashMap<String, String>,
}

impl StyleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the classes for a category key (e.g. "sentence",
    /// "entity:PERSON")
    pub fn set_class(&mut self, key: impl Into<String>, classes: impl Into<String>) {
        self.overrides.insert(key.into(), classes.into());
    }

    /// Class attribute value for a category
    pub fn classes_for(&self, category: &Category) -> String {
        if let Some(classes) = self.overrides.get(&category.key()) {
            return classes.clone();
        }

        let specific = match category {
            Category::Sentence => "ft-sentence".to_string(),
            Category::SearchTerm => "ft-search-term".to_string(),
            Category::Entity(label) => {
                if KNOWN_ENTITY_LABELS.contains(&label.as_str()) {
                    format!("ft-entity ft-entity-{}", label.to_lowercase())
                } else {
                    "ft-entity".to_string()
                }
            }
        };
        format!("{} {}", BASE_CLASS, specific)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_classes() {
        let styles = StyleRegistry::new();
        assert_eq!(
            styles.classes_for(&Category::Sentence),
            "ft-highlight ft-sentence"
        );
        assert_eq!(
            styles.classes_for(&Category::Entity("PERSON".into())),
            "ft-highlight ft-entity ft-entity-person"
        );
    }

    #[test]
    fn test_unknown_entity_label_falls_back() {
        let styles = StyleRegistry::new();
        assert_eq!(
            styles.classes_for(&Category::Entity("WORK_OF_ART".into())),
            "ft-highlight ft-entity"
        );
    }

    #[test]
    fn test_override_wins() {
        let mut styles = StyleRegistry::new();
        styles.set_class("search_term", "custom-term");
        assert_eq!(styles.classes_for(&Category::SearchTerm), "custom-term");
    }
}
