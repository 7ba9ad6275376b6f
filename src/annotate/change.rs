//! ChangeDetector: Content-Addressable Change Detection
//!
//! Annotation is re-invoked whenever a new analysis result arrives, often
//! against the exact same haystack. Content hashing detects that case so
//! the engine can serve its cached result instead of re-running the
//! pipeline.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Result of change detection
#[derive(Debug, Clone, Copy)]
pub struct ChangeResult {
    /// True if content has changed since last check
    pub has_changed: bool,
    /// Current content hash
    pub content_hash: u64,
}

/// Content-addressable change detector
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last_hash: Option<u64>,
    check_count: u64,
    skip_count: u64,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `text` differs from the previous check
    pub fn check(&mut self, text: &str) -> ChangeResult {
        self.check_count += 1;

        let content_hash = Self::compute_hash(text);
        let has_changed = match self.last_hash {
            None => true,
            Some(prev) => prev != content_hash,
        };

        if !has_changed {
            self.skip_count += 1;
        }
        self.last_hash = Some(content_hash);

        ChangeResult {
            has_changed,
            content_hash,
        }
    }

    /// Check and return only the changed flag
    pub fn has_changed(&mut self, text: &str) -> bool {
        self.check(text).has_changed
    }

    /// Share of checks that found unchanged content, as a percentage
    pub fn skip_rate(&self) -> f64 {
        if self.check_count == 0 {
            return 0.0;
        }
        (self.skip_count as f64 / self.check_count as f64) * 100.0
    }

    pub fn check_count(&self) -> u64 {
        self.check_count
    }

    pub fn reset(&mut self) {
        self.last_hash = None;
        self.check_count = 0;
        self.skip_count = 0;
    }

    fn compute_hash(text: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_check_counts_as_changed() {
        let mut detector = ChangeDetector::new();
        assert!(detector.check("hello").has_changed);
    }

    #[test]
    fn test_unchanged_content_detected() {
        let mut detector = ChangeDetector::new();
        detector.check("hello");
        assert!(!detector.has_changed("hello"));
        assert!(detector.has_changed("world"));
    }

    #[test]
    fn test_skip_rate() {
        let mut detector = ChangeDetector::new();
        detector.check("a");
        detector.check("a");
        detector.check("a");
        assert!(detector.skip_rate() > 60.0);

        detector.reset();
        assert_eq!(detector.skip_rate(), 0.0);
    }

    #[test]
    fn test_distinct_content_distinct_hash() {
        let mut detector = ChangeDetector::new();
        let first = detector.check("Hello").content_hash;
        let second = detector.check("World").content_hash;
        assert_ne!(first, second);
    }
}
