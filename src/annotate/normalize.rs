//! Whitespace normalization with a bidirectional offset map.
//!
//! Page text arrives with irregular spacing (newlines inside sentences,
//! runs of spaces left by markup stripping), while the analysis service
//! reports needles with single spaces. Matching therefore runs over a
//! normalized view in which every whitespace run is collapsed to one
//! space, and every normalized byte remembers which original byte it came
//! from so that resolved spans land on the original text.
//!
//! Policy: leading and trailing runs collapse exactly like interior runs,
//! so a non-empty all-whitespace input normalizes to a single space and
//! the empty input stays empty.

use super::range::TextRange;

/// A whitespace-collapsed view of a source string plus offset maps.
///
/// Built once per haystack, immutable afterwards. Both mapping directions
/// are total and never panic; out-of-range indices clamp to the end.
#[derive(Debug, Clone)]
pub struct NormalizedText {
    text: String,
    /// Per normalized byte: the source byte where the originating
    /// character (or whitespace run) starts. One sentinel entry at the
    /// end maps `text.len()` to `source_len`.
    starts: Vec<usize>,
    /// Per normalized byte: the source byte just past the originating
    /// character (for a collapsed run: just past its first character).
    ends: Vec<usize>,
    source_len: usize,
}

impl NormalizedText {
    pub fn new(source: &str) -> Self {
        let mut text = String::with_capacity(source.len());
        let mut starts = Vec::with_capacity(source.len() + 1);
        let mut ends = Vec::with_capacity(source.len());
        let mut in_whitespace = false;

        for (offset, ch) in source.char_indices() {
            let char_end = offset + ch.len_utf8();
            if ch.is_whitespace() {
                if !in_whitespace {
                    text.push(' ');
                    starts.push(offset);
                    ends.push(char_end);
                    in_whitespace = true;
                }
            } else {
                in_whitespace = false;
                text.push(ch);
                for _ in 0..ch.len_utf8() {
                    starts.push(offset);
                    ends.push(char_end);
                }
            }
        }

        starts.push(source.len());

        Self {
            text,
            starts,
            ends,
            source_len: source.len(),
        }
    }

    /// The whitespace-collapsed text (case preserved)
    pub fn normalized(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Map a normalized byte index to the smallest original byte index
    /// whose normalized walk reaches it.
    pub fn to_original(&self, norm: usize) -> usize {
        let idx = norm.min(self.text.len());
        self.starts[idx]
    }

    /// Map an original byte index to the normalized index covering it.
    pub fn to_normalized(&self, orig: usize) -> usize {
        if orig >= self.source_len {
            return self.text.len();
        }
        // First normalized byte whose source start is at or past `orig`;
        // an index inside a collapsed run maps past the single space that
        // stands in for the run.
        self.starts[..self.text.len()].partition_point(|&s| s < orig)
    }

    /// Map a normalized-coordinate range back onto the original text.
    pub fn original_range(&self, range: TextRange) -> TextRange {
        if range.is_empty() {
            let at = self.to_original(range.start);
            return TextRange::new(at, at);
        }
        let start = self.to_original(range.start);
        let last = (range.end - 1).min(self.ends.len().saturating_sub(1));
        let end = self.ends[last];
        TextRange::new(start, end.max(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_runs_to_single_space() {
        let norm = NormalizedText::new("a  b\t\nc");
        assert_eq!(norm.normalized(), "a b c");
    }

    #[test]
    fn test_leading_and_trailing_runs() {
        let norm = NormalizedText::new("  hello  ");
        assert_eq!(norm.normalized(), " hello ");
    }

    #[test]
    fn test_empty_and_all_whitespace() {
        let empty = NormalizedText::new("");
        assert_eq!(empty.normalized(), "");
        assert_eq!(empty.to_original(0), 0);
        assert_eq!(empty.to_normalized(0), 0);

        let blank = NormalizedText::new(" \t\n ");
        assert_eq!(blank.normalized(), " ");
        assert_eq!(blank.to_original(0), 0);
        assert_eq!(blank.to_original(1), 4);
    }

    #[test]
    fn test_to_original_is_total() {
        let norm = NormalizedText::new("x  y");
        // Indices past the end clamp instead of panicking
        assert_eq!(norm.to_original(3), 4);
        assert_eq!(norm.to_original(99), 4);
        assert_eq!(norm.to_normalized(99), 3);
    }

    #[test]
    fn test_original_range_covers_collapsed_run() {
        // source: a=0, sp=1, sp=2, b=3, tab=4, nl=5, c=6
        let norm = NormalizedText::new("a  b\t\nc");
        let range = norm.original_range(TextRange::new(2, 5)); // "b c"
        assert_eq!(range, TextRange::new(3, 7));
        assert_eq!(range.slice("a  b\t\nc"), "b\t\nc");
    }

    #[test]
    fn test_multibyte_characters() {
        let source = "é  x";
        let norm = NormalizedText::new(source);
        assert_eq!(norm.normalized(), "é x");
        // both bytes of 'é' map back to its start
        assert_eq!(norm.to_original(0), 0);
        assert_eq!(norm.to_original(1), 0);
        assert_eq!(norm.to_original(2), 2); // the collapsed run
        assert_eq!(norm.to_original(3), 4); // 'x'
        let range = norm.original_range(TextRange::new(0, 4));
        assert_eq!(range.slice(source), "é  x");
    }

    #[test]
    fn test_offset_round_trip() {
        // to_normalized(to_original(i)) is exact at every character
        // boundary; inside a multi-byte character it lands on the
        // character's first byte.
        let samples = [
            "plain text with no runs",
            "  leading and trailing  ",
            "runs\t\t\tof\n\n mixed   whitespace",
            "unicode é ß ∂ mixed  in",
        ];
        for source in samples {
            let norm = NormalizedText::new(source);
            let text = norm.normalized().to_string();
            for i in (0..=text.len()).filter(|&i| text.is_char_boundary(i)) {
                let back = norm.to_normalized(norm.to_original(i));
                assert_eq!(back, i, "round trip drifted for {:?} at {}", source, i);
            }
            for i in (0..text.len()).filter(|&i| !text.is_char_boundary(i)) {
                let back = norm.to_normalized(norm.to_original(i));
                assert!(back < i && text.is_char_boundary(back));
            }
        }
    }
}
