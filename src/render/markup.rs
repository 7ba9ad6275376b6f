//! MarkupRenderer - annotated HTML string output
//!
//! The web app variant renders the analyzed content as markup rather than
//! mutating a live tree: the raw text is HTML-escaped and wrapper tags are
//! inserted around each resolved span. Escaping changes byte lengths, so
//! the output is built segment by segment with the cursor walking the
//! *unescaped* coordinates; spans never index into escaped text.
//!
//! Span offsets that fall outside the text or off a character boundary
//! indicate a coordinate-space bug upstream and fail loudly instead of
//! truncating output.

use crate::annotate::range::TextRange;
use crate::annotate::resolver::Span;

use super::fragment::{WRAPPER_CATEGORY_ATTR, WRAPPER_ID_ATTR};
use super::style::StyleRegistry;

// =============================================================================
// Errors
// =============================================================================

/// Internal invariant violations (programming-error class)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    /// Span offsets reach outside the text
    SpanOutOfBounds {
        span_id: usize,
        start: usize,
        end: usize,
        text_len: usize,
    },
    /// Span offsets split a multi-byte character
    SpanOffCharBoundary { span_id: usize, at: usize },
    /// Sibling spans are unsorted or overlap
    UnorderedSpans { span_id: usize },
}

impl std::fmt::Display for MarkupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkupError::SpanOutOfBounds {
                span_id,
                start,
                end,
                text_len,
            } => write!(
                f,
                "span {} [{}, {}) exceeds text length {}",
                span_id, start, end, text_len
            ),
            MarkupError::SpanOffCharBoundary { span_id, at } => {
                write!(f, "span {} offset {} is not a character boundary", span_id, at)
            }
            MarkupError::UnorderedSpans { span_id } => {
                write!(f, "span {} out of order in the resolved list", span_id)
            }
        }
    }
}

impl std::error::Error for MarkupError {}

// =============================================================================
// Rendering
// =============================================================================

/// Render `text` with wrapper tags inserted around each span.
///
/// Spans must be the resolver's output: siblings sorted and
/// non-overlapping, children strictly inside their parent. The output is
/// safe to inject as markup; metadata values are escaped into `data-*`
/// attributes.
pub fn render(text: &str, spans: &[Span], styles: &StyleRegistry) -> Result<String, MarkupError> {
    let mut out = String::with_capacity(text.len() + spans.len() * 64);
    render_range(text, TextRange::new(0, text.len()), spans, styles, &mut out)?;
    Ok(out)
}

fn render_range(
    text: &str,
    range: TextRange,
    spans: &[Span],
    styles: &StyleRegistry,
    out: &mut String,
) -> Result<(), MarkupError> {
    let mut cursor = range.start;

    for span in spans {
        validate(text, span)?;
        if span.range.start < cursor || span.range.end > range.end {
            return Err(MarkupError::UnorderedSpans {
                span_id: span.span_id,
            });
        }

        out.push_str(&html_escape::encode_safe(&text[cursor..span.range.start]));
        open_tag(span, styles, out);
        if span.children.is_empty() {
            out.push_str(&html_escape::encode_safe(
                &text[span.range.start..span.range.end],
            ));
        } else {
            render_range(text, span.range, &span.children, styles, out)?;
        }
        out.push_str("</span>");
        cursor = span.range.end;
    }

    out.push_str(&html_escape::encode_safe(&text[cursor..range.end]));
    Ok(())
}

fn validate(text: &str, span: &Span) -> Result<(), MarkupError> {
    let TextRange { start, end } = span.range;
    if end > text.len() || start > end {
        return Err(MarkupError::SpanOutOfBounds {
            span_id: span.span_id,
            start,
            end,
            text_len: text.len(),
        });
    }
    for at in [start, end] {
        if !text.is_char_boundary(at) {
            return Err(MarkupError::SpanOffCharBoundary {
                span_id: span.span_id,
                at,
            });
        }
    }
    Ok(())
}

fn open_tag(span: &Span, styles: &StyleRegistry, out: &mut String) {
    out.push_str("<span");
    push_attr(out, "class", &styles.classes_for(&span.category));
    push_attr(out, WRAPPER_ID_ATTR, &span.span_id.to_string());
    push_attr(out, WRAPPER_CATEGORY_ATTR, &span.category.key());
    for (key, value) in &span.metadata {
        push_attr(out, &format!("data-ft-{}", attr_name(key)), value);
    }
    out.push('>');
}

fn push_attr(out: &mut String, key: &str, value: &str) {
    out.push(' ');
    out.push_str(key);
    out.push_str("=\"");
    out.push_str(&html_escape::encode_double_quoted_attribute(value));
    out.push('"');
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
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::engine::Annotator;
    use crate::annotate::request::AnnotationRequest;

    fn spans_for(text: &str, requests: Vec<AnnotationRequest>) -> Vec<Span> {
        let mut annotator = Annotator::default();
        annotator.hydrate_requests(requests);
        annotator.annotate(text).spans
    }

    /// Strip inserted tags and undo escaping (test helper for the
    /// round-trip property)
    fn strip_and_unescape(markup: &str) -> String {
        let mut plain = String::new();
        let mut in_tag = false;
        for c in markup.chars() {
            match c {
                '<' => in_tag = true,
                '>' => in_tag = false,
                c if !in_tag => plain.push(c),
                _ => {}
            }
        }
        plain
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#x27;", "'")
            .replace("&amp;", "&")
    }

    #[test]
    fn test_escaping_around_wrapper() {
        let text = "<b>A&B</b>";
        let spans = spans_for(text, vec![AnnotationRequest::search_term("A&B")]);
        assert_eq!(spans.len(), 1);

        let markup = render(text, &spans, &StyleRegistry::new()).unwrap();
        assert!(markup.starts_with("&lt;b&gt;<span "));
        assert!(markup.contains(">A&amp;B</span>"));
        assert!(markup.ends_with("&lt;/b&gt;"));
        assert_eq!(strip_and_unescape(&markup), text);
    }

    #[test]
    fn test_plain_text_passthrough() {
        let markup = render("no annotations here", &[], &StyleRegistry::new()).unwrap();
        assert_eq!(markup, "no annotations here");
    }

    #[test]
    fn test_nested_wrappers() {
        let text = "Paris is the capital of France.";
        let spans = spans_for(
            text,
            vec![
                AnnotationRequest::search_term("capital of France"),
                AnnotationRequest::entity("France", "GPE"),
            ],
        );
        let markup = render(text, &spans, &StyleRegistry::new()).unwrap();

        let outer = markup.find("ft-search-term").unwrap();
        let inner = markup.find("ft-entity-gpe").unwrap();
        assert!(outer < inner);
        assert!(markup.contains(">France</span></span>."));
        assert_eq!(strip_and_unescape(&markup), text);
    }

    #[test]
    fn test_metadata_escaped_in_attributes() {
        let text = "a claim about things";
        let spans = spans_for(
            text,
            vec![AnnotationRequest::sentence("a claim about things")
                .with_metadata("source_title", r#"He said "no" & left"#)],
        );
        let markup = render(text, &spans, &StyleRegistry::new()).unwrap();

        assert!(markup.contains("data-ft-source-title=\""));
        assert!(!markup.contains(r#"said "no""#), "raw quotes must not survive");
        assert!(markup.contains("&quot;no&quot;"));
    }

    #[test]
    fn test_identity_and_category_attributes() {
        let text = "Paris";
        let spans = spans_for(text, vec![AnnotationRequest::entity("Paris", "GPE")]);
        let markup = render(text, &spans, &StyleRegistry::new()).unwrap();

        assert!(markup.contains(r#"data-ft-id="0""#));
        assert!(markup.contains(r#"data-ft-category="entity:GPE""#));
    }

    #[test]
    fn test_out_of_bounds_span_fails_loudly() {
        let text = "short";
        let mut spans = spans_for(text, vec![AnnotationRequest::search_term("short")]);
        spans[0].range.end = 50;

        let err = render(text, &spans, &StyleRegistry::new()).unwrap_err();
        assert!(matches!(err, MarkupError::SpanOutOfBounds { .. }));
    }

    #[test]
    fn test_multibyte_text_renders_cleanly() {
        let text = "die große Zahl";
        let spans = spans_for(text, vec![AnnotationRequest::search_term("GROSSE")]);
        let markup = render(text, &spans, &StyleRegistry::new()).unwrap();
        assert!(markup.contains(">große</span>"));
        assert_eq!(strip_and_unescape(&markup), text);
    }
}
