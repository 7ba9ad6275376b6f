//! TraceCore: Text-Span Annotation Engine
//!
//! A Rust/WASM implementation of the FactTrace highlighting pipeline.
//!
//! # Architecture
//!
//! ## Annotation Components
//! - `normalize.rs` - NormalizedText: whitespace collapsing with offset maps
//! - `matcher.rs` - SpanMatcher: multi-needle matching via Aho-Corasick
//! - `resolver.rs` - Overlap resolution into a nested span forest
//! - `engine.rs` - Annotator: **unified facade** - single annotate() call
//! - `ingest.rs` - Backend analysis payload -> annotation requests
//! - `change.rs` - ChangeDetector: content-addressable skip detection
//!
//! ## Render Components
//! - `fragment.rs` - FragmentTree: owned node tree mirroring a DOM subtree
//! - `tree.rs` - TreeApplier: leaf splitting + wrapper insertion + revert
//! - `markup.rs` - MarkupRenderer: escaped HTML string with wrapper tags
//! - `style.rs` - StyleRegistry: category -> CSS class lookup
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { Annotator } from 'tracecore';
//!
//! await init();
//!
//! // Create the annotator and feed it the backend analysis payload
//! const annotator = new Annotator(null);
//! annotator.hydrateSections(payload);
//!
//! // Markup variant: returns an HTML string with highlight wrappers
//! const html = annotator.annotateMarkup(articleText);
//!
//! // Fragment variant: annotate a mirrored DOM subtree in place
//! annotator.loadFragment(fragmentJson);
//! const annotated = annotator.applyToFragment();
//!
//! // Result contains: resolved spans, per-phase timings
//! const result = annotator.annotate(articleText);
//! console.log(result.spans);
//! console.log(result.stats);
//! ```

pub mod annotate;
pub mod render;
pub mod wasm;

// Public exports - annotation engine
pub use annotate::*;

// Public exports - renderers
pub use render::*;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("tracecore v{}", env!("CARGO_PKG_VERSION"))
}
