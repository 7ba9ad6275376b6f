//! WASM bindings for the annotation engine.
//!
//! Thin wrappers over the native types; all logic lives in `annotate` and
//! `render` so it stays natively testable. Errors cross the boundary as
//! `JsValue` strings; serialization failures are logged to the console and
//! surfaced as null so a broken highlight never blocks the page.

use wasm_bindgen::prelude::*;

use crate::annotate::engine::{Annotator as NativeAnnotator, AnnotatorConfig};
use crate::annotate::ingest::AnalysisPayload;
use crate::annotate::request::AnnotationRequest;
use crate::render::fragment::{FragmentJson, FragmentTree};
use crate::render::markup;
use crate::render::style::StyleRegistry;
use crate::render::tree::{self, AnnotationHandle};

/// Annotation engine + renderers behind a single JS object
#[wasm_bindgen]
pub struct Annotator {
    inner: NativeAnnotator,
    styles: StyleRegistry,
    fragment: Option<FragmentTree>,
    handle: Option<AnnotationHandle>,
}

#[wasm_bindgen]
impl Annotator {
    /// Create a new Annotator with optional JSON configuration
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<Annotator, JsValue> {
        let config: AnnotatorConfig = if config.is_null() || config.is_undefined() {
            AnnotatorConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?
        };

        Ok(Self {
            inner: NativeAnnotator::new(config),
            styles: StyleRegistry::new(),
            fragment: None,
            handle: None,
        })
    }

    /// Hydrate from the backend analysis payload
    #[wasm_bindgen(js_name = hydrateSections)]
    pub fn js_hydrate_sections(&mut self, payload: JsValue) -> Result<(), JsValue> {
        let payload: AnalysisPayload = serde_wasm_bindgen::from_value(payload)
            .map_err(|e| JsValue::from_str(&format!("Invalid payload: {}", e)))?;
        self.inner.hydrate_payload(&payload);
        Ok(())
    }

    /// Hydrate from pre-built annotation requests
    #[wasm_bindgen(js_name = hydrateRequests)]
    pub fn js_hydrate_requests(&mut self, requests: JsValue) -> Result<(), JsValue> {
        let requests: Vec<AnnotationRequest> = serde_wasm_bindgen::from_value(requests)
            .map_err(|e| JsValue::from_str(&format!("Invalid requests: {}", e)))?;
        self.inner.hydrate_requests(requests);
        Ok(())
    }

    /// Override the classes rendered for a category key
    #[wasm_bindgen(js_name = setStyleClass)]
    pub fn js_set_style_class(&mut self, key: &str, classes: &str) {
        self.styles.set_class(key, classes);
    }

    /// Run the pipeline and return `{ spans, stats }`
    #[wasm_bindgen(js_name = annotate)]
    pub fn js_annotate(&mut self, text: &str) -> JsValue {
        let result = self.inner.annotate(text);
        match serde_wasm_bindgen::to_value(&result) {
            Ok(v) => v,
            Err(e) => {
                web_sys::console::error_1(
                    &format!("[Annotator] Serialization failed: {:?}", e).into(),
                );
                JsValue::NULL
            }
        }
    }

    /// Annotate and render as an HTML string
    #[wasm_bindgen(js_name = annotateMarkup)]
    pub fn js_annotate_markup(&mut self, text: &str) -> Result<String, JsValue> {
        let result = self.inner.annotate(text);
        markup::render(text, &result.spans, &self.styles)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Load a mirrored DOM subtree for fragment annotation
    #[wasm_bindgen(js_name = loadFragment)]
    pub fn js_load_fragment(&mut self, fragment: JsValue) -> Result<(), JsValue> {
        let json: FragmentJson = serde_wasm_bindgen::from_value(fragment)
            .map_err(|e| JsValue::from_str(&format!("Invalid fragment: {}", e)))?;
        self.fragment = Some(FragmentTree::from_json(&json));
        self.handle = None;
        Ok(())
    }

    /// Annotate the loaded fragment in place and return it
    #[wasm_bindgen(js_name = applyToFragment)]
    pub fn js_apply_to_fragment(&mut self) -> Result<JsValue, JsValue> {
        let fragment = self
            .fragment
            .as_mut()
            .ok_or_else(|| JsValue::from_str("No fragment loaded"))?;

        // Annotate against the clean content text: earlier wrappers hide
        // their text from the inventory, so strip them before matching
        tree::revert_all(fragment);
        let (text, _) = fragment.leaf_inventory();
        let result = self.inner.annotate(&text);
        let handle = tree::apply(fragment, &result.spans, &self.styles)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.handle = Some(handle);

        serde_wasm_bindgen::to_value(&fragment.to_json())
            .map_err(|e| JsValue::from_str(&format!("Serialization failed: {}", e)))
    }

    /// Remove this engine's wrappers from the loaded fragment and return it
    #[wasm_bindgen(js_name = revertFragment)]
    pub fn js_revert_fragment(&mut self) -> Result<JsValue, JsValue> {
        let fragment = self
            .fragment
            .as_mut()
            .ok_or_else(|| JsValue::from_str("No fragment loaded"))?;

        match self.handle.take() {
            Some(handle) => tree::revert(fragment, &handle),
            None => tree::revert_all(fragment),
        }

        serde_wasm_bindgen::to_value(&fragment.to_json())
            .map_err(|e| JsValue::from_str(&format!("Serialization failed: {}", e)))
    }

    /// Serialize the loaded fragment as markup
    #[wasm_bindgen(js_name = fragmentMarkup)]
    pub fn js_fragment_markup(&self) -> Result<String, JsValue> {
        self.fragment
            .as_ref()
            .map(|f| f.to_markup())
            .ok_or_else(|| JsValue::from_str("No fragment loaded"))
    }

    /// Clear the change detector and cached result
    #[wasm_bindgen(js_name = reset)]
    pub fn js_reset(&mut self) {
        self.inner.reset();
    }

    /// Number of hydrated annotation requests
    #[wasm_bindgen(js_name = requestCount)]
    pub fn js_request_count(&self) -> usize {
        self.inner.request_count()
    }

    /// Share of annotate() calls served from cache, as a percentage
    #[wasm_bindgen(js_name = skipRate)]
    pub fn js_skip_rate(&self) -> f64 {
        self.inner.skip_rate()
    }
}
