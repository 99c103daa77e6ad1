//! Framework-neutral WASM <-> JavaScript bridge.

use glance_core::{MalformedBundle, SummarizeConfig};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Summarize a FHIR bundle passed as a plain JavaScript object.
///
/// `config` may be omitted or partial; missing windows fall back to the
/// defaults baked into `SummarizeConfig`.
#[wasm_bindgen]
pub fn summarize_bundle(
    input_bundle: JsValue,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let bundle_value = from_value::<serde_json::Value>(input_bundle)
        .map_err(|err| JsValue::from_str(&format!("could not read bundle JSON: {err}")))?;

    let config = match config {
        Some(js_config) => from_value::<SummarizeConfig>(js_config)
            .map_err(|err| JsValue::from_str(&format!("could not read config: {err}")))?,
        None => SummarizeConfig::default(),
    };

    let snapshot = glance_fhir::summarize_bundle_value(&bundle_value, &config)
        .map_err(|err| JsValue::from_str(&format_bundle_error(err)))?;

    to_value(&snapshot)
        .map_err(|err| JsValue::from_str(&format!("could not serialize snapshot: {err}")))
}

fn format_bundle_error(err: MalformedBundle) -> String {
    format!("Summarize error: {err}")
}
