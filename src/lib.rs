pub mod buffer;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod device;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod params;
pub mod playback;
pub mod preset;
pub mod segment;
pub mod upload;

pub use buffer::AudioBuffer;
pub use codec::{Decoder, WavDecoder, encode_wav};
pub use config::{ChainProfile, EngineConfig};
pub use coordinator::{RenderCoordinator, RenderState, RenderedResult};
pub use dsp::renderer::OfflineRenderer;
pub use engine::{ExportedClip, ToneEngine};
pub use error::ToneError;
pub use params::{ParamField, ParamStore, ParamsPatch, ProcessingParams};
pub use preset::Preset;
pub use segment::Segment;

use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the tonecraft-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Parameters of the named preset (`standard`, `recommended`, `highest`,
/// `custom`).
pub fn preset_by_name(name: &str) -> Result<ProcessingParams, String> {
    Ok(name.parse::<Preset>()?.params())
}

/// WASM-exposed: preset parameters as a JS object.
#[wasm_bindgen]
pub fn preset_params(name: &str) -> Result<JsValue, JsValue> {
    let params = preset_by_name(name).map_err(|e| JsValue::from_str(&e))?;
    serde_wasm_bindgen::to_value(&params).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// Decode a WAV clip, render it with `patch` merged over `recommended`,
/// optionally cropped to `segment`, and encode the result as WAV.
pub fn render_clip_wav(
    bytes: &[u8],
    patch: &ParamsPatch,
    segment: Option<&Segment>,
    reverb_seed: Option<u64>,
) -> Result<Vec<u8>, ToneError> {
    let source = WavDecoder.decode(bytes)?;
    let params = ParamStore::with_initial(patch).get();
    let renderer = OfflineRenderer::new(ChainProfile::Professional, reverb_seed);
    let rendered = renderer.render(&source, &params, segment)?;
    Ok(encode_wav(&rendered))
}

/// WASM-exposed: render a WAV clip with a (partial) parameter object.
/// `start` and `end` crop the clip when both are given.
#[wasm_bindgen]
pub fn render_wav(bytes: &[u8], params: JsValue, start: Option<f64>, end: Option<f64>) -> Result<Vec<u8>, JsValue> {
    let patch: ParamsPatch = if params.is_undefined() || params.is_null() {
        ParamsPatch::default()
    } else {
        serde_wasm_bindgen::from_value(params).map_err(|e| JsValue::from_str(&format!("{e}")))?
    };
    let segment = match (start, end) {
        (Some(s), Some(e)) => Some(Segment::new(s, e)),
        _ => None,
    };
    render_clip_wav(bytes, &patch, segment.as_ref(), None).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: correct a dragged selection against the clip duration.
/// Returns `[start, end]`, or nothing when the duration is unusable.
#[wasm_bindgen]
pub fn constrain_selection(start: f64, end: f64, duration: f64) -> Option<Vec<f64>> {
    let min = EngineConfig::default().min_segment_secs;
    segment::constrain_drag(&Segment::new(start, end), duration, min).map(|s| vec![s.start_time, s.end_time])
}
