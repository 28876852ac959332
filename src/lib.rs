pub mod batch;
pub mod config;
pub mod dsp;
pub mod error;
pub mod instrument;
pub mod pitch;
#[cfg(feature = "playback")]
pub mod playback;
pub mod sink;

use crate::config::RenderConfig;
use crate::dsp::renderer::Renderer;
use crate::instrument::TimbreRegistry;
use crate::sink::encode_wav;
use wasm_bindgen::prelude::*;

pub use crate::dsp::buffer::{CompositeBuffer, ToneBuffer};
pub use crate::error::{ClippingWarning, SinkError, SynthError};

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the chordsmith version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

fn wasm_config(sample_rate: u32) -> Result<RenderConfig, SynthError> {
    let config = RenderConfig {
        sample_rate,
        ..RenderConfig::default()
    };
    config.validate()?;
    Ok(config)
}

/// Render with the built-in instruments and bring the result into full
/// scale with the default clipping policy.
fn render_builtin(
    sample_rate: u32,
    render: impl FnOnce(&Renderer<'_>) -> Result<ToneBuffer, SynthError>,
) -> Result<(RenderConfig, ToneBuffer), SynthError> {
    let config = wasm_config(sample_rate)?;
    let buffer = render(&Renderer::new(TimbreRegistry::builtin(), &config))?;
    let buffer = config.clipping.apply(&buffer);
    Ok((config, buffer))
}

fn note_wav(frequency: f64, instrument: &str, sample_rate: u32) -> Result<Vec<u8>, SinkError> {
    let (config, note) = render_builtin(sample_rate, |r| r.render_note(frequency, instrument))?;
    encode_wav(&note, config.bit_depth)
}

fn to_f32(buffer: &ToneBuffer) -> Vec<f32> {
    buffer.samples.iter().map(|&s| s as f32).collect()
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{e}"))
}

/// WASM-exposed: names of the built-in instruments.
#[wasm_bindgen]
pub fn list_instruments() -> Result<JsValue, JsValue> {
    let timbres: Vec<_> = TimbreRegistry::builtin().iter().collect();
    serde_wasm_bindgen::to_value(&timbres).map_err(to_js)
}

/// WASM-exposed: render one note to a 16-bit mono WAV byte array.
#[wasm_bindgen]
pub fn render_note_wav(frequency: f64, instrument: &str, sample_rate: u32) -> Result<Vec<u8>, JsValue> {
    note_wav(frequency, instrument, sample_rate).map_err(to_js)
}

/// WASM-exposed: render a chord to mono f32 samples for AudioWorklet playback.
#[wasm_bindgen]
pub fn render_chord_samples(
    frequencies: Vec<f64>,
    instrument: &str,
    sample_rate: u32,
) -> Result<Vec<f32>, JsValue> {
    let (_, chord) = render_builtin(sample_rate, |r| r.render_chord(&frequencies, instrument))
        .map_err(to_js)?;
    Ok(to_f32(&chord))
}

/// WASM-exposed: render a scale to mono f32 samples.
#[wasm_bindgen]
pub fn render_scale_samples(
    frequencies: Vec<f64>,
    instrument: &str,
    sample_rate: u32,
) -> Result<Vec<f32>, JsValue> {
    let (_, scale) = render_builtin(sample_rate, |r| r.render_scale(&frequencies, instrument))
        .map_err(to_js)?;
    Ok(to_f32(&scale))
}
