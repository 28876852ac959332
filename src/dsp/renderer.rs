//! Render pipeline — harmonic stack → envelope → low-pass for each tone,
//! then overlay (chords) or concatenation (scales).

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::buffer::{CompositeBuffer, ToneBuffer};
use super::envelope::apply_envelope;
use super::filter::apply_lowpass;
use super::harmonics::render_harmonics;
use super::mixer::Mixer;
use crate::config::{FilterPolicy, RenderConfig};
use crate::error::{Result, SynthError};
use crate::instrument::{InstrumentTimbre, TimbreRegistry};

/// A single tone to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRequest {
    pub frequency: f64,
    /// Symbolic name used as the output key (e.g. "Do", "C4").
    pub name: String,
    pub instrument: String,
}

/// Frequencies sounded together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordRequest {
    pub name: String,
    pub frequencies: Vec<f64>,
    pub instrument: String,
}

/// Frequencies sounded one after another, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleRequest {
    #[serde(default = "default_scale_name")]
    pub name: String,
    pub frequencies: Vec<f64>,
    pub instrument: String,
}

fn default_scale_name() -> String {
    "scale".to_string()
}

impl NoteRequest {
    pub fn key(&self) -> String {
        format!("notes/{}/{}", self.instrument, self.name)
    }
}

impl ChordRequest {
    pub fn key(&self) -> String {
        format!("chords/{}/{}", self.instrument, self.name)
    }
}

impl ScaleRequest {
    pub fn key(&self) -> String {
        format!("scales/{}/{}", self.instrument, self.name)
    }
}

/// Intermediate buffers of one tone, stage by stage.
#[derive(Debug, Clone)]
pub struct ToneStages {
    pub harmonics: ToneBuffer,
    pub enveloped: ToneBuffer,
    pub filtered: ToneBuffer,
}

/// Renders notes, chords and scales against a read-only timbre registry.
///
/// Holds no mutable state: the same request always renders to the same
/// bits, and renders may run on any number of threads at once.
#[derive(Debug, Clone, Copy)]
pub struct Renderer<'a> {
    registry: &'a TimbreRegistry,
    pub sample_rate: u32,
    pub note_duration_ms: f64,
    pub filter_policy: FilterPolicy,
}

impl<'a> Renderer<'a> {
    pub fn new(registry: &'a TimbreRegistry, config: &RenderConfig) -> Self {
        Renderer {
            registry,
            sample_rate: config.sample_rate,
            note_duration_ms: config.note_duration_ms,
            filter_policy: config.filter,
        }
    }

    pub fn registry(&self) -> &'a TimbreRegistry {
        self.registry
    }

    fn mixer(&self) -> Mixer {
        Mixer::new(self.sample_rate)
    }

    /// Run one tone through every stage, keeping each intermediate buffer.
    pub fn render_stages(&self, frequency: f64, timbre: &InstrumentTimbre) -> Result<ToneStages> {
        let harmonics =
            render_harmonics(timbre, frequency, self.note_duration_ms, self.sample_rate)?;
        let enveloped = apply_envelope(
            &harmonics,
            timbre.attack_ms as f64,
            timbre.release_ms as f64,
        )?;
        let skip_filter =
            self.filter_policy == FilterPolicy::SkipSine && timbre.waveform.is_pure();
        let filtered = if skip_filter {
            enveloped.clone()
        } else {
            apply_lowpass(&enveloped, timbre.filter_cutoff_hz, self.sample_rate)?
        };
        Ok(ToneStages {
            harmonics,
            enveloped,
            filtered,
        })
    }

    /// Render one tone with an already resolved timbre.
    pub fn render_tone(&self, frequency: f64, timbre: &InstrumentTimbre) -> Result<ToneBuffer> {
        Ok(self.render_stages(frequency, timbre)?.filtered)
    }

    fn render_all(&self, frequencies: &[f64], timbre: &InstrumentTimbre) -> Result<Vec<ToneBuffer>> {
        frequencies
            .par_iter()
            .map(|&f| self.render_tone(f, timbre))
            .collect()
    }

    pub fn render_note(&self, frequency: f64, instrument: &str) -> Result<ToneBuffer> {
        let timbre = self.registry.lookup(instrument)?;
        debug!(frequency, instrument, "rendering note");
        self.render_tone(frequency, timbre)
    }

    /// Overlay one tone per frequency. The order of `frequencies` does not
    /// matter.
    pub fn render_chord(&self, frequencies: &[f64], instrument: &str) -> Result<CompositeBuffer> {
        let timbre = self.registry.lookup(instrument)?;
        if frequencies.is_empty() {
            return Err(SynthError::invalid("a chord needs at least one frequency"));
        }
        debug!(?frequencies, instrument, "rendering chord");
        let tones = self.render_all(frequencies, timbre)?;
        self.mixer().overlay(&tones)
    }

    /// Concatenate one tone per frequency, in order.
    pub fn render_scale(&self, frequencies: &[f64], instrument: &str) -> Result<CompositeBuffer> {
        let timbre = self.registry.lookup(instrument)?;
        debug!(?frequencies, instrument, "rendering scale");
        let tones = self.render_all(frequencies, timbre)?;
        self.mixer().concatenate(&tones)
    }

    pub fn note(&self, request: &NoteRequest) -> Result<ToneBuffer> {
        self.render_note(request.frequency, &request.instrument)
    }

    pub fn chord(&self, request: &ChordRequest) -> Result<CompositeBuffer> {
        self.render_chord(&request.frequencies, &request.instrument)
    }

    pub fn scale(&self, request: &ScaleRequest) -> Result<CompositeBuffer> {
        self.render_scale(&request.frequencies, &request.instrument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::buffer::samples_for_duration;

    fn renderer(registry: &TimbreRegistry) -> Renderer<'_> {
        Renderer::new(registry, &RenderConfig::default())
    }

    #[test]
    fn note_has_configured_length() {
        let reg = TimbreRegistry::with_builtins();
        let r = renderer(&reg);
        let note = r.render_note(440.0, "flute").unwrap();
        assert_eq!(note.len(), samples_for_duration(500.0, 44100));
        assert_eq!(note.sample_rate, 44100);
    }

    #[test]
    fn stages_chain_together() {
        let reg = TimbreRegistry::with_builtins();
        let r = renderer(&reg);
        let piano = reg.lookup("piano").unwrap();
        let stages = r.render_stages(261.63, piano).unwrap();
        let enveloped = apply_envelope(&stages.harmonics, 50.0, 200.0).unwrap();
        assert_eq!(stages.enveloped, enveloped);
        let filtered = apply_lowpass(&enveloped, 3000.0, 44100).unwrap();
        assert_eq!(stages.filtered, filtered);
    }

    #[test]
    fn skip_sine_policy_bypasses_filter() {
        let reg = TimbreRegistry::with_builtins();
        let config = RenderConfig {
            filter: FilterPolicy::SkipSine,
            ..RenderConfig::default()
        };
        let r = Renderer::new(&reg, &config);

        let flute = r.render_stages(440.0, reg.lookup("flute").unwrap()).unwrap();
        assert_eq!(flute.filtered, flute.enveloped);

        let guitar = r.render_stages(440.0, reg.lookup("guitar").unwrap()).unwrap();
        assert_ne!(guitar.filtered, guitar.enveloped);
    }

    #[test]
    fn chord_is_order_independent() {
        let reg = TimbreRegistry::with_builtins();
        let r = renderer(&reg);
        let a = r.render_chord(&[261.63, 329.63, 392.0], "piano").unwrap();
        let b = r.render_chord(&[392.0, 261.63, 329.63], "piano").unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.samples.iter().zip(&b.samples) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn empty_chord_rejected_empty_scale_allowed() {
        let reg = TimbreRegistry::with_builtins();
        let r = renderer(&reg);
        assert!(matches!(
            r.render_chord(&[], "piano"),
            Err(SynthError::InvalidParameter(_))
        ));
        assert!(r.render_scale(&[], "piano").unwrap().is_empty());
    }

    #[test]
    fn bad_frequency_in_scale_fails_request() {
        let reg = TimbreRegistry::with_builtins();
        let r = renderer(&reg);
        assert!(matches!(
            r.render_scale(&[261.63, -1.0], "flute"),
            Err(SynthError::InvalidParameter(_))
        ));
    }

    #[test]
    fn request_keys() {
        let note = NoteRequest {
            frequency: 261.63,
            name: "Do".into(),
            instrument: "piano".into(),
        };
        assert_eq!(note.key(), "notes/piano/Do");
        let scale: ScaleRequest =
            serde_json::from_str(r#"{"frequencies": [1.0], "instrument": "flute"}"#).unwrap();
        assert_eq!(scale.key(), "scales/flute/scale");
    }
}
