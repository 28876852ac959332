//! Render configuration, loadable from a JSON file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dsp::buffer::ToneBuffer;
use crate::error::{Result, SynthError};
use crate::instrument::{InstrumentTimbre, TimbreRegistry};

/// What to do with a mix whose peak exceeds full scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClippingPolicy {
    /// Export as is; the sink saturates out-of-range samples.
    Allow,
    /// Scale the whole buffer down so its peak is full scale.
    #[default]
    Normalize,
    /// Clamp each sample into [-1, 1].
    HardClip,
}

impl ClippingPolicy {
    /// Bring an over-range buffer back into full scale according to the
    /// policy. Buffers already within [-1, 1] are returned unchanged.
    pub fn apply(self, buffer: &ToneBuffer) -> ToneBuffer {
        if buffer.clipping_warning().is_none() {
            return buffer.clone();
        }
        match self {
            ClippingPolicy::Allow => buffer.clone(),
            ClippingPolicy::Normalize => buffer.normalized(1.0),
            ClippingPolicy::HardClip => buffer.hard_clipped(),
        }
    }
}

/// Whether the low-pass stage runs for every instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterPolicy {
    #[default]
    Always,
    /// Skip the filter for sine instruments.
    SkipSine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    pub sample_rate: u32,
    /// Length of every rendered note.
    pub note_duration_ms: f64,
    /// Export bit depth: 16, 24 or 32 (integer PCM).
    pub bit_depth: u16,
    pub clipping: ClippingPolicy,
    pub filter: FilterPolicy,
    /// Extra instruments, registered over the built-ins.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub instruments: Vec<InstrumentTimbre>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            sample_rate: 44100,
            note_duration_ms: 500.0,
            bit_depth: 16,
            clipping: ClippingPolicy::default(),
            filter: FilterPolicy::default(),
            instruments: Vec::new(),
        }
    }
}

impl RenderConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RenderConfig =
            serde_json::from_str(json).map_err(|e| SynthError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| SynthError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(SynthError::InvalidConfig("sampleRate must be positive".into()));
        }
        if !self.note_duration_ms.is_finite() || self.note_duration_ms < 0.0 {
            return Err(SynthError::InvalidConfig(
                "noteDurationMs must be a non-negative number".into(),
            ));
        }
        if !matches!(self.bit_depth, 16 | 24 | 32) {
            return Err(SynthError::InvalidConfig(format!(
                "bitDepth must be 16, 24 or 32, got {}",
                self.bit_depth
            )));
        }
        for timbre in &self.instruments {
            timbre
                .validate()
                .map_err(|e| SynthError::InvalidConfig(e.to_string()))?;
        }
        Ok(())
    }

    /// Built-in instruments plus the ones declared in this config.
    pub fn registry(&self) -> Result<TimbreRegistry> {
        let mut registry = TimbreRegistry::with_builtins();
        for timbre in &self.instruments {
            registry.register(timbre.clone())?;
        }
        Ok(registry)
    }
}
