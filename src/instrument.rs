//! Instrument timbres and the registry that maps names to them.
//!
//! A timbre is pure configuration: waveform, attack/release, harmonic list
//! and low-pass cutoff. The registry is built once (built-ins plus any
//! instruments from the config file) and only read while rendering.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::dsp::oscillator::Waveform;
use crate::error::{Result, SynthError};

/// One additive partial relative to the fundamental.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Harmonic {
    /// Frequency multiple of the fundamental (>= 0.5).
    pub multiplier: f64,
    /// Gain of this partial in decibels (usually <= 0).
    pub gain_db: f64,
}

impl Harmonic {
    pub const fn new(multiplier: f64, gain_db: f64) -> Self {
        Harmonic {
            multiplier,
            gain_db,
        }
    }
}

/// The characteristic sound of an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentTimbre {
    /// Unique registry key (e.g. "piano").
    pub name: String,
    pub waveform: Waveform,
    pub attack_ms: u32,
    pub release_ms: u32,
    pub harmonics: Vec<Harmonic>,
    pub filter_cutoff_hz: f64,
}

impl InstrumentTimbre {
    /// Check the invariants a timbre must hold before it can be registered.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SynthError::invalid("instrument name must not be empty"));
        }
        if self.harmonics.is_empty() {
            return Err(SynthError::invalid(format!(
                "instrument '{}' needs at least one harmonic",
                self.name
            )));
        }
        for h in &self.harmonics {
            if !h.multiplier.is_finite() || h.multiplier < 0.5 {
                return Err(SynthError::invalid(format!(
                    "instrument '{}': harmonic multiplier {} is below 0.5",
                    self.name, h.multiplier
                )));
            }
            if !h.gain_db.is_finite() {
                return Err(SynthError::invalid(format!(
                    "instrument '{}': harmonic gain must be finite",
                    self.name
                )));
            }
        }
        if !self.filter_cutoff_hz.is_finite() || self.filter_cutoff_hz <= 0.0 {
            return Err(SynthError::invalid(format!(
                "instrument '{}': filter cutoff must be positive, got {}",
                self.name, self.filter_cutoff_hz
            )));
        }
        Ok(())
    }
}

/// The built-in instrument set.
pub fn builtin_timbres() -> Vec<InstrumentTimbre> {
    vec![
        InstrumentTimbre {
            name: "piano".to_string(),
            waveform: Waveform::Sine,
            attack_ms: 50,
            release_ms: 200,
            harmonics: vec![
                Harmonic::new(1.0, 0.0),
                Harmonic::new(2.0, -10.0),
                Harmonic::new(3.0, -15.0),
            ],
            filter_cutoff_hz: 3000.0,
        },
        InstrumentTimbre {
            name: "guitar".to_string(),
            waveform: Waveform::Square,
            attack_ms: 20,
            release_ms: 500,
            harmonics: vec![Harmonic::new(1.0, 0.0), Harmonic::new(1.5, -8.0)],
            filter_cutoff_hz: 2000.0,
        },
        InstrumentTimbre {
            name: "flute".to_string(),
            waveform: Waveform::Sine,
            attack_ms: 10,
            release_ms: 300,
            harmonics: vec![Harmonic::new(1.0, 0.0)],
            filter_cutoff_hz: 5000.0,
        },
    ]
}

/// Name → timbre lookup table.
#[derive(Debug, Clone, Default)]
pub struct TimbreRegistry {
    timbres: BTreeMap<String, InstrumentTimbre>,
}

impl TimbreRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        TimbreRegistry::default()
    }

    /// A registry holding the built-in instruments.
    pub fn with_builtins() -> Self {
        let mut registry = TimbreRegistry::new();
        for timbre in builtin_timbres() {
            registry.timbres.insert(timbre.name.clone(), timbre);
        }
        registry
    }

    /// Shared, read-only registry of the built-in instruments.
    pub fn builtin() -> &'static TimbreRegistry {
        static BUILTIN: OnceLock<TimbreRegistry> = OnceLock::new();
        BUILTIN.get_or_init(TimbreRegistry::with_builtins)
    }

    /// Insert or replace a timbre, keyed by its name.
    pub fn register(&mut self, timbre: InstrumentTimbre) -> Result<()> {
        timbre.validate()?;
        self.timbres.insert(timbre.name.clone(), timbre);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&InstrumentTimbre> {
        self.timbres
            .get(name)
            .ok_or_else(|| SynthError::UnknownInstrument(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.timbres.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.timbres.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstrumentTimbre> {
        self.timbres.values()
    }

    pub fn len(&self) -> usize {
        self.timbres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timbres.is_empty()
    }
}
