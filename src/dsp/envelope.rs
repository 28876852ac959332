//! Attack / release envelope applied to a finished tone.

use super::buffer::{ToneBuffer, samples_for_duration};
use crate::error::{Result, SynthError};

/// Ramp shape for the fades.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Curve {
    #[default]
    Linear,
    /// Equal-power (quarter-sine) ramp.
    Sine,
}

impl Curve {
    fn shape(self, t: f64) -> f64 {
        match self {
            Curve::Linear => t,
            Curve::Sine => (t * std::f64::consts::FRAC_PI_2).sin(),
        }
    }
}

/// Fade-in over `attack_ms` then fade-out over the final `release_ms`.
///
/// When the two ramps overlap, each overlapping sample is multiplied by
/// both factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub attack_ms: f64,
    pub release_ms: f64,
    pub curve: Curve,
}

impl Envelope {
    pub fn new(attack_ms: f64, release_ms: f64) -> Self {
        Envelope {
            attack_ms,
            release_ms,
            curve: Curve::Linear,
        }
    }

    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }

    /// Gain of the fade-in at sample `i`, for a ramp of `n` samples.
    fn fade_in_gain(&self, i: usize, n: usize) -> f64 {
        if i >= n {
            1.0
        } else {
            self.curve.shape(i as f64 / n as f64)
        }
    }

    /// Gain of the fade-out at sample `i` of a `len`-sample buffer whose
    /// last `n` samples are ramped down to zero.
    fn fade_out_gain(&self, i: usize, len: usize, n: usize) -> f64 {
        // Position counted back from the end: the last sample is 0.
        let from_end = len - 1 - i;
        if from_end >= n {
            1.0
        } else {
            self.curve.shape(from_end as f64 / n as f64)
        }
    }

    /// Apply the envelope, returning a new buffer.
    pub fn apply(&self, buffer: &ToneBuffer) -> Result<ToneBuffer> {
        for (label, ms) in [("attack", self.attack_ms), ("release", self.release_ms)] {
            if !ms.is_finite() || ms < 0.0 {
                return Err(SynthError::invalid(format!(
                    "{label} must be a non-negative number of milliseconds, got {ms}"
                )));
            }
        }

        let attack = samples_for_duration(self.attack_ms, buffer.sample_rate);
        let release = samples_for_duration(self.release_ms, buffer.sample_rate);
        let len = buffer.len();

        let samples = buffer
            .samples
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                s * self.fade_in_gain(i, attack) * self.fade_out_gain(i, len, release)
            })
            .collect();

        Ok(ToneBuffer::new(samples, buffer.sample_rate))
    }
}

/// Linear fade-in then fade-out; see [`Envelope::apply`].
pub fn apply_envelope(buffer: &ToneBuffer, attack_ms: f64, release_ms: f64) -> Result<ToneBuffer> {
    Envelope::new(attack_ms, release_ms).apply(buffer)
}
