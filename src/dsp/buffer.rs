//! Tone buffers — the value type every stage of the pipeline passes along.

use sha2::{Digest, Sha256};

use crate::error::{ClippingWarning, Result, SynthError};

/// A mono block of samples at a known sample rate.
///
/// Buffers are plain values: every pipeline stage takes one by reference and
/// hands back a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneBuffer {
    pub samples: Vec<f64>,
    pub sample_rate: u32,
}

/// The result of overlaying or concatenating several tones.
pub type CompositeBuffer = ToneBuffer;

/// Number of samples covering `duration_ms` at `sample_rate`, rounded to
/// the nearest sample.
pub fn samples_for_duration(duration_ms: f64, sample_rate: u32) -> usize {
    (duration_ms * sample_rate as f64 / 1000.0).round() as usize
}

/// Symmetric integer quantization: full scale maps to `2^(bits-1)`, so
/// [`dequantize`] followed by `quantize` returns the original value.
pub fn quantize(sample: f64, bits: u16) -> i32 {
    let scale = (1i64 << (bits - 1)) as f64;
    (sample * scale).round().clamp(-scale, scale - 1.0) as i32
}

pub fn dequantize(value: i32, bits: u16) -> f64 {
    value as f64 / (1i64 << (bits - 1)) as f64
}

pub(crate) fn check_sample_rate(sample_rate: u32) -> Result<()> {
    if sample_rate == 0 {
        return Err(SynthError::invalid("sample rate must be positive"));
    }
    Ok(())
}

pub(crate) fn check_duration(duration_ms: f64) -> Result<()> {
    if !duration_ms.is_finite() || duration_ms < 0.0 {
        return Err(SynthError::invalid(format!(
            "duration must be a non-negative number of milliseconds, got {duration_ms}"
        )));
    }
    Ok(())
}

impl ToneBuffer {
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Self {
        ToneBuffer {
            samples,
            sample_rate,
        }
    }

    /// A buffer of silence lasting `duration_ms`.
    pub fn silence(duration_ms: f64, sample_rate: u32) -> Self {
        let len = samples_for_duration(duration_ms, sample_rate);
        ToneBuffer::new(vec![0.0; len], sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f64 {
        self.samples.iter().fold(0.0, |acc, s| acc.max(s.abs()))
    }

    /// Root mean square level.
    pub fn rms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|s| s * s).sum();
        (sum / self.samples.len() as f64).sqrt()
    }

    /// Returns a warning when the peak leaves [-1, 1].
    pub fn clipping_warning(&self) -> Option<ClippingWarning> {
        let peak = self.peak();
        (peak > 1.0).then_some(ClippingWarning { peak })
    }

    /// Scale so the peak sits at `target` (no-op for silent buffers).
    pub fn normalized(&self, target: f64) -> ToneBuffer {
        let peak = self.peak();
        if peak == 0.0 {
            return self.clone();
        }
        let gain = target / peak;
        ToneBuffer::new(
            self.samples.iter().map(|s| s * gain).collect(),
            self.sample_rate,
        )
    }

    /// Clamp every sample into [-1, 1].
    pub fn hard_clipped(&self) -> ToneBuffer {
        ToneBuffer::new(
            self.samples.iter().map(|s| s.clamp(-1.0, 1.0)).collect(),
            self.sample_rate,
        )
    }

    /// SHA-256 over the sample rate and the exact bit patterns of every
    /// sample, hex encoded. Equal digests mean bit-identical renders.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.sample_rate.to_le_bytes());
        for s in &self.samples {
            hasher.update(s.to_bits().to_le_bytes());
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}
