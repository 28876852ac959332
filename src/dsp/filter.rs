//! One-pole low-pass filter used to soften the edges of non-sinusoidal
//! partials.

use std::f64::consts::PI;

use tracing::warn;

use super::buffer::{ToneBuffer, check_sample_rate};
use crate::error::{Result, SynthError};

/// A single-pole IIR low-pass:
/// `y[i] = y[i-1] + alpha * (x[i] - y[i-1])`, with
/// `alpha = 1 - exp(-2π · cutoff / sample_rate)`.
#[derive(Debug, Clone)]
pub struct OnePoleLowpass {
    alpha: f64,
    y1: f64,
}

impl OnePoleLowpass {
    pub fn new(cutoff_hz: f64, sample_rate: u32) -> Self {
        OnePoleLowpass {
            alpha: 1.0 - (-2.0 * PI * cutoff_hz / sample_rate as f64).exp(),
            y1: 0.0,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Process a single sample through the filter.
    pub fn process(&mut self, input: f64) -> f64 {
        self.y1 += self.alpha * (input - self.y1);
        self.y1
    }

    /// Reset filter state.
    pub fn reset(&mut self) {
        self.y1 = 0.0;
    }
}

/// Low-pass `buffer` at `cutoff_hz`, returning a new buffer.
///
/// A cutoff at or above Nyquist leaves the signal unmodified and logs a
/// warning instead of failing.
pub fn apply_lowpass(buffer: &ToneBuffer, cutoff_hz: f64, sample_rate: u32) -> Result<ToneBuffer> {
    check_sample_rate(sample_rate)?;
    if buffer.sample_rate != sample_rate {
        return Err(SynthError::invalid(format!(
            "buffer is at {} Hz but the filter was asked to run at {sample_rate} Hz",
            buffer.sample_rate
        )));
    }
    if !cutoff_hz.is_finite() || cutoff_hz <= 0.0 {
        return Err(SynthError::invalid(format!(
            "filter cutoff must be positive, got {cutoff_hz}"
        )));
    }

    let nyquist = sample_rate as f64 / 2.0;
    if cutoff_hz >= nyquist {
        warn!(cutoff_hz, nyquist, "low-pass cutoff at or above Nyquist, passing signal through");
        return Ok(buffer.clone());
    }

    let mut filter = OnePoleLowpass::new(cutoff_hz, sample_rate);
    let samples = buffer.samples.iter().map(|&x| filter.process(x)).collect();
    Ok(ToneBuffer::new(samples, buffer.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::oscillator::{Waveform, generate};

    #[test]
    fn lowpass_passes_dc() {
        let dc = ToneBuffer::new(vec![1.0; 2000], 44100);
        let out = apply_lowpass(&dc, 3000.0, 44100).unwrap();
        let last = *out.samples.last().unwrap();
        assert!((last - 1.0).abs() < 1e-6, "Lowpass should pass DC, got {last}");
    }

    #[test]
    fn first_sample_follows_recurrence() {
        let buf = ToneBuffer::new(vec![0.5, 0.5, -0.25], 44100);
        let out = apply_lowpass(&buf, 1000.0, 44100).unwrap();
        let alpha = 1.0 - (-2.0 * PI * 1000.0 / 44100.0).exp();
        let y0 = alpha * 0.5;
        let y1 = y0 + alpha * (0.5 - y0);
        let y2 = y1 + alpha * (-0.25 - y1);
        assert!((out.samples[0] - y0).abs() < 1e-15);
        assert!((out.samples[1] - y1).abs() < 1e-15);
        assert!((out.samples[2] - y2).abs() < 1e-15);
    }

    #[test]
    fn attenuates_high_frequencies() {
        let low = generate(Waveform::Sine, 100.0, 200.0, 44100).unwrap();
        let high = generate(Waveform::Sine, 10000.0, 200.0, 44100).unwrap();
        let low_out = apply_lowpass(&low, 500.0, 44100).unwrap();
        let high_out = apply_lowpass(&high, 500.0, 44100).unwrap();
        assert!(low_out.rms() / low.rms() > 0.9);
        assert!(high_out.rms() / high.rms() < 0.1);
    }

    #[test]
    fn nyquist_cutoff_is_passthrough() {
        let buf = generate(Waveform::Square, 440.0, 20.0, 8000).unwrap();
        let at = apply_lowpass(&buf, 4000.0, 8000).unwrap();
        let above = apply_lowpass(&buf, 20000.0, 8000).unwrap();
        assert_eq!(at, buf);
        assert_eq!(above, buf);
    }

    #[test]
    fn rejects_non_positive_cutoff() {
        let buf = ToneBuffer::new(vec![0.0; 4], 8000);
        assert!(matches!(
            apply_lowpass(&buf, 0.0, 8000),
            Err(SynthError::InvalidParameter(_))
        ));
        assert!(apply_lowpass(&buf, -100.0, 8000).is_err());
        assert!(apply_lowpass(&buf, 100.0, 0).is_err());
    }

    #[test]
    fn rejects_mismatched_sample_rate() {
        let buf = generate(Waveform::Square, 440.0, 20.0, 44100).unwrap();
        assert!(matches!(
            apply_lowpass(&buf, 1000.0, 8000),
            Err(SynthError::InvalidParameter(_))
        ));
        assert!(apply_lowpass(&buf, 1000.0, 44100).is_ok());
    }

    #[test]
    fn reset_clears_state() {
        let mut f = OnePoleLowpass::new(1000.0, 44100);
        let first = f.process(1.0);
        f.process(1.0);
        f.reset();
        assert_eq!(f.process(1.0), first);
        assert!(f.alpha() > 0.0 && f.alpha() < 1.0);
    }
}
