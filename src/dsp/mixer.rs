//! Mixer — combines rendered tones by overlay (chords) or concatenation
//! (scales). Neither operation normalizes; clipping is the caller's call.

use tracing::debug;

use super::buffer::{CompositeBuffer, ToneBuffer, check_duration, samples_for_duration};
use crate::error::{Result, SynthError};

/// Mixes buffers that all share one sample rate.
#[derive(Debug, Clone, Copy)]
pub struct Mixer {
    pub sample_rate: u32,
}

impl Mixer {
    pub fn new(sample_rate: u32) -> Self {
        Mixer { sample_rate }
    }

    fn check_rates(&self, buffers: &[ToneBuffer]) -> Result<()> {
        if let Some(b) = buffers.iter().find(|b| b.sample_rate != self.sample_rate) {
            return Err(SynthError::invalid(format!(
                "cannot mix a {} Hz buffer into a {} Hz mix",
                b.sample_rate, self.sample_rate
            )));
        }
        Ok(())
    }

    /// Sample-wise sum, padding shorter buffers with silence.
    pub fn overlay(&self, buffers: &[ToneBuffer]) -> Result<CompositeBuffer> {
        self.check_rates(buffers)?;
        let len = buffers.iter().map(ToneBuffer::len).max().unwrap_or(0);
        let mut out = vec![0.0; len];
        for buffer in buffers {
            for (o, s) in out.iter_mut().zip(&buffer.samples) {
                *o += s;
            }
        }
        let mix = ToneBuffer::new(out, self.sample_rate);
        if let Some(warning) = mix.clipping_warning() {
            debug!(%warning, voices = buffers.len(), "overlay exceeds full scale");
        }
        Ok(mix)
    }

    /// Append buffers back to back in the given order.
    pub fn concatenate(&self, buffers: &[ToneBuffer]) -> Result<CompositeBuffer> {
        self.concatenate_with_gap(buffers, 0.0)
    }

    /// Append buffers in order with `gap_ms` of silence between neighbours.
    pub fn concatenate_with_gap(&self, buffers: &[ToneBuffer], gap_ms: f64) -> Result<CompositeBuffer> {
        self.check_rates(buffers)?;
        check_duration(gap_ms)?;
        let gap = samples_for_duration(gap_ms, self.sample_rate);
        let total = buffers.iter().map(ToneBuffer::len).sum::<usize>()
            + gap * buffers.len().saturating_sub(1);

        let mut out = Vec::with_capacity(total);
        for (i, buffer) in buffers.iter().enumerate() {
            if i > 0 {
                out.resize(out.len() + gap, 0.0);
            }
            out.extend_from_slice(&buffer.samples);
        }
        Ok(ToneBuffer::new(out, self.sample_rate))
    }
}
