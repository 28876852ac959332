//! Naive periodic oscillators, evaluated directly from the sample index.

use std::f64::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};

use super::buffer::{ToneBuffer, check_duration, check_sample_rate, samples_for_duration};
use crate::error::{Result, SynthError};

/// Duty cycle used by `Waveform::Pulse` when none is given.
pub const DEFAULT_DUTY: f64 = 0.5;

fn default_duty() -> f64 {
    DEFAULT_DUTY
}

/// Supported waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
    /// Rectangular wave, high for `duty` of each period. Unlike `Square`
    /// it has no zero level: the high half includes the start of each
    /// period, so `Pulse { duty: 0.5 }` begins at 1.0 where `Square`
    /// begins at 0.0. Away from the period edges the two agree.
    Pulse {
        #[serde(default = "default_duty")]
        duty: f64,
    },
}

impl Waveform {
    /// Pulse wave with the default 50% duty cycle.
    pub fn pulse() -> Self {
        Waveform::Pulse { duty: DEFAULT_DUTY }
    }

    /// True for waveforms with no overtones of their own.
    pub fn is_pure(&self) -> bool {
        matches!(self, Waveform::Sine)
    }

    fn validate(&self) -> Result<()> {
        if let Waveform::Pulse { duty } = *self {
            if !(duty > 0.0 && duty < 1.0) {
                return Err(SynthError::invalid(format!(
                    "pulse duty cycle must lie in (0, 1), got {duty}"
                )));
            }
        }
        Ok(())
    }

    /// Evaluate the waveform at `cycles` periods from the start.
    /// Output is normalized to [-1, 1].
    pub fn value_at(&self, cycles: f64) -> f64 {
        match *self {
            Waveform::Sine => (2.0 * PI * cycles).sin(),
            Waveform::Square => sign((2.0 * PI * cycles).sin()),
            Waveform::Sawtooth => 2.0 * (cycles - (cycles + 0.5).floor()),
            Waveform::Triangle => (2.0 * PI * cycles).sin().asin() / FRAC_PI_2,
            Waveform::Pulse { duty } => {
                if cycles - cycles.floor() < duty {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

/// Signum that maps zero to zero.
fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// A stateless-phase oscillator: each sample's phase is computed from its
/// index, so long renders do not accumulate rounding drift.
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: f64,
    sample_rate: u32,
    index: u64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f64, sample_rate: u32) -> Result<Self> {
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err(SynthError::invalid(format!(
                "frequency must be positive, got {frequency}"
            )));
        }
        check_sample_rate(sample_rate)?;
        waveform.validate()?;
        Ok(Oscillator {
            waveform,
            frequency,
            sample_rate,
            index: 0,
        })
    }

    /// Generate the next sample.
    pub fn next_sample(&mut self) -> f64 {
        let cycles = self.frequency * self.index as f64 / self.sample_rate as f64;
        self.index += 1;
        self.waveform.value_at(cycles)
    }

    /// Reset oscillator phase.
    pub fn reset(&mut self) {
        self.index = 0;
    }
}

/// Render `duration_ms` of `waveform` at `frequency`.
pub fn generate(
    waveform: Waveform,
    frequency: f64,
    duration_ms: f64,
    sample_rate: u32,
) -> Result<ToneBuffer> {
    check_duration(duration_ms)?;
    let mut osc = Oscillator::new(waveform, frequency, sample_rate)?;
    let len = samples_for_duration(duration_ms, sample_rate);
    let samples = (0..len).map(|_| osc.next_sample()).collect();
    Ok(ToneBuffer::new(samples, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Waveform; 5] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Sawtooth,
        Waveform::Triangle,
        Waveform::Pulse { duty: 0.25 },
    ];

    #[test]
    fn sine_zero_at_start() {
        let buf = generate(Waveform::Sine, 440.0, 10.0, 44100).unwrap();
        assert!(buf.samples[0].abs() < 1e-12);
    }

    #[test]
    fn sample_count_matches_duration() {
        for &(ms, sr) in &[(500.0, 44100), (0.0, 44100), (10.0, 22050), (333.0, 48000)] {
            let buf = generate(Waveform::Sine, 261.63, ms, sr).unwrap();
            assert_eq!(buf.len(), samples_for_duration(ms, sr));
            assert_eq!(buf.sample_rate, sr);
        }
    }

    #[test]
    fn every_shape_stays_in_range() {
        for shape in ALL {
            let buf = generate(shape, 440.0, 100.0, 44100).unwrap();
            for &s in &buf.samples {
                assert!((-1.0..=1.0).contains(&s), "{shape:?} out of range: {s}");
            }
        }
    }

    #[test]
    fn square_follows_sine_sign() {
        let sine = generate(Waveform::Sine, 100.0, 20.0, 8000).unwrap();
        let square = generate(Waveform::Square, 100.0, 20.0, 8000).unwrap();
        assert_eq!(square.samples[0], 0.0);
        for (s, q) in sine.samples.iter().zip(&square.samples).skip(1) {
            if s.abs() > 1e-9 {
                assert_eq!(q.signum(), s.signum());
                assert_eq!(q.abs(), 1.0);
            }
        }
    }

    #[test]
    fn sawtooth_ramps_through_zero() {
        // 100 Hz at 8 kHz: 80 samples per period
        let buf = generate(Waveform::Sawtooth, 100.0, 10.0, 8000).unwrap();
        assert_eq!(buf.samples[0], 0.0);
        assert!((buf.samples[20] - 0.5).abs() < 1e-12);
        assert!((buf.samples[40] + 1.0).abs() < 1e-12);
        assert!((buf.samples[60] + 0.5).abs() < 1e-12);
    }

    #[test]
    fn pulse_duty_cycle() {
        let buf = generate(Waveform::Pulse { duty: 0.25 }, 100.0, 10.0, 8000).unwrap();
        let high = buf.samples[..80].iter().filter(|&&s| s > 0.0).count();
        assert_eq!(high, 20);

        let half = generate(Waveform::pulse(), 100.0, 10.0, 8000).unwrap();
        let high = half.samples[..80].iter().filter(|&&s| s > 0.0).count();
        assert_eq!(high, 40);
    }

    #[test]
    fn half_duty_pulse_matches_square_between_edges() {
        // 100 Hz at 8 kHz: edges fall on samples 0, 40, 80
        let pulse = generate(Waveform::pulse(), 100.0, 10.0, 8000).unwrap();
        let square = generate(Waveform::Square, 100.0, 10.0, 8000).unwrap();
        assert_eq!(pulse.samples[0], 1.0);
        assert_eq!(square.samples[0], 0.0);
        for i in (0..pulse.len()).filter(|i| i % 40 != 0) {
            assert_eq!(pulse.samples[i], square.samples[i], "sample {i}");
        }
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(matches!(
            generate(Waveform::Sine, 0.0, 10.0, 44100),
            Err(SynthError::InvalidParameter(_))
        ));
        assert!(generate(Waveform::Sine, -5.0, 10.0, 44100).is_err());
        assert!(generate(Waveform::Sine, 440.0, -1.0, 44100).is_err());
        assert!(generate(Waveform::Sine, 440.0, 10.0, 0).is_err());
        assert!(generate(Waveform::Pulse { duty: 1.5 }, 440.0, 10.0, 44100).is_err());
    }

    #[test]
    fn reset_restarts_phase() {
        let mut osc = Oscillator::new(Waveform::Sawtooth, 440.0, 44100).unwrap();
        let first: Vec<f64> = (0..16).map(|_| osc.next_sample()).collect();
        osc.reset();
        let again: Vec<f64> = (0..16).map(|_| osc.next_sample()).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn waveform_serde_names() {
        let json = serde_json::to_string(&Waveform::Sawtooth).unwrap();
        assert_eq!(json, "\"sawtooth\"");
        let pulse: Waveform = serde_json::from_str(r#"{"pulse":{}}"#).unwrap();
        assert_eq!(pulse, Waveform::pulse());
    }
}
