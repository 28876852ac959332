//! Additive harmonic stack: one oscillator per partial, summed with
//! per-partial gain in decibels.

use tracing::debug;

use super::buffer::{ToneBuffer, check_duration, check_sample_rate, samples_for_duration};
use super::oscillator::generate;
use crate::error::{Result, SynthError};
use crate::instrument::InstrumentTimbre;

/// Convert a gain in decibels to a linear amplitude multiplier.
pub fn db_to_gain(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Render every partial of `timbre` above `fundamental` and sum them.
pub fn render_harmonics(
    timbre: &InstrumentTimbre,
    fundamental: f64,
    duration_ms: f64,
    sample_rate: u32,
) -> Result<ToneBuffer> {
    check_duration(duration_ms)?;
    check_sample_rate(sample_rate)?;
    if timbre.harmonics.is_empty() {
        return Err(SynthError::invalid(format!(
            "instrument '{}' has no harmonics",
            timbre.name
        )));
    }

    let len = samples_for_duration(duration_ms, sample_rate);
    let mut acc = vec![0.0; len];
    let nyquist = sample_rate as f64 / 2.0;

    for harmonic in &timbre.harmonics {
        let freq = fundamental * harmonic.multiplier;
        if !freq.is_finite() || freq <= 0.0 {
            return Err(SynthError::invalid(format!(
                "partial x{} of {fundamental} Hz is not a positive frequency",
                harmonic.multiplier
            )));
        }
        if !harmonic.gain_db.is_finite() {
            return Err(SynthError::invalid(format!(
                "partial x{} has a non-finite gain of {} dB",
                harmonic.multiplier, harmonic.gain_db
            )));
        }
        if freq >= nyquist {
            debug!(freq, nyquist, "partial above Nyquist will alias");
        }

        let gain = db_to_gain(harmonic.gain_db);
        let partial = generate(timbre.waveform, freq, duration_ms, sample_rate)?;
        for (a, s) in acc.iter_mut().zip(&partial.samples) {
            *a += s * gain;
        }
    }

    Ok(ToneBuffer::new(acc, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::oscillator::Waveform;
    use crate::instrument::{Harmonic, InstrumentTimbre};

    fn timbre(harmonics: Vec<Harmonic>) -> InstrumentTimbre {
        InstrumentTimbre {
            name: "test".to_string(),
            waveform: Waveform::Sine,
            attack_ms: 0,
            release_ms: 0,
            harmonics,
            filter_cutoff_hz: 3000.0,
        }
    }

    #[test]
    fn db_conversion() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-12);
        assert!((db_to_gain(-20.0) - 0.1).abs() < 1e-12);
        assert!((db_to_gain(-6.0) - 0.501187).abs() < 1e-6);
    }

    #[test]
    fn single_unity_partial_is_plain_oscillator() {
        let t = timbre(vec![Harmonic::new(1.0, 0.0)]);
        let stacked = render_harmonics(&t, 440.0, 50.0, 44100).unwrap();
        let plain = generate(Waveform::Sine, 440.0, 50.0, 44100).unwrap();
        assert_eq!(stacked, plain);
    }

    #[test]
    fn partials_are_scaled_and_summed() {
        let t = timbre(vec![Harmonic::new(1.0, 0.0), Harmonic::new(2.0, -20.0)]);
        let stacked = render_harmonics(&t, 200.0, 20.0, 8000).unwrap();
        let f1 = generate(Waveform::Sine, 200.0, 20.0, 8000).unwrap();
        let f2 = generate(Waveform::Sine, 400.0, 20.0, 8000).unwrap();
        for i in 0..stacked.len() {
            let expected = f1.samples[i] + 0.1 * f2.samples[i];
            assert!((stacked.samples[i] - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn summation_order_does_not_matter() {
        let a = timbre(vec![
            Harmonic::new(1.0, 0.0),
            Harmonic::new(2.0, -10.0),
            Harmonic::new(3.0, -15.0),
        ]);
        let b = timbre(vec![
            Harmonic::new(3.0, -15.0),
            Harmonic::new(1.0, 0.0),
            Harmonic::new(2.0, -10.0),
        ]);
        let x = render_harmonics(&a, 261.63, 100.0, 44100).unwrap();
        let y = render_harmonics(&b, 261.63, 100.0, 44100).unwrap();
        assert_eq!(x.len(), y.len());
        for (p, q) in x.samples.iter().zip(&y.samples) {
            assert!((p - q).abs() < 1e-9);
        }
    }

    #[test]
    fn rejects_empty_and_non_positive_partials() {
        let empty = timbre(vec![]);
        assert!(matches!(
            render_harmonics(&empty, 440.0, 10.0, 44100),
            Err(SynthError::InvalidParameter(_))
        ));

        let t = timbre(vec![Harmonic::new(1.0, 0.0)]);
        assert!(render_harmonics(&t, 0.0, 10.0, 44100).is_err());
        assert!(render_harmonics(&t, -440.0, 10.0, 44100).is_err());

        for gain_db in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let t = timbre(vec![Harmonic::new(1.0, 0.0), Harmonic::new(2.0, gain_db)]);
            assert!(matches!(
                render_harmonics(&t, 440.0, 10.0, 44100),
                Err(SynthError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn zero_duration_is_empty() {
        let t = timbre(vec![Harmonic::new(1.0, 0.0)]);
        let buf = render_harmonics(&t, 440.0, 0.0, 44100).unwrap();
        assert!(buf.is_empty());
    }
}
