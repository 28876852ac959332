//! Note names to frequencies.
//!
//! Accepts letter names with an octave (`C4`, `F#3`, `Bb5`) and fixed-do
//! solfège (`Do`, `Re`, `Mi`, `Fa`, `Sol`, `La`, `Si`), where the octave is
//! optional and defaults to 4.

/// Frequency of A4.
pub const A4_HZ: f64 = 440.0;

/// Solfège names of the natural scale, in order.
pub const SOLFEGE: [&str; 7] = ["Do", "Re", "Mi", "Fa", "Sol", "La", "Si"];

const SOLFEGE_SEMITONES: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];

fn letter_semitone(letter: char) -> Option<i32> {
    Some(match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    })
}

/// Split a leading note stem from the rest of the name.
fn parse_stem(note: &str) -> Option<(i32, &str)> {
    for (name, semitone) in SOLFEGE.iter().zip(SOLFEGE_SEMITONES) {
        if let Some(rest) = note.strip_prefix(name) {
            return Some((semitone, rest));
        }
    }
    let mut chars = note.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    Some((letter_semitone(letter)?, chars.as_str()))
}

/// Parse a note name into a MIDI note number (C4 = 60).
pub fn note_to_midi(note: &str) -> Option<i32> {
    let note = note.trim();
    let (mut semitone, mut rest) = parse_stem(note)?;

    if let Some(r) = rest.strip_prefix('#') {
        semitone += 1;
        rest = r;
    } else if let Some(r) = rest.strip_prefix('b') {
        semitone -= 1;
        rest = r;
    }

    let is_solfege = SOLFEGE.iter().any(|s| note.starts_with(s));
    let octave: i32 = if rest.is_empty() && is_solfege {
        4
    } else {
        rest.parse().ok()?
    };

    octave.checked_add(1)?.checked_mul(12)?.checked_add(semitone)
}

/// `tuning_pitch * 2^((midi - 69) / 12)`
pub fn midi_to_frequency(midi: i32, tuning_pitch: f64) -> f64 {
    tuning_pitch * 2f64.powf((midi as f64 - 69.0) / 12.0)
}

/// Nearest MIDI note for a frequency.
pub fn frequency_to_midi(freq: f64, tuning_pitch: f64) -> i32 {
    (69.0 + 12.0 * (freq / tuning_pitch).log2()).round() as i32
}

/// Note-name to frequency at A4 = 440 Hz.
pub fn note_to_frequency(note: &str) -> Option<f64> {
    Some(midi_to_frequency(note_to_midi(note)?, A4_HZ))
}

/// Accept either a plain frequency in Hz or a note name.
pub fn parse_pitch(text: &str) -> Option<f64> {
    match text.trim().parse::<f64>() {
        Ok(hz) => Some(hz),
        Err(_) => note_to_frequency(text),
    }
}
