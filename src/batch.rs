//! Batch rendering: many notes, chords and scales in one run.
//!
//! Each request is rendered and exported on its own. A request that fails
//! (unknown instrument, bad frequency, sink error) is recorded in the report
//! and the batch carries on with the rest.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::ClippingPolicy;
use crate::dsp::buffer::ToneBuffer;
use crate::dsp::renderer::{ChordRequest, NoteRequest, Renderer, ScaleRequest};
use crate::error::{ClippingWarning, Result, SinkError, SynthError};
use crate::pitch::SOLFEGE;
use crate::sink::{ExportSink, PlaybackSink};

/// Frequencies of the natural scale Do..Si.
pub const NATURAL_SCALE: [f64; 7] = [261.63, 293.66, 329.63, 349.23, 392.00, 440.00, 493.88];

/// The diatonic triads built on each degree of the natural scale.
pub const NATURAL_CHORDS: [(&str, [f64; 3]); 7] = [
    ("Do mayor", [261.63, 329.63, 392.00]),
    ("Re menor", [293.66, 349.23, 440.00]),
    ("Mi menor", [329.63, 392.00, 493.88]),
    ("Fa mayor", [349.23, 440.00, 523.25]),
    ("Sol mayor", [392.00, 493.88, 587.33]),
    ("La menor", [440.00, 523.25, 659.25]),
    ("Si disminuido", [493.88, 587.33, 739.99]),
];

/// A set of requests to render together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderJob {
    pub notes: Vec<NoteRequest>,
    pub chords: Vec<ChordRequest>,
    pub scales: Vec<ScaleRequest>,
}

impl RenderJob {
    /// Every natural-scale note, every diatonic triad, and the scale itself
    /// for one instrument.
    pub fn natural_scale(instrument: &str) -> Self {
        let notes = SOLFEGE
            .iter()
            .zip(NATURAL_SCALE)
            .map(|(name, frequency)| NoteRequest {
                frequency,
                name: name.to_string(),
                instrument: instrument.to_string(),
            })
            .collect();
        let chords = NATURAL_CHORDS
            .iter()
            .map(|(name, freqs)| ChordRequest {
                name: name.to_string(),
                frequencies: freqs.to_vec(),
                instrument: instrument.to_string(),
            })
            .collect();
        let scales = vec![ScaleRequest {
            name: "scale".to_string(),
            frequencies: NATURAL_SCALE.to_vec(),
            instrument: instrument.to_string(),
        }];
        RenderJob {
            notes,
            chords,
            scales,
        }
    }

    /// Append another job's requests.
    pub fn extend(&mut self, other: RenderJob) {
        self.notes.extend(other.notes);
        self.chords.extend(other.chords);
        self.scales.extend(other.scales);
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SynthError::InvalidConfig(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.notes.len() + self.chords.len() + self.scales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of one request.
#[derive(Debug)]
pub struct ItemReport {
    /// Output key, e.g. `chords/piano/Do mayor`.
    pub key: String,
    pub destination: PathBuf,
    /// `Ok` once the buffer has been exported.
    pub result: std::result::Result<(), SinkError>,
    /// Set when the rendered mix exceeded full scale before the clipping
    /// policy was applied.
    pub clipping: Option<ClippingWarning>,
    /// Playback outcome, for requests that were played after export.
    pub playback: Option<std::result::Result<(), SinkError>>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &ItemReport> {
        self.items.iter().filter(|i| i.result.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ItemReport> {
        self.items.iter().filter(|i| i.result.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Renders a [`RenderJob`] and hands every result to an export sink.
pub struct BatchRunner<'a> {
    pub renderer: Renderer<'a>,
    sink: &'a dyn ExportSink,
    out_dir: PathBuf,
    pub bit_depth: u16,
    pub clipping: ClippingPolicy,
    playback: Option<&'a dyn PlaybackSink>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(renderer: Renderer<'a>, sink: &'a dyn ExportSink, out_dir: impl Into<PathBuf>) -> Self {
        BatchRunner {
            renderer,
            sink,
            out_dir: out_dir.into(),
            bit_depth: 16,
            clipping: ClippingPolicy::default(),
            playback: None,
        }
    }

    /// Play every rendered scale after it has been exported.
    pub fn with_playback(mut self, playback: &'a dyn PlaybackSink) -> Self {
        self.playback = Some(playback);
        self
    }

    pub fn destination(&self, key: &str) -> PathBuf {
        self.out_dir.join(format!("{key}.wav"))
    }

    pub fn run(&self, job: &RenderJob) -> BatchReport {
        let mut report = BatchReport::default();
        for note in &job.notes {
            report
                .items
                .push(self.process(note.key(), || self.renderer.note(note), false));
        }
        for chord in &job.chords {
            report
                .items
                .push(self.process(chord.key(), || self.renderer.chord(chord), false));
        }
        for scale in &job.scales {
            report
                .items
                .push(self.process(scale.key(), || self.renderer.scale(scale), true));
        }

        let failed = report.failed().count();
        info!(total = report.items.len(), failed, "batch finished");
        report
    }

    fn process(
        &self,
        key: String,
        render: impl FnOnce() -> Result<ToneBuffer>,
        play: bool,
    ) -> ItemReport {
        let destination = self.destination(&key);
        let mut item = ItemReport {
            key,
            destination,
            result: Ok(()),
            clipping: None,
            playback: None,
        };

        let buffer = match render() {
            Ok(b) => b,
            Err(e) => {
                error!(key = %item.key, error = %e, "render failed");
                item.result = Err(e.into());
                return item;
            }
        };

        item.clipping = buffer.clipping_warning();
        if let Some(warning) = item.clipping {
            warn!(key = %item.key, %warning, policy = ?self.clipping, "clipping");
        }
        let buffer = self.clipping.apply(&buffer);

        if let Err(e) = self.export(&buffer, &item.destination) {
            error!(key = %item.key, error = %e, "export failed");
            item.result = Err(e);
            return item;
        }

        if play {
            if let Some(playback) = self.playback {
                let played = playback.play(&buffer);
                if let Err(e) = &played {
                    error!(key = %item.key, error = %e, "playback failed");
                }
                item.playback = Some(played);
            }
        }
        item
    }

    fn export(&self, buffer: &ToneBuffer, destination: &Path) -> std::result::Result<(), SinkError> {
        self.sink.export(buffer, self.bit_depth, destination)
    }
}
