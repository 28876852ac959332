//! External collaborators: WAV export, WAV loading, playback, and the
//! preloaded sound cache used by keyboard front ends.

use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::{debug, info, warn};

use crate::dsp::buffer::{ToneBuffer, dequantize, quantize};
use crate::error::SinkError;

/// Accepts a finished buffer and writes it somewhere. The buffer carries
/// its own sample rate.
pub trait ExportSink: Sync {
    fn export(&self, buffer: &ToneBuffer, bit_depth: u16, destination: &Path) -> Result<(), SinkError>;
}

/// Plays a buffer, returning once playback has finished.
pub trait PlaybackSink {
    fn play(&self, buffer: &ToneBuffer) -> Result<(), SinkError>;
}

fn wav_spec(sample_rate: u32, bit_depth: u16) -> Result<WavSpec, SinkError> {
    if !matches!(bit_depth, 16 | 24 | 32) {
        return Err(SinkError::UnsupportedBitDepth(bit_depth));
    }
    Ok(WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: bit_depth,
        sample_format: SampleFormat::Int,
    })
}

/// Writes mono integer-PCM WAV files with `hound`.
///
/// Files are written next to the destination under a `.part` name and
/// renamed into place once complete, so a failed export never leaves a
/// truncated file at the destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavFileSink;

fn write_samples<W: Write + Seek>(
    mut writer: WavWriter<W>,
    buffer: &ToneBuffer,
    bits: u16,
) -> Result<(), SinkError> {
    for &s in &buffer.samples {
        let v = quantize(s, bits);
        if bits == 16 {
            writer.write_sample(v as i16)?;
        } else {
            writer.write_sample(v)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Encode a mono buffer as an integer-PCM WAV byte stream.
pub fn encode_wav(buffer: &ToneBuffer, bit_depth: u16) -> Result<Vec<u8>, SinkError> {
    let spec = wav_spec(buffer.sample_rate, bit_depth)?;
    let mut cursor = Cursor::new(Vec::new());
    write_samples(WavWriter::new(&mut cursor, spec)?, buffer, bit_depth)?;
    Ok(cursor.into_inner())
}

impl WavFileSink {
    fn write(path: &Path, buffer: &ToneBuffer, spec: WavSpec) -> Result<(), SinkError> {
        write_samples(WavWriter::create(path, spec)?, buffer, spec.bits_per_sample)
    }
}

impl ExportSink for WavFileSink {
    fn export(&self, buffer: &ToneBuffer, bit_depth: u16, destination: &Path) -> Result<(), SinkError> {
        let spec = wav_spec(buffer.sample_rate, bit_depth)?;
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut part = destination.as_os_str().to_owned();
        part.push(".part");
        let part = PathBuf::from(part);

        if let Err(e) = Self::write(&part, buffer, spec) {
            let _ = fs::remove_file(&part);
            return Err(e);
        }
        fs::rename(&part, destination)?;
        info!(path = %destination.display(), samples = buffer.len(), "saved");
        Ok(())
    }
}

/// A WAV file decoded to mono.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedWav {
    pub buffer: ToneBuffer,
    pub bit_depth: u16,
    pub float: bool,
}

/// Load a WAV file, averaging multi-channel audio down to mono.
pub fn load_wav(path: &Path) -> Result<LoadedWav, SinkError> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    let raw: Vec<f64> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<Result<_, _>>()?,
        SampleFormat::Int => reader
            .samples::<i32>()
            .map(|s| s.map(|v| dequantize(v, spec.bits_per_sample)))
            .collect::<Result<_, _>>()?,
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        raw
    } else {
        raw.chunks(channels)
            .map(|frame| frame.iter().sum::<f64>() / channels as f64)
            .collect()
    };
    debug!(path = %path.display(), channels, bits = spec.bits_per_sample, "loaded wav");

    Ok(LoadedWav {
        buffer: ToneBuffer::new(samples, spec.sample_rate),
        bit_depth: spec.bits_per_sample,
        float: spec.sample_format == SampleFormat::Float,
    })
}

/// Keeps exported buffers in memory instead of writing files.
#[derive(Debug, Default)]
pub struct MemorySink {
    exports: Mutex<Vec<(PathBuf, ToneBuffer)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink::default()
    }

    /// Everything exported so far, in export order.
    pub fn exports(&self) -> Vec<(PathBuf, ToneBuffer)> {
        self.exports.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn get(&self, destination: &Path) -> Option<ToneBuffer> {
        self.exports()
            .into_iter()
            .find(|(p, _)| p == destination)
            .map(|(_, b)| b)
    }
}

impl ExportSink for MemorySink {
    fn export(&self, buffer: &ToneBuffer, bit_depth: u16, destination: &Path) -> Result<(), SinkError> {
        wav_spec(buffer.sample_rate, bit_depth)?;
        let mut exports = self
            .exports
            .lock()
            .map_err(|_| SinkError::Io(std::io::Error::other("memory sink poisoned")))?;
        exports.push((destination.to_path_buf(), buffer.clone()));
        Ok(())
    }
}

/// Preloaded note buffers, looked up by note name.
#[derive(Debug, Clone, Default)]
pub struct SoundCache {
    sounds: HashMap<String, ToneBuffer>,
}

impl SoundCache {
    /// Load `<dir>/<name>.wav` for every name. Missing or unreadable files
    /// are logged and skipped.
    pub fn preload(dir: &Path, names: &[&str]) -> Self {
        let mut cache = SoundCache::default();
        for &name in names {
            let path = dir.join(format!("{name}.wav"));
            if !path.exists() {
                warn!(path = %path.display(), "sound file not found");
                continue;
            }
            match load_wav(&path) {
                Ok(loaded) => cache.insert(name, loaded.buffer),
                Err(e) => warn!(path = %path.display(), error = %e, "failed to load sound"),
            }
        }
        cache
    }

    pub fn insert(&mut self, name: &str, buffer: ToneBuffer) {
        self.sounds.insert(name.to_string(), buffer);
    }

    pub fn get(&self, name: &str) -> Option<&ToneBuffer> {
        self.sounds.get(name)
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone() -> ToneBuffer {
        ToneBuffer::new(vec![0.0, 0.25, -0.5, 0.999, -1.0, 0.123456], 8000)
    }

    #[test]
    fn wav_roundtrip_is_lossless_at_bit_depth() {
        let dir = tempfile::tempdir().unwrap();
        for bits in [16u16, 24, 32] {
            let first = dir.path().join(format!("first-{bits}.wav"));
            let second = dir.path().join(format!("second-{bits}.wav"));
            WavFileSink.export(&tone(), bits, &first).unwrap();

            let loaded = load_wav(&first).unwrap();
            assert_eq!(loaded.bit_depth, bits);
            assert_eq!(loaded.buffer.sample_rate, 8000);
            assert_eq!(loaded.buffer.len(), tone().len());

            WavFileSink.export(&loaded.buffer, bits, &second).unwrap();
            assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
        }
    }

    #[test]
    fn encoded_bytes_match_exported_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("tone.wav");
        WavFileSink.export(&tone(), 16, &dest).unwrap();
        let bytes = encode_wav(&tone(), 16).unwrap();
        assert_eq!(bytes, fs::read(&dest).unwrap());

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(u16::from_le_bytes([bytes[22], bytes[23]]), 1);
        assert_eq!(u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]), 8000);
        assert_eq!(bytes.len(), 44 + 2 * tone().len());

        let reader = WavReader::new(Cursor::new(bytes)).unwrap();
        let samples: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples[1], 8192);
        assert_eq!(samples[4], i16::MIN);
        assert!(matches!(encode_wav(&tone(), 8), Err(SinkError::UnsupportedBitDepth(8))));
    }

    #[test]
    fn export_creates_directories_and_no_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("notes/piano/Do.wav");
        WavFileSink.export(&tone(), 16, &dest).unwrap();
        assert!(dest.exists());
        assert!(!dir.path().join("notes/piano/Do.wav.part").exists());
    }

    #[test]
    fn unsupported_bit_depth_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x.wav");
        assert!(matches!(
            WavFileSink.export(&tone(), 12, &dest),
            Err(SinkError::UnsupportedBitDepth(12))
        ));
        assert!(!dest.exists());
    }

    #[test]
    fn stereo_is_mixed_to_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut w = WavWriter::create(&path, spec).unwrap();
        for (l, r) in [(16384i16, 0i16), (-16384, -16384)] {
            w.write_sample(l).unwrap();
            w.write_sample(r).unwrap();
        }
        w.finalize().unwrap();

        let loaded = load_wav(&path).unwrap();
        assert_eq!(loaded.buffer.samples, vec![0.25, -0.5]);
    }

    #[test]
    fn memory_sink_records_exports() {
        let sink = MemorySink::new();
        sink.export(&tone(), 16, Path::new("a.wav")).unwrap();
        assert_eq!(sink.exports().len(), 1);
        assert_eq!(sink.get(Path::new("a.wav")), Some(tone()));
        assert!(sink.export(&tone(), 8, Path::new("b.wav")).is_err());
    }

    #[test]
    fn sound_cache_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        WavFileSink.export(&tone(), 16, &dir.path().join("Do.wav")).unwrap();
        let cache = SoundCache::preload(dir.path(), &["Do", "Re"]);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("Do").is_some());
        assert!(cache.get("Re").is_none());
    }
}
