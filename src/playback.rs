//! Device playback through cpal.
//! Works with whatever host cpal picks (ALSA, CoreAudio, WASAPI, ...).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use crate::dsp::buffer::ToneBuffer;
use crate::error::SinkError;
use crate::sink::PlaybackSink;

fn playback_err(e: impl std::fmt::Display) -> SinkError {
    SinkError::Playback(e.to_string())
}

/// Plays buffers on the default output device.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalPlayback;

/// A buffer playing in the background. Dropping the handle stops playback.
pub struct PlaybackHandle {
    _stream: cpal::Stream,
    finished: Arc<AtomicBool>,
}

impl PlaybackHandle {
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Block until the whole buffer has been played.
    pub fn wait(self) {
        while !self.is_finished() {
            thread::sleep(Duration::from_millis(10));
        }
        // let the device drain its last period
        thread::sleep(Duration::from_millis(50));
    }
}

/// Linear-interpolation resample to the device rate.
fn resample(buffer: &ToneBuffer, device_rate: u32) -> Vec<f32> {
    if buffer.sample_rate == device_rate || buffer.is_empty() {
        return buffer.samples.iter().map(|&s| s as f32).collect();
    }
    let ratio = buffer.sample_rate as f64 / device_rate as f64;
    let len = (buffer.len() as f64 / ratio).round() as usize;
    (0..len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos as usize;
            let frac = pos - idx as f64;
            let a = buffer.samples.get(idx).copied().unwrap_or(0.0);
            let b = buffer.samples.get(idx + 1).copied().unwrap_or(a);
            (a * (1.0 - frac) + b * frac) as f32
        })
        .collect()
}

impl CpalPlayback {
    /// Start playing and return immediately.
    pub fn start(&self, buffer: &ToneBuffer) -> Result<PlaybackHandle, SinkError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SinkError::Playback("no audio output device found".into()))?;
        let config = device.default_output_config().map_err(playback_err)?;
        info!(device = %device.name().unwrap_or_default(), ?config, "starting playback");

        let channels = config.channels() as usize;
        let samples = Arc::new(resample(buffer, config.sample_rate().0));
        let finished = Arc::new(AtomicBool::new(samples.is_empty()));

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &config.into(), samples, finished.clone(), channels)
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &config.into(), samples, finished.clone(), channels)
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &config.into(), samples, finished.clone(), channels)
            }
            other => return Err(SinkError::Playback(format!("unsupported sample format {other:?}"))),
        }?;
        stream.play().map_err(playback_err)?;

        Ok(PlaybackHandle {
            _stream: stream,
            finished,
        })
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Arc<Vec<f32>>,
    finished: Arc<AtomicBool>,
    channels: usize,
) -> Result<cpal::Stream, SinkError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let position = AtomicUsize::new(0);
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut pos = position.load(Ordering::Relaxed);
                for frame in data.chunks_mut(channels) {
                    let s = samples.get(pos).copied().unwrap_or(0.0);
                    pos += 1;
                    for out in frame.iter_mut() {
                        *out = T::from_sample(s);
                    }
                }
                position.store(pos, Ordering::Relaxed);
                if pos >= samples.len() {
                    finished.store(true, Ordering::Release);
                }
            },
            |err| error!("audio stream error: {}", err),
            None,
        )
        .map_err(playback_err)
}

impl PlaybackSink for CpalPlayback {
    fn play(&self, buffer: &ToneBuffer) -> Result<(), SinkError> {
        self.start(buffer)?.wait();
        Ok(())
    }
}
