use std::io;
use thiserror::Error;

/// Errors raised while rendering a tone, chord or scale.
///
/// Every variant is fatal to the single request that produced it and to
/// nothing else: sibling requests in a batch keep rendering.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SynthError {
    /// Malformed frequency, duration, sample rate, gain or cutoff.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The timbre registry has no entry under this name.
    #[error("Unknown instrument '{0}'")]
    UnknownInstrument(String),

    /// A configuration file could not be parsed or failed validation.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl SynthError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        SynthError::InvalidParameter(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SynthError>;

/// Advisory raised when a buffer's peak leaves the representable [-1, 1]
/// range. Never returned as an `Err` on its own; the caller picks a
/// [`ClippingPolicy`](crate::config::ClippingPolicy).
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("Peak amplitude {peak:.3} exceeds full scale")]
pub struct ClippingWarning {
    pub peak: f64,
}

/// Failures reported by the external export / playback collaborators.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),

    #[error("Playback error: {0}")]
    Playback(String),

    #[error(transparent)]
    Render(#[from] SynthError),
}
