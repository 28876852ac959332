//! DSP — additive synthesis, envelopes, filtering and mixing.
//!
//! Every stage is a pure function over [`buffer::ToneBuffer`] values, so
//! renders are deterministic and can run on any thread.

pub mod buffer;
pub mod envelope;
pub mod filter;
pub mod harmonics;
pub mod mixer;
pub mod oscillator;
pub mod renderer;
