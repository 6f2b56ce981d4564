//! Streaming audio output
//!
//! [`SampleRing`] decouples the render callback (producer) from the audio
//! device (consumer). With the `streaming` feature, [`RodioOutput`] plays the
//! ring through the system audio device and drives the ready callback from the
//! device's pull loop.

pub mod ring_buffer;

#[cfg(feature = "streaming")]
pub mod audio_device;

pub use ring_buffer::SampleRing;

#[cfg(feature = "streaming")]
pub use audio_device::RodioOutput;

/// Buffer backoff time in microseconds
pub const BUFFER_BACKOFF_MICROS: u64 = 100;
