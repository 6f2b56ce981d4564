//! Audio output abstraction
//!
//! An [`AudioOutput`] is a period-oriented PCM sink in the style of an ALSA
//! playback handle: the renderer asks how many frames fit, writes whole
//! periods of interleaved `i16` samples, and re-prepares the stream when a
//! write reports an underflow.

use crate::Result;
use std::sync::Arc;

/// Callback fired by an output whenever it has room for more frames
///
/// Outputs must invoke it from their own playback context, never from inside
/// one of the [`AudioOutput`] methods, and without holding any of their own
/// locks, since the callback writes back into the same output.
pub type ReadyCallback = Arc<dyn Fn() + Send + Sync>;

/// Stream parameters requested at bring-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    /// Requested sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Requested period size in frames
    pub period_frames: usize,
    /// Buffer depth in periods
    pub buffer_periods: usize,
    /// Device name, `None` for the system default
    pub device: Option<String>,
}

/// Stream parameters actually granted by the output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFormat {
    /// Negotiated sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Negotiated period size in frames
    pub period_frames: usize,
    /// Human-readable device name
    pub device_name: String,
}

impl StreamFormat {
    /// Samples in one period (`period_frames * channels`)
    pub fn period_samples(&self) -> usize {
        self.period_frames * self.channels as usize
    }
}

/// Result of a frame submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// The frames were queued
    Written,
    /// The buffer ran dry before this write; nothing was queued and the stream
    /// must be prepared again
    Underflow,
}

/// Period-oriented PCM playback sink
pub trait AudioOutput: Send {
    /// Open the device and negotiate the stream format
    fn configure(&mut self, request: &StreamRequest) -> Result<StreamFormat>;

    /// Reset the stream so it accepts writes again (also clears an underflow)
    fn prepare(&mut self) -> Result<()>;

    /// Queue interleaved samples; `samples.len()` is a whole number of frames
    fn write_frames(&mut self, samples: &[i16]) -> Result<WriteStatus>;

    /// Frames that can be written without blocking
    fn available_frames(&self) -> usize;

    /// Install or remove the ready callback
    fn set_ready_callback(&mut self, callback: Option<ReadyCallback>);

    /// Start playback of queued frames
    fn start(&mut self) -> Result<()>;

    /// Drain queued frames and release the device
    fn close(&mut self) -> Result<()>;
}
