//! Bridge configuration
//!
//! All fields have defaults matching a stereo 44.1 kHz output, so a partial
//! JSON document only needs to name what it changes.

use crate::drain::DEFAULT_BATCH_CAPACITY;
use crate::output::StreamRequest;
use crate::{Opl3Error, Result};
use serde::{Deserialize, Serialize};

/// Default output sample rate (44.1 kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Default channel count (stereo)
pub const DEFAULT_CHANNELS: u16 = 2;

/// Default period size hint in frames
pub const DEFAULT_PERIOD_FRAMES: usize = 256;

/// Default output buffer depth in periods
pub const DEFAULT_BUFFER_PERIODS: usize = 8;

/// Configuration for an [`Opl3Bridge`](crate::Opl3Bridge)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Requested output sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved output channels
    pub channels: u16,
    /// Requested period size in frames
    pub period_frames: usize,
    /// Output buffer depth in periods
    pub buffer_periods: usize,
    /// Maximum register writes fetched per poll tick
    pub batch_capacity: usize,
    /// Status port of the register mailbox; data is read from `queue_port + 1`
    pub queue_port: u32,
    /// Output device name, `None` for the system default
    pub device: Option<String>,
}

impl BridgeConfig {
    /// Parse a configuration from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: BridgeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that every field is within its supported range
    pub fn validate(&self) -> Result<()> {
        if !(8_000..=192_000).contains(&self.sample_rate) {
            return Err(Opl3Error::ConfigError(format!(
                "sample rate {} Hz outside 8000..=192000",
                self.sample_rate
            )));
        }
        if !(1..=8).contains(&self.channels) {
            return Err(Opl3Error::ConfigError(format!(
                "channel count {} outside 1..=8",
                self.channels
            )));
        }
        if self.period_frames == 0 {
            return Err(Opl3Error::ConfigError(
                "period size must be greater than 0".into(),
            ));
        }
        if self.buffer_periods < 2 {
            return Err(Opl3Error::ConfigError(format!(
                "buffer must hold at least 2 periods, got {}",
                self.buffer_periods
            )));
        }
        if self.batch_capacity < 2
            || self.batch_capacity > u16::MAX as usize
            || self.batch_capacity % 2 != 0
        {
            return Err(Opl3Error::ConfigError(format!(
                "batch capacity {} must be even and within 2..=65535",
                self.batch_capacity
            )));
        }
        Ok(())
    }

    /// Data port of the register mailbox
    pub fn data_port(&self) -> u32 {
        self.queue_port.wrapping_add(1)
    }

    /// Output stream parameters derived from this configuration
    pub fn stream_request(&self) -> StreamRequest {
        StreamRequest {
            sample_rate: self.sample_rate,
            channels: self.channels,
            period_frames: self.period_frames,
            buffer_periods: self.buffer_periods,
            device: self.device.clone(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            period_frames: DEFAULT_PERIOD_FRAMES,
            buffer_periods: DEFAULT_BUFFER_PERIODS,
            batch_capacity: DEFAULT_BATCH_CAPACITY,
            queue_port: 0,
            device: None,
        }
    }
}
