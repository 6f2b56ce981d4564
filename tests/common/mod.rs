//! Shared test doubles for the register transport, synthesis engine and audio output
#![allow(dead_code)]

use opl3sw::{
    AudioOutput, BankMode, OplBackend, Opl3Error, ReadyCallback, RegisterTransport, Result,
    StreamFormat, StreamRequest, WriteStatus,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Sample value produced by [`RecordingChip`], distinguishable from silence
pub const TONE: i16 = 0x1234;

#[derive(Debug, Default)]
pub struct ChipLog {
    pub writes: Vec<(u16, u8)>,
    pub resets: Vec<u32>,
    pub periods: usize,
    pub mode: BankMode,
}

/// Backend that records writes and flips to OPL3 mode on register 0x105
#[derive(Clone, Default)]
pub struct RecordingChip {
    pub log: Arc<Mutex<ChipLog>>,
}

impl RecordingChip {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<(u16, u8)> {
        self.log.lock().writes.clone()
    }
}

impl OplBackend for RecordingChip {
    fn reset(&mut self, sample_rate: u32) {
        let mut log = self.log.lock();
        log.resets.push(sample_rate);
        log.mode = BankMode::Opl2;
    }

    fn write_register(&mut self, register: u16, value: u8) {
        let mut log = self.log.lock();
        log.writes.push((register, value));
        if register == 0x105 {
            log.mode = BankMode::from_new_bit(value);
        }
    }

    fn generate_period(&mut self, buffer: &mut [i16], _frames: usize) {
        buffer.fill(TONE);
        self.log.lock().periods += 1;
    }

    fn bank_mode(&self) -> BankMode {
        self.log.lock().mode
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEvent {
    Configure,
    Prepare,
    Silence,
    Audio,
    Underflow,
    Start,
    Close,
}

#[derive(Default)]
pub struct OutputLog {
    pub events: Vec<OutputEvent>,
    pub capacity_frames: usize,
    pub queued_frames: usize,
    pub channels: usize,
    pub configure_failures: usize,
    pub underflow_next: bool,
    pub callback: Option<ReadyCallback>,
}

/// Output with a simulated device buffer that the test drains by hand
#[derive(Clone)]
pub struct MockOutput {
    pub log: Arc<Mutex<OutputLog>>,
}

impl MockOutput {
    pub fn with_capacity(capacity_frames: usize) -> Self {
        MockOutput {
            log: Arc::new(Mutex::new(OutputLog {
                capacity_frames,
                ..Default::default()
            })),
        }
    }

    pub fn events(&self) -> Vec<OutputEvent> {
        self.log.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.log.lock().events.clear();
    }

    /// Simulate the device playing `frames` frames
    pub fn consume(&self, frames: usize) {
        let mut log = self.log.lock();
        log.queued_frames = log.queued_frames.saturating_sub(frames);
    }

    /// Fire the registered ready callback, as the device would
    pub fn fire_ready(&self) {
        let callback = self.log.lock().callback.clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    pub fn has_callback(&self) -> bool {
        self.log.lock().callback.is_some()
    }
}

impl AudioOutput for MockOutput {
    fn configure(&mut self, request: &StreamRequest) -> Result<StreamFormat> {
        let mut log = self.log.lock();
        if log.configure_failures > 0 {
            log.configure_failures -= 1;
            return Err(Opl3Error::AudioDeviceError("device busy".into()));
        }
        log.events.push(OutputEvent::Configure);
        log.channels = request.channels as usize;
        Ok(StreamFormat {
            sample_rate: request.sample_rate,
            channels: request.channels,
            period_frames: request.period_frames,
            device_name: "mock".into(),
        })
    }

    fn prepare(&mut self) -> Result<()> {
        let mut log = self.log.lock();
        log.queued_frames = 0;
        log.events.push(OutputEvent::Prepare);
        Ok(())
    }

    fn write_frames(&mut self, samples: &[i16]) -> Result<WriteStatus> {
        let mut log = self.log.lock();
        if log.underflow_next {
            log.underflow_next = false;
            log.events.push(OutputEvent::Underflow);
            return Ok(WriteStatus::Underflow);
        }
        let frames = samples.len() / log.channels.max(1);
        log.queued_frames += frames;
        let event = if samples.iter().all(|&s| s == 0) {
            OutputEvent::Silence
        } else {
            OutputEvent::Audio
        };
        log.events.push(event);
        Ok(WriteStatus::Written)
    }

    fn available_frames(&self) -> usize {
        let log = self.log.lock();
        log.capacity_frames.saturating_sub(log.queued_frames)
    }

    fn set_ready_callback(&mut self, callback: Option<ReadyCallback>) {
        self.log.lock().callback = callback;
    }

    fn start(&mut self) -> Result<()> {
        self.log.lock().events.push(OutputEvent::Start);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.log.lock().events.push(OutputEvent::Close);
        Ok(())
    }
}

/// Transport over a fixed queue that records which read path was used
#[derive(Default)]
pub struct ScriptedTransport {
    pub queue: VecDeque<u16>,
    pub scalar_reads: usize,
    pub bulk_reads: Vec<usize>,
    /// Entries reported but lost by the bulk path (emulates a transport that
    /// discards what it was not asked for)
    pub discard_unread: bool,
}

impl ScriptedTransport {
    pub fn push(&mut self, port: u8, value: u8) {
        self.queue.push_back(((port as u16) << 8) | value as u16);
    }
}

impl RegisterTransport for ScriptedTransport {
    fn pending_writes(&mut self, _port: u32) -> u16 {
        self.queue.len() as u16
    }

    fn read_scalar(&mut self, _port: u32) -> u16 {
        self.scalar_reads += 1;
        self.queue.pop_front().unwrap_or(0)
    }

    fn read_bulk(&mut self, _port: u32, dest: &mut [u32]) {
        self.bulk_reads.push(dest.len() * 2);
        for word in dest.iter_mut() {
            let lo = self.queue.pop_front().unwrap_or(0) as u32;
            let hi = self.queue.pop_front().unwrap_or(0) as u32;
            *word = (hi << 16) | lo;
        }
        if self.discard_unread {
            self.queue.clear();
        }
    }
}
