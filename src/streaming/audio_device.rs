//! Audio device integration using rodio
//!
//! rodio's output stream is not `Send`, so it lives on a dedicated thread for
//! the lifetime of the output. The thread's [`RingSource`] pulls samples from
//! the [`SampleRing`], reports underflows back to the writer, and fires the
//! ready callback whenever a period of room is free.

use super::{SampleRing, BUFFER_BACKOFF_MICROS};
use crate::output::{AudioOutput, ReadyCallback, StreamFormat, StreamRequest, WriteStatus};
use crate::{Opl3Error, Result};
use parking_lot::Mutex;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::debug;

/// State shared between the writer side and the playback thread
#[derive(Default)]
struct Shared {
    running: AtomicBool,
    underflow: AtomicBool,
    finished: AtomicBool,
    ready: Mutex<Option<ReadyCallback>>,
}

impl Shared {
    fn notify_ready(&self) {
        // Clone out so the callback runs without the slot locked
        let callback = self.ready.lock().clone();
        if let Some(callback) = callback {
            callback();
        }
    }
}

/// Samples that can be queued without exceeding `depth_samples` of latency
///
/// The ring is rounded up to a power of two, so its free space alone would
/// overstate the configured buffer depth.
fn room(ring: &SampleRing, depth_samples: usize) -> usize {
    depth_samples
        .saturating_sub(ring.available_read())
        .min(ring.available_write())
}

/// Audio source that reads from the sample ring
struct RingSource {
    ring: Arc<SampleRing>,
    shared: Arc<Shared>,
    sample_rate: u32,
    channels: u16,
    period_samples: usize,
    depth_samples: usize,
    /// Internal batch, one period long (reduces lock contention)
    batch: Vec<i16>,
    batch_pos: usize,
}

impl RingSource {
    fn new(
        ring: Arc<SampleRing>,
        shared: Arc<Shared>,
        sample_rate: u32,
        channels: u16,
        period_samples: usize,
        depth_samples: usize,
    ) -> Self {
        RingSource {
            ring,
            shared,
            sample_rate,
            channels,
            period_samples,
            depth_samples,
            batch: vec![0; period_samples],
            batch_pos: period_samples, // Start by reading a new batch
        }
    }

    fn refill(&mut self) {
        let read = self.ring.read(&mut self.batch);
        if read < self.batch.len() {
            // Underrun - pad with silence and tell the writer to re-prime
            self.batch[read..].fill(0);
            if self.shared.running.load(Ordering::Acquire) {
                self.shared.underflow.store(true, Ordering::Release);
            }
        }
        self.batch_pos = 0;

        if room(&self.ring, self.depth_samples) >= self.period_samples {
            self.shared.notify_ready();
        }
    }
}

impl Source for RingSource {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.batch.len() - self.batch_pos.min(self.batch.len())).filter(|&n| n > 0)
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

impl Iterator for RingSource {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        if self.shared.finished.load(Ordering::Relaxed) {
            return None;
        }

        if self.batch_pos >= self.batch.len() {
            self.refill();
        }

        let sample = self.batch[self.batch_pos];
        self.batch_pos += 1;
        Some(sample)
    }
}

enum Command {
    Start,
    Close,
}

/// Open state of a configured output
struct Playback {
    ring: Arc<SampleRing>,
    control: mpsc::Sender<Command>,
    thread: JoinHandle<()>,
    channels: usize,
    sample_rate: u32,
    depth_samples: usize,
}

/// System audio output using rodio
///
/// Nothing is opened until [`AudioOutput::configure`] is called, which is what
/// makes lazy bring-up cheap for devices that are never driven.
#[derive(Default)]
pub struct RodioOutput {
    shared: Arc<Shared>,
    playback: Option<Playback>,
}

impl RodioOutput {
    /// Create an unopened output
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the device has been opened
    pub fn is_open(&self) -> bool {
        self.playback.is_some()
    }

    fn open_stream(device: Option<&str>) -> Result<(OutputStream, OutputStreamHandle, String)> {
        match device {
            None | Some("default") => {
                let (stream, handle) = OutputStream::try_default()
                    .map_err(|e| format!("Failed to create audio stream: {}", e))?;
                Ok((stream, handle, "default".into()))
            }
            Some(name) => {
                let host = rodio::cpal::default_host();
                let device = host
                    .output_devices()
                    .map_err(|e| Opl3Error::AudioDeviceError(e.to_string()))?
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| {
                        Opl3Error::AudioDeviceError(format!("output device '{name}' not found"))
                    })?;
                let (stream, handle) = OutputStream::try_from_device(&device)
                    .map_err(|e| format!("Failed to open '{}': {}", name, e))?;
                Ok((stream, handle, name.to_string()))
            }
        }
    }
}

impl AudioOutput for RodioOutput {
    fn configure(&mut self, request: &StreamRequest) -> Result<StreamFormat> {
        if self.playback.is_some() {
            self.close()?;
        }

        let channels = request.channels as usize;
        let period_samples = request.period_frames * channels;
        let depth_samples = period_samples * request.buffer_periods;
        // +1 keeps room for the ring's reserved empty slot
        let ring = Arc::new(SampleRing::new(depth_samples + 1)?);

        self.shared.running.store(false, Ordering::Release);
        self.shared.underflow.store(false, Ordering::Release);
        self.shared.finished.store(false, Ordering::Release);

        let source = RingSource::new(
            Arc::clone(&ring),
            Arc::clone(&self.shared),
            request.sample_rate,
            request.channels,
            period_samples,
            depth_samples,
        );

        let device = request.device.clone();
        let (opened_tx, opened_rx) = mpsc::channel::<Result<String>>();
        let (control, commands) = mpsc::channel::<Command>();

        let thread = std::thread::Builder::new()
            .name("opl3-audio".into())
            .spawn(move || {
                let opened = RodioOutput::open_stream(device.as_deref()).and_then(
                    |(stream, handle, name)| {
                        let sink = Sink::try_new(&handle)
                            .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                        sink.pause();
                        sink.append(source);
                        Ok((stream, sink, name))
                    },
                );

                let (_stream, sink) = match opened {
                    Ok((stream, sink, name)) => {
                        let _ = opened_tx.send(Ok(name));
                        (stream, sink)
                    }
                    Err(err) => {
                        let _ = opened_tx.send(Err(err));
                        return;
                    }
                };

                for command in commands {
                    match command {
                        Command::Start => sink.play(),
                        Command::Close => break,
                    }
                }
                sink.stop();
            })?;

        let device_name = match opened_rx.recv() {
            Ok(Ok(name)) => name,
            Ok(Err(err)) => {
                let _ = thread.join();
                return Err(err);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(Opl3Error::AudioDeviceError(
                    "audio thread exited during setup".into(),
                ));
            }
        };

        self.playback = Some(Playback {
            ring,
            control,
            thread,
            channels,
            sample_rate: request.sample_rate,
            depth_samples,
        });

        Ok(StreamFormat {
            sample_rate: request.sample_rate,
            channels: request.channels,
            period_frames: request.period_frames,
            device_name,
        })
    }

    fn prepare(&mut self) -> Result<()> {
        let playback = self
            .playback
            .as_ref()
            .ok_or_else(|| Opl3Error::AudioDeviceError("output not configured".into()))?;
        playback.ring.clear();
        self.shared.underflow.store(false, Ordering::Release);
        Ok(())
    }

    fn write_frames(&mut self, samples: &[i16]) -> Result<WriteStatus> {
        let playback = self
            .playback
            .as_ref()
            .ok_or_else(|| Opl3Error::AudioDeviceError("output not configured".into()))?;

        if self.shared.underflow.load(Ordering::Acquire) {
            return Ok(WriteStatus::Underflow);
        }

        let written = playback.ring.write(samples);
        if written < samples.len() {
            return Err(Opl3Error::AudioDeviceError(format!(
                "short write: {written} of {} samples queued",
                samples.len()
            )));
        }
        Ok(WriteStatus::Written)
    }

    fn available_frames(&self) -> usize {
        self.playback
            .as_ref()
            .map_or(0, |p| room(&p.ring, p.depth_samples) / p.channels)
    }

    fn set_ready_callback(&mut self, callback: Option<ReadyCallback>) {
        *self.shared.ready.lock() = callback;
    }

    fn start(&mut self) -> Result<()> {
        let playback = self
            .playback
            .as_ref()
            .ok_or_else(|| Opl3Error::AudioDeviceError("output not configured".into()))?;
        self.shared.running.store(true, Ordering::Release);
        playback
            .control
            .send(Command::Start)
            .map_err(|_| Opl3Error::AudioDeviceError("audio thread is gone".into()))
    }

    fn close(&mut self) -> Result<()> {
        let Some(playback) = self.playback.take() else {
            return Ok(());
        };

        // Let queued audio play out before stopping the stream
        if self.shared.running.load(Ordering::Acquire) {
            let queued = playback.ring.available_read() / playback.channels.max(1);
            let budget = Duration::from_secs_f64(queued as f64 / playback.sample_rate as f64)
                + Duration::from_millis(50);
            let deadline = Instant::now() + budget;
            while playback.ring.available_read() > 0 && Instant::now() < deadline {
                std::thread::sleep(Duration::from_micros(BUFFER_BACKOFF_MICROS));
            }
        }

        self.shared.running.store(false, Ordering::Release);
        self.shared.finished.store(true, Ordering::Release);
        let _ = playback.control.send(Command::Close);
        playback
            .thread
            .join()
            .map_err(|_| Opl3Error::AudioDeviceError("audio thread panicked".into()))?;
        debug!("rodio output closed");
        Ok(())
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
