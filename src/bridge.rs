//! Poll-driven bridge from register writes to audio output
//!
//! [`Opl3Bridge`] is the context object shared by the two entry points:
//! [`Opl3Bridge::poll`], called from the emulation loop, and the ready
//! callback registered with the audio output. The audio path is brought up
//! lazily on the first poll that sees pending writes, so a device that is
//! never driven never claims the audio device.

use crate::backend::OplBackend;
use crate::config::BridgeConfig;
use crate::drain::{DrainStats, WriteQueueDrain};
use crate::output::{AudioOutput, ReadyCallback, StreamFormat};
use crate::port::AddressLatch;
use crate::render::{PlaybackState, RenderStats, Renderer};
use crate::transport::RegisterTransport;
use crate::{Opl3Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

/// Software OPL3 bridge
pub struct Opl3Bridge<B, A>
where
    B: OplBackend + 'static,
    A: AudioOutput + 'static,
{
    config: BridgeConfig,
    chip: Arc<Mutex<B>>,
    latch: AddressLatch,
    drain: WriteQueueDrain,
    renderer: Arc<Mutex<Renderer<B, A>>>,
    /// Mirrors "renderer not `Uninitialized`" so poll never waits on the render loop
    active: bool,
}

impl<B, A> Opl3Bridge<B, A>
where
    B: OplBackend + 'static,
    A: AudioOutput + 'static,
{
    /// Create a bridge; nothing is opened until the first register activity
    pub fn new(config: BridgeConfig, chip: B, output: A) -> Result<Self> {
        config.validate()?;

        let chip = Arc::new(Mutex::new(chip));
        let renderer = Arc::new(Mutex::new(Renderer::new(Arc::clone(&chip), output)));

        Ok(Opl3Bridge {
            drain: WriteQueueDrain::new(config.batch_capacity),
            config,
            chip,
            latch: AddressLatch::new(),
            renderer,
            active: false,
        })
    }

    /// Bridge configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Shared handle to the synthesis backend
    pub fn chip(&self) -> Arc<Mutex<B>> {
        Arc::clone(&self.chip)
    }

    /// Currently latched register address
    pub fn latched_register(&self) -> u16 {
        self.latch.register()
    }

    /// Current playback lifecycle state
    pub fn state(&self) -> PlaybackState {
        self.renderer.lock().state()
    }

    /// Whether the audio path has been brought up
    pub fn is_initialized(&self) -> bool {
        self.active
    }

    /// Negotiated output format, once initialized
    pub fn format(&self) -> Option<StreamFormat> {
        self.renderer.lock().format().cloned()
    }

    /// Drain counters
    pub fn drain_stats(&self) -> DrainStats {
        self.drain.stats()
    }

    /// Render counters
    pub fn render_stats(&self) -> RenderStats {
        self.renderer.lock().stats()
    }

    /// Callback equivalent to the one registered with the output
    ///
    /// Useful for outputs driven by an external event loop that cannot call
    /// back on their own. If the renderer is busy (bring-up, teardown or
    /// another callback) the invocation is skipped; the output fires again
    /// once more room frees up.
    pub fn ready_callback(&self) -> ReadyCallback {
        let renderer = Arc::downgrade(&self.renderer);
        Arc::new(move || {
            let Some(renderer) = renderer.upgrade() else {
                return;
            };
            // Never block the audio thread: teardown joins it while holding this lock
            if let Some(mut renderer) = renderer.try_lock() {
                renderer.on_ready();
            };
        })
    }

    /// Run one poll tick against `transport`
    ///
    /// Returns the number of register writes applied.
    pub fn poll<T: RegisterTransport + ?Sized>(&mut self, transport: &mut T) -> usize {
        let pending = transport.pending_writes(self.config.queue_port);
        if pending == 0 {
            return 0;
        }

        if !self.is_initialized() && self.initialize().is_err() {
            // Pending entries stay queued and are seen again next tick
            self.drain.note_init_failure();
            return 0;
        }

        let writes = self
            .drain
            .fetch(transport, self.config.data_port(), pending);

        let mut chip = self.chip.lock();
        for &write in writes {
            self.latch.apply(&mut *chip, write);
        }
        writes.len()
    }

    /// Bring up the audio path and reset the chip
    ///
    /// Opens and primes the output, registers the ready callback, starts
    /// playback and resets the backend at the negotiated rate. On failure the
    /// output is released and the bridge stays uninitialized so a later call
    /// can retry. Calling it on a running bridge returns the current format
    /// without touching the output or the chip.
    pub fn initialize(&mut self) -> Result<StreamFormat> {
        if self.active {
            return self
                .format()
                .ok_or_else(|| Opl3Error::Other("audio output running without a format".into()));
        }

        let request = self.config.stream_request();
        let callback = self.ready_callback();
        let mut renderer = self.renderer.lock();

        let result = renderer.bring_up(&request).and_then(|format| {
            renderer.output_mut().set_ready_callback(Some(callback));
            renderer.start()?;
            Ok(format)
        });

        match result {
            Ok(format) => {
                drop(renderer);
                self.active = true;
                self.chip.lock().reset(format.sample_rate);
                info!(
                    device = %format.device_name,
                    sample_rate = format.sample_rate,
                    channels = format.channels,
                    period_frames = format.period_frames,
                    "OPL3 audio output started"
                );
                Ok(format)
            }
            Err(err) => {
                renderer.abort_bring_up();
                warn!("OPL3 audio bring-up failed, retrying on next activity: {err}");
                Err(err)
            }
        }
    }

    /// Stop playback and release the output
    ///
    /// The next poll that sees pending writes brings the pipeline up again.
    pub fn shutdown(&mut self) {
        if !self.active {
            return;
        }

        let mut renderer = self.renderer.lock();
        renderer.teardown();
        self.active = false;
        let stats = renderer.stats();
        info!(
            periods = stats.periods_rendered,
            underflows = stats.underflows,
            "OPL3 audio output closed"
        );
    }
}

impl<B, A> Drop for Opl3Bridge<B, A>
where
    B: OplBackend + 'static,
    A: AudioOutput + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}
