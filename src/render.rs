//! Render callback
//!
//! The [`Renderer`] owns the audio output and a one-period scratch buffer. Each
//! time the output signals room, [`Renderer::on_ready`] generates and submits
//! whole periods until less than one period of space remains, re-priming the
//! stream with silence whenever a submission reports an underflow.

use crate::backend::OplBackend;
use crate::output::{AudioOutput, StreamFormat, StreamRequest, WriteStatus};
use crate::{Opl3Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Silent periods written when priming or re-priming the stream
pub const PRIME_PERIODS: usize = 2;

/// Prepare/prime rounds attempted before priming is reported as failed
const PRIME_ATTEMPTS: usize = 3;

/// Playback lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackState {
    /// Output not opened
    #[default]
    Uninitialized,
    /// Silence queued, playback not started
    Primed,
    /// Playback running, callbacks generate audio
    Running,
    /// An underflow was reported and the stream is being re-primed
    UnderflowRecovering,
}

/// Lifecycle event driving [`PlaybackState::transition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackEvent {
    /// Output opened and silence queued
    Primed,
    /// Playback started
    Started,
    /// A submission reported an underflow
    Underflow,
    /// Silence re-queued after an underflow
    Recovered,
    /// Output closed
    TornDown,
}

impl PlaybackState {
    /// Next state for `event`, or `None` if the event is not valid here
    pub fn transition(self, event: PlaybackEvent) -> Option<Self> {
        use PlaybackEvent as E;
        use PlaybackState as S;

        match (self, event) {
            (_, E::TornDown) => Some(S::Uninitialized),
            (S::Uninitialized, E::Primed) => Some(S::Primed),
            (S::Primed, E::Started) => Some(S::Running),
            (S::Running, E::Underflow) => Some(S::UnderflowRecovering),
            (S::UnderflowRecovering, E::Recovered) => Some(S::Running),
            _ => None,
        }
    }
}

/// Render loop statistics for monitoring buffer health
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Periods generated by the backend and queued
    pub periods_rendered: u64,
    /// Frames queued, silence included
    pub frames_written: u64,
    /// Underflow events recovered from
    pub underflows: u64,
    /// Submissions that failed outright
    pub write_errors: u64,
}

/// Audio-ready callback target
pub struct Renderer<B, A> {
    chip: Arc<Mutex<B>>,
    output: A,
    scratch: Vec<i16>,
    format: Option<StreamFormat>,
    state: PlaybackState,
    stats: RenderStats,
}

impl<B: OplBackend, A: AudioOutput> Renderer<B, A> {
    /// Create an uninitialized renderer around an unopened output
    pub fn new(chip: Arc<Mutex<B>>, output: A) -> Self {
        Renderer {
            chip,
            output,
            scratch: Vec::new(),
            format: None,
            state: PlaybackState::Uninitialized,
            stats: RenderStats::default(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Render statistics
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Negotiated stream format, once configured
    pub fn format(&self) -> Option<&StreamFormat> {
        self.format.as_ref()
    }

    /// Mutable access to the output (callback registration)
    pub(crate) fn output_mut(&mut self) -> &mut A {
        &mut self.output
    }

    fn advance(&mut self, event: PlaybackEvent) {
        match self.state.transition(event) {
            Some(next) => {
                debug!(from = ?self.state, to = ?next, ?event, "playback state");
                self.state = next;
            }
            None => debug!(state = ?self.state, ?event, "ignored playback event"),
        }
    }

    /// Open the output, allocate the scratch period and queue silence
    pub fn bring_up(&mut self, request: &StreamRequest) -> Result<StreamFormat> {
        let format = self.output.configure(request)?;
        if format.period_frames == 0 || format.channels == 0 {
            return Err(Opl3Error::AudioDeviceError(format!(
                "device granted an empty period ({} frames x {} channels)",
                format.period_frames, format.channels
            )));
        }

        self.scratch = vec![0; format.period_samples()];
        self.format = Some(format.clone());

        self.output.prepare()?;
        self.write_silence()?;
        self.advance(PlaybackEvent::Primed);
        Ok(format)
    }

    /// Start playback of the primed stream
    pub fn start(&mut self) -> Result<()> {
        self.output.start()?;
        self.advance(PlaybackEvent::Started);
        Ok(())
    }

    /// Release the output after a failed bring-up
    pub fn abort_bring_up(&mut self) {
        self.output.set_ready_callback(None);
        if let Err(err) = self.output.close() {
            debug!("closing output after failed bring-up: {err}");
        }
        self.scratch = Vec::new();
        self.format = None;
        self.state = PlaybackState::Uninitialized;
    }

    /// Unregister the callback, drain and close the output
    pub fn teardown(&mut self) {
        self.output.set_ready_callback(None);
        if let Err(err) = self.output.close() {
            warn!("closing audio output failed: {err}");
        }
        self.scratch = Vec::new();
        self.format = None;
        self.advance(PlaybackEvent::TornDown);
    }

    /// Fill every free period of the output
    pub fn on_ready(&mut self) {
        match self.state {
            PlaybackState::Running => {}
            PlaybackState::UnderflowRecovering => {
                if self.recover_underflow().is_err() {
                    return;
                }
            }
            PlaybackState::Uninitialized | PlaybackState::Primed => return,
        }

        let period_frames = self.format.as_ref().map_or(0, |f| f.period_frames);
        if period_frames == 0 {
            return;
        }

        while self.output.available_frames() >= period_frames {
            self.chip
                .lock()
                .generate_period(&mut self.scratch, period_frames);

            match self.output.write_frames(&self.scratch) {
                Ok(WriteStatus::Written) => {
                    self.stats.periods_rendered += 1;
                    self.stats.frames_written += period_frames as u64;
                }
                Ok(WriteStatus::Underflow) => {
                    warn!("audio buffer underflow");
                    self.stats.underflows += 1;
                    self.advance(PlaybackEvent::Underflow);
                    if self.recover_underflow().is_err() {
                        return;
                    }
                }
                Err(err) => {
                    warn!("audio write failed: {err}");
                    self.stats.write_errors += 1;
                    return;
                }
            }
        }
    }

    fn recover_underflow(&mut self) -> Result<()> {
        let result = self
            .output
            .prepare()
            .and_then(|()| self.write_silence());

        match result {
            Ok(()) => {
                self.advance(PlaybackEvent::Recovered);
                Ok(())
            }
            Err(err) => {
                warn!("underflow recovery failed, retrying on next callback: {err}");
                self.stats.write_errors += 1;
                Err(err)
            }
        }
    }

    /// Queue exactly [`PRIME_PERIODS`] silent periods
    ///
    /// The stream must already be prepared. An underflow reported part way
    /// through prepares it again and starts over.
    fn write_silence(&mut self) -> Result<()> {
        self.scratch.fill(0);

        for attempt in 0..PRIME_ATTEMPTS {
            if attempt > 0 {
                self.output.prepare()?;
            }
            match self.write_silent_periods()? {
                WriteStatus::Written => return Ok(()),
                WriteStatus::Underflow => debug!(attempt, "underflow while priming, preparing again"),
            }
        }

        Err(Opl3Error::AudioDeviceError(format!(
            "stream underflowed {PRIME_ATTEMPTS} times while priming"
        )))
    }

    fn write_silent_periods(&mut self) -> Result<WriteStatus> {
        let frames = self.format.as_ref().map_or(0, |f| f.period_frames) as u64;
        for _ in 0..PRIME_PERIODS {
            if self.output.write_frames(&self.scratch)? == WriteStatus::Underflow {
                return Ok(WriteStatus::Underflow);
            }
            self.stats.frames_written += frames;
        }
        Ok(WriteStatus::Written)
    }
}
