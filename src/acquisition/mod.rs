//! The acquisition loop.
//!
//! One [`AcquisitionLoop`] owns one [`FrameSource`] and one [`RingBuffer`]
//! and runs on its own OS thread. Each iteration it:
//!
//! 1. polls the [`KillSignal`] with a short bounded wait,
//! 2. drains and applies pending control updates as one batch,
//! 3. acts according to the current [`Mode`]:
//!    - **Live**: read a frame, rotate it, store it in the ring buffer,
//!      pace at `framerate`, forward it if the output queue admits it;
//!    - **Paused**: forward the most recent buffered frame, paced at
//!      `framerate`, without reading the source;
//!    - **Replay**: forward buffered frames in order from the configured
//!      offset, paced at `replay_fps`,
//! 4. updates the framerate meter.
//!
//! `paused` takes priority over `replay`; replay is active only with a
//! positive `replay_fps`.
//!
//! ## Admission
//!
//! A frame is forwarded only while fewer than `n_consumers + 2` frames are
//! waiting on the output queue. Otherwise it is dropped, a warning is logged
//! and `W:Dropped frame` is sent on the diagnostics channel. The loop never
//! blocks on its consumers; the ring buffer still receives every live frame.
//!
//! ## Shutdown
//!
//! The loop stops when the kill signal is set, when a non-looping file ends,
//! or when a non-looping replay has delivered the whole history. The source
//! is released on every exit path, including drop.

pub mod control;
pub mod framerate;
pub mod kill;
pub mod pacer;
pub mod queue;

pub use control::{control_channel, ControlReceiver, ControlSender, ControlState};
pub use framerate::FramerateMeter;
pub use kill::KillSignal;
pub use pacer::Pacer;
pub use queue::{FrameQueue, FrameReceiver, FrameSender, OutputQueue};

use crate::core::Frame;
use crate::data::RingBuffer;
use crate::error::{AcquisitionError, QueueError};
use crate::messages::{
    diagnostic_channel, ControlUpdate, Diagnostic, DiagnosticReceiver, DiagnosticSender,
    DEFAULT_DIAGNOSTIC_CAPACITY,
};
use crate::source::{FrameSource, ReadOutcome};
use serde::Serialize;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// What the loop forwards each iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Mode {
    /// Read, buffer and forward new frames
    Live,
    /// Repeat the most recent buffered frame
    Paused,
    /// Play back the buffered history
    Replay,
}

impl Mode {
    /// Mode implied by the control state; `paused` wins over `replay`.
    pub fn from_state(state: &ControlState) -> Self {
        if state.paused {
            Mode::Paused
        } else if state.replay_active() {
            Mode::Replay
        } else {
            Mode::Live
        }
    }
}

/// Why the loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// Kill signal set
    Killed,
    /// Non-looping file source ran out of frames
    EndOfStream,
    /// Non-looping replay delivered the whole history
    ReplayComplete,
}

/// Result of one [`AcquisitionLoop::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Keep iterating
    Continue,
    /// The loop is done
    Stopped(StopReason),
}

/// Counters reported when the loop exits.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AcquisitionSummary {
    /// Frames read from the source
    pub frames_produced: u64,
    /// Frames accepted by the output queue
    pub frames_forwarded: u64,
    /// Frames refused by the admission policy
    pub frames_dropped: u64,
    /// Reads that returned no frame
    pub transient_failures: u64,
    /// Control values refused by validation or by the source
    pub rejected_controls: u64,
    /// Set once the loop has stopped
    pub stop_reason: Option<StopReason>,
}

/// Static loop configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct LoopSettings {
    /// Live pacing target; defaults to the source's nominal rate, then 150 Hz
    pub framerate: Option<f64>,
    /// Counter-clockwise quarter turns applied to live frames
    pub rotation: u8,
    /// Number of consumers sharing the output queue
    pub n_consumers: usize,
    /// Initial ring buffer capacity
    pub ring_buffer_length: usize,
    /// Start in replay mode
    pub replay: bool,
    /// Replay pacing target
    pub replay_fps: f64,
    /// Initial replay offset
    pub offset: usize,
    /// Replay restarts at the oldest frame instead of stopping
    pub loop_playback: bool,
    /// Wait when polling for control updates
    pub control_poll_timeout: Duration,
    /// Wait when polling the kill signal
    pub kill_poll_timeout: Duration,
    /// Emissions averaged by the framerate meter
    pub framerate_window: usize,
}

/// Default wait when polling the kill signal.
pub const DEFAULT_KILL_POLL_TIMEOUT: Duration = Duration::from_micros(100);

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            framerate: None,
            rotation: 0,
            n_consumers: 1,
            ring_buffer_length: control::DEFAULT_RING_BUFFER_LENGTH,
            replay: false,
            replay_fps: control::DEFAULT_REPLAY_FPS,
            offset: 0,
            loop_playback: true,
            control_poll_timeout: control::DEFAULT_CONTROL_POLL_TIMEOUT,
            kill_poll_timeout: DEFAULT_KILL_POLL_TIMEOUT,
            framerate_window: framerate::DEFAULT_FRAMERATE_WINDOW,
        }
    }
}

/// Loop-side ends of every channel.
pub struct LoopIo {
    output: Box<dyn OutputQueue>,
    control: ControlReceiver,
    kill: KillSignal,
    diagnostics: DiagnosticSender,
    framerate: watch::Sender<f64>,
}

/// Operator-side ends of every channel.
#[derive(Debug)]
pub struct ControlSurface {
    /// Parameter updates
    pub control: ControlSender,
    /// Cancellation
    pub kill: KillSignal,
    /// `I:`/`W:`/`E:` status messages
    pub diagnostics: DiagnosticReceiver,
    /// Achieved emission rate (Hz)
    pub framerate: watch::Receiver<f64>,
}

impl LoopIo {
    /// Wire a loop to `output` and create the matching operator surface.
    pub fn new(output: Box<dyn OutputQueue>) -> (LoopIo, ControlSurface) {
        let (control_tx, control_rx) = control_channel();
        let (diag_tx, diag_rx) = diagnostic_channel(DEFAULT_DIAGNOSTIC_CAPACITY);
        let (rate_tx, rate_rx) = watch::channel(0.0);
        let kill = KillSignal::new();
        (
            LoopIo {
                output,
                control: control_rx,
                kill: kill.clone(),
                diagnostics: diag_tx,
                framerate: rate_tx,
            },
            ControlSurface {
                control: control_tx,
                kill,
                diagnostics: diag_rx,
                framerate: rate_rx,
            },
        )
    }
}

/// The acquisition state machine.
pub struct AcquisitionLoop {
    source: Box<dyn FrameSource>,
    settings: LoopSettings,
    ring: RingBuffer,
    state: ControlState,
    mode: Mode,
    pacer: Pacer,
    meter: FramerateMeter,
    output: Box<dyn OutputQueue>,
    control: ControlReceiver,
    kill: KillSignal,
    diagnostics: DiagnosticSender,
    next_index: u64,
    summary: AcquisitionSummary,
    consumers_gone: bool,
    released: bool,
}

impl AcquisitionLoop {
    /// Open `source` and build a loop around it.
    ///
    /// Fails with [`AcquisitionError::SourceOpen`] if the source cannot be
    /// opened; the source is released in that case too.
    pub fn open(
        mut source: Box<dyn FrameSource>,
        settings: LoopSettings,
        io: LoopIo,
    ) -> Result<Self, AcquisitionError> {
        let status = match source.open() {
            Ok(status) => status,
            Err(err) => {
                source.release();
                return Err(AcquisitionError::SourceOpen(err));
            }
        };
        io.diagnostics.emit(Diagnostic::info(status));

        let framerate = settings
            .framerate
            .or_else(|| source.nominal_framerate())
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(control::DEFAULT_FRAMERATE);
        let state = ControlState {
            framerate,
            replay: settings.replay,
            replay_fps: settings.replay_fps,
            paused: false,
            offset: settings.offset,
            ring_buffer_length: settings.ring_buffer_length,
        };
        let mode = Mode::from_state(&state);

        let mut acq = Self {
            ring: RingBuffer::new(settings.ring_buffer_length),
            pacer: Pacer::default(),
            meter: FramerateMeter::with_sender(settings.framerate_window, io.framerate),
            output: io.output,
            control: io.control,
            kill: io.kill,
            diagnostics: io.diagnostics,
            source,
            settings,
            state,
            mode,
            next_index: 0,
            summary: AcquisitionSummary::default(),
            consumers_gone: false,
            released: false,
        };
        acq.pacer.set_rate(acq.pacing_rate());
        info!(
            "Acquisition started from {} in {:?} mode at {:.1} Hz",
            acq.source.describe(),
            acq.mode,
            acq.pacing_rate()
        );
        Ok(acq)
    }

    /// Open the source on a dedicated thread and run the loop there.
    ///
    /// Returns once the source has been opened, so open failures surface
    /// here and acquisition never starts.
    pub fn spawn(
        source: Box<dyn FrameSource>,
        settings: LoopSettings,
        io: LoopIo,
    ) -> Result<AcquisitionHandle, AcquisitionError> {
        let (init_tx, init_rx) = std::sync::mpsc::sync_channel(1);
        let kill = io.kill.clone();

        let join = std::thread::Builder::new()
            .name("acquisition".to_string())
            .spawn(move || match AcquisitionLoop::open(source, settings, io) {
                Ok(acq) => {
                    let _ = init_tx.send(Ok(()));
                    acq.run()
                }
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    AcquisitionSummary::default()
                }
            })
            .map_err(AcquisitionError::ThreadSpawn)?;

        match init_rx.recv() {
            Ok(Ok(())) => Ok(AcquisitionHandle {
                kill,
                join: Some(join),
            }),
            Ok(Err(err)) => {
                let _ = join.join();
                Err(err)
            }
            Err(_) => match join.join() {
                Err(_) => Err(AcquisitionError::WorkerPanicked),
                Ok(_) => Err(AcquisitionError::WorkerLost),
            },
        }
    }

    /// Iterate until stopped, then release the source.
    pub fn run(mut self) -> AcquisitionSummary {
        loop {
            if let StepOutcome::Stopped(reason) = self.step() {
                self.summary.stop_reason = Some(reason);
                break;
            }
        }
        self.release();
        info!(
            "Acquisition stopped ({:?}): {} produced, {} forwarded, {} dropped",
            self.summary.stop_reason,
            self.summary.frames_produced,
            self.summary.frames_forwarded,
            self.summary.frames_dropped
        );
        self.summary.clone()
    }

    /// Execute exactly one iteration.
    pub fn step(&mut self) -> StepOutcome {
        if self.kill.wait_timeout(self.settings.kill_poll_timeout) {
            debug!("Kill signal received");
            return StepOutcome::Stopped(StopReason::Killed);
        }

        if let Some(update) = self.control.drain(self.settings.control_poll_timeout) {
            self.apply_controls(&update);
        }

        match self.mode {
            Mode::Live => self.step_live(),
            Mode::Paused => {
                self.step_paused();
                StepOutcome::Continue
            }
            Mode::Replay => self.step_replay(),
        }
    }

    fn step_live(&mut self) -> StepOutcome {
        let image = match self.source.read() {
            Ok(ReadOutcome::Frame(image)) => image,
            Ok(ReadOutcome::Missed) => {
                self.summary.transient_failures += 1;
                warn!("No frame from {}", self.source.describe());
                return StepOutcome::Continue;
            }
            Ok(ReadOutcome::EndOfStream) => return StepOutcome::Stopped(StopReason::EndOfStream),
            Err(err) => {
                self.summary.transient_failures += 1;
                warn!("Frame read failed: {}", err);
                return StepOutcome::Continue;
            }
        };

        let image = if self.settings.rotation % 4 != 0 {
            image.rotated(self.settings.rotation)
        } else {
            image
        };
        let frame = Frame::new(self.next_index, image);
        self.next_index += 1;
        self.summary.frames_produced += 1;
        self.ring.put(frame.clone());

        self.pacer.wait();
        self.forward(frame);
        self.emitted();
        StepOutcome::Continue
    }

    fn step_paused(&mut self) {
        self.pacer.wait();
        match self.ring.most_recent() {
            Ok(frame) => {
                self.forward(frame);
                self.emitted();
            }
            Err(err) => {
                trace!("Paused with {}", err);
                self.pacer.mark(Instant::now());
            }
        }
    }

    fn step_replay(&mut self) -> StepOutcome {
        if !self.settings.loop_playback && self.ring.history_exhausted() {
            return StepOutcome::Stopped(StopReason::ReplayComplete);
        }
        self.pacer.wait();
        match self.ring.get() {
            Ok(frame) => {
                self.forward(frame);
                self.emitted();
            }
            Err(err) => {
                trace!("Replay with {}", err);
                self.pacer.mark(Instant::now());
            }
        }
        StepOutcome::Continue
    }

    fn emitted(&mut self) {
        let now = Instant::now();
        self.pacer.mark(now);
        self.meter.tick(now);
    }

    /// Hand `frame` to the output queue if the admission policy allows it.
    fn forward(&mut self, frame: Frame) {
        let threshold = self.settings.n_consumers + 2;
        if self.output.pending() >= threshold {
            self.drop_frame(&frame);
            return;
        }
        let seq = frame.sequence_index;
        match self.output.try_enqueue(frame) {
            Ok(()) => self.summary.frames_forwarded += 1,
            Err(QueueError::Full) => {
                self.summary.frames_dropped += 1;
                warn!("Dropped frame {} (queue full)", seq);
                self.diagnostics.emit(Diagnostic::warning("Dropped frame"));
            }
            Err(QueueError::Disconnected) => {
                if !self.consumers_gone {
                    warn!("Output queue has no consumers; frames are discarded");
                    self.diagnostics.emit(Diagnostic::error("Output queue disconnected"));
                    self.consumers_gone = true;
                }
            }
        }
    }

    fn drop_frame(&mut self, frame: &Frame) {
        self.summary.frames_dropped += 1;
        warn!("Dropped frame {}", frame.sequence_index);
        self.diagnostics.emit(Diagnostic::warning("Dropped frame"));
    }

    fn apply_controls(&mut self, update: &ControlUpdate) {
        let previous_mode = self.mode;
        let applied = self.state.apply(update);

        for err in &applied.rejected {
            self.summary.rejected_controls += 1;
            warn!("Ignoring control value: {}", err);
        }
        if let Some(len) = applied.ring_buffer_length_changed {
            info!("Ring buffer resized to {} frames; history discarded", len);
            self.ring.resize(len);
        }
        for (name, value) in &applied.forwarded {
            if let Err(err) = self.source.set(name, value) {
                self.summary.rejected_controls += 1;
                warn!("{} rejected {} = {}: {}", self.source.describe(), name, value, err);
            }
        }
        if let Some(offset) = applied.offset_changed {
            debug!("Offset set to {}", offset);
            self.ring.seek(offset);
            if let Err(err) = self.source.seek(offset) {
                warn!("Seek to {} failed: {}", offset, err);
            }
        }

        let mode = Mode::from_state(&self.state);
        if mode != previous_mode {
            info!("Acquisition mode {:?} -> {:?}", previous_mode, mode);
            self.mode = mode;
            if mode == Mode::Replay {
                self.ring.seek(self.state.offset);
            }
            self.pacer.reset();
            self.meter.reset();
        }
        if mode != previous_mode || applied.framerate_changed || applied.replay_fps_changed {
            self.pacer.set_rate(self.pacing_rate());
        }
    }

    fn pacing_rate(&self) -> f64 {
        match self.mode {
            Mode::Replay => self.state.replay_fps,
            Mode::Live | Mode::Paused => self.state.framerate,
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.source.release();
            self.released = true;
        }
    }

    /// Current mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Current control state.
    pub fn control_state(&self) -> &ControlState {
        &self.state
    }

    /// The loop's frame history.
    pub fn ring_buffer(&self) -> &RingBuffer {
        &self.ring
    }

    /// Counters so far.
    pub fn summary(&self) -> &AcquisitionSummary {
        &self.summary
    }

    /// Active pacing interval.
    pub fn pacing_interval(&self) -> Option<Duration> {
        self.pacer.interval()
    }
}

impl Drop for AcquisitionLoop {
    fn drop(&mut self) {
        self.release();
    }
}

/// Owner-side handle of a spawned loop.
///
/// Dropping the handle sets the kill signal and waits for the thread.
pub struct AcquisitionHandle {
    kill: KillSignal,
    join: Option<JoinHandle<AcquisitionSummary>>,
}

impl AcquisitionHandle {
    /// The loop's kill signal.
    pub fn kill_signal(&self) -> &KillSignal {
        &self.kill
    }

    /// True once the loop thread has exited.
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Set the kill signal and wait for the loop to exit.
    pub fn stop(mut self) -> Result<AcquisitionSummary, AcquisitionError> {
        self.kill.set();
        self.wait()
    }

    /// Wait for the loop to stop by itself.
    pub fn join(mut self) -> Result<AcquisitionSummary, AcquisitionError> {
        self.wait()
    }

    fn wait(&mut self) -> Result<AcquisitionSummary, AcquisitionError> {
        match self.join.take() {
            Some(join) => join.join().map_err(|_| AcquisitionError::WorkerPanicked),
            None => Err(AcquisitionError::WorkerLost),
        }
    }
}

impl Drop for AcquisitionHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            self.kill.set();
            let _ = join.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ImageData, PixelBuffer};
    use crate::source::{
        CameraOptions, CameraSource, FilePlayback, InMemoryVideo, SimulatedCamera, VideoFileSource,
    };
    use tracing_test::traced_test;

    fn camera() -> Box<dyn FrameSource> {
        let driver = SimulatedCamera::new(CameraOptions::default()).with_sensor(4, 3);
        Box::new(CameraSource::new(Box::new(driver)))
    }

    fn fast_settings() -> LoopSettings {
        LoopSettings {
            framerate: Some(1000.0),
            control_poll_timeout: Duration::ZERO,
            kill_poll_timeout: Duration::ZERO,
            ..LoopSettings::default()
        }
    }

    fn start(
        source: Box<dyn FrameSource>,
        settings: LoopSettings,
        capacity: usize,
    ) -> (AcquisitionLoop, ControlSurface, FrameReceiver) {
        let (tx, rx) = FrameQueue::bounded(capacity);
        let (io, surface) = LoopIo::new(Box::new(tx));
        let acq = AcquisitionLoop::open(source, settings, io).unwrap();
        (acq, surface, rx)
    }

    #[test]
    fn test_open_status_is_reported() {
        let (_acq, mut surface, _rx) = start(camera(), fast_settings(), 8);
        let first = surface.diagnostics.try_recv().unwrap();
        assert!(first.to_string().starts_with("I:Simulated camera opened"));
    }

    #[test]
    fn test_open_failure_surfaces() {
        let (tx, _rx) = FrameQueue::bounded(4);
        let (io, _surface) = LoopIo::new(Box::new(tx));
        let source = Box::new(CameraSource::new(Box::new(SimulatedCamera::unavailable())));
        let err = AcquisitionLoop::open(source, fast_settings(), io).err().unwrap();
        assert!(matches!(err, AcquisitionError::SourceOpen(_)));
    }

    #[test]
    #[traced_test]
    fn test_drop_policy_keeps_ring_buffer_complete() {
        let settings = LoopSettings {
            n_consumers: 1,
            ..fast_settings()
        };
        let (mut acq, mut surface, rx) = start(camera(), settings, 16);
        for _ in 0..5 {
            assert_eq!(acq.step(), StepOutcome::Continue);
        }
        // Threshold is n_consumers + 2 = 3 pending frames.
        assert_eq!(rx.len(), 3);
        assert_eq!(acq.summary().frames_dropped, 2);
        assert_eq!(acq.ring_buffer().len(), 5);
        assert_eq!(acq.ring_buffer().most_recent().unwrap().sequence_index, 4);
        assert!(logs_contain("Dropped frame"));

        let texts: Vec<String> = std::iter::from_fn(|| surface.diagnostics.try_recv().ok())
            .map(|d| d.to_string())
            .collect();
        assert_eq!(texts.iter().filter(|t| *t == "W:Dropped frame").count(), 2);
    }

    #[test]
    fn test_paused_wins_over_replay() {
        let (mut acq, surface, mut rx) = start(camera(), fast_settings(), 64);
        for _ in 0..3 {
            acq.step();
        }
        rx.drain();
        surface
            .control
            .send(
                ControlUpdate::new()
                    .with("paused", true)
                    .with("replay", true)
                    .with("replay_fps", 100.0),
            )
            .unwrap();
        acq.step();
        assert_eq!(acq.mode(), Mode::Paused);
        assert_eq!(rx.try_dequeue().unwrap().sequence_index, 2);

        surface.control.set("paused", false).unwrap();
        acq.step();
        assert_eq!(acq.mode(), Mode::Replay);
        assert_eq!(acq.pacing_interval(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_replay_without_rate_stays_live() {
        let (mut acq, surface, _rx) = start(camera(), fast_settings(), 64);
        surface
            .control
            .send(ControlUpdate::new().with("replay", true).with("replay_fps", 0))
            .unwrap();
        acq.step();
        assert_eq!(acq.mode(), Mode::Live);
        assert_eq!(acq.summary().frames_produced, 1);
    }

    #[test]
    fn test_rejected_control_keeps_running() {
        let (mut acq, surface, _rx) = start(camera(), fast_settings(), 64);
        surface.control.set("framerate", 5000.0).unwrap();
        surface.control.set("exposure", 99.0).unwrap();
        assert_eq!(acq.step(), StepOutcome::Continue);
        assert_eq!(acq.control_state().framerate, 1000.0);
        assert_eq!(acq.summary().rejected_controls, 2);
    }

    #[test]
    fn test_ring_buffer_length_change_discards_history() {
        let (mut acq, surface, _rx) = start(camera(), fast_settings(), 64);
        for _ in 0..4 {
            acq.step();
        }
        surface.control.set("ring_buffer_length", 2).unwrap();
        acq.step();
        assert_eq!(acq.ring_buffer().capacity(), 2);
        assert_eq!(acq.ring_buffer().len(), 1);
        assert_eq!(acq.ring_buffer().most_recent().unwrap().sequence_index, 4);
    }

    #[test]
    fn test_rotation_applies_to_live_frames() {
        let settings = LoopSettings {
            rotation: 1,
            ..fast_settings()
        };
        let (mut acq, _surface, mut rx) = start(camera(), settings, 8);
        acq.step();
        let frame = rx.try_dequeue().unwrap();
        assert_eq!((frame.data.width(), frame.data.height()), (3, 4));
    }

    #[test]
    fn test_kill_stops_and_releases() {
        let (acq, surface, _rx) = start(camera(), fast_settings(), 8);
        surface.kill.set();
        let summary = acq.run();
        assert_eq!(summary.stop_reason, Some(StopReason::Killed));
        assert_eq!(summary.frames_produced, 0);
    }

    #[test]
    fn test_file_end_of_stream_stops_loop() {
        let frames = (0..3u8)
            .map(|i| ImageData::new(1, 1, PixelBuffer::U8(vec![i])).unwrap())
            .collect();
        let playback = FilePlayback {
            loop_playback: false,
            offset: 0,
        };
        let source = Box::new(VideoFileSource::new(
            Box::new(InMemoryVideo::new(frames, None)),
            playback,
        ));
        let (acq, _surface, mut rx) = start(source, fast_settings(), 8);
        let summary = acq.run();
        assert_eq!(summary.stop_reason, Some(StopReason::EndOfStream));
        let values: Vec<f64> = rx
            .drain()
            .iter()
            .filter_map(|f| f.data.sample(0, 0, 0))
            .collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_disconnected_consumer_is_not_fatal() {
        let (mut acq, mut surface, rx) = start(camera(), fast_settings(), 8);
        drop(rx);
        for _ in 0..3 {
            assert_eq!(acq.step(), StepOutcome::Continue);
        }
        assert_eq!(acq.summary().frames_produced, 3);
        assert_eq!(acq.summary().frames_forwarded, 0);

        let texts: Vec<String> = std::iter::from_fn(|| surface.diagnostics.try_recv().ok())
            .map(|d| d.to_string())
            .filter(|t| !t.starts_with("I:"))
            .collect();
        assert_eq!(texts, vec!["E:Output queue disconnected".to_string()]);
    }
}
