//! Timed playback: a fixed-period ticker requests decodes from the worker and
//! completed frames are painted (and optionally recorded) on the controlling thread.
//!
//! Everything except the decode itself runs sequentially inside
//! [`PlaybackController::run_until`], which multiplexes three channels:
//!
//! - the ticker (armed while playing),
//! - decode responses from the current [`DecodeWorker`],
//! - [`PlayerCommand`]s from the embedding application.

use std::{
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, select};

use crate::{
    foundation::core::Fps,
    foundation::error::{ReelError, ReelResult},
    raster::input::NativeRasterInput,
    record::{RecordingConfig, RecordingSink, RecordingState},
    render::{PixelSurface, Surface, paint},
    worker::{DecodeFn, DecodeRequest, DecodeResponse, DecodeWorker, native_raster_decoder},
};

/// Upper bound on how long the run loop sleeps without re-checking deadlines.
const IDLE_POLL: Duration = Duration::from_secs(1);

/// Ticks that find this many decodes outstanding drop their frame instead of queueing it.
pub const MAX_IN_FLIGHT: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// Fixed tick period.
    pub interval: Duration,
    /// A worker that has not answered its oldest request within this time is replaced.
    pub decode_timeout: Duration,
    /// Stop the run loop after this many painted frames.
    pub max_frames: Option<u64>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(crate::config::DEFAULT_DELAY_MS),
            decode_timeout: Duration::from_secs(10),
            max_frames: None,
        }
    }
}

impl PlaybackConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn validate(&self) -> ReelResult<()> {
        if self.interval.is_zero() {
            return Err(ReelError::validation("playback interval must be non-zero"));
        }
        if self.decode_timeout.is_zero() {
            return Err(ReelError::validation("decode timeout must be non-zero"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerCommand {
    Play,
    Pause,
    TogglePlay,
    StartRecording,
    StopRecording,
    ToggleRecording,
    Shutdown,
}

/// Why [`PlaybackController::run_until`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunExit {
    Shutdown,
    /// Every command sender was dropped.
    Disconnected,
    Deadline,
    FrameLimit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackState {
    pub frame_index: usize,
    pub is_playing: bool,
    pub interval: Duration,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub requests_issued: u64,
    /// Ticks whose frame was dropped because the worker was behind.
    pub requests_skipped: u64,
    pub frames_painted: u64,
    pub frames_failed: u64,
    pub recording_steps: u64,
    pub recording_step_failures: u64,
    pub workers_replaced: u64,
}

#[derive(Clone, Copy, Debug)]
struct InFlight {
    seq: u64,
    frame_index: usize,
    /// Start of the timeout window: submission, or reaching the head of the queue.
    sent_at: Instant,
}

/// Owns one playback session: frame list, play state, worker, surface and recording.
///
/// A frame that fails to decode is skipped: it is logged and counted, nothing is painted,
/// and playback continues with the next tick.
pub struct PlaybackController<S: Surface = PixelSurface> {
    frames: Vec<Arc<NativeRasterInput>>,
    state: PlaybackState,
    cfg: PlaybackConfig,
    ticker: Option<Receiver<Instant>>,
    decode: DecodeFn,
    worker: DecodeWorker,
    in_flight: VecDeque<InFlight>,
    next_seq: u64,
    surface: S,
    sink: Option<Box<dyn RecordingSink>>,
    recording: RecordingState,
    last_recording_error: Option<ReelError>,
    stats: PlaybackStats,
}

impl PlaybackController<PixelSurface> {
    pub fn new(frames: Vec<NativeRasterInput>, cfg: PlaybackConfig) -> ReelResult<Self> {
        Self::with_surface(frames, cfg, PixelSurface::new(), native_raster_decoder())
    }
}

impl<S: Surface> PlaybackController<S> {
    pub fn with_surface(
        frames: Vec<NativeRasterInput>,
        cfg: PlaybackConfig,
        surface: S,
        decode: DecodeFn,
    ) -> ReelResult<Self> {
        cfg.validate()?;
        let worker = DecodeWorker::spawn(decode.clone())?;
        Ok(Self {
            frames: frames.into_iter().map(Arc::new).collect(),
            state: PlaybackState {
                frame_index: 0,
                is_playing: false,
                interval: cfg.interval,
            },
            cfg,
            ticker: None,
            decode,
            worker,
            in_flight: VecDeque::new(),
            next_seq: 0,
            surface,
            sink: None,
            recording: RecordingState::Idle,
            last_recording_error: None,
            stats: PlaybackStats::default(),
        })
    }

    pub fn with_recording_sink(mut self, sink: Box<dyn RecordingSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Index of the frame the next tick will request.
    pub fn frame_index(&self) -> usize {
        self.state.frame_index
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_recording()
    }

    pub fn stats(&self) -> PlaybackStats {
        self.stats
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn take_last_recording_error(&mut self) -> Option<ReelError> {
        self.last_recording_error.take()
    }

    /// Stopped -> Playing. Arms the ticker and issues the first request immediately.
    pub fn start(&mut self) -> ReelResult<()> {
        if self.frames.is_empty() {
            return Err(ReelError::EmptyPlaylist);
        }
        if self.state.is_playing {
            return Ok(());
        }

        self.state.is_playing = true;
        self.ticker = Some(crossbeam_channel::tick(self.state.interval));
        tracing::info!(
            frames = self.frames.len(),
            interval_ms = self.state.interval.as_millis() as u64,
            "playback started"
        );
        self.request_current()
    }

    /// Playing -> Stopped. In-flight decodes still complete and are painted.
    pub fn stop(&mut self) {
        if !self.state.is_playing {
            return;
        }
        self.state.is_playing = false;
        self.ticker = None;
        tracing::info!(next_frame = self.state.frame_index, "playback stopped");
    }

    pub fn toggle(&mut self) -> ReelResult<()> {
        if self.state.is_playing {
            self.stop();
            Ok(())
        } else {
            self.start()
        }
    }

    /// One timer firing: request the current frame and advance (wrapping).
    pub fn tick(&mut self) -> ReelResult<()> {
        if !self.state.is_playing {
            return Ok(());
        }
        self.request_current()
    }

    fn request_current(&mut self) -> ReelResult<()> {
        let count = self.frames.len();
        let frame_index = self.state.frame_index;

        // The index still advances so playback keeps its wall-clock position.
        if self.in_flight.len() >= MAX_IN_FLIGHT {
            tracing::debug!(
                frame = frame_index,
                pending = self.in_flight.len(),
                "worker behind; frame dropped"
            );
            self.stats.requests_skipped += 1;
            self.state.frame_index = (frame_index + 1) % count;
            return Ok(());
        }
        let seq = self.next_seq;
        self.next_seq += 1;

        let req = DecodeRequest {
            seq,
            frame_index,
            input: Arc::clone(&self.frames[frame_index]),
        };

        let submitted = match self.worker.submit(req.clone()) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "decode worker unavailable; respawning");
                self.replace_worker()?;
                self.worker.submit(req)
            }
        };

        match submitted {
            Ok(()) => {
                self.in_flight.push_back(InFlight {
                    seq,
                    frame_index,
                    sent_at: Instant::now(),
                });
                self.stats.requests_issued += 1;
                tracing::debug!(seq, frame = frame_index, "decode requested");
            }
            Err(e) => {
                tracing::warn!(seq, frame = frame_index, error = %e, "decode request dropped");
                self.stats.frames_failed += 1;
            }
        }

        self.state.frame_index = (frame_index + 1) % count;
        Ok(())
    }

    /// Paint a completed decode (and capture it when recording).
    pub fn handle_response(&mut self, resp: DecodeResponse) {
        match self.in_flight.iter().position(|f| f.seq == resp.seq) {
            Some(pos) => {
                self.in_flight.remove(pos);
                // The next queued request starts executing now; its timeout runs from here.
                if pos == 0
                    && let Some(next) = self.in_flight.front_mut()
                {
                    next.sent_at = Instant::now();
                }
            }
            None => tracing::debug!(seq = resp.seq, "response for untracked request"),
        }

        let frame = match resp.result {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(
                    seq = resp.seq,
                    frame = resp.frame_index,
                    error = %e,
                    "frame decode failed; skipping"
                );
                self.stats.frames_failed += 1;
                return;
            }
        };

        if let Err(e) = paint(&frame, &mut self.surface) {
            tracing::warn!(frame = resp.frame_index, error = %e, "paint failed; skipping");
            self.stats.frames_failed += 1;
            return;
        }
        self.stats.frames_painted += 1;
        tracing::debug!(seq = resp.seq, frame = resp.frame_index, "frame painted");

        self.step_recording();
    }

    fn step_recording(&mut self) {
        let RecordingState::Recording(rec) = &mut self.recording else {
            return;
        };
        match rec.step(&self.surface) {
            Ok(()) => self.stats.recording_steps += 1,
            Err(e) => {
                let e = match e {
                    ReelError::RecordingStep(_) => e,
                    other => ReelError::recording_step(other.to_string()),
                };
                tracing::warn!(error = %e, "recording step failed; playback continues");
                self.stats.recording_step_failures += 1;
                self.last_recording_error = Some(e);
            }
        }
    }

    /// Idle -> Recording. The sink receives a frame rate of one frame per interval.
    pub fn start_recording(&mut self) -> ReelResult<()> {
        if self.recording.is_recording() {
            return Ok(());
        }
        let Some(sink) = self.sink.as_mut() else {
            return Err(ReelError::validation("no recording sink configured"));
        };

        let cfg = RecordingConfig {
            fps: Fps::from_interval(self.state.interval)?,
        };
        let rec = sink.start(&cfg)?;
        self.recording = RecordingState::Recording(rec);
        tracing::info!(fps = cfg.fps.as_f64(), "recording started");
        Ok(())
    }

    /// Recording -> Idle, finalizing the output.
    pub fn stop_recording(&mut self) -> ReelResult<()> {
        match std::mem::replace(&mut self.recording, RecordingState::Idle) {
            RecordingState::Idle => Ok(()),
            RecordingState::Recording(rec) => {
                tracing::info!("recording stopped");
                rec.stop()
            }
        }
    }

    pub fn apply(&mut self, cmd: PlayerCommand) -> ReelResult<()> {
        match cmd {
            PlayerCommand::Play => self.start()?,
            PlayerCommand::Pause => self.stop(),
            PlayerCommand::TogglePlay => self.toggle()?,
            PlayerCommand::StartRecording => self.report_recording(|c| c.start_recording()),
            PlayerCommand::StopRecording => self.report_recording(|c| c.stop_recording()),
            PlayerCommand::ToggleRecording => self.report_recording(|c| {
                if c.is_recording() {
                    c.stop_recording()
                } else {
                    c.start_recording()
                }
            }),
            PlayerCommand::Shutdown => self.stop(),
        }
        Ok(())
    }

    // Recording failures from commands never stop playback.
    fn report_recording(&mut self, f: impl FnOnce(&mut Self) -> ReelResult<()>) {
        if let Err(e) = f(self) {
            tracing::error!(error = %e, "recording command failed");
            self.last_recording_error = Some(e);
        }
    }

    /// Service ticks, responses and commands until shutdown, disconnect, `deadline`
    /// or the configured frame limit.
    pub fn run_until(
        &mut self,
        commands: &Receiver<PlayerCommand>,
        deadline: Option<Instant>,
    ) -> ReelResult<RunExit> {
        let idle = crossbeam_channel::never::<Instant>();

        loop {
            if self.frame_limit_reached() {
                return Ok(RunExit::FrameLimit);
            }

            while !self.frame_limit_reached()
                && let Ok(resp) = self.worker.responses().try_recv()
            {
                self.handle_response(resp);
            }
            if self.frame_limit_reached() {
                return Ok(RunExit::FrameLimit);
            }

            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                return Ok(RunExit::Deadline);
            }
            self.expire_stuck_request(now)?;

            let wait = self.next_wakeup(now, deadline);
            let ticker = self.ticker.clone().unwrap_or_else(|| idle.clone());
            let responses = self.worker.responses().clone();

            select! {
                recv(ticker) -> _ => self.tick()?,
                recv(responses) -> msg => match msg {
                    Ok(resp) => self.handle_response(resp),
                    Err(_) => {
                        tracing::warn!("decode worker disconnected; respawning");
                        self.fail_in_flight("decode worker disconnected");
                        self.replace_worker()?;
                    }
                },
                recv(commands) -> cmd => match cmd {
                    Ok(PlayerCommand::Shutdown) => {
                        self.stop();
                        return Ok(RunExit::Shutdown);
                    }
                    Ok(cmd) => self.apply(cmd)?,
                    Err(_) => return Ok(RunExit::Disconnected),
                },
                default(wait) => {}
            }
        }
    }

    pub fn run(&mut self, commands: &Receiver<PlayerCommand>) -> ReelResult<RunExit> {
        self.run_until(commands, None)
    }

    /// Stop playback and any recording; returns the session statistics.
    pub fn finish(mut self) -> ReelResult<PlaybackStats> {
        self.stop();
        self.stop_recording()?;
        if !self.in_flight.is_empty() {
            tracing::debug!(pending = self.in_flight.len(), "discarding in-flight decodes");
        }
        Ok(self.stats)
    }

    fn frame_limit_reached(&self) -> bool {
        self.cfg
            .max_frames
            .is_some_and(|limit| self.stats.frames_painted >= limit)
    }

    fn next_wakeup(&self, now: Instant, deadline: Option<Instant>) -> Duration {
        let mut wait = IDLE_POLL;
        if let Some(d) = deadline {
            wait = wait.min(d.saturating_duration_since(now));
        }
        if let Some(oldest) = self.in_flight.front() {
            let expires = oldest.sent_at + self.cfg.decode_timeout;
            wait = wait.min(expires.saturating_duration_since(now));
        }
        wait
    }

    // The oldest request is the one the worker is executing. If it is overdue, fail it,
    // swap in a fresh worker and resubmit whatever was queued behind it.
    fn expire_stuck_request(&mut self, now: Instant) -> ReelResult<()> {
        let Some(oldest) = self.in_flight.front().copied() else {
            return Ok(());
        };
        let waited = now.saturating_duration_since(oldest.sent_at);
        if waited < self.cfg.decode_timeout {
            return Ok(());
        }

        self.in_flight.pop_front();
        let err = ReelError::worker_timeout(oldest.seq, waited);
        tracing::warn!(frame = oldest.frame_index, error = %err, "abandoning stuck decode worker");
        self.stats.frames_failed += 1;

        self.replace_worker()?;

        let pending: Vec<InFlight> = self.in_flight.drain(..).collect();
        for p in pending {
            let req = DecodeRequest {
                seq: p.seq,
                frame_index: p.frame_index,
                input: Arc::clone(&self.frames[p.frame_index]),
            };
            match self.worker.submit(req) {
                Ok(()) => self.in_flight.push_back(InFlight { sent_at: now, ..p }),
                Err(e) => {
                    tracing::warn!(seq = p.seq, error = %e, "resubmit failed");
                    self.stats.frames_failed += 1;
                }
            }
        }
        Ok(())
    }

    fn fail_in_flight(&mut self, reason: &str) {
        for f in self.in_flight.drain(..) {
            tracing::warn!(seq = f.seq, frame = f.frame_index, reason, "decode lost");
            self.stats.frames_failed += 1;
        }
    }

    fn replace_worker(&mut self) -> ReelResult<()> {
        let fresh = DecodeWorker::spawn(self.decode.clone())?;
        let old = std::mem::replace(&mut self.worker, fresh);
        tracing::debug!(old = old.id(), new = self.worker.id(), "decode worker replaced");
        drop(old);
        self.stats.workers_replaced += 1;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/unit/playback/playback.rs"]
mod tests;
