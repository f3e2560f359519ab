use std::sync::{
    Arc, Condvar, Mutex, MutexGuard,
    atomic::{AtomicBool, AtomicU8, Ordering},
};
use std::time::{Duration, Instant};

use crate::{
    config::RenderConfig,
    encode::sink::{FrameSink, RenderArtifact, SinkConfig},
    foundation::core::Fps,
    foundation::error::TickdownResult,
    glyphs::font::resolve_face,
    layout::resolver::export_dimensions,
    render::compositor::FrameCompositor,
    session::clock::{SessionClock, TickPacer},
    session::media::MediaSource,
};

/// Per-second progress statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderProgress {
    /// Measured frames per second over the last reporting window.
    pub fps: u32,
    /// Export height in pixels.
    pub resolution_height: u32,
}

/// Progress callback: `(remaining_secs, stats)`, roughly once per second.
pub type ProgressFn = Box<dyn Fn(f64, RenderProgress) + Send>;

/// Completion callback: fired exactly once per session, even on abort or
/// watchdog force-stop (possibly with an empty artifact).
pub type CompleteFn = Box<dyn FnOnce(RenderArtifact) + Send>;

/// Session timing knobs. The defaults are the product constants; every one
/// is tunable because none of them is a correctness contract.
#[derive(Clone, Copy, Debug)]
pub struct SessionTuning {
    /// Capture cadence.
    pub fps: Fps,
    /// Frames rendered before the encoder starts, to stabilize startup.
    pub warmup_frames: u32,
    /// Extra capture time past `remaining == 0` so the terminal frame is
    /// flushed through a buffering encoder.
    pub overrun_buffer_secs: f64,
    /// Watchdog fires at `duration + margin`.
    pub watchdog_margin_secs: f64,
    /// How long the loop tolerates an encoder that has not entered
    /// recording before forcing another start.
    pub encoder_grace_secs: f64,
    /// Bounded wait for background media readiness.
    pub media_ready_timeout_secs: f64,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            fps: Fps { num: 30, den: 1 },
            warmup_frames: 5,
            overrun_buffer_secs: 2.0,
            watchdog_margin_secs: 5.0,
            encoder_grace_secs: 1.0,
            media_ready_timeout_secs: 3.0,
        }
    }
}

/// Render session lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Warmup,
    Capturing,
    Finalizing,
    Done,
    Aborted,
}

impl SessionPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Warmup,
            2 => Self::Capturing,
            3 => Self::Finalizing,
            4 => Self::Done,
            5 => Self::Aborted,
            _ => Self::Idle,
        }
    }
}

/// Drives render sessions: at most one active at a time.
///
/// `start` force-stops any live predecessor (its completion callback still
/// fires) before beginning warmup for the new session. `stop` is idempotent
/// and safe to call from outside the loop.
pub struct RenderScheduler {
    tuning: SessionTuning,
    active: Option<ActiveSession>,
}

struct ActiveSession {
    shared: Arc<SessionShared>,
    loop_handle: Option<std::thread::JoinHandle<()>>,
    watchdog_handle: Option<std::thread::JoinHandle<()>>,
}

struct SessionShared {
    stop: AtomicBool,
    completed: AtomicBool,
    phase: AtomicU8,
    sink: Mutex<Box<dyn FrameSink>>,
    complete: Mutex<Option<CompleteFn>>,
    done: Mutex<bool>,
    done_cv: Condvar,
}

impl SessionShared {
    fn set_phase(&self, phase: SessionPhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
    }

    fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Finish the encoder (when reachable) and fire the completion callback.
    /// Safe to race between the loop and the watchdog: only one caller wins.
    fn finalize(&self, aborted: bool) {
        if self.completed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.set_phase(SessionPhase::Finalizing);

        // The watchdog may land here while a starved loop still holds the
        // sink; deliver an empty artifact rather than blocking forever.
        let artifact = match self.sink.try_lock() {
            Ok(mut sink) => sink.finish().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "encoder finalization failed, delivering empty artifact");
                RenderArtifact::default()
            }),
            Err(std::sync::TryLockError::Poisoned(poisoned)) => {
                let mut sink = poisoned.into_inner();
                sink.finish().unwrap_or_default()
            }
            Err(std::sync::TryLockError::WouldBlock) => {
                tracing::warn!("encoder busy during forced finalization, delivering empty artifact");
                RenderArtifact::default()
            }
        };

        if let Some(cb) = lock_recover(&self.complete).take() {
            cb(artifact);
        }

        self.set_phase(if aborted {
            SessionPhase::Aborted
        } else {
            SessionPhase::Done
        });
    }

    fn mark_done(&self) {
        *lock_recover(&self.done) = true;
        self.done_cv.notify_all();
    }
}

fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new(SessionTuning::default())
    }
}

impl RenderScheduler {
    pub fn new(tuning: SessionTuning) -> Self {
        Self {
            tuning,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Phase of the current (or just-finished) session.
    pub fn phase(&self) -> SessionPhase {
        self.active
            .as_ref()
            .map(|a| SessionPhase::from_u8(a.shared.phase.load(Ordering::SeqCst)))
            .unwrap_or(SessionPhase::Idle)
    }

    /// Begin a render session.
    ///
    /// Any session still running is force-stopped first (and completes
    /// through its own callback). Media, sink, and callbacks are owned by
    /// the session until completion.
    #[tracing::instrument(skip_all, fields(duration = config.duration_secs, height = config.export_height))]
    pub fn start(
        &mut self,
        config: RenderConfig,
        bitrate_bps: u64,
        sink: Box<dyn FrameSink>,
        media: Option<Box<dyn MediaSource>>,
        on_progress: ProgressFn,
        on_complete: CompleteFn,
    ) -> TickdownResult<()> {
        config.validate()?;
        self.stop();

        let canvas = export_dimensions(&config);
        let face = resolve_face(&config.typography.font_family, &[]);
        let compositor = FrameCompositor::new(&config, canvas, face);

        let shared = Arc::new(SessionShared {
            stop: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            phase: AtomicU8::new(SessionPhase::Warmup as u8),
            sink: Mutex::new(sink),
            complete: Mutex::new(Some(on_complete)),
            done: Mutex::new(false),
            done_cv: Condvar::new(),
        });

        let sink_cfg = SinkConfig {
            width: canvas.width,
            height: canvas.height,
            fps: self.tuning.fps,
            bitrate_bps,
        };

        let tuning = self.tuning;
        let loop_shared = Arc::clone(&shared);
        let loop_config = config.clone();
        let loop_handle = std::thread::Builder::new()
            .name("tickdown-render".to_string())
            .spawn(move || {
                run_session_loop(
                    &loop_shared,
                    loop_config,
                    tuning,
                    sink_cfg,
                    compositor,
                    media,
                    on_progress,
                );
            })
            .map_err(|e| anyhow::anyhow!("failed to spawn render loop thread: {e}"))?;

        let watchdog_shared = Arc::clone(&shared);
        let deadline = Duration::from_secs_f64(
            (config.duration_secs + self.tuning.watchdog_margin_secs).max(0.0),
        );
        let watchdog_handle = std::thread::Builder::new()
            .name("tickdown-watchdog".to_string())
            .spawn(move || run_watchdog(&watchdog_shared, deadline))
            .map_err(|e| anyhow::anyhow!("failed to spawn watchdog thread: {e}"))?;

        self.active = Some(ActiveSession {
            shared,
            loop_handle: Some(loop_handle),
            watchdog_handle: Some(watchdog_handle),
        });
        Ok(())
    }

    /// Stop the active session, if any. Idempotent; blocks until the
    /// session's completion callback has fired.
    ///
    /// A loop wedged inside a blocking sink write cannot be joined; the
    /// watchdog delivers completion for it and the thread is detached.
    pub fn stop(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        active.shared.stop.store(true, Ordering::SeqCst);
        active.shared.done_cv.notify_all();

        {
            let done = lock_recover(&active.shared.done);
            // The watchdog guarantees this is signaled even for a starved
            // loop, so the wait terminates.
            let _guard = active
                .shared
                .done_cv
                .wait_while(done, |finished| !*finished)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }

        if let Some(handle) = active.watchdog_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = active.loop_handle.take() {
            // Give the loop a moment to unwind past mark_done, then detach
            // it if it is still stuck in the sink.
            for _ in 0..200 {
                if handle.is_finished() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                tracing::warn!("render loop thread is wedged in the sink, detaching it");
            }
        }
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_session_loop(
    shared: &SessionShared,
    config: RenderConfig,
    tuning: SessionTuning,
    sink_cfg: SinkConfig,
    mut compositor: FrameCompositor,
    mut media: Option<Box<dyn MediaSource>>,
    on_progress: ProgressFn,
) {
    let duration = config.duration_secs;

    // Bounded readiness wait; proceed regardless of the outcome.
    if let Some(m) = media.as_deref() {
        let deadline = Instant::now() + Duration::from_secs_f64(tuning.media_ready_timeout_secs);
        while !m.is_ready() && Instant::now() < deadline && !shared.is_stopping() {
            std::thread::sleep(Duration::from_millis(10));
        }
        if !m.is_ready() {
            tracing::warn!("media not ready in time, rendering without waiting further");
        }
    }
    if let Some(m) = media.as_mut() {
        let (rate, looped) = match (config.sync_media_to_timer, m.duration_secs()) {
            (true, Some(media_duration)) if media_duration > 0.0 => {
                (media_duration / duration, false)
            }
            _ => (1.0, true),
        };
        m.begin_playback(rate, looped);
    }

    let mut pacer = TickPacer::new(tuning.fps);

    // Warmup: render the initial duration value without feeding the
    // encoder, letting the pipeline settle before capture starts.
    shared.set_phase(SessionPhase::Warmup);
    for _ in 0..tuning.warmup_frames {
        if shared.is_stopping() {
            teardown(shared, media.as_deref_mut(), true);
            return;
        }
        pacer.wait_for_tick();
        let frame = match media.as_mut() {
            Some(m) => m.frame_at(0.0),
            None => None,
        };
        compositor.render_frame(duration, frame);
    }

    // startTime is captured only now: warmup never consumes countdown time.
    let clock = SessionClock::start(duration);
    if let Err(e) = lock_recover(&shared.sink).begin(&sink_cfg) {
        tracing::warn!(error = %e, "encoder did not start recording, will retry in-loop");
    }

    shared.set_phase(SessionPhase::Capturing);
    let mut frames_since_report = 0u32;
    let mut last_report = Instant::now();
    let mut aborted = false;
    let mut first_capture = true;

    loop {
        if shared.is_stopping() {
            aborted = true;
            break;
        }

        pacer.wait_for_tick();
        let elapsed = clock.elapsed_secs();
        // The first captured frame renders the exact initial value, so the
        // file opens on floor(duration) regardless of tick jitter.
        let remaining = if first_capture {
            first_capture = false;
            duration
        } else {
            clock.remaining_secs()
        };

        let frame = match media.as_mut() {
            Some(m) => m.frame_at(elapsed),
            None => None,
        };
        compositor.render_frame(remaining, frame);

        {
            let mut sink = lock_recover(&shared.sink);
            match sink.state() {
                crate::encode::sink::SinkState::Recording => {
                    if let Err(e) = sink.push_frame(compositor.surface()) {
                        tracing::warn!(error = %e, "frame push failed, output will be degraded");
                    }
                }
                crate::encode::sink::SinkState::Inactive => {
                    // Encoder never entered recording; retry within the
                    // grace period, then keep forcing.
                    if elapsed > tuning.encoder_grace_secs {
                        tracing::warn!("encoder still inactive after grace period, forcing start");
                        if let Err(e) = sink.begin(&sink_cfg) {
                            tracing::warn!(error = %e, "forced encoder start failed");
                        }
                    }
                }
                crate::encode::sink::SinkState::Stopped => {}
            }
        }

        frames_since_report += 1;
        let report_elapsed = last_report.elapsed();
        if report_elapsed >= Duration::from_secs(1) {
            let measured =
                (f64::from(frames_since_report) / report_elapsed.as_secs_f64()).round() as u32;
            on_progress(
                remaining,
                RenderProgress {
                    fps: measured,
                    resolution_height: sink_cfg.height,
                },
            );
            frames_since_report = 0;
            last_report = Instant::now();
        }

        // Keep capturing past zero so the terminal 0:00 frame survives
        // encoder buffering.
        if elapsed >= duration + tuning.overrun_buffer_secs {
            break;
        }
    }

    teardown(shared, media.as_deref_mut(), aborted);
}

fn teardown(shared: &SessionShared, media: Option<&mut (dyn MediaSource + '_)>, aborted: bool) {
    shared.finalize(aborted);
    if let Some(m) = media {
        m.pause_and_rewind();
    }
    shared.mark_done();
}

fn run_watchdog(shared: &SessionShared, deadline: Duration) {
    // Wake early on an external stop() so a stopped-but-wedged loop still
    // completes promptly instead of waiting out the full deadline.
    let done = lock_recover(&shared.done);
    let (done, _timeout) = shared
        .done_cv
        .wait_timeout_while(done, deadline, |finished| {
            !*finished && !shared.stop.load(Ordering::SeqCst)
        })
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let finished = *done;
    drop(done);

    if finished {
        return;
    }

    if !shared.is_stopping() {
        tracing::warn!("watchdog: session exceeded its deadline, forcing stop");
    }
    shared.stop.store(true, Ordering::SeqCst);

    // Give the loop one short grace window to unwind on its own.
    let done = lock_recover(&shared.done);
    let (done, grace) = shared
        .done_cv
        .wait_timeout_while(done, Duration::from_millis(500), |finished| !*finished)
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    drop(done);

    if grace.timed_out() {
        // The loop is starved or stuck; completion still must fire.
        shared.finalize(true);
        shared.mark_done();
    }
}
