//! End-to-end render session behavior over an in-memory sink.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU32, Ordering},
    mpsc,
};
use std::time::Duration;

use tickdown::{
    AnimationStyle, BackgroundKind, FrameCompositor, FrameSink, InMemorySink, RenderConfig,
    RenderScheduler, Rgba8Premul, SessionTuning, SinkConfig, SinkState, Tier, export_dimensions,
    resolve_face,
};

/// Test sink handle that survives handing ownership to the scheduler.
#[derive(Clone)]
struct SharedSink(Arc<Mutex<InMemorySink>>);

impl SharedSink {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(InMemorySink::new())))
    }
}

impl FrameSink for SharedSink {
    fn begin(&mut self, cfg: &SinkConfig) -> tickdown::TickdownResult<()> {
        self.0.lock().unwrap().begin(cfg)
    }

    fn state(&self) -> SinkState {
        self.0.lock().unwrap().state()
    }

    fn push_frame(&mut self, frame: &tickdown::PixelSurface) -> tickdown::TickdownResult<()> {
        self.0.lock().unwrap().push_frame(frame)
    }

    fn finish(&mut self) -> tickdown::TickdownResult<tickdown::RenderArtifact> {
        self.0.lock().unwrap().finish()
    }
}

fn quick_tuning() -> SessionTuning {
    SessionTuning {
        overrun_buffer_secs: 0.3,
        watchdog_margin_secs: 2.0,
        ..SessionTuning::default()
    }
}

fn quick_config(duration_secs: f64) -> RenderConfig {
    RenderConfig {
        export_height: 90,
        duration_secs,
        ..RenderConfig::default()
    }
}

#[test]
fn session_runs_to_completion_and_reports_progress() {
    let sink = SharedSink::new();
    let sink_handle = sink.clone();
    let (done_tx, done_rx) = mpsc::channel();
    let progress_calls = Arc::new(AtomicU32::new(0));
    let progress_counter = Arc::clone(&progress_calls);

    let config = quick_config(1.4);
    let mut scheduler = RenderScheduler::new(quick_tuning());
    scheduler
        .start(
            config,
            2_000_000,
            Box::new(sink),
            None,
            Box::new(move |remaining, stats| {
                assert!(remaining >= 0.0);
                assert_eq!(stats.resolution_height, 90);
                assert!(stats.fps > 0);
                progress_counter.fetch_add(1, Ordering::SeqCst);
            }),
            Box::new(move |artifact| {
                done_tx.send(artifact).ok();
            }),
        )
        .unwrap();

    let artifact = done_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("session must complete on its own");
    assert!(!artifact.is_empty());

    // 1.4s countdown + 0.3s overrun at 30fps, minus scheduling slack.
    let recorded = sink_handle.0.lock().unwrap();
    assert!(
        recorded.frames_pushed >= 30,
        "expected a full capture, got {} frames",
        recorded.frames_pushed
    );
    assert_eq!(recorded.state(), SinkState::Stopped);
    assert!(progress_calls.load(Ordering::SeqCst) >= 1);

    scheduler.stop();
}

#[test]
fn first_captured_frame_displays_floor_of_duration() {
    let sink = SharedSink::new();
    let sink_handle = sink.clone();
    let (done_tx, done_rx) = mpsc::channel();

    let mut config = quick_config(2.0);
    config.animation = AnimationStyle::None;
    config.tier = Tier::Paid;

    let mut scheduler = RenderScheduler::new(quick_tuning());
    scheduler
        .start(
            config.clone(),
            1_000_000,
            Box::new(sink),
            None,
            Box::new(|_, _| {}),
            Box::new(move |_| {
                done_tx.send(()).ok();
            }),
        )
        .unwrap();
    done_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    scheduler.stop();

    // Expected: a static composite of the full initial value ("0:02").
    let canvas = export_dimensions(&config);
    let face = resolve_face(&config.typography.font_family, &[]);
    let mut expected = FrameCompositor::new(&config, canvas, face);
    expected.render_frame(config.duration_secs, None);

    let recorded = sink_handle.0.lock().unwrap();
    let first = recorded.first_frame.as_ref().expect("frames were captured");
    assert_eq!(first.data(), expected.surface().data());
}

#[test]
fn terminal_frame_shows_zero_for_black_solid_background() {
    let sink = SharedSink::new();
    let sink_handle = sink.clone();
    let (done_tx, done_rx) = mpsc::channel();

    let mut config = quick_config(0.8);
    config.background = BackgroundKind::Solid {
        color: Rgba8Premul::from_hex("#000000").unwrap(),
    };
    config.tier = Tier::Paid;

    let mut scheduler = RenderScheduler::new(quick_tuning());
    scheduler
        .start(
            config.clone(),
            1_000_000,
            Box::new(sink),
            None,
            Box::new(|_, _| {}),
            Box::new(move |_| {
                done_tx.send(()).ok();
            }),
        )
        .unwrap();
    done_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    scheduler.stop();

    // Overrun capture keeps rendering after zero, so the last frame is the
    // terminal 0:00 image; its corners stay pure background.
    let canvas = export_dimensions(&config);
    let face = resolve_face(&config.typography.font_family, &[]);
    let mut expected = FrameCompositor::new(&config, canvas, face);
    expected.render_frame(0.0, None);

    let recorded = sink_handle.0.lock().unwrap();
    let last = recorded.last_frame.as_ref().expect("frames were captured");
    assert_eq!(last.data(), expected.surface().data());

    let (w, h) = (last.width() - 1, last.height() - 1);
    for (x, y) in [(0, 0), (w, 0), (0, h), (w, h)] {
        assert_eq!(last.pixel(x, y), [0, 0, 0, 255]);
    }
}

#[test]
fn stop_is_idempotent_and_still_completes() {
    let (done_tx, done_rx) = mpsc::channel();
    let completions = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&completions);

    let mut scheduler = RenderScheduler::new(quick_tuning());
    scheduler
        .start(
            quick_config(30.0),
            1_000_000,
            Box::new(SharedSink::new()),
            None,
            Box::new(|_, _| {}),
            Box::new(move |artifact| {
                counter.fetch_add(1, Ordering::SeqCst);
                done_tx.send(artifact).ok();
            }),
        )
        .unwrap();

    std::thread::sleep(Duration::from_millis(400));
    scheduler.stop();
    scheduler.stop();

    let _ = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert!(!scheduler.is_active());
}

#[test]
fn starting_a_new_session_force_stops_the_previous_one() {
    let first_completions = Arc::new(AtomicU32::new(0));
    let first_counter = Arc::clone(&first_completions);
    let (second_tx, second_rx) = mpsc::channel();

    let mut scheduler = RenderScheduler::new(quick_tuning());
    scheduler
        .start(
            quick_config(30.0),
            1_000_000,
            Box::new(SharedSink::new()),
            None,
            Box::new(|_, _| {}),
            Box::new(move |_| {
                first_counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
    std::thread::sleep(Duration::from_millis(300));

    scheduler
        .start(
            quick_config(0.6),
            1_000_000,
            Box::new(SharedSink::new()),
            None,
            Box::new(|_, _| {}),
            Box::new(move |_| {
                second_tx.send(()).ok();
            }),
        )
        .unwrap();

    // The predecessor's completion fired before the new warmup began.
    assert_eq!(first_completions.load(Ordering::SeqCst), 1);

    second_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    scheduler.stop();
}
