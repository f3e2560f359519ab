use std::path::Path;

use crate::{
    foundation::core::Fps,
    foundation::error::TickdownResult,
    render::surface::PixelSurface,
};

/// Configuration handed to a [`FrameSink`] when recording begins.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Output width in pixels (even, for yuv420p outputs).
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second.
    pub fps: Fps,
    /// Target video bitrate in bits per second.
    pub bitrate_bps: u64,
}

/// Encoder lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkState {
    /// Created but not recording; frames pushed now are dropped upstream.
    Inactive,
    /// Accepting frames.
    Recording,
    /// Finalized; no further frames accepted.
    Stopped,
}

/// The finished encoding artifact: a single binary blob plus its media type.
///
/// The in-memory analog of a downloadable object URL — dropping the value
/// revokes it. Callers that want a file use [`RenderArtifact::write_to`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderArtifact {
    /// Media type of `bytes` (e.g. `video/mp4`), empty when no encoder ran.
    pub media_type: String,
    /// Encoded container bytes; empty when the session captured nothing.
    pub bytes: Vec<u8>,
}

impl RenderArtifact {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> TickdownResult<()> {
        use anyhow::Context as _;
        std::fs::write(path.as_ref(), &self.bytes)
            .with_context(|| format!("write artifact to '{}'", path.as_ref().display()))?;
        Ok(())
    }
}

/// Sink contract for consuming composited frames in timeline order.
///
/// The scheduler calls `begin` once (after warmup), `push_frame` once per
/// captured tick with the shared surface, and `finish` exactly once on
/// stop/abort/watchdog. `push_frame` must not block on anything slower than
/// a pipe write; ticks run on its caller's cadence.
pub trait FrameSink: Send {
    /// Enter `Recording`. Idempotent: calling on a recording sink is a no-op.
    fn begin(&mut self, cfg: &SinkConfig) -> TickdownResult<()>;

    fn state(&self) -> SinkState;

    /// Push one frame. The surface must match the `begin` dimensions.
    fn push_frame(&mut self, frame: &PixelSurface) -> TickdownResult<()>;

    /// Stop recording and assemble the artifact. Idempotent: a second call
    /// returns an empty artifact without side effects.
    fn finish(&mut self) -> TickdownResult<RenderArtifact>;
}

/// In-memory sink for tests and debugging: counts frames and keeps the
/// first and last pushed frame.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    state: Option<SinkState>,
    pub frames_pushed: u64,
    pub first_frame: Option<PixelSurface>,
    pub last_frame: Option<PixelSurface>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: &SinkConfig) -> TickdownResult<()> {
        if self.state() == SinkState::Recording {
            return Ok(());
        }
        self.cfg = Some(cfg.clone());
        self.state = Some(SinkState::Recording);
        self.frames_pushed = 0;
        self.first_frame = None;
        self.last_frame = None;
        Ok(())
    }

    fn state(&self) -> SinkState {
        self.state.unwrap_or(SinkState::Inactive)
    }

    fn push_frame(&mut self, frame: &PixelSurface) -> TickdownResult<()> {
        self.frames_pushed += 1;
        if self.first_frame.is_none() {
            self.first_frame = Some(frame.clone());
        }
        self.last_frame = Some(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> TickdownResult<RenderArtifact> {
        if self.state() == SinkState::Stopped {
            return Ok(RenderArtifact::default());
        }
        self.state = Some(SinkState::Stopped);
        Ok(RenderArtifact {
            media_type: "application/x-tickdown-test".to_string(),
            bytes: self.frames_pushed.to_le_bytes().to_vec(),
        })
    }
}
