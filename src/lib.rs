//! Tickdown is a frame-accurate countdown video renderer.
//!
//! A caller hands over a [`RenderConfig`] (typography, background, animation
//! style, duration, export size) plus progress/completion callbacks; the
//! engine composites the countdown frame by frame at a fixed cadence and
//! streams the frames into a negotiated encoding session, delivering a
//! single binary artifact when the clock runs out.
//!
//! # Pipeline overview
//!
//! 1. **Prepare**: resolve a font face, bake the [`GlyphAtlas`] sprite
//!    sheet, and resolve percentage-based placement into pixel geometry
//!    (once per session).
//! 2. **Compose**: [`FrameCompositor`] draws background + digits (static
//!    blit or rollover transition) into the shared [`PixelSurface`].
//! 3. **Schedule**: [`RenderScheduler`] paces ticks from accumulated
//!    wall-clock deltas, runs warmup, guards encoder startup, buffers
//!    overrun, and arms a watchdog.
//! 4. **Encode**: a [`FrameSink`] (ffmpeg-backed in production) consumes
//!    frames and finalizes into a [`RenderArtifact`].
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Premultiplied RGBA8** end-to-end on the pixel surface.
//! - **No error across the session boundary**: failures degrade output and
//!   still deliver the completion callback.
//! - **Pure transition renderers**: glyphs + box + `t` in, pixels out, so
//!   every animation style is unit-testable without an encoder.
#![forbid(unsafe_code)]

mod animation;
mod config;
mod encode;
mod foundation;
mod glyphs;
mod layout;
mod render;
mod session;

pub use animation::ease::Ease;
pub use config::{
    AspectRatio, BackgroundKind, MediaTransform, RenderConfig, Tier, Typography,
};
pub use encode::ffmpeg::{
    CodecPreference, FfmpegSink, NegotiatedFormat, default_preferences, is_ffmpeg_on_path,
    negotiate, probe_supported_encoders,
};
pub use encode::sink::{FrameSink, InMemorySink, RenderArtifact, SinkConfig, SinkState};
pub use foundation::core::{Canvas, Fps, Point, Rect, Rgba8Premul, Vec2};
pub use foundation::error::{TickdownError, TickdownResult};
pub use glyphs::atlas::{GlyphAtlas, GlyphSlot, SEPARATOR};
pub use glyphs::font::{BuiltinFace, FontFace, RasterGlyph, resolve_face};
pub use layout::digits::{DigitLine, RenderItem, format_clock, layout_line};
pub use layout::resolver::{
    BackgroundLayout, MEDIA_REFERENCE_HEIGHT, ResolvedLayout, export_dimensions, resolve_layout,
};
pub use render::compositor::FrameCompositor;
pub use render::surface::{IRect, PixelSurface, SpriteRect};
pub use render::transitions::{
    AnimationStyle, TransitionTiming, draw_transition, parse_animation_style,
};
pub use render::watermark::WatermarkOverlay;
pub use session::clock::SessionClock;
pub use session::media::{ImageSource, MediaSource};
pub use session::scheduler::{
    CompleteFn, ProgressFn, RenderProgress, RenderScheduler, SessionPhase, SessionTuning,
};
