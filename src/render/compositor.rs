use crate::{
    config::{RenderConfig, Tier},
    foundation::core::{Canvas, Rgba8Premul},
    glyphs::atlas::GlyphAtlas,
    glyphs::font::FontFace,
    layout::digits::{DigitLine, format_clock},
    layout::resolver::{BackgroundLayout, ResolvedLayout, resolve_layout},
    render::surface::PixelSurface,
    render::transitions::{AnimationStyle, TransitionTiming, draw_transition},
    render::watermark::WatermarkOverlay,
};

/// Per-session frame producer: owns the output surface, the glyph atlas,
/// the resolved layout, and the digit draw-command cache.
///
/// One instance lives for exactly one render session (atlas metrics are
/// resolution- and font-dependent, so nothing here survives into the next
/// session).
pub struct FrameCompositor {
    canvas: Canvas,
    surface: PixelSurface,
    face: FontFace,
    atlas: GlyphAtlas,
    layout: ResolvedLayout,
    digit_line: DigitLine,
    style: AnimationStyle,
    timing: TransitionTiming,
    duration_secs: f64,
    typography: crate::config::Typography,
    watermark: Option<WatermarkOverlay>,
}

impl FrameCompositor {
    #[tracing::instrument(skip(config, face))]
    pub fn new(config: &RenderConfig, canvas: Canvas, face: FontFace) -> Self {
        let atlas = GlyphAtlas::build(&face, &config.typography, canvas.height);
        let layout = resolve_layout(config, canvas);

        let watermark = (config.tier == Tier::Free && !config.watermark_text.is_empty()).then(|| {
            WatermarkOverlay::new(&face, &config.watermark_text, canvas, config.seed, 5.0)
        });

        let mut digit_line = DigitLine::new();
        digit_line.update(&atlas, layout.text_center, config.duration_secs.floor() as u64);

        Self {
            canvas,
            surface: PixelSurface::new(canvas.width, canvas.height),
            face,
            atlas,
            layout,
            digit_line,
            style: config.animation,
            timing: config.transition,
            duration_secs: config.duration_secs,
            typography: config.typography.clone(),
            watermark,
        }
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// The shared output surface (read side for the encoder sink).
    pub fn surface(&self) -> &PixelSurface {
        &self.surface
    }

    /// Composite one frame for `remaining` seconds on the clock (a real
    /// number; the fractional part drives rollover transitions).
    /// `media_frame`, when present, is the current background media frame.
    pub fn render_frame(&mut self, remaining: f64, media_frame: Option<&PixelSurface>) {
        let remaining = remaining.max(0.0);

        self.draw_background(media_frame);

        // Self-heal: an empty atlas (failed construction race) is rebuilt
        // rather than rendering blank digits.
        if self.atlas.is_empty() {
            tracing::warn!("glyph atlas empty, rebuilding");
            self.atlas = GlyphAtlas::build(&self.face, &self.typography, self.canvas.height);
        }

        // 6.9s draws as "6" rolling in, not a static "7".
        let second = remaining.floor() as u64;
        self.digit_line.update(&self.atlas, self.layout.text_center, second);

        // Transitions are keyed off the value being rolled *away from*: the
        // next-larger second, since the clock counts down. Comparing against
        // the previous frame instead would retrigger on every frame of the
        // same displayed second.
        let outgoing = format_clock(second + 1);
        let outgoing_chars: Vec<char> = outgoing.chars().collect();

        let fraction = remaining - remaining.floor();
        let t = self.timing.progress(fraction);

        let items = self.digit_line.items().to_vec();
        for (idx, item) in items.iter().enumerate() {
            let outgoing_ch = outgoing_chars.get(idx).copied().unwrap_or(item.ch);

            if outgoing_ch == item.ch || self.style.is_none() {
                self.surface.blit(
                    self.atlas.surface(),
                    self.atlas.src_rect(crate::glyphs::atlas::GlyphSlot {
                        x_offset: item.src_x,
                        width: item.w,
                    }),
                    item.x,
                    item.y,
                );
                continue;
            }

            let Some(old_slot) = self.atlas.slot(outgoing_ch) else {
                continue;
            };
            draw_transition(&mut self.surface, &self.atlas, self.style, old_slot, item, t);
        }

        if let Some(wm) = self.watermark.as_mut() {
            let elapsed = (self.duration_secs - remaining).max(0.0);
            wm.update(elapsed, self.duration_secs);
            wm.draw(&mut self.surface);
        }
    }

    fn draw_background(&mut self, media_frame: Option<&PixelSurface>) {
        match &self.layout.background {
            BackgroundLayout::Solid { color } => self.surface.fill(*color),
            BackgroundLayout::Gradient { from, to } => {
                self.surface.fill_diagonal_gradient(*from, *to);
            }
            BackgroundLayout::Media { dest } => {
                // Letterbox base; media may not cover the whole frame.
                self.surface.fill(Rgba8Premul::BLACK);
                if let Some(frame) = media_frame {
                    self.surface.blit_scaled_opaque(frame, *dest);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackgroundKind, RenderConfig};
    use crate::glyphs::font::BuiltinFace;
    use crate::layout::resolver::export_dimensions;

    fn compositor_with(config: RenderConfig) -> FrameCompositor {
        let canvas = export_dimensions(&config);
        FrameCompositor::new(&config, canvas, FontFace::Builtin(BuiltinFace))
    }

    fn small_config() -> RenderConfig {
        let mut cfg = RenderConfig::default();
        cfg.export_height = 90;
        cfg.duration_secs = 5.0;
        cfg
    }

    #[test]
    fn solid_black_background_fills_all_corners() {
        let mut cfg = small_config();
        cfg.background = BackgroundKind::Solid {
            color: Rgba8Premul::from_hex("#000000").unwrap(),
        };
        cfg.tier = Tier::Paid; // no overlay pixels in corners either
        let mut comp = compositor_with(cfg);
        comp.render_frame(5.0, None);

        let s = comp.surface();
        let (w, h) = (s.width() - 1, s.height() - 1);
        for (x, y) in [(0, 0), (w, 0), (0, h), (w, h)] {
            assert_eq!(s.pixel(x, y), [0, 0, 0, 255], "corner ({x},{y})");
        }
    }

    #[test]
    fn full_second_frame_matches_static_render_for_animated_styles() {
        // remaining=4.0 means fraction 0 => transitions pinned at t=1, which
        // must equal a run with animation disabled.
        let mut animated = small_config();
        animated.animation = AnimationStyle::Roller;
        animated.tier = Tier::Paid;
        let mut a = compositor_with(animated);
        a.render_frame(4.0, None);

        let mut still = small_config();
        still.animation = AnimationStyle::None;
        still.tier = Tier::Paid;
        let mut b = compositor_with(still);
        b.render_frame(4.0, None);

        assert_eq!(a.surface().data(), b.surface().data());
    }

    #[test]
    fn mid_window_frame_differs_from_static_render() {
        let mut animated = small_config();
        animated.animation = AnimationStyle::Roller;
        animated.tier = Tier::Paid;
        let mut a = compositor_with(animated);
        a.render_frame(4.35, None); // fraction 0.35 => mid-transition

        let mut still = small_config();
        still.animation = AnimationStyle::None;
        still.tier = Tier::Paid;
        let mut b = compositor_with(still);
        b.render_frame(4.35, None);

        assert_ne!(a.surface().data(), b.surface().data());
    }

    #[test]
    fn free_tier_adds_watermark_pixels() {
        let mut free = small_config();
        free.tier = Tier::Free;
        free.background = BackgroundKind::Solid {
            color: Rgba8Premul::from_hex("#000000").unwrap(),
        };
        let mut a = compositor_with(free.clone());
        a.render_frame(5.0, None);

        free.tier = Tier::Paid;
        let mut b = compositor_with(free);
        b.render_frame(5.0, None);

        assert_ne!(a.surface().data(), b.surface().data());
    }

    #[test]
    fn media_background_letterboxes_black_and_blits_frame() {
        let mut cfg = small_config();
        cfg.tier = Tier::Paid;
        cfg.background = BackgroundKind::Media {
            transform: crate::config::MediaTransform {
                // Large enough to cover the whole 160x90 canvas.
                scale: 20.0,
                offset: crate::foundation::core::Vec2::ZERO,
                intrinsic_width: 100,
                intrinsic_height: 100,
            },
        };
        let mut comp = compositor_with(cfg.clone());
        let mut media = PixelSurface::new(100, 100);
        media.fill(Rgba8Premul::from_straight_rgba(0, 255, 0, 255));
        comp.render_frame(5.0, Some(&media));
        assert_eq!(comp.surface().pixel(0, 0), [0, 255, 0, 255], "covered corner");

        // Without a media frame the layer letterboxes to black.
        let mut bare = compositor_with(cfg);
        bare.render_frame(5.0, None);
        assert_eq!(bare.surface().pixel(0, 0), [0, 0, 0, 255], "letterbox corner");
    }
}
