use crate::{
    animation::ease::Ease,
    foundation::error::{TickdownError, TickdownResult},
    glyphs::atlas::{GlyphAtlas, GlyphSlot},
    layout::digits::RenderItem,
    render::surface::{IRect, PixelSurface, SpriteRect},
};

/// Digit rollover animation styles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnimationStyle {
    /// Static blit, no transition.
    None,
    /// Vertical reel: old glyph slides out upward, new slides in from below.
    Roller,
    /// Horizontal strip: old glyph exits left, new enters from the right.
    Slide,
    /// Old glyph scales up and fades out; new scales in from smaller.
    ZoomDepth,
    /// Two-phase vertical compress/expand with a darkening ramp.
    Flip,
    /// Two-phase horizontal compress/expand (simulated Y-axis rotation).
    Spin,
    /// New glyph alone, with an overshoot/bounce scale.
    Pop,
}

impl AnimationStyle {
    pub fn is_none(self) -> bool {
        matches!(self, Self::None)
    }
}

/// Parse a style name, accepting both the short serde names and the longer
/// labels used by configuration front ends.
pub fn parse_animation_style(name: &str) -> TickdownResult<AnimationStyle> {
    let name = name.trim().to_ascii_lowercase();
    if name.is_empty() {
        return Err(TickdownError::validation("animation style must be non-empty"));
    }

    match name.as_str() {
        "none" | "static" => Ok(AnimationStyle::None),
        "roller" | "roller-mechanical" => Ok(AnimationStyle::Roller),
        "slide" | "slide-horizontal" => Ok(AnimationStyle::Slide),
        "zoom-depth" | "zoom" => Ok(AnimationStyle::ZoomDepth),
        "flip" | "flip-classic" => Ok(AnimationStyle::Flip),
        "spin" | "spin-3d" => Ok(AnimationStyle::Spin),
        "pop" => Ok(AnimationStyle::Pop),
        other => Err(TickdownError::validation(format!(
            "unknown animation style '{other}'"
        ))),
    }
}

/// Tail-of-second trigger window for digit rollovers.
///
/// A digit holds static while the fractional second is above
/// `start_threshold`; the transition then runs for `duration_secs` and is
/// pinned at completion for the remainder of the second. Both constants are
/// product-tunable; the mechanism (window position, `t` in [0,1], identical
/// final frame) is the contract.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct TransitionTiming {
    pub start_threshold: f64,
    pub duration_secs: f64,
}

impl Default for TransitionTiming {
    fn default() -> Self {
        Self {
            start_threshold: 0.6,
            duration_secs: 0.5,
        }
    }
}

impl TransitionTiming {
    pub fn validate(&self) -> TickdownResult<()> {
        if !self.start_threshold.is_finite() || !(0.0..=1.0).contains(&self.start_threshold) {
            return Err(TickdownError::validation(
                "transition start_threshold must be in [0, 1]",
            ));
        }
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(TickdownError::validation(
                "transition duration_secs must be > 0",
            ));
        }
        if self.duration_secs > self.start_threshold {
            return Err(TickdownError::validation(
                "transition duration_secs must not exceed start_threshold",
            ));
        }
        Ok(())
    }

    /// Map the fractional second (counting down toward 0) to transition
    /// progress `t` in [0, 1].
    pub fn progress(&self, fraction: f64) -> f64 {
        let end_threshold = self.start_threshold - self.duration_secs;
        if fraction <= end_threshold {
            1.0
        } else if fraction <= self.start_threshold {
            ((self.start_threshold - fraction) / self.duration_secs).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Render one transitioning character.
///
/// Pure with respect to session state: output depends only on the two glyph
/// sprites, the target box, and `t`. `t = 1` is byte-identical to a static
/// blit of the new glyph.
pub fn draw_transition(
    surface: &mut PixelSurface,
    atlas: &GlyphAtlas,
    style: AnimationStyle,
    old_slot: GlyphSlot,
    item: &RenderItem,
    t: f64,
) {
    let new_src = atlas.src_rect(GlyphSlot {
        x_offset: item.src_x,
        width: item.w,
    });

    if t >= 1.0 || style.is_none() {
        surface.blit(atlas.surface(), new_src, item.x, item.y);
        return;
    }

    let old_src = atlas.src_rect(old_slot);
    match style {
        AnimationStyle::None => unreachable!("handled above"),
        AnimationStyle::Roller => roller(surface, atlas, old_src, new_src, item, t),
        AnimationStyle::Slide => slide(surface, atlas, old_src, new_src, item, t),
        AnimationStyle::ZoomDepth => zoom_depth(surface, atlas, old_src, new_src, item, t),
        AnimationStyle::Flip => flip(surface, atlas, old_src, new_src, item, t),
        AnimationStyle::Spin => spin(surface, atlas, old_src, new_src, item, t),
        AnimationStyle::Pop => pop(surface, atlas, new_src, item, t),
    }
}

fn item_clip(item: &RenderItem) -> Option<IRect> {
    Some(IRect::new(item.x, item.y, item.w as i32, item.h as i32))
}

fn item_rect(item: &RenderItem) -> SpriteRect {
    SpriteRect::new(
        f64::from(item.x),
        f64::from(item.y),
        f64::from(item.w),
        f64::from(item.h),
    )
}

fn centered_rect(item: &RenderItem, scale_x: f64, scale_y: f64) -> SpriteRect {
    let w = f64::from(item.w) * scale_x;
    let h = f64::from(item.h) * scale_y;
    let cx = f64::from(item.x) + f64::from(item.w) / 2.0;
    let cy = f64::from(item.y) + f64::from(item.h) / 2.0;
    SpriteRect::new(cx - w / 2.0, cy - h / 2.0, w, h)
}

fn roller(
    surface: &mut PixelSurface,
    atlas: &GlyphAtlas,
    old_src: IRect,
    new_src: IRect,
    item: &RenderItem,
    t: f64,
) {
    let offset = f64::from(item.h) * Ease::InOutQuad.apply(t);
    let clip = item_clip(item);
    let mut old_dst = item_rect(item);
    old_dst.y -= offset;
    surface.draw_sprite(atlas.surface(), old_src, old_dst, 1.0, 1.0, clip);

    let mut new_dst = item_rect(item);
    new_dst.y += f64::from(item.h) - offset;
    surface.draw_sprite(atlas.surface(), new_src, new_dst, 1.0, 1.0, clip);
}

fn slide(
    surface: &mut PixelSurface,
    atlas: &GlyphAtlas,
    old_src: IRect,
    new_src: IRect,
    item: &RenderItem,
    t: f64,
) {
    let offset = f64::from(item.w) * Ease::InOutQuad.apply(t);
    let clip = item_clip(item);
    let mut old_dst = item_rect(item);
    old_dst.x -= offset;
    surface.draw_sprite(atlas.surface(), old_src, old_dst, 1.0, 1.0, clip);

    let mut new_dst = item_rect(item);
    new_dst.x += f64::from(item.w) - offset;
    surface.draw_sprite(atlas.surface(), new_src, new_dst, 1.0, 1.0, clip);
}

fn zoom_depth(
    surface: &mut PixelSurface,
    atlas: &GlyphAtlas,
    old_src: IRect,
    new_src: IRect,
    item: &RenderItem,
    t: f64,
) {
    // Old comes forward and dissolves; new arrives from the back. Scale is
    // eased, alpha stays linear.
    let eased = Ease::OutCubic.apply(t);
    let scale_old = 1.0 + eased * 0.5;
    surface.draw_sprite(
        atlas.surface(),
        old_src,
        centered_rect(item, scale_old, scale_old),
        (1.0 - t) as f32,
        1.0,
        None,
    );

    let scale_new = 0.5 + eased * 0.5;
    surface.draw_sprite(
        atlas.surface(),
        new_src,
        centered_rect(item, scale_new, scale_new),
        t as f32,
        1.0,
        None,
    );
}

fn flip(
    surface: &mut PixelSurface,
    atlas: &GlyphAtlas,
    old_src: IRect,
    new_src: IRect,
    item: &RenderItem,
    t: f64,
) {
    if t < 0.5 {
        let scale = 1.0 - t * 2.0;
        let brightness = (0.5 + 0.5 * scale) as f32;
        surface.draw_sprite(
            atlas.surface(),
            old_src,
            centered_rect(item, 1.0, scale),
            1.0,
            brightness,
            None,
        );
    } else {
        let scale = (t - 0.5) * 2.0;
        let brightness = (0.5 + 0.5 * scale) as f32;
        surface.draw_sprite(
            atlas.surface(),
            new_src,
            centered_rect(item, 1.0, scale),
            1.0,
            brightness,
            None,
        );
    }
}

fn spin(
    surface: &mut PixelSurface,
    atlas: &GlyphAtlas,
    old_src: IRect,
    new_src: IRect,
    item: &RenderItem,
    t: f64,
) {
    if t < 0.5 {
        let scale = 1.0 - t * 2.0;
        let brightness = (0.7 + 0.3 * scale) as f32;
        surface.draw_sprite(
            atlas.surface(),
            old_src,
            centered_rect(item, scale, 1.0),
            1.0,
            brightness,
            None,
        );
    } else {
        let scale = (t - 0.5) * 2.0;
        let brightness = (0.7 + 0.3 * scale) as f32;
        surface.draw_sprite(
            atlas.surface(),
            new_src,
            centered_rect(item, scale, 1.0),
            1.0,
            brightness,
            None,
        );
    }
}

fn pop(surface: &mut PixelSurface, atlas: &GlyphAtlas, new_src: IRect, item: &RenderItem, t: f64) {
    let scale = if t < 0.5 {
        0.5 + t
    } else {
        1.0 + (t * std::f64::consts::PI * 4.0).sin() * 0.1
    };
    surface.draw_sprite(
        atlas.surface(),
        new_src,
        centered_rect(item, scale, scale),
        1.0,
        1.0,
        None,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Typography;
    use crate::foundation::core::Rgba8Premul;
    use crate::glyphs::font::{BuiltinFace, FontFace};
    use crate::layout::digits::layout_line;

    const STYLES: [AnimationStyle; 6] = [
        AnimationStyle::Roller,
        AnimationStyle::Slide,
        AnimationStyle::ZoomDepth,
        AnimationStyle::Flip,
        AnimationStyle::Spin,
        AnimationStyle::Pop,
    ];

    fn atlas() -> GlyphAtlas {
        let typography = Typography {
            font_family: "Inter".to_string(),
            font_size_px: 120.0,
            color: Rgba8Premul::from_straight_rgba(255, 255, 255, 255),
            shadow: true,
        };
        GlyphAtlas::build(&FontFace::Builtin(BuiltinFace), &typography, 240)
    }

    #[test]
    fn parse_accepts_short_and_long_names() {
        assert_eq!(parse_animation_style("roller").unwrap(), AnimationStyle::Roller);
        assert_eq!(
            parse_animation_style("roller-mechanical").unwrap(),
            AnimationStyle::Roller
        );
        assert_eq!(parse_animation_style(" FLIP-Classic ").unwrap(), AnimationStyle::Flip);
        assert_eq!(parse_animation_style("spin-3d").unwrap(), AnimationStyle::Spin);
        assert!(parse_animation_style("wobble").is_err());
        assert!(parse_animation_style("").is_err());
    }

    #[test]
    fn serde_names_are_kebab_case() {
        assert_eq!(
            serde_json::to_string(&AnimationStyle::ZoomDepth).unwrap(),
            "\"zoom-depth\""
        );
    }

    #[test]
    fn timing_progress_covers_the_window() {
        let timing = TransitionTiming::default();
        assert_eq!(timing.progress(0.9), 0.0); // early in the second: hold
        assert_eq!(timing.progress(0.6), 0.0); // window opens
        assert!((timing.progress(0.35) - 0.5).abs() < 1e-9);
        assert_eq!(timing.progress(0.1), 1.0); // window closed
        assert_eq!(timing.progress(0.0), 1.0); // terminal frame
    }

    #[test]
    fn timing_validate_rejects_window_larger_than_threshold() {
        let timing = TransitionTiming {
            start_threshold: 0.4,
            duration_secs: 0.5,
        };
        assert!(timing.validate().is_err());
    }

    #[test]
    fn t_1_is_pixel_identical_to_static_blit_for_every_style() {
        let atlas = atlas();
        let items = layout_line(&atlas, (80, 40), 5); // "0:05"
        let item = items[3];
        let old_slot = atlas.slot('6').unwrap();

        let mut expected = PixelSurface::new(160, 80);
        expected.blit(atlas.surface(), atlas.src_rect(atlas.slot(item.ch).unwrap()), item.x, item.y);

        for style in STYLES {
            let mut got = PixelSurface::new(160, 80);
            draw_transition(&mut got, &atlas, style, old_slot, &item, 1.0);
            assert_eq!(got.data(), expected.data(), "style {style:?}");
        }
    }

    #[test]
    fn t_0_shows_the_outgoing_glyph_for_reel_styles() {
        // At the start of the window the reel still shows the old digit in
        // place, so the frame equals a static blit of the *old* glyph.
        let atlas = atlas();
        let items = layout_line(&atlas, (80, 40), 5);
        let item = items[3];
        let old_slot = atlas.slot('6').unwrap();

        let mut expected = PixelSurface::new(160, 80);
        expected.blit(atlas.surface(), atlas.src_rect(old_slot), item.x, item.y);

        for style in [AnimationStyle::Roller, AnimationStyle::Slide] {
            let mut got = PixelSurface::new(160, 80);
            draw_transition(&mut got, &atlas, style, old_slot, &item, 0.0);
            assert_eq!(got.data(), expected.data(), "style {style:?}");
        }
    }

    #[test]
    fn reel_styles_never_paint_outside_the_glyph_box() {
        let atlas = atlas();
        let items = layout_line(&atlas, (80, 40), 5);
        let item = items[3];
        let old_slot = atlas.slot('6').unwrap();

        for style in [AnimationStyle::Roller, AnimationStyle::Slide] {
            let mut s = PixelSurface::new(160, 80);
            draw_transition(&mut s, &atlas, style, old_slot, &item, 0.4);
            for y in 0..s.height() {
                for x in 0..s.width() {
                    let inside = (x as i32) >= item.x
                        && (x as i32) < item.x + item.w as i32
                        && (y as i32) >= item.y
                        && (y as i32) < item.y + item.h as i32;
                    if !inside {
                        assert_eq!(s.pixel(x, y), [0, 0, 0, 0], "style {style:?} at ({x},{y})");
                    }
                }
            }
        }
    }
}
