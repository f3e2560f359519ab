use crate::{
    foundation::core::{Canvas, Rgba8Premul},
    foundation::math::SplitMix64,
    glyphs::font::FontFace,
    render::surface::{PixelSurface, SpriteRect},
};

/// Fraction of the canvas height kept clear around the watermark.
const EDGE_PADDING_FACTOR: f64 = 0.05;

/// Renders below this duration keep the watermark parked bottom-right.
const REPOSITION_MIN_DURATION_SECS: f64 = 20.0;

/// Free-tier branding overlay.
///
/// The string is rasterized once into a sprite; per frame the overlay only
/// blits. For long renders the anchor migrates periodically (alternating
/// top/bottom, random horizontal position in the right half) to resist
/// trivial cropping. Overlay state is self-contained: repositioning never
/// touches digit layout or background geometry.
#[derive(Debug)]
pub struct WatermarkOverlay {
    sprite: PixelSurface,
    canvas: Canvas,
    interval_secs: f64,
    anchor_x: f64,
    anchor_y: f64,
    at_top: bool,
    last_move_secs: f64,
    rng: SplitMix64,
}

impl WatermarkOverlay {
    pub fn new(face: &FontFace, text: &str, canvas: Canvas, seed: u64, interval_secs: f64) -> Self {
        let font_px = (f64::from(canvas.height) * 0.025).round().max(16.0) as f32;
        let color = Rgba8Premul::from_straight_rgba(255, 255, 255, 255);
        let sprite = render_line_sprite(face, text, font_px, color);

        let padding = f64::from(canvas.height) * EDGE_PADDING_FACTOR;
        Self {
            sprite,
            canvas,
            interval_secs,
            anchor_x: f64::from(canvas.width) - padding,
            anchor_y: f64::from(canvas.height) - padding,
            at_top: false,
            last_move_secs: 0.0,
            rng: SplitMix64::new(seed ^ 0x57A7_E12A_11C4),
        }
    }

    /// Migrate the anchor when due. Short renders never move.
    pub fn update(&mut self, elapsed_secs: f64, duration_secs: f64) {
        if duration_secs <= REPOSITION_MIN_DURATION_SECS {
            return;
        }
        if elapsed_secs - self.last_move_secs <= self.interval_secs {
            return;
        }

        let width = f64::from(self.canvas.width);
        let height = f64::from(self.canvas.height);
        let padding = height * EDGE_PADDING_FACTOR;

        self.at_top = !self.at_top;
        // The anchor is the text bottom edge; near the top it sits just
        // under the safe area.
        self.anchor_y = if self.at_top {
            padding + height * 0.03
        } else {
            height - padding
        };

        let min_x = width * 0.6;
        let max_x = width - padding;
        self.anchor_x = min_x + self.rng.next_f64() * (max_x - min_x);
        self.last_move_secs = elapsed_secs;
    }

    /// Blit the sprite right/bottom-anchored at the current position.
    pub fn draw(&self, surface: &mut PixelSurface) {
        let w = f64::from(self.sprite.width());
        let h = f64::from(self.sprite.height());
        surface.draw_sprite(
            &self.sprite,
            self.sprite.bounds(),
            SpriteRect::new(self.anchor_x - w, self.anchor_y - h, w, h),
            0.5,
            1.0,
            None,
        );
    }

    pub fn anchor(&self) -> (f64, f64) {
        (self.anchor_x, self.anchor_y)
    }

    pub fn is_at_top(&self) -> bool {
        self.at_top
    }
}

/// Rasterize a single line of text into a tight sprite with a baked shadow.
fn render_line_sprite(face: &FontFace, text: &str, px: f32, color: Rgba8Premul) -> PixelSurface {
    let glyphs: Vec<_> = text.chars().map(|ch| (ch, face.rasterize(ch, px))).collect();

    let shadow_offset = ((px * 0.04) as i32).max(2);
    let total_advance: f32 = glyphs.iter().map(|(_, g)| g.advance).sum();
    let width = (total_advance.ceil() as u32 + shadow_offset as u32 + 2).max(1);
    let height = ((px * 1.3).ceil() as u32 + shadow_offset as u32).max(1);
    let baseline = px.round() as i32;

    let mut sprite = PixelSurface::new(width, height);
    let shadow = Rgba8Premul::from_straight_rgba(0, 0, 0, 204);

    for pass in 0..2 {
        let (dx, dy, tint) = if pass == 0 {
            (shadow_offset, shadow_offset, shadow)
        } else {
            (0, 0, color)
        };
        let mut pen_x = 0.0f32;
        for (_, glyph) in &glyphs {
            let gx = pen_x.round() as i64 + i64::from(dx);
            let gy = i64::from(baseline - glyph.height as i32 - glyph.ymin + dy);
            for row in 0..glyph.height {
                for col in 0..glyph.width {
                    let cov = glyph.coverage[row * glyph.width + col];
                    if cov == 0 {
                        continue;
                    }
                    let c = u16::from(cov);
                    use crate::foundation::math::mul_div255_u8;
                    let src = [
                        mul_div255_u8(u16::from(tint.r), c),
                        mul_div255_u8(u16::from(tint.g), c),
                        mul_div255_u8(u16::from(tint.b), c),
                        mul_div255_u8(u16::from(tint.a), c),
                    ];
                    sprite.put_pixel_over(gx + col as i64, gy + row as i64, src);
                }
            }
            pen_x += glyph.advance;
        }
    }

    sprite
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyphs::font::BuiltinFace;

    fn overlay(seed: u64) -> WatermarkOverlay {
        WatermarkOverlay::new(
            &FontFace::Builtin(BuiltinFace),
            "10:09:08",
            Canvas {
                width: 1280,
                height: 720,
            },
            seed,
            5.0,
        )
    }

    #[test]
    fn starts_bottom_right() {
        let wm = overlay(1);
        let (x, y) = wm.anchor();
        assert!(!wm.is_at_top());
        assert_eq!(x, 1280.0 - 36.0);
        assert_eq!(y, 720.0 - 36.0);
    }

    #[test]
    fn short_renders_never_reposition() {
        let mut wm = overlay(2);
        let initial = wm.anchor();
        let mut elapsed = 0.0;
        while elapsed < 20.0 {
            wm.update(elapsed, 20.0);
            elapsed += 1.0 / 30.0;
        }
        assert_eq!(wm.anchor(), initial);
        assert!(!wm.is_at_top());
    }

    #[test]
    fn long_renders_alternate_vertical_anchor() {
        let mut wm = overlay(3);
        let mut tops = Vec::new();
        let mut last_anchor = wm.anchor();
        let mut elapsed = 0.0;
        while elapsed < 30.0 {
            wm.update(elapsed, 30.0);
            if wm.anchor() != last_anchor {
                tops.push(wm.is_at_top());
                last_anchor = wm.anchor();
            }
            elapsed += 1.0 / 30.0;
        }

        assert!(!tops.is_empty(), "expected at least one reposition");
        for pair in tops.windows(2) {
            assert_ne!(pair[0], pair[1], "vertical anchor must alternate");
        }
        assert!(tops[0], "first move flips to the top anchor");
    }

    #[test]
    fn repositions_stay_in_right_half() {
        let mut wm = overlay(4);
        let mut elapsed = 0.0;
        while elapsed < 60.0 {
            wm.update(elapsed, 60.0);
            let (x, _) = wm.anchor();
            assert!(x >= 1280.0 * 0.6 - 1.0);
            assert!(x <= 1280.0);
            elapsed += 0.5;
        }
    }

    #[test]
    fn identical_seeds_walk_identical_paths() {
        let mut a = overlay(9);
        let mut b = overlay(9);
        for step in 0..600 {
            let elapsed = f64::from(step) * 0.1;
            a.update(elapsed, 60.0);
            b.update(elapsed, 60.0);
            assert_eq!(a.anchor(), b.anchor());
        }
    }

    #[test]
    fn draw_leaves_ink_near_the_anchor() {
        let wm = overlay(5);
        let mut surface = PixelSurface::new(1280, 720);
        wm.draw(&mut surface);
        let mut ink = 0usize;
        for y in 600..720 {
            for x in 900..1280 {
                if surface.pixel(x, y)[3] > 0 {
                    ink += 1;
                }
            }
        }
        assert!(ink > 0, "watermark drew nothing");
    }
}
