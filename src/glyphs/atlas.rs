use std::collections::HashMap;

use crate::{
    config::Typography,
    foundation::core::Rgba8Premul,
    glyphs::font::{FontFace, RasterGlyph},
    render::surface::{IRect, PixelSurface},
};

/// Reference export height the configured font size is expressed against.
const TYPE_REFERENCE_HEIGHT: f64 = 1080.0;

/// Vertical headroom over the em size, covering ascenders/descenders.
const CELL_HEIGHT_FACTOR: f32 = 1.5;

/// Time separator baked into every atlas.
pub const SEPARATOR: char = ':';

/// Position of one character inside the atlas sprite sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlyphSlot {
    pub x_offset: u32,
    pub width: u32,
}

/// Pre-rasterized sprite sheet for `0`-`9` and the separator.
///
/// All ten digits share the same cell width (the maximum measured advance),
/// so a rolling digit never shifts its siblings. Shadow, when enabled, is
/// baked in once at build time; per-frame digit cost is a blit.
#[derive(Debug)]
pub struct GlyphAtlas {
    surface: PixelSurface,
    map: HashMap<char, GlyphSlot>,
    glyph_height: u32,
    digit_width: u32,
    separator_width: u32,
}

impl GlyphAtlas {
    /// Rasterize the clock alphabet for `typography` at `export_height`.
    #[tracing::instrument(skip(face, typography))]
    pub fn build(face: &FontFace, typography: &Typography, export_height: u32) -> Self {
        let scale = f64::from(export_height) / TYPE_REFERENCE_HEIGHT;
        let px = ((typography.font_size_px * scale).round() as f32).max(4.0);

        let digits: Vec<(char, RasterGlyph)> = ('0'..='9')
            .map(|ch| (ch, face.rasterize(ch, px)))
            .collect();
        let separator = face.rasterize(SEPARATOR, px);

        let digit_width = digits
            .iter()
            .map(|(_, g)| g.advance.ceil() as u32)
            .max()
            .unwrap_or(1)
            .max(1);
        let separator_width = (separator.advance.ceil() as u32).max(1);
        let glyph_height = ((px * CELL_HEIGHT_FACTOR).ceil() as u32).max(1);

        // Digits sit on a shared baseline placed so the tallest digit is
        // vertically centered in the cell.
        let cap_height = digits.iter().map(|(_, g)| g.height as u32).max().unwrap_or(0);
        let baseline = ((glyph_height + cap_height) / 2) as i32;

        let total_width = digit_width * 10 + separator_width + 20;
        let mut surface = PixelSurface::new(total_width, glyph_height);
        let mut map = HashMap::new();

        let shadow = typography.shadow.then(|| {
            let offset = ((px * 0.04) as i32).max(2);
            (offset, Rgba8Premul::from_straight_rgba(0, 0, 0, 204))
        });

        let mut glyphs = digits;
        glyphs.push((SEPARATOR, separator));

        let mut cursor_x = 0u32;
        for (ch, glyph) in &glyphs {
            let cell_width = if *ch == SEPARATOR {
                separator_width
            } else {
                digit_width
            };
            let x = cursor_x as i32 + (cell_width as i32 - glyph.width as i32) / 2;
            let y = baseline - glyph.height as i32 - glyph.ymin;

            if let Some((offset, color)) = shadow {
                stamp_coverage(&mut surface, glyph, x + offset, y + offset, color);
            }
            stamp_coverage(&mut surface, glyph, x, y, typography.color);

            map.insert(
                *ch,
                GlyphSlot {
                    x_offset: cursor_x,
                    width: cell_width,
                },
            );
            cursor_x += cell_width;
        }

        Self {
            surface,
            map,
            glyph_height,
            digit_width,
            separator_width,
        }
    }

    /// True when the atlas holds no usable glyphs (self-heal trigger: the
    /// digit layout updater rebuilds an empty atlas before use).
    pub fn is_empty(&self) -> bool {
        self.map.is_empty() || self.surface.is_empty()
    }

    pub fn surface(&self) -> &PixelSurface {
        &self.surface
    }

    /// Slot for `ch`, falling back to the `0` slot for unknown characters.
    pub fn slot(&self, ch: char) -> Option<GlyphSlot> {
        self.map.get(&ch).or_else(|| self.map.get(&'0')).copied()
    }

    pub fn src_rect(&self, slot: GlyphSlot) -> IRect {
        IRect::new(slot.x_offset as i32, 0, slot.width as i32, self.glyph_height as i32)
    }

    pub fn glyph_height(&self) -> u32 {
        self.glyph_height
    }

    pub fn digit_width(&self) -> u32 {
        self.digit_width
    }

    pub fn separator_width(&self) -> u32 {
        self.separator_width
    }

    pub fn advance_for(&self, ch: char) -> u32 {
        if ch == SEPARATOR {
            self.separator_width
        } else {
            self.digit_width
        }
    }
}

fn stamp_coverage(
    surface: &mut PixelSurface,
    glyph: &RasterGlyph,
    x: i32,
    y: i32,
    color: Rgba8Premul,
) {
    for row in 0..glyph.height {
        for col in 0..glyph.width {
            let cov = glyph.coverage[row * glyph.width + col];
            if cov == 0 {
                continue;
            }
            let src = modulate(color, cov);
            surface.put_pixel_over(i64::from(x) + col as i64, i64::from(y) + row as i64, src);
        }
    }
}

fn modulate(color: Rgba8Premul, coverage: u8) -> [u8; 4] {
    use crate::foundation::math::mul_div255_u8;
    let c = u16::from(coverage);
    [
        mul_div255_u8(u16::from(color.r), c),
        mul_div255_u8(u16::from(color.g), c),
        mul_div255_u8(u16::from(color.b), c),
        mul_div255_u8(u16::from(color.a), c),
    ]
}
