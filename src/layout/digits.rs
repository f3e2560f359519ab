use crate::glyphs::atlas::GlyphAtlas;

/// Format whole seconds as `m:ss` (minutes unpadded, seconds zero-padded).
pub fn format_clock(total_secs: u64) -> String {
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

/// One character's draw command for the current frame: absolute output
/// pixel box plus the atlas source column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderItem {
    pub ch: char,
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
    pub src_x: u32,
}

/// Lay out the formatted clock string for `second`, centered on
/// `text_center`, using per-character advances from the atlas.
pub fn layout_line(atlas: &GlyphAtlas, text_center: (i32, i32), second: u64) -> Vec<RenderItem> {
    let text = format_clock(second);

    let total_width: u32 = text.chars().map(|ch| atlas.advance_for(ch)).sum();
    let start_x = (f64::from(text_center.0) - f64::from(total_width) / 2.0).round() as i32;
    let start_y = (f64::from(text_center.1) - f64::from(atlas.glyph_height()) / 2.0).round() as i32;

    let mut items = Vec::with_capacity(text.len());
    let mut x = start_x;
    for ch in text.chars() {
        let Some(slot) = atlas.slot(ch) else {
            continue;
        };
        items.push(RenderItem {
            ch,
            x,
            y: start_y,
            w: slot.width,
            h: atlas.glyph_height(),
            src_x: slot.x_offset,
        });
        x += slot.width as i32;
    }
    items
}

/// Draw-command cache keyed by the displayed integer second.
///
/// Layout is recomputed only when the second changes; transition renderers
/// interpolate between adjacent-second glyphs without touching layout.
#[derive(Clone, Debug, Default)]
pub struct DigitLine {
    second: Option<u64>,
    items: Vec<RenderItem>,
}

impl DigitLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, atlas: &GlyphAtlas, text_center: (i32, i32), second: u64) {
        if self.second == Some(second) {
            return;
        }
        self.items = layout_line(atlas, text_center, second);
        self.second = Some(second);
    }

    pub fn items(&self) -> &[RenderItem] {
        &self.items
    }
}
