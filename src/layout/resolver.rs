use crate::{
    config::{BackgroundKind, RenderConfig},
    foundation::core::{Canvas, Rgba8Premul},
    render::surface::IRect,
};

/// Reference height media pan/zoom values are expressed against (the editing
/// preview scale). Using a fixed reference instead of any live display size
/// makes identical configs resolve to identical pixel geometry everywhere.
pub const MEDIA_REFERENCE_HEIGHT: f64 = 800.0;

/// Background geometry resolved to absolute output pixels.
#[derive(Clone, Debug, PartialEq)]
pub enum BackgroundLayout {
    Solid { color: Rgba8Premul },
    Gradient { from: Rgba8Premul, to: Rgba8Premul },
    Media { dest: IRect },
}

/// Per-session geometry: background placement plus the digit block's center
/// anchor, all rounded to integer pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedLayout {
    pub background: BackgroundLayout,
    pub text_center: (i32, i32),
}

/// Compute output dimensions from the configured height and aspect ratio.
/// Width is forced even (required by yuv420p encoder output).
pub fn export_dimensions(config: &RenderConfig) -> Canvas {
    let height = config.export_height;
    let width = ((f64::from(height) * config.aspect.as_f64()).round() as u32) & !1;
    Canvas {
        width: width.max(2),
        height,
    }
}

/// Resolve percentage-based config placement into absolute pixel geometry
/// for `canvas`. Pure: depends only on the config and the export size.
pub fn resolve_layout(config: &RenderConfig, canvas: Canvas) -> ResolvedLayout {
    let width = f64::from(canvas.width);
    let height = f64::from(canvas.height);

    let background = match &config.background {
        BackgroundKind::Solid { color } => BackgroundLayout::Solid { color: *color },
        BackgroundKind::Gradient { from, to } => BackgroundLayout::Gradient {
            from: *from,
            to: *to,
        },
        BackgroundKind::Media { transform } => {
            let scale_factor = height / MEDIA_REFERENCE_HEIGHT;
            let final_scale = transform.scale * scale_factor;
            let dw = (f64::from(transform.intrinsic_width) * final_scale).round();
            let dh = (f64::from(transform.intrinsic_height) * final_scale).round();
            // Rounding to whole pixels avoids sub-pixel blur when blitting.
            let dx = (width / 2.0 + transform.offset.x * scale_factor - dw / 2.0).round();
            let dy = (height / 2.0 + transform.offset.y * scale_factor - dh / 2.0).round();
            BackgroundLayout::Media {
                dest: IRect::new(dx as i32, dy as i32, dw as i32, dh as i32),
            }
        }
    };

    let text_x = (width / 2.0 + config.text_offset_pct.x * (width / 100.0)).round() as i32;
    let text_y = (height / 2.0 + config.text_offset_pct.y * (height / 100.0)).round() as i32;

    ResolvedLayout {
        background,
        text_center: (text_x, text_y),
    }
}
