use std::path::Path;

use crate::{
    foundation::error::{TickdownError, TickdownResult},
    render::surface::PixelSurface,
};

/// Boundary to caller-owned background media.
///
/// The scheduler waits (bounded) for `is_ready`, calls `begin_playback`
/// once before warmup, pulls one frame per tick, and calls
/// `pause_and_rewind` during teardown — including on abort, so external
/// playback state is always reset.
pub trait MediaSource: Send {
    /// Native pixel dimensions, used for cover/fit layout.
    fn intrinsic_size(&self) -> (u32, u32);

    /// Source duration when the media is time-based (video-like sources).
    fn duration_secs(&self) -> Option<f64> {
        None
    }

    /// Whether the source can produce frames right now.
    fn is_ready(&self) -> bool {
        true
    }

    /// `rate` is a playback speed multiplier; `looped` requests wrap-around
    /// playback for sources shorter than the countdown.
    fn begin_playback(&mut self, _rate: f64, _looped: bool) {}

    /// The frame to composite for `elapsed_secs` into the countdown.
    fn frame_at(&mut self, elapsed_secs: f64) -> Option<&PixelSurface>;

    fn pause_and_rewind(&mut self) {}
}

/// Still-image media source (decoded once, same frame every tick).
#[derive(Debug)]
pub struct ImageSource {
    surface: PixelSurface,
}

impl ImageSource {
    pub fn from_bytes(bytes: &[u8]) -> TickdownResult<Self> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| TickdownError::render(format!("failed to decode image: {e}")))?;
        Self::from_rgba_image(decoded.to_rgba8())
    }

    pub fn from_path(path: impl AsRef<Path>) -> TickdownResult<Self> {
        use anyhow::Context as _;
        let bytes = std::fs::read(path.as_ref())
            .with_context(|| format!("read media from '{}'", path.as_ref().display()))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_surface(surface: PixelSurface) -> Self {
        Self { surface }
    }

    fn from_rgba_image(img: image::RgbaImage) -> TickdownResult<Self> {
        let (width, height) = img.dimensions();
        let mut data = img.into_raw();
        premultiply_rgba8_in_place(&mut data);
        let surface = PixelSurface::from_rgba8(width, height, data)
            .ok_or_else(|| TickdownError::render("decoded image buffer size mismatch"))?;
        Ok(Self { surface })
    }
}

impl MediaSource for ImageSource {
    fn intrinsic_size(&self) -> (u32, u32) {
        (self.surface.width(), self.surface.height())
    }

    fn frame_at(&mut self, _elapsed_secs: f64) -> Option<&PixelSurface> {
        Some(&self.surface)
    }
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    use crate::foundation::math::mul_div255_u8;
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 255 {
            continue;
        }
        px[0] = mul_div255_u8(u16::from(px[0]), a);
        px[1] = mul_div255_u8(u16::from(px[1]), a);
        px[2] = mul_div255_u8(u16::from(px[2]), a);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_surface_reports_intrinsic_size() {
        let mut src = ImageSource::from_surface(PixelSurface::new(32, 16));
        assert_eq!(src.intrinsic_size(), (32, 16));
        assert!(src.frame_at(0.0).is_some());
        assert!(src.is_ready());
    }

    #[test]
    fn decodes_png_bytes() {
        // 2x2 opaque red PNG, encoded through the same crate we decode with.
        let mut img = image::RgbaImage::new(2, 2);
        for px in img.pixels_mut() {
            *px = image::Rgba([255, 0, 0, 255]);
        }
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();

        let mut src = ImageSource::from_bytes(&bytes).unwrap();
        assert_eq!(src.intrinsic_size(), (2, 2));
        assert_eq!(src.frame_at(1.0).unwrap().pixel(0, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn semitransparent_pixels_are_premultiplied() {
        let mut img = image::RgbaImage::new(1, 1);
        img.put_pixel(0, 0, image::Rgba([255, 255, 255, 128]));
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();

        let mut src = ImageSource::from_bytes(&bytes).unwrap();
        assert_eq!(src.frame_at(0.0).unwrap().pixel(0, 0), [128, 128, 128, 128]);
    }

    #[test]
    fn invalid_bytes_error_cleanly() {
        assert!(ImageSource::from_bytes(&[0, 1, 2, 3]).is_err());
    }
}
