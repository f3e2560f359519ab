use rayon::prelude::*;

use crate::foundation::{core::Rgba8Premul, math::mul_div255_u16};

/// Integer pixel rectangle used for source regions and clips.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl IRect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn intersect(self, other: Self) -> Self {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.w).min(other.x + other.w);
        let y1 = (self.y + self.h).min(other.y + other.h);
        Self {
            x: x0,
            y: y0,
            w: (x1 - x0).max(0),
            h: (y1 - y0).max(0),
        }
    }

    pub fn is_empty(self) -> bool {
        self.w <= 0 || self.h <= 0
    }
}

/// Sub-pixel destination rectangle for sprite draws.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpriteRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl SpriteRect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }
}

/// The shared output surface: row-major premultiplied RGBA8.
///
/// During capture the frame compositor is the only writer and the encoder
/// sink the only reader; both roles are enforced by borrows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelSurface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; (width as usize) * (height as usize) * 4],
        }
    }

    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn bounds(&self) -> IRect {
        IRect::new(0, 0, self.width as i32, self.height as i32)
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    pub(crate) fn put_pixel_over(&mut self, x: i64, y: i64, src: [u8; 4]) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let dst = [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]];
        let out = over(dst, src, 1.0);
        self.data[i..i + 4].copy_from_slice(&out);
    }

    /// Fill the whole surface with one color.
    pub fn fill(&mut self, color: Rgba8Premul) {
        let px = color.as_array();
        for chunk in self.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
    }

    /// Linear gradient along the top-left to bottom-right diagonal, matching
    /// a gradient line from (0,0) to (width,height).
    pub fn fill_diagonal_gradient(&mut self, from: Rgba8Premul, to: Rgba8Premul) {
        if self.is_empty() {
            return;
        }
        let w = f64::from(self.width);
        let h = f64::from(self.height);
        let denom = (w * w + h * h).max(1.0);
        let a = from.as_array();
        let b = to.as_array();
        let width = self.width as usize;

        self.data
            .par_chunks_exact_mut(width * 4)
            .enumerate()
            .for_each(|(y, row)| {
                let yh = (y as f64) * h;
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let t = ((x as f64) * w + yh) / denom;
                    for c in 0..4 {
                        let v = f64::from(a[c]) + (f64::from(b[c]) - f64::from(a[c])) * t;
                        px[c] = v.round().clamp(0.0, 255.0) as u8;
                    }
                }
            });
    }

    /// Opaque scaled blit for media backgrounds (nearest neighbor, replaces
    /// covered pixels). `dst` may extend past the surface; it is clipped.
    pub fn blit_scaled_opaque(&mut self, src: &Self, dst: IRect) {
        if src.is_empty() || dst.is_empty() {
            return;
        }
        let clipped = dst.intersect(self.bounds());
        if clipped.is_empty() {
            return;
        }

        let width = self.width as usize;
        let src_w = src.width as i64;
        let src_h = src.height as i64;
        let y0 = clipped.y as usize;
        let y1 = (clipped.y + clipped.h) as usize;

        self.data[y0 * width * 4..y1 * width * 4]
            .par_chunks_exact_mut(width * 4)
            .enumerate()
            .for_each(|(row_idx, row)| {
                let y = (y0 + row_idx) as i64;
                let sy = ((y - i64::from(dst.y)) * src_h / i64::from(dst.h)).clamp(0, src_h - 1);
                for x in clipped.x..clipped.x + clipped.w {
                    let sx = ((i64::from(x) - i64::from(dst.x)) * src_w / i64::from(dst.w))
                        .clamp(0, src_w - 1);
                    let si = ((sy as usize) * (src.width as usize) + (sx as usize)) * 4;
                    let di = (x as usize) * 4;
                    row[di..di + 4].copy_from_slice(&src.data[si..si + 4]);
                }
            });
    }

    /// Composite a sprite region over the surface.
    ///
    /// Nearest-neighbor sampling; when `dst` is integer-aligned and the same
    /// size as `src_rect` the mapping is exact, so an unscaled draw is
    /// byte-identical to a direct blit. `brightness` scales color channels
    /// only (premultiplied data stays valid for factors <= 1).
    pub fn draw_sprite(
        &mut self,
        src: &Self,
        src_rect: IRect,
        dst: SpriteRect,
        opacity: f32,
        brightness: f32,
        clip: Option<IRect>,
    ) {
        if src.is_empty() || src_rect.is_empty() {
            return;
        }
        if !(dst.w > 0.0 && dst.h > 0.0) || opacity <= 0.0 {
            return;
        }

        let mut region = IRect::new(
            dst.x.floor() as i32,
            dst.y.floor() as i32,
            (dst.x + dst.w).ceil() as i32 - dst.x.floor() as i32,
            (dst.y + dst.h).ceil() as i32 - dst.y.floor() as i32,
        )
        .intersect(self.bounds());
        if let Some(clip) = clip {
            region = region.intersect(clip);
        }
        if region.is_empty() {
            return;
        }

        let brightness = brightness.clamp(0.0, 1.0);
        for y in region.y..region.y + region.h {
            let fy = (f64::from(y) + 0.5 - dst.y) / dst.h;
            if !(0.0..1.0).contains(&fy) {
                continue;
            }
            let sy = src_rect.y + (fy * f64::from(src_rect.h)).floor() as i32;
            if sy < src_rect.y || sy >= src_rect.y + src_rect.h || sy < 0 || sy >= src.height as i32
            {
                continue;
            }
            for x in region.x..region.x + region.w {
                let fx = (f64::from(x) + 0.5 - dst.x) / dst.w;
                if !(0.0..1.0).contains(&fx) {
                    continue;
                }
                let sx = src_rect.x + (fx * f64::from(src_rect.w)).floor() as i32;
                if sx < src_rect.x
                    || sx >= src_rect.x + src_rect.w
                    || sx < 0
                    || sx >= src.width as i32
                {
                    continue;
                }

                let si = ((sy as usize) * (src.width as usize) + (sx as usize)) * 4;
                let mut s = [
                    src.data[si],
                    src.data[si + 1],
                    src.data[si + 2],
                    src.data[si + 3],
                ];
                if brightness < 1.0 {
                    let b = (f64::from(brightness) * 255.0).round() as u16;
                    s[0] = mul_div255_u16(u16::from(s[0]), b) as u8;
                    s[1] = mul_div255_u16(u16::from(s[1]), b) as u8;
                    s[2] = mul_div255_u16(u16::from(s[2]), b) as u8;
                }

                let di = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
                let d = [
                    self.data[di],
                    self.data[di + 1],
                    self.data[di + 2],
                    self.data[di + 3],
                ];
                let out = over(d, s, opacity);
                self.data[di..di + 4].copy_from_slice(&out);
            }
        }
    }

    /// Unscaled sprite blit at an integer position.
    pub fn blit(&mut self, src: &Self, src_rect: IRect, dst_x: i32, dst_y: i32) {
        self.draw_sprite(
            src,
            src_rect,
            SpriteRect::new(
                f64::from(dst_x),
                f64::from(dst_y),
                f64::from(src_rect.w),
                f64::from(src_rect.h),
            ),
            1.0,
            1.0,
            None,
        );
    }
}

/// Source-over for premultiplied RGBA8 with an extra opacity factor.
pub(crate) fn over(dst: [u8; 4], src: [u8; 4], opacity: f32) -> [u8; 4] {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255_u16(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - sa;
    let mut out = [0u8; 4];
    out[3] = (sa as u8).saturating_add(mul_div255_u16(u16::from(dst[3]), inv) as u8);
    for i in 0..3 {
        let sc = mul_div255_u16(u16::from(src[i]), op);
        let dc = mul_div255_u16(u16::from(dst[i]), inv);
        out[i] = (sc as u8).saturating_add(dc as u8);
    }
    out
}
