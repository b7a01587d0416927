//! Width x height RGBA raster used for the surface's double buffers.
//!
//! Pixels are stored straight (non-premultiplied) in an `image::RgbaImage`.
//! Blending helpers convert to premultiplied space internally so that mixing a
//! transparent pixel with an opaque one never produces dark fringes.

use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::errors::MediaError;
use crate::model::{Color, Dimensions, Rect};

#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    /// Allocates a fully transparent buffer.
    pub fn new(dimensions: Dimensions) -> Self {
        Self { image: RgbaImage::new(dimensions.width, dimensions.height) }
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.image.width(), self.image.height())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Reallocates to `dimensions` (blank) if the size differs. Returns true
    /// if a reallocation happened.
    pub fn ensure_dimensions(&mut self, dimensions: Dimensions) -> bool {
        if self.dimensions() == dimensions {
            return false;
        }
        self.image = RgbaImage::new(dimensions.width, dimensions.height);
        true
    }

    /// Blanks every pixel to transparent.
    pub fn clear(&mut self) {
        self.fill(Color::TRANSPARENT);
    }

    pub fn fill(&mut self, color: Color) {
        let px = Rgba(color.to_array());
        for p in self.image.pixels_mut() {
            *p = px;
        }
    }

    pub fn is_blank(&self) -> bool {
        self.image.pixels().all(|p| p.0[3] == 0)
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    /// Overwrites this buffer's pixels with `other`'s. Sizes must match;
    /// a mismatched source reallocates this buffer to the source size.
    pub fn copy_from(&mut self, other: &PixelBuffer) {
        if self.dimensions() != other.dimensions() {
            self.image = other.image.clone();
        } else {
            self.image.copy_from_slice(other.image.as_raw());
        }
    }

    /// Blends `color` over every pixel of `rect` (clipped to the buffer).
    pub fn fill_rect(&mut self, rect: Rect, color: Color, opacity: f32) {
        let Some((x0, y0, x1, y1)) = self.clip(rect) else { return };
        let src = color.to_array();
        for y in y0..y1 {
            for x in x0..x1 {
                let dst = self.image.get_pixel_mut(x, y);
                dst.0 = over(dst.0, src, opacity);
            }
        }
    }

    /// Draws `source` scaled (nearest neighbour) into `rect`, blending over
    /// existing content.
    pub fn draw_image(&mut self, source: &RgbaImage, rect: Rect, opacity: f32) {
        if source.width() == 0 || source.height() == 0 {
            return;
        }
        let Some((x0, y0, x1, y1)) = self.clip(rect) else { return };
        let sx = source.width() as f32 / rect.width as f32;
        let sy = source.height() as f32 / rect.height as f32;
        for y in y0..y1 {
            let v = (((y as i64 - rect.y as i64) as f32 + 0.5) * sy) as u32;
            let v = v.min(source.height() - 1);
            for x in x0..x1 {
                let u = (((x as i64 - rect.x as i64) as f32 + 0.5) * sx) as u32;
                let u = u.min(source.width() - 1);
                let src = source.get_pixel(u, v).0;
                let dst = self.image.get_pixel_mut(x, y);
                dst.0 = over(dst.0, src, opacity);
            }
        }
    }

    /// Blends an equally-sized buffer over this one.
    pub fn draw_over(&mut self, source: &PixelBuffer, opacity: f32) {
        if source.dimensions() != self.dimensions() {
            log::warn!(
                "draw_over size mismatch: {} onto {}; skipping",
                source.dimensions(),
                self.dimensions()
            );
            return;
        }
        for (dst, src) in self.image.pixels_mut().zip(source.image.pixels()) {
            dst.0 = over(dst.0, src.0, opacity);
        }
    }

    /// Writes a raw pixel without blending. Out-of-bounds writes are ignored.
    pub fn put_pixel(&mut self, x: u32, y: u32, px: [u8; 4]) {
        if x < self.width() && y < self.height() {
            self.image.put_pixel(x, y, Rgba(px));
        }
    }

    /// Blends a raw pixel. Out-of-bounds writes are ignored.
    pub fn blend_pixel(&mut self, x: u32, y: u32, px: [u8; 4], opacity: f32) {
        if x < self.width() && y < self.height() {
            let dst = self.image.get_pixel_mut(x, y);
            dst.0 = over(dst.0, px, opacity);
        }
    }

    #[must_use = "saving a frame can fail; the Result must be handled"]
    pub fn save_png(&self, path: &Path) -> Result<(), MediaError> {
        self.image.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }

    fn clip(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let x0 = (rect.x as i64).clamp(0, self.width() as i64);
        let y0 = (rect.y as i64).clamp(0, self.height() as i64);
        let x1 = rect.right().clamp(0, self.width() as i64);
        let y1 = rect.bottom().clamp(0, self.height() as i64);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

/// Straight-alpha source-over with an extra opacity multiplier.
pub fn over(dst: [u8; 4], src: [u8; 4], opacity: f32) -> [u8; 4] {
    let sa = (src[3] as f32 / 255.0) * opacity.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return dst;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return [0, 0, 0, 0];
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let sc = src[c] as f32 * sa;
        let dc = dst[c] as f32 * da * (1.0 - sa);
        out[c] = ((sc + dc) / out_a).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    out
}

/// Mixes two straight-alpha pixels in premultiplied space: `t = 0` is `a`,
/// `t = 1` is `b`.
pub fn mix(a: [u8; 4], b: [u8; 4], t: f32) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    let aa = a[3] as f32 / 255.0;
    let ba = b[3] as f32 / 255.0;
    let out_a = aa + (ba - aa) * t;
    if out_a <= 0.0 {
        return [0, 0, 0, 0];
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let ap = a[c] as f32 * aa;
        let bp = b[c] as f32 * ba;
        out[c] = ((ap + (bp - ap) * t) / out_a).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    out
}
