//! Drawing surfaces the compositor paints into.

use crate::core::bounds::Bounds;
use crate::prelude::{Arc, Mutex};
use image::{Rgba, RgbaImage};

/// A 2D target that can take scaled, translucent image draws.
pub trait Canvas: Send {
    /// Size in pixels
    fn size(&self) -> (u32, u32);

    /// Reset every pixel to transparent
    fn clear(&mut self);

    /// Draw `image` scaled into `rect` (pixel space, may extend past the
    /// edges) at `opacity` in `0..=1`.
    fn draw_image(&mut self, image: &RgbaImage, rect: Bounds, opacity: f32);

    /// Pixel data, for surfaces that keep it in memory
    fn as_raster(&self) -> Option<&RgbaImage> {
        None
    }
}

/// The visible surface. Creates its own off-screen buffers and copies a
/// finished buffer onto itself in one operation.
pub trait RenderSurface: Canvas {
    fn create_buffer(&self, width: u32, height: u32) -> Box<dyn Canvas>;

    /// Composite a finished buffer onto this surface
    fn blit(&mut self, buffer: &dyn Canvas);

    /// Called when the host container changes size
    fn resize(&mut self, width: u32, height: u32);
}

/// A render surface shared between the compositor and the host
pub type SharedSurface = Arc<Mutex<dyn RenderSurface>>;

/// In-memory surface backed by an `image::RgbaImage`.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    image: RgbaImage,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn shared(width: u32, height: u32) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new(width, height)))
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Number of pixels with any coverage
    pub fn painted_pixels(&self) -> usize {
        self.image.pixels().filter(|pixel| pixel.0[3] > 0).count()
    }
}

impl Canvas for RasterSurface {
    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn draw_image(&mut self, image: &RgbaImage, rect: Bounds, opacity: f32) {
        let opacity = opacity.clamp(0.0, 1.0);
        let (src_w, src_h) = image.dimensions();
        if !rect.is_drawable() || opacity == 0.0 || src_w == 0 || src_h == 0 {
            return;
        }
        let target = Bounds::from_size(self.image.width(), self.image.height());
        let Some(visible) = rect.intersection(&target) else {
            return;
        };

        // Nearest-neighbour sampling over the visible part only
        let x0 = visible.min.x.floor().max(0.0) as u32;
        let y0 = visible.min.y.floor().max(0.0) as u32;
        let x1 = (visible.max.x.ceil() as u32).min(self.image.width());
        let y1 = (visible.max.y.ceil() as u32).min(self.image.height());
        let scale_x = src_w as f64 / rect.width();
        let scale_y = src_h as f64 / rect.height();

        for y in y0..y1 {
            let sy = ((y as f64 + 0.5 - rect.min.y) * scale_y).floor();
            if sy < 0.0 || sy >= src_h as f64 {
                continue;
            }
            for x in x0..x1 {
                let sx = ((x as f64 + 0.5 - rect.min.x) * scale_x).floor();
                if sx < 0.0 || sx >= src_w as f64 {
                    continue;
                }
                let src = image.get_pixel(sx as u32, sy as u32);
                let dst = self.image.get_pixel_mut(x, y);
                *dst = blend(*dst, *src, opacity);
            }
        }
    }

    fn as_raster(&self) -> Option<&RgbaImage> {
        Some(&self.image)
    }
}

impl RenderSurface for RasterSurface {
    fn create_buffer(&self, width: u32, height: u32) -> Box<dyn Canvas> {
        Box::new(RasterSurface::new(width, height))
    }

    fn blit(&mut self, buffer: &dyn Canvas) {
        match buffer.as_raster() {
            Some(raster) => image::imageops::overlay(&mut self.image, raster, 0, 0),
            None => log::warn!("cannot blit a buffer without pixel data"),
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.image.dimensions() != (width, height) {
            self.image = RgbaImage::new(width, height);
        }
    }
}

/// Source-over blend of `src` (scaled by `opacity`) onto `dst`
fn blend(dst: Rgba<u8>, src: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let src_a = src.0[3] as f32 / 255.0 * opacity;
    if src_a <= 0.0 {
        return dst;
    }
    let dst_a = dst.0[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);

    let mut out = [0u8; 4];
    for channel in 0..3 {
        let value = (src.0[channel] as f32 * src_a + dst.0[channel] as f32 * dst_a * (1.0 - src_a)) / out_a;
        out[channel] = value.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}
