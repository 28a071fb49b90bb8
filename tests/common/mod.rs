//! Shared stubs for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use radarcast::compositor::{Canvas, RenderSurface};
use radarcast::core::geo::{GeoBounds, LatLng, Point};
use radarcast::core::viewport::{Projector, ViewportProvider};
use radarcast::tiles::fetch::{TileDecoder, TileFetcher, TileImage};
use radarcast::{Bounds, RadarError, Result};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Fetcher that counts calls, fails URLs containing "fail" and delays URLs
/// matching a configured substring.
#[derive(Default)]
pub struct StubFetcher {
    pub calls: AtomicUsize,
    pub urls: Mutex<Vec<String>>,
    pub delays: Mutex<Vec<(String, Duration)>>,
}

impl StubFetcher {
    pub fn with_delay(self, needle: &str, delay: Duration) -> Self {
        self.delays.lock().unwrap().push((needle.to_string(), delay));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TileFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());

        let delay = self
            .delays
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| url.contains(needle.as_str()))
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if url.contains("fail") {
            return Err(RadarError::HttpStatus {
                status: 404,
                url: url.to_string(),
            });
        }
        Ok(url.as_bytes().to_vec())
    }
}

/// Decodes anything into an opaque 4x4 tile
pub struct SolidDecoder;

impl TileDecoder for SolidDecoder {
    fn decode(&self, _bytes: &[u8]) -> Result<TileImage> {
        Ok(Arc::new(RgbaImage::from_pixel(4, 4, Rgba([0, 120, 255, 255]))))
    }
}

/// Everything the recording surface and its buffers saw
#[derive(Debug, Default)]
pub struct DrawLog {
    /// Draws into the current off-screen buffer since its last clear
    pub buffer: Vec<(Bounds, f32)>,
    /// Draws made directly on the visible surface
    pub direct: Vec<(Bounds, f32)>,
    /// What the visible surface currently shows
    pub visible: Vec<(Bounds, f32)>,
    pub buffer_draws: usize,
    pub buffers_created: usize,
    pub blits: usize,
}

pub type SharedLog = Arc<Mutex<DrawLog>>;

pub struct RecordingBuffer {
    size: (u32, u32),
    log: SharedLog,
}

impl Canvas for RecordingBuffer {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn clear(&mut self) {
        self.log.lock().unwrap().buffer.clear();
    }

    fn draw_image(&mut self, _image: &RgbaImage, rect: Bounds, opacity: f32) {
        let mut log = self.log.lock().unwrap();
        log.buffer.push((rect, opacity));
        log.buffer_draws += 1;
    }
}

pub struct RecordingSurface {
    pub size: (u32, u32),
    pub log: SharedLog,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            log: SharedLog::default(),
        }
    }
}

impl Canvas for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn clear(&mut self) {
        self.log.lock().unwrap().visible.clear();
    }

    fn draw_image(&mut self, _image: &RgbaImage, rect: Bounds, opacity: f32) {
        self.log.lock().unwrap().direct.push((rect, opacity));
    }
}

impl RenderSurface for RecordingSurface {
    fn create_buffer(&self, width: u32, height: u32) -> Box<dyn Canvas> {
        self.log.lock().unwrap().buffers_created += 1;
        Box::new(RecordingBuffer {
            size: (width, height),
            log: self.log.clone(),
        })
    }

    fn blit(&mut self, _buffer: &dyn Canvas) {
        let mut log = self.log.lock().unwrap();
        log.visible = log.buffer.clone();
        log.blits += 1;
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }
}

/// Viewport with fixed bounds and a linear projection that reads a shared
/// x offset every time it is called, like a live map.
pub struct StubViewport {
    pub bounds: GeoBounds,
    pub zoom: f64,
    pub size: (u32, u32),
    pub offset_x: Arc<AtomicU64>,
}

impl StubViewport {
    pub fn new(bounds: GeoBounds, zoom: f64, size: (u32, u32)) -> Self {
        Self {
            bounds,
            zoom,
            size,
            offset_x: Arc::new(AtomicU64::new(0f64.to_bits())),
        }
    }

    pub fn set_offset(&self, offset: f64) {
        self.offset_x.store(offset.to_bits(), Ordering::SeqCst);
    }

    /// The stub projection with a fixed offset
    pub fn project_with(&self, offset: f64, lat_lng: &LatLng) -> Point {
        Point::new(
            (lat_lng.lng - self.bounds.west) * 10.0 + offset,
            (self.bounds.north - lat_lng.lat) * 10.0,
        )
    }
}

impl ViewportProvider for StubViewport {
    fn projector(&self) -> Projector {
        let offset = self.offset_x.clone();
        let (west, north) = (self.bounds.west, self.bounds.north);
        Arc::new(move |lat_lng: &LatLng| {
            let offset = f64::from_bits(offset.load(Ordering::SeqCst));
            Point::new((lat_lng.lng - west) * 10.0 + offset, (north - lat_lng.lat) * 10.0)
        })
    }

    fn bounds(&self) -> GeoBounds {
        self.bounds
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }
}

/// Bounds inside tiles (3..=4, 4..=5) at z=4
pub fn two_by_two_bounds() -> GeoBounds {
    GeoBounds::new(-100.0, -80.0, 60.0, 50.0)
}
