use async_trait::async_trait;
use radarcast::{
    compositor::RasterSurface,
    core::viewport::SharedViewport,
    frames::source::{FrameList, StaticFrameSource},
    tiles::{TileDecoder, TileFetcher, TileImage, TileLoader, TileLoaderConfig},
    Frame, LatLng, MapEvent, Point, RadarMap, RadarProfile, Viewport,
};
use std::sync::Arc;
use std::time::Duration;

/// Offline "tile server": the URL itself is the payload
struct SyntheticFetcher;

#[async_trait]
impl TileFetcher for SyntheticFetcher {
    async fn fetch(&self, url: &str) -> radarcast::Result<Vec<u8>> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(url.as_bytes().to_vec())
    }
}

/// Paints each tile a colour derived from its URL
struct HashDecoder;

impl TileDecoder for HashDecoder {
    fn decode(&self, bytes: &[u8]) -> radarcast::Result<TileImage> {
        let hash = bytes
            .iter()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(*b as u32));
        let [r, g, b, _] = hash.to_le_bytes();
        Ok(Arc::new(image::RgbaImage::from_pixel(
            16,
            16,
            image::Rgba([r, g, b, 200]),
        )))
    }
}

/// Example of driving radarcast without a network or a UI
#[tokio::main]
async fn main() -> radarcast::Result<()> {
    radarcast::init_logging();
    println!("🌧️ Radarcast Headless Example");
    println!("=============================");

    let config = RadarProfile::Smooth.resolve();
    let viewport = Arc::new(SharedViewport::new(Viewport::new(
        LatLng::new(52.37, 4.89), // Amsterdam
        7.0,
        Point::new(800.0, 600.0),
    )));
    let radar = RasterSurface::shared(800, 600);
    let loader = TileLoader::with_decoder(
        Arc::new(SyntheticFetcher),
        Arc::new(HashDecoder),
        TileLoaderConfig::for_testing(),
    );

    let frames = (0..6)
        .map(|i| Frame::new(format!("/v2/radar/{}", 1_700_000_000 + i * 600), 1_700_000_000 + i * 600))
        .collect();
    let source = StaticFrameSource(FrameList {
        host: Some("https://radar.invalid".to_string()),
        frames,
    });

    let map = RadarMap::with_loader(
        config,
        loader,
        viewport.clone(),
        radar.clone(),
        RasterSurface::shared(800, 600),
    )
    .with_frame_sources(Arc::new(source), None);

    println!("\n📡 Fetching frames:");
    let outcome = map.refresh_frames().await;
    println!("   {} frames, first pass: {:?}", map.driver().frames().len(), outcome);

    println!("\n🔥 Prewarming every frame for the current view:");
    if let Some(prewarm) = map.handle_event(MapEvent::MoveEnd).await {
        prewarm.join().await;
    }
    let stats = map.loader().cache().stats();
    println!("   Cache: {:?}", stats);

    println!("\n▶️ Playing for two seconds:");
    map.play();
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let fade = map.driver().crossfade();
        println!(
            "   Frame {} (crossfade {:?})",
            map.driver().current_index(),
            fade.map(|fade| (fade.from(), fade.to(), fade.progress()))
        );
    }
    map.pause();

    println!("\n🚀 Panning east:");
    viewport.update(|viewport| viewport.pan(Point::new(200.0, 0.0)));
    map.handle_event(MapEvent::Move).await;
    let outcome = map.driver().render().await;
    println!("   Redrawn: {:?}", outcome);

    let painted = radar.lock().map(|surface| surface.painted_pixels()).unwrap_or(0);
    println!("\n📊 {} of {} pixels carry radar", painted, 800 * 600);

    map.destroy();
    println!("\n✅ Headless example completed successfully!");
    Ok(())
}
