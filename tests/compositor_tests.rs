mod common;

use common::{two_by_two_bounds, RecordingSurface, SharedLog, SolidDecoder, StubFetcher, StubViewport};
use radarcast::compositor::{Compositor, PassLayer, PassOutcome, RasterSurface};
use radarcast::core::geo::GeoBounds;
use radarcast::tiles::{math, TileLoader, TileLoaderConfig, ZoomBand};
use radarcast::{Bounds, Frame, RadarConfig, RadarMap, RadarTileSource};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn loader(fetcher: Arc<StubFetcher>) -> TileLoader {
    TileLoader::with_decoder(fetcher, Arc::new(SolidDecoder), TileLoaderConfig::for_testing())
}

fn recording(width: u32, height: u32) -> (Arc<Mutex<RecordingSurface>>, SharedLog) {
    let surface = Arc::new(Mutex::new(RecordingSurface::new(width, height)));
    let log = surface.lock().unwrap().log.clone();
    (surface, log)
}

fn frame_layer(path: &str, opacity: f32) -> PassLayer {
    let tiles = RadarTileSource::default()
        .with_host("https://tiles.test")
        .for_frame(path);
    PassLayer::new(Arc::new(tiles), opacity)
}

fn expected_rects(viewport: &StubViewport, offset: f64) -> Vec<Bounds> {
    let mut rects = Vec::new();
    for x in 3..=4 {
        for y in 4..=5 {
            let b = math::tile_to_bounds(x, y, 4);
            rects.push(Bounds::new(
                viewport.project_with(offset, &b.north_west()),
                viewport.project_with(offset, &b.south_east()),
            ));
        }
    }
    rects
}

fn assert_same_rects(actual: &[(Bounds, f32)], expected: &[Bounds]) {
    assert_eq!(actual.len(), expected.len());
    for rect in expected {
        assert!(
            actual.iter().any(|(drawn, _)| {
                (drawn.min.x - rect.min.x).abs() < 1e-6
                    && (drawn.min.y - rect.min.y).abs() < 1e-6
                    && (drawn.max.x - rect.max.x).abs() < 1e-6
                    && (drawn.max.y - rect.max.y).abs() < 1e-6
            }),
            "missing {rect:?} in {actual:?}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_two_by_two_grid() {
    let fetcher = Arc::new(StubFetcher::default());
    let (surface, log) = recording(256, 256);
    let viewport = Arc::new(StubViewport::new(two_by_two_bounds(), 4.0, (256, 256)));

    let mut config = RadarConfig::default();
    config.compositor.padding_degrees = 0.0;
    let map = RadarMap::with_loader(
        config,
        loader(fetcher.clone()),
        viewport.clone(),
        surface,
        RasterSurface::shared(1, 1),
    );

    map.driver()
        .set_frames(vec![Frame::new("/a", 100), Frame::new("/b", 200)], None);
    let outcome = map.seek(1).await;

    assert_eq!(outcome, PassOutcome::Drawn { tiles: 4 });
    let log = log.lock().unwrap();
    assert_eq!(log.buffer_draws, 4);
    assert_eq!(log.blits, 1);
    assert!(log.direct.is_empty(), "tiles must never be drawn on the visible surface");
    assert_same_rects(&log.visible, &expected_rects(&viewport, 0.0));

    let urls = fetcher.urls();
    assert_eq!(urls.len(), 4);
    assert!(urls.iter().all(|url| url.starts_with("https://tiles.test/b/256/4/")));
}

#[tokio::test(start_paused = true)]
async fn test_stale_pass_never_reaches_surface() {
    let fetcher = Arc::new(StubFetcher::default().with_delay("/slow/", Duration::from_millis(200)));
    let (surface, log) = recording(256, 256);
    let compositor = Compositor::new(loader(fetcher), surface, ZoomBand::new(2, 12), 0.0);
    let viewport = StubViewport::new(two_by_two_bounds(), 4.0, (256, 256));

    let slow = [frame_layer("/slow", 0.3)];
    let fast = [frame_layer("/fast", 0.9)];
    let (first, second) = tokio::join!(
        compositor.composite(&viewport, &slow),
        compositor.composite(&viewport, &fast),
    );

    assert_eq!(first, PassOutcome::Stale);
    assert_eq!(second, PassOutcome::Drawn { tiles: 4 });

    let log = log.lock().unwrap();
    assert_eq!(log.blits, 1);
    assert_eq!(log.visible.len(), 4);
    assert!(log.visible.iter().all(|(_, opacity)| *opacity == 0.9));
}

#[tokio::test(start_paused = true)]
async fn test_earlier_pass_finishing_first_is_still_stale() {
    let fetcher = Arc::new(
        StubFetcher::default()
            .with_delay("/older/", Duration::from_millis(50))
            .with_delay("/newer/", Duration::from_millis(200)),
    );
    let (surface, log) = recording(256, 256);
    let compositor = Compositor::new(loader(fetcher), surface, ZoomBand::new(2, 12), 0.0);
    let viewport = StubViewport::new(two_by_two_bounds(), 4.0, (256, 256));

    let older = [frame_layer("/older", 0.3)];
    let newer = [frame_layer("/newer", 0.9)];
    let (first, second) = tokio::join!(
        compositor.composite(&viewport, &older),
        compositor.composite(&viewport, &newer),
    );

    assert_eq!(first, PassOutcome::Stale);
    assert_eq!(second, PassOutcome::Drawn { tiles: 4 });
    let log = log.lock().unwrap();
    assert_eq!(log.blits, 1);
    assert!(log.visible.iter().all(|(_, opacity)| *opacity == 0.9));
}

#[tokio::test(start_paused = true)]
async fn test_projection_is_captured_at_pass_start() {
    let fetcher = Arc::new(StubFetcher::default().with_delay("/a/", Duration::from_millis(50)));
    let (surface, log) = recording(256, 256);
    let compositor = Compositor::new(loader(fetcher), surface, ZoomBand::new(2, 12), 0.0);
    let viewport = StubViewport::new(two_by_two_bounds(), 4.0, (256, 256));

    let layers = [frame_layer("/a", 1.0)];
    let (outcome, _) = tokio::join!(compositor.composite(&viewport, &layers), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        // The map pans while tiles are loading
        viewport.set_offset(500.0);
    });

    assert_eq!(outcome, PassOutcome::Drawn { tiles: 4 });
    assert_same_rects(&log.lock().unwrap().visible, &expected_rects(&viewport, 0.0));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_passes_share_tile_requests() {
    let fetcher = Arc::new(StubFetcher::default().with_delay("/a/", Duration::from_millis(30)));
    let (surface, _) = recording(256, 256);
    let compositor = Compositor::new(loader(fetcher.clone()), surface, ZoomBand::new(2, 12), 0.0);
    let viewport = StubViewport::new(two_by_two_bounds(), 4.0, (256, 256));

    let layers = [frame_layer("/a", 1.0)];
    tokio::join!(
        compositor.composite(&viewport, &layers),
        compositor.composite(&viewport, &layers),
    );

    assert_eq!(fetcher.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_failed_tiles_leave_gaps() {
    let fetcher = Arc::new(StubFetcher::default());
    let (surface, log) = recording(256, 256);
    let compositor = Compositor::new(loader(fetcher.clone()), surface, ZoomBand::new(2, 12), 0.0);
    let viewport = StubViewport::new(two_by_two_bounds(), 4.0, (256, 256));

    let layers = [frame_layer("/fail", 1.0)];
    assert_eq!(
        compositor.composite(&viewport, &layers).await,
        PassOutcome::Drawn { tiles: 0 }
    );
    assert_eq!(log.lock().unwrap().blits, 1);

    // Failures are cached, so the next pass makes no requests
    let calls = fetcher.calls();
    compositor.composite(&viewport, &layers).await;
    assert_eq!(fetcher.calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_zero_size_surface_is_a_noop() {
    let fetcher = Arc::new(StubFetcher::default());
    let (surface, log) = recording(0, 0);
    let compositor = Compositor::new(loader(fetcher.clone()), surface, ZoomBand::new(2, 12), 0.0);
    let viewport = StubViewport::new(two_by_two_bounds(), 4.0, (0, 0));

    let outcome = compositor.composite(&viewport, &[frame_layer("/a", 1.0)]).await;

    assert_eq!(outcome, PassOutcome::Skipped);
    assert_eq!(fetcher.calls(), 0);
    assert_eq!(log.lock().unwrap().blits, 0);
}

#[tokio::test(start_paused = true)]
async fn test_buffer_is_reused_until_resize() {
    let fetcher = Arc::new(StubFetcher::default());
    let (surface, log) = recording(256, 256);
    let compositor = Compositor::new(loader(fetcher), surface, ZoomBand::new(2, 12), 0.0);
    let viewport = StubViewport::new(two_by_two_bounds(), 4.0, (256, 256));
    let layers = [frame_layer("/a", 1.0)];

    compositor.composite(&viewport, &layers).await;
    compositor.composite(&viewport, &layers).await;
    assert_eq!(log.lock().unwrap().buffers_created, 1);

    compositor.resize(512, 256);
    compositor.composite(&viewport, &layers).await;
    assert_eq!(log.lock().unwrap().buffers_created, 2);
}

#[tokio::test(start_paused = true)]
async fn test_compare_ghost_is_painted_after_primary() {
    let fetcher = Arc::new(StubFetcher::default());
    let (surface, log) = recording(256, 256);
    let viewport = Arc::new(StubViewport::new(two_by_two_bounds(), 4.0, (256, 256)));

    let mut config = RadarConfig::default();
    config.compositor.padding_degrees = 0.0;
    config.compositor.compare = true;
    let map = RadarMap::with_loader(config, loader(fetcher), viewport, surface, RasterSurface::shared(1, 1));
    map.set_frames(vec![Frame::new("/a", 100), Frame::new("/b", 200)], None)
        .await;

    let log = log.lock().unwrap();
    let opacities: Vec<f32> = log.visible.iter().map(|(_, opacity)| *opacity).collect();
    assert_eq!(opacities.len(), 8);
    assert!(opacities[..4].iter().all(|o| *o == 0.75));
    assert!(opacities[4..].iter().all(|o| *o == 0.28));
}

#[tokio::test(start_paused = true)]
async fn test_antimeridian_window_draws_both_sides() {
    let fetcher = Arc::new(StubFetcher::default());
    let surface = RasterSurface::shared(256, 256);
    let compositor = Compositor::new(loader(fetcher.clone()), surface, ZoomBand::new(2, 12), 0.0);
    let viewport = StubViewport::new(GeoBounds::new(170.0, -170.0, 10.0, -10.0), 3.0, (256, 256));

    let outcome = compositor.composite(&viewport, &[frame_layer("/a", 1.0)]).await;

    let columns: std::collections::BTreeSet<String> = fetcher
        .urls()
        .iter()
        .map(|url| url.split('/').nth(6).unwrap_or_default().to_string())
        .collect();
    assert_eq!(columns.into_iter().collect::<Vec<_>>(), vec!["0", "7"]);
    assert!(matches!(outcome, PassOutcome::Drawn { tiles } if tiles == fetcher.calls()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pass_superseded_while_waiting_for_surface_is_stale() {
    let fetcher = Arc::new(StubFetcher::default().with_delay("/a/", Duration::from_millis(50)));
    let (surface, log) = recording(256, 256);
    let compositor = Arc::new(Compositor::new(loader(fetcher), surface.clone(), ZoomBand::new(2, 12), 0.0));
    let viewport = Arc::new(StubViewport::new(two_by_two_bounds(), 4.0, (256, 256)));

    let pass = {
        let compositor = Arc::clone(&compositor);
        let viewport = Arc::clone(&viewport);
        tokio::spawn(async move {
            let layers = [frame_layer("/a", 1.0)];
            compositor.composite(&*viewport, &layers).await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Tiles arrive while the surface is busy; the pass blocks on it
    let guard = surface.lock().unwrap();
    std::thread::sleep(Duration::from_millis(200));
    compositor.invalidate();
    drop(guard);

    assert_eq!(pass.await.unwrap(), PassOutcome::Stale);
    assert_eq!(log.lock().unwrap().blits, 0);
}
