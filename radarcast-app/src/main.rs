use anyhow::{anyhow, bail, Context};
use clap::{Parser, ValueEnum};
use radarcast::{
    core::viewport::SharedViewport,
    frames::source::RainViewerSource,
    tiles::fetch::HttpTileFetcher,
    LatLng, OverlayLayer, PassOutcome, Point, RadarConfig, RadarMap, RadarProfile, RasterSurface, Viewport,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Headless radar renderer: fetches the latest frames, composites the
/// newest one over a viewport and writes the result as a PNG.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = Options::parse();
    let config = options.config()?;
    let (width, height) = options.size;
    log::info!(
        "rendering {}x{} around {:.4}, {:.4} at zoom {}",
        width,
        height,
        options.lat,
        options.lng,
        options.zoom
    );

    let viewport = SharedViewport::new(Viewport::new(
        options.center(),
        options.zoom,
        Point::new(width as f64, height as f64),
    ));
    let radar = RasterSurface::shared(width, height);
    let overlay = RasterSurface::shared(width, height);

    let map = RadarMap::new(
        config,
        Arc::new(HttpTileFetcher),
        Arc::new(viewport),
        radar.clone(),
        overlay.clone(),
    )
    .with_frame_sources(Arc::new(RainViewerSource::default()), None);
    let notices = map.notices();

    let outcome = map.refresh_frames().await;
    for notice in notices.try_iter() {
        log::warn!("{}", notice);
    }
    match outcome {
        Some(PassOutcome::Drawn { tiles }) => log::info!("drew {} radar tiles", tiles),
        Some(other) => log::warn!("radar pass finished as {:?}", other),
        None => bail!("no radar frames available"),
    }

    if let Some(layer) = options.overlay {
        let outcome = map.select_overlay(Some(layer)).await;
        log::info!("overlay {}: {:?}", layer, outcome);
    }

    if options.play {
        map.play();
        log::info!("playing {} frames, press Ctrl-C to stop", map.driver().frames().len());
        tokio::signal::ctrl_c().await?;
        map.pause();
        map.driver().render().await;
    }

    let image = flatten(&radar, &overlay)?;
    image
        .save(&options.output)
        .with_context(|| format!("writing {}", options.output.display()))?;
    log::info!("saved {}", options.output.display());

    map.destroy();
    Ok(())
}

/// Overlay surface on top of the radar surface
fn flatten(radar: &Mutex<RasterSurface>, overlay: &Mutex<RasterSurface>) -> anyhow::Result<image::RgbaImage> {
    let mut image = radar
        .lock()
        .map_err(|_| anyhow!("radar surface lock poisoned"))?
        .image()
        .clone();
    let overlay = overlay
        .lock()
        .map_err(|_| anyhow!("overlay surface lock poisoned"))?;
    image::imageops::overlay(&mut image, overlay.image(), 0, 0);
    Ok(image)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Profile {
    Balanced,
    LowBandwidth,
    Smooth,
}

impl From<Profile> for RadarProfile {
    fn from(profile: Profile) -> Self {
        match profile {
            Profile::Balanced => RadarProfile::Balanced,
            Profile::LowBandwidth => RadarProfile::LowBandwidth,
            Profile::Smooth => RadarProfile::Smooth,
        }
    }
}

/// `WIDTHxHEIGHT` in pixels
fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let w = w.parse().map_err(|e| format!("width: {e}"))?;
    let h = h.parse().map_err(|e| format!("height: {e}"))?;
    Ok((w, h))
}

#[derive(Debug, Parser)]
#[command(name = "radarcast")]
#[command(version, about = "Render the latest weather radar frame to a PNG", long_about = None)]
struct Options {
    /// JSON config file; overrides --profile
    #[arg(long)]
    config: Option<PathBuf>,

    /// Preset used when no config file is given
    #[arg(long, value_enum, default_value_t = Profile::Balanced)]
    profile: Profile,

    /// Latitude of the view centre
    #[arg(long, default_value_t = 51.5074, allow_negative_numbers = true)]
    lat: f64,

    /// Longitude of the view centre
    #[arg(long, default_value_t = -0.1278, allow_negative_numbers = true)]
    lng: f64,

    #[arg(long, default_value_t = 6.0)]
    zoom: f64,

    /// Output size as WIDTHxHEIGHT
    #[arg(long, value_parser = parse_size, default_value = "1024x768")]
    size: (u32, u32),

    /// Weather overlay drawn above the radar (temperature, wind_speed, ...)
    #[arg(long)]
    overlay: Option<OverlayLayer>,

    /// Output PNG
    #[arg(long = "out", default_value = "radar.png")]
    output: PathBuf,

    /// Keep playing until Ctrl-C before saving
    #[arg(long)]
    play: bool,
}

impl Options {
    fn center(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    /// A config file wins over `--profile`
    fn config(&self) -> anyhow::Result<RadarConfig> {
        match &self.config {
            Some(path) => RadarConfig::from_file(path)
                .with_context(|| format!("loading config from {}", path.display())),
            None => Ok(RadarProfile::from(self.profile).resolve()),
        }
    }
}
