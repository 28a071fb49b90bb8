use crate::core::constants::TILE_SIZE;
use crate::core::geo::TileCoord;
use crate::tiles::loader::TileRequest;
use serde::{Deserialize, Serialize};

/// Trait representing anything that can produce tile URLs for a given coordinate.
///
/// Identical inputs must produce identical URLs; the loader cache is keyed on them.
pub trait TileUrlSource: Send + Sync {
    /// Build a URL for the requested `coord`.
    fn url(&self, coord: TileCoord) -> String;

    /// Secondary URL tried once the primary has exhausted its retries.
    fn fallback_url(&self, _coord: TileCoord) -> Option<String> {
        None
    }

    /// Primary and fallback URL bundled for the loader
    fn request(&self, coord: TileCoord) -> TileRequest {
        TileRequest {
            url: self.url(coord),
            fallback: self.fallback_url(coord),
        }
    }
}

/// Radar tile host and rendering parameters shared by every frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarTileSource {
    /// Primary host (CDN), e.g. `https://tilecache.rainviewer.com`
    pub host: String,
    /// Host tried when the primary fails
    pub fallback_host: Option<String>,
    /// Requested tile size in pixels (256 or 512)
    pub tile_size: u32,
    /// Provider colour scheme id
    pub color_scheme: u8,
    pub smooth: bool,
    pub snow: bool,
}

impl Default for RadarTileSource {
    fn default() -> Self {
        Self {
            host: "https://tilecache.rainviewer.com".to_string(),
            fallback_host: Some("https://tilecache-direct.rainviewer.com".to_string()),
            tile_size: TILE_SIZE,
            color_scheme: 2,
            smooth: true,
            snow: true,
        }
    }
}

impl RadarTileSource {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    fn build(&self, host: &str, path_token: &str, coord: TileCoord) -> String {
        format!(
            "{}{}/{}/{}/{}/{}/{}/{}_{}.png",
            host.trim_end_matches('/'),
            path_token,
            self.tile_size,
            coord.z,
            coord.x,
            coord.y,
            self.color_scheme,
            self.smooth as u8,
            self.snow as u8,
        )
    }

    /// URL source bound to one frame's path token
    pub fn for_frame(&self, path_token: impl Into<String>) -> RadarFrameTiles {
        RadarFrameTiles {
            source: self.clone(),
            path_token: path_token.into(),
        }
    }
}

/// Tile URLs of one radar frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadarFrameTiles {
    source: RadarTileSource,
    path_token: String,
}

impl RadarFrameTiles {
    pub fn path_token(&self) -> &str {
        &self.path_token
    }
}

impl TileUrlSource for RadarFrameTiles {
    fn url(&self, coord: TileCoord) -> String {
        self.source.build(&self.source.host, &self.path_token, coord)
    }

    fn fallback_url(&self, coord: TileCoord) -> Option<String> {
        self.source
            .fallback_host
            .as_deref()
            .filter(|host| *host != self.source.host)
            .map(|host| self.source.build(host, &self.path_token, coord))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_url_layout() {
        let source = RadarTileSource::default().with_host("https://cdn.example/");
        let tiles = source.for_frame("/v2/radar/1700000000");
        assert_eq!(
            tiles.url(TileCoord::new(3, 5, 4)),
            "https://cdn.example/v2/radar/1700000000/256/4/3/5/2/1_1.png"
        );
    }

    #[test]
    fn test_urls_are_deterministic() {
        let a = RadarTileSource::default().for_frame("/p");
        let b = RadarTileSource::default().for_frame("/p");
        let coord = TileCoord::new(1, 2, 3);
        assert_eq!(a.request(coord), b.request(coord));
        assert_ne!(a.url(coord), a.url(TileCoord::new(2, 1, 3)));
    }

    #[test]
    fn test_fallback_uses_secondary_host() {
        let tiles = RadarTileSource::default().for_frame("/p");
        let fallback = tiles.fallback_url(TileCoord::new(0, 0, 2)).unwrap();
        assert!(fallback.starts_with("https://tilecache-direct.rainviewer.com/p/"));

        let same_host = RadarTileSource {
            fallback_host: Some("https://tilecache.rainviewer.com".to_string()),
            ..RadarTileSource::default()
        };
        assert!(same_host.for_frame("/p").fallback_url(TileCoord::new(0, 0, 2)).is_none());
    }
}
