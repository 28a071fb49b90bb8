//! Byte sources and decoders behind the tile loader.

use crate::prelude::Arc;
use crate::Result;
use async_trait::async_trait;
use image::RgbaImage;

/// A decoded tile raster, cheap to clone and share between passes.
pub type TileImage = Arc<RgbaImage>;

/// Fetches raw tile bytes for a fully-formed URL.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    /// Non-2xx responses must come back as errors.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Turns fetched bytes into a raster.
pub trait TileDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<TileImage>;
}

/// Decoder backed by the `image` crate (PNG and JPEG).
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder;

impl TileDecoder for ImageDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<TileImage> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Arc::new(decoded.to_rgba8()))
    }
}

#[cfg(feature = "http")]
pub use http::{HttpTileFetcher, HTTP_CLIENT};

#[cfg(feature = "http")]
mod http {
    use super::*;
    use crate::RadarError;
    use once_cell::sync::Lazy;

    /// Shared async HTTP client for tile and frame-list requests
    pub static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
        reqwest::Client::builder()
            .user_agent(concat!("radarcast/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(10))
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .pool_max_idle_per_host(16)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    });

    /// Fetcher using the shared reqwest client.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct HttpTileFetcher;

    #[async_trait]
    impl TileFetcher for HttpTileFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            let response = HTTP_CLIENT.get(url).send().await?;

            if !response.status().is_success() {
                return Err(RadarError::HttpStatus {
                    status: response.status().as_u16(),
                    url: url.to_string(),
                });
            }

            Ok(response.bytes().await?.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_decoder_reads_png() {
        let mut bytes = Vec::new();
        let source = RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]));
        image::DynamicImage::ImageRgba8(source)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();

        let decoded = ImageDecoder.decode(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (4, 2));
        assert_eq!(decoded.get_pixel(3, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_image_decoder_rejects_garbage() {
        assert!(ImageDecoder.decode(b"<html>rate limited</html>").is_err());
    }
}
