pub mod cache;
pub mod fetch;
pub mod loader;
pub mod math;
pub mod source;

// Re-exports for convenience
pub use cache::{CacheEntry, CacheStats, TileCache};
pub use fetch::{ImageDecoder, TileDecoder, TileFetcher, TileImage};
pub use loader::{TileLoader, TileLoaderConfig, TileRequest};
pub use math::ZoomBand;
pub use source::{RadarFrameTiles, RadarTileSource, TileUrlSource};
