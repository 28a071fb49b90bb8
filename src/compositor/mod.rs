//! Double-buffered tile compositing

pub mod pass;
pub mod surface;

pub use pass::{tile_rect, Compositor, PassLayer, PassOutcome};
pub use surface::{Canvas, RasterSurface, RenderSurface, SharedSurface};
