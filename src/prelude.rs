//! Prelude module for common radarcast types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use radarcast::prelude::*;`

pub use crate::core::{
    bounds::Bounds,
    config::{
        CompositorConfig, CrossfadeConfig, OverlayConfig, PlaybackConfig, RadarConfig,
        RadarProfile,
    },
    geo::{GeoBounds, LatLng, Point, TileCoord},
    viewport::{Projector, SharedViewport, Viewport, ViewportProvider, ViewportSnapshot},
};

pub use crate::tiles::{
    cache::TileCache,
    fetch::{TileDecoder, TileFetcher, TileImage},
    loader::{TileLoader, TileLoaderConfig, TileRequest},
    math::ZoomBand,
    source::{RadarTileSource, TileUrlSource},
};

pub use crate::frames::{Frame, FrameRegistry, FrameSource};

pub use crate::compositor::{Canvas, Compositor, PassLayer, PassOutcome, RasterSurface, RenderSurface};

pub use crate::animation::{AnimationDriver, Crossfade, EasingType, RedrawThrottle};

pub use crate::overlay::{OverlayLayer, OverlayProjector, OverlayTileSource};

pub use crate::radar::{MapEvent, Notice, RadarMap};

pub use crate::runtime::{sleep, spawn, TaskHandle};

pub use crate::{RadarError, Result};

pub use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};

pub use futures::Future;
