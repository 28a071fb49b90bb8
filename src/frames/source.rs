use crate::frames::Frame;
use crate::prelude::Arc;
use crate::radar::Notice;
use crate::{RadarError, Result};
use async_trait::async_trait;
use crossbeam_channel::Sender;
use serde::Deserialize;

/// Frames returned by one fetch, plus the tile host they should be served from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameList {
    pub host: Option<String>,
    pub frames: Vec<Frame>,
}

#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn fetch_frames(&self) -> Result<FrameList>;

    /// Label used in logs and notices
    fn name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct WeatherMaps {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    radar: RadarFrames,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RadarFrames {
    past: Vec<Frame>,
    nowcast: Vec<Frame>,
}

/// Frame list in the RainViewer `weather-maps.json` layout:
/// `{ "host": ..., "radar": { "past": [{ "time", "path" }], "nowcast": [...] } }`.
#[derive(Debug, Clone)]
pub struct RainViewerSource {
    pub url: String,
    pub include_nowcast: bool,
}

impl RainViewerSource {
    pub const DEFAULT_URL: &'static str = "https://api.rainviewer.com/public/weather-maps.json";

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            include_nowcast: false,
        }
    }

    pub fn with_nowcast(mut self, include: bool) -> Self {
        self.include_nowcast = include;
        self
    }

    /// Parse a response body
    pub fn parse(&self, body: &str) -> Result<FrameList> {
        let maps: WeatherMaps = serde_json::from_str(body)?;
        let mut frames = maps.radar.past;
        if self.include_nowcast {
            frames.extend(maps.radar.nowcast);
        }
        Ok(FrameList {
            host: maps.host.filter(|host| !host.is_empty()),
            frames,
        })
    }
}

impl Default for RainViewerSource {
    fn default() -> Self {
        Self::new(Self::DEFAULT_URL)
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl FrameSource for RainViewerSource {
    async fn fetch_frames(&self) -> Result<FrameList> {
        let response = crate::tiles::fetch::HTTP_CLIENT.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(RadarError::HttpStatus {
                status: response.status().as_u16(),
                url: self.url.clone(),
            });
        }
        let body = response.text().await?;
        self.parse(&body)
    }

    fn name(&self) -> &str {
        &self.url
    }
}

/// A fixed frame list, for offline use and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticFrameSource(pub FrameList);

#[async_trait]
impl FrameSource for StaticFrameSource {
    async fn fetch_frames(&self) -> Result<FrameList> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Primary source with an optional fallback.
///
/// Failures never propagate: if neither source yields a non-empty list the
/// caller keeps its current frames and a [`Notice`] is sent.
pub struct FrameListFetcher {
    primary: Arc<dyn FrameSource>,
    fallback: Option<Arc<dyn FrameSource>>,
    notices: Option<Sender<Notice>>,
}

impl FrameListFetcher {
    pub fn new(primary: Arc<dyn FrameSource>) -> Self {
        Self {
            primary,
            fallback: None,
            notices: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FrameSource>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_notices(mut self, notices: Sender<Notice>) -> Self {
        self.notices = Some(notices);
        self
    }

    pub async fn fetch(&self) -> Option<FrameList> {
        let primary_error = match fetch_non_empty(&*self.primary).await {
            Ok(list) => return Some(list),
            Err(e) => e,
        };
        log::warn!("frame list from {} failed: {}", self.primary.name(), primary_error);

        let reason = match &self.fallback {
            Some(fallback) => match fetch_non_empty(&**fallback).await {
                Ok(list) => {
                    log::debug!("frame list served by fallback {}", fallback.name());
                    return Some(list);
                }
                Err(e) => {
                    log::warn!("fallback frame list from {} failed: {}", fallback.name(), e);
                    format!("{primary_error}; fallback: {e}")
                }
            },
            None => primary_error.to_string(),
        };

        self.notify(Notice::FrameListUnavailable { reason });
        None
    }

    fn notify(&self, notice: Notice) {
        if let Some(notices) = &self.notices {
            // Nobody listening is fine
            let _ = notices.send(notice);
        }
    }
}

async fn fetch_non_empty(source: &dyn FrameSource) -> Result<FrameList> {
    let list = source.fetch_frames().await?;
    if list.frames.is_empty() {
        return Err(RadarError::FrameSource(format!("{} returned no frames", source.name())));
    }
    Ok(list)
}
