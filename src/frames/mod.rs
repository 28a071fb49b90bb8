pub mod registry;
pub mod source;

use serde::{Deserialize, Serialize};

pub use registry::FrameRegistry;
pub use source::{FrameList, FrameListFetcher, FrameSource};

/// One time slice of radar imagery.
///
/// `path_token` is an opaque server path; it is only ever concatenated into
/// tile URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "path")]
    pub path_token: String,
    #[serde(rename = "time")]
    pub timestamp_seconds: i64,
}

impl Frame {
    pub fn new(path_token: impl Into<String>, timestamp_seconds: i64) -> Self {
        Self {
            path_token: path_token.into(),
            timestamp_seconds,
        }
    }
}
