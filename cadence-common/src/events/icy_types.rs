//! ICY (SHOUTcast/Icecast) stream metadata

use serde::{Deserialize, Serialize};

/// In-stream title update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcyInfo {
    pub title: Option<String>,
    pub url: Option<String>,
}

/// Response headers announced by an ICY server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcyHeaders {
    pub bitrate: Option<u32>,
    pub genre: Option<String>,
    pub name: Option<String>,
    pub metadata_interval: Option<u32>,
    pub url: Option<String>,
    pub is_public: bool,
}

/// Latest ICY info and headers seen for the current stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcyMetadata {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub info: Option<IcyInfo>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub headers: Option<IcyHeaders>,
}

impl IcyMetadata {
    pub fn is_empty(&self) -> bool {
        self.info.is_none() && self.headers.is_none()
    }
}
