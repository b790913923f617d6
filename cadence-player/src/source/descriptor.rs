//! Decoding of untyped audio-source descriptors
//!
//! Hosts describe sources as JSON maps tagged by `type`. The tag is matched
//! first so an unknown type fails with `UnsupportedSourceType` rather than a
//! generic shape error; the body is then deserialized into the variant's
//! typed fields. Children stay untyped until the tree resolves them.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{PlayerError, Result};

/// Stable host-assigned node identifier
pub type NodeId = String;

/// Largest repeat count accepted for a looping source
pub const MAX_LOOP_COUNT: usize = 65_536;

/// HTTP data source settings for URI-backed sources
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSourceSpec {
    /// Extracted from the `User-Agent` header (either casing)
    pub user_agent: Option<String>,
    /// Remaining request headers
    pub headers: BTreeMap<String, String>,
}

impl DataSourceSpec {
    pub fn from_headers(headers: Option<BTreeMap<String, String>>) -> Self {
        let mut headers = headers.unwrap_or_default();
        let user_agent = headers
            .remove("User-Agent")
            .or_else(|| headers.remove("user-agent"));
        Self { user_agent, headers }
    }
}

/// Container extractor tuning for progressive sources
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractorOptions {
    pub constant_bitrate_seeking_enabled: bool,
    pub constant_bitrate_seeking_always_enabled: bool,
    pub mp3_flags: i32,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            constant_bitrate_seeking_enabled: true,
            constant_bitrate_seeking_always_enabled: false,
            mp3_flags: 0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourceOptions {
    #[serde(default, alias = "androidExtractorOptions")]
    extractor_options: Option<ExtractorOptions>,
}

#[derive(Debug, Deserialize)]
struct UriBody {
    uri: String,
    #[serde(default)]
    headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    options: Option<SourceOptions>,
}

#[derive(Debug, Deserialize)]
struct SilenceBody {
    duration: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConcatenatingBody {
    children: Vec<Value>,
    #[serde(default)]
    shuffle_order: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct ClippingBody {
    child: Value,
    #[serde(default)]
    start: Option<u64>,
    #[serde(default)]
    end: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LoopingBody {
    child: Value,
    count: usize,
}

/// Typed view of one descriptor (children left undecoded)
#[derive(Debug, Clone, PartialEq)]
pub enum SourceDescriptor {
    Progressive {
        uri: String,
        data_source: DataSourceSpec,
        extractor: ExtractorOptions,
    },
    Dash {
        uri: String,
        data_source: DataSourceSpec,
    },
    Hls {
        uri: String,
        data_source: DataSourceSpec,
    },
    Silence {
        duration_us: u64,
    },
    Concatenating {
        children: Vec<Value>,
        shuffle_order: Vec<usize>,
    },
    Clipping {
        child: Value,
        start_us: u64,
        /// `None` clips at the end of the source
        end_us: Option<u64>,
    },
    Looping {
        child: Value,
        count: usize,
    },
}

/// Read the `id` of a descriptor
pub fn descriptor_id(value: &Value) -> Result<NodeId> {
    value
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PlayerError::InvalidCommandArgument(format!("audio source without id: {}", value)))
}

/// Read the `type` tag of a descriptor
pub fn descriptor_type(value: &Value) -> Result<&str> {
    value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| PlayerError::InvalidCommandArgument(format!("audio source without type: {}", value)))
}

/// Decode the untyped `children` list of a descriptor
pub fn descriptor_children(value: &Value) -> Result<Vec<Value>> {
    match value.get("children") {
        Some(Value::Array(children)) => Ok(children.clone()),
        Some(other) => Err(PlayerError::InvalidCommandArgument(format!("list expected: {}", other))),
        None => Ok(Vec::new()),
    }
}

/// Decode the `shuffleOrder` list of a descriptor (absent means empty)
pub fn descriptor_shuffle_order(value: &Value) -> Result<Vec<usize>> {
    match value.get("shuffleOrder") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(order) => Ok(serde_json::from_value(order.clone())?),
    }
}

/// Read the playlist-level `useLazyPreparation` flag (absent means unset)
pub fn descriptor_lazy_preparation(value: &Value) -> Result<Option<bool>> {
    match value.get("useLazyPreparation") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(*flag)),
        Some(other) => Err(PlayerError::InvalidCommandArgument(format!("boolean expected: {}", other))),
    }
}

impl SourceDescriptor {
    pub fn parse(value: &Value) -> Result<(NodeId, Self)> {
        let id = descriptor_id(value)?;
        let body = value.clone();

        let descriptor = match descriptor_type(value)? {
            "progressive" => {
                let body: UriBody = serde_json::from_value(body)?;
                let extractor = body
                    .options
                    .and_then(|o| o.extractor_options)
                    .unwrap_or_default();
                SourceDescriptor::Progressive {
                    uri: body.uri,
                    data_source: DataSourceSpec::from_headers(body.headers),
                    extractor,
                }
            }
            "dash" => {
                let body: UriBody = serde_json::from_value(body)?;
                SourceDescriptor::Dash {
                    uri: body.uri,
                    data_source: DataSourceSpec::from_headers(body.headers),
                }
            }
            "hls" => {
                let body: UriBody = serde_json::from_value(body)?;
                SourceDescriptor::Hls {
                    uri: body.uri,
                    data_source: DataSourceSpec::from_headers(body.headers),
                }
            }
            "silence" => {
                let body: SilenceBody = serde_json::from_value(body)?;
                SourceDescriptor::Silence { duration_us: body.duration }
            }
            "concatenating" => {
                let body: ConcatenatingBody = serde_json::from_value(body)?;
                SourceDescriptor::Concatenating {
                    children: body.children,
                    shuffle_order: body.shuffle_order,
                }
            }
            "clipping" => {
                let body: ClippingBody = serde_json::from_value(body)?;
                if let (Some(start), Some(end)) = (body.start, body.end) {
                    if end < start {
                        return Err(PlayerError::InvalidCommandArgument(format!(
                            "clip end {} before start {}",
                            end, start
                        )));
                    }
                }
                SourceDescriptor::Clipping {
                    child: body.child,
                    start_us: body.start.unwrap_or(0),
                    end_us: body.end,
                }
            }
            "looping" => {
                let body: LoopingBody = serde_json::from_value(body)?;
                if body.count > MAX_LOOP_COUNT {
                    return Err(PlayerError::InvalidCommandArgument(format!(
                        "loop count {} exceeds {}",
                        body.count, MAX_LOOP_COUNT
                    )));
                }
                SourceDescriptor::Looping { child: body.child, count: body.count }
            }
            other => return Err(PlayerError::UnsupportedSourceType(other.to_string())),
        };

        Ok((id, descriptor))
    }
}
