//! Address construction for the embedded viewer service
//!
//! Channels are addressed by building a URL to the embedded service with
//! query parameters selected by mode. The parameter names are the service's
//! documented configuration surface; tokens and passwords pass through as
//! opaque values.

use crate::error::CastError;
use serde::{Deserialize, Serialize};
use url::Url;

/// Default base URL of the embedded viewer service
pub const DEFAULT_SERVICE_URL: &str = "https://vdo.ninja/";

/// Marker appended to every view link for a sharper remote rendering
const SHARPEN_MARKER: &str = "sharperscreen";

/// Where an outbound session publishes to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamTarget {
    /// Publish directly under a push id, optionally grouped into a room
    Direct {
        /// Push identifier viewers use to address this stream
        push: String,
        /// Optional room grouping
        room: Option<String>,
        /// Optional room password, passed through opaquely
        password: Option<String>,
    },
    /// Publish to a generic ingest endpoint
    Ingest {
        /// Ingest endpoint URL
        endpoint: Url,
        /// Optional bearer-style token, passed through opaquely
        token: Option<String>,
    },
    /// Publish to a named third-party ingest preset
    Preset {
        /// The preset service
        preset: IngestPreset,
        /// Ingest token for the preset service
        token: String,
    },
}

impl StreamTarget {
    /// Push id carried by the target, when it has one
    pub fn push_id(&self) -> Option<&str> {
        match self {
            StreamTarget::Direct { push, .. } => Some(push),
            _ => None,
        }
    }

    /// Whether this target uses an ingest endpoint rather than direct push
    pub fn is_ingest(&self) -> bool {
        !matches!(self, StreamTarget::Direct { .. })
    }
}

/// Known third-party ingest presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestPreset {
    /// Twitch ingest relay
    Twitch,
}

impl IngestPreset {
    /// Ingest endpoint of the preset service
    pub fn endpoint(&self) -> Url {
        let raw = match self {
            IngestPreset::Twitch => "https://twitch.vdo.ninja/",
        };
        Url::parse(raw).expect("preset endpoints are valid URLs")
    }
}

/// Build the embedded-frame address for an outbound session
pub fn publish_address(service: &Url, target: &StreamTarget) -> Url {
    let mut url = service.clone();
    {
        let mut query = url.query_pairs_mut();
        match target {
            StreamTarget::Direct {
                push,
                room,
                password,
            } => {
                query.append_pair("push", push);
                if let Some(room) = room {
                    query.append_pair("room", room);
                }
                if let Some(password) = password {
                    query.append_pair("password", password);
                }
            }
            StreamTarget::Ingest { endpoint, token } => {
                query.append_pair("whippush", endpoint.as_str());
                if let Some(token) = token {
                    query.append_pair("whippushtoken", token);
                }
            }
            StreamTarget::Preset { preset, token } => {
                query.append_pair("whippush", preset.endpoint().as_str());
                query.append_pair("whippushtoken", token);
            }
        }
        query.append_key_only("framegrab");
        query.append_key_only("view");
    }
    url
}

/// Build the embedded-frame address for an inbound binding
///
/// Requests a clean, solo, audio-less view of the remote participant.
pub fn consume_address(service: &Url, channel: &str, password: Option<&str>) -> Url {
    let mut url = service.clone();
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("room", channel);
        if let Some(password) = password {
            query.append_pair("password", password);
        }
        query.append_key_only("cleanoutput");
        query.append_key_only("solo");
        query.append_key_only("noaudio");
    }
    url
}

/// Derive the shareable view link for an outbound session
///
/// Deterministic in its inputs; computed once at session start, before any
/// network activity, so it can be shared out-of-band immediately.
pub fn view_link(
    service: &Url,
    push: &str,
    room: Option<&str>,
    password: Option<&str>,
) -> String {
    let mut url = service.clone();
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("view", push);
        if let Some(room) = room {
            query.append_pair("room", room);
            query.append_key_only("solo");
        }
        if let Some(password) = password {
            query.append_pair("password", password);
        }
        query.append_key_only(SHARPEN_MARKER);
    }
    url.to_string()
}

/// Parse and validate a service base URL
pub fn parse_service_url(raw: &str) -> Result<Url, CastError> {
    Url::parse(raw).map_err(|e| CastError::InvalidAddress {
        reason: format!("service URL {raw:?}: {e}"),
    })
}
