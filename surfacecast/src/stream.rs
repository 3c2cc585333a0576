//! Outbound stream builder and session status

use crate::{CastError, PublishOptions, StartedStream, Surfacecast};
use std::time::Duration;
use surfacecast_core::{IngestPreset, StreamTarget, TransportStrategy};
use url::Url;

/// Status of the outbound side of a Surfacecast instance
#[derive(Debug, Clone)]
pub struct CastStatus {
    /// Whether an outbound session is active
    pub streaming: bool,
    /// Channel of the active session, if any
    pub channel_id: Option<String>,
    /// View link of the active session, if any
    pub view_link: Option<String>,
}

/// Fluent builder for outbound sessions
#[derive(Debug)]
pub struct StreamBuilder {
    cast: Surfacecast,
    push: String,
    room: Option<String>,
    password: Option<String>,
    ingest: Option<(Url, Option<String>)>,
    preset: Option<(IngestPreset, String)>,
    options: PublishOptions,
}

impl StreamBuilder {
    pub(crate) fn new(cast: &Surfacecast, push_id: &str) -> Self {
        Self {
            cast: cast.clone(),
            push: push_id.to_string(),
            room: None,
            password: None,
            ingest: None,
            preset: None,
            options: PublishOptions::default(),
        }
    }

    /// Group the stream into a room
    pub fn room(mut self, room: &str) -> Self {
        self.room = Some(room.to_string());
        self
    }

    /// Set the room password, passed through opaquely
    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    /// Set the capture frame rate for the zero-copy path
    pub fn frame_rate(mut self, frame_rate: u32) -> Self {
        self.options.frame_rate = frame_rate;
        self
    }

    /// Set the composite surface dimensions
    pub fn dimensions(mut self, width: u32, height: u32) -> Self {
        self.options.width = width;
        self.options.height = height;
        self
    }

    /// Prefer a transport strategy
    ///
    /// Zero-copy still requires the capability; preferring the software
    /// path always wins.
    pub fn prefer(mut self, strategy: TransportStrategy) -> Self {
        self.options.preferred_strategy = Some(strategy);
        self
    }

    /// Override the settling delay after the frame is attached
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.options.settle_delay = Some(delay);
        self
    }

    /// Publish to a generic ingest endpoint instead of direct push
    pub fn to_ingest(mut self, endpoint: Url, token: Option<&str>) -> Self {
        self.ingest = Some((endpoint, token.map(|t| t.to_string())));
        self
    }

    /// Publish to a named third-party ingest preset instead of direct push
    pub fn to_preset(mut self, preset: IngestPreset, token: &str) -> Self {
        self.preset = Some((preset, token.to_string()));
        self
    }

    /// Start the session with the current configuration
    pub async fn start(self) -> Result<StartedStream, CastError> {
        let target = if let Some((preset, token)) = self.preset {
            StreamTarget::Preset { preset, token }
        } else if let Some((endpoint, token)) = self.ingest {
            StreamTarget::Ingest { endpoint, token }
        } else {
            StreamTarget::Direct {
                push: self.push,
                room: self.room,
                password: self.password,
            }
        };
        self.cast.start_stream(target, self.options).await
    }
}
