//! Per-source binding extension
//!
//! Attaches a `bind_stream`-style method to every named input source
//! handle, so call sites can bind a remote stream directly on the source
//! they want it on.

use crate::{BoundSource, CastError, ConsumeOptions, Surfacecast};
use async_trait::async_trait;
use std::sync::Arc;
use surfacecast_core::InputSource;

/// Binding method attached to input source handles
#[async_trait]
pub trait BindStream {
    /// Bind the remote stream on `channel_id` to this source
    async fn bind_stream(
        &self,
        cast: &Surfacecast,
        channel_id: &str,
        options: ConsumeOptions,
    ) -> Result<BoundSource, CastError>;
}

#[async_trait]
impl BindStream for Arc<InputSource> {
    async fn bind_stream(
        &self,
        cast: &Surfacecast,
        channel_id: &str,
        options: ConsumeOptions,
    ) -> Result<BoundSource, CastError> {
        cast.bind_source(self, channel_id, options).await
    }
}
