//! Upstream fetch collaborator

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatMessage, GenerationParams, ModelResponse};

/// Produces a response for a request the cache cannot answer.
///
/// The warmer calls this on a miss; the cache is indifferent to the
/// implementation behind it (a provider client, a router, a stub).
#[async_trait]
pub trait ResponseFetcher: Send + Sync {
    async fn fetch(
        &self,
        messages: &[ChatMessage],
        model: &str,
        params: Option<&GenerationParams>,
    ) -> Result<ModelResponse>;
}
