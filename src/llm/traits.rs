use super::types::Message;
use async_trait::async_trait;
use std::sync::Arc;

/// Callback invoked with streamed output as a generator produces it.
/// Streaming is optional and orthogonal to the loop's control flow; the
/// controller only ever consumes the complete returned string.
pub type TokenSink = Arc<dyn Fn(&str) + Send + Sync>;

/// The opaque text-producing collaborator driving the loop.
///
/// Implementations must return `Err` on failure — the controller treats a
/// generation failure as fatal for the session and does not retry it.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        messages: &[Message],
        on_token: Option<TokenSink>,
    ) -> anyhow::Result<String>;
}
