use crate::ChatSink;
use anyhow::Result;
use async_trait::async_trait;
use homemon_common::types::ChatId;

/// Sink that writes alerts to the process log instead of a chat service.
///
/// Useful as a default when no chat collaborator is wired up, and for
/// running the core headless.
pub struct LogSink;

#[async_trait]
impl ChatSink for LogSink {
    async fn send(&self, chat: ChatId, text: &str) -> Result<()> {
        tracing::info!(chat, text, "alert");
        Ok(())
    }
}
