//! Outbound alert delivery.
//!
//! The chat interface itself (Telegram, a web UI, ...) is an external
//! collaborator; this crate only defines the seam the notify engine talks
//! to, plus a tracing-backed default sink.

pub mod channels;

use anyhow::Result;
use async_trait::async_trait;
use homemon_common::types::ChatId;

/// Delivers alert text to one recipient of the external chat collaborator.
///
/// Delivery failures are the caller's problem to log; this core never
/// retries, and a failed send for one recipient must not block others.
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send(&self, chat: ChatId, text: &str) -> Result<()>;
}
