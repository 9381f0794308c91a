//! Communication channels (e.g. LINE).
//!
//! A channel turns platform webhook payloads into [`InboundEvent`]s and delivers text replies
//! addressed by reply token. The gateway holds the channel as a [`ReplyChannel`] trait object.

mod inbound;
mod line;

use async_trait::async_trait;

pub use inbound::{InboundEvent, TextMessage};
pub use line::{
    sign_body, LineChannel, LineEventMessage, LineWebhookEvent, LineWebhookPayload,
    LINE_SIGNATURE_HEADER,
};

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("channel api error: {0}")]
    Api(String),
}

/// Handle to a channel that can authenticate webhook deliveries and send replies.
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    /// Channel id (e.g. "line").
    fn id(&self) -> &str;
    /// True when `signature` authenticates the raw webhook `body`.
    fn verify_signature(&self, body: &[u8], signature: &str) -> bool;
    /// Send one text reply. Returns the platform's response body.
    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<serde_json::Value, ChannelError>;
}
