//! LINE channel: webhook signature verification, webhook payload types and the reply API.

use crate::channels::inbound::InboundEvent;
use crate::channels::{ChannelError, ReplyChannel};
use crate::config::LineSettings;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying base64(HMAC-SHA256(channel secret, body)).
pub const LINE_SIGNATURE_HEADER: &str = "x-line-signature";

/// Webhook POST body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineWebhookPayload {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<LineWebhookEvent>,
}

/// One webhook event. Fields the relay does not use (source, timestamp, mode) are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineWebhookEvent {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub message: Option<LineEventMessage>,
}

#[derive(Debug, Deserialize)]
pub struct LineEventMessage {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl LineWebhookEvent {
    pub fn into_inbound(self) -> InboundEvent {
        let (message_kind, text) = match self.message {
            Some(m) => (Some(m.typ), m.text),
            None => (None, None),
        };
        InboundEvent {
            kind: self.typ,
            message_kind,
            text,
            reply_token: self.reply_token,
        }
    }
}

impl LineWebhookPayload {
    pub fn into_inbound_events(self) -> Vec<InboundEvent> {
        self.events
            .into_iter()
            .map(LineWebhookEvent::into_inbound)
            .collect()
    }
}

fn keyed_mac(channel_secret: &str, body: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes()).ok()?;
    mac.update(body);
    Some(mac)
}

/// Compute the X-Line-Signature value for `body` (what LINE sends for a delivery signed with
/// `channel_secret`).
pub fn sign_body(channel_secret: &str, body: &[u8]) -> Option<String> {
    let mac = keyed_mac(channel_secret, body)?;
    Some(BASE64.encode(mac.finalize().into_bytes()))
}

/// LINE Messaging API connector: verifies webhook signatures and sends replies via the reply API.
pub struct LineChannel {
    id: String,
    channel_access_token: String,
    channel_secret: String,
    api_base_url: String,
    client: reqwest::Client,
}

impl LineChannel {
    pub fn new(settings: &LineSettings) -> Self {
        Self {
            id: "line".to_string(),
            channel_access_token: settings.channel_access_token.clone(),
            channel_secret: settings.channel_secret.clone(),
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// POST /v2/bot/message/reply with one text message.
    pub async fn reply_message(
        &self,
        reply_token: &str,
        text: &str,
    ) -> Result<serde_json::Value, ChannelError> {
        let url = format!("{}/v2/bot/message/reply", self.api_base_url);
        let body = serde_json::json!({
            "replyToken": reply_token,
            "messages": [{ "type": "text", "text": text }],
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.channel_access_token)
            .json(&body)
            .send()
            .await?;
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(ChannelError::Api(format!("reply failed: {} {}", status, body)));
        }
        if body.trim().is_empty() {
            return Ok(serde_json::json!({}));
        }
        serde_json::from_str(&body)
            .map_err(|e| ChannelError::Api(format!("reply response is not JSON: {}", e)))
    }
}

#[async_trait]
impl ReplyChannel for LineChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn verify_signature(&self, body: &[u8], signature: &str) -> bool {
        let Ok(expected) = BASE64.decode(signature.trim()) else {
            return false;
        };
        keyed_mac(&self.channel_secret, body)
            .is_some_and(|mac| mac.verify_slice(&expected).is_ok())
    }

    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<serde_json::Value, ChannelError> {
        LineChannel::reply_message(self, reply_token, text).await
    }
}
