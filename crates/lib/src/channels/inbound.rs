//! Inbound event from a channel: one unit of work for the webhook event router.

/// A platform-neutral view of one webhook event. Only `message` events carrying a `text` message
/// are relayed; everything else is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Event type as sent by the platform (e.g. "message", "follow").
    pub kind: String,
    /// Message type when the event carries a message (e.g. "text", "sticker").
    pub message_kind: Option<String>,
    pub text: Option<String>,
    pub reply_token: Option<String>,
}

/// Borrowed view of a relayable text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextMessage<'a> {
    pub text: &'a str,
    pub reply_token: Option<&'a str>,
}

impl InboundEvent {
    /// A text message event.
    pub fn text(text: impl Into<String>, reply_token: impl Into<String>) -> Self {
        Self {
            kind: "message".to_string(),
            message_kind: Some("text".to_string()),
            text: Some(text.into()),
            reply_token: Some(reply_token.into()),
        }
    }

    /// Some when this is a `message` event with a `text` message.
    pub fn as_text_message(&self) -> Option<TextMessage<'_>> {
        if self.kind != "message" || self.message_kind.as_deref() != Some("text") {
            return None;
        }
        Some(TextMessage {
            text: self.text.as_deref().unwrap_or(""),
            reply_token: self.reply_token.as_deref(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_text_messages_are_relayable() {
        let text = InboundEvent::text("hi", "tok");
        assert_eq!(
            text.as_text_message(),
            Some(TextMessage {
                text: "hi",
                reply_token: Some("tok"),
            })
        );

        let sticker = InboundEvent {
            message_kind: Some("sticker".to_string()),
            text: None,
            ..InboundEvent::text("", "tok")
        };
        assert_eq!(sticker.as_text_message(), None);

        let follow = InboundEvent {
            kind: "follow".to_string(),
            message_kind: None,
            text: None,
            reply_token: Some("tok".to_string()),
        };
        assert_eq!(follow.as_text_message(), None);
    }
}
