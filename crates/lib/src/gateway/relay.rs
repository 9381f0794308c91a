//! Webhook event router: completion + reply for every text event of one webhook delivery.

use crate::channels::{ChannelError, InboundEvent, ReplyChannel};
use crate::llm::{CompletionBackend, LlmError};
use futures_util::future::join_all;
use serde_json::Value;

/// At least one event of a delivery failed. Replies already sent for other events stand.
#[derive(Debug, thiserror::Error)]
#[error("{failed} of {total} webhook events failed; first error: {first_error}")]
pub struct BatchFailure {
    pub failed: usize,
    pub total: usize,
    pub first_error: String,
}

#[derive(Debug, thiserror::Error)]
enum EventError {
    #[error(transparent)]
    Completion(#[from] LlmError),
    #[error(transparent)]
    Reply(#[from] ChannelError),
    #[error("text event has no reply token")]
    MissingReplyToken,
}

/// Process all events concurrently and wait for every one to settle.
///
/// The result has one slot per input event, in input order: `null` for skipped (non-text) events,
/// the reply API's response otherwise. Any failed event fails the whole batch.
pub async fn relay_events(
    events: &[InboundEvent],
    completion: &dyn CompletionBackend,
    channel: &dyn ReplyChannel,
) -> Result<Vec<Value>, BatchFailure> {
    let total = events.len();
    let outcomes = join_all(
        events
            .iter()
            .map(|event| handle_event(event, completion, channel)),
    )
    .await;

    let mut results = Vec::with_capacity(total);
    let mut failed = 0;
    let mut first_error: Option<String> = None;
    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(value) => results.push(value),
            Err(e) => {
                log::error!("webhook event {} of {} failed: {}", index + 1, total, e);
                failed += 1;
                first_error.get_or_insert_with(|| e.to_string());
            }
        }
    }
    match first_error {
        Some(first_error) => Err(BatchFailure {
            failed,
            total,
            first_error,
        }),
        None => Ok(results),
    }
}

async fn handle_event(
    event: &InboundEvent,
    completion: &dyn CompletionBackend,
    channel: &dyn ReplyChannel,
) -> Result<Value, EventError> {
    let Some(message) = event.as_text_message() else {
        log::debug!(
            "skipping {} event (message type {:?})",
            event.kind,
            event.message_kind
        );
        return Ok(Value::Null);
    };
    let reply_token = message.reply_token.ok_or(EventError::MissingReplyToken)?;
    let reply = completion.complete(message.text).await?;
    let delivered = channel.reply_text(reply_token, &reply).await?;
    log::debug!("{}: replied to {}", channel.id(), reply_token);
    Ok(delivered)
}
