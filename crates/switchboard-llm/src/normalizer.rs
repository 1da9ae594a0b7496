//! Turns provider updates into the canonical domain message sequence
//!
//! Mapping per update:
//!
//! | update        | message                                  |
//! |---------------|------------------------------------------|
//! | text delta    | Assistant, `text` = the delta            |
//! | reasoning     | Assistant, one `Thinking` part           |
//! | tool call     | Assistant, one `ToolCall` part           |
//! | tool result   | User, one `ToolCallResult` part          |
//! | usage         | none; published on the usage channel     |
//! | finish, empty | none                                     |

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::error::LlmError;
use crate::types::{BinaryPart, DomainMessage, MessageStream, PartKind, Role, StreamUpdate, UpdateStream};
use crate::usage::UsageChannel;

/// Domain message for a single update, if it produces one
pub fn message_for_update(update: &StreamUpdate) -> Option<DomainMessage> {
    match update {
        StreamUpdate::Text(delta) if delta.is_empty() => None,
        StreamUpdate::Text(delta) => Some(DomainMessage::assistant(delta.clone())),
        StreamUpdate::Reasoning(delta) if delta.is_empty() => None,
        StreamUpdate::Reasoning(delta) => Some(DomainMessage::with_parts(
            Role::Assistant,
            vec![BinaryPart::new("thinking", PartKind::Thinking, delta.as_bytes())],
        )),
        StreamUpdate::ToolCall(call) => Some(DomainMessage::with_parts(
            Role::Assistant,
            vec![BinaryPart::tool_call(call)],
        )),
        StreamUpdate::ToolResult(result) => Some(DomainMessage::with_parts(
            Role::User,
            vec![BinaryPart::tool_result(result)],
        )),
        StreamUpdate::Usage(_) | StreamUpdate::Finish(_) => None,
    }
}

/// Per-response normalization state
///
/// Publishes usage at most once for the response it was created for.
#[derive(Debug)]
pub(crate) struct ResponseNormalizer {
    usage: UsageChannel,
    usage_published: bool,
}

impl ResponseNormalizer {
    pub(crate) const fn new(usage: UsageChannel) -> Self {
        Self {
            usage,
            usage_published: false,
        }
    }

    pub(crate) fn observe(&mut self, update: &StreamUpdate) -> Option<DomainMessage> {
        if let StreamUpdate::Usage(usage) = update {
            if self.usage_published {
                tracing::debug!("ignoring repeated usage report for one response");
            } else {
                self.usage_published = true;
                self.usage.publish(*usage);
            }
            return None;
        }

        message_for_update(update)
    }
}

/// Wait for the next update unless cancellation fires first
pub(crate) async fn next_update(
    updates: &mut UpdateStream,
    cancel: &CancellationToken,
) -> Option<Result<StreamUpdate, LlmError>> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Some(Err(LlmError::Cancelled)),
        item = updates.next() => item,
    }
}

/// Normalize one provider response into domain messages
///
/// The returned stream is single-pass. Errors end it, and a cancelled token
/// yields [`LlmError::Cancelled`] on the next poll.
pub fn normalize(updates: UpdateStream, cancel: CancellationToken, usage: UsageChannel) -> MessageStream {
    let state = Some((updates, ResponseNormalizer::new(usage), cancel));

    let stream = futures_util::stream::unfold(state, |state| async move {
        let (mut updates, mut normalizer, cancel) = state?;

        loop {
            if cancel.is_cancelled() {
                return Some((Err(LlmError::Cancelled), None));
            }

            match next_update(&mut updates, &cancel).await {
                None => return None,
                Some(Err(e)) => return Some((Err(e), None)),
                Some(Ok(update)) => {
                    if let Some(message) = normalizer.observe(&update) {
                        return Some((Ok(message), Some((updates, normalizer, cancel))));
                    }
                }
            }
        }
    });

    Box::pin(stream)
}
