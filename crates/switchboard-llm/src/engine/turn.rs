//! One conversation turn as a lazy state machine
//!
//! `Start` opens a provider stream, `Streaming` normalizes its updates, and
//! `ExecutingTools` runs requested calls one per step before looping back
//! to `Start`. Manual sessions end after the first response.

use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::error::LlmError;
use crate::normalizer::{ResponseNormalizer, message_for_update, next_update};
use crate::provider::ChatBackend;
use crate::resolver::ResolvedFunction;
use crate::types::{
    BinaryPart, ChatRequest, DomainMessage, MessageStream, Role, StreamUpdate, ToolCallContent, ToolExecutionMode,
    ToolResultContent, UpdateStream,
};
use crate::usage::UsageChannel;

pub(super) struct Turn {
    pub backend: Arc<dyn ChatBackend>,
    pub request: ChatRequest,
    pub functions: Vec<ResolvedFunction>,
    pub mode: ToolExecutionMode,
    pub max_rounds: u32,
    pub cancel: CancellationToken,
    pub usage: UsageChannel,
}

enum Phase {
    Start,
    Streaming(UpdateStream, ResponseNormalizer),
    ExecutingTools(VecDeque<ToolCallContent>),
    Done,
}

/// Outcome of one phase step
enum Step {
    Yield(Result<DomainMessage, LlmError>, Phase),
    Continue(Phase),
}

struct TurnState {
    turn: Turn,
    phase: Phase,
    rounds: u32,
    response_text: String,
    response_calls: Vec<ToolCallContent>,
}

impl Turn {
    pub(super) fn into_stream(self) -> MessageStream {
        let state = TurnState {
            turn: self,
            phase: Phase::Start,
            rounds: 0,
            response_text: String::new(),
            response_calls: Vec::new(),
        };

        let stream = futures_util::stream::unfold(state, |mut state| async move {
            loop {
                let step = match mem::replace(&mut state.phase, Phase::Done) {
                    Phase::Done => return None,
                    _ if state.turn.cancel.is_cancelled() => Step::Yield(Err(LlmError::Cancelled), Phase::Done),
                    Phase::Start => state.start().await,
                    Phase::Streaming(updates, normalizer) => state.streaming(updates, normalizer).await,
                    Phase::ExecutingTools(pending) => state.execute_next(pending).await,
                };

                match step {
                    Step::Yield(item, next) => {
                        state.phase = next;
                        return Some((item, state));
                    }
                    Step::Continue(next) => state.phase = next,
                }
            }
        });

        Box::pin(stream)
    }
}

impl TurnState {
    async fn start(&mut self) -> Step {
        self.response_text.clear();
        self.response_calls.clear();

        let turn = &self.turn;
        let opened = tokio::select! {
            biased;
            () = turn.cancel.cancelled() => Err(LlmError::Cancelled),
            result = turn.backend.open_stream(&turn.request) => result,
        };

        match opened {
            Ok(updates) => Step::Continue(Phase::Streaming(updates, ResponseNormalizer::new(turn.usage.clone()))),
            Err(e) => Step::Yield(Err(e), Phase::Done),
        }
    }

    async fn streaming(&mut self, mut updates: UpdateStream, mut normalizer: ResponseNormalizer) -> Step {
        match next_update(&mut updates, &self.turn.cancel).await {
            Some(Ok(update)) => {
                match &update {
                    StreamUpdate::Text(text) => self.response_text.push_str(text),
                    StreamUpdate::ToolCall(call) => self.response_calls.push(call.clone()),
                    _ => {}
                }

                let message = normalizer.observe(&update);
                let next = Phase::Streaming(updates, normalizer);
                match message {
                    Some(message) => Step::Yield(Ok(message), next),
                    None => Step::Continue(next),
                }
            }
            Some(Err(e)) => Step::Yield(Err(e), Phase::Done),
            None => self.finish_response(),
        }
    }

    fn finish_response(&mut self) -> Step {
        if self.turn.mode == ToolExecutionMode::Manual || self.response_calls.is_empty() {
            return Step::Continue(Phase::Done);
        }

        let calls = mem::take(&mut self.response_calls);
        let text = mem::take(&mut self.response_text);

        if self.rounds >= self.turn.max_rounds {
            tracing::warn!(rounds = self.rounds, pending = calls.len(), "tool round limit reached");
            let notice = DomainMessage::information(format!(
                "Tool round limit of {} reached; {} requested tool call(s) were not executed",
                self.turn.max_rounds,
                calls.len()
            ));
            return Step::Yield(Ok(notice), Phase::Done);
        }

        self.rounds += 1;
        tracing::debug!(round = self.rounds, calls = calls.len(), "executing tool calls");

        let mut assistant = DomainMessage::with_parts(Role::Assistant, calls.iter().map(BinaryPart::tool_call).collect());
        if !text.is_empty() {
            assistant.text = Some(text);
        }
        self.turn.request.messages.push(assistant);

        Step::Continue(Phase::ExecutingTools(calls.into()))
    }

    async fn execute_next(&mut self, mut pending: VecDeque<ToolCallContent>) -> Step {
        let Some(call) = pending.pop_front() else {
            return Step::Continue(Phase::Start);
        };

        let result = tokio::select! {
            biased;
            () = self.turn.cancel.cancelled() => return Step::Yield(Err(LlmError::Cancelled), Phase::Done),
            result = run_call(&self.turn.functions, &call) => result,
        };

        let update = StreamUpdate::ToolResult(ToolResultContent {
            call_id: call.call_id,
            result,
        });

        let next = Phase::ExecutingTools(pending);
        match message_for_update(&update) {
            Some(message) => {
                self.turn.request.messages.push(message.clone());
                Step::Yield(Ok(message), next)
            }
            None => Step::Continue(next),
        }
    }
}

/// Run one call; failures become an error payload the model can read
async fn run_call(functions: &[ResolvedFunction], call: &ToolCallContent) -> String {
    let Some(function) = functions.iter().find(|f| f.name == call.function_name) else {
        tracing::warn!(function = %call.function_name, "model called an unknown function");
        return error_payload(&format!("unknown function '{}'", call.function_name));
    };

    match function.invoke(&call.arguments).await {
        Ok(Value::String(text)) => text,
        Ok(value) => value.to_string(),
        Err(e) => {
            tracing::debug!(function = %call.function_name, error = %e, "tool call failed");
            error_payload(&e.to_string())
        }
    }
}

fn error_payload(message: &str) -> String {
    json!({ "error": message }).to_string()
}
