//! Scripted provider server for integration tests
//!
//! Serves `OpenAI` chat completions and Google `streamGenerateContent` as
//! SSE. Each request pops the next scripted reply and is recorded for
//! later inspection.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// One canned reply
#[derive(Debug, Clone)]
pub enum Reply {
    /// SSE stream of JSON chunks, optionally terminated by `[DONE]`
    Stream { chunks: Vec<Value>, done_marker: bool },
    /// Non-success status with a JSON body
    Error { status: StatusCode, body: Value },
}

impl Reply {
    /// `OpenAI`-style stream ending with `[DONE]`
    pub fn openai(chunks: Vec<Value>) -> Self {
        Self::Stream {
            chunks,
            done_marker: true,
        }
    }

    /// `OpenAI`-style stream cut off before `[DONE]`
    pub fn openai_unterminated(chunks: Vec<Value>) -> Self {
        Self::Stream {
            chunks,
            done_marker: false,
        }
    }

    /// Google-style stream with no terminator
    pub fn google(chunks: Vec<Value>) -> Self {
        Self::Stream {
            chunks,
            done_marker: false,
        }
    }

    pub fn error(status: StatusCode, message: &str) -> Self {
        Self::Error {
            status,
            body: json!({"error": {"message": message, "type": "server_error"}}),
        }
    }
}

/// A request as the mock received it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Value,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Mock provider that replays scripted replies
pub struct MockLlm {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockLlmState>,
}

#[derive(Default)]
struct MockLlmState {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockLlm {
    /// Start the mock server with replies served in order
    pub async fn start(replies: Vec<Reply>) -> anyhow::Result<Self> {
        let state = Arc::new(MockLlmState {
            replies: Mutex::new(replies.into()),
            requests: Mutex::default(),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_openai))
            .route("/v1beta/models/{action}", routing::post(handle_google))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for an `OpenAI`-compatible provider record
    pub fn openai_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Base URL for a Google provider record
    pub fn google_url(&self) -> String {
        format!("http://{}/v1beta", self.addr)
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

impl Drop for MockLlm {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// -- Handlers --

async fn handle_openai(State(state): State<Arc<MockLlmState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    reply(&state, "/v1/chat/completions".to_owned(), headers, body)
}

async fn handle_google(
    State(state): State<Arc<MockLlmState>>,
    axum::extract::Path(action): axum::extract::Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    reply(&state, format!("/v1beta/models/{action}"), headers, body)
}

fn reply(state: &MockLlmState, path: String, headers: HeaderMap, body: Value) -> Response {
    state.requests.lock().unwrap().push(RecordedRequest { path, headers, body });

    let next = state.replies.lock().unwrap().pop_front();
    match next {
        Some(Reply::Stream { chunks, done_marker }) => sse_response(&chunks, done_marker),
        Some(Reply::Error { status, body }) => (status, Json(body)).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "no scripted reply left"}))).into_response(),
    }
}

fn sse_response(chunks: &[Value], done_marker: bool) -> Response {
    let mut body = String::new();
    for chunk in chunks {
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    if done_marker {
        body.push_str("data: [DONE]\n\n");
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from(body))
        .unwrap()
}

// -- OpenAI chunk builders --

pub fn openai_text(delta: &str) -> Value {
    json!({
        "id": "chatcmpl-test-stream",
        "object": "chat.completion.chunk",
        "model": "mock-model",
        "choices": [{"index": 0, "delta": {"content": delta}}]
    })
}

pub fn openai_tool_call(index: u32, id: &str, name: &str, arguments: &str) -> Value {
    json!({
        "id": "chatcmpl-test-stream",
        "object": "chat.completion.chunk",
        "model": "mock-model",
        "choices": [{"index": 0, "delta": {"tool_calls": [{
            "index": index,
            "id": id,
            "type": "function",
            "function": {"name": name, "arguments": arguments}
        }]}}]
    })
}

pub fn openai_arguments(index: u32, fragment: &str) -> Value {
    json!({
        "id": "chatcmpl-test-stream",
        "object": "chat.completion.chunk",
        "model": "mock-model",
        "choices": [{"index": 0, "delta": {"tool_calls": [{
            "index": index,
            "function": {"arguments": fragment}
        }]}}]
    })
}

pub fn openai_finish(reason: &str) -> Value {
    json!({
        "id": "chatcmpl-test-stream",
        "object": "chat.completion.chunk",
        "model": "mock-model",
        "choices": [{"index": 0, "delta": {}, "finish_reason": reason}]
    })
}

pub fn openai_usage(prompt: u32, completion: u32) -> Value {
    json!({
        "id": "chatcmpl-test-stream",
        "object": "chat.completion.chunk",
        "model": "mock-model",
        "choices": [],
        "usage": {"prompt_tokens": prompt, "completion_tokens": completion, "total_tokens": prompt + completion}
    })
}

// -- Google chunk builders --

pub fn google_text(text: &str) -> Value {
    json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
}

pub fn google_function_call(name: &str, args: Value) -> Value {
    json!({"candidates": [{"content": {"role": "model", "parts": [{"functionCall": {"name": name, "args": args}}]}}]})
}

pub fn google_finish(prompt: u32, candidates: u32) -> Value {
    json!({
        "candidates": [{"content": {"role": "model", "parts": []}, "finishReason": "STOP"}],
        "usageMetadata": {
            "promptTokenCount": prompt,
            "candidatesTokenCount": candidates,
            "totalTokenCount": prompt + candidates
        }
    })
}
