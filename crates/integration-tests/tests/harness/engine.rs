//! Engine construction and stream collection helpers

use futures_util::StreamExt;
use switchboard_config::Config;
use switchboard_llm::{DomainMessage, Engine, EngineFactory, LlmError, MessageStream, Participant};

/// Build an engine for a configured participant
pub fn engine_for(config: &Config, participant: &str) -> Engine {
    let participant_config = config.participant(participant).expect("participant is configured");
    let participant = Participant::from_config(participant, participant_config);

    EngineFactory::from_config(config)
        .create(&participant)
        .expect("engine can be created")
}

/// Drain a message stream
pub async fn collect(stream: MessageStream) -> Vec<Result<DomainMessage, LlmError>> {
    stream.collect().await
}

/// Drain a message stream that is expected to succeed
pub async fn collect_ok(stream: MessageStream) -> Vec<DomainMessage> {
    collect(stream)
        .await
        .into_iter()
        .map(|m| m.expect("stream item is a message"))
        .collect()
}
