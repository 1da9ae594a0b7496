#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;
mod tools;

use std::io::Write;

use anyhow::Context;
use args::Args;
use clap::Parser;
use futures_util::StreamExt;
use switchboard_config::Config;
use switchboard_llm::{DomainMessage, EngineFactory, MessageType, Participant, PartKind, SessionHandle};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    switchboard_telemetry::init(&config.telemetry)?;

    let (name, participant_config) = match &args.participant {
        Some(name) => (
            name.as_str(),
            config
                .participant(name)
                .with_context(|| format!("participant '{name}' is not configured"))?,
        ),
        None => config
            .participants
            .first()
            .map(|(name, participant)| (name.as_str(), participant))
            .context("no participants configured")?,
    };
    let participant = Participant::from_config(name, participant_config);

    tracing::info!(
        config_path = %args.config.display(),
        participant = %participant.name,
        "starting switchboard"
    );

    let engine = EngineFactory::from_config(&config).create(&participant)?;

    let catalog = args.tools.then(tools::catalog);
    let session = if args.manual_tools {
        SessionHandle::manual()
    } else {
        SessionHandle::automatic()
    };

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        interrupt_signal().await;
        cancel_on_signal.cancel();
    });

    let conversation = [DomainMessage::user(args.prompt.join(" "))];
    let mut stream = engine.get_message(&conversation, catalog.as_ref(), &session, cancel)?;

    let mut stdout = std::io::stdout().lock();
    while let Some(message) = stream.next().await {
        let message = message?;
        render(&mut stdout, &message)?;
    }
    writeln!(stdout)?;

    if let Some(usage) = engine.last_usage() {
        tracing::info!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            total_tokens = usage.total_tokens,
            "turn complete"
        );
    }

    Ok(())
}

/// Print one streamed message
fn render(out: &mut impl Write, message: &DomainMessage) -> std::io::Result<()> {
    if message.message_type == MessageType::Information {
        return writeln!(out, "\n[{}]", message.full_text());
    }

    for call in message.tool_calls() {
        writeln!(out, "\n-> {}({})", call.function_name, call.arguments_json())?;
    }
    for result in message.tool_results() {
        writeln!(out, "<- {}: {}", result.call_id, result.result)?;
    }
    if message.parts.iter().any(|p| p.kind == PartKind::Thinking) {
        return Ok(());
    }

    if let Some(text) = &message.text {
        write!(out, "{text}")?;
        out.flush()?;
    }

    Ok(())
}

/// Wait for `SIGINT`
async fn interrupt_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }

    tracing::info!("interrupt received, cancelling turn");
}

#[cfg(test)]
mod tests {
    use switchboard_llm::{BinaryPart, Role, ToolCallContent};

    use super::*;

    fn rendered(message: &DomainMessage) -> String {
        let mut out = Vec::new();
        render(&mut out, message).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn renders_text_and_calls() {
        assert_eq!(rendered(&DomainMessage::assistant("Hello")), "Hello");

        let call = ToolCallContent {
            call_id: "c1".to_owned(),
            function_name: "current_time".to_owned(),
            arguments: serde_json::json!({"timezone": "UTC"}),
        };
        let message = DomainMessage::with_parts(Role::Assistant, vec![BinaryPart::tool_call(&call)]);
        assert_eq!(rendered(&message), "\n-> current_time({\"timezone\":\"UTC\"})\n");
    }

    #[test]
    fn information_is_bracketed() {
        assert_eq!(rendered(&DomainMessage::information("limit reached")), "\n[limit reached]\n");
    }
}
