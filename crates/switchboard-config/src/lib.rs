#![allow(clippy::must_use_candidate)]

mod env;
pub mod llm;
mod loader;
pub mod participant;
pub mod telemetry;
pub mod tools;

use indexmap::IndexMap;
use serde::Deserialize;

pub use llm::*;
pub use participant::*;
pub use telemetry::{LogFormat, TelemetryConfig};
pub use tools::*;

/// Top-level Switchboard configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// LLM provider records
    #[serde(default)]
    pub llm: LlmConfig,
    /// Conversation participants keyed by name
    #[serde(default)]
    pub participants: IndexMap<String, ParticipantConfig>,
    /// Host-level tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Look up a participant by name
    pub fn participant(&self, name: &str) -> Option<&ParticipantConfig> {
        self.participants.get(name)
    }
}
