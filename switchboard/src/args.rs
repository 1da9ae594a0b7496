use std::path::PathBuf;

use clap::Parser;

/// Switchboard conversation runner
#[derive(Debug, Parser)]
#[command(name = "switchboard", about = "Run one conversation turn against a configured participant")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "switchboard.toml", env = "SWITCHBOARD_CONFIG")]
    pub config: PathBuf,

    /// Participant to answer; defaults to the first one configured
    #[arg(short, long, env = "SWITCHBOARD_PARTICIPANT")]
    pub participant: Option<String>,

    /// Offer the built-in demo tools to the model
    #[arg(long)]
    pub tools: bool,

    /// Surface tool calls instead of executing them
    #[arg(long, requires = "tools")]
    pub manual_tools: bool,

    /// User message to send
    #[arg(required = true)]
    pub prompt: Vec<String>,
}
