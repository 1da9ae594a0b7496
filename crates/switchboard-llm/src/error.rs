use thiserror::Error;

/// Errors surfaced by engines, the tool resolver, and provider backends
#[derive(Debug, Error)]
pub enum LlmError {
    /// Caller passed unusable input (empty conversation, bad construction data)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Two modules expose the same function name and auto-resolution is off
    #[error("tool name conflict: function '{function}' is defined more than once (first in module '{module}')")]
    ToolNameConflict {
        /// The duplicated function name
        function: String,
        /// First module, in encounter order, that defines it
        module: String,
    },

    /// Named provider does not exist in configuration
    #[error("provider not found: {provider}")]
    ProviderNotFound { provider: String },

    /// Named provider exists but is switched off
    #[error("provider disabled: {provider}")]
    ProviderDisabled { provider: String },

    /// Provider rejected or failed the request
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Transport or decoding failure while the response was streaming
    #[error("streaming error: {0}")]
    Streaming(String),

    /// The caller's cancellation token fired
    #[error("operation cancelled")]
    Cancelled,

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LlmError {
    /// Whether the error came from the provider transport
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Streaming(_))
    }

    /// Whether the error is a cancellation rather than a failure
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
