use uuid::Uuid;

/// Who runs tool calls the model requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToolExecutionMode {
    /// The engine invokes handlers and feeds results back to the model
    #[default]
    Auto,
    /// Tool calls are surfaced to the caller and nothing is executed
    Manual,
}

/// Identifies the conversation a call belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    /// Session identifier
    pub id: Uuid,
    /// Tool execution policy for this session
    pub tool_execution_mode: ToolExecutionMode,
}

impl SessionHandle {
    /// New session that executes tools automatically
    pub fn automatic() -> Self {
        Self {
            id: Uuid::new_v4(),
            tool_execution_mode: ToolExecutionMode::Auto,
        }
    }

    /// New session that only surfaces tool calls
    pub fn manual() -> Self {
        Self {
            id: Uuid::new_v4(),
            tool_execution_mode: ToolExecutionMode::Manual,
        }
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::automatic()
    }
}
