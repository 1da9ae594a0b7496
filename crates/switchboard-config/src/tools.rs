use serde::Deserialize;

/// Host-level tool settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Rename colliding function names instead of failing the request
    #[serde(default = "default_auto_resolve")]
    pub auto_resolve_conflicts: bool,
    /// Upper bound on model/tool round trips per turn in automatic mode
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            auto_resolve_conflicts: default_auto_resolve(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

const fn default_auto_resolve() -> bool {
    true
}

const fn default_max_tool_rounds() -> u32 {
    8
}
