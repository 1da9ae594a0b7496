use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Tools offered to the model, grouped by owning module in insertion order
pub type ToolCatalog = IndexMap<String, Vec<ToolDescriptor>>;

/// Failure raised by a tool handler
#[derive(Debug, Error)]
pub enum ToolError {
    /// The model supplied arguments the tool cannot use
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    /// The tool ran and failed
    #[error("tool execution failed: {0}")]
    Execution(String),
}

/// Invocable body of a tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool with decoded JSON arguments
    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value, ToolError>;
}

/// Adapts an async closure into a [`ToolHandler`]
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ToolError>> + Send,
{
    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        (self.0)(arguments).await
    }
}

/// One declared parameter of a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    /// Parameter name
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// JSON Schema type (`string`, `integer`, `number`, `boolean`, `object`, `array`)
    #[serde(rename = "type")]
    pub param_type: String,
    /// Whether the model must supply it
    #[serde(default)]
    pub required: bool,
    /// Value used when the model omits it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolParameter {
    /// A required parameter
    pub fn required(name: impl Into<String>, param_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            param_type: param_type.into(),
            required: true,
            default: None,
        }
    }

    /// An optional parameter with an optional default
    pub fn optional(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
        default: Option<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            param_type: param_type.into(),
            required: false,
            default,
        }
    }
}

/// A function a module offers to the model
#[derive(Clone)]
pub struct ToolDescriptor {
    /// Function name as the module declares it
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Declared parameters, in order
    pub parameters: Vec<ToolParameter>,
    /// Owning module
    pub module: String,
    /// Invocable body
    pub handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("parameters", &self.parameters.len())
            .finish_non_exhaustive()
    }
}

impl ToolDescriptor {
    /// Create a descriptor with no parameters
    pub fn new(
        module: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            module: module.into(),
            handler,
        }
    }

    /// Create a descriptor backed by an async closure
    pub fn from_fn<F, Fut>(module: impl Into<String>, name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self::new(module, name, description, Arc::new(FnHandler(f)))
    }

    /// Add a parameter
    #[must_use]
    pub fn with_parameter(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// JSON Schema object describing the parameters
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for parameter in &self.parameters {
            let mut property = Map::new();
            property.insert("type".to_owned(), Value::String(parameter.param_type.clone()));

            if !parameter.description.is_empty() {
                property.insert("description".to_owned(), Value::String(parameter.description.clone()));
            }

            if let Some(default) = &parameter.default {
                property.insert("default".to_owned(), default.clone());
            }

            properties.insert(parameter.name.clone(), Value::Object(property));

            if parameter.required {
                required.push(Value::String(parameter.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Fill in declared defaults the model omitted
    pub fn apply_defaults(&self, arguments: &mut Map<String, Value>) {
        for parameter in &self.parameters {
            if let Some(default) = &parameter.default {
                arguments
                    .entry(parameter.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
    }
}

/// Function advertised to a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Name, unique within one request
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema for the parameters
    pub parameters: Value,
}
