use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// End user, also used for tool results fed back to the model
    User,
    /// Model output
    Assistant,
    /// System instruction
    System,
    /// Developer instruction (higher priority than user, lower than system)
    Developer,
    /// Anything the host could not classify
    #[serde(other)]
    Unknown,
}

/// Whether a message is conversation content or a host-side annotation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Regular conversation content, sent to providers
    #[default]
    Normal,
    /// Host annotation; never sent to a provider
    Information,
}

/// Kind of payload carried by a [`BinaryPart`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PartKind {
    Text,
    Image,
    Audio,
    Video,
    File,
    ToolCall,
    ToolCallResult,
    Thinking,
    SubsessionId,
    HostSessionMessage,
}

/// A typed attachment on a [`DomainMessage`]
///
/// Media parts use the MIME type as `name`. Tool call and tool result parts
/// carry JSON-encoded [`ToolCallContent`] / [`ToolResultContent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryPart {
    /// Part name (MIME type for media, function name or call id for tools)
    pub name: String,
    /// Payload kind
    pub kind: PartKind,
    /// Raw payload bytes
    pub data: Vec<u8>,
}

impl BinaryPart {
    /// Create a part from raw bytes
    pub fn new(name: impl Into<String>, kind: PartKind, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            kind,
            data: data.into(),
        }
    }

    /// Encode a tool call request as a part
    pub fn tool_call(call: &ToolCallContent) -> Self {
        Self::new(
            call.function_name.clone(),
            PartKind::ToolCall,
            serde_json::to_vec(call).unwrap_or_default(),
        )
    }

    /// Encode a tool call result as a part
    pub fn tool_result(result: &ToolResultContent) -> Self {
        Self::new(
            result.call_id.clone(),
            PartKind::ToolCallResult,
            serde_json::to_vec(result).unwrap_or_default(),
        )
    }

    /// Decode the tool call carried by this part, if it is one
    pub fn as_tool_call(&self) -> Option<ToolCallContent> {
        (self.kind == PartKind::ToolCall)
            .then(|| serde_json::from_slice(&self.data).ok())
            .flatten()
    }

    /// Decode the tool result carried by this part, if it is one
    pub fn as_tool_result(&self) -> Option<ToolResultContent> {
        (self.kind == PartKind::ToolCallResult)
            .then(|| serde_json::from_slice(&self.data).ok())
            .flatten()
    }

    /// Payload as UTF-8 text, if it decodes
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

/// A model's request to invoke a function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallContent {
    /// Provider-assigned call identifier
    pub call_id: String,
    /// Name of the function as advertised to the provider
    pub function_name: String,
    /// Decoded arguments; a JSON string when the provider sent malformed JSON
    pub arguments: Value,
}

impl ToolCallContent {
    /// Arguments serialized for wire formats that expect a JSON string
    pub fn arguments_json(&self) -> String {
        match &self.arguments {
            Value::String(raw) => raw.clone(),
            other => other.to_string(),
        }
    }
}

/// Output of an executed function, keyed by the originating call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultContent {
    /// Identifier of the call this result answers
    pub call_id: String,
    /// Result payload as text (usually JSON)
    pub result: String,
}

/// Canonical, provider-agnostic unit of conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainMessage {
    /// Author role
    pub role: Role,
    /// Text content, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Ordered attachments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<BinaryPart>,
    /// Content or annotation
    #[serde(default)]
    pub message_type: MessageType,
}

impl DomainMessage {
    /// Plain text message
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: Some(text.into()),
            parts: Vec::new(),
            message_type: MessageType::Normal,
        }
    }

    /// User text message
    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    /// Assistant text message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    /// System text message
    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    /// Host-side annotation that providers never see
    pub fn information(text: impl Into<String>) -> Self {
        Self {
            message_type: MessageType::Information,
            ..Self::text(Role::System, text)
        }
    }

    /// Message with attachments and no text
    pub fn with_parts(role: Role, parts: Vec<BinaryPart>) -> Self {
        Self {
            role,
            text: None,
            parts,
            message_type: MessageType::Normal,
        }
    }

    /// Append an attachment
    #[must_use]
    pub fn with_part(mut self, part: BinaryPart) -> Self {
        self.parts.push(part);
        self
    }

    /// Whether providers should see this message
    pub fn is_conversational(&self) -> bool {
        self.message_type == MessageType::Normal
    }

    /// Tool calls carried by this message, in part order
    pub fn tool_calls(&self) -> impl Iterator<Item = ToolCallContent> + '_ {
        self.parts.iter().filter_map(BinaryPart::as_tool_call)
    }

    /// Tool results carried by this message, in part order
    pub fn tool_results(&self) -> impl Iterator<Item = ToolResultContent> + '_ {
        self.parts.iter().filter_map(BinaryPart::as_tool_result)
    }

    /// Text content followed by any UTF-8 text parts, concatenated
    pub fn full_text(&self) -> String {
        let mut out = self.text.clone().unwrap_or_default();
        for part in self.parts.iter().filter(|p| p.kind == PartKind::Text) {
            if let Some(text) = part.as_text() {
                out.push_str(text);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn tool_call_part_encodes_camel_case_json() {
        let call = ToolCallContent {
            call_id: "call_123".to_owned(),
            function_name: "get_weather".to_owned(),
            arguments: json!({"location": "New York"}),
        };

        let part = BinaryPart::tool_call(&call);
        let decoded: Value = serde_json::from_slice(&part.data).unwrap();

        assert_eq!(part.kind, PartKind::ToolCall);
        assert_eq!(decoded["callId"], "call_123");
        assert_eq!(decoded["functionName"], "get_weather");
        assert_eq!(decoded["arguments"]["location"], "New York");
        assert_eq!(part.as_tool_call(), Some(call));
    }

    #[test]
    fn tool_result_part_is_not_a_tool_call() {
        let part = BinaryPart::tool_result(&ToolResultContent {
            call_id: "call_1".to_owned(),
            result: "42".to_owned(),
        });

        assert!(part.as_tool_call().is_none());
        assert_eq!(part.as_tool_result().unwrap().result, "42");
    }

    #[test]
    fn malformed_arguments_round_trip_as_raw_string() {
        let call = ToolCallContent {
            call_id: "c".to_owned(),
            function_name: "f".to_owned(),
            arguments: Value::String("{\"city\": ".to_owned()),
        };
        assert_eq!(call.arguments_json(), "{\"city\": ");
    }

    #[test]
    fn information_messages_are_not_conversational() {
        assert!(!DomainMessage::information("round limit").is_conversational());
        assert!(DomainMessage::user("hi").is_conversational());
    }

    #[test]
    fn unknown_role_deserializes_to_unknown() {
        let role: Role = serde_json::from_str("\"critic\"").unwrap();
        assert_eq!(role, Role::Unknown);
        assert_eq!(Role::Developer.to_string(), "developer");
    }

    #[test]
    fn full_text_joins_text_parts() {
        let message = DomainMessage::user("see ").with_part(BinaryPart::new("note", PartKind::Text, "attached"));
        assert_eq!(message.full_text(), "see attached");
    }
}
