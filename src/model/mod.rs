//! Conversation protocol with the computer-use model.
//!
//! Re-expresses the vendor candidate/part/function-call object model as plain
//! serde types: a transcript entry is a [`Content`] (role + ordered parts),
//! and a [`Part`] is one of text, inline image, action request
//! ([`FunctionCall`]) or action response ([`FunctionResponse`]). Field names
//! serialize camelCase to match the REST wire format.

mod client;

pub use client::{GeminiClient, ModelBackend, ModelError};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Conversation role. The local side always speaks as `user`, including when
/// returning action responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One transcript entry: a role plus its ordered parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }

    /// All text parts joined with spaces, in order.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Action requests contained in this entry, in emission order.
    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.parts.iter().filter_map(|p| match p {
            Part::FunctionCall(c) => Some(c),
            _ => None,
        })
    }

    pub fn has_function_calls(&self) -> bool {
        self.function_calls().next().is_some()
    }
}

/// One part of a transcript entry.
///
/// Externally tagged so it serializes as `{"text": ...}`,
/// `{"inlineData": {...}}`, `{"functionCall": {...}}` or
/// `{"functionResponse": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    InlineData(Blob),
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResponse),
}

impl Part {
    /// Wrap raw PNG bytes as an inline image part.
    pub fn png(bytes: &[u8]) -> Self {
        Part::InlineData(Blob::png(bytes))
    }
}

/// Base64-encoded binary payload with its mime type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

impl Blob {
    pub fn png(bytes: &[u8]) -> Self {
        Self {
            mime_type: "image/png".to_string(),
            data: BASE64.encode(bytes),
        }
    }
}

/// A model-issued action request: a named operation plus an argument map.
/// Immutable once issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl FunctionCall {
    /// Safety-review explanation, if the model attached one to this request.
    pub fn safety_review(&self) -> Option<String> {
        let decision = self.args.get("safety_decision")?;
        let explanation = decision
            .get("explanation")
            .and_then(Value::as_str)
            .unwrap_or("(no explanation)");
        Some(explanation.to_string())
    }
}

/// The local response to one action request: outcome payload plus the
/// post-action screenshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    pub name: String,
    pub response: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<FunctionResponsePart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponsePart {
    pub inline_data: Blob,
}

/// Tool-capability declaration sent with every model request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computer_use: Option<ComputerUse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_declarations: Option<Vec<FunctionDeclaration>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputerUse {
    pub environment: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The standard computer-use toolset: the browser environment plus a custom
/// script-execution function.
pub(crate) fn default_tools() -> Vec<Tool> {
    vec![
        Tool {
            computer_use: Some(ComputerUse {
                environment: "ENVIRONMENT_BROWSER".to_string(),
            }),
            function_declarations: None,
        },
        Tool {
            computer_use: None,
            function_declarations: Some(vec![FunctionDeclaration {
                name: "run_script".to_string(),
                description: "Evaluate JavaScript in the context of the current page and \
                              return its result."
                    .to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "code": {
                            "type": "string",
                            "description": "JavaScript source to evaluate"
                        }
                    },
                    "required": ["code"]
                }),
            }]),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_union_uses_wire_tags() {
        let call = Part::FunctionCall(FunctionCall {
            name: "click_at".into(),
            args: serde_json::json!({"x": 500, "y": 500})
                .as_object()
                .cloned()
                .unwrap(),
        });
        let wire = serde_json::to_value(&call).unwrap();
        assert!(wire.get("functionCall").is_some());
        assert_eq!(wire["functionCall"]["name"], "click_at");

        let image = Part::png(&[0x89, 0x50]);
        let wire = serde_json::to_value(&image).unwrap();
        assert_eq!(wire["inlineData"]["mimeType"], "image/png");
    }

    #[test]
    fn model_reply_deserializes_from_wire_shape() {
        let raw = serde_json::json!({
            "role": "model",
            "parts": [
                {"text": "Clicking the contact link."},
                {"functionCall": {"name": "click_at", "args": {"x": 120, "y": 840}}}
            ]
        });
        let content: Content = serde_json::from_value(raw).unwrap();
        assert_eq!(content.role, Role::Model);
        assert!(content.has_function_calls());
        assert_eq!(content.text(), "Clicking the contact link.");
        let calls: Vec<_> = content.function_calls().collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "click_at");
    }

    #[test]
    fn function_response_keeps_image_part() {
        let response = Part::FunctionResponse(FunctionResponse {
            name: "navigate".into(),
            response: serde_json::json!({"url": "https://example.com", "success": true})
                .as_object()
                .cloned()
                .unwrap(),
            parts: vec![FunctionResponsePart {
                inline_data: Blob::png(b"fake"),
            }],
        });
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["functionResponse"]["name"], "navigate");
        assert_eq!(
            wire["functionResponse"]["parts"][0]["inlineData"]["mimeType"],
            "image/png"
        );
    }

    #[test]
    fn safety_review_reads_explanation() {
        let call = FunctionCall {
            name: "click_at".into(),
            args: serde_json::json!({
                "x": 1, "y": 2,
                "safety_decision": {"explanation": "purchase button", "decision": "require_confirmation"}
            })
            .as_object()
            .cloned()
            .unwrap(),
        };
        assert_eq!(call.safety_review().as_deref(), Some("purchase button"));

        let plain = FunctionCall {
            name: "wait_5_seconds".into(),
            args: Map::new(),
        };
        assert!(plain.safety_review().is_none());
    }
}
