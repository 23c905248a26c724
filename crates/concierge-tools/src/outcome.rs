//! The discriminated result every tool invocation produces.
//!
//! Success and failure are structurally distinct variants rather than a
//! convention on a loose JSON map. On the wire the outcome keeps the stable
//! contract shared by all handler groups: `{"success": true, ...fields}` or
//! `{"success": false, "error": "..."}`, with an optional `artifact` field
//! that is a display directive, not an error channel.

use serde_json::{Map, Value, json};

/// Flat string-keyed argument map handed to every tool.
pub type ToolArguments = Map<String, Value>;

/// A renderable payload a tool emits alongside its result (e.g. a QR code
/// or a generated image reference). Rendering is the caller's concern.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Artifact {
    /// Artifact kind, e.g. `"qr"` or `"image"`.
    pub kind: String,
    /// Kind-specific payload.
    pub payload: Value,
    /// Optional caption to render next to the artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// The result of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// The tool did its work. `fields` carries arbitrary structured output;
    /// `artifact` optionally carries something for the UI to render.
    Success {
        fields: Map<String, Value>,
        artifact: Option<Artifact>,
    },
    /// The tool could not do its work. The message is model-visible.
    Failure { error: String },
}

impl ToolOutcome {
    /// Successful outcome with the given fields and no artifact.
    pub fn success(fields: Map<String, Value>) -> Self {
        Self::Success {
            fields,
            artifact: None,
        }
    }

    /// Successful outcome built from a JSON object literal.
    ///
    /// Non-object values are wrapped under a `"value"` key so the wire shape
    /// stays a flat map.
    pub fn success_json(value: Value) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".into(), other);
                map
            }
        };
        Self::success(fields)
    }

    /// Failed outcome with a model-visible message.
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    /// Attach an artifact to a successful outcome. No-op on failures —
    /// artifacts never accompany errors.
    pub fn with_artifact(self, artifact: Artifact) -> Self {
        match self {
            Self::Success { fields, .. } => Self::Success {
                fields,
                artifact: Some(artifact),
            },
            failure @ Self::Failure { .. } => failure,
        }
    }

    /// Whether this outcome is the success variant.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The attached artifact, if any.
    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            Self::Success { artifact, .. } => artifact.as_ref(),
            Self::Failure { .. } => None,
        }
    }

    /// Serialize to the stable wire shape.
    pub fn to_wire(&self) -> Value {
        match self {
            Self::Success { fields, artifact } => {
                let mut map = Map::new();
                map.insert("success".into(), json!(true));
                for (k, v) in fields {
                    map.insert(k.clone(), v.clone());
                }
                if let Some(artifact) = artifact {
                    map.insert(
                        "artifact".into(),
                        serde_json::to_value(artifact).unwrap_or(Value::Null),
                    );
                }
                Value::Object(map)
            }
            Self::Failure { error } => json!({
                "success": false,
                "error": error,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_wire_shape() {
        let outcome = ToolOutcome::success_json(json!({"count": 3}));
        let wire = outcome.to_wire();
        assert_eq!(wire["success"], json!(true));
        assert_eq!(wire["count"], json!(3));
        assert!(wire.get("artifact").is_none());
    }

    #[test]
    fn failure_wire_shape() {
        let wire = ToolOutcome::failure("missing field").to_wire();
        assert_eq!(wire["success"], json!(false));
        assert_eq!(wire["error"], json!("missing field"));
    }

    #[test]
    fn artifact_coexists_with_success() {
        let outcome = ToolOutcome::success_json(json!({"ok": 1})).with_artifact(Artifact {
            kind: "qr".into(),
            payload: json!({"data": "BCD..."}),
            caption: Some("Scan to pay".into()),
        });
        let wire = outcome.to_wire();
        assert_eq!(wire["success"], json!(true));
        assert_eq!(wire["artifact"]["kind"], json!("qr"));
    }

    #[test]
    fn artifact_never_attaches_to_failure() {
        let outcome = ToolOutcome::failure("no").with_artifact(Artifact {
            kind: "qr".into(),
            payload: json!({}),
            caption: None,
        });
        assert!(outcome.artifact().is_none());
    }

    #[test]
    fn non_object_success_is_wrapped() {
        let wire = ToolOutcome::success_json(json!("plain text")).to_wire();
        assert_eq!(wire["value"], json!("plain text"));
    }
}
