//! Image group.
//!
//! Validates that a URL actually serves an image and hands it to the UI as
//! an `image` artifact. Bytes are never embedded in the conversation; the
//! artifact carries the URL and the UI loads it directly.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use url::Url;

use concierge_store::TenantId;

use crate::args;
use crate::definition::ToolDefinition;
use crate::error::{Result, ToolError};
use crate::groups::ToolGroup;
use crate::outcome::{Artifact, ToolArguments, ToolOutcome};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Image retrieval tools.
pub struct ImageGroup {
    client: reqwest::Client,
}

impl ImageGroup {
    /// Create the group with its own HTTP client.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .user_agent(concat!("concierge/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
        }
    }

    fn parse_url(raw: &str, tool_name: &str) -> Result<Url> {
        let url = Url::parse(raw).map_err(|e| ToolError::InvalidArguments {
            tool_name: tool_name.to_string(),
            reason: format!("`{raw}` is not a valid URL: {e}"),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ToolError::InvalidArguments {
                tool_name: tool_name.to_string(),
                reason: format!("unsupported scheme `{}`: only http and https", url.scheme()),
            });
        }
        Ok(url)
    }

    /// Probe `url` and return its content type and size if it is an image.
    async fn probe(&self, url: &Url) -> std::result::Result<(String, Option<u64>), String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| format!("request to `{url}` failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("`{url}` answered with status {status}"));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(format!(
                "`{url}` serves `{content_type}`, not an image"
            ));
        }

        Ok((content_type, response.content_length()))
    }

    async fn image_fetch(&self, arguments: &ToolArguments) -> Result<ToolOutcome> {
        let raw = args::require_str(arguments, "url", "image_fetch")?;
        let caption = args::opt_str(arguments, "caption").map(str::to_string);
        let url = Self::parse_url(raw, "image_fetch")?;

        let (content_type, size_bytes) = match self.probe(&url).await {
            Ok(probed) => probed,
            Err(reason) => return Ok(ToolOutcome::failure(reason)),
        };

        let fields = json!({
            "url": url.as_str(),
            "content_type": content_type,
            "size_bytes": size_bytes,
        });

        Ok(ToolOutcome::success_json(fields).with_artifact(Artifact {
            kind: "image".into(),
            payload: json!({ "url": url.as_str(), "content_type": content_type }),
            caption,
        }))
    }

    async fn image_info(&self, arguments: &ToolArguments) -> Result<ToolOutcome> {
        let raw = args::require_str(arguments, "url", "image_info")?;
        let url = Self::parse_url(raw, "image_info")?;

        match self.probe(&url).await {
            Ok((content_type, size_bytes)) => Ok(ToolOutcome::success_json(json!({
                "url": url.as_str(),
                "content_type": content_type,
                "size_bytes": size_bytes,
            }))),
            Err(reason) => Ok(ToolOutcome::failure(reason)),
        }
    }
}

impl Default for ImageGroup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolGroup for ImageGroup {
    fn group_name(&self) -> &str {
        "image"
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                "image_fetch",
                "Show an image from a URL to the user after verifying it is an image.",
                json!({
                    "type": "object",
                    "properties": {
                        "url": { "type": "string", "description": "Absolute http(s) URL of the image" },
                        "caption": { "type": "string", "description": "Optional caption shown with the image" }
                    },
                    "required": ["url"]
                }),
            ),
            ToolDefinition::new(
                "image_info",
                "Check whether a URL serves an image and report its type and size.",
                json!({
                    "type": "object",
                    "properties": {
                        "url": { "type": "string", "description": "Absolute http(s) URL" }
                    },
                    "required": ["url"]
                }),
            ),
        ]
    }

    async fn execute(
        &self,
        _tenant: &TenantId,
        name: &str,
        arguments: &ToolArguments,
    ) -> Result<ToolOutcome> {
        match name {
            "image_fetch" => self.image_fetch(arguments).await,
            "image_info" => self.image_info(arguments).await,
            other => Err(ToolError::ExecutionFailed {
                tool_name: other.to_string(),
                reason: "not a member of the image group".into(),
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
    use serde_json::json;

    fn arguments(value: serde_json::Value) -> ToolArguments {
        value.as_object().unwrap().clone()
    }

    fn tenant() -> TenantId {
        TenantId::new("alice").unwrap()
    }

    #[tokio::test]
    async fn rejects_non_http_schemes() {
        let group = ImageGroup::new();
        let err = group
            .execute(
                &tenant(),
                "image_fetch",
                &arguments(json!({"url": "data:image/png;base64,AAAA"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_structured_failure() {
        let group = ImageGroup::new();
        let outcome = group
            .execute(
                &tenant(),
                "image_info",
                &arguments(json!({"url": "http://unreachable.invalid/cat.png"})),
            )
            .await
            .unwrap();
        assert!(!outcome.is_success());
        assert!(outcome.artifact().is_none());
    }
}
