//! Web fetch group.
//!
//! `web_fetch` pulls a page and converts HTML to readable text before it
//! reaches the conversation; `web_head` probes a URL without downloading
//! the body. Only `http` and `https` schemes are accepted.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;
use url::Url;

use concierge_store::TenantId;

use crate::args;
use crate::definition::ToolDefinition;
use crate::error::{Result, ToolError};
use crate::groups::ToolGroup;
use crate::outcome::{ToolArguments, ToolOutcome};

/// Maximum characters of page text returned to the model.
const MAX_TEXT_CHARS: usize = 24_000;

/// Render width for the HTML-to-text conversion.
const RENDER_COLUMNS: usize = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// HTTP retrieval tools.
pub struct WebFetchGroup {
    client: reqwest::Client,
}

impl WebFetchGroup {
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

    async fn web_fetch(&self, arguments: &ToolArguments) -> Result<ToolOutcome> {
        let raw = args::require_str(arguments, "url", "web_fetch")?;
        let url = Self::parse_url(raw, "web_fetch")?;

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                return Ok(ToolOutcome::failure(format!("request to `{url}` failed: {e}")));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(ToolOutcome::failure(format!(
                "`{url}` answered with status {status}"
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/plain")
            .to_string();

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Ok(ToolOutcome::failure(format!(
                    "reading body of `{url}` failed: {e}"
                )));
            }
        };

        let text = if content_type.contains("text/html") {
            match html2text::from_read(body.as_bytes(), RENDER_COLUMNS) {
                Ok(text) => text,
                Err(e) => {
                    return Ok(ToolOutcome::failure(format!(
                        "converting `{url}` to text failed: {e}"
                    )));
                }
            }
        } else {
            body
        };

        let total_chars = text.chars().count();
        let truncated = total_chars > MAX_TEXT_CHARS;
        let content: String = text.chars().take(MAX_TEXT_CHARS).collect();
        debug!(url = %url, chars = total_chars, truncated, "page fetched");

        Ok(ToolOutcome::success_json(json!({
            "url": url.as_str(),
            "content_type": content_type,
            "content": content,
            "truncated": truncated,
        })))
    }

    async fn web_head(&self, arguments: &ToolArguments) -> Result<ToolOutcome> {
        let raw = args::require_str(arguments, "url", "web_head")?;
        let url = Self::parse_url(raw, "web_head")?;

        let response = match self.client.head(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                return Ok(ToolOutcome::failure(format!("request to `{url}` failed: {e}")));
            }
        };

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = response.content_length();

        Ok(ToolOutcome::success_json(json!({
            "url": url.as_str(),
            "status": response.status().as_u16(),
            "content_type": content_type,
            "content_length": content_length,
        })))
    }
}

impl Default for WebFetchGroup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolGroup for WebFetchGroup {
    fn group_name(&self) -> &str {
        "web-fetch"
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let url_schema = json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "Absolute http(s) URL" }
            },
            "required": ["url"]
        });

        vec![
            ToolDefinition::new(
                "web_fetch",
                "Fetch a web page and return its content as readable text.",
                url_schema.clone(),
            ),
            ToolDefinition::new(
                "web_head",
                "Probe a URL without downloading it: status, content type, and size.",
                url_schema,
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
            "web_fetch" => self.web_fetch(arguments).await,
            "web_head" => self.web_head(arguments).await,
            other => Err(ToolError::ExecutionFailed {
                tool_name: other.to_string(),
                reason: "not a member of the web-fetch group".into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
