//! Page crawler tool.
//!
//! Fetches a single url and returns its readable content as markdown,
//! truncated to the configured character budget. The body is streamed and
//! reading stops once a byte budget derived from that character budget is
//! spent, so oversized pages are never held in memory whole.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use sleuth_config::CrawlerConfig;
use sleuth_core::error::ToolError;
use sleuth_core::tool::{ParamType, ParameterSchema, Tool, ToolOutput};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::html::{to_markdown, truncate_chars};

const TOOL_NAME: &str = "crawl_page";

/// Raw bytes read per output character; markup is dropped on conversion.
const BYTES_PER_CHAR: usize = 16;
const MIN_BODY_BYTES: usize = 64 * 1024;

pub struct CrawlPageTool {
    client: reqwest::Client,
    timeout_secs: u64,
    max_chars: usize,
}

impl CrawlPageTool {
    pub fn new(config: &CrawlerConfig, user_agent: &str) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| failed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs: config.timeout_secs,
            max_chars: config.max_chars,
        })
    }

    /// Fetch `url` and return it as markdown.
    pub async fn fetch(&self, url: &str) -> Result<String, ToolError> {
        let url = validate_url(url)?;

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                failed(format!("request to {url} timed out after {} seconds", self.timeout_secs))
            } else {
                failed(format!("request to {url} failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("{url} answered with HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_ascii_lowercase();
        let kind = ContentKind::from_header(&content_type)
            .ok_or_else(|| failed(format!("unsupported content type '{content_type}' at {url}")))?;

        let body = read_capped(response.bytes_stream(), body_budget(self.max_chars))
            .await
            .map_err(|e| failed(format!("failed to read body of {url}: {e}")))?;

        let text = match kind {
            ContentKind::Html => to_markdown(&body),
            ContentKind::Text => body.trim().to_string(),
        };
        debug!(url = %url, chars = text.len(), "Page crawled");

        if text.is_empty() {
            return Ok(format!("No readable content found at {url}."));
        }
        Ok(truncate_chars(&text, self.max_chars))
    }
}

fn body_budget(max_chars: usize) -> usize {
    max_chars.saturating_mul(BYTES_PER_CHAR).max(MIN_BODY_BYTES)
}

/// Read a body stream until it ends or `budget` bytes have arrived.
/// A multi-byte character cut by the budget is dropped.
async fn read_capped<S, B, E>(stream: S, budget: usize) -> Result<String, E>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    let mut stream = std::pin::pin!(stream);
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let room = budget - body.len();
        let bytes = chunk.as_ref();
        if bytes.len() >= room {
            body.extend_from_slice(&bytes[..room]);
            if let Err(e) = std::str::from_utf8(&body) {
                if e.error_len().is_none() {
                    body.truncate(e.valid_up_to());
                }
            }
            debug!(budget, "Body budget reached, stopped reading");
            break;
        }
        body.extend_from_slice(bytes);
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

enum ContentKind {
    Html,
    Text,
}

impl ContentKind {
    fn from_header(content_type: &str) -> Option<Self> {
        let mime = content_type.split(';').next().unwrap_or("").trim();
        match mime {
            "text/html" | "application/xhtml+xml" => Some(Self::Html),
            "application/json" | "application/xml" => Some(Self::Text),
            m if m.starts_with("text/") => Some(Self::Text),
            _ => None,
        }
    }
}

fn failed(reason: String) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: TOOL_NAME.into(),
        reason,
    }
}

/// Only absolute http(s) urls with a host are crawled.
pub fn validate_url(raw: &str) -> Result<Url, ToolError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ToolError::InvalidArguments(format!("'{raw}' is not a valid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ToolError::InvalidArguments(format!(
            "URL must start with http:// or https://, got scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ToolError::InvalidArguments(format!("URL '{raw}' has no host")));
    }
    Ok(url)
}

#[async_trait]
impl Tool for CrawlPageTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Crawl a web page and return its content as markdown. Use it on urls found with \
         duckduckgo_search. Do not use it for Wikipedia pages, use get_wikipedia_page instead."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new().required("url", ParamType::String, "The url to crawl, starting with http:// or https://")
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let url = arguments["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing required parameter 'url'".into()))?;
        Ok(ToolOutput::text(self.fetch(url).await?))
    }
}
