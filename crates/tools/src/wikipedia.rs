//! Wikipedia page tool, backed by the MediaWiki `extracts` API.
//!
//! Wikimedia requires a descriptive `User-Agent` on API traffic; the
//! configured one is sent with every request.

use async_trait::async_trait;
use serde_json::Value;
use sleuth_config::{SearchConfig, WikipediaConfig};
use sleuth_core::error::ToolError;
use sleuth_core::tool::{ParamType, ParameterSchema, Tool, ToolOutput};
use std::time::Duration;
use tracing::{debug, warn};

const TOOL_NAME: &str = "get_wikipedia_page";

pub const NO_PAGE: &str = "No page found.";
pub const NO_CONTENT: &str = "No content found for the given page.";

pub struct WikipediaTool {
    client: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
}

impl WikipediaTool {
    /// Shares the user agent and timeout of the search settings.
    pub fn new(config: &WikipediaConfig, search: &SearchConfig) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .user_agent(search.user_agent.clone())
            .timeout(Duration::from_secs(search.timeout_secs))
            .build()
            .map_err(|e| failed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            timeout_secs: search.timeout_secs,
        })
    }

    /// Plain-text extract of the page titled `title`.
    pub async fn page(&self, title: &str) -> Result<String, ToolError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("prop", "extracts"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
            ])
            .send()
            .await
            .map_err(|e| self.request_error(title, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(page = %title, status = %status, "Wikipedia request rejected");
            return Err(failed(format!("Wikipedia answered with HTTP {status}")));
        }

        let body: Value = response.json().await.map_err(|e| self.request_error(title, e))?;
        let text = extract_from(&body);
        debug!(page = %title, chars = text.len(), "Wikipedia page fetched");
        Ok(text)
    }

    fn request_error(&self, title: &str, e: reqwest::Error) -> ToolError {
        warn!(page = %title, error = %e, "Wikipedia request failed");
        if e.is_timeout() {
            failed(format!("Request timed out after {} seconds", self.timeout_secs))
        } else {
            failed(format!("Error fetching Wikipedia page: {e}"))
        }
    }
}

/// Pull the first page's extract out of a MediaWiki query response.
pub fn extract_from(body: &Value) -> String {
    let Some(pages) = body["query"]["pages"].as_object().filter(|p| !p.is_empty()) else {
        return NO_PAGE.to_string();
    };
    pages
        .values()
        .next()
        .and_then(|page| page["extract"].as_str())
        .filter(|text| !text.trim().is_empty())
        .map_or_else(|| NO_CONTENT.to_string(), str::to_string)
}

fn failed(reason: String) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: TOOL_NAME.into(),
        reason,
    }
}

#[async_trait]
impl Tool for WikipediaTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Get the plain-text content of a Wikipedia page by its exact title. \
         Use this instead of crawling Wikipedia pages."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new().required("page", ParamType::String, "Exact title of the Wikipedia page")
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let page = arguments["page"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing required parameter 'page'".into()))?;
        Ok(ToolOutput::text(self.page(page).await?))
    }
}
