//! DuckDuckGo search tool.
//!
//! Scrapes the HTML endpoint, so no API key is needed. A failed search is
//! not an error for the model: it gets an empty result list and can rephrase.

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};
use sleuth_config::SearchConfig;
use sleuth_core::error::ToolError;
use sleuth_core::tool::{ParamType, ParameterSchema, Tool, ToolOutput};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::html::inline_text;

static RESULT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b([^>]*\bclass\s*=\s*"[^"]*\bresult__a\b[^"]*"[^>]*)>(.*?)</a\s*>"#).expect("valid regex")
});
static RESULT_SNIPPET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<(a|div|td)\b[^>]*\bclass\s*=\s*"[^"]*\bresult__snippet\b[^"]*"[^>]*>(.*?)</(?:a|div|td)\s*>"#)
        .expect("valid regex")
});
static HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bhref\s*=\s*"([^"]*)""#).expect("valid regex"));

/// One search hit as handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

pub struct DuckDuckGoSearchTool {
    client: reqwest::Client,
    endpoint: String,
    max_results: usize,
}

impl DuckDuckGoSearchTool {
    pub fn new(config: &SearchConfig) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "duckduckgo_search".into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            max_results: config.max_results,
        })
    }

    /// Run a search. Any failure yields an empty list.
    pub async fn search(&self, query: &str) -> Vec<SearchHit> {
        match self.fetch(query).await {
            Ok(body) => {
                let hits = parse_results(&body, &self.endpoint, self.max_results);
                debug!(query = %query, hits = hits.len(), "Search completed");
                hits
            }
            Err(reason) => {
                warn!(query = %query, error = %reason, "Search failed, returning no results");
                Vec::new()
            }
        }
    }

    async fn fetch(&self, query: &str) -> Result<String, String> {
        let url = format!("{}?q={}", self.endpoint, urlencoding::encode(query));
        let response = self.client.get(&url).send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }
        response.text().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Tool for DuckDuckGoSearchTool {
    fn name(&self) -> &str {
        "duckduckgo_search"
    }

    fn description(&self) -> &str {
        "Search DuckDuckGo and return a JSON list of results with title, url and snippet. \
         Treat the query like a regular web search query. Crawl promising urls afterwards."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new().required("search_query", ParamType::String, "The web search query")
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let query = arguments["search_query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing required parameter 'search_query'".into()))?;

        let hits = self.search(query).await;
        Ok(ToolOutput::json(json!(hits)))
    }
}

/// Extract organic results from a DuckDuckGo HTML page.
///
/// Each snippet is paired with the nearest preceding result link. Sponsored
/// links (no `uddg` target, pointing back at the search host) are skipped.
pub fn parse_results(body: &str, endpoint: &str, max_results: usize) -> Vec<SearchHit> {
    let Ok(base) = Url::parse(endpoint) else {
        return Vec::new();
    };

    let links: Vec<_> = RESULT_LINK.captures_iter(body).collect();
    let snippets: Vec<(usize, String)> = RESULT_SNIPPET
        .captures_iter(body)
        .filter_map(|c| c.get(0).map(|m| (m.start(), inline_text(&c[2]))))
        .collect();

    let mut hits = Vec::new();
    for (i, link) in links.iter().enumerate() {
        if hits.len() >= max_results {
            break;
        }
        let Some(whole) = link.get(0) else { continue };
        let next_start = links
            .get(i + 1)
            .and_then(|l| l.get(0))
            .map_or(body.len(), |m| m.start());

        let Some(href) = HREF.captures(&link[1]).map(|c| c[1].to_string()) else {
            continue;
        };
        let Some(url) = resolve_target(&base, &href) else {
            continue;
        };
        let title = inline_text(&link[2]);
        if title.is_empty() {
            continue;
        }
        let snippet = snippets
            .iter()
            .find(|(pos, _)| *pos > whole.end() && *pos < next_start)
            .map(|(_, s)| s.clone())
            .unwrap_or_default();

        hits.push(SearchHit { title, url, snippet });
    }
    hits
}

/// Turn a result href into the real destination url.
fn resolve_target(base: &Url, href: &str) -> Option<String> {
    let href = html_escape::decode_html_entities(href);
    let absolute = base.join(&href).ok()?;

    if let Some((_, target)) = absolute.query_pairs().find(|(k, _)| k == "uddg") {
        let target = Url::parse(&target).ok()?;
        return matches!(target.scheme(), "http" | "https").then(|| target.to_string());
    }

    let internal = absolute.host_str() == base.host_str()
        || absolute.host_str().is_some_and(|h| h.ends_with("duckduckgo.com"));
    if internal || !matches!(absolute.scheme(), "http" | "https") {
        return None;
    }
    Some(absolute.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"
        <div class="result results_links result--ad">
          <a rel="nofollow" class="result__a" href="https://duckduckgo.com/y.js?ad_provider=x&amp;u3=1">Buy Rust</a>
          <a class="result__snippet" href="https://duckduckgo.com/y.js">Sponsored</a>
        </div>
        <div class="result results_links">
          <h2 class="result__title">
            <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&amp;rut=abc">Rust <b>Programming</b> Language</a>
          </h2>
          <a class="result__snippet" href="//duckduckgo.com/l/?uddg=x">A language empowering <b>everyone</b>.</a>
        </div>
        <div class="result results_links">
          <a rel="nofollow" class="result__a" href="https://doc.rust-lang.org/book/">The Book</a>
        </div>
        <div class="result results_links">
          <a rel="nofollow" class="result__a" href="https://crates.io/">crates.io</a>
          <a class="result__snippet">Package registry &amp; more</a>
        </div>
    "#;

    const ENDPOINT: &str = "https://html.duckduckgo.com/html/";

    #[test]
    fn parses_organic_results_and_skips_ads() {
        let hits = parse_results(PAGE, ENDPOINT, 6);
        assert_eq!(hits.len(), 3);
        assert_eq!(
            hits[0],
            SearchHit {
                title: "Rust Programming Language".into(),
                url: "https://www.rust-lang.org/".into(),
                snippet: "A language empowering everyone.".into(),
            }
        );
        assert_eq!(hits[1].url, "https://doc.rust-lang.org/book/");
        assert_eq!(hits[1].snippet, "");
        assert_eq!(hits[2].snippet, "Package registry & more");
    }

    #[test]
    fn respects_max_results() {
        assert_eq!(parse_results(PAGE, ENDPOINT, 1).len(), 1);
    }

    #[test]
    fn unparseable_page_is_empty() {
        assert!(parse_results("<html>captcha</html>", ENDPOINT, 6).is_empty());
    }

    fn config_for(server: &MockServer) -> SearchConfig {
        SearchConfig {
            endpoint: format!("{}/html/", server.uri()),
            timeout_secs: 5,
            ..SearchConfig::default()
        }
    }

    #[tokio::test]
    async fn execute_returns_json_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html/"))
            .and(query_param("q", "rust language"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let tool = DuckDuckGoSearchTool::new(&config_for(&server)).unwrap();
        let out = tool.execute(json!({"search_query": "rust language"})).await.unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&out.content).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0]["url"], "https://www.rust-lang.org/");
        assert!(parsed[0].get("snippet").is_some());
    }

    #[tokio::test]
    async fn upstream_failure_yields_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let tool = DuckDuckGoSearchTool::new(&config_for(&server)).unwrap();
        let out = tool.execute(json!({"search_query": "anything"})).await.unwrap();
        assert_eq!(out.content, "[]");
    }

    #[tokio::test]
    async fn unreachable_endpoint_yields_empty_list() {
        let config = SearchConfig {
            endpoint: "http://127.0.0.1:9/html/".into(),
            timeout_secs: 2,
            ..SearchConfig::default()
        };
        let tool = DuckDuckGoSearchTool::new(&config).unwrap();
        assert!(tool.search("offline").await.is_empty());
    }
}
