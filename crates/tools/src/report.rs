//! Report tool: writes the final markdown report to the reports directory.

use async_trait::async_trait;
use chrono::Local;
use regex::Regex;
use serde_json::{Value, json};
use sleuth_core::error::ToolError;
use sleuth_core::tool::{ParamType, ParameterSchema, Tool, ToolOutput};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::io::AsyncWriteExt;
use tracing::info;

const TOOL_NAME: &str = "create_report";
const MAX_TITLE_CHARS: usize = 120;

static UNSAFE_TITLE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));

pub struct CreateReportTool {
    reports_dir: PathBuf,
}

impl CreateReportTool {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
        }
    }

    /// Write the report and return the path it was saved to.
    pub async fn create(&self, title: &str, content: &str, sources: &[String]) -> Result<PathBuf, ToolError> {
        let title = sanitize_title(title).ok_or_else(|| {
            ToolError::InvalidArguments(
                "report title cannot be empty or contain only special characters".into(),
            )
        })?;

        tokio::fs::create_dir_all(&self.reports_dir)
            .await
            .map_err(|e| failed(format!("failed to create {}: {e}", self.reports_dir.display())))?;

        let stem = format!("{title}_{}", Local::now().format("%Y%m%d_%H%M%S"));
        let (path, mut file) = create_unique(&self.reports_dir, &stem).await?;

        let body = render(&title, content, sources);
        file.write_all(body.as_bytes())
            .await
            .map_err(|e| failed(format!("error writing report to {}: {e}", path.display())))?;
        file.flush()
            .await
            .map_err(|e| failed(format!("error writing report to {}: {e}", path.display())))?;

        info!(path = %path.display(), bytes = body.len(), sources = sources.len(), "Report saved");
        Ok(path)
    }
}

/// Strip everything but word characters, whitespace and dashes, then use
/// underscores for whitespace. `None` when nothing usable is left.
pub fn sanitize_title(title: &str) -> Option<String> {
    let cleaned = UNSAFE_TITLE_CHARS.replace_all(title, "");
    let cleaned: String = cleaned
        .trim()
        .chars()
        .take(MAX_TITLE_CHARS)
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

fn render(title: &str, content: &str, sources: &[String]) -> String {
    let mut body = format!("# {title}\n\n{content}\n\n## Sources\n");
    for source in sources {
        body.push_str("- ");
        body.push_str(source);
        body.push('\n');
    }
    body
}

/// Open `<stem>.md`, or `<stem>_<n>.md` if that name is taken.
async fn create_unique(dir: &Path, stem: &str) -> Result<(PathBuf, tokio::fs::File), ToolError> {
    for n in 0u32.. {
        let name = if n == 0 { format!("{stem}.md") } else { format!("{stem}_{n}.md") };
        let path = dir.join(name);
        match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(failed(format!("error creating {}: {e}", path.display()))),
        }
    }
    Err(failed("no free report file name".into()))
}

fn failed(reason: String) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: TOOL_NAME.into(),
        reason,
    }
}

#[async_trait]
impl Tool for CreateReportTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Write the final report in markdown. Only use this after the research is complete. \
         The title is also used for the file name."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("title", ParamType::String, "Title of the report")
            .required("content", ParamType::String, "The full report content in markdown")
            .required(
                "sources",
                ParamType::Array(Box::new(ParamType::String)),
                "Every source used in the report",
            )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let title = arguments["title"].as_str().unwrap_or_default();
        let content = arguments["content"].as_str().unwrap_or_default();
        let sources: Vec<String> = arguments["sources"]
            .as_array()
            .map(|items| items.iter().filter_map(|s| s.as_str().map(String::from)).collect())
            .unwrap_or_default();

        let path = self.create(title, content, &sources).await?;
        Ok(ToolOutput {
            content: format!("DONE, Report saved to {}", path.display()),
            data: Some(json!({ "path": path.display().to_string() })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_are_sanitized() {
        assert_eq!(sanitize_title("Rust: 2024 edition?").as_deref(), Some("Rust_2024_edition"));
        assert_eq!(sanitize_title("  spaced-out title  ").as_deref(), Some("spaced-out_title"));
        assert_eq!(sanitize_title("!!!"), None);
        assert_eq!(sanitize_title("   "), None);
    }

    #[tokio::test]
    async fn report_layout_and_message() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CreateReportTool::new(dir.path().join("reports"));

        let out = tool
            .execute(json!({
                "title": "Memory Safety",
                "content": "Rust prevents data races.",
                "sources": ["https://a.example", "https://b.example"]
            }))
            .await
            .unwrap();

        assert!(out.content.starts_with("DONE, Report saved to "));
        let path = PathBuf::from(out.content.trim_start_matches("DONE, Report saved to "));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("Memory_Safety_"));
        assert!(name.ends_with(".md"));

        let body = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            body,
            "# Memory_Safety\n\nRust prevents data races.\n\n## Sources\n- https://a.example\n- https://b.example\n"
        );
    }

    #[tokio::test]
    async fn same_second_reports_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let (first, _) = create_unique(dir.path(), "Title_20250101_000000").await.unwrap();
        let (second, _) = create_unique(dir.path(), "Title_20250101_000000").await.unwrap();
        assert_ne!(first, second);
        assert!(second.ends_with("Title_20250101_000000_1.md"));
    }

    #[tokio::test]
    async fn empty_title_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CreateReportTool::new(dir.path());
        let err = tool
            .execute(json!({"title": "???", "content": "x", "sources": []}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }
}
