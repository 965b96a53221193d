//! System prompt construction for a research session.
//!
//! The prompt is a template with two placeholders, `{timestamp}` and
//! `{query}`. A template file may be configured; when it is missing or
//! unreadable the built-in research prompt is used instead.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The built-in research prompt.
pub const DEFAULT_TEMPLATE: &str = concat!(
    "You are a task-focused AI researcher. The current date and time is {timestamp}. ",
    "Begin researching immediately. Perform multiple online searches to gather reliable ",
    "information. Crawl webpages for context. When possible use Wikipedia as a source. ",
    "Research extensively, multiple searches and crawls, One Source is not enough. ",
    "After crawling a webpage, store any useful knowledge in the research knowledge base, ",
    "treat it like your permanent memory. Recall all stored knowledge before creating the ",
    "final report. Don't forget to ground information in reliable sources, crawl pages ",
    "after searching DuckDuckGo for this. Mark any assumptions clearly. Produce an extensive ",
    "report in markdown format using the create_report tool, be sure to use this tool. ",
    "Create the report ONLY when you are done with all research. Already saved reports can ",
    "NOT be changed or deleted. Add some tables if you think it will help clarify the ",
    "information. Here is the research query: '{query}'",
);

/// Format used for the `{timestamp}` placeholder.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Where the rendered prompt's template came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSource {
    BuiltIn,
    File(PathBuf),
}

/// A rendered system prompt.
#[derive(Debug, Clone)]
pub struct SystemPrompt {
    pub text: String,
    pub source: PromptSource,
}

impl SystemPrompt {
    /// Fill the placeholders of `template`.
    pub fn render(template: &str, query: &str, now: DateTime<Local>) -> String {
        template
            .replace("{timestamp}", &now.format(TIMESTAMP_FORMAT).to_string())
            .replace("{query}", query)
    }

    /// Render the built-in template.
    pub fn builtin(query: &str) -> Self {
        Self {
            text: Self::render(DEFAULT_TEMPLATE, query, Local::now()),
            source: PromptSource::BuiltIn,
        }
    }

    /// Render the template at `path`, or the built-in one if there is no
    /// path or the file cannot be read.
    pub fn load(path: Option<&Path>, query: &str) -> Self {
        let Some(path) = path else {
            return Self::builtin(query);
        };
        match std::fs::read_to_string(path) {
            Ok(template) if !template.trim().is_empty() => {
                debug!(file = %path.display(), "Loaded system prompt template");
                Self {
                    text: Self::render(&template, query, Local::now()),
                    source: PromptSource::File(path.to_path_buf()),
                }
            }
            Ok(_) => {
                warn!(file = %path.display(), "System prompt template is empty, using default");
                Self::builtin(query)
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "System prompt template not readable, using default");
                Self::builtin(query)
            }
        }
    }

    /// Rough token estimate (4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.text.len() / 4
    }
}

/// The first user message of every session.
pub fn initial_user_message(query: &str) -> String {
    format!("Here is the research query given by the user: '{query}'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn render_fills_placeholders() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let text = SystemPrompt::render("At {timestamp} research '{query}'.", "rust async", now);
        assert_eq!(text, "At 2024-03-09 14:05:07 research 'rust async'.");
    }

    #[test]
    fn builtin_mentions_query_and_report_tool() {
        let prompt = SystemPrompt::builtin("solar sails");
        assert_eq!(prompt.source, PromptSource::BuiltIn);
        assert!(prompt.text.contains("'solar sails'"));
        assert!(prompt.text.contains("create_report"));
        assert!(!prompt.text.contains("{timestamp}"));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "Custom prompt for {query}").unwrap();

        let prompt = SystemPrompt::load(Some(&path), "tides");
        assert_eq!(prompt.text, "Custom prompt for tides");
        assert_eq!(prompt.source, PromptSource::File(path));
    }

    #[test]
    fn missing_file_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = SystemPrompt::load(Some(&dir.path().join("nope.txt")), "tides");
        assert_eq!(prompt.source, PromptSource::BuiltIn);
        assert!(prompt.text.contains("'tides'"));
    }

    #[test]
    fn initial_message_quotes_query() {
        assert_eq!(
            initial_user_message("X"),
            "Here is the research query given by the user: 'X'"
        );
    }
}
