//! Research tool handlers for Sleuth.
//!
//! Tools give the research agent its reach: search the web, crawl pages,
//! read Wikipedia, keep a log of findings and write the final report.
//! Every handler returns a typed `Result`; the dispatcher turns failures into
//! conversation-facing error strings.

pub mod crawl;
pub mod html;
pub mod knowledge;
pub mod report;
pub mod search;
pub mod wikipedia;

use sleuth_config::AppConfig;
use sleuth_core::error::ToolError;
use sleuth_core::event::EventBus;
use sleuth_core::knowledge::KnowledgeStore;
use sleuth_core::tool::ToolRegistry;
use std::sync::Arc;

pub use crawl::CrawlPageTool;
pub use knowledge::{GetAllKnowledgeTool, SaveKnowledgeTool};
pub use report::CreateReportTool;
pub use search::{DuckDuckGoSearchTool, SearchHit};
pub use wikipedia::WikipediaTool;

/// Build the registry with every research tool.
///
/// Registration order is the order the model sees the tools in.
pub fn default_registry(
    config: &AppConfig,
    store: Arc<dyn KnowledgeStore>,
    events: Arc<EventBus>,
) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(DuckDuckGoSearchTool::new(&config.search)?))?;
    registry.register(Box::new(SaveKnowledgeTool::new(Arc::clone(&store)).with_events(events)))?;
    registry.register(Box::new(GetAllKnowledgeTool::new(store)))?;
    registry.register(Box::new(CrawlPageTool::new(&config.crawler, &config.search.user_agent)?))?;
    registry.register(Box::new(CreateReportTool::new(config.paths.reports_dir.clone())))?;
    registry.register(Box::new(WikipediaTool::new(&config.wikipedia, &config.search)?))?;
    Ok(registry)
}
