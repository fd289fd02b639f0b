//! Built-in tools

mod calculator;
mod file_handler;
mod tavily;
mod web_search;

use std::fmt::Write as _;
use std::sync::Arc;

use scout_agent::{BoxedTool, ToolError, ToolSet};
use serde_json::json;

pub use calculator::CalculatorTool;
pub use file_handler::FileHandlerTool;
pub use tavily::TavilySearchTool;
pub use web_search::WebSearchTool;

use crate::config::ToolsConfig;

const DEFAULT_MAX_RESULTS: usize = 5;
const MAX_RESULTS_LIMIT: usize = 10;

/// The tools the research agent is bound to
pub fn search_tools(config: &ToolsConfig) -> ToolSet {
    let client = http_client();
    let mut tools: Vec<BoxedTool> = vec![Arc::new(WebSearchTool::new(client.clone()))];
    if let Some(key) = &config.tavily_api_key {
        tools.push(Arc::new(TavilySearchTool::new(client, key)));
    }
    ToolSet::from_tools(tools)
}

/// Every built-in tool, as exposed by the tools API
pub fn all_tools(config: &ToolsConfig) -> ToolSet {
    let mut tools = search_tools(config);
    tools.add(Arc::new(CalculatorTool::new()));
    tools.add(Arc::new(FileHandlerTool::new(config.workspace_dir.clone())));
    tools
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("scout/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

fn search_schema(query_description: &str) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": query_description
            },
            "max_results": {
                "type": "integer",
                "description": "Maximum number of search results to return",
                "minimum": 1,
                "default": DEFAULT_MAX_RESULTS
            }
        },
        "required": ["query"]
    })
}

struct SearchArgs {
    query: String,
    max_results: usize,
}

impl SearchArgs {
    fn parse(arguments: &serde_json::Value) -> Result<Self, ToolError> {
        let query = arguments
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let max_results = arguments
            .get("max_results")
            .and_then(|v| v.as_u64())
            .map(|n| (n as usize).clamp(1, MAX_RESULTS_LIMIT))
            .unwrap_or(DEFAULT_MAX_RESULTS);
        Ok(Self {
            query: query.to_string(),
            max_results,
        })
    }
}

struct SearchHit {
    title: String,
    snippet: String,
    link: String,
}

/// Numbered markdown list the research synthesis prompt embeds
fn format_hits(header: &str, answer: Option<&str>, hits: &[SearchHit]) -> String {
    if hits.is_empty() && answer.is_none() {
        return "No search results found.".to_string();
    }

    let mut out = format!("{}:\n\n", header);
    if let Some(answer) = answer {
        let _ = write!(out, "**Answer:** {}\n\n", answer);
    }
    for (i, hit) in hits.iter().enumerate() {
        let _ = write!(
            out,
            "{}. **{}**\n   {}\n   Source: {}\n\n",
            i + 1,
            hit.title,
            hit.snippet,
            hit.link
        );
    }
    out
}
