//! Search via the Tavily API

use async_trait::async_trait;
use scout_agent::{Tool, ToolError};
use serde::Deserialize;
use serde_json::json;

use super::{SearchArgs, SearchHit, format_hits, search_schema};

const ENDPOINT: &str = "https://api.tavily.com/search";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TavilyResponse {
    answer: Option<String>,
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default = "no_title")]
    title: String,
    #[serde(default = "no_content")]
    content: String,
    #[serde(default = "no_url")]
    url: String,
}

fn no_title() -> String {
    "No title".to_string()
}

fn no_content() -> String {
    "No content".to_string()
}

fn no_url() -> String {
    "No URL".to_string()
}

fn render(response: TavilyResponse) -> String {
    let hits: Vec<SearchHit> = response
        .results
        .into_iter()
        .map(|r| SearchHit {
            title: r.title,
            snippet: r.content,
            link: r.url,
        })
        .collect();
    let answer = response.answer.filter(|a| !a.is_empty());
    format_hits("Tavily Search Results", answer.as_deref(), &hits)
}

/// Higher quality search; registered only when an API key is configured
pub struct TavilySearchTool {
    client: reqwest::Client,
    api_key: String,
}

impl TavilySearchTool {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Tool for TavilySearchTool {
    fn name(&self) -> &str {
        "tavily_search"
    }

    fn description(&self) -> &str {
        "Advanced web search using the Tavily API for high-quality, recent information. \
         Provides more detailed and accurate results than basic web search."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        search_schema("Search query to find information on the web")
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args = SearchArgs::parse(&arguments)?;

        let body = json!({
            "api_key": self.api_key,
            "query": args.query,
            "search_depth": "advanced",
            "include_answer": true,
            "include_raw_content": false,
            "max_results": args.max_results,
        });

        let response = self
            .client
            .post(ENDPOINT)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ToolError::Failed(format!("Tavily search failed: {}", e)))?;

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| ToolError::Failed(format!("Tavily search failed: {}", e)))?;

        tracing::debug!(query = %args.query, hits = parsed.results.len(), "Tavily search finished");
        Ok(render(parsed))
    }
}
