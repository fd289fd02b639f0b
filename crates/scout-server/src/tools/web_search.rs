//! Web search via the DuckDuckGo instant answer API

use async_trait::async_trait;
use scout_agent::{Tool, ToolError};
use serde::Deserialize;

use super::{SearchArgs, SearchHit, format_hits, search_schema};

const ENDPOINT: &str = "https://api.duckduckgo.com/";

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct InstantAnswer {
    heading: String,
    abstract_text: String,
    #[serde(rename = "AbstractURL")]
    abstract_url: String,
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Topic {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL")]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
}

impl RelatedTopic {
    fn collect_hits(self, hits: &mut Vec<SearchHit>) {
        match self {
            RelatedTopic::Topic { text, first_url } => {
                let title = text.split(" - ").next().unwrap_or(&text).to_string();
                hits.push(SearchHit {
                    title,
                    snippet: text,
                    link: first_url,
                });
            }
            RelatedTopic::Group { topics } => {
                for topic in topics {
                    topic.collect_hits(hits);
                }
            }
        }
    }
}

fn hits_from(answer: InstantAnswer, max_results: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    if !answer.abstract_text.is_empty() {
        hits.push(SearchHit {
            title: answer.heading,
            snippet: answer.abstract_text,
            link: answer.abstract_url,
        });
    }
    for topic in answer.related_topics {
        topic.collect_hits(&mut hits);
    }
    hits.truncate(max_results);
    hits
}

/// General web search; always available
pub struct WebSearchTool {
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information on any topic. Use this when you need recent \
         information, news, or data that might not be in your training."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        search_schema("Search query to find information on the web")
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args = SearchArgs::parse(&arguments)?;

        let response = self
            .client
            .get(ENDPOINT)
            .query(&[
                ("q", args.query.as_str()),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ToolError::Failed(format!("Web search failed: {}", e)))?;

        let answer: InstantAnswer = response
            .json()
            .await
            .map_err(|e| ToolError::Failed(format!("Web search failed: {}", e)))?;

        let hits = hits_from(answer, args.max_results);
        tracing::debug!(query = %args.query, hits = hits.len(), "Web search finished");
        Ok(format_hits("Web Search Results", None, &hits))
    }
}
