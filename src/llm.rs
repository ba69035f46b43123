//! Chat-completions client used for query routing and result formatting.
//!
//! Speaks the Azure-OpenAI deployment dialect: the deployment name is part
//! of the path, the key goes in an `api-key` header and the API version in
//! a query parameter.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::LlmSettings;
use crate::error::{CorralError, Result};

const ROUTER_PROMPT: &str = r#"You convert a user query into a tool route. Reply with a single JSON object and nothing else.

Rules:
- Weather questions about current conditions: {"method": "get_weather", "params": {"city": "<city in English>"}}
- Weather questions about the future ("forecast", "tomorrow", "next days"): {"method": "get_weather_forecast", "params": {"city": "<city in English>", "days": 3}}
- Questions needing fresh information (news, prices, events): {"method": "search", "params": {"query": "<optimized search terms>"}}
- Greetings, small talk, general knowledge, arithmetic: {"method": "direct_response", "params": {"response": "<your direct answer>"}}"#;

const FORMATTER_PROMPT: &str = "You summarize web search results. Answer the user's original question directly and concisely, citing the relevant facts from the results. If the results are insufficient, say so.";

/// Chat message for the completions request.
#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

/// Route produced by the router prompt.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ToolRoute {
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// Chat-completions client.
pub struct LlmClient {
    settings: LlmSettings,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { settings, http })
    }

    /// One completion round-trip; returns the first choice's content.
    pub async fn complete(&self, system_prompt: &str, user_content: String) -> Result<String> {
        let request = CompletionRequest {
            messages: vec![
                Message {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                Message {
                    role: "user",
                    content: user_content,
                },
            ],
            temperature: self.settings.temperature,
        };

        let url = format!(
            "{}/openai/deployments/{}/chat/completions",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.deployment,
        );

        debug!(deployment = %self.settings.deployment, "calling completions endpoint");

        let response: CompletionResponse = self
            .http
            .post(url)
            .query(&[("api-version", &self.settings.api_version)])
            .header("api-key", &self.settings.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CorralError::Internal("no completion choices returned".to_string()))
    }

    /// Ask the model to pick a tool route for the query.
    ///
    /// A reply that does not parse as a route falls back to a plain search,
    /// mirroring the behavior callers rely on under model drift.
    pub async fn route_query(&self, query: &str) -> Result<ToolRoute> {
        let reply = self.complete(ROUTER_PROMPT, query.to_string()).await?;
        Ok(parse_route(&reply).unwrap_or_else(|| {
            debug!(reply = %reply, "router reply was not a valid route, falling back to search");
            search_route(query)
        }))
    }

    /// Summarize search output against the original question.
    pub async fn format_search_results(&self, query: &str, results_text: &str) -> Result<String> {
        let user_content = format!("Original question: {}\n\n{}", query, results_text);
        self.complete(FORMATTER_PROMPT, user_content).await
    }
}

/// Parse a router reply, tolerating surrounding prose and code fences.
fn parse_route(reply: &str) -> Option<ToolRoute> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    let route: ToolRoute = serde_json::from_str(reply.get(start..=end)?).ok()?;
    if route.method.is_empty() {
        return None;
    }
    Some(route)
}

/// The fallback route when routing fails: search for the raw query.
pub fn search_route(query: &str) -> ToolRoute {
    let mut params = serde_json::Map::new();
    params.insert("query".to_string(), query.into());
    ToolRoute {
        method: "search".to_string(),
        params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_route_plain_json() {
        let route =
            parse_route(r#"{"method": "get_weather", "params": {"city": "Berlin"}}"#).unwrap();
        assert_eq!(route.method, "get_weather");
        assert_eq!(route.params["city"], "Berlin");
    }

    #[test]
    fn test_parse_route_with_code_fence() {
        let reply = "```json\n{\"method\": \"search\", \"params\": {\"query\": \"rust 1.85\"}}\n```";
        let route = parse_route(reply).unwrap();
        assert_eq!(route.method, "search");
    }

    #[test]
    fn test_parse_route_rejects_prose() {
        assert!(parse_route("I could not decide on a route.").is_none());
        assert!(parse_route("{}").is_none());
    }

    #[test]
    fn test_search_route_fallback() {
        let route = search_route("what happened today");
        assert_eq!(route.method, "search");
        assert_eq!(route.params["query"], "what happened today");
    }
}
