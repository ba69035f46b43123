//! Stdio tool server.
//!
//! The counterpart of [`super::client::ToolClient`]: a line-delimited
//! JSON-RPC 2.0 loop over stdin/stdout exposing the `search`, `get_weather`
//! and `get_weather_forecast` tools. The gateway spawns this executable with
//! the `tool-server` subcommand by default, so client and server ship as one
//! binary. Logs go to stderr; stdout carries only protocol frames.

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::providers::{SearchClient, SearchResponse, WeatherClient, WeatherData};
use crate::version;

use super::protocol::{
    CODE_INTERNAL_ERROR, CODE_INVALID_PARAMS, CODE_METHOD_NOT_FOUND, CODE_PARSE_ERROR,
    CallToolParams, PROTOCOL_VERSION, RpcMessage,
};

/// Forecast length accepted by `get_weather_forecast`. This is the
/// authoritative bound; callers are not expected to pre-validate.
const MAX_FORECAST_DAYS: u64 = 5;

/// Run the tool server until stdin closes.
pub async fn run(config: &Config) -> Result<()> {
    let tools = Tools {
        search: SearchClient::new(config.search.clone())?,
        weather: WeatherClient::new(config.weather.clone())?,
    };

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    info!("tool server listening on stdio");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let reply = match RpcMessage::from_line(&line) {
            Ok(msg) => tools.handle(msg).await,
            Err(e) => {
                warn!(error = %e, "unparsable frame");
                Some(RpcMessage::error_response(
                    None,
                    CODE_PARSE_ERROR,
                    format!("parse error: {}", e),
                ))
            }
        };

        if let Some(reply) = reply {
            stdout.write_all(reply.to_line().as_bytes()).await?;
            stdout.flush().await?;
        }
    }

    info!("stdin closed, tool server exiting");
    Ok(())
}

struct Tools {
    search: SearchClient,
    weather: WeatherClient,
}

impl Tools {
    /// Dispatch one inbound frame. Returns `None` for notifications.
    async fn handle(&self, msg: RpcMessage) -> Option<RpcMessage> {
        let method = msg.method.as_deref().unwrap_or_default();

        // Notifications carry no id and get no reply.
        let id = match msg.id {
            Some(id) => id,
            None => {
                debug!(method, "ignoring notification");
                return None;
            }
        };

        let reply = match method {
            "initialize" => RpcMessage::response(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "corral-tool-server", "version": version::VERSION },
                }),
            ),
            "tools/list" => RpcMessage::response(id, json!({ "tools": tool_descriptors() })),
            "tools/call" => self.handle_call(id, msg.params).await,
            other => RpcMessage::error_response(
                id.into(),
                CODE_METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        };
        Some(reply)
    }

    async fn handle_call(&self, id: u64, params: Option<Value>) -> RpcMessage {
        let call: CallToolParams = match params.map(serde_json::from_value).transpose() {
            Ok(Some(call)) => call,
            _ => {
                return RpcMessage::error_response(
                    id.into(),
                    CODE_INVALID_PARAMS,
                    "Invalid params format",
                );
            }
        };

        debug!(tool = %call.name, "handling tool call");

        match call.name.as_str() {
            "search" => self.handle_search(id, &call.arguments).await,
            "get_weather" => self.handle_get_weather(id, &call.arguments).await,
            "get_weather_forecast" => self.handle_forecast(id, &call.arguments).await,
            other => RpcMessage::error_response(
                id.into(),
                CODE_METHOD_NOT_FOUND,
                format!("Unknown tool: {}", other),
            ),
        }
    }

    async fn handle_search(
        &self,
        id: u64,
        arguments: &serde_json::Map<String, Value>,
    ) -> RpcMessage {
        let query = match require_string(id, arguments, "query") {
            Ok(query) => query,
            Err(reply) => return reply,
        };

        match self.search.search(query).await {
            Ok(results) => text_result(id, format_search(query, &results)),
            Err(e) => {
                warn!(error = %e, "search failed");
                RpcMessage::error_response(
                    id.into(),
                    CODE_INTERNAL_ERROR,
                    format!("Search failed: {}", e),
                )
            }
        }
    }

    async fn handle_get_weather(
        &self,
        id: u64,
        arguments: &serde_json::Map<String, Value>,
    ) -> RpcMessage {
        let city = match require_string(id, arguments, "city") {
            Ok(city) => city,
            Err(reply) => return reply,
        };

        match self.weather.current(city).await {
            Ok(data) => text_result(id, format_current(&data)),
            Err(e) => {
                warn!(error = %e, "weather lookup failed");
                RpcMessage::error_response(
                    id.into(),
                    CODE_INTERNAL_ERROR,
                    format!("Failed to get weather data: {}", e),
                )
            }
        }
    }

    async fn handle_forecast(
        &self,
        id: u64,
        arguments: &serde_json::Map<String, Value>,
    ) -> RpcMessage {
        let city = match require_string(id, arguments, "city") {
            Ok(city) => city,
            Err(reply) => return reply,
        };

        let days = arguments
            .get("days")
            .map(|v| v.as_u64().unwrap_or(0))
            .unwrap_or(1);
        if days == 0 || days > MAX_FORECAST_DAYS {
            return RpcMessage::error_response(
                id.into(),
                CODE_INVALID_PARAMS,
                format!(
                    "Invalid days parameter: must be between 1 and {}",
                    MAX_FORECAST_DAYS
                ),
            );
        }

        match self.weather.forecast(city, days as usize).await {
            Ok(data) => text_result(id, format_forecast(city, &data)),
            Err(e) => {
                warn!(error = %e, "forecast lookup failed");
                RpcMessage::error_response(
                    id.into(),
                    CODE_INTERNAL_ERROR,
                    format!("Failed to get weather forecast: {}", e),
                )
            }
        }
    }
}

/// Look up a required non-empty string argument, or build the -32602 reply.
fn require_string<'a>(
    id: u64,
    arguments: &'a serde_json::Map<String, Value>,
    key: &str,
) -> std::result::Result<&'a str, RpcMessage> {
    match arguments.get(key).and_then(Value::as_str) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(RpcMessage::error_response(
            id.into(),
            CODE_INVALID_PARAMS,
            format!("Missing or invalid {} parameter", key),
        )),
    }
}

fn text_result(id: u64, text: String) -> RpcMessage {
    RpcMessage::response(
        id,
        json!({ "content": [ { "type": "text", "text": text } ] }),
    )
}

// The leading phrases below double as discriminants the client uses to tag
// tool output; keep them in sync with protocol::classify_content.

fn format_current(data: &WeatherData) -> String {
    format!(
        "Current weather in {}:\nTemperature: {:.1} C\nConditions: {}\nHumidity: {}%\nWind speed: {:.1} m/s\nUpdated: {}",
        data.location,
        data.temperature,
        data.description,
        data.humidity,
        data.wind_speed,
        data.timestamp,
    )
}

fn format_forecast(city: &str, days: &[WeatherData]) -> String {
    let mut text = format!("Forecast for {} ({} days):\n", city, days.len());
    for (i, day) in days.iter().enumerate() {
        text.push_str(&format!(
            "\nDay {} ({}):\nTemperature: {:.1} C\nConditions: {}\nHumidity: {}%\nWind speed: {:.1} m/s\n",
            i + 1,
            day.timestamp
                .split_whitespace()
                .next()
                .unwrap_or(&day.timestamp),
            day.temperature,
            day.description,
            day.humidity,
            day.wind_speed,
        ));
    }
    text
}

fn format_search(query: &str, results: &SearchResponse) -> String {
    let mut text = format!("Search results for \"{}\":\n", query);
    if !results.answer.is_empty() {
        text.push_str(&format!("\nAnswer: {}\n", results.answer));
    }
    for (i, result) in results.results.iter().enumerate() {
        text.push_str(&format!(
            "\n{}. **{}**\n   {}\n   {}\n",
            i + 1,
            result.title,
            result.content,
            result.url,
        ));
    }
    text
}

fn tool_descriptors() -> Value {
    json!([
        {
            "name": "search",
            "description": "Search the web and return relevant results",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search query" },
                    "max_results": { "type": "number", "description": "Maximum results, default 5" }
                },
                "required": ["query"]
            }
        },
        {
            "name": "get_weather",
            "description": "Get current weather for a city",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "city": { "type": "string", "description": "City name, e.g. Berlin" }
                },
                "required": ["city"]
            }
        },
        {
            "name": "get_weather_forecast",
            "description": "Get a daily weather forecast for a city",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "city": { "type": "string", "description": "City name, e.g. Berlin" },
                    "days": { "type": "number", "description": "Days to forecast, 1-5, default 1" }
                },
                "required": ["city"]
            }
        }
    ])
}
