use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{retry_after_ms, ChatRequest, ChatResponse, LlmProvider, ProviderError};

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com".to_string()),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = build_request_body(req);
        let url = format!("{}/v1/chat/completions", self.base_url);

        debug!(model = %req.model, "sending request to OpenAI");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_ms: retry_after_ms(&resp),
            });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "OpenAI API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parse_response(api_resp))
    }
}

fn build_request_body(req: &ChatRequest) -> serde_json::Value {
    // OpenAI uses a flat messages array; system is prepended as a system message.
    let mut messages = vec![serde_json::json!({
        "role": "system",
        "content": req.system,
    })];

    for m in &req.messages {
        messages.push(serde_json::json!({
            "role": m.role,
            "content": m.content,
        }));
    }

    let mut body = serde_json::json!({
        "model": req.model,
        "messages": messages,
        "max_completion_tokens": req.max_tokens,
    });

    if let Some(effort) = &req.reasoning_effort {
        body["reasoning_effort"] = serde_json::json!(effort);
    } else if let Some(t) = req.temperature {
        body["temperature"] = serde_json::json!(t);
    }

    if let Some(format) = &req.response_format {
        body["response_format"] = serde_json::json!({
            "type": "json_schema",
            "json_schema": format,
        });
    }

    body
}

fn parse_response(resp: ApiResponse) -> ChatResponse {
    let choice = resp.choices.into_iter().next();
    let content = choice
        .as_ref()
        .and_then(|c| c.message.content.as_deref())
        .unwrap_or("")
        .to_string();
    let stop_reason = choice.and_then(|c| c.finish_reason).unwrap_or_default();

    ChatResponse {
        content,
        model: resp.model,
        tokens_in: resp.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
        tokens_out: resp
            .usage
            .as_ref()
            .map(|u| u.completion_tokens)
            .unwrap_or(0),
        stop_reason,
        tool_calls: Vec::new(),
    }
}

// OpenAI API response types (private, deserialization only)

#[derive(Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::JsonSchemaFormat;

    #[test]
    fn body_carries_schema_and_reasoning_effort() {
        let mut req = ChatRequest::new("gpt-5-mini", "sys", "every monday");
        req.reasoning_effort = Some("low".into());
        req.temperature = Some(0.0);
        req.response_format = Some(JsonSchemaFormat {
            name: "rrule_generation".into(),
            strict: true,
            schema: serde_json::json!({"type": "object"}),
        });

        let body = build_request_body(&req);
        assert_eq!(body["reasoning_effort"], "low");
        assert!(body.get("temperature").is_none());
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "every monday");
    }

    #[test]
    fn body_uses_temperature_without_reasoning() {
        let mut req = ChatRequest::new("gpt-4.1-mini", "sys", "hi");
        req.temperature = Some(0.0);
        let body = build_request_body(&req);
        assert_eq!(body["temperature"], 0.0);
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn parses_usage_and_content() {
        let raw = r#"{
            "model": "gpt-5-mini",
            "choices": [{"message": {"content": "{\"is_recurring\":false}"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 812, "completion_tokens": 64}
        }"#;
        let resp = parse_response(serde_json::from_str(raw).unwrap());
        assert_eq!(resp.content, "{\"is_recurring\":false}");
        assert_eq!(resp.tokens_in, 812);
        assert_eq!(resp.tokens_out, 64);
        assert_eq!(resp.stop_reason, "stop");
    }
}
