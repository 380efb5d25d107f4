use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::traits::ChatProvider;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

/// Anthropic messages-API provider.
#[derive(Clone)]
pub struct Claude {
    api_key: String,
    model: String,
    http: reqwest::Client,
    base_url: String,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            http: reqwest::Client::new(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/messages", self.base_url);

        debug!(model = %request.model, "Claude chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Claude API error ({status}): {error_text}"));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ChatProvider for Claude {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            system: Some(system.to_string()),
            messages: vec![WireMessage::user(user)],
            temperature: Some(0.2),
            tools: None,
            tool_choice: None,
        };

        let response = self.chat(&request).await?;
        response
            .text()
            .ok_or_else(|| anyhow!("No text in Claude response"))
    }

    async fn extract_value(
        &self,
        system: &str,
        user: &str,
        schema: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let tool_name = "structured_response";
        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            system: Some(system.to_string()),
            messages: vec![WireMessage::user(user)],
            temperature: Some(0.0),
            tools: Some(vec![ToolDefinition {
                name: tool_name.to_string(),
                description: "Extract structured data from the input.".to_string(),
                input_schema: schema,
            }]),
            tool_choice: Some(serde_json::json!({ "type": "tool", "name": tool_name })),
        };

        let response = self.chat(&request).await?;

        for block in response.content {
            if let ContentBlock::ToolUse { input, .. } = block {
                return Ok(input);
            }
        }

        Err(anyhow!("No structured output in Claude response"))
    }
}

// --- Wire types ---

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

impl WireMessage {
    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ToolDefinition {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        #[allow(dead_code)]
        id: String,
        #[allow(dead_code)]
        name: String,
        input: serde_json::Value,
    },
}

impl ChatResponse {
    fn text(&self) -> Option<String> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.clone()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_text_takes_first_text_block() {
        let response: ChatResponse = serde_json::from_value(serde_json::json!({
            "content": [
                { "type": "text", "text": "hello" },
                { "type": "text", "text": "ignored" }
            ]
        }))
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("hello"));
    }

    #[test]
    fn tool_use_blocks_deserialize() {
        let response: ChatResponse = serde_json::from_value(serde_json::json!({
            "content": [
                { "type": "tool_use", "id": "t1", "name": "structured_response",
                  "input": { "detected": true } }
            ]
        }))
        .unwrap();
        assert!(response.text().is_none());
        assert!(matches!(response.content[0], ContentBlock::ToolUse { .. }));
    }
}
