use super::{Intent, IntentProvider};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// System prompt for intent parsing. The model must answer with a single
/// JSON object so the response can be deserialized without free-text cleanup.
const INTENT_SYSTEM_PROMPT: &str = r#"You translate user requests into shell commands.
Respond with a single JSON object and nothing else:
{"commands":[{"cmd":"<program>","args":["<arg>",...],"is_async":false}],"reason":"<one-line plan>","needs_confirm":false}
Set needs_confirm to true only when the request is destructive or ambiguous.
Use one object per command, in execution order. Do not use shell pipelines
unless the user asked for them explicitly."#;

const ANALYZE_SYSTEM_PROMPT: &str =
    "Summarize the command output for the user in one or two short sentences. \
     Mention errors if present. Do not repeat the raw output.";

/// OpenAI-compatible `/chat/completions` client.
///
/// Works against any endpoint speaking the same wire format; `base_url` is
/// the API root (e.g. `https://api.openai.com/v1`).
pub struct OpenAiProvider {
    /// Pre-computed `"Bearer <key>"` header value (avoids `format!` per request).
    cached_auth_header: Option<String>,
    client: Client,
    model: String,
    base_url: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(
        api_key: Option<&str>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
        max_tokens: u32,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            cached_auth_header: api_key.map(|k| format!("Bearer {k}")),
            client: Client::builder()
                .timeout(timeout)
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            model: model.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_tokens,
        }
    }

    async fn chat_completion(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                Message {
                    role: "user",
                    content: user_message.to_string(),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: 0.0,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request);
        if let Some(auth) = &self.cached_auth_header {
            builder = builder.header("Authorization", auth);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Response(format!("HTTP {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Response(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Response("response had no choices".to_string()))
    }
}

#[async_trait]
impl IntentProvider for OpenAiProvider {
    async fn parse_intent(
        &self,
        input: &str,
        system_prompt: &str,
    ) -> Result<Intent, ProviderError> {
        let system = if system_prompt.is_empty() {
            INTENT_SYSTEM_PROMPT.to_string()
        } else {
            format!("{INTENT_SYSTEM_PROMPT}\n\n{system_prompt}")
        };

        let content = self.chat_completion(&system, input).await?;
        let json = extract_json_object(&content)
            .ok_or_else(|| ProviderError::Parse(format!("no JSON object in: {content}")))?;

        serde_json::from_str(json).map_err(|e| ProviderError::Parse(e.to_string()))
    }

    async fn analyze_output(&self, cmd: &str, output: &str) -> Result<String, ProviderError> {
        let message = format!("Command: {cmd}\n\nOutput:\n{output}");
        let summary = self.chat_completion(ANALYZE_SYSTEM_PROMPT, &message).await?;
        Ok(summary.trim().to_string())
    }
}

/// Extract the outermost JSON object from model output, tolerating fenced
/// code blocks and stray prose around it.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end >= start).then(|| &text[start..=end])
}
