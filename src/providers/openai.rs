use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, ResponseFormat,
    },
    Client,
};

use crate::config::OpenAiConfig;
use crate::error::{Result, StudioError};
use crate::interfaces::providers::{GenerationOptions, LlmProvider};

const DEFAULT_MODEL: &str = "gpt-4.1-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const MAX_ATTEMPTS: usize = 3;

enum ChatCreateResult {
    Parsed(CreateChatCompletionResponse),
    Raw(Value),
}

#[derive(Clone)]
pub struct OpenAiProvider {
    model: String,
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let config = OpenAIConfig::new()
            .with_api_key(api_key.clone())
            .with_api_base(base_url.clone());
        Self {
            model,
            client: Client::with_config(config),
            http: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }

    pub fn from_config(config: &OpenAiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                StudioError::Config(
                    "openai.api_key is not set (config file or OPENAI_API_KEY)".to_string(),
                )
            })?;
        Ok(Self::new(
            api_key,
            config.model.clone(),
            config.base_url.clone(),
        ))
    }

    fn is_truncated_json_error(body: &str) -> bool {
        let lower = body.to_ascii_lowercase();
        lower.contains("unexpected end of json input")
            || lower.contains("unexpected end of json")
            || lower.contains("unexpected end of input")
            || lower.contains("unexpected eof")
    }

    async fn raw_chat_completion(&self, request: &CreateChatCompletionRequest) -> Result<Value> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        for attempt in 0..MAX_ATTEMPTS {
            let response = self
                .http
                .post(url.clone())
                .bearer_auth(&self.api_key)
                .json(request)
                .send()
                .await
                .map_err(|e| StudioError::Http(format!("Chat completion transport failed: {e}")))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| StudioError::Http(format!("Chat completion read failed: {e}")))?;

            if status == StatusCode::OK {
                return serde_json::from_str(&body).map_err(|e| {
                    StudioError::Serialization(format!("Chat completion decode failed: {e}"))
                });
            }

            let retryable = status.is_server_error() && Self::is_truncated_json_error(&body);
            if retryable && attempt + 1 < MAX_ATTEMPTS {
                tracing::warn!(attempt, %status, "Retrying truncated chat completion response");
                tokio::time::sleep(Duration::from_millis(150 * (attempt as u64 + 1))).await;
                continue;
            }

            return Err(StudioError::Http(format!(
                "Chat completion failed ({status}): {body}"
            )));
        }

        Err(StudioError::Http(
            "Chat completion failed after retries".to_string(),
        ))
    }

    /// Raw request first; falls back to the typed client only when the
    /// endpoint kept returning truncated JSON.
    async fn chat_create_with_fallback(
        &self,
        request: CreateChatCompletionRequest,
    ) -> Result<ChatCreateResult> {
        match self.raw_chat_completion(&request).await {
            Ok(raw) => return Ok(ChatCreateResult::Raw(raw)),
            Err(StudioError::Http(message)) if message.starts_with("Chat completion failed (") => {
                if !Self::is_truncated_json_error(&message) {
                    return Err(StudioError::Http(message));
                }
            }
            Err(err) => {
                tracing::debug!("Raw chat completion failed, using typed client: {}", err);
            }
        }

        match self.client.chat().create(request).await {
            Ok(response) => Ok(ChatCreateResult::Parsed(response)),
            Err(err) => Err(StudioError::Http(err.to_string())),
        }
    }

    fn extract_text_from_value(response: &Value) -> Option<String> {
        response
            .get("choices")
            .and_then(|v| v.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(|text| text.to_string())
    }

    fn extract_text_from_response(response: &CreateChatCompletionResponse) -> Result<String> {
        let message = response
            .choices
            .first()
            .ok_or_else(|| StudioError::Runtime("No choices returned".to_string()))?
            .message
            .content
            .clone()
            .unwrap_or_default();
        Ok(message)
    }

    fn build_system_message(system_prompt: &str) -> Result<Option<ChatCompletionRequestMessage>> {
        if system_prompt.is_empty() {
            return Ok(None);
        }
        let message = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()
            .map_err(|e| StudioError::Runtime(e.to_string()))?;
        Ok(Some(ChatCompletionRequestMessage::System(message)))
    }

    fn build_user_text_message(prompt: &str) -> Result<ChatCompletionRequestMessage> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Text(
                prompt.to_string(),
            ))
            .build()
            .map_err(|e| StudioError::Runtime(e.to_string()))?;
        Ok(ChatCompletionRequestMessage::User(message))
    }

    fn build_request(
        &self,
        prompt: &str,
        system_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<CreateChatCompletionRequest> {
        let mut messages = Vec::new();
        if let Some(system) = Self::build_system_message(system_prompt)? {
            messages.push(system);
        }
        messages.push(Self::build_user_text_message(prompt)?);

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(self.model.clone());
        builder.messages(messages);
        if let Some(temperature) = options.temperature {
            builder.temperature(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            builder.max_completion_tokens(max_tokens);
        }
        if options.json_object {
            builder.response_format(ResponseFormat::JsonObject);
        }
        builder
            .build()
            .map_err(|e| StudioError::Runtime(e.to_string()))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        let request = self.build_request(prompt, system_prompt, options)?;
        tracing::debug!(model = %self.model, json = options.json_object, "Requesting chat completion");
        match self.chat_create_with_fallback(request).await? {
            ChatCreateResult::Parsed(parsed) => Self::extract_text_from_response(&parsed),
            ChatCreateResult::Raw(raw) => Self::extract_text_from_value(&raw)
                .ok_or_else(|| StudioError::Runtime("Empty chat response".to_string())),
        }
    }
}
