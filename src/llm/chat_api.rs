//! OpenAI-compatible chat completions backend.
//!
//! Works with any server implementing `/v1/chat/completions`: Groq,
//! OpenAI, Ollama, vLLM, llama.cpp server and so on. Requests are
//! non-streaming; the reply is trimmed before it is returned.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{ConversationContext, ResponseGenerator};
use crate::api_client::{ApiClient, send_checked};
use crate::config::{LlmConfig, api_key_from_env};
use crate::error::{AttuneError, Result};

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completion client.
#[derive(Debug, Clone)]
pub struct ChatApiGenerator {
    api: ApiClient,
    model: String,
    temperature: f64,
}

impl ChatApiGenerator {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api = ApiClient::new(
            config.base_url.clone(),
            api_key_from_env(&config.api_key_env),
            Duration::from_secs(config.timeout_secs),
        )?;
        info!("LLM configured: {} model={}", api.base_url(), config.model);
        Ok(Self::with_client(api, config.model.clone(), config.temperature))
    }

    pub fn with_client(api: ApiClient, model: impl Into<String>, temperature: f64) -> Self {
        Self {
            api,
            model: model.into(),
            temperature,
        }
    }

    fn request_body(&self, context: &ConversationContext) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": context.to_messages(),
            "temperature": self.temperature,
            "stream": false,
        })
    }
}

#[async_trait]
impl ResponseGenerator for ChatApiGenerator {
    async fn generate(&self, context: &ConversationContext) -> Result<String> {
        let start = Instant::now();
        let request = self
            .api
            .post("/v1/chat/completions")
            .json(&self.request_body(context));
        let response = send_checked(request, "chat completion", AttuneError::Generation).await?;
        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AttuneError::Generation(format!("response parse error: {e}")))?;

        let reply = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_owned())
            .ok_or_else(|| AttuneError::Generation("response contained no choices".into()))?;

        info!(
            chars = reply.len(),
            history = context.messages.len(),
            "generated reply in {:.2}s",
            start.elapsed().as_secs_f64()
        );
        Ok(reply)
    }
}
