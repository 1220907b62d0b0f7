//! OpenAI Chat Completions client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use super::{AssistantError, ReplyGenerator, UNAVAILABLE_REPLY, build_system_prompt, extract_reply};
use crate::models::ChatMessage;

const TEMPERATURE: f32 = 0.3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Assistant backed by the OpenAI Chat Completions API.
#[derive(Clone)]
pub struct OpenAiClient {
    inner: Arc<OpenAiClientInner>,
}

struct OpenAiClientInner {
    client: reqwest::Client,
    api_base: String,
    api_key: SecretString,
    model: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [RequestMessage<'a>; 2],
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(
        api_key: SecretString,
        api_base: &str,
        model: &str,
    ) -> Result<Self, AssistantError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(OpenAiClientInner {
                client,
                api_base: api_base.trim_end_matches('/').to_string(),
                api_key,
                model: model.to_string(),
            }),
        })
    }

    /// Raw message content of one completion.
    async fn complete(&self, system: &str, query: &str) -> Result<String, AssistantError> {
        let body = CompletionRequest {
            model: &self.inner.model,
            messages: [
                RequestMessage {
                    role: "system",
                    content: system,
                },
                RequestMessage {
                    role: "user",
                    content: query,
                },
            ],
            temperature: TEMPERATURE,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .inner
            .client
            .post(format!("{}/v1/chat/completions", self.inner.api_base))
            .bearer_auth(self.inner.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AssistantError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::Parse(e.to_string()))?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map_or_else(|| "{}".to_string(), |c| c.trim().to_string()))
    }
}

#[async_trait]
impl ReplyGenerator for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.inner.model, history = history.len()))]
    async fn generate_reply(
        &self,
        history: &[ChatMessage],
        catalog: &str,
        query: &str,
    ) -> String {
        let system = build_system_prompt(history, catalog, query);
        match self.complete(&system, query).await {
            Ok(content) => extract_reply(&content),
            Err(e) => {
                warn!(error = %e, "Assistant completion failed");
                UNAVAILABLE_REPLY.to_string()
            }
        }
    }
}
