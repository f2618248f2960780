
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::base::{LlmMetadata, LlmProvider, LlmProviderError};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}


pub struct OllamaProvider {
    base_url: String,
    model: String,
    temperature: f64,
    client: Client,
}

impl OllamaProvider {

    pub fn new(base_url: impl Into<String>, model: impl Into<String>, temperature: f64) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let model = model.into();
        info!("Ollama provider initialized (model={}, url={})", model, base_url);
        Self {
            base_url,
            model,
            temperature,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        response_format: Option<&str>,
    ) -> Result<(String, LlmMetadata), LlmProviderError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
            format: (response_format == Some("json_object")).then_some("json"),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;

        debug!(
            "Ollama completion: prompt_tokens={}, completion_tokens={}",
            response.prompt_eval_count, response.eval_count
        );

        let metadata = LlmMetadata {
            provider: "ollama".to_string(),
            model: self.model.clone(),
            base_url: Some(self.base_url.clone()),
            tokens_prompt: Some(response.prompt_eval_count),
            tokens_completion: Some(response.eval_count),
            ..Default::default()
        };

        Ok((response.message.content, metadata))
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
