
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::base::{LlmMetadata, LlmProvider, LlmProviderError};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CompletionMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Any `/chat/completions` endpoint (OpenAI, Cerebras, Gemini's compat layer, vLLM...).
pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f64,
    client: Client,
}

impl OpenAiCompatProvider {

    pub fn new(
        base_url: Option<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        temperature: f64,
    ) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        let model = model.into();
        info!("OpenAI-compatible provider initialized (model={}, url={})", model, base_url);
        Self {
            base_url,
            api_key,
            model,
            temperature,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        response_format: Option<&str>,
    ) -> Result<(String, LlmMetadata), LlmProviderError> {
        let request = CompletionRequest {
            model: &self.model,
            messages: vec![
                CompletionMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                CompletionMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            temperature: self.temperature,
            response_format: response_format.map(|f| ResponseFormat {
                r#type: f.to_string(),
            }),
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await?
            .error_for_status()?
            .json::<CompletionResponse>()
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmProviderError::Provider("No choices in response".to_string()))?
            .message
            .content;

        let mut metadata = LlmMetadata {
            provider: "openai".to_string(),
            model: self.model.clone(),
            base_url: Some(self.base_url.clone()),
            ..Default::default()
        };
        if let Some(usage) = response.usage {
            metadata.tokens_prompt = Some(usage.prompt_tokens);
            metadata.tokens_completion = Some(usage.completion_tokens);
        }

        Ok((content, metadata))
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
