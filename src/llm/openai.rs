use serde::{Deserialize, Serialize};

use super::provider::{ChatModel, ModelError, ModelPrompt, ModelReply, ModelResult};
use crate::http::client::HttpClient;

/// Chat-completions client: one system message, one user message, first
/// choice back. No retries and no streaming.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    http: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(
        http: HttpClient,
        api_key: Option<String>,
        model: String,
        base_url: String,
    ) -> ModelResult<Self> {
        let api_key = api_key
            .filter(|v| !v.trim().is_empty())
            .ok_or(ModelError::MissingApiKey)?;

        Ok(Self {
            http,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_request<'a>(model: &'a str, prompt: &'a ModelPrompt) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user_message,
                },
            ],
        }
    }

    fn extract_text(resp: ChatCompletionResponse) -> ModelResult<String> {
        resp.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ModelError::BlankReply)
    }
}

impl ChatModel for OpenAiProvider {
    async fn complete(&self, prompt: ModelPrompt) -> ModelResult<ModelReply> {
        let payload = Self::build_request(&self.model, &prompt);
        let resp = self
            .http
            .post_json(&self.endpoint(), Some(&self.api_key), &payload)
            .await
            .map_err(|err| ModelError::Transport(err.to_string()))?;

        if !resp.is_success() {
            let body = resp.body.chars().take(400).collect::<String>();
            return Err(ModelError::Status {
                code: resp.status,
                body,
            });
        }

        let parsed = serde_json::from_str::<ChatCompletionResponse>(&resp.body)
            .map_err(|err| ModelError::Decode(err.to_string()))?;
        let text = Self::extract_text(parsed)?;
        Ok(ModelReply { text })
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}
