use crate::error::CompletionError;
use crate::traits::{CompletionMessage, CompletionModel, CompletionParams};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_MODEL: &str = "openai/gpt-oss-20b";
pub const DEFAULT_ROUTER_URL: &str = "https://router.huggingface.co/v1";
pub const DEFAULT_INFERENCE_URL: &str = "https://router.huggingface.co/hf-inference";

/// Chat completion through the Hugging Face router (OpenAI-compatible), with
/// the classic text-generation task on the inference API as a second path.
pub struct HuggingFaceCompletionModel {
    model: String,
    token: String,
    router_url: String,
    inference_url: String,
    client: Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct TextGenerationRequest<'a> {
    inputs: &'a str,
    parameters: TextGenerationParameters,
}

#[derive(Serialize)]
struct TextGenerationParameters {
    max_new_tokens: u32,
    temperature: f64,
    return_full_text: bool,
}

#[derive(Deserialize)]
struct GeneratedText {
    generated_text: String,
}

impl HuggingFaceCompletionModel {
    pub fn new(
        model: &str,
        token: &str,
        router_url: &str,
        inference_url: &str,
        client: Client,
    ) -> Self {
        Self {
            model: model.to_string(),
            token: token.to_string(),
            router_url: router_url.trim_end_matches('/').to_string(),
            inference_url: inference_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn chat_endpoint(&self) -> String {
        format!("{}/chat/completions", self.router_url)
    }

    fn text_generation_endpoint(&self) -> String {
        format!("{}/models/{}", self.inference_url, self.model)
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<reqwest::Response, CompletionError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::BackendResponse { status, body });
        }
        Ok(response)
    }
}

#[async_trait]
impl CompletionModel for HuggingFaceCompletionModel {
    async fn chat(
        &self,
        messages: &[CompletionMessage],
        params: CompletionParams,
    ) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|message| ChatMessage {
                    role: &message.role,
                    content: &message.content,
                })
                .collect(),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        debug!(model = %self.model, "requesting chat completion");
        let response: ChatResponse = self.post(&self.chat_endpoint(), &request).await?.json().await?;
        first_choice(response)
    }

    async fn text_generation(
        &self,
        prompt: &str,
        params: CompletionParams,
    ) -> Result<String, CompletionError> {
        let request = TextGenerationRequest {
            inputs: prompt,
            parameters: TextGenerationParameters {
                max_new_tokens: params.max_tokens,
                temperature: params.temperature,
                return_full_text: false,
            },
        };

        debug!(model = %self.model, "requesting text generation");
        let generated: Vec<GeneratedText> = self
            .post(&self.text_generation_endpoint(), &request)
            .await?
            .json()
            .await?;
        generated
            .into_iter()
            .map(|item| item.generated_text.trim().to_string())
            .find(|text| !text.is_empty())
            .ok_or(CompletionError::EmptyResponse)
    }
}

fn first_choice(response: ChatResponse) -> Result<String, CompletionError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(CompletionError::EmptyResponse)
}
