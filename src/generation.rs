use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use backoff::ExponentialBackoffBuilder;
use futures::future::{BoxFuture, FutureExt};
use std::time::Duration;
use tracing::debug;

use crate::error::{AppError, AppResult};

pub const TEMPERATURE: f32 = 0.5;
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can turn a prompt into a completion.
///
/// The scan pipeline holds this as a trait object so the Groq-backed client
/// can be swapped for a canned one in tests.
pub trait TextGenerator: Send + Sync {
    fn generate<'a>(&'a self, prompt: &'a str, max_tokens: u32) -> BoxFuture<'a, AppResult<String>>;
}

/// Chat-completions client for Groq's OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct GroqGenerator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl GroqGenerator {
    /// Every call is a single attempt bounded by `timeout`; a rate-limited or
    /// slow reply fails instead of being retried.
    pub fn new(api_key: &str, api_base: &str, model: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let single_attempt = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        Ok(Self {
            client: Client::with_config(config)
                .with_http_client(http)
                .with_backoff(single_attempt),
            model: model.into(),
        })
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> AppResult<String> {
        let message: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()?
            .into();
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(vec![message])
            .temperature(TEMPERATURE)
            .max_tokens(max_tokens)
            .build()?;

        let response = self.client.chat().create(request).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AppError::Upstream("empty completion".to_string()))?;

        debug!(model = %self.model, chars = content.len(), "Completion received");
        Ok(content)
    }
}

impl TextGenerator for GroqGenerator {
    fn generate<'a>(&'a self, prompt: &'a str, max_tokens: u32) -> BoxFuture<'a, AppResult<String>> {
        self.complete(prompt, max_tokens).boxed()
    }
}
