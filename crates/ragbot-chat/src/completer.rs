use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ragbot_core::config::ChatConfig;
use ragbot_core::traits::Completer;
use ragbot_core::types::ChatMessage;
use ragbot_core::{Error, Result, UpstreamKind};
use ragbot_embed::openai::SERVICE;
use ragbot_embed::OpenAiClient;

/// Chat completions over `{base_url}/chat/completions`.
pub struct OpenAiCompleter {
    client: OpenAiClient,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiCompleter {
    pub fn new(client: OpenAiClient, cfg: &ChatConfig) -> Self {
        Self { client, model: cfg.model.clone(), max_tokens: cfg.max_tokens, temperature: cfg.temperature }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Completer for OpenAiCompleter {
    fn model(&self) -> &str { &self.model }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!("requesting completion from {} with {} messages", self.model, messages.len());
        let req = CompletionRequest { model: &self.model, messages, max_tokens: self.max_tokens, temperature: self.temperature };
        let resp: CompletionResponse = self.client.post_json("chat/completions", &req).await?;
        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| Error::upstream(SERVICE, UpstreamKind::InvalidResponse, "completion has no message content"))
    }
}
