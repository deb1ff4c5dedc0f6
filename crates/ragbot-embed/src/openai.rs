//! Thin client for the OpenAI REST API.
//!
//! Shared by the embedding provider here and the chat completer in
//! `ragbot-chat`. Non-success statuses are mapped onto
//! [`ragbot_core::UpstreamKind`]; nothing is retried.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

use ragbot_core::config::OpenAiConfig;
use ragbot_core::{Error, Result, UpstreamKind};

pub const SERVICE: &str = "openai";

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::config("OpenAI API key is required (set OPENAI_API_KEY)"));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, api_key, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    pub fn from_config(cfg: &OpenAiConfig) -> Result<Self> {
        let key = cfg.api_key.clone().unwrap_or_default();
        Self::new(key, cfg.base_url.clone(), Duration::from_secs(cfg.timeout_secs))
    }

    pub async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!("OpenAI request to {} failed: {}", path, e);
                transport_error(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("OpenAI API error ({}): {}", status, text);
            return Err(Error::from_status(SERVICE, status.as_u16(), text));
        }
        response
            .json::<Resp>()
            .await
            .map_err(|e| Error::upstream(SERVICE, UpstreamKind::InvalidResponse, e.to_string()))
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    let kind = if e.is_timeout() { UpstreamKind::Timeout } else { UpstreamKind::Transport };
    Error::upstream(SERVICE, kind, e.to_string())
}
