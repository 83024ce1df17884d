use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use colloquy_types::{estimate_tokens, ChatTurn, Envelope, GenerationOptions, ReplyStatus};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::backend::{ResponseBackend, SYSTEM_PREAMBLE};
use crate::demo::DemoBackend;

/// Remote variant: an OpenAI-compatible chat-completions endpoint,
/// HTTP direct, no SDK.
pub struct RemoteBackend {
    http: reqwest::Client,
    base_url: String,
    model: String,
    fallback: DemoBackend,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

impl RemoteBackend {
    pub fn new(
        api_key: &str,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            bail!("remote backend requires an API key");
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .context("invalid API key format")?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            fallback: DemoBackend::new(),
        })
    }

    fn build_payload(&self, message: &str, context: &[ChatTurn], options: &GenerationOptions) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": SYSTEM_PREAMBLE })];
        for turn in context {
            messages.push(json!({ "role": turn.role.as_str(), "content": turn.content }));
        }
        messages.push(json!({ "role": "user", "content": message }));

        json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
            "top_p": options.top_p,
        })
    }

    async fn request(
        &self,
        message: &str,
        context: &[ChatTurn],
        options: &GenerationOptions,
    ) -> Result<Envelope> {
        let payload = self.build_payload(message, context, options);
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&payload)
            .send()
            .await
            .context("completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("completion endpoint returned {}: {}", status, body);
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("malformed completion response")?;

        let text = completion
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .context("completion response carried no content")?
            .to_string();

        let tokens = completion
            .usage
            .map(|usage| usage.total_tokens)
            .unwrap_or_else(|| estimate_tokens(&text));

        Ok(Envelope::new(text, tokens, self.model.clone(), ReplyStatus::Success))
    }
}

#[async_trait]
impl ResponseBackend for RemoteBackend {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        message: &str,
        context: &[ChatTurn],
        options: &GenerationOptions,
    ) -> Envelope {
        match self.request(message, context, options).await {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!("remote generation failed, using demo fallback: {err:#}");
                self.fallback.generate(message, context, options).await
            }
        }
    }
}
