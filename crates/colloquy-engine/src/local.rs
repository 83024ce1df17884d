use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use colloquy_types::{estimate_tokens, ChatTurn, Envelope, GenerationOptions, ReplyStatus};
use serde::Deserialize;
use serde_json::json;

use crate::backend::{ResponseBackend, SYSTEM_PREAMBLE};
use crate::demo::DemoBackend;

const TURN_STOP: &str = "<|eot_id|>";

/// Local variant: a llama.cpp-style inference server on the same host.
///
/// The history is flattened into one delimited prompt string with explicit
/// turn-boundary markers; the server returns the decoded continuation.
pub struct LocalBackend {
    http: reqwest::Client,
    base_url: String,
    model: String,
    fallback: DemoBackend,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
}

/// Llama-3 style prompt: system preamble, role-tagged history, then an
/// open assistant header for the model to continue.
pub fn build_prompt(message: &str, context: &[ChatTurn]) -> String {
    let mut prompt = format!(
        "<|begin_of_text|><|start_header_id|>system<|end_header_id|>\n{SYSTEM_PREAMBLE}{TURN_STOP}"
    );
    for turn in context {
        prompt.push_str(&format!(
            "<|start_header_id|>{}<|end_header_id|>\n{}{TURN_STOP}",
            turn.role.as_str(),
            turn.content
        ));
    }
    prompt.push_str(&format!(
        "<|start_header_id|>user<|end_header_id|>\n{message}{TURN_STOP}\
         <|start_header_id|>assistant<|end_header_id|>\n"
    ));
    prompt
}

impl LocalBackend {
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self> {
        if base_url.trim().is_empty() {
            bail!("local backend requires an inference server URL");
        }
        let http = reqwest::Client::builder()
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            fallback: DemoBackend::new(),
        })
    }

    async fn request(
        &self,
        message: &str,
        context: &[ChatTurn],
        options: &GenerationOptions,
    ) -> Result<Envelope> {
        let payload = json!({
            "prompt": build_prompt(message, context),
            "n_predict": options.max_tokens,
            "temperature": options.temperature,
            "top_p": options.top_p,
            "stop": [TURN_STOP],
        });

        let response = self
            .http
            .post(format!("{}/completion", self.base_url))
            .json(&payload)
            .send()
            .await
            .context("inference request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("inference server returned {}", status);
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .context("malformed inference response")?;

        let text = completion.content.trim().to_string();
        if text.is_empty() {
            bail!("inference server returned an empty continuation");
        }

        let tokens = estimate_tokens(&text);
        Ok(Envelope::new(text, tokens, self.model.clone(), ReplyStatus::Success))
    }
}

#[async_trait]
impl ResponseBackend for LocalBackend {
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
                tracing::warn!("local generation failed, using demo fallback: {err:#}");
                self.fallback.generate(message, context, options).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_types::ChatTurn;

    #[test]
    fn prompt_embeds_history_with_turn_markers() {
        let context = vec![ChatTurn::user("oi"), ChatTurn::assistant("olá!")];
        let prompt = build_prompt("tudo bem?", &context);

        assert!(prompt.starts_with("<|begin_of_text|><|start_header_id|>system<|end_header_id|>"));
        assert!(prompt.contains("<|start_header_id|>user<|end_header_id|>\noi<|eot_id|>"));
        assert!(prompt.contains("<|start_header_id|>assistant<|end_header_id|>\nolá!<|eot_id|>"));
        assert!(prompt.ends_with("<|start_header_id|>assistant<|end_header_id|>\n"));
    }
}
