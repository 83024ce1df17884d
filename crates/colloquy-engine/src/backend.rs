use async_trait::async_trait;
use colloquy_types::{ChatTurn, Envelope, GenerationOptions};
use serde::{Deserialize, Serialize};

/// Instructions shared by every generating variant.
pub const SYSTEM_PREAMBLE: &str = "Você é Lia, uma assistente de IA amigável, prestativa e \
inteligente. Responda sempre em português de forma natural e conversacional.";

/// One concrete response-generation strategy.
///
/// `generate` never fails: variants that can fail carry the rule-based
/// backend internally and fall back to it, so callers always receive an
/// envelope.
#[async_trait]
pub trait ResponseBackend: Send + Sync {
    /// Identifier reported in envelopes and status payloads.
    fn name(&self) -> &str;

    async fn generate(
        &self,
        message: &str,
        context: &[ChatTurn],
        options: &GenerationOptions,
    ) -> Envelope;
}

/// The closed set of backend variants selectable through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Demo,
    Remote,
    Local,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }

    /// Unknown configuration values fall back to the demo variant.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "remote" | "openai" => Self::Remote,
            "local" | "llama" => Self::Local,
            _ => Self::Demo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parsing_accepts_aliases() {
        assert_eq!(BackendKind::parse("openai"), BackendKind::Remote);
        assert_eq!(BackendKind::parse("LLAMA"), BackendKind::Local);
        assert_eq!(BackendKind::parse("anything-else"), BackendKind::Demo);
    }
}
