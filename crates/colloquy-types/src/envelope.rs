use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome tag carried by every generated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    /// A configured backend produced the reply.
    Success,
    /// The rule-based demo variant produced the reply.
    Demo,
    /// Generation failed and a canned apology was returned.
    Error,
}

impl ReplyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Demo => "demo",
            Self::Error => "error",
        }
    }
}

/// Uniform result structure returned by every backend variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub text: String,
    /// Heuristic token estimate (word count for local variants, provider
    /// usage figures for remote).
    pub tokens: u32,
    /// Identifier of the backend that produced the reply, e.g. a model name.
    pub backend: String,
    pub timestamp: DateTime<Utc>,
    pub status: ReplyStatus,
}

impl Envelope {
    pub fn new(text: impl Into<String>, tokens: u32, backend: impl Into<String>, status: ReplyStatus) -> Self {
        Self {
            text: text.into(),
            tokens,
            backend: backend.into(),
            timestamp: Utc::now(),
            status,
        }
    }
}

/// Sampling and length parameters forwarded to generation backends.
///
/// Mutable at runtime through the config endpoint; unknown keys there are
/// rejected before reaching this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

/// Word-count token estimate used wherever no provider figure exists.
pub fn estimate_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_status_lowercase() {
        let envelope = Envelope::new("olá", 1, "demo", ReplyStatus::Demo);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["status"], "demo");
        assert_eq!(json["tokens"], 1);
    }

    #[test]
    fn token_estimate_counts_words() {
        assert_eq!(estimate_tokens("olá mundo cruel"), 3);
        assert_eq!(estimate_tokens("   "), 0);
    }
}
