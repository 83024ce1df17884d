use std::sync::RwLock;

use colloquy_types::{ChatTurn, Envelope, GenerationOptions};
use serde::{Deserialize, Serialize};

use crate::backend::{BackendKind, ResponseBackend};
use crate::demo::DemoBackend;
use crate::local::LocalBackend;
use crate::remote::RemoteBackend;

/// Everything needed to construct a backend at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub backend: BackendKind,
    pub model: String,
    pub remote_base_url: String,
    /// May be empty; the remote variant then downgrades to demo.
    pub api_key: String,
    pub local_url: String,
    pub options: GenerationOptions,
}

/// Runtime mutation of the generation options; unknown keys are rejected
/// at deserialization time.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsPatch {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

impl OptionsPatch {
    pub fn is_empty(&self) -> bool {
        self.max_tokens.is_none() && self.temperature.is_none() && self.top_p.is_none()
    }

    pub fn apply_to(&self, options: &mut GenerationOptions) {
        if let Some(max_tokens) = self.max_tokens {
            options.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            options.temperature = temperature;
        }
        if let Some(top_p) = self.top_p {
            options.top_p = top_p;
        }
    }
}

/// Introspection payload for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub requested: BackendKind,
    pub active: BackendKind,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub model: String,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    pub text_generation: bool,
    pub conversation: bool,
    pub context_aware: bool,
    pub multilingual: bool,
}

/// Owns the selected backend variant for the process lifetime.
///
/// The variant decision is made once here: if the requested variant cannot
/// be set up, the engine permanently downgrades to the rule-based demo and
/// reports that through `status`. Generation options stay mutable behind a
/// lock; readers take a snapshot per call.
pub struct Engine {
    requested: BackendKind,
    active: BackendKind,
    degraded_reason: Option<String>,
    backend: Box<dyn ResponseBackend>,
    options: RwLock<GenerationOptions>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let requested = config.backend;
        let built: anyhow::Result<Box<dyn ResponseBackend>> = match requested {
            BackendKind::Demo => Ok(Box::new(DemoBackend::new())),
            BackendKind::Remote => {
                RemoteBackend::new(&config.api_key, &config.remote_base_url, &config.model)
                    .map(|backend| Box::new(backend) as Box<dyn ResponseBackend>)
            }
            BackendKind::Local => LocalBackend::new(&config.local_url, &config.model)
                .map(|backend| Box::new(backend) as Box<dyn ResponseBackend>),
        };

        let (backend, active, degraded_reason) = match built {
            Ok(backend) => {
                tracing::info!(backend = requested.as_str(), "response backend ready");
                (backend, requested, None)
            }
            Err(err) => {
                tracing::warn!(
                    backend = requested.as_str(),
                    "backend setup failed, downgrading to demo: {err:#}"
                );
                (
                    Box::new(DemoBackend::new()) as Box<dyn ResponseBackend>,
                    BackendKind::Demo,
                    Some(err.to_string()),
                )
            }
        };

        Self {
            requested,
            active,
            degraded_reason,
            backend,
            options: RwLock::new(config.options),
        }
    }

    pub async fn generate(&self, message: &str, context: &[ChatTurn]) -> Envelope {
        self.generate_with(message, context, None).await
    }

    /// Generate with per-request option overrides; the stored options are
    /// left untouched.
    pub async fn generate_with(
        &self,
        message: &str,
        context: &[ChatTurn],
        overrides: Option<&OptionsPatch>,
    ) -> Envelope {
        let mut options = self.options();
        if let Some(patch) = overrides {
            patch.apply_to(&mut options);
        }
        self.backend.generate(message, context, &options).await
    }

    pub fn active(&self) -> BackendKind {
        self.active
    }

    pub fn options(&self) -> GenerationOptions {
        self.options
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn update_options(&self, patch: OptionsPatch) -> GenerationOptions {
        let mut options = self.options.write().unwrap_or_else(|e| e.into_inner());
        patch.apply_to(&mut options);
        options.clone()
    }

    pub fn status(&self) -> EngineStatus {
        let context_aware = self.active != BackendKind::Demo;
        EngineStatus {
            requested: self.requested,
            active: self.active,
            degraded: self.degraded_reason.is_some(),
            reason: self.degraded_reason.clone(),
            model: self.backend.name().to_string(),
            capabilities: Capabilities {
                text_generation: true,
                conversation: true,
                context_aware,
                multilingual: context_aware,
            },
        }
    }
}
