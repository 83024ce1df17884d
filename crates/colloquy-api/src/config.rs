use colloquy_engine::{BackendKind, EngineConfig};
use colloquy_types::GenerationOptions;
use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub database: DatabaseConfig,
    pub ai: AiConfig,
    pub streaming: StreamingConfig,
    pub logging: LoggingConfig,

    // Secret (from ENV only)
    #[serde(default)]
    pub openai_api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// One of "demo", "remote" (alias "openai"), "local" (alias "llama").
    pub backend: String,
    pub model: String,
    pub remote_base_url: String,
    #[serde(default)]
    pub local_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamingConfig {
    /// Cosmetic inter-chunk delay in milliseconds.
    pub chunk_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from TOML files and environment variables.
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables (SERVER_, DATABASE_, AI_, LOG_ prefixes)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::default()
                    .prefix("SERVER")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("DATABASE")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("AI")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("LOG")
                    .separator("_")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        let mut cfg: Config = config.try_deserialize()?;

        // The key is optional: without it the remote variant downgrades
        // to demo instead of refusing to start.
        cfg.openai_api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();

        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));
        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            backend: BackendKind::parse(&self.ai.backend),
            model: self.ai.model.clone(),
            remote_base_url: self.ai.remote_base_url.clone(),
            api_key: self.openai_api_key.clone(),
            local_url: self.ai.local_url.clone(),
            options: GenerationOptions {
                max_tokens: self.ai.max_tokens,
                temperature: self.ai.temperature,
                top_p: self.ai.top_p,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
            [server]
            host = "127.0.0.1"
            port = 5000

            [cors]
            enabled = true
            origins = ["http://localhost:3000"]

            [database]
            path = "colloquy.db"

            [ai]
            backend = "demo"
            model = "gpt-4o-mini"
            remote_base_url = "https://api.openai.com/v1"
            max_tokens = 500
            temperature = 0.7
            top_p = 0.9

            [streaming]
            chunk_delay_ms = 30

            [logging]
            level = "debug"
            format = "json"
        "#;

    #[test]
    fn config_structure_deserializes() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.database.path, "colloquy.db");
        assert_eq!(config.engine_config().backend, BackendKind::Demo);
        assert_eq!(config.engine_config().options.max_tokens, 500);
    }

    #[test]
    fn loads_from_a_specific_file() {
        let path = std::env::temp_dir().join("colloquy-config-from-file.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.streaming.chunk_delay_ms, 30);

        std::fs::remove_file(&path).ok();
    }
}
