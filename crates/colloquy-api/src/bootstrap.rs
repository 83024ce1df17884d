use colloquy_store::{NewUser, Store};
use colloquy_types::Metadata;
use serde_json::Value;

use crate::config::Config;

/// Seed the store on startup: baseline settings plus a default user when
/// the table is empty. Settings use `ensure`, so operator edits survive
/// restarts.
pub async fn seed(store: &Store, config: &Config) -> anyhow::Result<()> {
    store
        .config()
        .ensure(
            "app_version",
            env!("CARGO_PKG_VERSION"),
            Some("Deployed application version".to_string()),
        )
        .await?;
    store
        .config()
        .ensure(
            "ai_model",
            config.ai.model.clone(),
            Some("Model the engine was configured with".to_string()),
        )
        .await?;
    store
        .config()
        .ensure(
            "max_conversations_per_user",
            "50",
            Some("Soft cap surfaced to clients".to_string()),
        )
        .await?;

    if store.users().count().await? == 0 {
        let mut preferences = Metadata::new();
        preferences.insert("theme".to_string(), Value::String("green".to_string()));
        preferences.insert("language".to_string(), Value::String("pt-BR".to_string()));

        let user = store
            .users()
            .create(NewUser {
                username: "lia_user".to_string(),
                email: "user@lia.ai".to_string(),
                preferences,
            })
            .await?;
        tracing::info!(user_id = user.id, "default user created");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_config() -> Config {
        let toml = r#"
            [server]
            host = "127.0.0.1"
            port = 5000

            [cors]
            enabled = false
            origins = []

            [database]
            path = ":memory:"

            [ai]
            backend = "demo"
            model = "gpt-4o-mini"
            remote_base_url = "https://api.openai.com/v1"
            max_tokens = 500
            temperature = 0.7
            top_p = 0.9

            [streaming]
            chunk_delay_ms = 0

            [logging]
            level = "info"
            format = "pretty"
        "#;
        toml::from_str(toml).expect("test config")
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let store = Store::in_memory().await.unwrap();
        let config = test_config();

        seed(&store, &config).await.unwrap();
        seed(&store, &config).await.unwrap();

        assert_eq!(store.users().count().await.unwrap(), 1);
        let version = store.config().get("app_version").await.unwrap().unwrap();
        assert_eq!(version.value, env!("CARGO_PKG_VERSION"));
    }
}
