use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use colloquy_api::{
    bootstrap,
    config::Config,
    routes::{ai, conversations, health, learning, users},
    state::AppState,
};
use colloquy_engine::Engine;
use colloquy_store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config =
        Config::load().map_err(|e| anyhow::anyhow!("failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!("starting Colloquy API server");
    tracing::info!("config loaded: {}:{}", config.server.host, config.server.port);

    let store = Store::open(&config.database.path).await?;
    tracing::info!(path = %config.database.path, "store ready");
    bootstrap::seed(&store, &config).await?;

    let engine = Engine::new(config.engine_config());
    let status = engine.status();
    tracing::info!(
        backend = status.active.as_str(),
        degraded = status.degraded,
        "engine ready"
    );

    let state = AppState::new(config.clone(), store, engine);
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("server listening on {}", addr);
    tracing::info!("health check: http://{}/api/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Health & info
        .route("/health", get(health::health_check))
        .route("/info", get(health::info))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // Conversations
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route(
            "/conversations/:id",
            get(conversations::get_conversation)
                .put(conversations::update_conversation)
                .delete(conversations::delete_conversation),
        )
        .route(
            "/conversations/:id/messages",
            get(conversations::list_messages),
        )
        // AI
        .route("/ai/generate", post(ai::generate))
        .route("/ai/stream", post(ai::stream))
        .route("/ai/feedback", post(ai::submit_feedback))
        .route("/ai/status", get(ai::status))
        .route("/ai/config", get(ai::get_config).put(ai::update_config))
        .route("/ai/models", get(ai::models))
        // Learning (placeholder surface)
        .route("/learning/metrics", get(learning::metrics))
        .route(
            "/learning/analyze/:conversation_id",
            post(learning::analyze_conversation),
        )
        .route("/learning/train", post(learning::train));

    Router::new()
        .nest("/api", api_routes)
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(120)))
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.cors.enabled {
        let mut cors = CorsLayer::new()
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers(Any);

        if config.cors.origins.iter().any(|o| o == "*") {
            cors = cors.allow_origin(Any);
        } else {
            for origin in &config.cors.origins {
                if let Ok(parsed_origin) = origin.parse::<axum::http::HeaderValue>() {
                    cors = cors.allow_origin(parsed_origin);
                }
            }
        }

        cors
    } else {
        CorsLayer::permissive()
    }
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_layer_builds_from_config() {
        let toml = r#"
            [server]
            host = "127.0.0.1"
            port = 5000

            [cors]
            enabled = true
            origins = ["*"]

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
            chunk_delay_ms = 30

            [logging]
            level = "info"
            format = "pretty"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let _cors = build_cors_layer(&config);
    }
}
