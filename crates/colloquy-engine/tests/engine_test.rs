use colloquy_engine::{
    category_for, BackendKind, DemoBackend, Engine, EngineConfig, OptionsPatch, RemoteBackend,
    ResponseBackend,
};
use colloquy_types::{ChatTurn, GenerationOptions, ReplyStatus};

fn engine_config(backend: BackendKind, api_key: &str) -> EngineConfig {
    EngineConfig {
        backend,
        model: "gpt-4o-mini".to_string(),
        remote_base_url: "https://api.openai.com/v1".to_string(),
        api_key: api_key.to_string(),
        local_url: String::new(),
        options: GenerationOptions::default(),
    }
}

#[tokio::test]
async fn greeting_wins_over_status_keywords() {
    // "oi, como você está?" carries both greeting and status keywords;
    // category order decides.
    assert_eq!(category_for("oi, como você está?"), Some("greeting"));
    assert_eq!(category_for("como você está?"), Some("status"));
    assert_eq!(category_for("qual é o seu nome?"), Some("identity"));
    assert_eq!(category_for("xyzzy 123"), None);

    let backend = DemoBackend::new();
    let reply = backend
        .generate("Oi, como você está?", &[], &GenerationOptions::default())
        .await;
    assert!(reply.text.starts_with("Olá! Sou a Lia"));
    assert_eq!(reply.status, ReplyStatus::Demo);
    assert_eq!(reply.backend, "demo-mode");
}

#[tokio::test]
async fn seeded_demo_fallback_is_deterministic() {
    let first = DemoBackend::with_seed(42);
    let second = DemoBackend::with_seed(42);
    let options = GenerationOptions::default();

    for _ in 0..5 {
        let a = first.generate("xyzzy 123", &[], &options).await;
        let b = second.generate("xyzzy 123", &[], &options).await;
        assert_eq!(a.text, b.text);
    }
}

#[tokio::test]
async fn demo_envelope_reports_token_estimate() {
    let backend = DemoBackend::new();
    let reply = backend
        .generate("olá", &[], &GenerationOptions::default())
        .await;
    assert_eq!(reply.tokens, reply.text.split_whitespace().count() as u32);
}

#[test]
fn missing_api_key_downgrades_to_demo_permanently() {
    let engine = Engine::new(engine_config(BackendKind::Remote, ""));
    let status = engine.status();

    assert_eq!(status.requested, BackendKind::Remote);
    assert_eq!(status.active, BackendKind::Demo);
    assert!(status.degraded);
    assert!(status.reason.is_some());
    assert_eq!(status.model, "demo-mode");
    assert!(!status.capabilities.context_aware);
}

#[test]
fn configured_remote_backend_is_not_degraded() {
    let engine = Engine::new(engine_config(BackendKind::Remote, "sk-test"));
    let status = engine.status();

    assert_eq!(status.active, BackendKind::Remote);
    assert!(!status.degraded);
    assert_eq!(status.model, "gpt-4o-mini");
    assert!(status.capabilities.context_aware);
}

#[test]
fn options_patch_applies_only_present_fields() {
    let engine = Engine::new(engine_config(BackendKind::Demo, ""));

    let updated = engine.update_options(OptionsPatch {
        max_tokens: Some(120),
        temperature: None,
        top_p: None,
    });
    assert_eq!(updated.max_tokens, 120);
    assert_eq!(updated.temperature, 0.7);
    assert_eq!(updated.top_p, 0.9);

    let snapshot = engine.options();
    assert_eq!(snapshot.max_tokens, 120);
}

#[tokio::test]
async fn per_request_overrides_do_not_touch_stored_options() {
    let engine = Engine::new(engine_config(BackendKind::Demo, ""));

    let overrides = OptionsPatch {
        max_tokens: Some(32),
        temperature: Some(0.1),
        top_p: None,
    };
    let reply = engine.generate_with("olá", &[], Some(&overrides)).await;
    assert!(!reply.text.is_empty());

    let stored = engine.options();
    assert_eq!(stored.max_tokens, 500);
    assert_eq!(stored.temperature, 0.7);
}

#[test]
fn options_patch_rejects_unknown_fields() {
    let err = serde_json::from_str::<OptionsPatch>(r#"{"max_tokens": 10, "beam_width": 4}"#);
    assert!(err.is_err());
}

#[tokio::test]
async fn remote_backend_maps_completion_response() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "choices": [{"message": {"role": "assistant", "content": "Tudo certo por aqui!"}}],
                "usage": {"prompt_tokens": 20, "completion_tokens": 22, "total_tokens": 42}
            }"#,
        )
        .create_async()
        .await;

    let backend = RemoteBackend::new("sk-test", server.url(), "gpt-4o-mini").unwrap();
    let context = vec![ChatTurn::user("oi"), ChatTurn::assistant("olá!")];
    let reply = backend
        .generate("tudo bem?", &context, &GenerationOptions::default())
        .await;

    mock.assert_async().await;
    assert_eq!(reply.text, "Tudo certo por aqui!");
    assert_eq!(reply.tokens, 42);
    assert_eq!(reply.backend, "gpt-4o-mini");
    assert_eq!(reply.status, ReplyStatus::Success);
}

#[tokio::test]
async fn remote_failure_falls_back_to_demo() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(500)
        .with_body("upstream exploded")
        .create_async()
        .await;

    let backend = RemoteBackend::new("sk-test", server.url(), "gpt-4o-mini").unwrap();
    let reply = backend
        .generate("olá", &[], &GenerationOptions::default())
        .await;

    mock.assert_async().await;
    assert_eq!(reply.status, ReplyStatus::Demo);
    assert_eq!(reply.backend, "demo-mode");
    assert!(reply.text.starts_with("Olá! Sou a Lia"));
}
