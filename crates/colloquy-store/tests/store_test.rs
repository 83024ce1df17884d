use colloquy_store::{
    ConversationFilter, ConversationPatch, FeedbackSubmission, NewConversation, NewMessage,
    NewUser, Store, UserPatch,
};
use colloquy_types::{Metadata, Role};
use serde_json::json;

async fn store_with_user() -> (Store, i64) {
    let store = Store::in_memory().await.unwrap();
    let user = store
        .users()
        .create(NewUser {
            username: "ana".into(),
            email: "ana@example.com".into(),
            preferences: Metadata::new(),
        })
        .await
        .unwrap();
    (store, user.id)
}

fn sample_metadata() -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("topic".into(), json!("viagens"));
    metadata.insert("pinned".into(), json!(true));
    metadata.insert("scores".into(), json!([1, 2.5, null]));
    metadata
}

#[tokio::test]
async fn conversation_metadata_round_trips() {
    let (store, user_id) = store_with_user().await;

    let created = store
        .conversations()
        .create(NewConversation {
            user_id,
            title: Some("Planos".into()),
            metadata: sample_metadata(),
        })
        .await
        .unwrap();

    let fetched = store.conversations().get(created.id).await.unwrap().unwrap();
    assert_eq!(fetched.metadata, sample_metadata());
    assert_eq!(fetched.title, "Planos");
    assert!(!fetched.is_archived);
}

#[tokio::test]
async fn missing_title_gets_timestamped_placeholder() {
    let (store, user_id) = store_with_user().await;

    let created = store
        .conversations()
        .create(NewConversation {
            user_id,
            title: None,
            metadata: Metadata::new(),
        })
        .await
        .unwrap();

    assert!(created.title.starts_with("Conversa "));
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let (store, _) = store_with_user().await;

    let err = store
        .users()
        .create(NewUser {
            username: "ana".into(),
            email: "other@example.com".into(),
            preferences: Metadata::new(),
        })
        .await
        .unwrap_err();
    assert!(err.is_unique_violation());

    let err = store
        .users()
        .update(
            {
                let second = store
                    .users()
                    .create(NewUser {
                        username: "bia".into(),
                        email: "bia@example.com".into(),
                        preferences: Metadata::new(),
                    })
                    .await
                    .unwrap();
                second.id
            },
            UserPatch {
                email: Some("ana@example.com".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_unique_violation());
}

#[tokio::test]
async fn deleting_a_conversation_leaves_no_orphans() {
    let (store, user_id) = store_with_user().await;

    let conversation = store
        .conversations()
        .create(NewConversation {
            user_id,
            title: None,
            metadata: Metadata::new(),
        })
        .await
        .unwrap();

    let (_, assistant) = store
        .messages()
        .record_exchange(
            conversation.id,
            NewMessage::new(Role::User, "oi"),
            NewMessage::new(Role::Assistant, "olá!"),
        )
        .await
        .unwrap();

    store
        .feedback()
        .submit(FeedbackSubmission {
            message_id: assistant.id,
            user_id,
            rating: 5,
            comment: None,
            category: None,
        })
        .await
        .unwrap();

    assert!(store.conversations().delete(conversation.id).await.unwrap());

    assert_eq!(store.messages().count(conversation.id).await.unwrap(), 0);
    assert!(store
        .feedback()
        .list_for_message(assistant.id)
        .await
        .unwrap()
        .is_empty());
    assert!(store.messages().get(assistant.id).await.unwrap().is_none());
}

#[tokio::test]
async fn deleting_a_user_cascades_to_conversations() {
    let (store, user_id) = store_with_user().await;

    let conversation = store
        .conversations()
        .create(NewConversation {
            user_id,
            title: None,
            metadata: Metadata::new(),
        })
        .await
        .unwrap();

    assert!(store.users().delete(user_id).await.unwrap());
    assert!(store
        .conversations()
        .get(conversation.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn repeat_feedback_updates_in_place() {
    let (store, user_id) = store_with_user().await;
    let conversation = store
        .conversations()
        .create(NewConversation {
            user_id,
            title: None,
            metadata: Metadata::new(),
        })
        .await
        .unwrap();
    let message = store
        .messages()
        .append(conversation.id, NewMessage::new(Role::Assistant, "resposta"))
        .await
        .unwrap();

    let (first, created) = store
        .feedback()
        .submit(FeedbackSubmission {
            message_id: message.id,
            user_id,
            rating: 2,
            comment: Some("fraca".into()),
            category: None,
        })
        .await
        .unwrap();
    assert!(created);

    let (second, created) = store
        .feedback()
        .submit(FeedbackSubmission {
            message_id: message.id,
            user_id,
            rating: 4,
            comment: None,
            category: Some("utilidade".into()),
        })
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(second.id, first.id);
    assert_eq!(second.rating, 4);
    // an absent comment keeps the stored one
    assert_eq!(second.comment.as_deref(), Some("fraca"));
    assert_eq!(second.category.as_deref(), Some("utilidade"));

    let all = store.feedback().list_for_message(message.id).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn recent_window_returns_oldest_first() {
    let (store, user_id) = store_with_user().await;
    let conversation = store
        .conversations()
        .create(NewConversation {
            user_id,
            title: None,
            metadata: Metadata::new(),
        })
        .await
        .unwrap();

    for i in 0..8 {
        store
            .messages()
            .append(conversation.id, NewMessage::new(Role::User, format!("m{i}")))
            .await
            .unwrap();
    }

    let window = store
        .messages()
        .recent_window(conversation.id, 5)
        .await
        .unwrap();
    let contents: Vec<_> = window.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["m3", "m4", "m5", "m6", "m7"]);
}

#[tokio::test]
async fn listing_orders_by_recency_and_paginates() {
    let (store, user_id) = store_with_user().await;

    let first = store
        .conversations()
        .create(NewConversation {
            user_id,
            title: Some("primeira".into()),
            metadata: Metadata::new(),
        })
        .await
        .unwrap();
    let second = store
        .conversations()
        .create(NewConversation {
            user_id,
            title: Some("segunda".into()),
            metadata: Metadata::new(),
        })
        .await
        .unwrap();

    // touching the first conversation bumps it to the top
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store
        .conversations()
        .update(
            first.id,
            ConversationPatch {
                title: Some("primeira (editada)".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let listed = store
        .conversations()
        .list(ConversationFilter::for_user(user_id))
        .await
        .unwrap();
    assert_eq!(listed[0].id, first.id);
    assert_eq!(listed[1].id, second.id);

    let mut filter = ConversationFilter::for_user(user_id);
    filter.limit = 1;
    filter.offset = 1;
    let page = store.conversations().list(filter).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, second.id);
}

#[tokio::test]
async fn archived_conversations_are_hidden_by_default() {
    let (store, user_id) = store_with_user().await;
    let conversation = store
        .conversations()
        .create(NewConversation {
            user_id,
            title: None,
            metadata: Metadata::new(),
        })
        .await
        .unwrap();

    store
        .conversations()
        .update(
            conversation.id,
            ConversationPatch {
                is_archived: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(store
        .conversations()
        .list(ConversationFilter::for_user(user_id))
        .await
        .unwrap()
        .is_empty());

    let mut filter = ConversationFilter::for_user(user_id);
    filter.include_archived = true;
    assert_eq!(store.conversations().list(filter).await.unwrap().len(), 1);
}

#[tokio::test]
async fn system_config_upserts_on_key_collision() {
    let store = Store::in_memory().await.unwrap();

    store
        .config()
        .upsert("app_version", "1.0.0", Some("deployed version".into()))
        .await
        .unwrap();
    let updated = store
        .config()
        .upsert("app_version", "1.1.0", None)
        .await
        .unwrap();
    assert_eq!(updated.value, "1.1.0");
    assert_eq!(updated.description.as_deref(), Some("deployed version"));

    assert_eq!(store.config().list().await.unwrap().len(), 1);

    // ensure() never overwrites an operator-set value
    store
        .config()
        .ensure("app_version", "9.9.9", None)
        .await
        .unwrap();
    let entry = store.config().get("app_version").await.unwrap().unwrap();
    assert_eq!(entry.value, "1.1.0");
}
