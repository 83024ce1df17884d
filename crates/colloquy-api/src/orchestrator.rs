use colloquy_engine::{Engine, OptionsPatch};
use colloquy_store::{Message, NewMessage, Store};
use colloquy_types::{ChatTurn, Envelope, Metadata, Role};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

/// How many prior turns are handed to the backend as context.
pub const CONTEXT_WINDOW: i64 = 5;

#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub conversation_id: Option<i64>,
    pub user_id: i64,
    pub message: String,
    /// Per-request generation overrides; never persisted.
    pub options: Option<OptionsPatch>,
}

/// Result of one user→assistant exchange.
///
/// `persisted` is false in stateless mode (no conversation, or an unknown
/// conversation id). `persistence_failed` is the soft flag: generation
/// succeeded but the turns could not be written, so the caller still gets
/// the reply.
#[derive(Debug)]
pub struct ExchangeOutcome {
    pub reply: Envelope,
    pub user_message: Option<Message>,
    pub assistant_message: Option<Message>,
    pub persisted: bool,
    pub persistence_failed: bool,
}

/// Run one exchange: validate, assemble context, generate, persist.
///
/// Generation failures never surface here; the engine's variants fall back
/// internally. Persistence failure after a successful generation is reported
/// as a flag, not an error.
pub async fn run_exchange(
    store: &Store,
    engine: &Engine,
    request: ExchangeRequest,
) -> ApiResult<ExchangeOutcome> {
    let message = request.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::BadRequest("message cannot be empty".to_string()));
    }

    store
        .users()
        .get(request.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {} not found", request.user_id)))?;

    // An id pointing at no row drops to stateless mode instead of failing;
    // a row owned by someone else is rejected outright.
    let conversation_id = match request.conversation_id {
        Some(id) => match store.conversations().get(id).await? {
            Some(conversation) if conversation.user_id != request.user_id => {
                return Err(ApiError::Forbidden(format!(
                    "conversation {} does not belong to user {}",
                    id, request.user_id
                )));
            }
            Some(conversation) => Some(conversation.id),
            None => {
                tracing::warn!(conversation_id = id, "unknown conversation, replying stateless");
                None
            }
        },
        None => None,
    };

    let context = match conversation_id {
        Some(id) => {
            let window = store.messages().recent_window(id, CONTEXT_WINDOW).await?;
            window
                .into_iter()
                .map(|m| ChatTurn {
                    role: m.role,
                    content: m.content,
                })
                .collect()
        }
        None => Vec::new(),
    };

    let reply = engine
        .generate_with(&message, &context, request.options.as_ref())
        .await;

    let Some(id) = conversation_id else {
        return Ok(ExchangeOutcome {
            reply,
            user_message: None,
            assistant_message: None,
            persisted: false,
            persistence_failed: false,
        });
    };

    let user_turn = NewMessage::new(Role::User, message);
    let assistant_turn = NewMessage::new(Role::Assistant, reply.text.clone())
        .with_tokens(reply.tokens)
        .with_metadata(reply_metadata(&reply));

    match store.messages().record_exchange(id, user_turn, assistant_turn).await {
        Ok((user_message, assistant_message)) => Ok(ExchangeOutcome {
            reply,
            user_message: Some(user_message),
            assistant_message: Some(assistant_message),
            persisted: true,
            persistence_failed: false,
        }),
        Err(err) => {
            tracing::error!(conversation_id = id, "failed to persist exchange: {err}");
            Ok(ExchangeOutcome {
                reply,
                user_message: None,
                assistant_message: None,
                persisted: false,
                persistence_failed: true,
            })
        }
    }
}

fn reply_metadata(reply: &Envelope) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("backend".to_string(), Value::String(reply.backend.clone()));
    metadata.insert(
        "status".to_string(),
        Value::String(reply.status.as_str().to_string()),
    );
    metadata
}
