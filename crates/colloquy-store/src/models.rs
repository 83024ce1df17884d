use chrono::{DateTime, Utc};
use colloquy_types::{decode_metadata, Metadata, Role};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::Row;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub preferences: Metadata,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub metadata: Metadata,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub role: Role,
    pub content: String,
    pub tokens: u32,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: i64,
    pub message_id: i64,
    pub user_id: i64,
    pub rating: u8,
    pub comment: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub id: i64,
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub preferences: Metadata,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub preferences: Option<Metadata>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewConversation {
    pub user_id: i64,
    /// Defaults to a timestamped placeholder when absent.
    pub title: Option<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default)]
pub struct ConversationPatch {
    pub title: Option<String>,
    pub is_archived: Option<bool>,
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub tokens: u32,
    pub metadata: Metadata,
}

impl NewMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        let content = content.into();
        let tokens = colloquy_types::estimate_tokens(&content);
        Self {
            role,
            content,
            tokens,
            metadata: Metadata::new(),
        }
    }

    pub fn with_tokens(mut self, tokens: u32) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackSubmission {
    pub message_id: i64,
    pub user_id: i64,
    pub rating: u8,
    pub comment: Option<String>,
    pub category: Option<String>,
}

pub(crate) fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>, tokio_rusqlite::Error> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| tokio_rusqlite::Error::Other(format!("invalid timestamp: {ms}").into()))
}

// Row mappers assume the column order of the repository SELECT lists.

pub(crate) fn user_from_row(row: &Row<'_>) -> Result<User, tokio_rusqlite::Error> {
    let preferences: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        preferences: decode_metadata(Some(&preferences)),
        is_active: row.get::<_, i64>(4)? != 0,
        created_at: millis_to_datetime(row.get(5)?)?,
        updated_at: millis_to_datetime(row.get(6)?)?,
    })
}

pub(crate) fn conversation_from_row(row: &Row<'_>) -> Result<Conversation, tokio_rusqlite::Error> {
    let metadata: String = row.get(3)?;
    Ok(Conversation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        metadata: decode_metadata(Some(&metadata)),
        is_archived: row.get::<_, i64>(4)? != 0,
        created_at: millis_to_datetime(row.get(5)?)?,
        updated_at: millis_to_datetime(row.get(6)?)?,
        message_count: row.get(7)?,
    })
}

pub(crate) fn message_from_row(row: &Row<'_>) -> Result<Message, tokio_rusqlite::Error> {
    let role: String = row.get(2)?;
    let metadata: String = row.get(5)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role: Role::parse(&role),
        content: row.get(3)?,
        tokens: row.get::<_, i64>(4)?.max(0) as u32,
        metadata: decode_metadata(Some(&metadata)),
        created_at: millis_to_datetime(row.get(6)?)?,
    })
}

pub(crate) fn feedback_from_row(row: &Row<'_>) -> Result<Feedback, tokio_rusqlite::Error> {
    Ok(Feedback {
        id: row.get(0)?,
        message_id: row.get(1)?,
        user_id: row.get(2)?,
        rating: row.get::<_, i64>(3)?.clamp(1, 5) as u8,
        comment: row.get(4)?,
        category: row.get(5)?,
        created_at: millis_to_datetime(row.get(6)?)?,
        updated_at: millis_to_datetime(row.get(7)?)?,
    })
}

pub(crate) fn config_from_row(row: &Row<'_>) -> Result<ConfigEntry, tokio_rusqlite::Error> {
    Ok(ConfigEntry {
        id: row.get(0)?,
        key: row.get(1)?,
        value: row.get(2)?,
        description: row.get(3)?,
        created_at: millis_to_datetime(row.get(4)?)?,
        updated_at: millis_to_datetime(row.get(5)?)?,
    })
}
