use chrono::Utc;
use colloquy_types::encode_metadata;
use tokio_rusqlite::{named_params, params, Connection};

use crate::error::Result;
use crate::models::{conversation_from_row, Conversation, ConversationPatch, NewConversation};

use super::now_millis;

const CONVERSATION_COLUMNS: &str = "c.id, c.user_id, c.title, c.metadata, c.is_archived, \
     c.created_at, c.updated_at, \
     (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id) AS message_count";

/// Filter for conversation listings; owner is mandatory, archived rows are
/// excluded unless asked for.
#[derive(Debug, Clone)]
pub struct ConversationFilter {
    pub user_id: i64,
    pub include_archived: bool,
    pub limit: i64,
    pub offset: i64,
}

impl ConversationFilter {
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id,
            include_archived: false,
            limit: 50,
            offset: 0,
        }
    }
}

#[derive(Clone)]
pub struct ConversationRepository {
    conn: Connection,
}

impl ConversationRepository {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, conversation: NewConversation) -> Result<Conversation> {
        let title = conversation
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("Conversa {}", Utc::now().format("%d/%m/%Y %H:%M")));
        let metadata = encode_metadata(&conversation.metadata);
        let user_id = conversation.user_id;

        let created = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let now = now_millis();
                tx.execute(
                    "INSERT INTO conversations (user_id, title, metadata, is_archived, created_at, updated_at)
                     VALUES (:user_id, :title, :metadata, 0, :now, :now)",
                    named_params! {
                        ":user_id": user_id,
                        ":title": title,
                        ":metadata": metadata,
                        ":now": now,
                    },
                )?;
                let id = tx.last_insert_rowid();
                let created = fetch_one(&tx, id)?.ok_or_else(|| {
                    tokio_rusqlite::Error::Other("inserted conversation row missing".into())
                })?;
                tx.commit()?;
                Ok(created)
            })
            .await?;
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Conversation>> {
        let conversation = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.id = ?"
                ))?;
                let mut rows = stmt.query(params![id])?;
                match rows.next()? {
                    Some(row) => Ok(Some(conversation_from_row(row)?)),
                    None => Ok(None),
                }
            })
            .await?;
        Ok(conversation)
    }

    /// List a user's conversations, most recently updated first.
    pub async fn list(&self, filter: ConversationFilter) -> Result<Vec<Conversation>> {
        let conversations = self
            .conn
            .call(move |conn| {
                let mut sql = format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.user_id = :user_id"
                );
                if !filter.include_archived {
                    sql.push_str(" AND c.is_archived = 0");
                }
                sql.push_str(" ORDER BY c.updated_at DESC, c.id DESC LIMIT :limit OFFSET :offset");

                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query(named_params! {
                    ":user_id": filter.user_id,
                    ":limit": filter.limit,
                    ":offset": filter.offset,
                })?;
                let mut conversations = Vec::new();
                while let Some(row) = rows.next()? {
                    conversations.push(conversation_from_row(row)?);
                }
                Ok(conversations)
            })
            .await?;
        Ok(conversations)
    }

    /// Apply a partial update and refresh the updated timestamp.
    pub async fn update(&self, id: i64, patch: ConversationPatch) -> Result<Option<Conversation>> {
        let metadata = patch.metadata.as_ref().map(encode_metadata);
        let updated = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let exists = {
                    let mut stmt = tx.prepare("SELECT 1 FROM conversations WHERE id = ? LIMIT 1")?;
                    let mut rows = stmt.query(params![id])?;
                    rows.next()?.is_some()
                };
                if !exists {
                    return Ok(None);
                }

                if let Some(title) = patch.title {
                    tx.execute(
                        "UPDATE conversations SET title = ?1 WHERE id = ?2",
                        params![title, id],
                    )?;
                }
                if let Some(is_archived) = patch.is_archived {
                    tx.execute(
                        "UPDATE conversations SET is_archived = ?1 WHERE id = ?2",
                        params![is_archived as i64, id],
                    )?;
                }
                if let Some(metadata) = metadata {
                    tx.execute(
                        "UPDATE conversations SET metadata = ?1 WHERE id = ?2",
                        params![metadata, id],
                    )?;
                }
                tx.execute(
                    "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                    params![now_millis(), id],
                )?;

                let updated = fetch_one(&tx, id)?;
                tx.commit()?;
                Ok(updated)
            })
            .await?;
        Ok(updated)
    }

    /// Delete a conversation; its messages and their feedback cascade.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let affected = tx.execute("DELETE FROM conversations WHERE id = ?", params![id])?;
                tx.commit()?;
                Ok(affected > 0)
            })
            .await?;
        Ok(deleted)
    }
}

fn fetch_one(
    tx: &tokio_rusqlite::Transaction<'_>,
    id: i64,
) -> std::result::Result<Option<Conversation>, tokio_rusqlite::Error> {
    let mut stmt = tx.prepare(&format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.id = ?"
    ))?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(row) => Ok(Some(conversation_from_row(row)?)),
        None => Ok(None),
    }
}
