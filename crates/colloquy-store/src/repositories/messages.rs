use colloquy_types::encode_metadata;
use tokio_rusqlite::{named_params, params, Connection, Transaction};

use crate::error::Result;
use crate::models::{message_from_row, Message, NewMessage};

use super::now_millis;

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, role, content, tokens, metadata, created_at";

#[derive(Clone)]
pub struct MessageRepository {
    conn: Connection,
}

impl MessageRepository {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i64) -> Result<Option<Message>> {
        let message = self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?"))?;
                let mut rows = stmt.query(params![id])?;
                match rows.next()? {
                    Some(row) => Ok(Some(message_from_row(row)?)),
                    None => Ok(None),
                }
            })
            .await?;
        Ok(message)
    }

    /// List a conversation's messages in timestamp order; `descending`
    /// reverses it for newest-first readers.
    pub async fn list(
        &self,
        conversation_id: i64,
        limit: i64,
        offset: i64,
        descending: bool,
    ) -> Result<Vec<Message>> {
        let messages = self
            .conn
            .call(move |conn| {
                let order = if descending { "DESC" } else { "ASC" };
                let mut stmt = conn.prepare(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = :conversation_id
                     ORDER BY created_at {order}, id {order} LIMIT :limit OFFSET :offset"
                ))?;
                let mut rows = stmt.query(named_params! {
                    ":conversation_id": conversation_id,
                    ":limit": limit,
                    ":offset": offset,
                })?;
                let mut messages = Vec::new();
                while let Some(row) = rows.next()? {
                    messages.push(message_from_row(row)?);
                }
                Ok(messages)
            })
            .await?;
        Ok(messages)
    }

    /// The last `window` turns of a conversation, returned oldest first,
    /// ready to be handed to a backend as context.
    pub async fn recent_window(&self, conversation_id: i64, window: i64) -> Result<Vec<Message>> {
        let messages = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ?1
                     ORDER BY created_at DESC, id DESC LIMIT ?2"
                ))?;
                let mut rows = stmt.query(params![conversation_id, window])?;
                let mut messages = Vec::new();
                while let Some(row) = rows.next()? {
                    messages.push(message_from_row(row)?);
                }
                messages.reverse();
                Ok(messages)
            })
            .await?;
        Ok(messages)
    }

    pub async fn append(&self, conversation_id: i64, message: NewMessage) -> Result<Message> {
        let appended = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let appended = insert_message(&tx, conversation_id, &message)?;
                tx.commit()?;
                Ok(appended)
            })
            .await?;
        Ok(appended)
    }

    /// Persist one exchange atomically: the user turn, the generated turn
    /// and the conversation's refreshed timestamp either all land or none
    /// do.
    pub async fn record_exchange(
        &self,
        conversation_id: i64,
        user_turn: NewMessage,
        assistant_turn: NewMessage,
    ) -> Result<(Message, Message)> {
        let recorded = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let user_row = insert_message(&tx, conversation_id, &user_turn)?;
                let assistant_row = insert_message(&tx, conversation_id, &assistant_turn)?;
                tx.execute(
                    "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                    params![now_millis(), conversation_id],
                )?;
                tx.commit()?;
                Ok((user_row, assistant_row))
            })
            .await?;
        Ok(recorded)
    }

    pub async fn count(&self, conversation_id: i64) -> Result<i64> {
        let count = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT COUNT(*) FROM messages WHERE conversation_id = ?")?;
                let mut rows = stmt.query(params![conversation_id])?;
                match rows.next()? {
                    Some(row) => Ok(row.get(0)?),
                    None => Ok(0),
                }
            })
            .await?;
        Ok(count)
    }
}

fn insert_message(
    tx: &Transaction<'_>,
    conversation_id: i64,
    message: &NewMessage,
) -> std::result::Result<Message, tokio_rusqlite::Error> {
    tx.execute(
        "INSERT INTO messages (conversation_id, role, content, tokens, metadata, created_at)
         VALUES (:conversation_id, :role, :content, :tokens, :metadata, :created_at)",
        named_params! {
            ":conversation_id": conversation_id,
            ":role": message.role.as_str(),
            ":content": message.content,
            ":tokens": message.tokens as i64,
            ":metadata": encode_metadata(&message.metadata),
            ":created_at": now_millis(),
        },
    )?;
    let id = tx.last_insert_rowid();

    let mut stmt = tx.prepare(&format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?"))?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(row) => message_from_row(row),
        None => Err(tokio_rusqlite::Error::Other(
            "inserted message row missing".into(),
        )),
    }
}
