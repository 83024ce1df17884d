use tokio_rusqlite::{Connection, OpenFlags};

use crate::error::Result;
use crate::migration::MIGRATION;
use crate::repositories::{
    ConfigRepository, ConversationRepository, FeedbackRepository, MessageRepository,
    UserRepository,
};

/// Entity store over a single SQLite connection.
///
/// Repositories share the connection handle; SQLite serializes writers, and
/// every mutating operation runs inside its own transaction.
#[derive(Clone)]
pub struct Store {
    conn: Connection,
    users: UserRepository,
    conversations: ConversationRepository,
    messages: MessageRepository,
    feedback: FeedbackRepository,
    config: ConfigRepository,
}

impl Store {
    pub async fn open(path: &str) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .await?;
        Self::init(conn).await
    }

    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| Ok(conn.execute_batch(MIGRATION)?)).await?;
        tracing::debug!("store schema ready");
        Ok(Self {
            users: UserRepository::new(conn.clone()),
            conversations: ConversationRepository::new(conn.clone()),
            messages: MessageRepository::new(conn.clone()),
            feedback: FeedbackRepository::new(conn.clone()),
            config: ConfigRepository::new(conn.clone()),
            conn,
        })
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    pub fn conversations(&self) -> &ConversationRepository {
        &self.conversations
    }

    pub fn messages(&self) -> &MessageRepository {
        &self.messages
    }

    pub fn feedback(&self) -> &FeedbackRepository {
        &self.feedback
    }

    pub fn config(&self) -> &ConfigRepository {
        &self.config
    }

    /// Health probe used by the status endpoint.
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.query_row("SELECT 1", [], |_| Ok(()))?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}
