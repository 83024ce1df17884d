use colloquy_types::encode_metadata;
use tokio_rusqlite::{named_params, params, Connection};

use crate::error::{Result, StoreError};
use crate::models::{user_from_row, NewUser, User, UserPatch};

use super::now_millis;

const USER_COLUMNS: &str = "id, username, email, preferences, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct UserRepository {
    conn: Connection,
}

impl UserRepository {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Create a user, rejecting duplicate usernames or emails with a
    /// conflict error.
    pub async fn create(&self, user: NewUser) -> Result<User> {
        let preferences = encode_metadata(&user.preferences);
        let created = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let taken = {
                    let mut stmt = tx.prepare(
                        "SELECT 1 FROM users WHERE username = ?1 OR email = ?2 LIMIT 1",
                    )?;
                    let mut rows = stmt.query(params![user.username, user.email])?;
                    rows.next()?.is_some()
                };
                if taken {
                    return Ok(Err("username or email already in use".to_string()));
                }

                let now = now_millis();
                tx.execute(
                    "INSERT INTO users (username, email, preferences, is_active, created_at, updated_at)
                     VALUES (:username, :email, :preferences, 1, :now, :now)",
                    named_params! {
                        ":username": user.username,
                        ":email": user.email,
                        ":preferences": preferences,
                        ":now": now,
                    },
                )?;
                let id = tx.last_insert_rowid();

                let created = {
                    let mut stmt = tx
                        .prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))?;
                    let mut rows = stmt.query(params![id])?;
                    match rows.next()? {
                        Some(row) => user_from_row(row)?,
                        None => {
                            return Err(tokio_rusqlite::Error::Other(
                                "inserted user row missing".into(),
                            ))
                        }
                    }
                };

                tx.commit()?;
                Ok(Ok(created))
            })
            .await?;

        created.map_err(StoreError::Conflict)
    }

    pub async fn get(&self, id: i64) -> Result<Option<User>> {
        let user = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))?;
                let mut rows = stmt.query(params![id])?;
                match rows.next()? {
                    Some(row) => Ok(Some(user_from_row(row)?)),
                    None => Ok(None),
                }
            })
            .await?;
        Ok(user)
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let users = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
                ))?;
                let mut rows = stmt.query([])?;
                let mut users = Vec::new();
                while let Some(row) = rows.next()? {
                    users.push(user_from_row(row)?);
                }
                Ok(users)
            })
            .await?;
        Ok(users)
    }

    /// Apply a partial update. Uniqueness of a new username/email is checked
    /// against other rows inside the same transaction.
    pub async fn update(&self, id: i64, patch: UserPatch) -> Result<Option<User>> {
        let preferences = patch.preferences.as_ref().map(encode_metadata);
        let updated = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let exists = {
                    let mut stmt = tx.prepare("SELECT 1 FROM users WHERE id = ? LIMIT 1")?;
                    let mut rows = stmt.query(params![id])?;
                    rows.next()?.is_some()
                };
                if !exists {
                    return Ok(Ok(None));
                }

                if let Some(ref username) = patch.username {
                    let mut stmt = tx.prepare(
                        "SELECT 1 FROM users WHERE username = ?1 AND id != ?2 LIMIT 1",
                    )?;
                    if stmt.query(params![username, id])?.next()?.is_some() {
                        return Ok(Err("username already in use".to_string()));
                    }
                }
                if let Some(ref email) = patch.email {
                    let mut stmt =
                        tx.prepare("SELECT 1 FROM users WHERE email = ?1 AND id != ?2 LIMIT 1")?;
                    if stmt.query(params![email, id])?.next()?.is_some() {
                        return Ok(Err("email already in use".to_string()));
                    }
                }

                if let Some(username) = patch.username {
                    tx.execute("UPDATE users SET username = ?1 WHERE id = ?2", params![username, id])?;
                }
                if let Some(email) = patch.email {
                    tx.execute("UPDATE users SET email = ?1 WHERE id = ?2", params![email, id])?;
                }
                if let Some(preferences) = preferences {
                    tx.execute(
                        "UPDATE users SET preferences = ?1 WHERE id = ?2",
                        params![preferences, id],
                    )?;
                }
                if let Some(is_active) = patch.is_active {
                    tx.execute(
                        "UPDATE users SET is_active = ?1 WHERE id = ?2",
                        params![is_active as i64, id],
                    )?;
                }
                tx.execute(
                    "UPDATE users SET updated_at = ?1 WHERE id = ?2",
                    params![now_millis(), id],
                )?;

                let updated = {
                    let mut stmt =
                        tx.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))?;
                    let mut rows = stmt.query(params![id])?;
                    match rows.next()? {
                        Some(row) => Some(user_from_row(row)?),
                        None => None,
                    }
                };

                tx.commit()?;
                Ok(Ok(updated))
            })
            .await?;

        updated.map_err(StoreError::Conflict)
    }

    /// Delete a user; conversations, messages and feedback follow by
    /// cascade.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let affected = tx.execute("DELETE FROM users WHERE id = ?", params![id])?;
                tx.commit()?;
                Ok(affected > 0)
            })
            .await?;
        Ok(deleted)
    }

    pub async fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT COUNT(*) FROM users")?;
                let mut rows = stmt.query([])?;
                match rows.next()? {
                    Some(row) => Ok(row.get(0)?),
                    None => Ok(0),
                }
            })
            .await?;
        Ok(count)
    }
}
