use tokio_rusqlite::{named_params, params, Connection};

use crate::error::Result;
use crate::models::{config_from_row, ConfigEntry};

use super::now_millis;

const CONFIG_COLUMNS: &str = "id, key, value, description, created_at, updated_at";

/// Flat key/value settings shared by the whole deployment (app version,
/// active model name, per-user conversation cap).
#[derive(Clone)]
pub struct ConfigRepository {
    conn: Connection,
}

impl ConfigRepository {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Insert or overwrite a setting; key collisions update in place.
    pub async fn upsert(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
        description: Option<String>,
    ) -> Result<ConfigEntry> {
        let key = key.into();
        let value = value.into();
        let entry = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let now = now_millis();
                tx.execute(
                    "INSERT INTO system_config (key, value, description, created_at, updated_at)
                     VALUES (:key, :value, :description, :now, :now)
                     ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        description = COALESCE(excluded.description, description),
                        updated_at = excluded.updated_at",
                    named_params! {
                        ":key": key,
                        ":value": value,
                        ":description": description,
                        ":now": now,
                    },
                )?;
                let entry = fetch(&tx, &key)?.ok_or_else(|| {
                    tokio_rusqlite::Error::Other("config row missing after upsert".into())
                })?;
                tx.commit()?;
                Ok(entry)
            })
            .await?;
        Ok(entry)
    }

    /// Insert a setting only if the key does not exist yet; used for
    /// startup seeding so operator edits survive restarts.
    pub async fn ensure(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
        description: Option<String>,
    ) -> Result<()> {
        let key = key.into();
        let value = value.into();
        self.conn
            .call(move |conn| {
                let now = now_millis();
                conn.execute(
                    "INSERT INTO system_config (key, value, description, created_at, updated_at)
                     VALUES (:key, :value, :description, :now, :now)
                     ON CONFLICT(key) DO NOTHING",
                    named_params! {
                        ":key": key,
                        ":value": value,
                        ":description": description,
                        ":now": now,
                    },
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<ConfigEntry>> {
        let key = key.to_string();
        let entry = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CONFIG_COLUMNS} FROM system_config WHERE key = ?"
                ))?;
                let mut rows = stmt.query(params![key])?;
                match rows.next()? {
                    Some(row) => Ok(Some(config_from_row(row)?)),
                    None => Ok(None),
                }
            })
            .await?;
        Ok(entry)
    }

    pub async fn list(&self) -> Result<Vec<ConfigEntry>> {
        let entries = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CONFIG_COLUMNS} FROM system_config ORDER BY key ASC"
                ))?;
                let mut rows = stmt.query([])?;
                let mut entries = Vec::new();
                while let Some(row) = rows.next()? {
                    entries.push(config_from_row(row)?);
                }
                Ok(entries)
            })
            .await?;
        Ok(entries)
    }
}

fn fetch(
    tx: &tokio_rusqlite::Transaction<'_>,
    key: &str,
) -> std::result::Result<Option<ConfigEntry>, tokio_rusqlite::Error> {
    let mut stmt = tx.prepare(&format!(
        "SELECT {CONFIG_COLUMNS} FROM system_config WHERE key = ?"
    ))?;
    let mut rows = stmt.query(params![key])?;
    match rows.next()? {
        Some(row) => Ok(Some(config_from_row(row)?)),
        None => Ok(None),
    }
}
