use tokio_rusqlite::{named_params, params, Connection};

use crate::error::Result;
use crate::models::{feedback_from_row, Feedback, FeedbackSubmission};

use super::now_millis;

const FEEDBACK_COLUMNS: &str =
    "id, message_id, user_id, rating, comment, category, created_at, updated_at";

#[derive(Clone)]
pub struct FeedbackRepository {
    conn: Connection,
}

impl FeedbackRepository {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Create or update feedback for a (message, user) pair.
    ///
    /// A repeat submission updates the existing row in place; the boolean
    /// reports whether a new row was created. Absent comment/category leave
    /// the stored values untouched.
    pub async fn submit(&self, submission: FeedbackSubmission) -> Result<(Feedback, bool)> {
        let result = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let existing: Option<i64> = {
                    let mut stmt = tx.prepare(
                        "SELECT id FROM feedback WHERE message_id = ?1 AND user_id = ?2",
                    )?;
                    let mut rows = stmt.query(params![submission.message_id, submission.user_id])?;
                    match rows.next()? {
                        Some(row) => Some(row.get(0)?),
                        None => None,
                    }
                };

                let (id, created) = match existing {
                    Some(id) => {
                        tx.execute(
                            "UPDATE feedback SET
                                rating = :rating,
                                comment = COALESCE(:comment, comment),
                                category = COALESCE(:category, category),
                                updated_at = :now
                             WHERE id = :id",
                            named_params! {
                                ":rating": submission.rating as i64,
                                ":comment": submission.comment,
                                ":category": submission.category,
                                ":now": now_millis(),
                                ":id": id,
                            },
                        )?;
                        (id, false)
                    }
                    None => {
                        let now = now_millis();
                        tx.execute(
                            "INSERT INTO feedback (message_id, user_id, rating, comment, category, created_at, updated_at)
                             VALUES (:message_id, :user_id, :rating, :comment, :category, :now, :now)",
                            named_params! {
                                ":message_id": submission.message_id,
                                ":user_id": submission.user_id,
                                ":rating": submission.rating as i64,
                                ":comment": submission.comment,
                                ":category": submission.category,
                                ":now": now,
                            },
                        )?;
                        (tx.last_insert_rowid(), true)
                    }
                };

                let feedback = {
                    let mut stmt = tx
                        .prepare(&format!("SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE id = ?"))?;
                    let mut rows = stmt.query(params![id])?;
                    match rows.next()? {
                        Some(row) => feedback_from_row(row)?,
                        None => {
                            return Err(tokio_rusqlite::Error::Other(
                                "feedback row missing after write".into(),
                            ))
                        }
                    }
                };

                tx.commit()?;
                Ok((feedback, created))
            })
            .await?;
        Ok(result)
    }

    pub async fn list_for_message(&self, message_id: i64) -> Result<Vec<Feedback>> {
        let feedback = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE message_id = ? ORDER BY created_at ASC, id ASC"
                ))?;
                let mut rows = stmt.query(params![message_id])?;
                let mut feedback = Vec::new();
                while let Some(row) = rows.next()? {
                    feedback.push(feedback_from_row(row)?);
                }
                Ok(feedback)
            })
            .await?;
        Ok(feedback)
    }
}
