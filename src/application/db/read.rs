use anyhow::{Context as _, Result};
use rusqlite::{Connection, OptionalExtension as _, params};

use crate::application::types::{
    ApplicantStatus, ApplicationFields, DraftSession, PendingReview,
};
use crate::db::DbRequest;

pub struct GetApplicantStatus {
    pub user_id: u64,
}
impl DbRequest for GetApplicantStatus {
    type ReturnValue = Result<Option<ApplicantStatus>>;

    fn execute(self, conn: &mut Connection) -> Self::ReturnValue {
        let status: Option<String> = conn
            .prepare("SELECT status FROM applicants WHERE user_id=?1")?
            .query_row(params![self.user_id], |row| row.get(0))
            .optional()?;

        match status {
            Some(text) => {
                let status = ApplicantStatus::from_str(&text)
                    .with_context(|| format!("Unknown applicant status in store: {text:?}"))?;
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }
}

pub struct GetDraftSession {
    pub message_id: u64,
}
impl DbRequest for GetDraftSession {
    type ReturnValue = Result<Option<DraftSession>>;

    fn execute(self, conn: &mut Connection) -> Self::ReturnValue {
        let row: Option<(u64, String, i64)> = conn
            .prepare(
                "SELECT user_id, field_data, opened_at FROM draft_sessions WHERE message_id=?1",
            )?
            .query_row(params![self.message_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .optional()?;

        let Some((user_id, field_data, opened_at)) = row else {
            return Ok(None);
        };

        let fields: ApplicationFields =
            serde_json::from_str(&field_data).context("Corrupt draft field data")?;

        Ok(Some(DraftSession {
            message_id: self.message_id,
            user_id,
            fields,
            opened_at,
        }))
    }
}

pub struct GetPendingReview {
    pub message_id: u64,
}
impl DbRequest for GetPendingReview {
    type ReturnValue = Result<Option<PendingReview>>;

    fn execute(self, conn: &mut Connection) -> Self::ReturnValue {
        let row: Option<(u64, String)> = conn
            .prepare("SELECT user_id, field_data FROM pending_reviews WHERE message_id=?1")?
            .query_row(params![self.message_id], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()?;

        let Some((user_id, field_data)) = row else {
            return Ok(None);
        };

        Ok(Some(PendingReview {
            message_id: self.message_id,
            user_id,
            application: serde_json::from_str(&field_data)
                .context("Corrupt pending review field data")?,
        }))
    }
}

pub struct ListPendingReviews;
impl DbRequest for ListPendingReviews {
    type ReturnValue = Result<Vec<PendingReview>>;

    fn execute(self, conn: &mut Connection) -> Self::ReturnValue {
        let mut statement = conn.prepare(
            "SELECT message_id, user_id, field_data FROM pending_reviews ORDER BY message_id",
        )?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, u64>(0)?,
                    row.get::<_, u64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(message_id, user_id, field_data)| {
                Ok(PendingReview {
                    message_id,
                    user_id,
                    application: serde_json::from_str(&field_data)
                        .context("Corrupt pending review field data")?,
                })
            })
            .collect()
    }
}
