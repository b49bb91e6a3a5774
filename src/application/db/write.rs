use anyhow::{Context as _, Result};
use rusqlite::{Connection, OptionalExtension as _, params};

use crate::application::types::{
    ApplicantStatus, ApplicationFields, FieldUpdate, PendingReview, Verdict,
};
use crate::db::DbRequest;

pub struct InsertDraft {
    pub message_id: u64,
    pub user_id: u64,
    pub opened_at: i64,
}
impl DbRequest for InsertDraft {
    type ReturnValue = Result<()>;

    fn execute(self, conn: &mut Connection) -> Self::ReturnValue {
        let field_data = serde_json::to_string(&ApplicationFields::default())?;
        conn.prepare(
            "
            INSERT INTO draft_sessions (message_id, user_id, field_data, opened_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(message_id) DO UPDATE SET
                field_data = excluded.field_data,
                opened_at = excluded.opened_at
            ",
        )?
        .execute(params![
            self.message_id,
            self.user_id,
            field_data,
            self.opened_at
        ])?;
        Ok(())
    }
}

/// Applies one field change to a draft. A missing row is created on the fly,
/// so a prompt that predates the stored session (or survived a purge) still
/// works as an upsert.
pub struct ApplyDraftField {
    pub message_id: u64,
    pub user_id: u64,
    pub opened_at: i64,
    pub update: FieldUpdate,
}
impl DbRequest for ApplyDraftField {
    type ReturnValue = Result<ApplicationFields>;

    fn execute(self, conn: &mut Connection) -> Self::ReturnValue {
        let transaction = conn.transaction()?;

        let existing: Option<String> = transaction
            .prepare("SELECT field_data FROM draft_sessions WHERE message_id=?1")?
            .query_row(params![self.message_id], |row| row.get(0))
            .optional()?;

        let mut fields: ApplicationFields = match existing {
            Some(text) => serde_json::from_str(&text).context("Corrupt draft field data")?,
            None => ApplicationFields::default(),
        };
        fields.apply(self.update);

        let field_data = serde_json::to_string(&fields)?;
        transaction
            .prepare(
                "
                INSERT INTO draft_sessions (message_id, user_id, field_data, opened_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(message_id) DO UPDATE SET
                    field_data = excluded.field_data
                ",
            )?
            .execute(params![
                self.message_id,
                self.user_id,
                field_data,
                self.opened_at
            ])?;

        transaction.commit()?;
        Ok(fields)
    }
}

pub struct DeleteDraft {
    pub message_id: u64,
}
impl DbRequest for DeleteDraft {
    type ReturnValue = Result<(), rusqlite::Error>;

    fn execute(self, conn: &mut Connection) -> Self::ReturnValue {
        conn.prepare("DELETE FROM draft_sessions WHERE message_id=?1")?
            .execute(params![self.message_id])?;
        Ok(())
    }
}

pub struct PurgeExpiredDrafts {
    pub cutoff: i64,
}
impl DbRequest for PurgeExpiredDrafts {
    type ReturnValue = Result<usize, rusqlite::Error>;

    fn execute(self, conn: &mut Connection) -> Self::ReturnValue {
        conn.prepare("DELETE FROM draft_sessions WHERE opened_at < ?1")?
            .execute(params![self.cutoff])
    }
}

/// Registers a submitted application for review. Re-checks the duplicate
/// gate inside the transaction; returns false when an existing record
/// blocks the submission.
pub struct InsertPendingReview {
    pub review: PendingReview,
    pub submitted_at: String,
}
impl DbRequest for InsertPendingReview {
    type ReturnValue = Result<bool>;

    fn execute(self, conn: &mut Connection) -> Self::ReturnValue {
        let transaction = conn.transaction()?;

        let existing: Option<String> = transaction
            .prepare("SELECT status FROM applicants WHERE user_id=?1")?
            .query_row(params![self.review.user_id], |row| row.get(0))
            .optional()?;
        if let Some(text) = existing {
            let status = ApplicantStatus::from_str(&text)
                .with_context(|| format!("Unknown applicant status in store: {text:?}"))?;
            if status.blocks_new_application() {
                return Ok(false);
            }
        }

        let field_data = serde_json::to_string(&self.review.application)?;
        transaction
            .prepare(
                "INSERT INTO pending_reviews (message_id, user_id, field_data) VALUES (?1, ?2, ?3)",
            )?
            .execute(params![
                self.review.message_id,
                self.review.user_id,
                field_data
            ])?;

        transaction
            .prepare(
                "
                INSERT INTO applicants (user_id, submitted_at, status)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(user_id) DO UPDATE SET
                    submitted_at = excluded.submitted_at,
                    status = excluded.status
                ",
            )?
            .execute(params![
                self.review.user_id,
                self.submitted_at,
                ApplicantStatus::Pending.as_str()
            ])?;

        transaction.commit()?;
        Ok(true)
    }
}

/// The primary mutation of a review decision: applicant status update and
/// pending-review removal happen in one transaction. Returns the removed
/// review, or None when the card is unknown.
pub struct DecideApplication {
    pub message_id: u64,
    pub verdict: Verdict,
}
impl DbRequest for DecideApplication {
    type ReturnValue = Result<Option<PendingReview>>;

    fn execute(self, conn: &mut Connection) -> Self::ReturnValue {
        let transaction = conn.transaction()?;

        let row: Option<(u64, String)> = transaction
            .prepare("SELECT user_id, field_data FROM pending_reviews WHERE message_id=?1")?
            .query_row(params![self.message_id], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()?;

        let Some((user_id, field_data)) = row else {
            return Ok(None);
        };

        transaction
            .prepare("DELETE FROM pending_reviews WHERE message_id=?1")?
            .execute(params![self.message_id])?;
        transaction
            .prepare("UPDATE applicants SET status=?1 WHERE user_id=?2")?
            .execute(params![self.verdict.as_status().as_str(), user_id])?;

        transaction.commit()?;

        Ok(Some(PendingReview {
            message_id: self.message_id,
            user_id,
            application: serde_json::from_str(&field_data)
                .context("Corrupt pending review field data")?,
        }))
    }
}

/// Drops a pending review and the applicant record with it, so the user can
/// start over. Returns the applicant's user ID when something was removed.
pub struct RemoveApplication {
    pub message_id: u64,
}
impl DbRequest for RemoveApplication {
    type ReturnValue = Result<Option<u64>, rusqlite::Error>;

    fn execute(self, conn: &mut Connection) -> Self::ReturnValue {
        let transaction = conn.transaction()?;

        let user_id: Option<u64> = transaction
            .prepare("SELECT user_id FROM pending_reviews WHERE message_id=?1")?
            .query_row(params![self.message_id], |row| row.get(0))
            .optional()?;

        let Some(user_id) = user_id else {
            return Ok(None);
        };

        transaction
            .prepare("DELETE FROM pending_reviews WHERE message_id=?1")?
            .execute(params![self.message_id])?;
        transaction
            .prepare("DELETE FROM applicants WHERE user_id=?1")?
            .execute(params![user_id])?;

        transaction.commit()?;
        Ok(Some(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::db::read::{
        GetApplicantStatus, GetDraftSession, ListPendingReviews,
    };
    use crate::application::types::{Branch, CompletedApplication, ServiceStatus, TextField};

    fn test_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        crate::application::db::initialise_tables(&mut conn).unwrap();
        conn
    }

    fn sample_application() -> CompletedApplication {
        CompletedApplication {
            name: "Sam".to_string(),
            pronouns: "they/them".to_string(),
            referral: "a friend".to_string(),
            branch: Branch::Marines,
            status: ServiceStatus::Current,
        }
    }

    fn sample_review(message_id: u64, user_id: u64) -> PendingReview {
        PendingReview {
            message_id,
            user_id,
            application: sample_application(),
        }
    }

    #[test]
    fn pending_and_approved_block_resubmission_denied_does_not() {
        let mut conn = test_conn();

        let inserted = InsertPendingReview {
            review: sample_review(10, 1),
            submitted_at: "2026-01-01T00:00:00Z".to_string(),
        }
        .execute(&mut conn)
        .unwrap();
        assert!(inserted);

        // a second submission while the first is pending is refused
        let inserted = InsertPendingReview {
            review: sample_review(11, 1),
            submitted_at: "2026-01-02T00:00:00Z".to_string(),
        }
        .execute(&mut conn)
        .unwrap();
        assert!(!inserted);

        // a denial frees the user up to apply again
        DecideApplication {
            message_id: 10,
            verdict: Verdict::Denied,
        }
        .execute(&mut conn)
        .unwrap()
        .unwrap();

        let inserted = InsertPendingReview {
            review: sample_review(12, 1),
            submitted_at: "2026-01-03T00:00:00Z".to_string(),
        }
        .execute(&mut conn)
        .unwrap();
        assert!(inserted);

        // approval blocks again
        DecideApplication {
            message_id: 12,
            verdict: Verdict::Approved,
        }
        .execute(&mut conn)
        .unwrap()
        .unwrap();

        let inserted = InsertPendingReview {
            review: sample_review(13, 1),
            submitted_at: "2026-01-04T00:00:00Z".to_string(),
        }
        .execute(&mut conn)
        .unwrap();
        assert!(!inserted);
    }

    #[test]
    fn decide_updates_status_and_removes_review_atomically() {
        let mut conn = test_conn();

        InsertPendingReview {
            review: sample_review(20, 2),
            submitted_at: "2026-01-01T00:00:00Z".to_string(),
        }
        .execute(&mut conn)
        .unwrap();

        let removed = DecideApplication {
            message_id: 20,
            verdict: Verdict::Approved,
        }
        .execute(&mut conn)
        .unwrap()
        .expect("review should exist");
        assert_eq!(removed.user_id, 2);
        assert_eq!(removed.application.branch, Branch::Marines);

        let status = GetApplicantStatus { user_id: 2 }
            .execute(&mut conn)
            .unwrap();
        assert_eq!(status, Some(ApplicantStatus::Approved));
        assert!(ListPendingReviews.execute(&mut conn).unwrap().is_empty());
    }

    #[test]
    fn decide_on_unknown_card_returns_none() {
        let mut conn = test_conn();
        let removed = DecideApplication {
            message_id: 999,
            verdict: Verdict::Denied,
        }
        .execute(&mut conn)
        .unwrap();
        assert!(removed.is_none());
    }

    #[test]
    fn draft_field_updates_preserve_other_fields() {
        let mut conn = test_conn();

        InsertDraft {
            message_id: 30,
            user_id: 3,
            opened_at: 1000,
        }
        .execute(&mut conn)
        .unwrap();

        ApplyDraftField {
            message_id: 30,
            user_id: 3,
            opened_at: 1000,
            update: FieldUpdate::Text(TextField::Name, "Alex".to_string()),
        }
        .execute(&mut conn)
        .unwrap();

        let fields = ApplyDraftField {
            message_id: 30,
            user_id: 3,
            opened_at: 1000,
            update: FieldUpdate::Branch(Branch::Army),
        }
        .execute(&mut conn)
        .unwrap();

        assert_eq!(fields.name.as_deref(), Some("Alex"));
        assert_eq!(fields.branch, Some(Branch::Army));

        let session = GetDraftSession { message_id: 30 }
            .execute(&mut conn)
            .unwrap()
            .unwrap();
        assert_eq!(session.user_id, 3);
        assert_eq!(session.fields.name.as_deref(), Some("Alex"));
    }

    #[test]
    fn draft_update_without_row_creates_one() {
        let mut conn = test_conn();

        let fields = ApplyDraftField {
            message_id: 31,
            user_id: 3,
            opened_at: 2000,
            update: FieldUpdate::Status(ServiceStatus::Future),
        }
        .execute(&mut conn)
        .unwrap();
        assert_eq!(fields.status, Some(ServiceStatus::Future));

        let session = GetDraftSession { message_id: 31 }
            .execute(&mut conn)
            .unwrap()
            .unwrap();
        assert_eq!(session.opened_at, 2000);
    }

    #[test]
    fn purge_removes_only_expired_drafts() {
        let mut conn = test_conn();

        InsertDraft {
            message_id: 40,
            user_id: 4,
            opened_at: 100,
        }
        .execute(&mut conn)
        .unwrap();
        InsertDraft {
            message_id: 41,
            user_id: 5,
            opened_at: 900,
        }
        .execute(&mut conn)
        .unwrap();

        let purged = PurgeExpiredDrafts { cutoff: 500 }.execute(&mut conn).unwrap();
        assert_eq!(purged, 1);

        assert!(
            GetDraftSession { message_id: 40 }
                .execute(&mut conn)
                .unwrap()
                .is_none()
        );
        assert!(
            GetDraftSession { message_id: 41 }
                .execute(&mut conn)
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn remove_application_frees_the_user() {
        let mut conn = test_conn();

        InsertPendingReview {
            review: sample_review(50, 6),
            submitted_at: "2026-01-01T00:00:00Z".to_string(),
        }
        .execute(&mut conn)
        .unwrap();

        let removed = RemoveApplication { message_id: 50 }
            .execute(&mut conn)
            .unwrap();
        assert_eq!(removed, Some(6));

        assert_eq!(
            GetApplicantStatus { user_id: 6 }.execute(&mut conn).unwrap(),
            None
        );
        // a second removal is a no-op
        assert_eq!(
            RemoveApplication { message_id: 50 }
                .execute(&mut conn)
                .unwrap(),
            None
        );
    }

    #[test]
    fn listing_is_stable_across_repeated_runs() {
        let mut conn = test_conn();

        InsertPendingReview {
            review: sample_review(60, 7),
            submitted_at: "2026-01-01T00:00:00Z".to_string(),
        }
        .execute(&mut conn)
        .unwrap();
        InsertPendingReview {
            review: sample_review(61, 8),
            submitted_at: "2026-01-01T00:00:00Z".to_string(),
        }
        .execute(&mut conn)
        .unwrap();

        let first = ListPendingReviews.execute(&mut conn).unwrap();
        let second = ListPendingReviews.execute(&mut conn).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(
            first.iter().map(|r| r.message_id).collect::<Vec<_>>(),
            second.iter().map(|r| r.message_id).collect::<Vec<_>>(),
        );
    }
}
