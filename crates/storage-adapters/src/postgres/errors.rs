//! Translation of `sqlx` failures into [`DomainError`].
//!
//! Constraint names come from `migrations/0001_init.sql`; keep the two in
//! step when the schema changes.

use domains::DomainError;
use sqlx::postgres::PgDatabaseError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

pub(crate) fn db_error(err: sqlx::Error) -> DomainError {
    let sqlx::Error::Database(db) = &err else {
        return DomainError::Storage(err.to_string());
    };

    match db.code().as_deref() {
        Some(UNIQUE_VIOLATION) => DomainError::ConstraintConflict(
            db.constraint().unwrap_or("unique constraint").to_string(),
        ),
        Some(FOREIGN_KEY_VIOLATION) => {
            let key = db
                .try_downcast_ref::<PgDatabaseError>()
                .and_then(|pg| pg.detail())
                .and_then(violating_key)
                .unwrap_or_default();
            match db.constraint() {
                Some(
                    "post_author_fkey" | "thread_author_fkey" | "forum_owner_fkey"
                    | "votes_nickname_fkey",
                ) => DomainError::AuthorNotFound(key),
                Some("thread_forum_fkey" | "post_forum_fkey") => DomainError::not_found("forum", key),
                Some("post_thread_fkey" | "votes_thread_id_fkey") => DomainError::ThreadNotFound(key),
                _ => DomainError::Storage(err.to_string()),
            }
        }
        _ => DomainError::Storage(err.to_string()),
    }
}

/// Pulls the offending value out of a detail line such as
/// `Key (author)=(bob) is not present in table "users".`
fn violating_key(detail: &str) -> Option<String> {
    let start = detail.find(")=(")? + 3;
    let end = detail[start..].rfind(')')? + start;
    Some(detail[start..end].to_string())
}
