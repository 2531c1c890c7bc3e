use async_trait::async_trait;
use tracing::instrument;

use domains::{
    DomainError, DomainResult, NewThread, Thread, ThreadId, ThreadListQuery, ThreadPatch, ThreadRef,
    ThreadRepository, Vote,
};

use super::rows::{ThreadRow, THREAD_COLUMNS};
use super::{db_error, PgStore};

#[async_trait]
impl ThreadRepository for PgStore {
    #[instrument(skip_all, name = "db.threads.create", fields(forum = %thread.forum))]
    async fn create_thread(&self, thread: NewThread) -> DomainResult<Thread> {
        // Unknown author or forum surface as foreign-key violations.
        let sql = format!(
            "INSERT INTO thread (author, created, forum, title, message, slug) \
             VALUES ($1, COALESCE($2, now()), $3, $4, $5, $6) \
             RETURNING {THREAD_COLUMNS}"
        );
        let row: ThreadRow = sqlx::query_as(&sql)
            .bind(&thread.author)
            .bind(thread.created)
            .bind(&thread.forum)
            .bind(&thread.title)
            .bind(&thread.message)
            .bind(thread.storage_slug())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.into())
    }

    #[instrument(skip_all, name = "db.threads.resolve", fields(thread = %thread))]
    async fn resolve_thread(&self, thread: &ThreadRef) -> DomainResult<Thread> {
        let row: Option<ThreadRow> = match thread {
            ThreadRef::ById(id) => {
                let sql = format!("SELECT {THREAD_COLUMNS} FROM thread WHERE id = $1");
                sqlx::query_as::<_, ThreadRow>(&sql).bind(id).fetch_optional(&self.pool).await
            }
            ThreadRef::BySlug(slug) => {
                let sql = format!("SELECT {THREAD_COLUMNS} FROM thread WHERE slug = $1");
                sqlx::query_as::<_, ThreadRow>(&sql).bind(slug).fetch_optional(&self.pool).await
            }
        }
        .map_err(db_error)?;

        row.map(Thread::from)
            .ok_or_else(|| DomainError::ThreadNotFound(thread.to_string()))
    }

    #[instrument(skip_all, name = "db.threads.edit", fields(id = id))]
    async fn edit_thread(&self, id: ThreadId, patch: ThreadPatch) -> DomainResult<Thread> {
        let sql = format!(
            "UPDATE thread SET title = COALESCE($2, title), message = COALESCE($3, message) \
             WHERE id = $1 \
             RETURNING {THREAD_COLUMNS}"
        );
        let row: Option<ThreadRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(patch.title())
            .bind(patch.message())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(Thread::from)
            .ok_or_else(|| DomainError::ThreadNotFound(id.to_string()))
    }

    /// Upserts the vote and recomputes the tally in one transaction.
    ///
    /// The thread row is locked first, so concurrent votes on one thread
    /// recompute the total one after another.
    #[instrument(skip_all, name = "db.threads.vote", fields(thread = vote.thread, voice = vote.voice.value()))]
    async fn cast_vote(&self, vote: Vote) -> DomainResult<Thread> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM thread WHERE id = $1 FOR UPDATE")
            .bind(vote.thread)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?;
        if locked.is_none() {
            return Err(DomainError::ThreadNotFound(vote.thread.to_string()));
        }

        sqlx::query(
            "INSERT INTO votes (nickname, thread_id, voice) VALUES ($1, $2, $3) \
             ON CONFLICT (nickname, thread_id) DO UPDATE SET voice = EXCLUDED.voice",
        )
        .bind(&vote.nickname)
        .bind(vote.thread)
        .bind(vote.voice.value() as i16)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        let sql = format!(
            "UPDATE thread \
             SET votes = (SELECT COALESCE(SUM(voice), 0) FROM votes WHERE thread_id = $1) \
             WHERE id = $1 \
             RETURNING {THREAD_COLUMNS}"
        );
        let row: ThreadRow = sqlx::query_as(&sql)
            .bind(vote.thread)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(row.into())
    }

    #[instrument(skip_all, name = "db.threads.list", fields(forum = forum, limit = query.limit, desc = query.desc))]
    async fn list_threads(&self, forum: &str, query: ThreadListQuery) -> DomainResult<Vec<Thread>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM forum WHERE slug = $1)")
            .bind(forum)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        if !exists {
            return Err(DomainError::not_found("forum", forum));
        }

        let (cmp, dir) = if query.desc { ("<=", "DESC") } else { (">=", "ASC") };
        let sql = format!(
            "SELECT {THREAD_COLUMNS} FROM thread \
             WHERE forum = $1 AND ($2::timestamptz IS NULL OR created {cmp} $2) \
             ORDER BY created {dir}, id {dir} \
             LIMIT NULLIF($3, 0)"
        );
        let rows: Vec<ThreadRow> = sqlx::query_as(&sql)
            .bind(forum)
            .bind(query.since)
            .bind(i64::from(query.limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(Thread::from).collect())
    }
}
