use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, instrument};

use domains::{
    BatchContext, BatchInsert, DomainError, DomainResult, NewPost, Post, PostId, PostListQuery,
    PostPath, PostRepository, SortMode, ThreadId,
};

use super::rows::{into_posts, PostRow, POST_COLUMNS};
use super::{db_error, PgStore, INSERT_CHUNK};

#[async_trait]
impl PostRepository for PgStore {
    #[instrument(skip_all, name = "db.posts.insert_batch", fields(thread = thread, size = posts.len()))]
    async fn insert_batch(&self, thread: ThreadId, posts: Vec<NewPost>) -> DomainResult<Vec<Post>> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query(self.isolation_sql())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        // The thread's forum and the transaction timestamp, read once.
        let head: Option<(String, DateTime<Utc>)> =
            sqlx::query_as("SELECT forum, now() FROM thread WHERE id = $1")
                .bind(thread)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error)?;
        let (forum, created) = head.ok_or_else(|| DomainError::ThreadNotFound(thread.to_string()))?;

        if posts.is_empty() {
            tx.commit().await.map_err(db_error)?;
            return Ok(Vec::new());
        }
        let batch = BatchInsert::new(posts);

        let parent_ids = batch.parent_ids();
        let parent_paths: HashMap<PostId, PostPath> = if parent_ids.is_empty() {
            HashMap::new()
        } else {
            sqlx::query_as::<_, (i64, Vec<i64>)>(
                "SELECT id, path FROM post WHERE thread = $1 AND id = ANY($2)",
            )
            .bind(thread)
            .bind(&parent_ids)
            .fetch_all(&mut *tx)
            .await
            .map_err(db_error)?
            .into_iter()
            .filter_map(|(id, path)| PostPath::from_segments(path).map(|p| (id, p)))
            .collect()
        };

        let known_authors: HashSet<String> =
            sqlx::query_scalar("SELECT nickname FROM users WHERE nickname = ANY($1)")
                .bind(batch.author_nicknames())
                .fetch_all(&mut *tx)
                .await
                .map_err(db_error)?
                .into_iter()
                .collect();

        let mut ids: Vec<i64> =
            sqlx::query_scalar("SELECT nextval('post_id_seq') FROM generate_series(1, $1)")
                .bind(batch.len() as i64)
                .fetch_all(&mut *tx)
                .await
                .map_err(db_error)?;
        ids.sort_unstable();

        let ctx = BatchContext {
            thread,
            forum,
            created,
            parent_paths,
            known_authors,
        };
        // Dropping `tx` on error rolls the whole batch back.
        let planned = batch.plan(&ctx, &ids)?;

        let mut rows: Vec<PostRow> = Vec::with_capacity(planned.len());
        for chunk in planned.chunks(INSERT_CHUNK) {
            let mut insert: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO post (id, author, created, forum, message, is_edited, parent, thread, path) ",
            );
            insert.push_values(chunk, |mut row, post| {
                row.push_bind(post.id)
                    .push_bind(&post.author)
                    .push_bind(post.created)
                    .push_bind(&post.forum)
                    .push_bind(&post.message)
                    .push_bind(post.is_edited)
                    .push_bind(post.parent)
                    .push_bind(post.thread)
                    .push_bind(post.path.segments());
            });
            insert.push(" RETURNING ");
            insert.push(POST_COLUMNS);

            let inserted: Vec<PostRow> = insert
                .build_query_as()
                .fetch_all(&mut *tx)
                .await
                .map_err(db_error)?;
            rows.extend(inserted);
        }

        tx.commit().await.map_err(db_error)?;

        let mut created_posts = into_posts(rows)?;
        created_posts.sort_unstable_by_key(|p| p.id);
        debug!(count = created_posts.len(), "batch committed");
        Ok(created_posts)
    }

    #[instrument(skip_all, name = "db.posts.get", fields(id = id))]
    async fn get_post(&self, id: PostId) -> DomainResult<Post> {
        let sql = format!("SELECT {POST_COLUMNS} FROM post WHERE id = $1");
        let row: Option<PostRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.ok_or_else(|| DomainError::not_found("post", id))?.try_into()
    }

    #[instrument(skip_all, name = "db.posts.edit_message", fields(id = id))]
    async fn edit_message(&self, id: PostId, message: String) -> DomainResult<Post> {
        // SET expressions all see the pre-update row.
        let sql = format!(
            "UPDATE post SET \
                 is_edited = CASE WHEN $2 = '' OR message = $2 THEN is_edited ELSE TRUE END, \
                 message = CASE WHEN $2 = '' THEN message ELSE $2 END \
             WHERE id = $1 \
             RETURNING {POST_COLUMNS}"
        );
        let row: Option<PostRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(&message)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.ok_or_else(|| DomainError::not_found("post", id))?.try_into()
    }

    #[instrument(
        skip_all,
        name = "db.posts.list_by_thread",
        fields(thread = thread, sort = %query.sort, since = query.since, limit = query.limit, desc = query.desc)
    )]
    async fn list_by_thread(&self, thread: ThreadId, query: PostListQuery) -> DomainResult<Vec<Post>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM thread WHERE id = $1)")
            .bind(thread)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        if !exists {
            return Err(DomainError::ThreadNotFound(thread.to_string()));
        }

        let sql = listing_sql(query.sort, query.desc);
        let rows: Vec<PostRow> = sqlx::query_as(&sql)
            .bind(thread)
            .bind(query.since)
            .bind(i64::from(query.limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        into_posts(rows)
    }
}

/// Builds the listing query. Parameters: `$1` thread, `$2` cursor post id
/// (`0` for none), `$3` limit (`0` for unbounded).
///
/// A cursor id that names no post makes the path sub-select NULL, so `tree`
/// and `parent_tree` return nothing past it.
fn listing_sql(sort: SortMode, desc: bool) -> String {
    let (cmp, dir) = if desc { ("<", "DESC") } else { (">", "ASC") };
    match sort {
        SortMode::Flat => format!(
            "SELECT {POST_COLUMNS} FROM post \
             WHERE thread = $1 AND ($2 = 0 OR id {cmp} $2) \
             ORDER BY id {dir} \
             LIMIT NULLIF($3, 0)"
        ),
        SortMode::Tree => format!(
            "SELECT {POST_COLUMNS} FROM post \
             WHERE thread = $1 \
               AND ($2 = 0 OR path {cmp} (SELECT path FROM post WHERE id = $2)) \
             ORDER BY path {dir}, id {dir} \
             LIMIT NULLIF($3, 0)"
        ),
        // Direction only picks which roots; subtrees always read top-down.
        SortMode::ParentTree => format!(
            "WITH roots AS ( \
                 SELECT id FROM post \
                 WHERE thread = $1 AND parent IS NULL \
                   AND ($2 = 0 OR id {cmp} (SELECT path[1] FROM post WHERE id = $2)) \
                 ORDER BY id {dir} \
                 LIMIT NULLIF($3, 0) \
             ) \
             SELECT {POST_COLUMNS} FROM post \
             WHERE thread = $1 AND path[1] IN (SELECT id FROM roots) \
             ORDER BY path[1] ASC, path ASC, id ASC"
        ),
    }
}
