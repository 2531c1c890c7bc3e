use async_trait::async_trait;
use tracing::instrument;

use domains::{
    DomainError, DomainResult, Forum, ForumRepository, NewForum, User, UserListQuery, UserPatch,
    UserRepository,
};

use super::rows::{ForumRow, UserRow};
use super::{db_error, PgStore};

#[async_trait]
impl UserRepository for PgStore {
    #[instrument(skip_all, name = "db.users.create", fields(nickname = %user.nickname))]
    async fn create_user(&self, user: User) -> DomainResult<User> {
        let row: UserRow = sqlx::query_as(
            "INSERT INTO users (nickname, fullname, about, email) VALUES ($1, $2, $3, $4) \
             RETURNING nickname, fullname, about, email",
        )
        .bind(&user.nickname)
        .bind(&user.fullname)
        .bind(&user.about)
        .bind(&user.email)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.into())
    }

    #[instrument(skip_all, name = "db.users.get", fields(nickname = nickname))]
    async fn get_user(&self, nickname: &str) -> DomainResult<User> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT nickname, fullname, about, email FROM users WHERE nickname = $1")
                .bind(nickname)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        row.map(User::from)
            .ok_or_else(|| DomainError::not_found("user", nickname))
    }

    #[instrument(skip_all, name = "db.users.update", fields(nickname = nickname))]
    async fn update_user(&self, nickname: &str, patch: UserPatch) -> DomainResult<User> {
        let row: Option<UserRow> = sqlx::query_as(
            "UPDATE users SET fullname = COALESCE($2, fullname), \
                              about = COALESCE($3, about), \
                              email = COALESCE($4, email) \
             WHERE nickname = $1 \
             RETURNING nickname, fullname, about, email",
        )
        .bind(nickname)
        .bind(patch.fullname())
        .bind(patch.about())
        .bind(patch.email())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.map(User::from)
            .ok_or_else(|| DomainError::not_found("user", nickname))
    }
}

#[async_trait]
impl ForumRepository for PgStore {
    #[instrument(skip_all, name = "db.forums.create", fields(slug = %forum.slug))]
    async fn create_forum(&self, forum: NewForum) -> DomainResult<Forum> {
        let row: ForumRow = sqlx::query_as(
            "INSERT INTO forum (slug, title, owner) VALUES ($1, $2, $3) \
             RETURNING slug, title, owner, 0::bigint AS posts, 0::bigint AS threads",
        )
        .bind(&forum.slug)
        .bind(&forum.title)
        .bind(&forum.user)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.into())
    }

    #[instrument(skip_all, name = "db.forums.get", fields(slug = slug))]
    async fn get_forum(&self, slug: &str) -> DomainResult<Forum> {
        let row: Option<ForumRow> = sqlx::query_as(
            "SELECT f.slug, f.title, f.owner, \
                    (SELECT COUNT(*) FROM post p WHERE p.forum = f.slug) AS posts, \
                    (SELECT COUNT(*) FROM thread t WHERE t.forum = f.slug) AS threads \
             FROM forum f WHERE f.slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.map(Forum::from)
            .ok_or_else(|| DomainError::not_found("forum", slug))
    }

    #[instrument(skip_all, name = "db.forums.users", fields(slug = slug, limit = query.limit))]
    async fn list_users(&self, slug: &str, query: UserListQuery) -> DomainResult<Vec<User>> {
        let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM forum WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        if exists.is_none() {
            return Err(DomainError::not_found("forum", slug));
        }

        let rows: Vec<UserRow> = sqlx::query_as(&participants_sql(query.desc))
            .bind(slug)
            .bind(query.since.as_deref())
            .bind(i64::from(query.limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}

/// Participants of forum `$1`, paged past nickname `$2` (exclusive), at most
/// `$3` rows (`0` = all). Nicknames compare bytewise, like the in-memory store.
fn participants_sql(desc: bool) -> String {
    let (cmp, dir) = if desc { ("<", "DESC") } else { (">", "ASC") };
    format!(
        "SELECT u.nickname, u.fullname, u.about, u.email FROM users u \
         WHERE (EXISTS (SELECT 1 FROM thread t WHERE t.forum = $1 AND t.author = u.nickname) \
             OR EXISTS (SELECT 1 FROM post p WHERE p.forum = $1 AND p.author = u.nickname)) \
           AND ($2::text IS NULL OR u.nickname COLLATE \"C\" {cmp} $2) \
         ORDER BY u.nickname COLLATE \"C\" {dir} \
         LIMIT NULLIF($3, 0)"
    )
}
