//! Row shapes returned by queries and their conversion into domain types.

use chrono::{DateTime, Utc};
use domains::{DomainError, DomainResult, Forum, Post, PostPath, Thread, User};
use sqlx::FromRow;

pub(crate) const POST_COLUMNS: &str =
    "id, author, created, forum, message, is_edited, parent, thread, path";

pub(crate) const THREAD_COLUMNS: &str = "id, author, created, forum, title, message, slug, votes";

#[derive(Debug, FromRow)]
pub(crate) struct PostRow {
    id: i64,
    author: String,
    created: DateTime<Utc>,
    forum: String,
    message: String,
    is_edited: bool,
    parent: Option<i64>,
    thread: i64,
    path: Vec<i64>,
}

impl TryFrom<PostRow> for Post {
    type Error = DomainError;

    fn try_from(row: PostRow) -> DomainResult<Self> {
        let path = PostPath::from_segments(row.path)
            .ok_or_else(|| DomainError::Storage(format!("post {} has an empty path", row.id)))?;
        Ok(Post {
            id: row.id,
            author: row.author,
            created: row.created,
            forum: row.forum,
            message: row.message,
            is_edited: row.is_edited,
            parent: row.parent,
            thread: row.thread,
            path,
        })
    }
}

pub(crate) fn into_posts(rows: Vec<PostRow>) -> DomainResult<Vec<Post>> {
    rows.into_iter().map(Post::try_from).collect()
}

#[derive(Debug, FromRow)]
pub(crate) struct ThreadRow {
    id: i64,
    author: String,
    created: DateTime<Utc>,
    forum: String,
    title: String,
    message: String,
    slug: String,
    votes: i64,
}

impl From<ThreadRow> for Thread {
    fn from(row: ThreadRow) -> Self {
        Thread {
            id: row.id,
            author: row.author,
            created: row.created,
            forum: row.forum,
            title: row.title,
            message: row.message,
            slug: row.slug,
            votes: row.votes,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    nickname: String,
    fullname: String,
    about: String,
    email: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            nickname: row.nickname,
            fullname: row.fullname,
            about: row.about,
            email: row.email,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ForumRow {
    slug: String,
    title: String,
    owner: String,
    posts: i64,
    threads: i64,
}

impl From<ForumRow> for Forum {
    fn from(row: ForumRow) -> Self {
        Forum {
            slug: row.slug,
            title: row.title,
            user: row.owner,
            posts: row.posts,
            threads: row.threads,
        }
    }
}
