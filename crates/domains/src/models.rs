//! # Domain Models
//!
//! These structs represent the core entities of the forum engine.
//! Posts and threads use store-assigned `BIGINT` surrogate keys; users and
//! forums are keyed by their human-readable nickname / slug.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;
use crate::path::PostPath;

pub type PostId = i64;
pub type ThreadId = i64;

/// A registered participant. The nickname is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub nickname: String,
    pub fullname: String,
    pub about: String,
    pub email: String,
}

/// Partial profile update; `None` or empty fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub fullname: Option<String>,
    pub about: Option<String>,
    pub email: Option<String>,
}

impl UserPatch {
    pub fn fullname(&self) -> Option<&str> {
        self.fullname.as_deref().filter(|v| !v.is_empty())
    }

    pub fn about(&self) -> Option<&str> {
        self.about.as_deref().filter(|v| !v.is_empty())
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.fullname().is_none() && self.about().is_none() && self.email().is_none()
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(fullname) = self.fullname() {
            user.fullname = fullname.to_string();
        }
        if let Some(about) = self.about() {
            user.about = about.to_string();
        }
        if let Some(email) = self.email() {
            user.email = email.to_string();
        }
    }
}

/// Paging for a forum's participants, ordered by nickname.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserListQuery {
    /// `0` means unbounded.
    pub limit: u32,
    /// Exclusive lower (or upper, when descending) bound on the nickname.
    pub since: Option<String>,
    pub desc: bool,
}

impl UserListQuery {
    /// Whether `nickname` lies past the `since` bound in paging direction.
    pub fn admits(&self, nickname: &str) -> bool {
        match self.since.as_deref() {
            None => true,
            Some(since) if self.desc => nickname < since,
            Some(since) => nickname > since,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewForum {
    pub slug: String,
    pub title: String,
    /// Nickname of the owning user.
    pub user: String,
}

/// A forum with its derived post and thread counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forum {
    pub slug: String,
    pub title: String,
    pub user: String,
    pub posts: i64,
    pub threads: i64,
}

/// Request to open a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewThread {
    pub author: String,
    pub forum: String,
    pub title: String,
    pub message: String,
    /// Client-chosen slug. When absent the store files the thread under a
    /// generated placeholder (see [`placeholder_slug`]).
    pub slug: Option<String>,
    /// Creation time supplied by the client, defaults to now.
    pub created: Option<DateTime<Utc>>,
}

impl NewThread {
    /// The slug the thread is stored under.
    pub fn storage_slug(&self) -> String {
        match self.slug.as_deref() {
            Some(slug) if !slug.is_empty() => slug.to_string(),
            _ => placeholder_slug(),
        }
    }
}

/// Partial update of a thread; `None` or empty fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadPatch {
    pub title: Option<String>,
    pub message: Option<String>,
}

impl ThreadPatch {
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.is_empty())
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thread {
    pub id: ThreadId,
    pub author: String,
    pub created: DateTime<Utc>,
    pub forum: String,
    pub title: String,
    pub message: String,
    /// Either a human-chosen slug or an internal UUID placeholder.
    pub slug: String,
    pub votes: i64,
}

impl Thread {
    /// Whether the stored slug is an internal placeholder rather than one a
    /// client chose. Such slugs must not be shown to callers.
    pub fn has_placeholder_slug(&self) -> bool {
        is_placeholder_slug(&self.slug)
    }

    /// The slug as callers should see it.
    pub fn public_slug(&self) -> Option<&str> {
        (!self.has_placeholder_slug()).then_some(self.slug.as_str())
    }
}

/// Generates the slug used for threads created without one.
pub fn placeholder_slug() -> String {
    Uuid::new_v4().to_string()
}

/// Detects the UUID shape produced by [`placeholder_slug`].
pub fn is_placeholder_slug(slug: &str) -> bool {
    (32..=36).contains(&slug.len()) && Uuid::parse_str(slug).is_ok()
}

/// How a caller names a thread: by numeric id or by slug.
///
/// Built once at the service boundary with [`ThreadRef::parse`]; a purely
/// numeric string is always an id and never falls back to slug lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThreadRef {
    ById(ThreadId),
    BySlug(String),
}

impl ThreadRef {
    pub fn parse(raw: &str) -> Self {
        let numeric = !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit());
        match raw.parse::<ThreadId>() {
            Ok(id) if numeric => ThreadRef::ById(id),
            _ => ThreadRef::BySlug(raw.to_string()),
        }
    }
}

impl fmt::Display for ThreadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadRef::ById(id) => write!(f, "{id}"),
            ThreadRef::BySlug(slug) => f.write_str(slug),
        }
    }
}

/// Paging for a forum's thread list, ordered by creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadListQuery {
    /// `0` means unbounded.
    pub limit: u32,
    /// Inclusive lower (or upper, when descending) bound on `created`.
    pub since: Option<DateTime<Utc>>,
    pub desc: bool,
}

/// How a new post names its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentRef {
    /// A post that already has an id: persisted earlier, or assigned earlier
    /// in the same batch.
    Post(PostId),
    /// An earlier entry of the same batch, by position.
    Batch(usize),
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentRef::Post(id) => write!(f, "post {id}"),
            ParentRef::Batch(index) => write!(f, "batch entry #{index}"),
        }
    }
}

/// One entry of a batch-create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub author: String,
    pub message: String,
    pub parent: Option<ParentRef>,
}

impl NewPost {
    pub fn root(author: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            message: message.into(),
            parent: None,
        }
    }

    pub fn reply(author: impl Into<String>, message: impl Into<String>, parent: ParentRef) -> Self {
        Self {
            author: author.into(),
            message: message.into(),
            parent: Some(parent),
        }
    }
}

/// The fundamental unit of conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub author: String,
    pub created: DateTime<Utc>,
    /// Copied from the owning thread at insertion time.
    pub forum: String,
    pub message: String,
    pub is_edited: bool,
    pub parent: Option<PostId>,
    pub thread: ThreadId,
    /// Owned by the post store; internal ordering key, never rendered.
    #[serde(skip)]
    pub path: PostPath,
}

impl Post {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Applies a message edit: an empty message means "no update", and the
    /// edited flag only ever turns on when the text actually changes.
    pub fn apply_edit(&mut self, message: &str) {
        if message.is_empty() || message == self.message {
            return;
        }
        self.message = message.to_string();
        self.is_edited = true;
    }
}

/// A single up- or down-vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Voice {
    Up,
    Down,
}

impl Voice {
    pub fn value(self) -> i64 {
        match self {
            Voice::Up => 1,
            Voice::Down => -1,
        }
    }
}

impl TryFrom<i64> for Voice {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Voice::Up),
            -1 => Ok(Voice::Down),
            other => Err(DomainError::Validation(format!(
                "voice must be 1 or -1, got {other}"
            ))),
        }
    }
}

/// A user's vote on a thread. `(nickname, thread)` is unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub nickname: String,
    pub thread: ThreadId,
    pub voice: Voice,
}
