//! # Repository Ports
//!
//! Storage contracts implemented by `storage-adapters`. Services depend only
//! on these traits; tests substitute the generated `MockXxx` types (enable the
//! `testing` feature from other crates).

use async_trait::async_trait;

use crate::errors::DomainResult;
use crate::listing::PostListQuery;
use crate::models::{
    Forum, NewForum, NewPost, NewThread, Post, PostId, Thread, ThreadId, ThreadListQuery,
    ThreadPatch, ThreadRef, User, UserListQuery, UserPatch, Vote,
};

/// Hierarchical post storage for threads.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Inserts the batch atomically: every entry is stored or none is.
    ///
    /// Returns the created posts in batch order, with ids strictly
    /// increasing. An empty batch on an existing thread returns `Ok(vec![])`.
    async fn insert_batch(&self, thread: ThreadId, posts: Vec<NewPost>) -> DomainResult<Vec<Post>>;

    async fn get_post(&self, id: PostId) -> DomainResult<Post>;

    /// Replaces the message; an empty message leaves the post unchanged.
    async fn edit_message(&self, id: PostId, message: String) -> DomainResult<Post>;

    /// Reads one page of a thread's posts in the requested order.
    async fn list_by_thread(&self, thread: ThreadId, query: PostListQuery) -> DomainResult<Vec<Post>>;
}

/// Threads and their vote tallies.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ThreadRepository: Send + Sync {
    async fn create_thread(&self, thread: NewThread) -> DomainResult<Thread>;

    /// Looks a thread up by id or slug. Fails with `ThreadNotFound`.
    async fn resolve_thread(&self, thread: &ThreadRef) -> DomainResult<Thread>;

    async fn edit_thread(&self, id: ThreadId, patch: ThreadPatch) -> DomainResult<Thread>;

    /// Records (or replaces) a user's vote and returns the thread with its
    /// recomputed tally.
    async fn cast_vote(&self, vote: Vote) -> DomainResult<Thread>;

    /// Threads of a forum ordered by creation time.
    async fn list_threads(&self, forum: &str, query: ThreadListQuery) -> DomainResult<Vec<Thread>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: User) -> DomainResult<User>;
    async fn get_user(&self, nickname: &str) -> DomainResult<User>;

    /// Applies the non-empty fields of `patch`. A clashing email fails with
    /// `ConstraintConflict`.
    async fn update_user(&self, nickname: &str, patch: UserPatch) -> DomainResult<User>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ForumRepository: Send + Sync {
    async fn create_forum(&self, forum: NewForum) -> DomainResult<Forum>;
    /// Returns the forum with freshly counted posts and threads.
    async fn get_forum(&self, slug: &str) -> DomainResult<Forum>;

    /// Users who opened a thread or wrote a post in the forum, ordered by
    /// nickname.
    async fn list_users(&self, slug: &str, query: UserListQuery) -> DomainResult<Vec<User>>;
}
