//! # ThreadService
//!
//! Thread lifecycle and voting. Every thread leaving this service is a
//! [`ThreadView`], so placeholder slugs never reach callers.

use std::sync::Arc;

use tracing::{info, warn};

use domains::{
    DomainError, DomainResult, NewThread, ThreadListQuery, ThreadPatch, ThreadRef,
    ThreadRepository, Voice, Vote,
};

use crate::views::ThreadView;

#[derive(Clone)]
pub struct ThreadService {
    threads: Arc<dyn ThreadRepository>,
}

impl ThreadService {
    pub fn new(threads: Arc<dyn ThreadRepository>) -> Self {
        Self { threads }
    }

    pub async fn create(&self, thread: NewThread) -> DomainResult<ThreadView> {
        let thread = self.threads.create_thread(thread).await?;
        info!(thread = thread.id, forum = %thread.forum, "thread created");
        Ok(thread.into())
    }

    pub async fn get(&self, thread: &ThreadRef) -> DomainResult<ThreadView> {
        Ok(self.threads.resolve_thread(thread).await?.into())
    }

    pub async fn edit(&self, thread: &ThreadRef, patch: ThreadPatch) -> DomainResult<ThreadView> {
        let current = self.threads.resolve_thread(thread).await?;
        if patch.title().is_none() && patch.message().is_none() {
            return Ok(current.into());
        }
        Ok(self.threads.edit_thread(current.id, patch).await?.into())
    }

    /// Records `nickname`'s vote. `voice` must be `1` or `-1`.
    ///
    /// A unique-key conflict means a concurrent first vote by the same user
    /// won the insert; the vote is applied once more as an update.
    pub async fn vote(&self, thread: &ThreadRef, nickname: &str, voice: i64) -> DomainResult<ThreadView> {
        let voice = Voice::try_from(voice)?;
        let thread = self.threads.resolve_thread(thread).await?;
        let vote = Vote {
            nickname: nickname.to_string(),
            thread: thread.id,
            voice,
        };

        let updated = match self.threads.cast_vote(vote.clone()).await {
            Err(DomainError::ConstraintConflict(constraint)) => {
                warn!(thread = thread.id, nickname, %constraint, "vote raced another insert, retrying");
                self.threads.cast_vote(vote).await?
            }
            other => other?,
        };
        Ok(updated.into())
    }

    pub async fn list_by_forum(&self, forum: &str, query: ThreadListQuery) -> DomainResult<Vec<ThreadView>> {
        let threads = self.threads.list_threads(forum, query).await?;
        Ok(threads.into_iter().map(ThreadView::from).collect())
    }
}
