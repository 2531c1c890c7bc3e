//! # PostService
//!
//! Use cases over a thread's posts: batch creation, listing in any of the
//! three orders, details with related entities and message edits.

use std::sync::Arc;

use tracing::info;

use domains::{
    DomainResult, ForumRepository, NewPost, Post, PostId, PostListQuery, PostRepository, SortMode,
    ThreadRef, ThreadRepository, UserRepository,
};

use crate::views::{PostDetails, Related, ThreadView};

/// Listing parameters as they arrive from a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub limit: u32,
    pub since: PostId,
    /// Sort token; absent or empty means `flat`.
    pub sort: Option<String>,
    pub desc: bool,
}

impl ListParams {
    pub fn to_query(&self) -> DomainResult<PostListQuery> {
        let sort = match self.sort.as_deref() {
            None | Some("") => SortMode::default(),
            Some(token) => token.parse()?,
        };
        Ok(PostListQuery {
            limit: self.limit,
            since: self.since,
            sort,
            desc: self.desc,
        })
    }
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    threads: Arc<dyn ThreadRepository>,
    users: Arc<dyn UserRepository>,
    forums: Arc<dyn ForumRepository>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        threads: Arc<dyn ThreadRepository>,
        users: Arc<dyn UserRepository>,
        forums: Arc<dyn ForumRepository>,
    ) -> Self {
        Self {
            posts,
            threads,
            users,
            forums,
        }
    }

    pub async fn create_posts(&self, thread: &ThreadRef, posts: Vec<NewPost>) -> DomainResult<Vec<Post>> {
        let thread = self.threads.resolve_thread(thread).await?;
        let created = self.posts.insert_batch(thread.id, posts).await?;
        info!(thread = thread.id, count = created.len(), "posts created");
        Ok(created)
    }

    pub async fn list(&self, thread: &ThreadRef, params: &ListParams) -> DomainResult<Vec<Post>> {
        let query = params.to_query()?;
        let thread = self.threads.resolve_thread(thread).await?;
        self.posts.list_by_thread(thread.id, query).await
    }

    pub async fn details(&self, id: PostId, related: &[Related]) -> DomainResult<PostDetails> {
        let post = self.posts.get_post(id).await?;
        let mut details = PostDetails {
            post,
            author: None,
            forum: None,
            thread: None,
        };
        for item in related {
            match item {
                Related::User => {
                    details.author = Some(self.users.get_user(&details.post.author).await?);
                }
                Related::Forum => {
                    details.forum = Some(self.forums.get_forum(&details.post.forum).await?);
                }
                Related::Thread => {
                    let thread = self
                        .threads
                        .resolve_thread(&ThreadRef::ById(details.post.thread))
                        .await?;
                    details.thread = Some(ThreadView::from(thread));
                }
            }
        }
        Ok(details)
    }

    pub async fn edit(&self, id: PostId, message: String) -> DomainResult<Post> {
        let post = self.posts.edit_message(id, message).await?;
        info!(post = id, edited = post.is_edited, "post message updated");
        Ok(post)
    }
}
