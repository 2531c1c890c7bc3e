//! # In-memory store
//!
//! Implements every repository port over plain collections behind a single
//! `RwLock`. Writers hold the lock for the whole operation, so a batch insert
//! is trivially atomic and serializable with respect to other writers.
//!
//! Used by tests and the seed binary's dry-run mode; nothing is persisted.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use domains::{
    arrange, BatchContext, BatchInsert, Cursor, DomainError, DomainResult, Forum,
    ForumRepository, NewForum, NewPost, NewThread, Post, PostId, PostListQuery, PostPath,
    PostRepository, Thread, ThreadId, ThreadListQuery, ThreadPatch, ThreadRef, ThreadRepository,
    User, UserListQuery, UserPatch, UserRepository, Voice, Vote,
};

#[derive(Debug, Default)]
struct State {
    users: HashMap<String, User>,
    forums: HashMap<String, NewForum>,
    threads: BTreeMap<ThreadId, Thread>,
    thread_slugs: HashMap<String, ThreadId>,
    posts: BTreeMap<PostId, Post>,
    thread_posts: HashMap<ThreadId, Vec<PostId>>,
    votes: HashMap<(String, ThreadId), Voice>,
    last_thread_id: ThreadId,
    last_post_id: PostId,
}

impl State {
    fn thread(&self, id: ThreadId) -> DomainResult<&Thread> {
        self.threads
            .get(&id)
            .ok_or_else(|| DomainError::ThreadNotFound(id.to_string()))
    }

    fn posts_of(&self, thread: ThreadId) -> Vec<Post> {
        self.thread_posts
            .get(&thread)
            .into_iter()
            .flatten()
            .filter_map(|id| self.posts.get(id))
            .cloned()
            .collect()
    }
}

/// Shared handle; clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| DomainError::Storage("in-memory store lock poisoned".into()))
    }

    fn write(&self) -> DomainResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| DomainError::Storage("in-memory store lock poisoned".into()))
    }
}

#[async_trait]
impl PostRepository for InMemoryStore {
    async fn insert_batch(&self, thread: ThreadId, posts: Vec<NewPost>) -> DomainResult<Vec<Post>> {
        let mut state = self.write()?;
        let forum = state.thread(thread)?.forum.clone();
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let batch = BatchInsert::new(posts);
        let ctx = BatchContext {
            thread,
            forum,
            created: Utc::now(),
            parent_paths: batch
                .parent_ids()
                .into_iter()
                .filter_map(|id| state.posts.get(&id))
                .filter(|p| p.thread == thread)
                .map(|p| (p.id, p.path.clone()))
                .collect(),
            known_authors: batch
                .author_nicknames()
                .into_iter()
                .filter(|n| state.users.contains_key(n))
                .collect(),
        };
        let first = state.last_post_id + 1;
        let ids: Vec<PostId> = (first..first + batch.len() as PostId).collect();

        // Nothing is written until the whole batch has been planned.
        let planned = batch.plan(&ctx, &ids)?;

        state.last_post_id = first + planned.len() as PostId - 1;
        let list = state.thread_posts.entry(thread).or_default();
        list.extend(planned.iter().map(|p| p.id));
        for post in &planned {
            state.posts.insert(post.id, post.clone());
        }
        debug!(thread, count = planned.len(), "batch inserted");
        Ok(planned)
    }

    async fn get_post(&self, id: PostId) -> DomainResult<Post> {
        self.read()?
            .posts
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("post", id))
    }

    async fn edit_message(&self, id: PostId, message: String) -> DomainResult<Post> {
        let mut state = self.write()?;
        let post = state
            .posts
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("post", id))?;
        post.apply_edit(&message);
        Ok(post.clone())
    }

    async fn list_by_thread(&self, thread: ThreadId, query: PostListQuery) -> DomainResult<Vec<Post>> {
        let state = self.read()?;
        state.thread(thread)?;
        let cursor = Cursor::resolve(&query, |id| state.posts.get(&id).map(|p| p.path.clone()));
        Ok(arrange(state.posts_of(thread), &query, &cursor))
    }
}

#[async_trait]
impl ThreadRepository for InMemoryStore {
    async fn create_thread(&self, new: NewThread) -> DomainResult<Thread> {
        let mut state = self.write()?;
        if !state.users.contains_key(&new.author) {
            return Err(DomainError::AuthorNotFound(new.author));
        }
        let forum = match state.forums.get(&new.forum) {
            Some(forum) => forum.slug.clone(),
            None => return Err(DomainError::not_found("forum", &new.forum)),
        };
        let slug = new.storage_slug();
        if state.thread_slugs.contains_key(&slug) {
            return Err(DomainError::ConstraintConflict(format!("thread slug {slug}")));
        }

        state.last_thread_id += 1;
        let thread = Thread {
            id: state.last_thread_id,
            author: new.author,
            created: new.created.unwrap_or_else(Utc::now),
            forum,
            title: new.title,
            message: new.message,
            slug,
            votes: 0,
        };
        state.thread_slugs.insert(thread.slug.clone(), thread.id);
        state.threads.insert(thread.id, thread.clone());
        Ok(thread)
    }

    async fn resolve_thread(&self, thread: &ThreadRef) -> DomainResult<Thread> {
        let state = self.read()?;
        let id = match thread {
            ThreadRef::ById(id) => Some(*id),
            ThreadRef::BySlug(slug) => state.thread_slugs.get(slug).copied(),
        };
        id.and_then(|id| state.threads.get(&id))
            .cloned()
            .ok_or_else(|| DomainError::ThreadNotFound(thread.to_string()))
    }

    async fn edit_thread(&self, id: ThreadId, patch: ThreadPatch) -> DomainResult<Thread> {
        let mut state = self.write()?;
        let thread = state
            .threads
            .get_mut(&id)
            .ok_or_else(|| DomainError::ThreadNotFound(id.to_string()))?;
        if let Some(title) = patch.title() {
            thread.title = title.to_string();
        }
        if let Some(message) = patch.message() {
            thread.message = message.to_string();
        }
        Ok(thread.clone())
    }

    async fn cast_vote(&self, vote: Vote) -> DomainResult<Thread> {
        let mut state = self.write()?;
        state.thread(vote.thread)?;
        if !state.users.contains_key(&vote.nickname) {
            return Err(DomainError::AuthorNotFound(vote.nickname));
        }

        state.votes.insert((vote.nickname, vote.thread), vote.voice);
        let total: i64 = state
            .votes
            .iter()
            .filter(|((_, thread), _)| *thread == vote.thread)
            .map(|(_, voice)| voice.value())
            .sum();

        let thread = state
            .threads
            .get_mut(&vote.thread)
            .ok_or_else(|| DomainError::ThreadNotFound(vote.thread.to_string()))?;
        thread.votes = total;
        Ok(thread.clone())
    }

    async fn list_threads(&self, forum: &str, query: ThreadListQuery) -> DomainResult<Vec<Thread>> {
        let state = self.read()?;
        if !state.forums.contains_key(forum) {
            return Err(DomainError::not_found("forum", forum));
        }

        let mut threads: Vec<Thread> = state
            .threads
            .values()
            .filter(|t| t.forum == forum)
            .filter(|t| match query.since {
                None => true,
                Some(since) if query.desc => t.created <= since,
                Some(since) => t.created >= since,
            })
            .cloned()
            .collect();
        threads.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        if query.desc {
            threads.reverse();
        }
        if query.limit != 0 {
            threads.truncate(query.limit as usize);
        }
        Ok(threads)
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create_user(&self, user: User) -> DomainResult<User> {
        let mut state = self.write()?;
        if state.users.contains_key(&user.nickname) {
            return Err(DomainError::ConstraintConflict(format!("nickname {}", user.nickname)));
        }
        if state.users.values().any(|u| u.email == user.email) {
            return Err(DomainError::ConstraintConflict(format!("email {}", user.email)));
        }
        state.users.insert(user.nickname.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, nickname: &str) -> DomainResult<User> {
        self.read()?
            .users
            .get(nickname)
            .cloned()
            .ok_or_else(|| DomainError::not_found("user", nickname))
    }

    async fn update_user(&self, nickname: &str, patch: UserPatch) -> DomainResult<User> {
        let mut state = self.write()?;
        if let Some(email) = patch.email() {
            if state.users.values().any(|u| u.email == email && u.nickname != nickname) {
                return Err(DomainError::ConstraintConflict(format!("email {email}")));
            }
        }
        let user = state
            .users
            .get_mut(nickname)
            .ok_or_else(|| DomainError::not_found("user", nickname))?;
        patch.apply(user);
        Ok(user.clone())
    }
}

#[async_trait]
impl ForumRepository for InMemoryStore {
    async fn create_forum(&self, forum: NewForum) -> DomainResult<Forum> {
        let mut state = self.write()?;
        if !state.users.contains_key(&forum.user) {
            return Err(DomainError::AuthorNotFound(forum.user));
        }
        if state.forums.contains_key(&forum.slug) {
            return Err(DomainError::ConstraintConflict(format!("forum slug {}", forum.slug)));
        }
        state.forums.insert(forum.slug.clone(), forum.clone());
        Ok(Forum {
            slug: forum.slug,
            title: forum.title,
            user: forum.user,
            posts: 0,
            threads: 0,
        })
    }

    async fn get_forum(&self, slug: &str) -> DomainResult<Forum> {
        let state = self.read()?;
        let forum = state
            .forums
            .get(slug)
            .ok_or_else(|| DomainError::not_found("forum", slug))?;
        let threads: HashSet<ThreadId> = state
            .threads
            .values()
            .filter(|t| t.forum == forum.slug)
            .map(|t| t.id)
            .collect();
        let posts = state.posts.values().filter(|p| threads.contains(&p.thread)).count();
        Ok(Forum {
            slug: forum.slug.clone(),
            title: forum.title.clone(),
            user: forum.user.clone(),
            posts: posts as i64,
            threads: threads.len() as i64,
        })
    }

    async fn list_users(&self, slug: &str, query: UserListQuery) -> DomainResult<Vec<User>> {
        let state = self.read()?;
        if !state.forums.contains_key(slug) {
            return Err(DomainError::not_found("forum", slug));
        }

        let authors: BTreeSet<&str> = state
            .threads
            .values()
            .filter(|t| t.forum == slug)
            .map(|t| t.author.as_str())
            .chain(
                state
                    .posts
                    .values()
                    .filter(|p| p.forum == slug)
                    .map(|p| p.author.as_str()),
            )
            .filter(|nickname| query.admits(nickname))
            .collect();
        let mut users: Vec<User> = authors
            .into_iter()
            .filter_map(|nickname| state.users.get(nickname))
            .cloned()
            .collect();
        if query.desc {
            users.reverse();
        }
        if query.limit != 0 {
            users.truncate(query.limit as usize);
        }
        Ok(users)
    }
}
