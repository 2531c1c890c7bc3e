//! Shared fixtures for the black-box suites under `tests/`.
//!
//! [`Engine`] wires the services over any store implementing all four ports,
//! so the same scenarios run against the in-memory store and PostgreSQL.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use domains::{
    DomainError, DomainResult, ForumRepository, NewForum, NewPost, NewThread, ParentRef, Post,
    PostId, PostListQuery, PostRepository, SortMode, ThreadId, ThreadRepository, User,
    UserRepository,
};
use services::{PostService, ThreadService, ThreadView};
use storage_adapters::InMemoryStore;

pub const USERS: [&str; 3] = ["alice", "bob", "carol"];
pub const FORUM: &str = "rust";

/// Posts per writer in [`Engine::concurrent_replies`]: a reply to the shared
/// parent, two levels nested under it, and a new root.
pub const REPLY_BATCH: usize = 4;

/// Outcome of [`Engine::concurrent_replies`].
pub struct ConcurrentRun {
    /// One inserted batch per writer.
    pub batches: Vec<Vec<Post>>,
    /// Full `flat` listings read while the writers were running.
    pub snapshots: Vec<Vec<Post>>,
}

pub struct Engine {
    pub posts: PostService,
    pub threads: ThreadService,
    pub post_repo: Arc<dyn PostRepository>,
    pub users: Arc<dyn UserRepository>,
    pub forums: Arc<dyn ForumRepository>,
}

impl Engine {
    pub fn with_store<S>(store: S) -> Self
    where
        S: PostRepository + ThreadRepository + UserRepository + ForumRepository + 'static,
    {
        let store = Arc::new(store);
        let post_repo: Arc<dyn PostRepository> = store.clone();
        let thread_repo: Arc<dyn ThreadRepository> = store.clone();
        let users: Arc<dyn UserRepository> = store.clone();
        let forums: Arc<dyn ForumRepository> = store;
        Self {
            posts: PostService::new(
                post_repo.clone(),
                thread_repo.clone(),
                users.clone(),
                forums.clone(),
            ),
            threads: ThreadService::new(thread_repo),
            post_repo,
            users,
            forums,
        }
    }

    pub fn in_memory() -> Self {
        Self::with_store(InMemoryStore::new())
    }

    /// Creates [`USERS`] and the [`FORUM`] forum owned by `alice`.
    pub async fn seed_accounts(&self) -> DomainResult<()> {
        for nick in USERS {
            self.users
                .create_user(User {
                    nickname: nick.to_string(),
                    fullname: nick.to_uppercase(),
                    about: format!("{nick} writes Rust"),
                    email: format!("{nick}@example.org"),
                })
                .await?;
        }
        self.forums
            .create_forum(NewForum {
                slug: FORUM.to_string(),
                title: "The Rust forum".to_string(),
                user: USERS[0].to_string(),
            })
            .await?;
        Ok(())
    }

    pub async fn open_thread(&self, slug: Option<&str>) -> DomainResult<ThreadView> {
        self.threads
            .create(NewThread {
                author: USERS[0].to_string(),
                forum: FORUM.to_string(),
                title: "Ownership".to_string(),
                message: "Who owns what?".to_string(),
                slug: slug.map(str::to_string),
                created: None,
            })
            .await
    }

    /// Accounts plus one thread; returns the thread id.
    pub async fn seeded(&self) -> DomainResult<ThreadId> {
        self.seed_accounts().await?;
        Ok(self.open_thread(Some("ownership")).await?.id)
    }

    /// Inserts a forest shaped by `parents`: entry `i` replies to entry
    /// `parents[i]` (an earlier index) or is a root when `None`. Entries are
    /// sent in batches of `chunk`, so parents cross batch boundaries.
    pub async fn grow_forest(
        &self,
        thread: ThreadId,
        parents: &[Option<usize>],
        chunk: usize,
    ) -> DomainResult<Vec<Post>> {
        let mut created: Vec<Post> = Vec::with_capacity(parents.len());
        for (n, batch) in parents.chunks(chunk.max(1)).enumerate() {
            let offset = n * chunk.max(1);
            let entries = batch
                .iter()
                .enumerate()
                .map(|(i, parent)| {
                    let author = USERS[(offset + i) % USERS.len()];
                    let message = format!("post #{}", offset + i);
                    match parent {
                        Some(p) if *p >= offset => {
                            NewPost::reply(author, message, ParentRef::Batch(p - offset))
                        }
                        Some(p) => NewPost::reply(author, message, ParentRef::Post(created[*p].id)),
                        None => NewPost::root(author, message),
                    }
                })
                .collect();
            let inserted = self.post_repo.insert_batch(thread, entries).await?;
            created.extend(inserted);
        }
        Ok(created)
    }

    pub async fn list(&self, thread: ThreadId, query: PostListQuery) -> DomainResult<Vec<Post>> {
        self.post_repo.list_by_thread(thread, query).await
    }

    /// Spawns `writers` tasks that each insert a [`REPLY_BATCH`]-sized batch
    /// under `parent` at the same time, plus one task that keeps listing the
    /// thread while they run.
    pub async fn concurrent_replies(
        &self,
        thread: ThreadId,
        parent: PostId,
        writers: usize,
    ) -> DomainResult<ConcurrentRun> {
        let mut tasks = Vec::with_capacity(writers);
        for n in 0..writers {
            let repo = self.post_repo.clone();
            tasks.push(tokio::spawn(async move {
                let author = USERS[n % USERS.len()];
                let entries = vec![
                    NewPost::reply(author, format!("writer {n}: reply"), ParentRef::Post(parent)),
                    NewPost::reply(author, format!("writer {n}: nested"), ParentRef::Batch(0)),
                    NewPost::reply(author, format!("writer {n}: deeper"), ParentRef::Batch(1)),
                    NewPost::root(author, format!("writer {n}: new topic")),
                ];
                repo.insert_batch(thread, entries).await
            }));
        }

        let reader = {
            let repo = self.post_repo.clone();
            tokio::spawn(async move {
                let mut snapshots = Vec::with_capacity(writers);
                for _ in 0..writers {
                    snapshots.push(repo.list_by_thread(thread, PostListQuery::new(SortMode::Flat)).await?);
                    tokio::task::yield_now().await;
                }
                Ok::<_, DomainError>(snapshots)
            })
        };

        let mut batches = Vec::with_capacity(writers);
        for task in tasks {
            batches.push(task.await.map_err(join_error)??);
        }
        let snapshots = reader.await.map_err(join_error)??;
        Ok(ConcurrentRun { batches, snapshots })
    }
}

fn join_error(err: tokio::task::JoinError) -> DomainError {
    DomainError::Storage(format!("task failed: {err}"))
}

impl ConcurrentRun {
    /// Checks the run against the thread's final `flat` listing. `before` is
    /// how many posts the thread held when the writers started.
    pub fn assert_whole_batches(&self, parent: PostId, before: usize, all: &[Post]) {
        assert_eq!(all.len(), before + self.batches.len() * REPLY_BATCH);
        assert_paths_consistent(all);

        for batch in &self.batches {
            assert_eq!(batch.len(), REPLY_BATCH);
            assert!(
                batch.windows(2).all(|w| w[0].id < w[1].id),
                "ids not increasing within batch: {:?}",
                ids(batch)
            );
            assert_eq!(batch[0].parent, Some(parent));
            assert_eq!(batch[1].parent, Some(batch[0].id));
            assert_eq!(batch[2].parent, Some(batch[1].id));
            assert!(batch[3].is_root());
        }

        // A reader sees each batch entirely or not at all.
        for snapshot in &self.snapshots {
            let visible: HashSet<PostId> = ids(snapshot).into_iter().collect();
            for batch in &self.batches {
                let seen = batch.iter().filter(|p| visible.contains(&p.id)).count();
                assert!(
                    seen == 0 || seen == REPLY_BATCH,
                    "reader saw {seen} of {REPLY_BATCH} posts from batch {:?}",
                    ids(batch)
                );
            }
            assert_paths_consistent(snapshot);
        }
    }
}

/// Every path ends with the post id and extends its parent's path.
pub fn assert_paths_consistent(posts: &[Post]) {
    let index: HashMap<PostId, &Post> = posts.iter().map(|p| (p.id, p)).collect();
    for post in posts {
        assert_eq!(post.path.leaf_id(), post.id);
        match post.parent {
            Some(parent) => {
                let parent_post = index
                    .get(&parent)
                    .unwrap_or_else(|| panic!("post {} listed without parent {parent}", post.id));
                assert_eq!(post.path, parent_post.path.child(post.id), "post {}", post.id);
            }
            None => assert_eq!(post.path.segments(), &[post.id]),
        }
    }
}

pub fn ids(posts: &[Post]) -> Vec<PostId> {
    posts.iter().map(|p| p.id).collect()
}
