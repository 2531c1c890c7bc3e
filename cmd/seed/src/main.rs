//! # seed
//!
//! Populates a store with a demo forum and a nested discussion, then prints
//! the thread in every listing order.
//!
//! ```text
//! seed               # PostgreSQL, settings from config/forum.toml / FORUM__*
//! seed --in-memory   # throwaway in-process store
//! ```

use std::sync::Arc;

use anyhow::Context;
use configs::Settings;
use domains::{
    ForumRepository, NewForum, NewPost, NewThread, ParentRef, Post, PostRepository, SortMode,
    ThreadRef, ThreadRepository, User, UserListQuery, UserPatch, UserRepository,
};
use services::{ListParams, PostService, ThreadService};
use storage_adapters::{InMemoryStore, PgStore};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const MEMBERS: [(&str, &str); 3] = [
    ("ferris", "Ferris the Crab"),
    ("corro", "Corro the Unsafe"),
    ("bors", "Bors the Merger"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if std::env::args().any(|a| a == "--in-memory") {
        return seed(InMemoryStore::new()).await;
    }

    let settings = Settings::load().context("loading settings")?;
    if let Some(path) = &settings.env_file {
        debug!(path = %path.display(), "loaded .env");
    }
    let store = PgStore::connect(&settings.database)
        .await
        .context("connecting to postgres")?;
    store.migrate().await.context("running migrations")?;
    let result = seed(store.clone()).await;
    store.close().await;
    result
}

async fn seed<S>(store: S) -> anyhow::Result<()>
where
    S: PostRepository + ThreadRepository + UserRepository + ForumRepository + 'static,
{
    let store = Arc::new(store);
    let threads = ThreadService::new(store.clone());
    let posts = PostService::new(store.clone(), store.clone(), store.clone(), store.clone());

    for (nickname, fullname) in MEMBERS {
        store
            .create_user(User {
                nickname: nickname.to_string(),
                fullname: fullname.to_string(),
                about: String::new(),
                email: format!("{nickname}@rust-lang.example"),
            })
            .await
            .with_context(|| format!("creating user {nickname}"))?;
    }
    store
        .create_forum(NewForum {
            slug: "rust".to_string(),
            title: "Rust users".to_string(),
            user: "ferris".to_string(),
        })
        .await
        .context("creating forum")?;

    let thread = threads
        .create(NewThread {
            author: "ferris".to_string(),
            forum: "rust".to_string(),
            title: "Is the borrow checker your friend?".to_string(),
            message: "Discuss.".to_string(),
            slug: None,
            created: None,
        })
        .await
        .context("creating thread")?;
    let thread_ref = ThreadRef::ById(thread.id);

    let first = posts
        .create_posts(
            &thread_ref,
            vec![
                NewPost::root("corro", "Only when I do what it says."),
                NewPost::reply("ferris", "That is what friends are for.", ParentRef::Batch(0)),
                NewPost::reply("corro", "unsafe { disagree() }", ParentRef::Batch(1)),
                NewPost::root("bors", "Queued for merge."),
                NewPost::reply("ferris", "@bors r+", ParentRef::Batch(3)),
            ],
        )
        .await
        .context("inserting first batch")?;
    posts
        .create_posts(
            &thread_ref,
            vec![
                NewPost::reply("bors", "Tests passed.", ParentRef::Post(first[4].id)),
                NewPost::reply("corro", "Fine, it is a friend.", ParentRef::Post(first[0].id)),
                NewPost::root("ferris", "Thanks all!"),
            ],
        )
        .await
        .context("inserting second batch")?;

    threads.vote(&thread_ref, "corro", 1).await?;
    threads.vote(&thread_ref, "bors", 1).await?;
    let thread = threads.vote(&thread_ref, "corro", -1).await?;
    info!(thread = thread.id, votes = thread.votes, "demo data ready");

    store
        .update_user(
            "corro",
            UserPatch {
                about: Some("Changed my mind about the borrow checker.".to_string()),
                ..UserPatch::default()
            },
        )
        .await
        .context("updating profile")?;
    println!("== participants ==");
    for user in store.list_users("rust", UserListQuery::default()).await? {
        println!("{} ({}): {}", user.nickname, user.fullname, user.about);
    }
    println!();

    for sort in [SortMode::Flat, SortMode::Tree, SortMode::ParentTree] {
        let params = ListParams {
            sort: Some(sort.as_str().to_string()),
            ..ListParams::default()
        };
        println!("== {sort} ==");
        for post in posts.list(&thread_ref, &params).await? {
            println!("{}", render(&post));
        }
        println!();
    }
    Ok(())
}

fn render(post: &Post) -> String {
    format!(
        "{indent}#{id} [{path}] {author}: {message}",
        indent = "  ".repeat(post.path.depth()),
        id = post.id,
        path = post.path,
        author = post.author,
        message = post.message,
    )
}
