//! Hierarchical post storage end to end over the in-memory store.

use std::collections::{HashMap, HashSet};

use domains::{DomainError, NewPost, ParentRef, PostId, PostListQuery, SortMode, ThreadRef};
use integration_tests::{assert_paths_consistent, ids, Engine, REPLY_BATCH};
use proptest::prelude::*;
use services::ListParams;

#[tokio::test]
async fn three_entry_batch_gets_expected_paths() {
    let engine = Engine::in_memory();
    let thread = engine.seeded().await.unwrap();

    let posts = engine
        .posts
        .create_posts(
            &ThreadRef::ById(thread),
            vec![
                NewPost::root("alice", "first"),
                NewPost::reply("bob", "second", ParentRef::Batch(0)),
                NewPost::root("carol", "third"),
            ],
        )
        .await
        .unwrap();

    let [a, b, c] = [posts[0].id, posts[1].id, posts[2].id];
    assert_eq!(posts[0].path.segments(), &[a]);
    assert_eq!(posts[1].path.segments(), &[a, b]);
    assert_eq!(posts[2].path.segments(), &[c]);
    assert_eq!(posts[1].parent, Some(a));
    assert!(posts.iter().all(|p| p.thread == thread && p.forum == "rust"));
}

#[tokio::test]
async fn batch_with_missing_parent_persists_nothing() {
    let engine = Engine::in_memory();
    let thread = engine.seeded().await.unwrap();

    let err = engine
        .posts
        .create_posts(
            &ThreadRef::parse("ownership"),
            vec![
                NewPost::root("alice", "would be fine"),
                NewPost::reply("bob", "orphan", ParentRef::Post(4242)),
                NewPost::root("carol", "never reached"),
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ParentNotFound { position: 1, .. }));

    let all = engine.list(thread, PostListQuery::new(SortMode::Flat)).await.unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn batch_with_unknown_author_persists_nothing() {
    let engine = Engine::in_memory();
    let thread = engine.seeded().await.unwrap();

    let err = engine
        .posts
        .create_posts(
            &ThreadRef::ById(thread),
            vec![NewPost::root("alice", "ok"), NewPost::root("mallory", "who?")],
        )
        .await
        .unwrap_err();
    assert_eq!(err, DomainError::AuthorNotFound("mallory".into()));
    assert!(engine
        .list(thread, PostListQuery::new(SortMode::Flat))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn paths_stay_consistent_across_batches() {
    let engine = Engine::in_memory();
    let thread = engine.seeded().await.unwrap();
    let shape = [None, Some(0), Some(1), None, Some(2), Some(0), Some(3), Some(6), Some(4)];

    let created = engine.grow_forest(thread, &shape, 3).await.unwrap();
    assert_eq!(created.len(), shape.len());
    assert_paths_consistent(&created);

    let listed = engine.list(thread, PostListQuery::new(SortMode::Tree)).await.unwrap();
    assert_eq!(listed.len(), created.len());
    assert_paths_consistent(&listed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_batches_under_one_parent_stay_whole() {
    let engine = Engine::in_memory();
    let thread = engine.seeded().await.unwrap();
    let parent = engine.grow_forest(thread, &[None, Some(0)], 2).await.unwrap()[1].id;

    let run = engine.concurrent_replies(thread, parent, 12).await.unwrap();

    let all = engine.list(thread, PostListQuery::new(SortMode::Flat)).await.unwrap();
    assert_eq!(all.len(), 2 + 12 * REPLY_BATCH);
    run.assert_whole_batches(parent, 2, &all);

    // Writers took disjoint id ranges, so no id was handed out twice.
    let unique: HashSet<PostId> = ids(&all).into_iter().collect();
    assert_eq!(unique.len(), all.len());
}

#[tokio::test]
async fn list_defaults_to_flat_and_rejects_unknown_sort() {
    let engine = Engine::in_memory();
    let thread = engine.seeded().await.unwrap();
    engine.grow_forest(thread, &[None, Some(0), None], 3).await.unwrap();

    let listed = engine
        .posts
        .list(&ThreadRef::ById(thread), &ListParams::default())
        .await
        .unwrap();
    assert!(listed.windows(2).all(|w| w[0].id < w[1].id));

    let params = ListParams {
        sort: Some("hot".into()),
        ..ListParams::default()
    };
    let err = engine.posts.list(&ThreadRef::ById(thread), &params).await.unwrap_err();
    assert_eq!(err, DomainError::UnsupportedSortMode("hot".into()));
}

#[tokio::test]
async fn parent_tree_pages_cover_the_thread_exactly_once() {
    let engine = Engine::in_memory();
    let thread = engine.seeded().await.unwrap();
    let shape = [None, Some(0), None, Some(1), Some(2), None, Some(5), Some(0), None];
    let created = engine.grow_forest(thread, &shape, 4).await.unwrap();

    let mut seen: Vec<PostId> = Vec::new();
    let mut since = 0;
    loop {
        let query = PostListQuery::new(SortMode::ParentTree).limit(1).since(since);
        let page = engine.list(thread, query).await.unwrap();
        let Some(root) = page.first() else { break };
        assert!(root.is_root());
        assert!(page.iter().all(|p| p.path.root_id() == root.id));
        since = root.id;
        seen.extend(ids(&page));
    }

    let unique: HashSet<PostId> = seen.iter().copied().collect();
    assert_eq!(seen.len(), created.len());
    assert_eq!(unique, ids(&created).into_iter().collect());
}

#[tokio::test]
async fn tree_cursor_walks_whole_thread_in_pages() {
    let engine = Engine::in_memory();
    let thread = engine.seeded().await.unwrap();
    let shape = [None, Some(0), Some(1), None, Some(0), Some(3), Some(2)];
    engine.grow_forest(thread, &shape, 7).await.unwrap();

    for desc in [false, true] {
        let whole = engine
            .list(thread, PostListQuery::new(SortMode::Tree).descending(desc))
            .await
            .unwrap();

        let mut paged = Vec::new();
        let mut since = 0;
        loop {
            let query = PostListQuery::new(SortMode::Tree).limit(2).since(since).descending(desc);
            let page = engine.list(thread, query).await.unwrap();
            let Some(last) = page.last() else { break };
            since = last.id;
            paged.extend(ids(&page));
        }
        assert_eq!(paged, ids(&whole), "desc = {desc}");
    }
}

#[tokio::test]
async fn cursor_from_another_thread_uses_its_path() {
    let engine = Engine::in_memory();
    let first = engine.seeded().await.unwrap();
    let second = engine.open_thread(Some("borrowing")).await.unwrap().id;

    let ours = engine.grow_forest(first, &[None, None, None], 3).await.unwrap();
    let theirs = engine.grow_forest(second, &[None], 1).await.unwrap();

    // The foreign post has a larger id than every post of `first`.
    let query = PostListQuery::new(SortMode::Tree).since(theirs[0].id).descending(true);
    let listed = engine.list(first, query).await.unwrap();
    let mut expected = ids(&ours);
    expected.reverse();
    assert_eq!(ids(&listed), expected);
}

#[tokio::test]
async fn listing_unknown_thread_fails() {
    let engine = Engine::in_memory();
    engine.seeded().await.unwrap();
    let err = engine
        .posts
        .list(&ThreadRef::parse("no-such-thread"), &ListParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ThreadNotFound(_)));
}

#[tokio::test]
async fn edit_semantics() {
    let engine = Engine::in_memory();
    let thread = engine.seeded().await.unwrap();
    let post = engine.grow_forest(thread, &[None], 1).await.unwrap().remove(0);
    let original = post.message.clone();

    let same = engine.posts.edit(post.id, String::new()).await.unwrap();
    assert_eq!((same.message.as_str(), same.is_edited), (original.as_str(), false));

    let same = engine.posts.edit(post.id, original.clone()).await.unwrap();
    assert!(!same.is_edited);

    let changed = engine.posts.edit(post.id, "rewritten".into()).await.unwrap();
    assert!(changed.is_edited);

    let back = engine.posts.edit(post.id, original.clone()).await.unwrap();
    assert_eq!(back.message, original);
    assert!(back.is_edited);
    assert_eq!(back.path, post.path);
    assert_eq!(back.created, post.created);
}

#[tokio::test]
async fn forum_counts_include_posts_and_threads() {
    let engine = Engine::in_memory();
    let thread = engine.seeded().await.unwrap();
    engine.grow_forest(thread, &[None, Some(0), Some(1)], 2).await.unwrap();

    let details = engine
        .posts
        .details(
            engine.list(thread, PostListQuery::new(SortMode::Flat)).await.unwrap()[2].id,
            &services::Related::parse_list("forum,thread,user").unwrap(),
        )
        .await
        .unwrap();
    let forum = details.forum.unwrap();
    assert_eq!((forum.threads, forum.posts), (1, 3));
    assert_eq!(details.thread.unwrap().slug.as_deref(), Some("ownership"));
    assert_eq!(details.author.unwrap().nickname, details.post.author);
}

/// Random forests: `pick` selects an earlier entry (or none) as parent.
fn arb_forest() -> impl Strategy<Value = (Vec<Option<usize>>, usize)> {
    (prop::collection::vec(any::<prop::sample::Index>(), 1..30), 1usize..8).prop_map(
        |(picks, chunk)| {
            let shape = picks
                .iter()
                .enumerate()
                .map(|(i, pick)| match pick.index(i + 1) {
                    0 => None,
                    n => Some(n - 1),
                })
                .collect();
            (shape, chunk)
        },
    )
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn tree_order_is_preorder((shape, chunk) in arb_forest()) {
        let listed = block_on(async {
            let engine = Engine::in_memory();
            let thread = engine.seeded().await.unwrap();
            engine.grow_forest(thread, &shape, chunk).await.unwrap();
            engine.list(thread, PostListQuery::new(SortMode::Tree)).await.unwrap()
        });

        let position: HashMap<PostId, usize> =
            listed.iter().enumerate().map(|(i, p)| (p.id, i)).collect();
        for post in &listed {
            let Some(parent) = post.parent else { continue };
            prop_assert!(position[&parent] < position[&post.id]);
            // Nothing outside the parent's subtree sits between parent and child.
            let parent_path = &listed[position[&parent]].path;
            for between in &listed[position[&parent] + 1..position[&post.id]] {
                prop_assert!(parent_path.is_ancestor_of(&between.path));
            }
        }
    }

    #[test]
    fn flat_returns_every_post_once((shape, chunk) in arb_forest()) {
        let (created, listed) = block_on(async {
            let engine = Engine::in_memory();
            let thread = engine.seeded().await.unwrap();
            let created = engine.grow_forest(thread, &shape, chunk).await.unwrap();
            let listed = engine.list(thread, PostListQuery::new(SortMode::Flat)).await.unwrap();
            (created, listed)
        });

        let mut expected = ids(&created);
        expected.sort_unstable();
        prop_assert_eq!(ids(&listed), expected);
    }

    #[test]
    fn parent_tree_keeps_subtrees_whole(
        (shape, chunk) in arb_forest(),
        limit in 1u32..4,
        desc in any::<bool>(),
    ) {
        let (all, page) = block_on(async {
            let engine = Engine::in_memory();
            let thread = engine.seeded().await.unwrap();
            let all = engine.grow_forest(thread, &shape, chunk).await.unwrap();
            let query = PostListQuery::new(SortMode::ParentTree).limit(limit).descending(desc);
            (all, engine.list(thread, query).await.unwrap())
        });

        let roots: HashSet<PostId> = page.iter().map(|p| p.path.root_id()).collect();
        prop_assert!(roots.len() <= limit as usize);
        let expected = all.iter().filter(|p| roots.contains(&p.path.root_id())).count();
        prop_assert_eq!(page.len(), expected);
    }
}
