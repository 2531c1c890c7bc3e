//! # Post Listing Orders
//!
//! The three traversal orders a thread's posts can be read in, plus a
//! store-independent implementation of each over an in-memory set of posts.
//! SQL-backed stores push the same orders down into queries; this module is
//! what the in-memory store runs and what tests use as the reference.
//!
//! - `flat`: by id.
//! - `tree`: depth-first pre-order by materialized path.
//! - `parent_tree`: pages of whole root subtrees. Paging counts roots, so a
//!   page may hold more than `limit` posts.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::errors::DomainError;
use crate::models::{Post, PostId};
use crate::path::PostPath;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortMode {
    #[default]
    Flat,
    Tree,
    ParentTree,
}

impl SortMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::Flat => "flat",
            SortMode::Tree => "tree",
            SortMode::ParentTree => "parent_tree",
        }
    }
}

impl FromStr for SortMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(SortMode::Flat),
            "tree" => Ok(SortMode::Tree),
            "parent_tree" => Ok(SortMode::ParentTree),
            other => Err(DomainError::UnsupportedSortMode(other.to_string())),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Window selection for a thread listing.
///
/// Identical queries against an unchanged store return identical pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostListQuery {
    /// Page size; `0` means unbounded. Counts roots in `parent_tree`.
    pub limit: u32,
    /// Cursor post id; `0` means no cursor.
    pub since: PostId,
    pub sort: SortMode,
    pub desc: bool,
}

impl PostListQuery {
    pub fn new(sort: SortMode) -> Self {
        Self {
            sort,
            ..Self::default()
        }
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn since(mut self, since: PostId) -> Self {
        self.since = since;
        self
    }

    pub fn descending(mut self, desc: bool) -> Self {
        self.desc = desc;
        self
    }

    pub fn cursor_id(&self) -> Option<PostId> {
        (self.since != 0).then_some(self.since)
    }

    fn page_size(&self) -> Option<usize> {
        (self.limit != 0).then_some(self.limit as usize)
    }
}

/// Where a `tree` / `parent_tree` page starts, resolved from the cursor id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// No cursor: start at the beginning (or the end, when descending).
    Start,
    /// Path of the cursor post.
    At(PostPath),
    /// The cursor id names no post; nothing lies past it.
    Dangling,
}

impl Cursor {
    /// Resolves the query's cursor with `lookup`, which returns the path of a
    /// post by id wherever that post lives.
    pub fn resolve<F>(query: &PostListQuery, lookup: F) -> Self
    where
        F: FnOnce(PostId) -> Option<PostPath>,
    {
        match query.cursor_id() {
            None => Cursor::Start,
            Some(id) => lookup(id).map_or(Cursor::Dangling, Cursor::At),
        }
    }
}

/// Orders and windows `posts`, which must be every post of one thread.
pub fn arrange(posts: Vec<Post>, query: &PostListQuery, cursor: &Cursor) -> Vec<Post> {
    match query.sort {
        SortMode::Flat => flat(posts, query),
        SortMode::Tree => tree(posts, query, cursor),
        SortMode::ParentTree => parent_tree(posts, query, cursor),
    }
}

fn flat(mut posts: Vec<Post>, query: &PostListQuery) -> Vec<Post> {
    if let Some(since) = query.cursor_id() {
        posts.retain(|p| if query.desc { p.id < since } else { p.id > since });
    }
    if query.desc {
        posts.sort_unstable_by(|a, b| b.id.cmp(&a.id));
    } else {
        posts.sort_unstable_by_key(|p| p.id);
    }
    truncate(posts, query.page_size())
}

fn tree(mut posts: Vec<Post>, query: &PostListQuery, cursor: &Cursor) -> Vec<Post> {
    match cursor {
        Cursor::Start => {}
        Cursor::At(after) => {
            posts.retain(|p| if query.desc { &p.path < after } else { &p.path > after });
        }
        Cursor::Dangling => return Vec::new(),
    }
    posts.sort_unstable_by(|a, b| a.path.cmp(&b.path).then(a.id.cmp(&b.id)));
    if query.desc {
        posts.reverse();
    }
    truncate(posts, query.page_size())
}

fn parent_tree(mut posts: Vec<Post>, query: &PostListQuery, cursor: &Cursor) -> Vec<Post> {
    let bound = match cursor {
        Cursor::Start => None,
        Cursor::At(path) => Some(path.root_id()),
        Cursor::Dangling => return Vec::new(),
    };

    let mut roots: Vec<PostId> = posts
        .iter()
        .filter(|p| p.is_root())
        .map(|p| p.id)
        .filter(|&id| match bound {
            None => true,
            Some(bound) if query.desc => id < bound,
            Some(bound) => id > bound,
        })
        .collect();
    if query.desc {
        roots.sort_unstable_by(|a, b| b.cmp(a));
    } else {
        roots.sort_unstable();
    }
    let selected: HashSet<PostId> = truncate(roots, query.page_size()).into_iter().collect();

    // Subtrees always read top-down, whatever the direction.
    posts.retain(|p| selected.contains(&p.path.root_id()));
    posts.sort_unstable_by(|a, b| {
        a.path
            .root_id()
            .cmp(&b.path.root_id())
            .then_with(|| a.path.cmp(&b.path))
            .then(a.id.cmp(&b.id))
    });
    posts
}

fn truncate<T>(mut items: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use std::collections::HashMap;

    // 1
    // ├── 2
    // │   └── 4
    // │       └── 7
    // └── 5
    // 3
    // └── 6
    // 8
    const SHAPE: &[(PostId, Option<PostId>)] = &[
        (1, None),
        (2, Some(1)),
        (3, None),
        (4, Some(2)),
        (5, Some(1)),
        (6, Some(3)),
        (7, Some(4)),
        (8, None),
    ];

    fn build(shape: &[(PostId, Option<PostId>)]) -> Vec<Post> {
        let mut paths: HashMap<PostId, PostPath> = HashMap::new();
        let created = Utc::now();
        shape
            .iter()
            .map(|&(id, parent)| {
                let path = PostPath::for_post(id, parent.and_then(|p| paths.get(&p)));
                paths.insert(id, path.clone());
                Post {
                    id,
                    author: "alice".into(),
                    created,
                    forum: "rust".into(),
                    message: format!("post {id}"),
                    is_edited: false,
                    parent,
                    thread: 1,
                    path,
                }
            })
            .collect()
    }

    fn run(query: PostListQuery) -> Vec<PostId> {
        let posts = build(SHAPE);
        let cursor = Cursor::resolve(&query, |id| {
            posts.iter().find(|p| p.id == id).map(|p| p.path.clone())
        });
        arrange(posts, &query, &cursor).into_iter().map(|p| p.id).collect()
    }

    #[test]
    fn sort_tokens_parse() {
        assert_eq!("flat".parse::<SortMode>(), Ok(SortMode::Flat));
        assert_eq!("tree".parse::<SortMode>(), Ok(SortMode::Tree));
        assert_eq!("parent_tree".parse::<SortMode>(), Ok(SortMode::ParentTree));
        assert_eq!(
            "by_votes".parse::<SortMode>(),
            Err(DomainError::UnsupportedSortMode("by_votes".into()))
        );
    }

    #[test]
    fn flat_ascending_returns_everything_by_id() {
        assert_eq!(run(PostListQuery::new(SortMode::Flat)), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn flat_cursor_and_direction() {
        let query = PostListQuery::new(SortMode::Flat).since(4).limit(2);
        assert_eq!(run(query), vec![5, 6]);
        assert_eq!(run(query.descending(true)), vec![3, 2]);
    }

    #[test]
    fn flat_cursor_needs_no_existing_post() {
        let query = PostListQuery::new(SortMode::Flat).since(100).descending(true).limit(3);
        assert_eq!(run(query), vec![8, 7, 6]);
    }

    #[test]
    fn tree_is_preorder() {
        assert_eq!(run(PostListQuery::new(SortMode::Tree)), vec![1, 2, 4, 7, 5, 3, 6, 8]);
    }

    #[test]
    fn tree_descending_is_reverse_preorder() {
        let query = PostListQuery::new(SortMode::Tree).descending(true).limit(4);
        assert_eq!(run(query), vec![8, 6, 3, 5]);
    }

    #[test]
    fn tree_cursor_continues_after_reference_path() {
        let query = PostListQuery::new(SortMode::Tree).since(4).limit(3);
        assert_eq!(run(query), vec![7, 5, 3]);

        let query = PostListQuery::new(SortMode::Tree).since(3).descending(true);
        assert_eq!(run(query), vec![5, 7, 4, 2, 1]);
    }

    #[test]
    fn tree_with_dangling_cursor_is_empty() {
        let query = PostListQuery::new(SortMode::Tree).since(99);
        assert!(run(query).is_empty());
    }

    #[test]
    fn parent_tree_pages_by_root() {
        let query = PostListQuery::new(SortMode::ParentTree).limit(2);
        assert_eq!(run(query), vec![1, 2, 4, 7, 5, 3, 6]);
    }

    #[test]
    fn parent_tree_descending_picks_latest_roots_but_reads_top_down() {
        let query = PostListQuery::new(SortMode::ParentTree).limit(2).descending(true);
        assert_eq!(run(query), vec![3, 6, 8]);
    }

    #[test]
    fn parent_tree_cursor_uses_root_of_reference() {
        // 7 lives under root 1, so the next page starts after root 1.
        let query = PostListQuery::new(SortMode::ParentTree).since(7).limit(1);
        assert_eq!(run(query), vec![3, 6]);

        let query = PostListQuery::new(SortMode::ParentTree).since(6).descending(true);
        assert_eq!(run(query), vec![1, 2, 4, 7, 5]);
    }

    #[test]
    fn parent_tree_with_dangling_cursor_is_empty() {
        let query = PostListQuery::new(SortMode::ParentTree).since(1234).limit(3);
        assert!(run(query).is_empty());
    }

    /// Random forest of `n` posts: each post picks an earlier post or nothing
    /// as parent, with ids assigned in insertion order.
    fn arb_shape() -> impl Strategy<Value = Vec<(PostId, Option<PostId>)>> {
        prop::collection::vec(any::<prop::sample::Index>(), 1..40).prop_map(|picks| {
            picks
                .iter()
                .enumerate()
                .map(|(i, pick)| {
                    let id = i as PostId + 1;
                    // Index over [0, i]: 0 means root, otherwise parent id.
                    let choice = pick.index(i + 1) as PostId;
                    (id, (choice != 0).then_some(choice))
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn tree_places_descendants_right_after_ancestors(shape in arb_shape()) {
            let posts = build(&shape);
            let query = PostListQuery::new(SortMode::Tree);
            let ordered = arrange(posts, &query, &Cursor::Start);
            let position: HashMap<PostId, usize> =
                ordered.iter().enumerate().map(|(i, p)| (p.id, i)).collect();

            for post in &ordered {
                if let Some(parent) = post.parent {
                    prop_assert!(position[&parent] < position[&post.id]);
                }
                // The subtree of `post` is a contiguous run starting at it.
                let start = position[&post.id];
                let size = ordered.iter().filter(|o| post.path.is_ancestor_of(&o.path)).count();
                for other in &ordered[start + 1..=start + size] {
                    prop_assert!(post.path.is_ancestor_of(&other.path));
                }
            }
        }

        #[test]
        fn flat_unbounded_returns_each_post_once(shape in arb_shape()) {
            let posts = build(&shape);
            let total = posts.len();
            let ordered = arrange(posts, &PostListQuery::new(SortMode::Flat), &Cursor::Start);
            prop_assert_eq!(ordered.len(), total);
            prop_assert!(ordered.windows(2).all(|w| w[0].id < w[1].id));
        }

        #[test]
        fn parent_tree_never_splits_a_subtree(
            shape in arb_shape(),
            limit in 1u32..5,
            desc in any::<bool>(),
        ) {
            let posts = build(&shape);
            let query = PostListQuery::new(SortMode::ParentTree).limit(limit).descending(desc);
            let page = arrange(posts.clone(), &query, &Cursor::Start);

            let roots: HashSet<PostId> = page.iter().filter(|p| p.is_root()).map(|p| p.id).collect();
            prop_assert!(roots.len() <= limit as usize);
            let expected = posts.iter().filter(|p| roots.contains(&p.path.root_id())).count();
            prop_assert_eq!(page.len(), expected);
        }

        #[test]
        fn listing_is_idempotent(shape in arb_shape(), since in 0i64..40, limit in 0u32..6) {
            for sort in [SortMode::Flat, SortMode::Tree, SortMode::ParentTree] {
                for desc in [false, true] {
                    let query = PostListQuery::new(sort).since(since).limit(limit).descending(desc);
                    let posts = build(&shape);
                    let cursor = Cursor::resolve(&query, |id| {
                        posts.iter().find(|p| p.id == id).map(|p| p.path.clone())
                    });
                    let first = arrange(posts.clone(), &query, &cursor);
                    let second = arrange(posts, &query, &cursor);
                    prop_assert_eq!(first, second);
                }
            }
        }
    }
}
