//! # Batch Insert Planning
//!
//! Turns an ordered list of [`NewPost`] entries into fully formed [`Post`]
//! rows. Stores call this inside their transaction (or under their write
//! lock) after gathering what it needs, so planning itself never touches
//! storage:
//!
//! 1. [`BatchInsert::parent_ids`] / [`BatchInsert::author_nicknames`] name the
//!    rows to fetch.
//! 2. The store fills a [`BatchContext`] and reserves one id per entry.
//! 3. [`BatchInsert::plan`] validates every entry and derives paths.
//!
//! Entries resolve left to right, so a parent may be an earlier entry of the
//! same batch but never a later one. Any failure rejects the whole batch.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::errors::{DomainError, DomainResult};
use crate::models::{NewPost, ParentRef, Post, PostId, ThreadId};
use crate::path::PostPath;

/// Facts about existing rows that the planner validates against.
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub thread: ThreadId,
    /// Forum slug of the thread, copied onto every post.
    pub forum: String,
    /// One timestamp shared by the whole batch.
    pub created: DateTime<Utc>,
    /// Paths of referenced parents that exist *in this thread*.
    pub parent_paths: HashMap<PostId, PostPath>,
    /// Referenced authors that exist.
    pub known_authors: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchInsert {
    entries: Vec<NewPost>,
}

impl BatchInsert {
    pub fn new(entries: Vec<NewPost>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct ids of already-persisted parents the batch refers to.
    pub fn parent_ids(&self) -> Vec<PostId> {
        let mut ids: Vec<PostId> = self
            .entries
            .iter()
            .filter_map(|e| match e.parent {
                Some(ParentRef::Post(id)) => Some(id),
                _ => None,
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Distinct author nicknames in the batch.
    pub fn author_nicknames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.author.clone()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Builds the rows to insert. `ids` are the reserved ids in ascending
    /// order; entry `i` receives `ids[i]`, so later entries always get
    /// larger ids.
    pub fn plan(self, ctx: &BatchContext, ids: &[PostId]) -> DomainResult<Vec<Post>> {
        if ids.len() != self.entries.len() {
            return Err(DomainError::Storage(format!(
                "reserved {} ids for {} posts",
                ids.len(),
                self.entries.len()
            )));
        }

        let mut planned: Vec<Post> = Vec::with_capacity(self.entries.len());
        // Position of each planned entry, keyed by its id.
        let mut assigned: HashMap<PostId, usize> = HashMap::with_capacity(ids.len());

        for (position, (entry, &id)) in self.entries.into_iter().zip(ids).enumerate() {
            let parent_path = match entry.parent {
                None => None,
                Some(parent) => {
                    let path = match parent {
                        ParentRef::Post(pid) => ctx
                            .parent_paths
                            .get(&pid)
                            .or_else(|| assigned.get(&pid).map(|&at| &planned[at].path)),
                        ParentRef::Batch(at) if at < position => Some(&planned[at].path),
                        ParentRef::Batch(_) => None,
                    };
                    Some(path.ok_or(DomainError::ParentNotFound { position, parent })?)
                }
            };

            if !ctx.known_authors.contains(&entry.author) {
                return Err(DomainError::AuthorNotFound(entry.author));
            }

            let path = PostPath::for_post(id, parent_path);
            planned.push(Post {
                id,
                author: entry.author,
                created: ctx.created,
                forum: ctx.forum.clone(),
                message: entry.message,
                is_edited: false,
                parent: path.parent_id(),
                thread: ctx.thread,
                path,
            });
            assigned.insert(id, position);
        }

        Ok(planned)
    }
}
