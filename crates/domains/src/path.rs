//! # Materialized Paths
//!
//! Every post carries the chain of ancestor ids from its thread root down to
//! itself. The chain is compared elementwise as integers, so an ancestor always
//! sorts before its descendants and id `9` never sorts after id `10` the way it
//! would under string comparison.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::models::PostId;

/// Ordered ancestor chain of a post, self-inclusive.
///
/// Invariant: never empty. The first element is the root post of the reply
/// tree and the last element is the post's own id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PostPath(Vec<PostId>);

impl PostPath {
    /// Path of a root post: `[id]`.
    pub fn root(id: PostId) -> Self {
        Self(vec![id])
    }

    /// Builds the path for `id`, appending it to `parent` when present.
    pub fn for_post(id: PostId, parent: Option<&PostPath>) -> Self {
        match parent {
            Some(parent) => parent.child(id),
            None => Self::root(id),
        }
    }

    /// Path of a direct child of `self`.
    pub fn child(&self, id: PostId) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend_from_slice(&self.0);
        segments.push(id);
        Self(segments)
    }

    /// Rebuilds a path read back from storage. Returns `None` for an empty
    /// sequence, which no post can have.
    pub fn from_segments(segments: Vec<PostId>) -> Option<Self> {
        if segments.is_empty() {
            None
        } else {
            Some(Self(segments))
        }
    }

    /// Top-level ancestor; used to group replies under their root post.
    pub fn root_id(&self) -> PostId {
        self.0[0]
    }

    /// The post this path belongs to.
    pub fn leaf_id(&self) -> PostId {
        self.0[self.0.len() - 1]
    }

    /// Direct parent id, `None` for a root post.
    pub fn parent_id(&self) -> Option<PostId> {
        let len = self.0.len();
        (len > 1).then(|| self.0[len - 2])
    }

    /// Nesting depth; roots are at depth 0.
    pub fn depth(&self) -> usize {
        self.0.len() - 1
    }

    /// Whether `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &PostPath) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }

    pub fn segments(&self) -> &[PostId] {
        &self.0
    }
}

impl Ord for PostPath {
    // Elementwise numeric comparison; a proper prefix sorts first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for PostPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PostPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for id in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{id}")?;
            first = false;
        }
        Ok(())
    }
}
