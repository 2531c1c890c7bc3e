//! Caller-facing renderings of domain entities.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use domains::{DomainError, Forum, Post, Thread, ThreadId, User};

/// A thread as shown to callers. Placeholder slugs are never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadView {
    pub id: ThreadId,
    pub author: String,
    pub created: DateTime<Utc>,
    pub forum: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub title: String,
    pub votes: i64,
}

impl From<Thread> for ThreadView {
    fn from(thread: Thread) -> Self {
        let slug = thread.public_slug().map(str::to_string);
        Self {
            id: thread.id,
            author: thread.author,
            created: thread.created,
            forum: thread.forum,
            message: thread.message,
            slug,
            title: thread.title,
            votes: thread.votes,
        }
    }
}

/// Entities that can be attached to a post's details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Related {
    User,
    Forum,
    Thread,
}

impl FromStr for Related {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Related::User),
            "forum" => Ok(Related::Forum),
            "thread" => Ok(Related::Thread),
            other => Err(DomainError::Validation(format!("unknown related entity: {other}"))),
        }
    }
}

impl Related {
    /// Parses a comma-separated list such as `user,thread`. Blank entries are
    /// ignored.
    pub fn parse_list(raw: &str) -> Result<Vec<Related>, DomainError> {
        let mut related = Vec::new();
        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let item = token.parse()?;
            if !related.contains(&item) {
                related.push(item);
            }
        }
        Ok(related)
    }
}

/// A post plus the entities requested through [`Related`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostDetails {
    pub post: Post,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forum: Option<Forum>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<ThreadView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::placeholder_slug;

    fn thread(slug: String) -> Thread {
        Thread {
            id: 3,
            author: "alice".into(),
            created: Utc::now(),
            forum: "rust".into(),
            title: "Borrowing".into(),
            message: "...".into(),
            slug,
            votes: -2,
        }
    }

    #[test]
    fn placeholder_slug_is_omitted() {
        let view = ThreadView::from(thread(placeholder_slug()));
        assert_eq!(view.slug, None);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("slug").is_none());
        assert_eq!(json["votes"], -2);
    }

    #[test]
    fn chosen_slug_is_kept() {
        let view = ThreadView::from(thread("borrowing".into()));
        assert_eq!(view.slug.as_deref(), Some("borrowing"));
    }

    #[test]
    fn related_list_parses_and_dedups() {
        assert_eq!(
            Related::parse_list("user, thread,,user").unwrap(),
            vec![Related::User, Related::Thread]
        );
        assert!(Related::parse_list("").unwrap().is_empty());
        assert!(matches!(
            Related::parse_list("user,votes"),
            Err(DomainError::Validation(_))
        ));
    }
}
