//! Snapshot store with parking_lot::RwLock
//!
//! One lock per collection; readers always see a fully-formed collection
//! because a collection is swapped in whole after normalization. Only the
//! coordinator writes.

use crate::models::{Article, Comment, ResourceKind, SiteStats, User};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// Point-in-time copy of every loaded collection
///
/// A kind that has never loaded successfully is `None`, which is distinct
/// from a loaded empty list.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub users: Option<Arc<Vec<User>>>,
    pub articles: Option<Arc<Vec<Article>>>,
    pub comments: Option<Arc<Vec<Comment>>>,
    pub stats: Option<SiteStats>,
}

impl Snapshot {
    pub fn is_loaded(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::Users => self.users.is_some(),
            ResourceKind::Articles => self.articles.is_some(),
            ResourceKind::Comments => self.comments.is_some(),
            ResourceKind::Stats => self.stats.is_some(),
        }
    }

    pub fn user(&self, id: i64) -> Option<&User> {
        self.users.as_deref()?.iter().find(|u| u.id == id)
    }

    pub fn article(&self, id: i64) -> Option<&Article> {
        self.articles.as_deref()?.iter().find(|a| a.id == id)
    }
}

struct Slot<T> {
    value: Option<T>,
    updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            value: None,
            updated_at: None,
        }
    }
}

impl<T> Slot<T> {
    fn replace(&mut self, value: T) {
        self.value = Some(value);
        self.updated_at = Some(Utc::now());
    }

    fn clear(&mut self) {
        self.value = None;
        self.updated_at = None;
    }
}

/// Shared read-only view of the latest authoritative data
#[derive(Default)]
pub struct SnapshotStore {
    users: RwLock<Slot<Arc<Vec<User>>>>,
    articles: RwLock<Slot<Arc<Vec<Article>>>>,
    comments: RwLock<Slot<Arc<Vec<Comment>>>>,
    stats: RwLock<Slot<SiteStats>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ===================
    // Read accessors
    // ===================

    /// Arc clones only; no collection is copied
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            users: self.users(),
            articles: self.articles(),
            comments: self.comments(),
            stats: self.stats(),
        }
    }

    pub fn users(&self) -> Option<Arc<Vec<User>>> {
        self.users.read().value.clone()
    }

    pub fn articles(&self) -> Option<Arc<Vec<Article>>> {
        self.articles.read().value.clone()
    }

    pub fn comments(&self) -> Option<Arc<Vec<Comment>>> {
        self.comments.read().value.clone()
    }

    pub fn stats(&self) -> Option<SiteStats> {
        self.stats.read().value
    }

    /// When `kind` was last replaced
    pub fn updated_at(&self, kind: ResourceKind) -> Option<DateTime<Utc>> {
        match kind {
            ResourceKind::Users => self.users.read().updated_at,
            ResourceKind::Articles => self.articles.read().updated_at,
            ResourceKind::Comments => self.comments.read().updated_at,
            ResourceKind::Stats => self.stats.read().updated_at,
        }
    }

    // ===================
    // Writers (coordinator only)
    // ===================

    pub(crate) fn replace_users(&self, users: Vec<User>) {
        self.users.write().replace(Arc::new(users));
    }

    pub(crate) fn replace_articles(&self, articles: Vec<Article>) {
        self.articles.write().replace(Arc::new(articles));
    }

    pub(crate) fn replace_comments(&self, comments: Vec<Comment>) {
        self.comments.write().replace(Arc::new(comments));
    }

    pub(crate) fn replace_stats(&self, stats: SiteStats) {
        self.stats.write().replace(stats);
    }

    pub(crate) fn clear(&self) {
        self.users.write().clear();
        self.articles.write().clear();
        self.comments.write().clear();
        self.stats.write().clear();
    }
}
