//! Domain models for blogadmin
//!
//! Canonical in-memory shapes produced by the payload normalizer.
//! Values are never edited locally; they are replaced wholesale by the next load.

pub mod article;
pub mod comment;
pub mod stats;
pub mod user;

pub use article::{Article, ArticleStatus, ReviewDecision};
pub use comment::{Comment, CommentStatus};
pub use stats::SiteStats;
pub use user::{User, UserStatus};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource collections exposed by the admin API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Users,
    Articles,
    Comments,
    Stats,
}

impl ResourceKind {
    /// Every kind, in the order `refresh_all` initiates them
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Users,
        ResourceKind::Articles,
        ResourceKind::Comments,
        ResourceKind::Stats,
    ];

    /// Collection path segment under `/admin`
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Users => "users",
            ResourceKind::Articles => "articles",
            ResourceKind::Comments => "comments",
            ResourceKind::Stats => "stats",
        }
    }

    /// Singular noun used in messages
    pub fn singular(&self) -> &'static str {
        match self {
            ResourceKind::Users => "user",
            ResourceKind::Articles => "article",
            ResourceKind::Comments => "comment",
            ResourceKind::Stats => "stats",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.singular())
    }
}

/// Closed status vocabularies that tolerate server-side aliases
pub trait StatusField: Sized + Default + Copy {
    /// Parse a server value; `None` means unknown vocabulary
    fn parse(raw: &str) -> Option<Self>;
}
