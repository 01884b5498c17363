//! Comments attached to articles

use super::StatusField;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    #[default]
    Active,
    Deleted,
}

impl CommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentStatus::Active => "active",
            CommentStatus::Deleted => "deleted",
        }
    }
}

impl StatusField for CommentStatus {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(CommentStatus::Active),
            "deleted" => Some(CommentStatus::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub article_id: i64,
    pub article_title: String,
    pub author_id: i64,
    pub author_username: String,
    pub created_at: NaiveDateTime,
    pub status: CommentStatus,
    pub like_count: u64,
}
