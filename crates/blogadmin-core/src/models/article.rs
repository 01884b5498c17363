//! Articles and moderation decisions

use super::StatusField;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Publication state of an article
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    #[default]
    Published,
    Draft,
    Rejected,
    Deleted,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Published => "published",
            ArticleStatus::Draft => "draft",
            ArticleStatus::Rejected => "rejected",
            ArticleStatus::Deleted => "deleted",
        }
    }
}

impl StatusField for ArticleStatus {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "published" => Some(ArticleStatus::Published),
            // Articles awaiting review are not public yet
            "draft" | "pending" => Some(ArticleStatus::Draft),
            "rejected" => Some(ArticleStatus::Rejected),
            "deleted" => Some(ArticleStatus::Deleted),
            _ => None,
        }
    }
}

/// Outcome of an article review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Published,
    Rejected,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewDecision::Published => "published",
            ReviewDecision::Rejected => "rejected",
        }
    }
}

/// A blog article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_username: String,
    pub author_id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
    pub comment_count: u64,
    pub like_count: u64,
    pub view_count: u64,
    pub status: ArticleStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_maps_to_draft() {
        assert_eq!(ArticleStatus::parse("pending"), Some(ArticleStatus::Draft));
        assert_eq!(ArticleStatus::parse("archived"), None);
    }

    #[test]
    fn test_rejected_is_its_own_status() {
        assert_eq!(ArticleStatus::parse("rejected"), Some(ArticleStatus::Rejected));
        assert_eq!(ArticleStatus::parse(" Rejected "), Some(ArticleStatus::Rejected));
        assert_eq!(
            ArticleStatus::Rejected.as_str(),
            ReviewDecision::Rejected.as_str()
        );
    }
}
