//! Payload normalizer
//!
//! Converts raw admin-API JSON into the canonical domain records. Each record
//! kind declares its schema once in its [`Normalize`] impl; list responses are
//! processed record by record so one malformed entry never blanks the list.

pub mod datetime;
mod fields;

use crate::diagnostics::{Diagnostic, NormalizeReport};
use crate::error::{ApiError, NormalizationError};
use crate::models::{Article, Comment, ResourceKind, SiteStats, User};
use fields::{coerce_int, Fields};
use serde_json::Value;
use tracing::{debug, warn};

/// Schema-to-record mapping for one resource kind
pub trait Normalize: Sized {
    const KIND: ResourceKind;

    fn normalize(raw: &Value, report: &mut NormalizeReport) -> Result<Self, NormalizationError>;
}

/// Decode a response body; an empty body reads as JSON `null`
pub fn parse_body(body: &str) -> Result<Value, ApiError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| ApiError::MalformedResponse(e.to_string()))
}

/// Normalize a list response, dropping (and recording) records that fail
///
/// Accepts a bare array, an object wrapping the array under the collection
/// name or `data`, a single object (treated as a one-element list), or an
/// empty body.
pub fn normalize_list<T: Normalize>(
    raw: &Value,
    report: &mut NormalizeReport,
) -> Result<Vec<T>, ApiError> {
    let items: &[Value] = match raw {
        Value::Array(items) => items,
        Value::Null => &[],
        Value::Object(map) => match map
            .get(T::KIND.as_str())
            .or_else(|| map.get("data"))
        {
            Some(Value::Array(items)) => items,
            _ => std::slice::from_ref(raw),
        },
        other => {
            return Err(ApiError::MalformedResponse(format!(
                "expected a {} list, got {}",
                T::KIND,
                other
            )))
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        report.records_seen += 1;
        match T::normalize(item, report) {
            Ok(record) => {
                report.records_kept += 1;
                records.push(record);
            }
            Err(e) => {
                let record_id = item.get("id").and_then(coerce_int);
                warn!(kind = %T::KIND, id = ?record_id, error = %e, "Dropping malformed record");
                report.add(Diagnostic::dropped(T::KIND, record_id, e.to_string()));
            }
        }
    }

    debug!(
        kind = %T::KIND,
        seen = report.records_seen,
        kept = report.records_kept,
        "List normalized"
    );
    Ok(records)
}

/// Normalize a single-record response; failure aborts the operation
pub fn normalize_one<T: Normalize>(raw: &Value, report: &mut NormalizeReport) -> Result<T, ApiError> {
    report.records_seen += 1;
    match T::normalize(raw, report) {
        Ok(record) => {
            report.records_kept += 1;
            Ok(record)
        }
        Err(e) => {
            let record_id = raw.get("id").and_then(coerce_int);
            report.add(Diagnostic::dropped(T::KIND, record_id, e.to_string()));
            Err(ApiError::Normalization(e))
        }
    }
}

impl Normalize for User {
    const KIND: ResourceKind = ResourceKind::Users;

    fn normalize(raw: &Value, report: &mut NormalizeReport) -> Result<Self, NormalizationError> {
        let mut f = Fields::of(Self::KIND, raw)?;
        let id = f.id("id")?;
        let username = f.required_str("username")?;

        let avatar_url = f.optional_str("avatarUrl");
        let has_avatar = f.flag("hasAvatar").unwrap_or(avatar_url.is_some());

        Ok(User {
            id,
            username,
            real_name: f.optional_str("realName"),
            date_of_birth: f.optional_date("dateOfBirth", report),
            bio: f.optional_str("bio"),
            avatar_url,
            created_at: f.date_time("createdAt", report),
            status: f.status("status", report),
            article_count: f.count("articleCount", report),
            comment_count: f.count("commentCount", report),
            has_avatar,
        })
    }
}

impl Normalize for Article {
    const KIND: ResourceKind = ResourceKind::Articles;

    fn normalize(raw: &Value, report: &mut NormalizeReport) -> Result<Self, NormalizationError> {
        let mut f = Fields::of(Self::KIND, raw)?;
        let id = f.id("id")?;
        let title = f.required_str("title")?;
        let content = f.required_str("content")?;

        Ok(Article {
            id,
            title,
            content,
            author_username: f.str_or_empty("authorUsername"),
            author_id: f.int_or_zero("authorId", report),
            created_at: f.date_time("createdAt", report),
            updated_at: f.optional_date_time("updatedAt", report),
            comment_count: f.count("commentCount", report),
            like_count: f.count("likeCount", report),
            view_count: f.count("viewCount", report),
            status: f.status("status", report),
        })
    }
}

impl Normalize for Comment {
    const KIND: ResourceKind = ResourceKind::Comments;

    fn normalize(raw: &Value, report: &mut NormalizeReport) -> Result<Self, NormalizationError> {
        let mut f = Fields::of(Self::KIND, raw)?;
        let id = f.id("id")?;
        let content = f.required_str("content")?;

        Ok(Comment {
            id,
            content,
            article_id: f.int_or_zero("articleId", report),
            article_title: f.str_or_empty("articleTitle"),
            author_id: f.int_or_zero("authorId", report),
            author_username: f.str_or_empty("authorUsername"),
            created_at: f.date_time("createdAt", report),
            status: f.status("status", report),
            like_count: f.count("likeCount", report),
        })
    }
}

const STATS_FLAT_KEYS: [&str; 11] = [
    "totalUsers",
    "activeUsers",
    "bannedUsers",
    "totalArticles",
    "totalComments",
    "publishedArticles",
    "pendingArticles",
    "totalViews",
    "visibleComments",
    "hiddenComments",
    "totalLikes",
];

impl Normalize for SiteStats {
    const KIND: ResourceKind = ResourceKind::Stats;

    /// Nested `{users:{total,active,banned}, articles:{...}, ...}` is the
    /// server's shape; a flat `{totalUsers, ...}` object is accepted too.
    /// An object with neither shape is rejected rather than read as zeros.
    fn normalize(raw: &Value, _report: &mut NormalizeReport) -> Result<Self, NormalizationError> {
        let f = Fields::of(Self::KIND, raw)?;

        let nested = ["users", "articles", "comments", "likes"]
            .iter()
            .any(|section| f.section(section).is_some());
        if !nested {
            if !STATS_FLAT_KEYS.iter().any(|key| f.has(key)) {
                return Err(NormalizationError::MissingField {
                    kind: Self::KIND,
                    field: "users",
                });
            }
            return Ok(SiteStats {
                total_users: f.strict_count("totalUsers")?,
                active_users: f.strict_count("activeUsers")?,
                banned_users: f.strict_count("bannedUsers")?,
                total_articles: f.strict_count("totalArticles")?,
                total_comments: f.strict_count("totalComments")?,
                published_articles: f.strict_count("publishedArticles")?,
                pending_articles: f.strict_count("pendingArticles")?,
                total_views: f.strict_count("totalViews")?,
                visible_comments: f.strict_count("visibleComments")?,
                hidden_comments: f.strict_count("hiddenComments")?,
                total_likes: f.strict_count("totalLikes")?,
            });
        }

        let counter = |section: &str, field: &'static str| -> Result<u64, NormalizationError> {
            match f.section(section) {
                Some(s) => s.strict_count(field),
                None => Ok(0),
            }
        };

        Ok(SiteStats {
            total_users: counter("users", "total")?,
            active_users: counter("users", "active")?,
            banned_users: counter("users", "banned")?,
            total_articles: counter("articles", "total")?,
            total_comments: counter("comments", "total")?,
            published_articles: counter("articles", "published")?,
            pending_articles: counter("articles", "pending")?,
            total_views: counter("articles", "totalViews")?,
            visible_comments: counter("comments", "visible")?,
            hidden_comments: counter("comments", "hidden")?,
            total_likes: counter("likes", "total")?,
        })
    }
}
