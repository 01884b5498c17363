//! Output formatting for CLI commands
//!
//! Every formatter renders either a comfy-table (human) or pretty JSON.

use blogadmin_core::diagnostics::{Diagnostic, Severity};
use blogadmin_core::models::{Article, Comment, SiteStats, User};
use blogadmin_core::{DiscardReason, SessionEndReason, SyncEvent};
use chrono::NaiveDateTime;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use serde::Serialize;

// ============================================================================
// Tables
// ============================================================================

fn new_table(headers: &[&str], no_color: bool) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    if no_color {
        table.set_header(headers.to_vec());
    } else {
        table.set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    }
    table
}

fn to_json<T: Serialize + ?Sized>(value: &T, empty: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| empty.to_string())
}

/// Format users as table (human) or JSON
pub fn format_users(users: &[User], json: bool, no_color: bool) -> String {
    if json {
        return to_json(users, "[]");
    }
    if users.is_empty() {
        return "No users found.".to_string();
    }

    let mut table = new_table(
        &["ID", "Username", "Name", "Status", "Articles", "Comments", "Joined"],
        no_color,
    );
    for user in users {
        let status = if no_color || !user.is_banned() {
            Cell::new(user.status.as_str())
        } else {
            Cell::new(user.status.as_str()).fg(Color::Red)
        };
        table.add_row(Row::from(vec![
            Cell::new(user.id),
            Cell::new(truncate(&user.username, 20)),
            Cell::new(truncate(user.real_name.as_deref().unwrap_or("-"), 20)),
            status,
            Cell::new(user.article_count),
            Cell::new(user.comment_count),
            Cell::new(format_date(&user.created_at)),
        ]));
    }
    table.to_string()
}

/// Detail view of one user (human or JSON)
pub fn format_user_detail(user: &User, json: bool) -> String {
    if json {
        return to_json(user, "{}");
    }

    let mut lines = vec![];
    lines.push(format!("User ID:        {}", user.id));
    lines.push(format!("Username:       {}", user.username));
    lines.push(format!(
        "Real name:      {}",
        user.real_name.as_deref().unwrap_or("-")
    ));
    lines.push(format!(
        "Date of birth:  {}",
        user.date_of_birth
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string())
    ));
    lines.push(format!("Status:         {}", user.status.as_str()));
    lines.push(format!("Joined:         {}", format_date(&user.created_at)));
    lines.push(format!("Articles:       {}", user.article_count));
    lines.push(format!("Comments:       {}", user.comment_count));
    lines.push(format!(
        "Avatar:         {}",
        if user.has_avatar {
            user.avatar_url.as_deref().unwrap_or("yes")
        } else {
            "-"
        }
    ));
    lines.push(format!("Bio:            {}", user.bio.as_deref().unwrap_or("-")));
    lines.join("\n")
}

/// Format articles as table (human) or JSON
pub fn format_articles(articles: &[Article], json: bool, no_color: bool) -> String {
    if json {
        return to_json(articles, "[]");
    }
    if articles.is_empty() {
        return "No articles found.".to_string();
    }

    let mut table = new_table(
        &["ID", "Title", "Author", "Status", "Views", "Likes", "Comments", "Created"],
        no_color,
    );
    for article in articles {
        table.add_row(Row::from(vec![
            Cell::new(article.id),
            Cell::new(truncate(&article.title, 40)),
            Cell::new(truncate(&article.author_username, 16)),
            Cell::new(article.status.as_str()),
            Cell::new(article.view_count),
            Cell::new(article.like_count),
            Cell::new(article.comment_count),
            Cell::new(format_date(&article.created_at)),
        ]));
    }
    table.to_string()
}

/// Format comments as table (human) or JSON
pub fn format_comments(comments: &[Comment], json: bool, no_color: bool) -> String {
    if json {
        return to_json(comments, "[]");
    }
    if comments.is_empty() {
        return "No comments found.".to_string();
    }

    let mut table = new_table(
        &["ID", "Article", "Author", "Status", "Likes", "Created", "Preview"],
        no_color,
    );
    for comment in comments {
        table.add_row(Row::from(vec![
            Cell::new(comment.id),
            Cell::new(truncate(&comment.article_title, 24)),
            Cell::new(truncate(&comment.author_username, 16)),
            Cell::new(comment.status.as_str()),
            Cell::new(comment.like_count),
            Cell::new(format_date(&comment.created_at)),
            Cell::new(truncate(&comment.content, 40)),
        ]));
    }
    table.to_string()
}

/// Format site statistics (human or JSON)
pub fn format_stats(stats: &SiteStats, json: bool, no_color: bool) -> String {
    if json {
        return to_json(stats, "{}");
    }

    let mut table = new_table(&["Metric", "Value"], no_color);
    let rows = vec![
        ("Total users", stats.total_users.to_string()),
        ("Active users", stats.active_users.to_string()),
        (
            "Banned users",
            format!("{} ({:.1}%)", stats.banned_users, stats.banned_percent()),
        ),
        ("Total articles", stats.total_articles.to_string()),
        ("Published articles", stats.published_articles.to_string()),
        ("Pending articles", stats.pending_articles.to_string()),
        ("Total views", format_count(stats.total_views)),
        ("Total comments", stats.total_comments.to_string()),
        ("Visible comments", stats.visible_comments.to_string()),
        ("Hidden comments", stats.hidden_comments.to_string()),
        ("Total likes", format_count(stats.total_likes)),
    ];
    for (label, value) in rows {
        table.add_row(vec![label.to_string(), value]);
    }
    table.to_string()
}

/// Summary of normalization problems, empty when there were none
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    if diagnostics.is_empty() {
        return String::new();
    }

    let dropped = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let mut lines = vec![format!(
        "{} record(s) dropped, {} field fallback(s):",
        dropped,
        diagnostics.len() - dropped
    )];
    for d in diagnostics.iter().take(10) {
        let id = d
            .record_id
            .map(|id| format!(" #{}", id))
            .unwrap_or_default();
        let field = d.field.map(|f| format!(".{}", f)).unwrap_or_default();
        lines.push(format!("  - {}{}{}: {}", d.kind, id, field, d.message));
    }
    if diagnostics.len() > 10 {
        lines.push(format!("  ... and {} more", diagnostics.len() - 10));
    }
    lines.join("\n")
}

/// One line per sync event for `watch`
pub fn format_event(event: &SyncEvent) -> String {
    let now = chrono::Local::now().format("%H:%M:%S");
    let body = match event {
        SyncEvent::LoadStarted { kind, ticket } => format!("{} load #{} started", kind, ticket),
        SyncEvent::Loaded {
            kind,
            ticket,
            count,
        } => format!("{} load #{} done ({} records)", kind, ticket, count),
        SyncEvent::LoadFailed {
            kind,
            ticket,
            error,
        } => format!("{} load #{} failed: {}", kind, ticket, error.user_message()),
        SyncEvent::LoadDiscarded {
            kind,
            ticket,
            reason,
        } => {
            let why = match reason {
                DiscardReason::Superseded => "superseded",
                DiscardReason::SessionChanged => "session changed",
            };
            format!("{} load #{} discarded ({})", kind, ticket, why)
        }
        SyncEvent::SessionStarted { username } => format!("logged in as {}", username),
        SyncEvent::SessionEnded {
            reason: SessionEndReason::Logout,
        } => "logged out".to_string(),
        SyncEvent::SessionEnded {
            reason: SessionEndReason::Expired,
        } => "session expired, please log in again".to_string(),
    };
    format!("[{}] {}", now, body)
}

// ============================================================================
// Utilities
// ============================================================================

fn format_date(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M").to_string()
}

fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

fn truncate(s: &str, max: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max {
        s.to_string()
    } else {
        // Char-based so multi-byte titles never split mid-character
        s.chars().take(max - 1).collect::<String>() + "…"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use blogadmin_core::models::{ArticleStatus, UserStatus};
    use blogadmin_core::{ApiError, ResourceKind};
    use chrono::NaiveDate;

    fn created() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 15)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn test_user(id: i64, status: UserStatus) -> User {
        User {
            id,
            username: format!("user{}", id),
            real_name: None,
            date_of_birth: None,
            bio: None,
            avatar_url: None,
            created_at: created(),
            status,
            article_count: 2,
            comment_count: 7,
            has_avatar: false,
        }
    }

    fn test_article(id: i64) -> Article {
        Article {
            id,
            title: "A fairly long article title that will not fit in the column".to_string(),
            content: "body".to_string(),
            author_username: "carol".to_string(),
            author_id: 3,
            created_at: created(),
            updated_at: None,
            comment_count: 1,
            like_count: 2,
            view_count: 1500,
            status: ArticleStatus::Published,
        }
    }

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate("hello world", 20), "hello world");
        assert_eq!(truncate("hello world", 5), "hell…");
        assert_eq!(truncate("hello", 5), "hello");
    }

    #[test]
    fn test_truncate_unicode() {
        assert_eq!(truncate("café", 10), "café");
        assert_eq!(truncate("café", 3), "ca…");
        assert_eq!(truncate("日本語テスト", 4), "日本語…");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1500), "1.5K");
        assert_eq!(format_count(2_500_000), "2.5M");
    }

    #[test]
    fn test_format_users_empty() {
        assert!(format_users(&[], false, true).contains("No users found"));
    }

    #[test]
    fn test_format_users_table() {
        let output = format_users(
            &[test_user(1, UserStatus::Active), test_user(2, UserStatus::Banned)],
            false,
            true,
        );
        assert!(output.contains("user1"));
        assert!(output.contains("banned"));
        assert!(output.contains("2025-06-15 09:30"));
    }

    #[test]
    fn test_format_users_json() {
        let output = format_users(&[test_user(1, UserStatus::Active)], true, false);
        assert!(output.starts_with('['));
        assert!(output.contains("\"username\": \"user1\""));
    }

    #[test]
    fn test_format_articles_truncates_title() {
        let output = format_articles(&[test_article(4)], false, true);
        assert!(output.contains('…'));
        assert!(output.contains("carol"));
    }

    #[test]
    fn test_format_user_detail() {
        let output = format_user_detail(&test_user(5, UserStatus::Active), false);
        assert!(output.contains("User ID:        5"));
        assert!(output.contains("Real name:      -"));
    }

    #[test]
    fn test_format_stats() {
        let stats = SiteStats {
            total_users: 10,
            active_users: 8,
            banned_users: 2,
            total_articles: 5,
            total_comments: 20,
            ..Default::default()
        };
        let output = format_stats(&stats, false, true);
        assert!(output.contains("Banned users"));
        assert!(output.contains("2 (20.0%)"));

        let json = format_stats(&stats, true, true);
        assert!(json.starts_with('{'));
    }

    #[test]
    fn test_format_event_lines() {
        let line = format_event(&SyncEvent::LoadFailed {
            kind: ResourceKind::Users,
            ticket: 3,
            error: ApiError::Forbidden,
        });
        assert!(line.ends_with("user load #3 failed: Forbidden: admin privileges required."));

        let line = format_event(&SyncEvent::LoadDiscarded {
            kind: ResourceKind::Stats,
            ticket: 9,
            reason: DiscardReason::Superseded,
        });
        assert!(line.contains("discarded (superseded)"));
    }

    #[test]
    fn test_format_diagnostics() {
        assert!(format_diagnostics(&[]).is_empty());

        let output = format_diagnostics(&[
            Diagnostic::dropped(ResourceKind::Articles, Some(4), "missing title"),
            Diagnostic::fallback(ResourceKind::Articles, Some(5), "createdAt", "defaulted"),
        ]);
        assert!(output.starts_with("1 record(s) dropped, 1 field fallback(s):"));
        assert!(output.contains("article #5.createdAt: defaulted"));
    }
}
