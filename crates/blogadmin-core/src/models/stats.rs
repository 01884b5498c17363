//! Site-wide aggregates reported by `GET /admin/stats`
//!
//! Every counter comes from the server's latest response; nothing here is
//! derived from the loaded collections.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStats {
    pub total_users: u64,
    pub active_users: u64,
    pub banned_users: u64,
    pub total_articles: u64,
    pub total_comments: u64,

    /// Articles visible to readers
    pub published_articles: u64,
    /// Articles waiting for review
    pub pending_articles: u64,
    /// Sum of article view counters
    pub total_views: u64,
    pub visible_comments: u64,
    pub hidden_comments: u64,
    /// Article likes across the site
    pub total_likes: u64,
}

impl SiteStats {
    /// Share of banned accounts in percent (0 when there are no users)
    pub fn banned_percent(&self) -> f64 {
        if self.total_users == 0 {
            return 0.0;
        }
        self.banned_users as f64 / self.total_users as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banned_percent() {
        let stats = SiteStats {
            total_users: 10,
            banned_users: 2,
            ..Default::default()
        };
        assert!((stats.banned_percent() - 20.0).abs() < f64::EPSILON);
        assert_eq!(SiteStats::default().banned_percent(), 0.0);
    }
}
