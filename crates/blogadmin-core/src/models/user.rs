//! User accounts as seen by the admin API

use super::StatusField;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Account moderation state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Banned,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Banned => "banned",
        }
    }
}

impl StatusField for UserStatus {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(UserStatus::Active),
            "banned" => Some(UserStatus::Banned),
            _ => None,
        }
    }
}

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub real_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: NaiveDateTime,
    pub status: UserStatus,
    pub article_count: u64,
    pub comment_count: u64,
    pub has_avatar: bool,
}

impl User {
    pub fn is_banned(&self) -> bool {
        self.status == UserStatus::Banned
    }
}
