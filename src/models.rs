// Row types and domain enums shared by the database layer, services and API.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AppError, AppResult};

/// Follow edge state. An edge that was rejected or unfollowed is deleted,
/// so `none` is represented by the absence of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowStatus {
    Pending,
    Accepted,
}

impl FollowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FollowStatus::Pending => "pending",
            FollowStatus::Accepted => "accepted",
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "pending" => Ok(FollowStatus::Pending),
            "accepted" => Ok(FollowStatus::Accepted),
            other => Err(AppError::Validation(format!(
                "Unknown follow status: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for FollowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "scheduled" => Ok(PostStatus::Scheduled),
            "published" => Ok(PostStatus::Published),
            other => Err(AppError::Validation(format!(
                "Unknown post status: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            v => Err(AppError::Validation(format!("Unknown gender: {}", v))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_staff: bool,
    pub created: i64,
    pub updated: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: i64,
    pub account_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub location: String,
    /// ISO date (YYYY-MM-DD), absent until the owner sets it.
    pub date_of_birth: Option<String>,
    pub gender: Gender,
    pub is_private: bool,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
    pub created: i64,
    pub updated: i64,
}

impl Profile {
    /// Display name: both names, either name, or the email local part.
    pub fn full_name(&self, email: &str) -> String {
        display_name(&self.first_name, &self.last_name, email)
    }
}

/// Display name from raw name columns, falling back to the email local part.
pub fn display_name(first_name: &str, last_name: &str, email: &str) -> String {
    match (first_name.is_empty(), last_name.is_empty()) {
        (false, false) => format!("{} {}", first_name, last_name),
        (false, true) => first_name.to_string(),
        (true, false) => last_name.to_string(),
        (true, true) => email.split('@').next().unwrap_or(email).to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FollowEdge {
    pub id: i64,
    pub follower_id: i64,
    pub following_id: i64,
    pub status: FollowStatus,
    pub created: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub status: PostStatus,
    pub scheduled_at: Option<i64>,
    pub published_at: Option<i64>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub created: i64,
    pub updated: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
    pub parent_id: Option<i64>,
    pub is_deleted: bool,
    pub created: i64,
    pub updated: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [PostStatus::Draft, PostStatus::Scheduled, PostStatus::Published] {
            assert_eq!(PostStatus::parse(s.as_str()).unwrap(), s);
        }
        assert!(PostStatus::parse("canceled").is_err());
        assert_eq!(FollowStatus::parse("pending").unwrap(), FollowStatus::Pending);
        assert!(FollowStatus::parse("rejected").is_err());
    }

    #[test]
    fn test_full_name_fallback() {
        let mut profile = Profile {
            id: 1,
            account_id: 1,
            first_name: String::new(),
            last_name: String::new(),
            bio: String::new(),
            location: String::new(),
            date_of_birth: None,
            gender: Gender::Other,
            is_private: false,
            followers_count: 0,
            following_count: 0,
            posts_count: 0,
            created: 0,
            updated: 0,
        };
        assert_eq!(profile.full_name("ada@example.com"), "ada");
        profile.first_name = "Ada".into();
        assert_eq!(profile.full_name("ada@example.com"), "Ada");
        profile.last_name = "Lovelace".into();
        assert_eq!(profile.full_name("ada@example.com"), "Ada Lovelace");
    }
}
