//! User document schema
//!
//! The user record carries the gamification counters (XP, cached level,
//! achievements), the credit balance, and the subscription state. `level`
//! is a projection of `experience_points` and is recomputed on every XP
//! write, never trusted on its own.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// Subscription tier for monetization gating
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Pro,
    Elite,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Pro => "pro",
            SubscriptionTier::Elite => "elite",
        }
    }

    pub fn all() -> [SubscriptionTier; 3] {
        [
            SubscriptionTier::Free,
            SubscriptionTier::Pro,
            SubscriptionTier::Elite,
        ]
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// External user identifier (UUID string)
    pub id: String,

    pub username: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    /// Accumulated experience points; non-negative, monotone outside
    /// admin correction
    #[serde(default)]
    pub experience_points: i64,

    /// Cached projection of `experience_points`, always >= 1
    #[serde(default = "default_level")]
    pub level: i64,

    /// Credit balance; never negative
    #[serde(default = "default_credits")]
    pub credits: i64,

    #[serde(default)]
    pub subscription_tier: SubscriptionTier,

    /// When the paid subscription lapses; checked lazily on access checks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_expires: Option<DateTime>,

    /// Achievement identifiers; append-only
    #[serde(default)]
    pub achievements: Vec<String>,

    /// Premium features unlocked with credits
    #[serde(default)]
    pub unlocked_features: Vec<String>,

    /// Accepted connection user ids
    #[serde(default)]
    pub connections: Vec<String>,

    #[serde(default)]
    pub followers: Vec<String>,

    #[serde(default)]
    pub following: Vec<String>,

    #[serde(default)]
    pub streak_days: i64,

    /// public, friends, or private
    #[serde(default = "default_visibility")]
    pub profile_visibility: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime>,
}

fn default_level() -> i64 {
    1
}

fn default_credits() -> i64 {
    100
}

fn default_visibility() -> String {
    "public".to_string()
}

impl UserDoc {
    /// Create a new user document with starting balances
    pub fn new(username: String, email: Option<String>, display_name: Option<String>) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            id: Uuid::new_v4().to_string(),
            username,
            email,
            display_name,
            bio: None,
            avatar_url: None,
            experience_points: 0,
            level: default_level(),
            credits: default_credits(),
            subscription_tier: SubscriptionTier::Free,
            subscription_expires: None,
            achievements: Vec::new(),
            unlocked_features: Vec::new(),
            connections: Vec::new(),
            followers: Vec::new(),
            following: Vec::new(),
            streak_days: 0,
            profile_visibility: default_visibility(),
            last_active: Some(DateTime::now()),
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on the external id
            (
                doc! { "id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("id_unique".to_string())
                        .build(),
                ),
            ),
            // Unique index on username
            (
                doc! { "username": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("username_unique".to_string())
                        .build(),
                ),
            ),
            // Leaderboard sort
            (
                doc! { "experience_points": -1 },
                Some(
                    IndexOptions::builder()
                        .name("xp_desc_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_starts_with_defaults() {
        let user = UserDoc::new("ada".to_string(), None, None);
        assert_eq!(user.level, 1);
        assert_eq!(user.experience_points, 0);
        assert_eq!(user.credits, 100);
        assert_eq!(user.subscription_tier, SubscriptionTier::Free);
        assert!(user.achievements.is_empty());
    }

    #[test]
    fn tier_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SubscriptionTier::Elite).unwrap(),
            "\"elite\""
        );
        let tier: SubscriptionTier = serde_json::from_str("\"pro\"").unwrap();
        assert_eq!(tier, SubscriptionTier::Pro);
    }
}
