//! Platform-level analytics
//!
//! Simple aggregate counts over the live collections, computed on
//! request. Nothing here is cached or pre-aggregated.

use std::collections::HashMap;

use bson::{doc, DateTime};
use chrono::{Duration, Utc};
use serde::Serialize;

use crate::db::schemas::{
    ChallengeDoc, CommentDoc, PostDoc, SubscriptionTier, UserDoc, CHALLENGE_COLLECTION,
    COMMENT_COLLECTION, POST_COLLECTION, USER_COLLECTION,
};
use crate::db::MongoClient;
use crate::types::Result;

/// Platform summary aggregate
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSummary {
    pub total_users: u64,
    pub active_users_7d: u64,
    pub active_users_30d: u64,
    pub total_posts: u64,
    pub total_comments: u64,
    pub total_challenges: u64,
    pub tier_distribution: HashMap<String, u64>,
    /// active_users_7d / active_users_30d
    pub stickiness: f64,
    pub posts_per_user: f64,
    pub generated_at: String,
}

#[derive(Clone)]
pub struct AnalyticsService {
    mongo: MongoClient,
}

impl AnalyticsService {
    pub fn new(mongo: MongoClient) -> Self {
        Self { mongo }
    }

    pub async fn platform_summary(&self) -> Result<PlatformSummary> {
        let users = self.mongo.collection::<UserDoc>(USER_COLLECTION).await?;

        let total_users = users.count(doc! {}).await?;

        let cutoff_7d = Utc::now() - Duration::days(7);
        let cutoff_30d = Utc::now() - Duration::days(30);
        let active_users_7d = users
            .count(doc! {
                "last_active": { "$gte": DateTime::from_millis(cutoff_7d.timestamp_millis()) }
            })
            .await?;
        let active_users_30d = users
            .count(doc! {
                "last_active": { "$gte": DateTime::from_millis(cutoff_30d.timestamp_millis()) }
            })
            .await?;

        let total_posts = self
            .mongo
            .collection::<PostDoc>(POST_COLLECTION)
            .await?
            .count(doc! {})
            .await?;
        let total_comments = self
            .mongo
            .collection::<CommentDoc>(COMMENT_COLLECTION)
            .await?
            .count(doc! {})
            .await?;
        let total_challenges = self
            .mongo
            .collection::<ChallengeDoc>(CHALLENGE_COLLECTION)
            .await?
            .count(doc! {})
            .await?;

        let mut tier_distribution = HashMap::new();
        for tier in SubscriptionTier::all() {
            let count = users
                .count(doc! { "subscription_tier": tier.as_str() })
                .await?;
            tier_distribution.insert(tier.as_str().to_string(), count);
        }

        Ok(PlatformSummary {
            total_users,
            active_users_7d,
            active_users_30d,
            total_posts,
            total_comments,
            total_challenges,
            tier_distribution,
            stickiness: active_users_7d as f64 / active_users_30d.max(1) as f64,
            posts_per_user: total_posts as f64 / total_users.max(1) as f64,
            generated_at: Utc::now().to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_serializes_camel_case() {
        let summary = PlatformSummary {
            total_users: 12,
            active_users_7d: 3,
            active_users_30d: 6,
            total_posts: 40,
            total_comments: 90,
            total_challenges: 5,
            tier_distribution: HashMap::from([("free".to_string(), 10)]),
            stickiness: 0.5,
            posts_per_user: 40.0 / 12.0,
            generated_at: "2026-01-01T00:00:00Z".to_string(),
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["activeUsers7d"], 3);
        assert_eq!(json["tierDistribution"]["free"], 10);
    }
}
