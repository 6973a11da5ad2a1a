//! Engagement scoring
//!
//! A weighted sum of a user's content and social activity, clamped to
//! [0, 100]. Recomputed from live counts on demand; nothing is cached.

use bson::doc;
use tracing::debug;

use crate::db::schemas::{
    UserDoc, CHALLENGE_COLLECTION, COMMENT_COLLECTION, POST_COLLECTION, USER_COLLECTION,
};
use crate::db::schemas::{ChallengeDoc, CommentDoc, PostDoc};
use crate::db::MongoClient;
use crate::types::{LumenError, Result};

/// Weighted engagement score in [0, 100]. Pure.
pub fn weighted_score(posts: i64, comments: i64, connections: i64, challenges_joined: i64) -> f64 {
    let raw = (posts * 10 + comments * 5 + connections * 2 + challenges_joined * 15) as f64 / 2.0;
    raw.min(100.0)
}

/// Computes engagement scores from materialized counts
#[derive(Clone)]
pub struct EngagementService {
    mongo: MongoClient,
}

impl EngagementService {
    pub fn new(mongo: MongoClient) -> Self {
        Self { mongo }
    }

    pub async fn compute_engagement_score(&self, user_id: &str) -> Result<f64> {
        let users = self.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
        let user = users
            .find_one(doc! { "id": user_id })
            .await?
            .ok_or_else(|| LumenError::not_found(format!("user {}", user_id)))?;

        let posts = self
            .mongo
            .collection::<PostDoc>(POST_COLLECTION)
            .await?
            .count(doc! { "user_id": user_id })
            .await? as i64;
        let comments = self
            .mongo
            .collection::<CommentDoc>(COMMENT_COLLECTION)
            .await?
            .count(doc! { "user_id": user_id })
            .await? as i64;
        let challenges_joined = self
            .mongo
            .collection::<ChallengeDoc>(CHALLENGE_COLLECTION)
            .await?
            .count(doc! { "participants": user_id })
            .await? as i64;
        let connections = user.connections.len() as i64;

        let score = weighted_score(posts, comments, connections, challenges_joined);
        debug!(user_id, score, "engagement score computed");
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_activity_scores_zero() {
        assert_eq!(weighted_score(0, 0, 0, 0), 0.0);
    }

    #[test]
    fn weights_apply_per_activity() {
        // (2*10 + 4*5 + 10*2 + 2*15) / 2 = 45
        assert_eq!(weighted_score(2, 4, 10, 2), 45.0);
    }

    #[test]
    fn score_is_capped_at_100() {
        assert_eq!(weighted_score(1000, 1000, 1000, 1000), 100.0);
    }

    #[test]
    fn score_stays_in_bounds() {
        for posts in [0, 1, 7, 500] {
            for challenges in [0, 3, 90] {
                let score = weighted_score(posts, posts * 2, posts, challenges);
                assert!((0.0..=100.0).contains(&score));
            }
        }
    }
}
