//! Social graph, content, and challenges
//!
//! Posts, comments, and likes pay XP through the progression service;
//! challenge completion also pays credits through the ledger. Feed reads
//! use timestamp cursor pagination over the author index.

use bson::{doc, DateTime};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::db::schemas::{
    ChallengeDoc, CommentDoc, ConnectionDoc, ConnectionStatus, Difficulty, PostDoc,
    TransactionKind, UserDoc, CHALLENGE_COLLECTION, COMMENT_COLLECTION, CONNECTION_COLLECTION,
    POST_COLLECTION, USER_COLLECTION,
};
use crate::db::MongoClient;
use crate::services::ledger::LedgerService;
use crate::services::progression::{AwardResult, ProgressionService};
use crate::types::{LumenError, Result};

/// XP paid for creating a post
pub const POST_XP: i64 = 10;
/// XP paid for creating a comment
pub const COMMENT_XP: i64 = 15;
/// XP paid to the post owner when their post is liked
pub const LIKE_XP: i64 = 5;
/// XP paid for creating a challenge
pub const CHALLENGE_CREATE_XP: i64 = 25;

/// A feed entry: the post plus engagement counts relative to the viewer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPost {
    #[serde(flatten)]
    pub post: PostDoc,
    pub like_count: usize,
    pub comment_count: usize,
    pub user_liked: bool,
}

/// One page of the personalized feed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialFeed {
    pub posts: Vec<FeedPost>,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Per-user activity aggregate
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub level: i64,
    pub experience_points: i64,
    pub credits: i64,
    pub connections_count: usize,
    pub followers_count: usize,
    pub following_count: usize,
    pub posts_count: u64,
    pub comments_count: u64,
    pub challenges_completed: u64,
    pub achievements_count: usize,
    pub streak_days: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub score: i64,
    pub level: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub category: String,
    pub entries: Vec<LeaderboardEntry>,
}

/// Outcome of completing a challenge
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeCompletion {
    pub reward_xp: i64,
    pub reward_credits: i64,
    pub award: AwardResult,
    pub new_balance: i64,
}

#[derive(Clone)]
pub struct SocialService {
    mongo: MongoClient,
    progression: ProgressionService,
    ledger: LedgerService,
}

impl SocialService {
    pub fn new(mongo: MongoClient, progression: ProgressionService, ledger: LedgerService) -> Self {
        Self {
            mongo,
            progression,
            ledger,
        }
    }

    async fn require_user(&self, user_id: &str) -> Result<UserDoc> {
        let users = self.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
        users
            .find_one(doc! { "id": user_id })
            .await?
            .ok_or_else(|| LumenError::not_found(format!("user {}", user_id)))
    }

    pub async fn create_post(
        &self,
        user_id: &str,
        content: String,
        content_type: String,
        tags: Vec<String>,
    ) -> Result<PostDoc> {
        if content.trim().is_empty() {
            return Err(LumenError::invalid_input("post content is empty"));
        }
        self.require_user(user_id).await?;

        let posts = self.mongo.collection::<PostDoc>(POST_COLLECTION).await?;
        let post = PostDoc::new(user_id, content, content_type, tags);
        posts.insert_one(post.clone()).await?;

        self.progression
            .award_experience(user_id, POST_XP, "post_created")
            .await?;

        debug!(user_id, post_id = %post.id, "post created");
        Ok(post)
    }

    pub async fn create_comment(
        &self,
        user_id: &str,
        post_id: &str,
        content: String,
    ) -> Result<CommentDoc> {
        if content.trim().is_empty() {
            return Err(LumenError::invalid_input("comment content is empty"));
        }
        self.require_user(user_id).await?;

        let posts = self.mongo.collection::<PostDoc>(POST_COLLECTION).await?;
        if posts.find_one(doc! { "id": post_id }).await?.is_none() {
            return Err(LumenError::not_found(format!("post {}", post_id)));
        }

        let comments = self
            .mongo
            .collection::<CommentDoc>(COMMENT_COLLECTION)
            .await?;
        let comment = CommentDoc::new(post_id, user_id, content);
        comments.insert_one(comment.clone()).await?;

        posts
            .update_one(
                doc! { "id": post_id },
                doc! {
                    "$push": { "comments": &comment.id },
                    "$set": { "metadata.updated_at": DateTime::now() },
                },
            )
            .await?;

        self.progression
            .award_experience(user_id, COMMENT_XP, "comment_created")
            .await?;

        Ok(comment)
    }

    /// Like a post, or withdraw the like if already present. Returns
    /// `true` when the post ends up liked. XP goes to the post owner on
    /// like only, and never for liking your own post twice over.
    pub async fn toggle_like(&self, user_id: &str, post_id: &str) -> Result<bool> {
        self.require_user(user_id).await?;

        let posts = self.mongo.collection::<PostDoc>(POST_COLLECTION).await?;
        let post = posts
            .find_one(doc! { "id": post_id })
            .await?
            .ok_or_else(|| LumenError::not_found(format!("post {}", post_id)))?;

        let already_liked = post.likes.iter().any(|id| id == user_id);
        let update = if already_liked {
            doc! { "$pull": { "likes": user_id } }
        } else {
            doc! { "$addToSet": { "likes": user_id } }
        };
        posts.update_one(doc! { "id": post_id }, update).await?;

        if !already_liked && post.user_id != user_id {
            self.progression
                .award_experience(&post.user_id, LIKE_XP, "post_liked")
                .await?;
        }

        Ok(!already_liked)
    }

    /// Personalized feed: posts from the viewer, their connections, and
    /// who they follow, newest first. `cursor` is the RFC 3339 creation
    /// time of the last post of the previous page.
    pub async fn get_feed(
        &self,
        user_id: &str,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<SocialFeed> {
        let user = self.require_user(user_id).await?;

        let mut author_ids: Vec<String> = user.connections.clone();
        author_ids.extend(user.following.iter().cloned());
        author_ids.push(user.id.clone());

        let mut filter = doc! {
            "user_id": { "$in": author_ids },
            "visibility": { "$in": ["public", "friends"] },
        };
        if let Some(cursor) = cursor {
            let ts = chrono::DateTime::parse_from_rfc3339(cursor)
                .map_err(|_| LumenError::invalid_input("malformed feed cursor"))?;
            filter.insert(
                "metadata.created_at",
                doc! { "$lt": DateTime::from_millis(ts.timestamp_millis()) },
            );
        }

        let posts = self.mongo.collection::<PostDoc>(POST_COLLECTION).await?;
        // One extra row tells us whether another page exists
        let mut page = posts
            .find_with_options(
                filter,
                Some(doc! { "metadata.created_at": -1 }),
                Some(limit + 1),
            )
            .await?;

        let has_more = page.len() as i64 > limit;
        if has_more {
            page.truncate(limit as usize);
        }

        let next_cursor = if has_more {
            page.last()
                .and_then(|p| p.metadata.created_at)
                .map(|ts| {
                    chrono::DateTime::<Utc>::from_timestamp_millis(ts.timestamp_millis())
                        .unwrap_or_default()
                        .to_rfc3339()
                })
        } else {
            None
        };

        let posts = page
            .into_iter()
            .map(|post| FeedPost {
                like_count: post.likes.len(),
                comment_count: post.comments.len(),
                user_liked: post.likes.iter().any(|id| id == user_id),
                post,
            })
            .collect();

        Ok(SocialFeed {
            posts,
            has_more,
            next_cursor,
        })
    }

    pub async fn send_connection_request(
        &self,
        requester_id: &str,
        target_id: &str,
        message: Option<String>,
    ) -> Result<ConnectionDoc> {
        if requester_id == target_id {
            return Err(LumenError::invalid_input("cannot connect to yourself"));
        }
        self.require_user(requester_id).await?;
        self.require_user(target_id).await?;

        let connections = self
            .mongo
            .collection::<ConnectionDoc>(CONNECTION_COLLECTION)
            .await?;

        // A pending or accepted request in either direction blocks a new one
        let existing = connections
            .find_one(doc! {
                "$or": [
                    { "requester_id": requester_id, "target_id": target_id },
                    { "requester_id": target_id, "target_id": requester_id },
                ],
                "status": { "$in": ["pending", "accepted"] },
            })
            .await?;
        if existing.is_some() {
            return Err(LumenError::conflict("connection request already exists"));
        }

        let request = ConnectionDoc::new(requester_id, target_id, message);
        connections.insert_one(request.clone()).await?;
        info!(requester_id, target_id, "connection requested");
        Ok(request)
    }

    /// Accept a pending request, linking both users
    pub async fn accept_connection(&self, connection_id: &str) -> Result<ConnectionDoc> {
        let connections = self
            .mongo
            .collection::<ConnectionDoc>(CONNECTION_COLLECTION)
            .await?;
        let mut request = connections
            .find_one(doc! { "id": connection_id })
            .await?
            .ok_or_else(|| LumenError::not_found(format!("connection {}", connection_id)))?;

        if request.status != ConnectionStatus::Pending {
            return Err(LumenError::conflict("connection request is not pending"));
        }

        let now = DateTime::now();
        connections
            .update_one(
                doc! { "id": connection_id },
                doc! {
                    "$set": {
                        "status": "accepted",
                        "accepted_at": now,
                        "metadata.updated_at": now,
                    }
                },
            )
            .await?;

        let users = self.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
        users
            .update_one(
                doc! { "id": &request.requester_id },
                doc! { "$addToSet": { "connections": &request.target_id } },
            )
            .await?;
        users
            .update_one(
                doc! { "id": &request.target_id },
                doc! { "$addToSet": { "connections": &request.requester_id } },
            )
            .await?;

        request.status = ConnectionStatus::Accepted;
        request.accepted_at = Some(now);
        Ok(request)
    }

    pub async fn create_challenge(
        &self,
        creator_id: &str,
        title: String,
        description: String,
        category: String,
        difficulty: Difficulty,
    ) -> Result<ChallengeDoc> {
        if title.trim().is_empty() {
            return Err(LumenError::invalid_input("challenge title is empty"));
        }
        self.require_user(creator_id).await?;

        let challenges = self
            .mongo
            .collection::<ChallengeDoc>(CHALLENGE_COLLECTION)
            .await?;
        let challenge = ChallengeDoc::new(creator_id, title, description, category, difficulty);
        challenges.insert_one(challenge.clone()).await?;

        self.progression
            .award_experience(creator_id, CHALLENGE_CREATE_XP, "challenge_created")
            .await?;

        info!(creator_id, challenge_id = %challenge.id, "challenge created");
        Ok(challenge)
    }

    pub async fn join_challenge(&self, user_id: &str, challenge_id: &str) -> Result<()> {
        self.require_user(user_id).await?;

        let challenges = self
            .mongo
            .collection::<ChallengeDoc>(CHALLENGE_COLLECTION)
            .await?;
        let challenge = challenges
            .find_one(doc! { "id": challenge_id })
            .await?
            .ok_or_else(|| LumenError::not_found(format!("challenge {}", challenge_id)))?;

        if !challenge.is_active {
            return Err(LumenError::conflict("challenge is no longer active"));
        }
        if challenge.participants.iter().any(|id| id == user_id) {
            return Err(LumenError::conflict("already joined this challenge"));
        }

        challenges
            .update_one(
                doc! { "id": challenge_id },
                doc! {
                    "$addToSet": { "participants": user_id },
                    "$set": { "metadata.updated_at": DateTime::now() },
                },
            )
            .await?;
        Ok(())
    }

    /// Complete a joined challenge, paying its rewards once
    pub async fn complete_challenge(
        &self,
        user_id: &str,
        challenge_id: &str,
    ) -> Result<ChallengeCompletion> {
        self.require_user(user_id).await?;

        let challenges = self
            .mongo
            .collection::<ChallengeDoc>(CHALLENGE_COLLECTION)
            .await?;
        let challenge = challenges
            .find_one(doc! { "id": challenge_id })
            .await?
            .ok_or_else(|| LumenError::not_found(format!("challenge {}", challenge_id)))?;

        if !challenge.participants.iter().any(|id| id == user_id) {
            return Err(LumenError::conflict("not a participant of this challenge"));
        }
        if challenge.completed_by.iter().any(|id| id == user_id) {
            return Err(LumenError::conflict("challenge already completed"));
        }

        // Guard against double payout: the update only matches while the
        // user is absent from completed_by.
        let result = challenges
            .update_one(
                doc! { "id": challenge_id, "completed_by": { "$ne": user_id } },
                doc! {
                    "$addToSet": { "completed_by": user_id },
                    "$set": { "metadata.updated_at": DateTime::now() },
                },
            )
            .await?;
        if result.matched_count == 0 {
            return Err(LumenError::conflict("challenge already completed"));
        }

        let award = self
            .progression
            .award_experience(user_id, challenge.reward_xp, "challenge_completed")
            .await?;
        let new_balance = self
            .ledger
            .credit_balance(
                user_id,
                challenge.reward_credits,
                TransactionKind::ChallengeReward,
                Some(doc! { "challenge_id": challenge_id }),
            )
            .await?;

        info!(user_id, challenge_id, "challenge completed");
        Ok(ChallengeCompletion {
            reward_xp: challenge.reward_xp,
            reward_credits: challenge.reward_credits,
            award,
            new_balance,
        })
    }

    /// Ranked listing of public profiles by xp, level, or streak
    pub async fn leaderboard(&self, category: &str, limit: i64) -> Result<Leaderboard> {
        let sort_field = match category {
            "level" => "level",
            "streak" => "streak_days",
            _ => "experience_points",
        };

        let users = self.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
        let ranked = users
            .find_with_options(
                doc! { "profile_visibility": "public" },
                Some(doc! { sort_field: -1 }),
                Some(limit),
            )
            .await?;

        let entries = ranked
            .into_iter()
            .enumerate()
            .map(|(i, user)| LeaderboardEntry {
                rank: i + 1,
                score: match sort_field {
                    "level" => user.level,
                    "streak_days" => user.streak_days,
                    _ => user.experience_points,
                },
                level: user.level,
                user_id: user.id,
                username: user.username,
                display_name: user.display_name,
                avatar_url: user.avatar_url,
            })
            .collect();

        Ok(Leaderboard {
            category: category.to_string(),
            entries,
        })
    }

    pub async fn user_stats(&self, user_id: &str) -> Result<UserStats> {
        let user = self.require_user(user_id).await?;

        let posts_count = self
            .mongo
            .collection::<PostDoc>(POST_COLLECTION)
            .await?
            .count(doc! { "user_id": user_id })
            .await?;
        let comments_count = self
            .mongo
            .collection::<CommentDoc>(COMMENT_COLLECTION)
            .await?
            .count(doc! { "user_id": user_id })
            .await?;
        let challenges_completed = self
            .mongo
            .collection::<ChallengeDoc>(CHALLENGE_COLLECTION)
            .await?
            .count(doc! { "completed_by": user_id })
            .await?;

        Ok(UserStats {
            level: user.level,
            experience_points: user.experience_points,
            credits: user.credits,
            connections_count: user.connections.len(),
            followers_count: user.followers.len(),
            following_count: user.following.len(),
            posts_count,
            comments_count,
            challenges_completed,
            achievements_count: user.achievements.len(),
            streak_days: user.streak_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_post_exposes_engagement_counts() {
        let mut post = PostDoc::new("author", "hello".into(), "text".into(), vec![]);
        post.likes = vec!["a".into(), "b".into()];
        post.comments = vec!["c-1".into()];

        let entry = FeedPost {
            like_count: post.likes.len(),
            comment_count: post.comments.len(),
            user_liked: post.likes.iter().any(|id| id == "b"),
            post,
        };
        assert_eq!(entry.like_count, 2);
        assert_eq!(entry.comment_count, 1);
        assert!(entry.user_liked);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["likeCount"], 2);
        assert_eq!(json["userLiked"], true);
    }

    #[test]
    fn empty_feed_page_has_no_cursor() {
        let feed = SocialFeed {
            posts: vec![],
            has_more: false,
            next_cursor: None,
        };
        let json = serde_json::to_value(&feed).unwrap();
        assert_eq!(json["hasMore"], false);
        assert!(json.get("nextCursor").is_none());
    }
}
