//! Challenge document schema
//!
//! Rewards are fixed at creation time: base rewards scaled by the
//! difficulty multiplier. A user must appear in `participants` before
//! they may appear in `completed_by`.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for challenges
pub const CHALLENGE_COLLECTION: &str = "challenges";

/// Base XP reward before the difficulty multiplier
pub const BASE_REWARD_XP: i64 = 50;
/// Base credit reward before the difficulty multiplier
pub const BASE_REWARD_CREDITS: i64 = 10;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
    Extreme,
}

impl Difficulty {
    /// Reward multiplier, fixed at challenge creation
    pub fn multiplier(&self) -> i64 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
            Difficulty::Extreme => 5,
        }
    }
}

/// Challenge document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChallengeDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// External challenge identifier (UUID string)
    pub id: String,

    pub title: String,

    pub description: String,

    pub category: String,

    pub difficulty: Difficulty,

    pub creator_id: String,

    /// Users who joined the challenge
    #[serde(default)]
    pub participants: Vec<String>,

    /// Users who finished it; always a subset of `participants`
    #[serde(default)]
    pub completed_by: Vec<String>,

    /// XP paid on completion, fixed at creation
    pub reward_xp: i64,

    /// Credits paid on completion, fixed at creation
    pub reward_credits: i64,

    pub start_date: DateTime,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ChallengeDoc {
    fn default() -> Self {
        Self::new(
            "",
            String::new(),
            String::new(),
            String::new(),
            Difficulty::Easy,
        )
    }
}

impl ChallengeDoc {
    /// Create a challenge with rewards scaled by difficulty
    pub fn new(
        creator_id: &str,
        title: String,
        description: String,
        category: String,
        difficulty: Difficulty,
    ) -> Self {
        let multiplier = difficulty.multiplier();
        Self {
            _id: None,
            metadata: Metadata::new(),
            id: Uuid::new_v4().to_string(),
            title,
            description,
            category,
            difficulty,
            creator_id: creator_id.to_string(),
            participants: Vec::new(),
            completed_by: Vec::new(),
            reward_xp: BASE_REWARD_XP * multiplier,
            reward_credits: BASE_REWARD_CREDITS * multiplier,
            start_date: DateTime::now(),
            end_date: None,
            is_active: true,
        }
    }
}

impl IntoIndexes for ChallengeDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("id_unique".to_string())
                        .build(),
                ),
            ),
            // Usage counting: participations since midnight
            (
                doc! { "participants": 1, "start_date": 1 },
                Some(
                    IndexOptions::builder()
                        .name("participant_start_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ChallengeDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplier_table() {
        assert_eq!(Difficulty::Easy.multiplier(), 1);
        assert_eq!(Difficulty::Medium.multiplier(), 2);
        assert_eq!(Difficulty::Hard.multiplier(), 3);
        assert_eq!(Difficulty::Extreme.multiplier(), 5);
    }

    #[test]
    fn rewards_scaled_at_creation() {
        let challenge = ChallengeDoc::new(
            "user-1",
            "Cold showers".into(),
            "A week of them".into(),
            "discipline".into(),
            Difficulty::Hard,
        );
        assert_eq!(challenge.reward_xp, 150);
        assert_eq!(challenge.reward_credits, 30);
        assert!(challenge.is_active);
        assert!(challenge.participants.is_empty());
    }
}
