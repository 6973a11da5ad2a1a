//! Usage event schema
//!
//! One record per metered feature use. Daily quotas are enforced by
//! counting events since local midnight UTC, so the compound index
//! below is on the hot path of every access check.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for usage events
pub const USAGE_EVENT_COLLECTION: &str = "usage_events";

/// Usage event stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UsageEventDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// External event identifier (UUID string)
    pub id: String,

    pub user_id: String,

    /// Feature key, e.g. "ai_conversations_per_day"
    pub feature: String,

    pub occurred_at: DateTime,
}

impl Default for UsageEventDoc {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl UsageEventDoc {
    pub fn new(user_id: &str, feature: &str) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            feature: feature.to_string(),
            occurred_at: DateTime::now(),
        }
    }
}

impl IntoIndexes for UsageEventDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "user_id": 1, "feature": 1, "occurred_at": -1 },
            Some(
                IndexOptions::builder()
                    .name("user_feature_time_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for UsageEventDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
