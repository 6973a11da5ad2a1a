//! Subscription record schema
//!
//! One record per subscription activation. The authoritative tier for
//! gating lives on the user document; these records are the billing
//! history behind it.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{Metadata, SubscriptionTier};

/// Collection name for subscriptions
pub const SUBSCRIPTION_COLLECTION: &str = "subscriptions";

/// Subscription record stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SubscriptionDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// External subscription identifier (UUID string)
    pub id: String,

    pub user_id: String,

    pub tier: SubscriptionTier,

    /// Price charged, in cents
    pub price_cents: i64,

    pub start_date: DateTime,

    pub end_date: DateTime,

    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default = "default_true")]
    pub auto_renew: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SubscriptionDoc {
    fn default() -> Self {
        let now = DateTime::now();
        Self::new("", SubscriptionTier::Free, 0, now, now)
    }
}

impl SubscriptionDoc {
    /// A new active subscription covering `[start, end]`
    pub fn new(
        user_id: &str,
        tier: SubscriptionTier,
        price_cents: i64,
        start_date: DateTime,
        end_date: DateTime,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            tier,
            price_cents,
            start_date,
            end_date,
            is_active: true,
            auto_renew: true,
        }
    }
}

impl IntoIndexes for SubscriptionDoc {
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
            (
                doc! { "user_id": 1, "is_active": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_active_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for SubscriptionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
