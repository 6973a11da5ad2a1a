//! Transaction document schema
//!
//! Immutable ledger records. A transaction is written once and only its
//! `status` field ever changes afterwards (pending -> completed/failed,
//! or completed -> refunded). Debits are written in `pending` state
//! before the balance mutation so an interrupted debit can be recovered
//! by scanning for stale pendings.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for transactions
pub const TRANSACTION_COLLECTION: &str = "transactions";

/// What a transaction pays for. The unit of `amount` follows the kind:
/// credits for credit movements, cents for subscription charges.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    #[default]
    Credits,
    Subscription,
    PremiumFeature,
    ChallengeReward,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Refunded => "refunded",
        }
    }
}

/// Transaction document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct TransactionDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// External transaction identifier (UUID string)
    pub id: String,

    pub user_id: String,

    pub kind: TransactionKind,

    /// Signed amount; negative for debits
    pub amount: i64,

    pub status: TransactionStatus,

    /// Kind-specific detail (feature id, credits purchased, tier, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Document>,
}

impl TransactionDoc {
    fn new(
        user_id: &str,
        kind: TransactionKind,
        amount: i64,
        status: TransactionStatus,
        detail: Option<Document>,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind,
            amount,
            status,
            detail,
        }
    }

    /// A debit intent, durable before the balance mutation
    pub fn pending(user_id: &str, kind: TransactionKind, amount: i64, detail: Option<Document>) -> Self {
        Self::new(user_id, kind, amount, TransactionStatus::Pending, detail)
    }

    /// A transaction that completed in one step (credits, free activations)
    pub fn completed(user_id: &str, kind: TransactionKind, amount: i64, detail: Option<Document>) -> Self {
        Self::new(user_id, kind, amount, TransactionStatus::Completed, detail)
    }
}

impl IntoIndexes for TransactionDoc {
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
            // History queries: per-user, newest first
            (
                doc! { "user_id": 1, "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("user_created_index".to_string())
                        .build(),
                ),
            ),
            // Recovery scan for stale pending debits
            (
                doc! { "status": 1, "metadata.created_at": 1 },
                Some(
                    IndexOptions::builder()
                        .name("status_created_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for TransactionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
