//! Connection request document schema

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for connections
pub const CONNECTION_COLLECTION: &str = "connections";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Pending,
    Accepted,
    Blocked,
}

/// Connection request between two users
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ConnectionDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// External connection identifier (UUID string)
    pub id: String,

    pub requester_id: String,

    pub target_id: String,

    pub status: ConnectionStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConnectionDoc {
    pub fn new(requester_id: &str, target_id: &str, message: Option<String>) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            id: Uuid::new_v4().to_string(),
            requester_id: requester_id.to_string(),
            target_id: target_id.to_string(),
            status: ConnectionStatus::Pending,
            accepted_at: None,
            message,
        }
    }
}

impl IntoIndexes for ConnectionDoc {
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
                doc! { "requester_id": 1, "target_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("pair_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ConnectionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
