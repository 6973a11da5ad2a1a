//! Shared immersive space schema
//!
//! Spaces are instantiated from a fixed environment catalog. Spawn
//! positions are computed from the participant index, not stored.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for spaces
pub const SPACE_COLLECTION: &str = "spaces";

/// Default participant cap for a new space
pub const DEFAULT_MAX_PARTICIPANTS: i64 = 10;

/// Space document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SpaceDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// External space identifier (UUID string)
    pub id: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub creator_id: String,

    /// One of the catalog environment keys
    pub environment_type: String,

    #[serde(default = "default_max_participants")]
    pub max_participants: i64,

    /// Currently present user ids, in join order
    #[serde(default)]
    pub participants: Vec<String>,

    #[serde(default = "default_true")]
    pub is_public: bool,
}

fn default_max_participants() -> i64 {
    DEFAULT_MAX_PARTICIPANTS
}

fn default_true() -> bool {
    true
}

impl SpaceDoc {
    pub fn new(
        creator_id: &str,
        name: String,
        description: Option<String>,
        environment_type: String,
        is_public: bool,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            id: Uuid::new_v4().to_string(),
            name,
            description,
            creator_id: creator_id.to_string(),
            environment_type,
            max_participants: DEFAULT_MAX_PARTICIPANTS,
            participants: Vec::new(),
            is_public,
        }
    }
}

impl IntoIndexes for SpaceDoc {
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
                doc! { "is_public": 1 },
                Some(
                    IndexOptions::builder()
                        .name("public_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for SpaceDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
