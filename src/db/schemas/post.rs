//! Post and comment document schemas

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for posts
pub const POST_COLLECTION: &str = "posts";
/// Collection name for comments
pub const COMMENT_COLLECTION: &str = "comments";

/// Post document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct PostDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// External post identifier (UUID string)
    pub id: String,

    pub user_id: String,

    pub content: String,

    /// text, journey, achievement, or challenge
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// User ids that liked the post
    #[serde(default)]
    pub likes: Vec<String>,

    /// Comment ids attached to the post
    #[serde(default)]
    pub comments: Vec<String>,

    #[serde(default)]
    pub shares: i64,

    /// public or friends
    #[serde(default = "default_visibility")]
    pub visibility: String,

    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_content_type() -> String {
    "text".to_string()
}

fn default_visibility() -> String {
    "public".to_string()
}

impl PostDoc {
    pub fn new(user_id: &str, content: String, content_type: String, tags: Vec<String>) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            content,
            content_type,
            likes: Vec::new(),
            comments: Vec::new(),
            shares: 0,
            visibility: default_visibility(),
            tags,
        }
    }
}

impl IntoIndexes for PostDoc {
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
            // Feed queries: per-author, newest first
            (
                doc! { "user_id": 1, "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("author_created_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for PostDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Comment document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CommentDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// External comment identifier (UUID string)
    pub id: String,

    pub post_id: String,

    pub user_id: String,

    pub content: String,

    #[serde(default)]
    pub likes: Vec<String>,
}

impl CommentDoc {
    pub fn new(post_id: &str, user_id: &str, content: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            id: Uuid::new_v4().to_string(),
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
            content,
            likes: Vec::new(),
        }
    }
}

impl IntoIndexes for CommentDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "post_id": 1 },
            Some(
                IndexOptions::builder()
                    .name("post_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for CommentDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
