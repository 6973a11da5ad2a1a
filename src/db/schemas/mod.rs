//! Database schemas for Lumen
//!
//! Defines MongoDB document structures for users, transactions,
//! subscriptions, social content, challenges, usage events, and spaces.

mod challenge;
mod connection;
mod metadata;
mod post;
mod space;
mod subscription;
mod transaction;
mod usage_event;
mod user;

pub use challenge::{
    ChallengeDoc, Difficulty, BASE_REWARD_CREDITS, BASE_REWARD_XP, CHALLENGE_COLLECTION,
};
pub use connection::{ConnectionDoc, ConnectionStatus, CONNECTION_COLLECTION};
pub use metadata::Metadata;
pub use post::{CommentDoc, PostDoc, COMMENT_COLLECTION, POST_COLLECTION};
pub use space::{SpaceDoc, DEFAULT_MAX_PARTICIPANTS, SPACE_COLLECTION};
pub use subscription::{SubscriptionDoc, SUBSCRIPTION_COLLECTION};
pub use transaction::{
    TransactionDoc, TransactionKind, TransactionStatus, TRANSACTION_COLLECTION,
};
pub use usage_event::{UsageEventDoc, USAGE_EVENT_COLLECTION};
pub use user::{SubscriptionTier, UserDoc, USER_COLLECTION};
