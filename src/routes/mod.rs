//! HTTP routes for Lumen

pub mod analytics;
pub mod gamification;
pub mod health;
pub mod monetization;
pub mod respond;
pub mod social;
pub mod spaces;
pub mod users;

pub use analytics::platform_summary;
pub use gamification::{
    award_experience, check_access, engagement_score, purchase_credits, record_usage,
    spend_credits, transaction_history, user_stats,
};
pub use health::{health_check, readiness_check, version_info};
pub use monetization::{cancel_subscription, revenue_summary, subscribe, unlock_feature};
pub use social::{
    accept_connection, complete_challenge, create_challenge, create_comment, create_post,
    get_feed, join_challenge, leaderboard, request_connection, toggle_like,
};
pub use spaces::{create_space, join_space, leave_space, list_spaces, space_templates};
pub use users::{create_user, delete_user, get_user, update_user};
