//! Business logic services
//!
//! Each service owns one concern and talks to MongoDB through the typed
//! collection layer. Services are cheap to clone and shared through the
//! application state.

pub mod access;
pub mod analytics;
pub mod engagement;
pub mod ledger;
pub mod monetization;
pub mod progression;
pub mod social;
pub mod spaces;

pub use access::{AccessDecision, AccessService, FeatureAccessTable, MongoUsageSource, UsageSource};
pub use analytics::AnalyticsService;
pub use engagement::EngagementService;
pub use ledger::{BalanceStore, DebitReceipt, LedgerService, MongoBalanceStore};
pub use monetization::MonetizationService;
pub use progression::{AwardResult, ProgressionService};
pub use social::SocialService;
pub use spaces::SpacesService;
