//! Subscription-tier feature gating
//!
//! A static per-tier table maps feature keys to a limit: a boolean gate,
//! an integer daily/total cap, or the "unlimited" sentinel. Expiry is
//! checked lazily on every access check; there is no background sweep.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use bson::{doc, DateTime};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::db::schemas::{
    SubscriptionTier, UsageEventDoc, UserDoc, CHALLENGE_COLLECTION, USAGE_EVENT_COLLECTION,
    USER_COLLECTION,
};
use crate::db::schemas::ChallengeDoc;
use crate::db::MongoClient;
use crate::types::{LumenError, Result};

/// Limit attached to a feature for one tier
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum FeatureLimit {
    /// Feature is simply on or off for the tier
    Gate(bool),
    /// Metered feature with a cap
    Count(i64),
    /// The "unlimited" sentinel
    Sentinel(String),
}

impl FeatureLimit {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, FeatureLimit::Sentinel(s) if s == "unlimited")
    }
}

/// Per-tier feature limit table
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FeatureAccessTable {
    tiers: HashMap<SubscriptionTier, HashMap<String, FeatureLimit>>,
}

impl FeatureAccessTable {
    /// The built-in table
    pub fn builtin() -> Self {
        use FeatureLimit::{Count, Gate};
        let unlimited = || FeatureLimit::Sentinel("unlimited".to_string());

        let free: HashMap<String, FeatureLimit> = [
            ("daily_ai_interactions", Count(10)),
            ("journey_steps", Count(4)),
            ("challenge_participation", Count(3)),
            ("social_connections", Count(50)),
            ("personality_modes", Count(2)),
            ("advanced_insights", Gate(false)),
            ("premium_challenges", Gate(false)),
            ("custom_avatars", Gate(false)),
            ("vr_spaces", Gate(false)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let pro: HashMap<String, FeatureLimit> = [
            ("daily_ai_interactions", Count(100)),
            ("journey_steps", unlimited()),
            ("challenge_participation", unlimited()),
            ("social_connections", Count(500)),
            ("personality_modes", unlimited()),
            ("advanced_insights", Gate(true)),
            ("premium_challenges", Gate(true)),
            ("custom_avatars", Gate(true)),
            ("vr_spaces", Count(3)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let elite: HashMap<String, FeatureLimit> = [
            ("daily_ai_interactions", unlimited()),
            ("journey_steps", unlimited()),
            ("challenge_participation", unlimited()),
            ("social_connections", unlimited()),
            ("personality_modes", unlimited()),
            ("advanced_insights", Gate(true)),
            ("premium_challenges", Gate(true)),
            ("custom_avatars", Gate(true)),
            ("vr_spaces", unlimited()),
            ("priority_support", Gate(true)),
            ("api_access", Gate(true)),
            ("white_label", Gate(true)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let mut tiers = HashMap::new();
        tiers.insert(SubscriptionTier::Free, free);
        tiers.insert(SubscriptionTier::Pro, pro);
        tiers.insert(SubscriptionTier::Elite, elite);
        Self { tiers }
    }

    /// Load a table from a JSON file, e.g. for staging overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let tiers: HashMap<SubscriptionTier, HashMap<String, FeatureLimit>> =
            serde_json::from_str(&raw)
                .map_err(|e| LumenError::invalid_input(format!("feature table: {}", e)))?;
        for tier in SubscriptionTier::all() {
            if !tiers.contains_key(&tier) {
                return Err(LumenError::invalid_input(format!(
                    "feature table missing tier '{}'",
                    tier
                )));
            }
        }
        Ok(Self { tiers })
    }

    pub fn limit(&self, tier: SubscriptionTier, feature: &str) -> Option<&FeatureLimit> {
        self.tiers.get(&tier).and_then(|m| m.get(feature))
    }
}

/// Result of an access check
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    pub access: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<FeatureLimit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_required: Option<bool>,
}

impl AccessDecision {
    fn granted(limit: FeatureLimit) -> Self {
        Self {
            access: true,
            limit: Some(limit),
            usage: None,
            remaining: None,
            reason: None,
            upgrade_required: None,
        }
    }

    fn denied(reason: &str, upgrade_required: bool) -> Self {
        Self {
            access: false,
            limit: None,
            usage: None,
            remaining: None,
            reason: Some(reason.to_string()),
            upgrade_required: upgrade_required.then_some(true),
        }
    }

    fn metered(cap: i64, used: i64) -> Self {
        Self {
            access: used < cap,
            limit: Some(FeatureLimit::Count(cap)),
            usage: Some(used),
            remaining: Some((cap - used).max(0)),
            reason: None,
            upgrade_required: None,
        }
    }
}

/// Source of current usage counts for metered features
#[async_trait]
pub trait UsageSource: Send + Sync {
    async fn usage(&self, user: &UserDoc, feature: &str) -> Result<i64>;
}

/// Counts usage out of MongoDB: usage events since midnight for daily
/// features, challenge participations since midnight, connection-list
/// length for the connection cap. Unknown features count 0.
pub struct MongoUsageSource {
    mongo: MongoClient,
}

impl MongoUsageSource {
    pub fn new(mongo: MongoClient) -> Self {
        Self { mongo }
    }
}

/// Midnight UTC of the current day as a BSON timestamp
fn start_of_today() -> DateTime {
    let now = Utc::now().date_naive();
    let midnight = Utc
        .from_utc_datetime(&now.and_hms_opt(0, 0, 0).unwrap_or_default());
    DateTime::from_millis(midnight.timestamp_millis())
}

#[async_trait]
impl UsageSource for MongoUsageSource {
    async fn usage(&self, user: &UserDoc, feature: &str) -> Result<i64> {
        match feature {
            "challenge_participation" => {
                let challenges = self
                    .mongo
                    .collection::<ChallengeDoc>(CHALLENGE_COLLECTION)
                    .await?;
                let count = challenges
                    .count(doc! {
                        "participants": &user.id,
                        "start_date": { "$gte": start_of_today() },
                    })
                    .await?;
                Ok(count as i64)
            }
            "social_connections" => Ok(user.connections.len() as i64),
            _ => {
                let events = self
                    .mongo
                    .collection::<UsageEventDoc>(USAGE_EVENT_COLLECTION)
                    .await?;
                let count = events
                    .count(doc! {
                        "user_id": &user.id,
                        "feature": feature,
                        "occurred_at": { "$gte": start_of_today() },
                    })
                    .await?;
                Ok(count as i64)
            }
        }
    }
}

/// Gates feature use by subscription tier and current usage
pub struct AccessService {
    mongo: MongoClient,
    table: FeatureAccessTable,
    usage: Box<dyn UsageSource>,
}

impl AccessService {
    pub fn new(mongo: MongoClient, table: FeatureAccessTable, usage: Box<dyn UsageSource>) -> Self {
        Self {
            mongo,
            table,
            usage,
        }
    }

    /// Decide whether a user may use a feature right now.
    ///
    /// Expired paid tiers are downgraded to free before the table lookup,
    /// so a stale subscription can never grant access.
    pub async fn check_feature_access(
        &self,
        user_id: &str,
        feature: &str,
    ) -> Result<AccessDecision> {
        let users = self.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
        let mut user = users
            .find_one(doc! { "id": user_id })
            .await?
            .ok_or_else(|| LumenError::not_found(format!("user {}", user_id)))?;

        if let Some(expires) = user.subscription_expires {
            if user.subscription_tier != SubscriptionTier::Free && expires < DateTime::now() {
                info!(
                    user_id,
                    tier = %user.subscription_tier,
                    "subscription expired, downgrading to free"
                );
                users
                    .update_one(
                        doc! { "id": user_id },
                        doc! {
                            "$set": {
                                "subscription_tier": SubscriptionTier::Free.as_str(),
                                "metadata.updated_at": DateTime::now(),
                            },
                            "$unset": { "subscription_expires": "" },
                        },
                    )
                    .await?;
                user.subscription_tier = SubscriptionTier::Free;
                user.subscription_expires = None;
            }
        }

        let limit = match self.table.limit(user.subscription_tier, feature) {
            None => return Ok(AccessDecision::denied("Feature not defined", false)),
            Some(limit) => limit.clone(),
        };

        let decision = match limit {
            FeatureLimit::Gate(false) => AccessDecision::denied(
                &format!("Feature requires {} or higher", SubscriptionTier::Pro),
                true,
            ),
            FeatureLimit::Gate(true) => AccessDecision::granted(FeatureLimit::Gate(true)),
            FeatureLimit::Count(cap) => {
                let used = self.usage.usage(&user, feature).await?;
                AccessDecision::metered(cap, used)
            }
            FeatureLimit::Sentinel(s) if s == "unlimited" => {
                AccessDecision::granted(FeatureLimit::Sentinel(s))
            }
            // Any other string in a loaded table is a config mistake
            FeatureLimit::Sentinel(s) => {
                AccessDecision::denied(&format!("Feature misconfigured: '{}'", s), false)
            }
        };

        debug!(user_id, feature, access = decision.access, "access check");
        Ok(decision)
    }

    /// Record one use of a metered feature
    pub async fn record_usage(&self, user_id: &str, feature: &str) -> Result<()> {
        let users = self.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
        if users.find_one(doc! { "id": user_id }).await?.is_none() {
            return Err(LumenError::not_found(format!("user {}", user_id)));
        }

        let events = self
            .mongo
            .collection::<UsageEventDoc>(USAGE_EVENT_COLLECTION)
            .await?;
        events.insert_one(UsageEventDoc::new(user_id, feature)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_matches_tier_matrix() {
        let table = FeatureAccessTable::builtin();
        assert_eq!(
            table.limit(SubscriptionTier::Free, "daily_ai_interactions"),
            Some(&FeatureLimit::Count(10))
        );
        assert_eq!(
            table.limit(SubscriptionTier::Free, "vr_spaces"),
            Some(&FeatureLimit::Gate(false))
        );
        assert_eq!(
            table.limit(SubscriptionTier::Pro, "vr_spaces"),
            Some(&FeatureLimit::Count(3))
        );
        assert!(table
            .limit(SubscriptionTier::Elite, "daily_ai_interactions")
            .map(FeatureLimit::is_unlimited)
            .unwrap_or(false));
        assert_eq!(table.limit(SubscriptionTier::Free, "api_access"), None);
    }

    #[test]
    fn limit_deserializes_all_three_shapes() {
        let limits: HashMap<String, FeatureLimit> = serde_json::from_str(
            r#"{ "a": true, "b": 25, "c": "unlimited" }"#,
        )
        .unwrap();
        assert_eq!(limits["a"], FeatureLimit::Gate(true));
        assert_eq!(limits["b"], FeatureLimit::Count(25));
        assert!(limits["c"].is_unlimited());
    }

    #[test]
    fn decision_serializes_camel_case_and_skips_absent_fields() {
        let decision = AccessDecision::denied("Feature requires pro or higher", true);
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["access"], false);
        assert_eq!(json["upgradeRequired"], true);
        assert!(json.get("usage").is_none());

        let granted = AccessDecision::granted(FeatureLimit::Sentinel("unlimited".into()));
        let json = serde_json::to_value(&granted).unwrap();
        assert_eq!(json["limit"], "unlimited");
        assert!(json.get("reason").is_none());
    }

    struct FixedUsage(i64);

    #[async_trait]
    impl UsageSource for FixedUsage {
        async fn usage(&self, _user: &UserDoc, _feature: &str) -> Result<i64> {
            Ok(self.0)
        }
    }

    #[test]
    fn usage_source_dispatches_through_trait_object() {
        let source: Box<dyn UsageSource> = Box::new(FixedUsage(7));
        let user = UserDoc::default();
        let used =
            tokio_test::block_on(source.usage(&user, "daily_ai_interactions")).unwrap();
        assert_eq!(used, 7);
    }

    #[test]
    fn exhausted_count_reports_zero_remaining() {
        let decision = AccessDecision::metered(10, 10);
        assert!(!decision.access);
        assert_eq!(decision.usage, Some(10));
        assert_eq!(decision.remaining, Some(0));

        let decision = AccessDecision::metered(10, 3);
        assert!(decision.access);
        assert_eq!(decision.remaining, Some(7));

        // Over-cap usage never reports negative remaining
        let decision = AccessDecision::metered(3, 5);
        assert!(!decision.access);
        assert_eq!(decision.remaining, Some(0));
    }
}
