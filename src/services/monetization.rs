//! Subscriptions, credit purchases, and premium feature unlocks
//!
//! Payment processing is out of scope: paid tiers activate directly with
//! a 30-day expiry and a completed transaction record. Expiry itself is
//! enforced lazily by the access service.

use bson::{doc, DateTime};
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::info;

use crate::db::schemas::{
    SubscriptionDoc, SubscriptionTier, TransactionDoc, TransactionKind, UserDoc,
    SUBSCRIPTION_COLLECTION, TRANSACTION_COLLECTION, USER_COLLECTION,
};
use crate::db::MongoClient;
use crate::services::ledger::LedgerService;
use crate::types::{LumenError, Result};

/// Paid subscription length
pub const SUBSCRIPTION_DAYS: i64 = 30;

/// Monthly price in cents per tier
pub fn tier_price_cents(tier: SubscriptionTier) -> i64 {
    match tier {
        SubscriptionTier::Free => 0,
        SubscriptionTier::Pro => 999,
        SubscriptionTier::Elite => 2999,
    }
}

/// Credit cost of a premium feature, `None` for unknown features
pub fn feature_cost(feature_id: &str) -> Option<i64> {
    match feature_id {
        "custom_avatar" => Some(50),
        "premium_challenge" => Some(25),
        "advanced_insight" => Some(30),
        "vr_space_access" => Some(100),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionReceipt {
    pub subscription_id: String,
    pub tier: SubscriptionTier,
    pub price_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureUnlock {
    pub feature_unlocked: String,
    pub credits_spent: i64,
    pub remaining_credits: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummary {
    pub subscription_distribution: std::collections::HashMap<String, u64>,
    /// Completed subscription revenue over the last 30 days, in cents
    pub monthly_revenue_cents: i64,
    pub monthly_transactions: u64,
    pub total_credits_purchased: i64,
    pub average_transaction_cents: i64,
    pub generated_at: String,
}

#[derive(Clone)]
pub struct MonetizationService {
    mongo: MongoClient,
    ledger: LedgerService,
}

impl MonetizationService {
    pub fn new(mongo: MongoClient, ledger: LedgerService) -> Self {
        Self { mongo, ledger }
    }

    /// Activate a subscription tier for a user.
    ///
    /// Free is immediate and clears any expiry. Paid tiers get a 30-day
    /// window and a completed subscription transaction.
    pub async fn subscribe(
        &self,
        user_id: &str,
        tier: SubscriptionTier,
    ) -> Result<SubscriptionReceipt> {
        let users = self.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
        if users.find_one(doc! { "id": user_id }).await?.is_none() {
            return Err(LumenError::not_found(format!("user {}", user_id)));
        }

        let price_cents = tier_price_cents(tier);
        let now = Utc::now();

        if tier == SubscriptionTier::Free {
            users
                .update_one(
                    doc! { "id": user_id },
                    doc! {
                        "$set": {
                            "subscription_tier": tier.as_str(),
                            "metadata.updated_at": DateTime::now(),
                        },
                        "$unset": { "subscription_expires": "" },
                    },
                )
                .await?;
            info!(user_id, "free tier activated");
            return Ok(SubscriptionReceipt {
                subscription_id: String::new(),
                tier,
                price_cents,
                expires_at: None,
            });
        }

        let end = now + Duration::days(SUBSCRIPTION_DAYS);
        let start_bson = DateTime::from_millis(now.timestamp_millis());
        let end_bson = DateTime::from_millis(end.timestamp_millis());

        let subscriptions = self
            .mongo
            .collection::<SubscriptionDoc>(SUBSCRIPTION_COLLECTION)
            .await?;
        let record = SubscriptionDoc::new(user_id, tier, price_cents, start_bson, end_bson);
        let subscription_id = record.id.clone();
        subscriptions.insert_one(record).await?;

        users
            .update_one(
                doc! { "id": user_id },
                doc! {
                    "$set": {
                        "subscription_tier": tier.as_str(),
                        "subscription_expires": end_bson,
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;

        let transactions = self
            .mongo
            .collection::<TransactionDoc>(TRANSACTION_COLLECTION)
            .await?;
        transactions
            .insert_one(TransactionDoc::completed(
                user_id,
                TransactionKind::Subscription,
                price_cents,
                Some(doc! { "tier": tier.as_str(), "subscription_id": &subscription_id }),
            ))
            .await?;

        info!(user_id, tier = %tier, "subscription activated");
        Ok(SubscriptionReceipt {
            subscription_id,
            tier,
            price_cents,
            expires_at: Some(end.to_rfc3339()),
        })
    }

    /// Deactivate any active subscription and drop the user to free
    pub async fn cancel(&self, user_id: &str) -> Result<()> {
        let users = self.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
        if users.find_one(doc! { "id": user_id }).await?.is_none() {
            return Err(LumenError::not_found(format!("user {}", user_id)));
        }

        let subscriptions = self
            .mongo
            .collection::<SubscriptionDoc>(SUBSCRIPTION_COLLECTION)
            .await?;
        subscriptions
            .update_many(
                doc! { "user_id": user_id, "is_active": true },
                doc! {
                    "$set": {
                        "is_active": false,
                        "auto_renew": false,
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;

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

        info!(user_id, "subscription cancelled");
        Ok(())
    }

    /// Grant purchased credits through the ledger
    pub async fn purchase_credits(&self, user_id: &str, amount: i64) -> Result<i64> {
        self.ledger
            .credit_balance(
                user_id,
                amount,
                TransactionKind::Credits,
                Some(doc! { "credits_purchased": amount }),
            )
            .await
    }

    /// Unlock a premium feature by spending credits
    pub async fn unlock_feature(&self, user_id: &str, feature_id: &str) -> Result<FeatureUnlock> {
        let cost = feature_cost(feature_id)
            .ok_or_else(|| LumenError::not_found(format!("premium feature {}", feature_id)))?;

        let users = self.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
        let user = users
            .find_one(doc! { "id": user_id })
            .await?
            .ok_or_else(|| LumenError::not_found(format!("user {}", user_id)))?;
        if user.unlocked_features.iter().any(|f| f == feature_id) {
            return Err(LumenError::conflict("feature already unlocked"));
        }

        let receipt = self
            .ledger
            .debit_balance(
                user_id,
                cost,
                TransactionKind::PremiumFeature,
                Some(doc! { "feature_id": feature_id, "credits_spent": cost }),
            )
            .await?;

        users
            .update_one(
                doc! { "id": user_id },
                doc! {
                    "$addToSet": { "unlocked_features": feature_id },
                    "$set": { "metadata.updated_at": DateTime::now() },
                },
            )
            .await?;

        info!(user_id, feature_id, cost, "premium feature unlocked");
        Ok(FeatureUnlock {
            feature_unlocked: feature_id.to_string(),
            credits_spent: cost,
            remaining_credits: receipt.new_balance,
        })
    }

    /// Platform revenue aggregate over the last 30 days
    pub async fn revenue_summary(&self) -> Result<RevenueSummary> {
        let users = self.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
        let mut subscription_distribution = std::collections::HashMap::new();
        for tier in SubscriptionTier::all() {
            let count = users
                .count(doc! { "subscription_tier": tier.as_str() })
                .await?;
            subscription_distribution.insert(tier.as_str().to_string(), count);
        }

        let window_start = Utc::now() - Duration::days(30);
        let window_start = DateTime::from_millis(window_start.timestamp_millis());

        let transactions = self
            .mongo
            .collection::<TransactionDoc>(TRANSACTION_COLLECTION)
            .await?;
        let recent = transactions
            .find_many(doc! {
                "status": "completed",
                "metadata.created_at": { "$gte": window_start },
            })
            .await?;

        let monthly_transactions = recent.len() as u64;
        let monthly_revenue_cents: i64 = recent
            .iter()
            .filter(|t| t.kind == TransactionKind::Subscription)
            .map(|t| t.amount)
            .sum();
        let total_credits_purchased: i64 = recent
            .iter()
            .filter(|t| t.kind == TransactionKind::Credits)
            .filter_map(|t| {
                t.detail
                    .as_ref()
                    .and_then(|d| d.get_i64("credits_purchased").ok())
            })
            .sum();

        Ok(RevenueSummary {
            subscription_distribution,
            monthly_revenue_cents,
            monthly_transactions,
            total_credits_purchased,
            average_transaction_cents: monthly_revenue_cents
                / (monthly_transactions.max(1) as i64),
            generated_at: Utc::now().to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_table() {
        assert_eq!(tier_price_cents(SubscriptionTier::Free), 0);
        assert_eq!(tier_price_cents(SubscriptionTier::Pro), 999);
        assert_eq!(tier_price_cents(SubscriptionTier::Elite), 2999);
    }

    #[test]
    fn feature_cost_table() {
        assert_eq!(feature_cost("custom_avatar"), Some(50));
        assert_eq!(feature_cost("premium_challenge"), Some(25));
        assert_eq!(feature_cost("advanced_insight"), Some(30));
        assert_eq!(feature_cost("vr_space_access"), Some(100));
        assert_eq!(feature_cost("time_travel"), None);
    }
}
