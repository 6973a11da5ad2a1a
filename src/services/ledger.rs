//! Credit balance and transaction ledger
//!
//! Every balance change leaves a transaction record. Debits write a
//! pending record first, then decrement the balance with an atomic
//! sufficiency check, then finalize the record. A crash between the
//! first two steps leaves a pending record that the startup recovery
//! scan marks failed; the balance itself is never wrong.
//!
//! Balance mutation goes through the [`BalanceStore`] seam so the
//! sufficiency rule can be exercised without a database.

use std::sync::Arc;

use async_trait::async_trait;
use bson::{doc, DateTime, Document};
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::db::schemas::{
    TransactionDoc, TransactionKind, TransactionStatus, UserDoc, TRANSACTION_COLLECTION,
    USER_COLLECTION,
};
use crate::db::MongoClient;
use crate::types::{LumenError, Result};

/// Outcome of a successful debit
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DebitReceipt {
    pub transaction_id: String,
    pub new_balance: i64,
}

/// Balance reads and conditional mutations for one user
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Decrement `amount` iff the balance covers it. `Ok(Some(new))` on
    /// success, `Ok(None)` when the balance is short.
    async fn try_debit(&self, user_id: &str, amount: i64) -> Result<Option<i64>>;

    /// Unconditionally add `amount`; returns the new balance.
    async fn credit(&self, user_id: &str, amount: i64) -> Result<i64>;

    async fn balance(&self, user_id: &str) -> Result<i64>;
}

/// Settle a debit against a store: the sufficiency decision behind
/// every spend. Never leaves a balance negative.
pub async fn settle_debit(store: &dyn BalanceStore, user_id: &str, amount: i64) -> Result<i64> {
    match store.try_debit(user_id, amount).await? {
        Some(balance) => Ok(balance),
        None => {
            let available = store.balance(user_id).await?;
            Err(LumenError::InsufficientFunds {
                required: amount,
                available,
            })
        }
    }
}

/// Store backed by the user collection. The decrement and the
/// sufficiency check are one document write, so concurrent debits can
/// never overdraw.
pub struct MongoBalanceStore {
    mongo: MongoClient,
}

impl MongoBalanceStore {
    pub fn new(mongo: MongoClient) -> Self {
        Self { mongo }
    }
}

#[async_trait]
impl BalanceStore for MongoBalanceStore {
    async fn try_debit(&self, user_id: &str, amount: i64) -> Result<Option<i64>> {
        let users = self.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
        let result = users
            .update_one(
                doc! { "id": user_id, "credits": { "$gte": amount } },
                doc! {
                    "$inc": { "credits": -amount },
                    "$set": { "metadata.updated_at": DateTime::now() },
                },
            )
            .await?;
        if result.matched_count == 0 {
            return Ok(None);
        }
        Ok(Some(self.balance(user_id).await?))
    }

    async fn credit(&self, user_id: &str, amount: i64) -> Result<i64> {
        let users = self.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
        let result = users
            .update_one(
                doc! { "id": user_id },
                doc! {
                    "$inc": { "credits": amount },
                    "$set": { "metadata.updated_at": DateTime::now() },
                },
            )
            .await?;
        if result.matched_count == 0 {
            return Err(LumenError::not_found(format!("user {}", user_id)));
        }
        self.balance(user_id).await
    }

    async fn balance(&self, user_id: &str) -> Result<i64> {
        let users = self.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
        let user = users
            .find_one(doc! { "id": user_id })
            .await?
            .ok_or_else(|| LumenError::not_found(format!("user {}", user_id)))?;
        Ok(user.credits)
    }
}

/// Credit balance mutations with a durable transaction trail
#[derive(Clone)]
pub struct LedgerService {
    mongo: MongoClient,
    store: Arc<dyn BalanceStore>,
}

impl LedgerService {
    pub fn new(mongo: MongoClient) -> Self {
        let store = Arc::new(MongoBalanceStore::new(mongo.clone()));
        Self { mongo, store }
    }

    /// Add credits to a balance and record a completed transaction
    pub async fn credit_balance(
        &self,
        user_id: &str,
        amount: i64,
        kind: TransactionKind,
        detail: Option<Document>,
    ) -> Result<i64> {
        if amount <= 0 {
            return Err(LumenError::invalid_input("credit amount must be positive"));
        }

        let balance = self.store.credit(user_id, amount).await?;

        let transactions = self
            .mongo
            .collection::<TransactionDoc>(TRANSACTION_COLLECTION)
            .await?;
        let record = TransactionDoc::completed(user_id, kind, amount, detail);
        transactions.insert_one(record).await?;

        info!(user_id, amount, balance, "credits added");
        Ok(balance)
    }

    /// Remove credits from a balance, rejecting the whole debit when the
    /// balance cannot cover it.
    pub async fn debit_balance(
        &self,
        user_id: &str,
        amount: i64,
        kind: TransactionKind,
        detail: Option<Document>,
    ) -> Result<DebitReceipt> {
        if amount <= 0 {
            return Err(LumenError::invalid_input("debit amount must be positive"));
        }

        let transactions = self
            .mongo
            .collection::<TransactionDoc>(TRANSACTION_COLLECTION)
            .await?;

        // Durable intent before touching the balance
        let pending = TransactionDoc::pending(user_id, kind, -amount, detail);
        let transaction_id = pending.id.clone();
        transactions.insert_one(pending).await?;

        match settle_debit(self.store.as_ref(), user_id, amount).await {
            Ok(new_balance) => {
                self.finish(&transactions, &transaction_id, TransactionStatus::Completed)
                    .await?;
                info!(user_id, amount, balance = new_balance, "credits spent");
                Ok(DebitReceipt {
                    transaction_id,
                    new_balance,
                })
            }
            Err(err) => {
                self.finish(&transactions, &transaction_id, TransactionStatus::Failed)
                    .await?;
                Err(err)
            }
        }
    }

    async fn finish(
        &self,
        transactions: &crate::db::MongoCollection<TransactionDoc>,
        transaction_id: &str,
        status: TransactionStatus,
    ) -> Result<()> {
        transactions
            .update_one(
                doc! { "id": transaction_id },
                doc! {
                    "$set": {
                        "status": status.as_str(),
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;
        Ok(())
    }

    /// Transaction history for a user, newest first
    pub async fn transaction_history(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<TransactionDoc>> {
        let transactions = self
            .mongo
            .collection::<TransactionDoc>(TRANSACTION_COLLECTION)
            .await?;
        transactions
            .find_with_options(
                doc! { "user_id": user_id },
                Some(doc! { "metadata.created_at": -1 }),
                Some(limit),
            )
            .await
    }

    /// Mark stale pending debits failed. Run once at startup; a pending
    /// record older than `max_age_minutes` belongs to a debit whose
    /// process died before finalizing.
    pub async fn recover_pending(&self, max_age_minutes: i64) -> Result<u64> {
        let transactions = self
            .mongo
            .collection::<TransactionDoc>(TRANSACTION_COLLECTION)
            .await?;

        let cutoff = Utc::now() - Duration::minutes(max_age_minutes);
        let cutoff = DateTime::from_millis(cutoff.timestamp_millis());

        let result = transactions
            .update_many(
                doc! {
                    "status": TransactionStatus::Pending.as_str(),
                    "metadata.created_at": { "$lt": cutoff },
                },
                doc! {
                    "$set": {
                        "status": TransactionStatus::Failed.as_str(),
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;

        if result.modified_count > 0 {
            warn!(
                recovered = result.modified_count,
                "marked stale pending transactions failed"
            );
        }
        Ok(result.modified_count)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    struct MemoryBalances(Mutex<HashMap<String, i64>>);

    impl MemoryBalances {
        fn with(user_id: &str, balance: i64) -> Self {
            let mut map = HashMap::new();
            map.insert(user_id.to_string(), balance);
            Self(Mutex::new(map))
        }
    }

    #[async_trait]
    impl BalanceStore for MemoryBalances {
        async fn try_debit(&self, user_id: &str, amount: i64) -> Result<Option<i64>> {
            let mut map = self.0.lock().unwrap();
            match map.get_mut(user_id) {
                Some(balance) if *balance >= amount => {
                    *balance -= amount;
                    Ok(Some(*balance))
                }
                _ => Ok(None),
            }
        }

        async fn credit(&self, user_id: &str, amount: i64) -> Result<i64> {
            let mut map = self.0.lock().unwrap();
            let balance = map
                .get_mut(user_id)
                .ok_or_else(|| LumenError::not_found(format!("user {}", user_id)))?;
            *balance += amount;
            Ok(*balance)
        }

        async fn balance(&self, user_id: &str) -> Result<i64> {
            let map = self.0.lock().unwrap();
            map.get(user_id)
                .copied()
                .ok_or_else(|| LumenError::not_found(format!("user {}", user_id)))
        }
    }

    #[test]
    fn debit_beyond_balance_is_rejected_and_balance_untouched() {
        let store = MemoryBalances::with("alice", 20);

        let err = tokio_test::block_on(settle_debit(&store, "alice", 50)).unwrap_err();
        match err {
            LumenError::InsufficientFunds {
                required,
                available,
            } => {
                assert_eq!(required, 50);
                assert_eq!(available, 20);
            }
            other => panic!("expected InsufficientFunds, got {:?}", other),
        }

        assert_eq!(tokio_test::block_on(store.balance("alice")).unwrap(), 20);
    }

    #[test]
    fn debit_then_credit_restores_the_balance() {
        let store = MemoryBalances::with("bob", 120);

        let after_debit = tokio_test::block_on(settle_debit(&store, "bob", 45)).unwrap();
        assert_eq!(after_debit, 75);

        let restored = tokio_test::block_on(store.credit("bob", 45)).unwrap();
        assert_eq!(restored, 120);
    }

    #[test]
    fn debits_exhaust_the_balance_exactly() {
        let store = MemoryBalances::with("carol", 100);

        assert_eq!(
            tokio_test::block_on(settle_debit(&store, "carol", 60)).unwrap(),
            40
        );
        assert!(matches!(
            tokio_test::block_on(settle_debit(&store, "carol", 60)),
            Err(LumenError::InsufficientFunds {
                required: 60,
                available: 40,
            })
        ));
        assert_eq!(
            tokio_test::block_on(settle_debit(&store, "carol", 40)).unwrap(),
            0
        );
    }

    #[test]
    fn insufficient_funds_reports_both_amounts() {
        let err = LumenError::InsufficientFunds {
            required: 50,
            available: 20,
        };
        assert_eq!(
            err.to_string(),
            "insufficient credits: required 50, available 20"
        );
    }

    #[test]
    fn receipt_serializes_camel_case() {
        let receipt = DebitReceipt {
            transaction_id: "t-1".into(),
            new_balance: 75,
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["newBalance"], 75);
        assert_eq!(json["transactionId"], "t-1");
    }
}
