//! Webhook reconciler: applies asynchronous provider confirmations
//!
//! Each funding reference finishes exactly once. Deliveries may be
//! duplicated, reordered, or arrive before the originating `fund` call has
//! returned to its caller; the idempotency check on the stored transaction's
//! status is the sole safety net, and it runs under the wallet lock.
//!
//! Signature verification happens over the exact raw bytes received. The
//! routing layer must hand the body through unparsed; re-serializing a
//! parsed body would invalidate the signature.

use crate::{
    error::{Error, Result},
    locks::WalletLocks,
    store::Store,
    types::{TransactionKind, TransactionStatus},
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha512;
use std::sync::Arc;

type HmacSha512 = Hmac<Sha512>;

/// Outcome of a verified webhook delivery.
///
/// Every variant is a success acknowledgment for the transport: once the
/// signature checks out, the provider must not redeliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A pending funding was credited and finalized
    Applied,
    /// Nothing to do: unknown reference, duplicate delivery, or an event
    /// kind this service does not act on
    Ignored,
    /// Internal processing failed after verification; logged for manual or
    /// scheduled reconciliation
    Deferred,
}

/// Raw webhook envelope: event name plus an event-specific payload
#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    data: serde_json::Value,
}

/// Payload of a `charge.success` event. Only the fields this service acts
/// on are accepted; everything else in the provider's payload is ambient.
#[derive(Debug, Deserialize)]
struct ChargeSuccess {
    reference: String,
    /// Amount settled, in the provider's minor unit (kobo)
    amount: i64,
}

/// Reconciles provider callbacks against the transaction journal
pub struct Reconciler {
    store: Arc<Store>,
    locks: Arc<WalletLocks>,
    secret: String,
}

impl Reconciler {
    /// Create a reconciler sharing the ledger's store and lock table
    pub fn new(store: Arc<Store>, locks: Arc<WalletLocks>, secret: impl Into<String>) -> Self {
        Self {
            store,
            locks,
            secret: secret.into(),
        }
    }

    /// Verify and process one delivery.
    ///
    /// Returns `Unauthorized` only when the signature does not match; any
    /// later failure is logged and folded into a success outcome so the
    /// provider does not retry.
    pub async fn process(&self, raw_body: &[u8], signature: &str) -> Result<WebhookOutcome> {
        self.verify_signature(raw_body, signature)?;

        match self.apply(raw_body).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                tracing::error!(error = %err, "Webhook processing failed after verification");
                Ok(WebhookOutcome::Deferred)
            }
        }
    }

    /// Constant-time HMAC-SHA512 check over the raw body
    fn verify_signature(&self, raw_body: &[u8], signature: &str) -> Result<()> {
        let sig_bytes = hex::decode(signature.trim())
            .map_err(|_| Error::Unauthorized("Malformed webhook signature".to_string()))?;

        let mut mac = HmacSha512::new_from_slice(self.secret.as_bytes())
            .map_err(|_| Error::Unauthorized("Invalid signing secret".to_string()))?;
        mac.update(raw_body);
        mac.verify_slice(&sig_bytes)
            .map_err(|_| Error::Unauthorized("Webhook signature mismatch".to_string()))
    }

    async fn apply(&self, raw_body: &[u8]) -> Result<WebhookOutcome> {
        let envelope: Envelope = match serde_json::from_slice(raw_body) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(error = %err, "Unparseable webhook body, ignoring");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        if envelope.event != "charge.success" {
            tracing::debug!(event = %envelope.event, "Webhook event not actionable");
            return Ok(WebhookOutcome::Ignored);
        }

        let charge: ChargeSuccess = match serde_json::from_value(envelope.data) {
            Ok(charge) => charge,
            Err(err) => {
                tracing::warn!(error = %err, "Unrecognized charge.success shape, ignoring");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        self.settle_funding(&charge).await
    }

    /// Credit the receiver wallet and finalize the pending transaction,
    /// atomically and exactly once.
    async fn settle_funding(&self, charge: &ChargeSuccess) -> Result<WebhookOutcome> {
        let txn = match self.store.transaction_by_reference(&charge.reference) {
            Ok(txn) => txn,
            Err(Error::NotFound(_)) => {
                tracing::debug!(reference = %charge.reference, "Unknown reference, ignoring");
                return Ok(WebhookOutcome::Ignored);
            }
            Err(err) => return Err(err),
        };

        if txn.kind != TransactionKind::Fund {
            tracing::warn!(
                reference = %txn.reference,
                kind = %txn.kind,
                "charge.success for a non-funding reference, ignoring"
            );
            return Ok(WebhookOutcome::Ignored);
        }

        let _guard = self.locks.acquire(txn.wallet_id).await;

        // Re-read under the lock: a concurrent delivery may have settled it
        let mut txn = self.store.transaction_by_reference(&charge.reference)?;
        if txn.status.is_terminal() {
            tracing::debug!(reference = %txn.reference, "Duplicate delivery, no-op");
            return Ok(WebhookOutcome::Ignored);
        }

        // Provider reports minor units; the ledger holds major units
        let amount = Decimal::new(charge.amount, 2);

        let mut wallet = self.store.wallet_by_id(txn.wallet_id)?;
        let now = Utc::now();
        wallet.balance += amount;
        wallet.updated_at = now;
        txn.status = TransactionStatus::Success;
        txn.updated_at = now;

        self.store.update_transaction(&txn, Some(&wallet))?;

        tracing::info!(
            reference = %txn.reference,
            %amount,
            wallet_id = %wallet.id,
            "Funding settled"
        );

        Ok(WebhookOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::{Transaction, User, Wallet};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;
    use uuid::Uuid;

    const SECRET: &str = "sk_test_secret";

    fn sign(body: &[u8]) -> String {
        let mut mac = HmacSha512::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    fn fixture() -> (Reconciler, Arc<Store>, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = tmp.path().to_path_buf();
        let store = Arc::new(Store::open(&config).unwrap());
        let locks = Arc::new(WalletLocks::new());
        let reconciler = Reconciler::new(store.clone(), locks, SECRET);
        (reconciler, store, tmp)
    }

    fn seed_pending_funding(store: &Store, amount: Decimal) -> (User, Wallet, Transaction) {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: "Test".into(),
            email: "hook@test.com".into(),
            password_hash: "hash".into(),
            created_at: now,
        };
        let wallet = Wallet {
            id: Uuid::new_v4(),
            user_id: user.id,
            balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        store.create_user(&user, &wallet).unwrap();

        let txn = Transaction {
            id: Uuid::now_v7(),
            reference: Uuid::new_v4().to_string(),
            kind: TransactionKind::Fund,
            amount,
            fee: Decimal::ZERO,
            status: TransactionStatus::Pending,
            sender: None,
            receiver: Some(user.id),
            wallet_id: wallet.id,
            description: None,
            provider_recipient: None,
            created_at: now,
            updated_at: now,
        };
        store.insert_transaction(&txn, &[]).unwrap();
        (user, wallet, txn)
    }

    fn charge_success_body(reference: &str, amount_kobo: i64) -> Vec<u8> {
        serde_json::json!({
            "event": "charge.success",
            "data": {
                "reference": reference,
                "amount": amount_kobo,
                "currency": "NGN",
                "customer": { "email": "hook@test.com" }
            }
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn test_valid_delivery_credits_once() {
        let (reconciler, store, _tmp) = fixture();
        let (_, wallet, txn) = seed_pending_funding(&store, dec!(500));

        let body = charge_success_body(&txn.reference, 50_000);
        let signature = sign(&body);

        let outcome = reconciler.process(&body, &signature).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Applied);
        assert_eq!(store.wallet_by_id(wallet.id).unwrap().balance, dec!(500));
        assert_eq!(
            store.transaction_by_reference(&txn.reference).unwrap().status,
            TransactionStatus::Success
        );
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_noop() {
        let (reconciler, store, _tmp) = fixture();
        let (_, wallet, txn) = seed_pending_funding(&store, dec!(500));

        let body = charge_success_body(&txn.reference, 50_000);
        let signature = sign(&body);

        assert_eq!(
            reconciler.process(&body, &signature).await.unwrap(),
            WebhookOutcome::Applied
        );
        assert_eq!(
            reconciler.process(&body, &signature).await.unwrap(),
            WebhookOutcome::Ignored
        );
        // Credited exactly once
        assert_eq!(store.wallet_by_id(wallet.id).unwrap().balance, dec!(500));
    }

    #[tokio::test]
    async fn test_bad_signature_rejected_without_state_change() {
        let (reconciler, store, _tmp) = fixture();
        let (_, wallet, txn) = seed_pending_funding(&store, dec!(500));

        let body = charge_success_body(&txn.reference, 50_000);
        let forged = sign(b"some other body");

        let err = reconciler.process(&body, &forged).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
        assert_eq!(store.wallet_by_id(wallet.id).unwrap().balance, dec!(0));
        assert_eq!(
            store.transaction_by_reference(&txn.reference).unwrap().status,
            TransactionStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_malformed_signature_rejected() {
        let (reconciler, _store, _tmp) = fixture();
        let body = b"{}".to_vec();
        let err = reconciler.process(&body, "not-hex!").await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_unknown_reference_ignored() {
        let (reconciler, _store, _tmp) = fixture();
        let body = charge_success_body("no-such-reference", 1_000);
        let outcome = reconciler.process(&body, &sign(&body)).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_other_event_kinds_acknowledged_but_ignored() {
        let (reconciler, store, _tmp) = fixture();
        let (_, wallet, txn) = seed_pending_funding(&store, dec!(500));

        let body = serde_json::json!({
            "event": "transfer.success",
            "data": { "reference": txn.reference, "amount": 50_000 }
        })
        .to_string()
        .into_bytes();

        let outcome = reconciler.process(&body, &sign(&body)).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);
        assert_eq!(store.wallet_by_id(wallet.id).unwrap().balance, dec!(0));
    }

    #[tokio::test]
    async fn test_unrecognized_shape_ignored() {
        let (reconciler, _store, _tmp) = fixture();
        let body = serde_json::json!({
            "event": "charge.success",
            "data": { "unexpected": true }
        })
        .to_string()
        .into_bytes();

        let outcome = reconciler.process(&body, &sign(&body)).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_credit_uses_provider_amount() {
        let (reconciler, store, _tmp) = fixture();
        // Journal says 500 but the provider settled 450.25
        let (_, wallet, txn) = seed_pending_funding(&store, dec!(500));

        let body = charge_success_body(&txn.reference, 45_025);
        reconciler.process(&body, &sign(&body)).await.unwrap();

        assert_eq!(store.wallet_by_id(wallet.id).unwrap().balance, dec!(450.25));
    }
}
