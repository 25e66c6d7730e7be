//! Per-wallet lock table
//!
//! Every balance read-modify-write runs under the owning wallet's lock, with
//! the storage commit inside the critical section. Two concurrent operations
//! on the same wallet can therefore never both observe a stale balance and
//! both commit.
//!
//! Two-wallet operations (transfer) must acquire both locks through
//! [`WalletLocks::acquire_pair`], which orders acquisition by wallet id to
//! rule out deadlock.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Lock table keyed by wallet id.
///
/// Entries are created on first use and kept for the process lifetime; the
/// table is bounded by the number of wallets.
#[derive(Debug, Default)]
pub struct WalletLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

/// Guard for a single wallet's critical section
pub struct WalletGuard {
    _guard: OwnedMutexGuard<()>,
}

impl WalletLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, wallet_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(wallet_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Lock a single wallet
    pub async fn acquire(&self, wallet_id: Uuid) -> WalletGuard {
        let lock = self.entry(wallet_id);
        WalletGuard {
            _guard: lock.lock_owned().await,
        }
    }

    /// Lock two distinct wallets in id order.
    ///
    /// Panics in debug builds if both ids are equal; callers reject
    /// self-transfers before reaching the lock table.
    pub async fn acquire_pair(&self, a: Uuid, b: Uuid) -> (WalletGuard, WalletGuard) {
        debug_assert_ne!(a, b, "acquire_pair requires distinct wallets");
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let first_guard = self.acquire(first).await;
        let second_guard = self.acquire(second).await;
        // Return guards in the caller's (a, b) order
        if a < b {
            (first_guard, second_guard)
        } else {
            (second_guard, first_guard)
        }
    }
}
