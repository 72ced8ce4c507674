// src/tx.rs
use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use serde::Serialize;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::{
    error::{Result, ViewError},
    rpc::RpcClient,
};

const RECEIPT_POLLS: u32 = 90;
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub type TxId = u64;

/// Status of one submission attempt.
///
/// `sent` never goes back to false. `completed` and `error` are terminal and
/// exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub id: TxId,
    pub name: String,
    pub in_wallet: bool,
    pub sent: bool,
    pub cancelled: bool,
    pub completed: bool,
    pub error: bool,
    pub hash: Option<String>,
}

impl Transaction {
    fn new(id: TxId, name: String) -> Self {
        Self {
            id,
            name,
            in_wallet: true,
            ..Default::default()
        }
    }

    pub fn is_settled(&self) -> bool {
        self.cancelled || self.completed || self.error
    }

    pub fn mark_sent(&mut self, hash: String) {
        if self.is_settled() {
            return;
        }
        self.in_wallet = false;
        self.sent = true;
        self.hash = Some(hash);
    }

    /// Only a wallet rejection before broadcast counts as cancelled
    pub fn mark_cancelled(&mut self) {
        if self.sent || self.is_settled() {
            return;
        }
        self.in_wallet = false;
        self.cancelled = true;
    }

    pub fn mark_completed(&mut self) {
        if self.is_settled() {
            return;
        }
        self.in_wallet = false;
        self.completed = true;
    }

    pub fn mark_error(&mut self) {
        if self.is_settled() {
            return;
        }
        self.in_wallet = false;
        self.error = true;
    }
}

/// Handed to the submitting callable so it can report the broadcast hash
#[derive(Clone)]
pub struct TxHandle {
    id: TxId,
    tracker: TxTracker,
}

impl TxHandle {
    pub fn sent(&self, hash: impl Into<String>) {
        self.tracker.update(self.id, |tx| tx.mark_sent(hash.into()));
    }
}

/// Broadcast a wallet-signed transaction and wait until it is mined.
///
/// Signing happens in the wallet; this only relays and watches.
pub async fn broadcast_and_confirm(rpc: &RpcClient, handle: &TxHandle, signed: &[u8]) -> Result<()> {
    let hash = rpc.send_raw_transaction(signed).await?;
    handle.sent(hash.clone());

    for _ in 0..RECEIPT_POLLS {
        if let Some(receipt) = rpc.transaction_receipt(&hash).await? {
            if receipt.succeeded() {
                return Ok(());
            }
            return Err(ViewError::Reverted(format!("transaction {} reverted", receipt.tx_hash)));
        }
        debug!("Transaction {} ({}) still pending", handle.id, hash);
        sleep(RECEIPT_POLL_INTERVAL).await;
    }

    Err(ViewError::Rpc(format!("no receipt for {} yet", hash)))
}

/// Runs named submissions and tracks their evolving status by id
#[derive(Clone, Default)]
pub struct TxTracker {
    next_id: Arc<AtomicU64>,
    transactions: Arc<Mutex<HashMap<TxId, Transaction>>>,
}

impl TxTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn transactions(&self) -> MutexGuard<'_, HashMap<TxId, Transaction>> {
        self.transactions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, id: TxId, f: impl FnOnce(&mut Transaction)) {
        if let Some(tx) = self.transactions().get_mut(&id) {
            f(tx);
        }
    }

    /// Start `call` in the background and return the id to poll.
    ///
    /// `Err(ViewError::Cancelled)` from the callable marks the attempt
    /// cancelled; any other error marks it failed.
    pub fn send<F, Fut>(&self, name: impl Into<String>, call: F) -> TxId
    where
        F: FnOnce(TxHandle) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let name = name.into();
        self.transactions().insert(id, Transaction::new(id, name.clone()));
        info!("Transaction {} '{}' waiting on wallet", id, name);

        let handle = TxHandle {
            id,
            tracker: self.clone(),
        };
        let tracker = self.clone();
        tokio::spawn(async move {
            match call(handle).await {
                Ok(()) => {
                    info!("Transaction {} '{}' completed", id, name);
                    tracker.update(id, Transaction::mark_completed);
                }
                Err(ViewError::Cancelled) => {
                    warn!("Transaction {} '{}' cancelled in wallet", id, name);
                    tracker.update(id, Transaction::mark_cancelled);
                }
                Err(e) => {
                    error!("Transaction {} '{}' failed: {}", id, name, e);
                    tracker.update(id, Transaction::mark_error);
                }
            }
        });

        id
    }

    pub fn get(&self, id: TxId) -> Option<Transaction> {
        self.transactions().get(&id).cloned()
    }

    /// Forget an attempt so the flow can start over
    pub fn reset(&self, id: TxId) -> Option<Transaction> {
        self.transactions().remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    async fn wait_settled(tracker: &TxTracker, id: TxId) -> Transaction {
        for _ in 0..100 {
            if let Some(tx) = tracker.get(id).filter(Transaction::is_settled) {
                return tx;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("transaction {} never settled", id);
    }

    #[test]
    fn sent_never_reverts_and_terminal_states_exclude_each_other() {
        let mut tx = Transaction::new(1, "Deposit".into());
        tx.mark_sent("0xabc".into());
        tx.mark_cancelled();
        assert!(tx.sent);
        assert!(!tx.cancelled);

        tx.mark_completed();
        tx.mark_error();
        assert!(tx.completed);
        assert!(!tx.error);

        let mut failed = Transaction::new(2, "Deposit".into());
        failed.mark_error();
        failed.mark_completed();
        failed.mark_sent("0xdef".into());
        assert!(failed.error);
        assert!(!failed.completed);
        assert!(!failed.sent);
    }

    #[tokio::test]
    async fn send_tracks_hash_and_completion() {
        let tracker = TxTracker::new();
        let (release, wait) = oneshot::channel::<()>();

        let id = tracker.send("Deposit 10 USDC", |handle| async move {
            handle.sent("0x1234");
            let _ = wait.await;
            Ok(())
        });

        let pending = tracker.get(id).unwrap();
        assert_eq!(pending.name, "Deposit 10 USDC");

        for _ in 0..100 {
            if tracker.get(id).map_or(false, |tx| tx.sent) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let sent = tracker.get(id).unwrap();
        assert!(sent.sent);
        assert!(!sent.in_wallet);
        assert_eq!(sent.hash.as_deref(), Some("0x1234"));

        release.send(()).unwrap();
        let done = wait_settled(&tracker, id).await;
        assert!(done.completed);
    }

    #[tokio::test]
    async fn cancel_and_failure_are_recorded() {
        let tracker = TxTracker::new();

        let cancelled = tracker.send("Approve", |_| async { Err(ViewError::Cancelled) });
        let tx = wait_settled(&tracker, cancelled).await;
        assert!(tx.cancelled && !tx.sent);

        let failed = tracker.send("Deposit", |handle| async move {
            handle.sent("0xdead");
            Err(ViewError::Rpc("reverted on chain".into()))
        });
        let tx = wait_settled(&tracker, failed).await;
        assert!(tx.sent && tx.error && !tx.completed);

        assert_ne!(cancelled, failed);
        assert!(tracker.reset(failed).is_some());
        assert!(tracker.get(failed).is_none());
    }
}
