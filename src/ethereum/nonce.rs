//! Per-address nonce sequencing.
//!
//! Nonces of one sender are strictly sequential, so deploy/send from the
//! same key are serialized here: a [`NonceReservation`] holds the sender's
//! slot until the signed transaction has been accepted by the node.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::Address;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{error::Result, ethereum::client::ChainClient};

type Slot = Arc<Mutex<Option<u64>>>;

/// Hands out monotonically increasing nonces per sender address.
///
/// The counter of an address is seeded from the node's pending nonce on
/// first use and after every rollback.
#[derive(Debug, Default)]
pub struct NonceManager {
    slots: Mutex<HashMap<Address, Slot>>,
}

impl NonceManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next nonce of `address`.
    ///
    /// Waits while another reservation for the same address is outstanding.
    pub async fn reserve<C: ChainClient + ?Sized>(
        &self,
        client: &C,
        address: Address,
    ) -> Result<NonceReservation> {
        let slot = self.slot(address).await;
        let mut guard = slot.lock_owned().await;

        let nonce = match *guard {
            Some(next) => next,
            None => {
                let next = client.pending_nonce(address).await?;
                tracing::debug!(address = %address, nonce = next, "Nonce synced from node");
                next
            }
        };
        *guard = Some(nonce);

        Ok(NonceReservation { guard, address, nonce, committed: false })
    }

    /// Forget the cached counter of `address`; the next reservation resyncs.
    pub async fn reset(&self, address: Address) {
        let slot = self.slot(address).await;
        *slot.lock().await = None;
    }

    /// The next nonce that would be handed out, if cached.
    pub async fn peek(&self, address: Address) -> Option<u64> {
        let slot = self.slots.lock().await.get(&address).cloned()?;
        let next = *slot.lock().await;
        next
    }

    async fn slot(&self, address: Address) -> Slot {
        self.slots.lock().await.entry(address).or_default().clone()
    }
}

/// A nonce held for one pending submission.
///
/// [`commit`](Self::commit) after the node accepted the transaction.
/// Dropping an uncommitted reservation discards the cached counter, so the
/// nonce is handed out again once the node is consulted.
#[derive(Debug)]
pub struct NonceReservation {
    guard: OwnedMutexGuard<Option<u64>>,
    address: Address,
    nonce: u64,
    committed: bool,
}

impl NonceReservation {
    /// The reserved nonce.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Sender address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Mark the nonce as used.
    pub fn commit(mut self) {
        *self.guard = Some(self.nonce + 1);
        self.committed = true;
    }
}

impl Drop for NonceReservation {
    fn drop(&mut self) {
        if !self.committed {
            *self.guard = None;
            tracing::debug!(address = %self.address, nonce = self.nonce, "Nonce reservation rolled back");
        }
    }
}
