//! Thread-safe handle around a [`Bridge`].
//!
//! Every mutating call takes the one lock and runs to completion, so
//! `initialize`, `update_state`, `lock` and `unlock` never interleave.
//! Readers take a [`TrustedState`] snapshot and verify proofs against it
//! without holding the lock.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::bridge::{Bridge, BridgeError};
use crate::consensus::Bootstrap;
use crate::crypto::{Bls12Engine, Hash, PairingEngine};
use crate::types::{Address, AssetId, Event, SourceAddress, TrustedState};

pub struct BridgeService<E: PairingEngine = Bls12Engine> {
    inner: Arc<Mutex<Bridge<E>>>,
}

impl<E: PairingEngine> Clone for BridgeService<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: PairingEngine> BridgeService<E> {
    pub fn new(bridge: Bridge<E>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(bridge)),
        }
    }

    pub fn initialize(&self, bootstrap: Bootstrap) -> Result<(), BridgeError> {
        self.inner.lock().initialize(bootstrap)
    }

    pub fn update_state(
        &self,
        header_payload: &[u8],
        signature: &[u8],
        signer_bitmask: &[u8],
        epoch_change_proof: &[u8],
    ) -> Result<TrustedState, BridgeError> {
        self.inner
            .lock()
            .update_state(header_payload, signature, signer_bitmask, epoch_change_proof)
    }

    pub fn lock(
        &self,
        sender: Address,
        asset_id: AssetId,
        amount: u128,
        destination_recipient: SourceAddress,
    ) -> Result<(), BridgeError> {
        self.inner.lock().lock(sender, asset_id, amount, destination_recipient)
    }

    pub fn unlock(
        &self,
        asset_id: AssetId,
        amount: u128,
        recipient: Address,
        proof_siblings: &[Hash],
        burn_event_payload: &[u8],
    ) -> Result<Hash, BridgeError> {
        self.inner
            .lock()
            .unlock(asset_id, amount, recipient, proof_siblings, burn_event_payload)
    }

    /// Copy of the current trusted state, if initialized.
    pub fn snapshot(&self) -> Option<TrustedState> {
        self.inner.lock().trusted_state().copied()
    }

    pub fn locked_balance(&self, asset_id: &AssetId) -> u128 {
        self.inner.lock().locked_balance(asset_id)
    }

    pub fn take_events(&self) -> Vec<Event> {
        self.inner.lock().take_events()
    }

    /// Run `f` with shared access to the bridge while holding the lock.
    pub fn with_bridge<R>(&self, f: impl FnOnce(&Bridge<E>) -> R) -> R {
        f(&self.inner.lock())
    }
}
