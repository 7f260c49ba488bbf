//! Lock/unlock bridge gated by the light client.
//!
//! Value locked here is released only against a burn the source chain has
//! recorded in a state root the light client trusts. Each burn settles at
//! most once.

pub mod burn;

pub use burn::*;

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::consensus::{Bootstrap, LightClient, LightClientError};
use crate::crypto::{Bls12Engine, Hash, PairingEngine};
use crate::error::ErrorKind;
use crate::proof::{verify_inclusion, ProofError};
use crate::types::{Address, AssetId, Decode, DecodeError, Event, SourceAddress, TrustedState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Locked balance for asset {asset_id} would overflow")]
    BalanceOverflow { asset_id: String },

    #[error("Burn {burn_hash} has already been processed")]
    AlreadyProcessed { burn_hash: String },

    #[error("Malformed burn event: {0}")]
    Decode(#[from] DecodeError),

    #[error("Burn record does not match the unlock request: {field} differs")]
    ParameterMismatch { field: &'static str },

    #[error("Burn at version {burn_version} is beyond trusted version {trusted_version}")]
    BurnNotYetTrusted { burn_version: u64, trusted_version: u64 },

    #[error("Light client is not initialized")]
    NotInitialized,

    #[error("Burn record proof failed: {0}")]
    InvalidProof(#[from] ProofError),

    #[error("Insufficient locked balance: {locked} locked, {requested} requested")]
    InsufficientLockedBalance { locked: u128, requested: u128 },

    #[error(transparent)]
    LightClient(#[from] LightClientError),
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::ZeroAmount
            | BridgeError::BalanceOverflow { .. }
            | BridgeError::Decode(_) => ErrorKind::MalformedInput,
            BridgeError::AlreadyProcessed { .. } => ErrorKind::AlreadyProcessed,
            BridgeError::ParameterMismatch { .. } | BridgeError::BurnNotYetTrusted { .. } => {
                ErrorKind::ParameterMismatch
            }
            BridgeError::NotInitialized => ErrorKind::InvalidState,
            BridgeError::InvalidProof(e) => e.kind(),
            BridgeError::InsufficientLockedBalance { .. } => ErrorKind::InsufficientLockedBalance,
            BridgeError::LightClient(e) => e.kind(),
        }
    }
}

/// Host-side bridge state. Owns its light client so every event, from either,
/// lands in one ordered log.
#[derive(Debug)]
pub struct Bridge<E: PairingEngine = Bls12Engine> {
    light_client: LightClient<E>,
    locked: HashMap<AssetId, u128>,
    released: HashMap<(AssetId, Address), u128>,
    processed_burns: HashSet<Hash>,
    events: Vec<Event>,
}

impl Bridge<Bls12Engine> {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_light_client(LightClient::new(config))
    }
}

impl<E: PairingEngine> Bridge<E> {
    pub fn with_light_client(light_client: LightClient<E>) -> Self {
        Self {
            light_client,
            locked: HashMap::new(),
            released: HashMap::new(),
            processed_burns: HashSet::new(),
            events: Vec::new(),
        }
    }

    pub fn initialize(&mut self, bootstrap: Bootstrap) -> Result<(), BridgeError> {
        self.light_client.initialize(bootstrap)?;
        self.collect_light_client_events();
        Ok(())
    }

    pub fn update_state(
        &mut self,
        header_payload: &[u8],
        signature: &[u8],
        signer_bitmask: &[u8],
        epoch_change_proof: &[u8],
    ) -> Result<TrustedState, BridgeError> {
        let state = self
            .light_client
            .update_state(header_payload, signature, signer_bitmask, epoch_change_proof)?;
        self.collect_light_client_events();
        Ok(state)
    }

    fn collect_light_client_events(&mut self) {
        let events = self.light_client.take_events();
        self.events.extend(events);
    }

    /// Lock `amount` of `asset_id` for delivery to `destination_recipient` on the source chain.
    pub fn lock(
        &mut self,
        sender: Address,
        asset_id: AssetId,
        amount: u128,
        destination_recipient: SourceAddress,
    ) -> Result<(), BridgeError> {
        if amount == 0 {
            return Err(BridgeError::ZeroAmount);
        }
        let locked = self.locked_balance(&asset_id);
        let updated = locked.checked_add(amount).ok_or_else(|| BridgeError::BalanceOverflow {
            asset_id: hex::encode(asset_id),
        })?;

        self.locked.insert(asset_id, updated);
        self.events.push(Event::Locked {
            asset_id,
            sender,
            amount,
            destination_recipient,
        });
        info!(asset = %hex::encode(asset_id), amount, "locked");
        Ok(())
    }

    /// Release `amount` of `asset_id` to `recipient` against a burn recorded
    /// in the trusted source state.
    pub fn unlock(
        &mut self,
        asset_id: AssetId,
        amount: u128,
        recipient: Address,
        proof_siblings: &[Hash],
        burn_event_payload: &[u8],
    ) -> Result<Hash, BridgeError> {
        let result = self.try_unlock(asset_id, amount, recipient, proof_siblings, burn_event_payload);
        if let Err(e) = &result {
            warn!(asset = %hex::encode(asset_id), amount, error = %e, kind = %e.kind(), "unlock rejected");
        }
        result
    }

    fn try_unlock(
        &mut self,
        asset_id: AssetId,
        amount: u128,
        recipient: Address,
        proof_siblings: &[Hash],
        burn_event_payload: &[u8],
    ) -> Result<Hash, BridgeError> {
        let burn_hash = burn_hash(burn_event_payload);
        if self.processed_burns.contains(&burn_hash) {
            return Err(BridgeError::AlreadyProcessed {
                burn_hash: hex::encode(burn_hash),
            });
        }

        let burn = BurnEvent::decode_bytes(burn_event_payload)?;
        if burn.asset_id != asset_id {
            return Err(BridgeError::ParameterMismatch { field: "asset" });
        }
        if burn.amount != amount {
            return Err(BridgeError::ParameterMismatch { field: "amount" });
        }
        if burn.recipient != recipient {
            return Err(BridgeError::ParameterMismatch { field: "recipient" });
        }

        let trusted = self.light_client.trusted_state().ok_or(BridgeError::NotInitialized)?;
        if burn.burn_version > trusted.version {
            return Err(BridgeError::BurnNotYetTrusted {
                burn_version: burn.burn_version,
                trusted_version: trusted.version,
            });
        }
        verify_inclusion(&trusted.state_root, &burn_record_key(&burn_hash), &burn_hash, proof_siblings)?;

        let locked = self.locked_balance(&asset_id);
        let remaining = locked
            .checked_sub(amount)
            .ok_or(BridgeError::InsufficientLockedBalance {
                locked,
                requested: amount,
            })?;
        let released = self
            .released_balance(&asset_id, &recipient)
            .checked_add(amount)
            .ok_or_else(|| BridgeError::BalanceOverflow {
                asset_id: hex::encode(asset_id),
            })?;

        self.processed_burns.insert(burn_hash);
        self.locked.insert(asset_id, remaining);
        self.released.insert((asset_id, recipient), released);
        self.events.push(Event::Unlocked {
            asset_id,
            recipient,
            amount,
            burn_hash,
        });
        info!(asset = %hex::encode(asset_id), amount, burn = %hex::encode(burn_hash), "unlocked");
        Ok(burn_hash)
    }

    pub fn locked_balance(&self, asset_id: &AssetId) -> u128 {
        self.locked.get(asset_id).copied().unwrap_or(0)
    }

    /// Total released to `recipient` in `asset_id` so far.
    pub fn released_balance(&self, asset_id: &AssetId, recipient: &Address) -> u128 {
        self.released.get(&(*asset_id, *recipient)).copied().unwrap_or(0)
    }

    pub fn is_processed(&self, burn_hash: &Hash) -> bool {
        self.processed_burns.contains(burn_hash)
    }

    pub fn light_client(&self) -> &LightClient<E> {
        &self.light_client
    }

    pub fn trusted_state(&self) -> Option<&TrustedState> {
        self.light_client.trusted_state()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Drain the shared log. Nothing else removes entries, so a long-lived
    /// host must call this periodically.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}
