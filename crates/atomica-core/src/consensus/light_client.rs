use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::consensus::signature::{verify_with_validator_set, AggregateSignature, SignerBitmask, VerificationError};
use crate::consensus::waypoint::WaypointError;
use crate::crypto::{Bls12Engine, Hash, PairingEngine};
use crate::error::ErrorKind;
use crate::proof::{
    verify_accumulator_leaf, verify_accumulator_range_leaves, verify_inclusion, verify_non_inclusion,
    verify_with_explicit_leaf, AccumulatorRangeProof, ProofError,
};
use crate::types::{
    hex_serde, BlsSignature, Decode, DecodeError, Event, ExplicitLeafProof, LedgerInfo, TrustedState,
    Validator, ValidatorSet, BLS_SIGNATURE_LEN,
};

/// Errors from the light client state machine. Every rejection leaves the
/// client exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LightClientError {
    #[error("Light client is already initialized")]
    AlreadyInitialized,

    #[error("Light client is not initialized")]
    NotInitialized,

    #[error("Bootstrap rejected: {0}")]
    Waypoint(#[from] WaypointError),

    #[error("Malformed update: {0}")]
    Decode(#[from] DecodeError),

    #[error("Update version {version} is not newer than trusted version {trusted_version}")]
    StaleUpdate { version: u64, trusted_version: u64 },

    #[error("Update epoch {epoch} is older than current epoch {current_epoch}")]
    StaleEpoch { epoch: u64, current_epoch: u64 },

    #[error("Update jumps from epoch {current_epoch} to {epoch}; epochs must advance one at a time")]
    EpochSkipped { epoch: u64, current_epoch: u64 },

    #[error("Update opens epoch {epoch} but its header commits to no next validator set")]
    UndeclaredEpochChange { epoch: u64 },

    #[error("Update opens epoch {epoch} but carries no validator set for it")]
    MissingEpochChangeProof { epoch: u64 },

    #[error("Update stays in epoch {epoch} but carries an epoch change proof")]
    UnexpectedEpochChangeProof { epoch: u64 },

    #[error("Validator set hash {got} does not match the header's next epoch hash {expected}")]
    ValidatorSetHashMismatch { expected: String, got: String },

    #[error("No validator set installed for epoch {epoch}")]
    UnknownEpoch { epoch: u64 },

    #[error("Transaction version {version} is beyond trusted version {trusted_version}")]
    VersionNotCovered { version: u64, trusted_version: u64 },

    #[error("Signature verification failed: {0}")]
    Signature(#[from] VerificationError),

    #[error("Proof verification failed: {0}")]
    Proof(#[from] ProofError),
}

impl LightClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LightClientError::AlreadyInitialized
            | LightClientError::NotInitialized
            | LightClientError::UnknownEpoch { .. } => ErrorKind::InvalidState,
            LightClientError::Waypoint(e) => e.kind(),
            LightClientError::Decode(e) => e.kind(),
            LightClientError::StaleUpdate { .. } | LightClientError::StaleEpoch { .. } => {
                ErrorKind::StaleUpdate
            }
            LightClientError::MissingEpochChangeProof { .. }
            | LightClientError::UnexpectedEpochChangeProof { .. } => ErrorKind::MalformedInput,
            LightClientError::EpochSkipped { .. }
            | LightClientError::UndeclaredEpochChange { .. }
            | LightClientError::ValidatorSetHashMismatch { .. }
            | LightClientError::VersionNotCovered { .. } => ErrorKind::InvalidProof,
            LightClientError::Signature(e) => e.kind(),
            LightClientError::Proof(e) => e.kind(),
        }
    }
}

/// Genesis state and validator set, installed once without a signature check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bootstrap {
    pub version: u64,
    pub epoch: u64,
    #[serde(with = "hex_serde")]
    pub state_root: Hash,
    #[serde(with = "hex_serde")]
    pub accumulator_root: Hash,
    pub timestamp: u64,
    pub validators: Vec<Validator>,
}

impl Bootstrap {
    pub fn trusted_state(&self) -> TrustedState {
        TrustedState {
            version: self.version,
            state_root: self.state_root,
            accumulator_root: self.accumulator_root,
            timestamp: self.timestamp,
            epoch: self.epoch,
        }
    }
}

/// A decoded, not yet verified, state update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateUpdate {
    pub ledger_info: LedgerInfo,
    pub aggregate: AggregateSignature,
    /// Wire-encoded validator set for the epoch the header opens.
    pub epoch_change_proof: Option<Vec<u8>>,
}

impl StateUpdate {
    /// Decode the wire form. An empty epoch change proof means none.
    pub fn decode(
        header_payload: &[u8],
        signature: &[u8],
        signer_bitmask: &[u8],
        epoch_change_proof: &[u8],
    ) -> Result<Self, DecodeError> {
        let ledger_info = LedgerInfo::decode_bytes(header_payload)?;
        let signature = BlsSignature::from_bytes(signature).map_err(|_| DecodeError::InvalidLength {
            field: "signature",
            expected: BLS_SIGNATURE_LEN,
            got: signature.len(),
        })?;
        Ok(Self {
            ledger_info,
            aggregate: AggregateSignature::new(signature, SignerBitmask::from_bytes(signer_bitmask)),
            epoch_change_proof: (!epoch_change_proof.is_empty()).then(|| epoch_change_proof.to_vec()),
        })
    }
}

/// Tracks the source chain from a trusted genesis: one [`TrustedState`],
/// one sealed [`ValidatorSet`] per installed epoch.
///
/// `Uninitialized -> Initialized` through [`LightClient::initialize`]; after
/// that only [`LightClient::update_state`] changes anything.
///
/// Every accepted update appends to an in-memory event log that is never
/// truncated on its own. Callers own draining it with
/// [`LightClient::take_events`]; [`crate::Bridge`] does so after each call
/// it forwards.
#[derive(Debug)]
pub struct LightClient<E: PairingEngine = Bls12Engine> {
    engine: E,
    config: ClientConfig,
    trusted: Option<TrustedState>,
    validator_sets: BTreeMap<u64, ValidatorSet>,
    events: Vec<Event>,
}

impl LightClient<Bls12Engine> {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_engine(Bls12Engine, config)
    }
}

impl<E: PairingEngine> LightClient<E> {
    pub fn with_engine(engine: E, config: ClientConfig) -> Self {
        Self {
            engine,
            config,
            trusted: None,
            validator_sets: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    /// Install the genesis state. Allowed exactly once, and only for the
    /// state the configured waypoint commits to.
    pub fn initialize(&mut self, bootstrap: Bootstrap) -> Result<(), LightClientError> {
        if self.trusted.is_some() {
            return Err(LightClientError::AlreadyInitialized);
        }

        let state = bootstrap.trusted_state();
        let validator_set = ValidatorSet::new(&self.engine, bootstrap.epoch, bootstrap.validators)?;
        self.config
            .genesis_waypoint
            .verify(&state, &validator_set.hash())
            .inspect_err(|e| warn!(error = %e, "bootstrap rejected"))?;

        info!(
            version = state.version,
            epoch = state.epoch,
            validators = validator_set.len(),
            "light client initialized"
        );
        self.validator_sets.insert(state.epoch, validator_set);
        self.trusted = Some(state);
        Ok(())
    }

    /// Decode, verify and apply a signed header.
    pub fn update_state(
        &mut self,
        header_payload: &[u8],
        signature: &[u8],
        signer_bitmask: &[u8],
        epoch_change_proof: &[u8],
    ) -> Result<TrustedState, LightClientError> {
        let update = StateUpdate::decode(header_payload, signature, signer_bitmask, epoch_change_proof)
            .map_err(LightClientError::from)
            .inspect_err(|e| warn!(error = %e, kind = %e.kind(), "state update rejected"))?;
        self.apply_update(&update)
    }

    /// Verify and apply an already decoded update.
    pub fn apply_update(&mut self, update: &StateUpdate) -> Result<TrustedState, LightClientError> {
        let result = self.try_apply(update);
        if let Err(e) = &result {
            warn!(
                version = update.ledger_info.version,
                epoch = update.ledger_info.epoch,
                error = %e,
                kind = %e.kind(),
                "state update rejected"
            );
        }
        result
    }

    fn try_apply(&mut self, update: &StateUpdate) -> Result<TrustedState, LightClientError> {
        let trusted = self.trusted.ok_or(LightClientError::NotInitialized)?;
        let info = &update.ledger_info;

        if info.version <= trusted.version {
            return Err(LightClientError::StaleUpdate {
                version: info.version,
                trusted_version: trusted.version,
            });
        }

        let staged = match info.epoch.cmp(&trusted.epoch) {
            Ordering::Less => {
                return Err(LightClientError::StaleEpoch {
                    epoch: info.epoch,
                    current_epoch: trusted.epoch,
                })
            }
            Ordering::Equal => {
                if update.epoch_change_proof.is_some() {
                    return Err(LightClientError::UnexpectedEpochChangeProof { epoch: info.epoch });
                }
                None
            }
            Ordering::Greater => Some(self.stage_epoch_change(&trusted, update)?),
        };

        // The outgoing epoch's set signs the header that hands over to the next one.
        let signing_set = self
            .validator_sets
            .get(&trusted.epoch)
            .ok_or(LightClientError::UnknownEpoch { epoch: trusted.epoch })?;
        verify_with_validator_set(
            &self.engine,
            self.config.dst(),
            &info.signing_hash(),
            &update.aggregate,
            signing_set,
        )?;

        let new_state = TrustedState::from(info);
        self.events.push(Event::StateUpdated {
            version: new_state.version,
            state_root: new_state.state_root,
            accumulator_root: new_state.accumulator_root,
            epoch: new_state.epoch,
            timestamp: new_state.timestamp,
        });
        if let Some(validator_set) = staged {
            info!(
                old_epoch = trusted.epoch,
                new_epoch = validator_set.epoch(),
                validators = validator_set.len(),
                "epoch changed"
            );
            self.events.push(Event::EpochChanged {
                old_epoch: trusted.epoch,
                new_epoch: validator_set.epoch(),
                validator_set_hash: validator_set.hash(),
            });
            self.validator_sets.insert(validator_set.epoch(), validator_set);
        }
        self.trusted = Some(new_state);

        info!(
            version = new_state.version,
            epoch = new_state.epoch,
            signers = update.aggregate.signers.count(),
            "trusted state advanced"
        );
        Ok(new_state)
    }

    fn stage_epoch_change(
        &self,
        trusted: &TrustedState,
        update: &StateUpdate,
    ) -> Result<ValidatorSet, LightClientError> {
        let info = &update.ledger_info;
        if trusted.epoch.checked_add(1) != Some(info.epoch) {
            return Err(LightClientError::EpochSkipped {
                epoch: info.epoch,
                current_epoch: trusted.epoch,
            });
        }
        if !info.declares_epoch_change() {
            return Err(LightClientError::UndeclaredEpochChange { epoch: info.epoch });
        }
        let proof = update
            .epoch_change_proof
            .as_deref()
            .ok_or(LightClientError::MissingEpochChangeProof { epoch: info.epoch })?;

        let validator_set = ValidatorSet::decode(&self.engine, info.epoch, proof)?;
        if validator_set.hash() != info.next_epoch_hash {
            return Err(LightClientError::ValidatorSetHashMismatch {
                expected: hex::encode(info.next_epoch_hash),
                got: hex::encode(validator_set.hash()),
            });
        }
        Ok(validator_set)
    }

    /// Check a header against the validator set of the epoch it declares,
    /// without touching trusted state. Works for any installed epoch.
    pub fn verify_ledger_info(
        &self,
        header_payload: &[u8],
        signature: &[u8],
        signer_bitmask: &[u8],
    ) -> Result<LedgerInfo, LightClientError> {
        let update = StateUpdate::decode(header_payload, signature, signer_bitmask, &[])?;
        let info = update.ledger_info;
        let validator_set = self
            .validator_sets
            .get(&info.epoch)
            .ok_or(LightClientError::UnknownEpoch { epoch: info.epoch })?;
        verify_with_validator_set(
            &self.engine,
            self.config.dst(),
            &info.signing_hash(),
            &update.aggregate,
            validator_set,
        )?;
        Ok(info)
    }

    pub fn is_initialized(&self) -> bool {
        self.trusted.is_some()
    }

    pub fn trusted_state(&self) -> Option<&TrustedState> {
        self.trusted.as_ref()
    }

    pub fn current_epoch(&self) -> Option<u64> {
        self.trusted.map(|state| state.epoch)
    }

    pub fn validator_set(&self, epoch: u64) -> Option<&ValidatorSet> {
        self.validator_sets.get(&epoch)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Events emitted since the last drain.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Hand over the log, oldest first, leaving it empty.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    fn trusted_or_err(&self) -> Result<&TrustedState, LightClientError> {
        self.trusted.as_ref().ok_or(LightClientError::NotInitialized)
    }

    /// Prove `key -> value_hash` in the trusted state tree.
    pub fn verify_state_inclusion(
        &self,
        key: &Hash,
        value_hash: &Hash,
        siblings: &[Hash],
    ) -> Result<(), LightClientError> {
        let trusted = self.trusted_or_err()?;
        Ok(verify_inclusion(&trusted.state_root, key, value_hash, siblings)?)
    }

    /// Prove `key` is absent from the trusted state tree via an empty subtree.
    pub fn verify_state_non_inclusion(&self, key: &Hash, siblings: &[Hash]) -> Result<(), LightClientError> {
        let trusted = self.trusted_or_err()?;
        Ok(verify_non_inclusion(&trusted.state_root, key, siblings)?)
    }

    /// Prove `key` is absent from the trusted state tree via a neighbouring leaf.
    pub fn verify_state_non_inclusion_with_leaf(
        &self,
        key: &Hash,
        proof: &ExplicitLeafProof,
    ) -> Result<(), LightClientError> {
        let trusted = self.trusted_or_err()?;
        Ok(verify_with_explicit_leaf(
            &trusted.state_root,
            key,
            &proof.leaf_key,
            &proof.leaf_value_hash,
            &proof.siblings,
        )?)
    }

    /// Prove the transaction at `version` is in the trusted accumulator.
    ///
    /// The trusted accumulator holds versions `0..=trusted.version`, so the
    /// proof must be exactly as deep as a tree of that many leaves.
    pub fn verify_transaction_inclusion(
        &self,
        transaction_hash: &Hash,
        version: u64,
        siblings: &[Hash],
    ) -> Result<(), LightClientError> {
        let trusted = self.trusted_or_err()?;
        if version > trusted.version {
            return Err(LightClientError::VersionNotCovered {
                version,
                trusted_version: trusted.version,
            });
        }
        Ok(verify_accumulator_leaf(
            &trusted.accumulator_root,
            transaction_hash,
            version,
            trusted.version.saturating_add(1),
            siblings,
        )?)
    }

    /// Prove a run of consecutive transactions starting at `first_version`.
    pub fn verify_transaction_range(
        &self,
        first_version: u64,
        transaction_hashes: &[Hash],
        proof: &AccumulatorRangeProof,
    ) -> Result<(), LightClientError> {
        let trusted = self.trusted_or_err()?;
        let last_version = (transaction_hashes.len() as u64)
            .checked_sub(1)
            .and_then(|offset| first_version.checked_add(offset))
            .unwrap_or(first_version);
        if last_version > trusted.version {
            return Err(LightClientError::VersionNotCovered {
                version: last_version,
                trusted_version: trusted.version,
            });
        }
        Ok(verify_accumulator_range_leaves(
            &trusted.accumulator_root,
            trusted.version.saturating_add(1),
            first_version,
            transaction_hashes,
            &proof.left_siblings,
            &proof.right_siblings,
        )?)
    }
}
