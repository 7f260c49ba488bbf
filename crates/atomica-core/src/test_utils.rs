//! Deterministic fixtures shared by the unit tests.

use blst::min_pk::{AggregateSignature as BlstAggregateSignature, SecretKey, Signature};

use crate::config::ClientConfig;
use crate::consensus::{AggregateSignature, Bootstrap, SignerBitmask, Waypoint, DEFAULT_SIGNATURE_DST};
use crate::crypto::{Hash, ZERO_HASH};
use crate::types::{validator_set_hash, BlsPublicKey, BlsSignature, LedgerInfo, Validator};

pub const TEST_DST: &[u8] = DEFAULT_SIGNATURE_DST;

/// A BLS secret key derived from 32 bytes of `seed`.
pub fn test_secret_key(seed: u8) -> SecretKey {
    SecretKey::key_gen(&[seed; 32], &[]).expect("32 bytes of key material")
}

/// Validators with the given powers, keyed from seeds `first_seed..`.
pub fn validators_from_seed(powers: &[u64], first_seed: u8) -> (Vec<SecretKey>, Vec<Validator>) {
    powers
        .iter()
        .enumerate()
        .map(|(i, &voting_power)| {
            let seed = first_seed + i as u8;
            let secret = test_secret_key(seed);
            let validator = Validator {
                public_key: BlsPublicKey(secret.sk_to_pk().to_bytes()),
                voting_power,
                identity: [seed; 32],
            };
            (secret, validator)
        })
        .unzip()
}

pub fn test_validators(powers: &[u64]) -> (Vec<SecretKey>, Vec<Validator>) {
    validators_from_seed(powers, 1)
}

/// Aggregate signature over `message` by the listed signers.
pub fn sign_aggregate(secrets: &[SecretKey], signers: &[usize], message: &Hash) -> AggregateSignature {
    let signatures: Vec<Signature> = signers
        .iter()
        .map(|&i| secrets[i].sign(message, TEST_DST, &[]))
        .collect();
    let refs: Vec<&Signature> = signatures.iter().collect();
    let aggregate = BlstAggregateSignature::aggregate(&refs, false)
        .expect("at least one signature")
        .to_signature();

    AggregateSignature::new(
        BlsSignature(aggregate.to_bytes()),
        SignerBitmask::from_indices(signers.iter().copied()),
    )
}

pub fn sign_ledger_info(secrets: &[SecretKey], signers: &[usize], info: &LedgerInfo) -> AggregateSignature {
    sign_aggregate(secrets, signers, &info.signing_hash())
}

/// A header that stays in `epoch`, with roots derived from `version`.
pub fn ledger_info(version: u64, epoch: u64) -> LedgerInfo {
    let mut state_root = [0x5A; 32];
    state_root[..8].copy_from_slice(&version.to_le_bytes());
    let mut accumulator_root = [0xA5; 32];
    accumulator_root[..8].copy_from_slice(&version.to_le_bytes());
    LedgerInfo {
        version,
        epoch,
        accumulator_root,
        state_root,
        timestamp: 1_700_000_000_000_000 + version,
        next_epoch_hash: ZERO_HASH,
    }
}

pub struct Genesis {
    pub secrets: Vec<SecretKey>,
    pub bootstrap: Bootstrap,
    pub config: ClientConfig,
}

/// Genesis at version 100, epoch 1, with a waypoint that authorizes it.
pub fn genesis(powers: &[u64]) -> Genesis {
    let (secrets, validators) = test_validators(powers);
    let header = ledger_info(100, 1);
    let bootstrap = Bootstrap {
        version: header.version,
        epoch: header.epoch,
        state_root: header.state_root,
        accumulator_root: header.accumulator_root,
        timestamp: header.timestamp,
        validators,
    };
    let waypoint = Waypoint::from_genesis(
        &bootstrap.trusted_state(),
        &validator_set_hash(&bootstrap.validators),
    );
    Genesis {
        secrets,
        bootstrap,
        config: ClientConfig::new(waypoint),
    }
}
