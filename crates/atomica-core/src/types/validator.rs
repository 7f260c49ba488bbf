use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::crypto::{tagged_hash, Hash, HashDomain, PairingEngine};
use crate::types::codec::{hex_serde, Decode, DecodeError, Encode, Reader};

/// Number of bytes in a BLS12-381 public key (compressed G1 point).
pub const BLS_PUBKEY_LEN: usize = 48;

/// Number of bytes in a BLS12-381 signature (compressed G2 point).
pub const BLS_SIGNATURE_LEN: usize = 96;

/// Upper bound on validator set size accepted from the wire.
pub const MAX_VALIDATORS: usize = 65_536;

/// Smallest possible encoded validator entry: length prefix, key, power, identity.
const MIN_VALIDATOR_ENTRY_LEN: usize = 4 + BLS_PUBKEY_LEN + 8 + 32;

/// A BLS12-381 public key (48 bytes, compressed G1 point).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlsPublicKey(pub [u8; BLS_PUBKEY_LEN]);

impl Serialize for BlsPublicKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
    }
}

impl<'de> Deserialize<'de> for BlsPublicKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl BlsPublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, &'static str> {
        if bytes.len() != BLS_PUBKEY_LEN {
            return Err("Invalid BLS public key length");
        }
        let mut arr = [0u8; BLS_PUBKEY_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }
}

/// A BLS12-381 signature (96 bytes, compressed G2 point).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlsSignature(pub [u8; BLS_SIGNATURE_LEN]);

impl Serialize for BlsSignature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
    }
}

impl<'de> Deserialize<'de> for BlsSignature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl BlsSignature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, &'static str> {
        if bytes.len() != BLS_SIGNATURE_LEN {
            return Err("Invalid BLS signature length");
        }
        let mut arr = [0u8; BLS_SIGNATURE_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }
}

/// A single source-chain validator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub public_key: BlsPublicKey,
    pub voting_power: u64,
    /// Source-chain account address of the validator.
    #[serde(with = "hex_serde")]
    pub identity: Hash,
}

impl Decode for Validator {
    const SCHEMA: &'static str = "validator";

    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let pubkey_len = reader.read_u32("pubkeyLen")? as usize;
        if pubkey_len != BLS_PUBKEY_LEN {
            return Err(DecodeError::InvalidLength {
                field: "pubkey",
                expected: BLS_PUBKEY_LEN,
                got: pubkey_len,
            });
        }
        let public_key = BlsPublicKey(reader.read_array::<BLS_PUBKEY_LEN>("pubkey")?);
        let voting_power = reader.read_u64("votingPower")?;
        let identity = reader.read_hash("identity")?;
        Ok(Self {
            public_key,
            voting_power,
            identity,
        })
    }
}

impl Encode for Validator {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(BLS_PUBKEY_LEN as u32).to_le_bytes());
        out.extend_from_slice(&self.public_key.0);
        out.extend_from_slice(&self.voting_power.to_le_bytes());
        out.extend_from_slice(&self.identity);
    }
}

/// Decode the wire form of a validator list: `count:u32` then `count` entries.
pub fn decode_validators(bytes: &[u8]) -> Result<Vec<Validator>, DecodeError> {
    let mut reader = Reader::new(bytes);
    let count = reader.read_u32("count")? as usize;
    if count > MAX_VALIDATORS {
        return Err(DecodeError::TooManyValidators {
            count,
            max: MAX_VALIDATORS,
        });
    }
    // Never allocate for entries the payload cannot contain.
    let needed = count * MIN_VALIDATOR_ENTRY_LEN;
    if reader.remaining() < needed {
        return Err(DecodeError::UnexpectedEnd {
            field: "validators",
            needed,
            remaining: reader.remaining(),
        });
    }

    let mut validators = Vec::with_capacity(count);
    for _ in 0..count {
        validators.push(Validator::decode(&mut reader)?);
    }
    reader.finish("validator set")?;
    Ok(validators)
}

pub fn encode_validators(validators: &[Validator]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + validators.len() * MIN_VALIDATOR_ENTRY_LEN);
    out.extend_from_slice(&(validators.len() as u32).to_le_bytes());
    for validator in validators {
        validator.encode(&mut out);
    }
    out
}

/// Commitment to a validator list, as carried in a header's `nextEpochHash`.
pub fn validator_set_hash(validators: &[Validator]) -> Hash {
    tagged_hash(HashDomain::ValidatorSet, &[&encode_validators(validators)])
}

/// `floor(2 * total / 3) + 1`.
pub fn quorum_voting_power(total_voting_power: u128) -> u128 {
    total_voting_power * 2 / 3 + 1
}

/// The sealed validator set authoritative for one epoch.
/// Only constructed through [`ValidatorSet::new`], which validates every key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidatorSet {
    epoch: u64,
    validators: Vec<Validator>,
    total_voting_power: u128,
    quorum_voting_power: u128,
    #[serde(with = "hex_serde")]
    validator_set_hash: Hash,
}

impl ValidatorSet {
    /// Seal a validator list for `epoch`.
    ///
    /// Rejects empty sets, zero total power, oversized sets, duplicate keys,
    /// and keys that are not valid non-identity G1 subgroup points.
    pub fn new<E: PairingEngine>(
        engine: &E,
        epoch: u64,
        validators: Vec<Validator>,
    ) -> Result<Self, DecodeError> {
        if validators.is_empty() {
            return Err(DecodeError::EmptyValidatorSet);
        }
        if validators.len() > MAX_VALIDATORS {
            return Err(DecodeError::TooManyValidators {
                count: validators.len(),
                max: MAX_VALIDATORS,
            });
        }

        let mut seen = HashSet::with_capacity(validators.len());
        for (index, validator) in validators.iter().enumerate() {
            if !seen.insert(&validator.public_key) {
                return Err(DecodeError::DuplicatePublicKey { index });
            }
            let point = engine
                .decode_g1(&validator.public_key.0)
                .map_err(|source| DecodeError::InvalidPublicKey { index, source })?;
            if engine.g1_is_identity(&point) {
                return Err(DecodeError::InvalidPublicKey {
                    index,
                    source: crate::crypto::CurveError::InvalidEncoding {
                        reason: "identity point".into(),
                    },
                });
            }
        }

        let total_voting_power: u128 = validators.iter().map(|v| v.voting_power as u128).sum();
        if total_voting_power == 0 {
            return Err(DecodeError::ZeroVotingPower);
        }

        Ok(Self {
            epoch,
            total_voting_power,
            quorum_voting_power: quorum_voting_power(total_voting_power),
            validator_set_hash: validator_set_hash(&validators),
            validators,
        })
    }

    /// Decode and seal a wire-encoded validator list.
    pub fn decode<E: PairingEngine>(
        engine: &E,
        epoch: u64,
        bytes: &[u8],
    ) -> Result<Self, DecodeError> {
        Self::new(engine, epoch, decode_validators(bytes)?)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn total_voting_power(&self) -> u128 {
        self.total_voting_power
    }

    pub fn quorum_voting_power(&self) -> u128 {
        self.quorum_voting_power
    }

    pub fn hash(&self) -> Hash {
        self.validator_set_hash
    }

    pub fn public_keys(&self) -> Vec<BlsPublicKey> {
        self.validators.iter().map(|v| v.public_key.clone()).collect()
    }

    pub fn voting_powers(&self) -> Vec<u64> {
        self.validators.iter().map(|v| v.voting_power).collect()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encode_validators(&self.validators)
    }
}
