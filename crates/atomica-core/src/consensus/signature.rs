use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::crypto::{CurveError, Hash, PairingEngine, Scalar};
use crate::error::ErrorKind;
use crate::types::{BlsPublicKey, BlsSignature, ValidatorSet};

/// Domain separation tag for hashing signed messages to G2 (proof-of-possession scheme).
pub const DEFAULT_SIGNATURE_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Errors that can occur during aggregate signature verification.
/// Each variant represents a specific, actionable failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("Public key count {public_keys} does not match voting power count {voting_powers}")]
    LengthMismatch {
        public_keys: usize,
        voting_powers: usize,
    },

    #[error("Signer bitmask is empty")]
    NoSigners,

    #[error("Signer index {index} is outside a validator set of {validators}")]
    SignerOutOfRange { index: usize, validators: usize },

    #[error("Insufficient voting power: signers hold {signed}, quorum is {required}")]
    InsufficientVotingPower { signed: u128, required: u128 },

    #[error("Invalid BLS public key at index {index}: {source}")]
    InvalidPublicKey {
        index: usize,
        #[source]
        source: CurveError,
    },

    #[error("Invalid BLS signature encoding: {0}")]
    InvalidSignatureEncoding(#[source] CurveError),

    #[error("Aggregated public key is the identity point")]
    IdentityAggregate,

    #[error("Invalid BLS signature: the aggregate signature does not verify against the selected signers")]
    InvalidSignature,

    #[error("Curve arithmetic error: {0}")]
    Curve(#[from] CurveError),
}

impl VerificationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VerificationError::InsufficientVotingPower { .. } => ErrorKind::InsufficientVotingPower,
            VerificationError::NoSigners
            | VerificationError::IdentityAggregate
            | VerificationError::InvalidSignature => ErrorKind::InvalidProof,
            VerificationError::LengthMismatch { .. }
            | VerificationError::SignerOutOfRange { .. }
            | VerificationError::InvalidPublicKey { .. }
            | VerificationError::InvalidSignatureEncoding(_)
            | VerificationError::Curve(_) => ErrorKind::MalformedInput,
        }
    }
}

/// Which validators signed. Bit `i` is validator `i`, least-significant bit
/// of byte 0 first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignerBitmask(BitVec<u8, Lsb0>);

impl SignerBitmask {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(BitVec::from_slice(bytes))
    }

    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Self {
        let indices: Vec<usize> = indices.into_iter().collect();
        let len = indices.iter().max().map_or(0, |max| max / 8 + 1);
        let mut bytes = vec![0u8; len];
        let bits = bytes.view_bits_mut::<Lsb0>();
        for index in indices {
            bits.set(index, true);
        }
        Self::from_bytes(&bytes)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.as_raw_slice().to_vec()
    }

    pub fn is_set(&self, index: usize) -> bool {
        self.0.get(index).map_or(false, |bit| *bit)
    }

    /// Indices of every signer, ascending.
    pub fn signers(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter_ones()
    }

    pub fn count(&self) -> usize {
        self.0.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.0.not_any()
    }

    pub fn highest_signer(&self) -> Option<usize> {
        self.0.last_one()
    }
}

impl Serialize for SignerBitmask {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.to_bytes())))
    }
}

impl<'de> Deserialize<'de> for SignerBitmask {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        Ok(Self::from_bytes(&bytes))
    }
}

/// An aggregate signature together with the bitmask of who produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSignature {
    pub signature: BlsSignature,
    pub signers: SignerBitmask,
}

impl AggregateSignature {
    pub fn new(signature: BlsSignature, signers: SignerBitmask) -> Self {
        Self { signature, signers }
    }
}

/// Verify an aggregate BLS signature over `message_hash` and enforce quorum.
///
/// Selected keys are aggregated with unit coefficients: voting power only
/// gates quorum and never weights the aggregate. Checks run cheapest first,
/// so a malformed or under-quorum request never reaches a pairing.
pub fn verify_aggregate<E: PairingEngine>(
    engine: &E,
    dst: &[u8],
    message_hash: &Hash,
    aggregate: &AggregateSignature,
    public_keys: &[BlsPublicKey],
    voting_powers: &[u64],
    quorum_voting_power: u128,
) -> Result<(), VerificationError> {
    if public_keys.len() != voting_powers.len() {
        return Err(VerificationError::LengthMismatch {
            public_keys: public_keys.len(),
            voting_powers: voting_powers.len(),
        });
    }

    let signers = &aggregate.signers;
    let Some(highest) = signers.highest_signer() else {
        return Err(VerificationError::NoSigners);
    };
    if highest >= public_keys.len() {
        return Err(VerificationError::SignerOutOfRange {
            index: highest,
            validators: public_keys.len(),
        });
    }

    let signed: u128 = signers.signers().map(|i| voting_powers[i] as u128).sum();
    if signed < quorum_voting_power {
        debug!(signed, quorum_voting_power, "aggregate below quorum");
        return Err(VerificationError::InsufficientVotingPower {
            signed,
            required: quorum_voting_power,
        });
    }

    let points = signers
        .signers()
        .map(|index| {
            engine
                .decode_g1(&public_keys[index].0)
                .map_err(|source| VerificationError::InvalidPublicKey { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let signature = engine
        .decode_g2(&aggregate.signature.0)
        .map_err(VerificationError::InvalidSignatureEncoding)?;

    let scalars = vec![Scalar::ONE; points.len()];
    let aggregate_key = engine.multi_scalar_mul(&points, &scalars)?;
    if engine.g1_is_identity(&aggregate_key) {
        return Err(VerificationError::IdentityAggregate);
    }

    // e(aggPk, H(m)) * e(-g1, sig) == 1
    let message_point = engine.hash_to_curve(message_hash, dst)?;
    let neg_generator = engine.negate(&engine.g1_generator());
    if !engine.pairing_check(&[(aggregate_key, message_point), (neg_generator, signature)]) {
        debug!(signers = signers.count(), "aggregate signature pairing check failed");
        return Err(VerificationError::InvalidSignature);
    }

    Ok(())
}

/// [`verify_aggregate`] against a sealed validator set and its quorum.
pub fn verify_with_validator_set<E: PairingEngine>(
    engine: &E,
    dst: &[u8],
    message_hash: &Hash,
    aggregate: &AggregateSignature,
    validator_set: &ValidatorSet,
) -> Result<(), VerificationError> {
    verify_aggregate(
        engine,
        dst,
        message_hash,
        aggregate,
        &validator_set.public_keys(),
        &validator_set.voting_powers(),
        validator_set.quorum_voting_power(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Bls12Engine;
    use crate::test_utils::{sign_aggregate, test_validators, TEST_DST};
    use crate::types::quorum_voting_power;

    const MESSAGE: Hash = [0x42; 32];

    fn keys_and_powers(powers: &[u64]) -> (Vec<blst::min_pk::SecretKey>, Vec<BlsPublicKey>) {
        let (secrets, validators) = test_validators(powers);
        let keys = validators.into_iter().map(|v| v.public_key).collect();
        (secrets, keys)
    }

    #[test]
    fn test_three_of_four_reaches_quorum() {
        let powers = [25, 25, 25, 25];
        let (secrets, keys) = keys_and_powers(&powers);
        let quorum = quorum_voting_power(100);
        assert_eq!(quorum, 67);

        let aggregate = sign_aggregate(&secrets, &[0, 1, 2], &MESSAGE);
        verify_aggregate(&Bls12Engine, TEST_DST, &MESSAGE, &aggregate, &keys, &powers, quorum).unwrap();
    }

    #[test]
    fn test_agrees_with_blst_reference_verifier() {
        use blst::min_pk::{PublicKey, Signature};
        use blst::BLST_ERROR;

        let powers = [25, 25, 25, 25];
        let (secrets, keys) = keys_and_powers(&powers);
        let aggregate = sign_aggregate(&secrets, &[0, 2, 3], &MESSAGE);

        let signature = Signature::from_bytes(&aggregate.signature.0).unwrap();
        let public_keys: Vec<PublicKey> = [0, 2, 3]
            .iter()
            .map(|&i| PublicKey::from_bytes(&keys[i].0).unwrap())
            .collect();
        let refs: Vec<&PublicKey> = public_keys.iter().collect();

        for message in [MESSAGE, [0x43; 32]] {
            let reference = signature.fast_aggregate_verify(true, &message, TEST_DST, &refs) == BLST_ERROR::BLST_SUCCESS;
            let ours = verify_aggregate(&Bls12Engine, TEST_DST, &message, &aggregate, &keys, &powers, 67).is_ok();
            assert_eq!(ours, reference);
            assert_eq!(ours, message == MESSAGE);
        }
    }

    #[test]
    fn test_two_of_four_rejected_even_with_valid_signature() {
        let powers = [25, 25, 25, 25];
        let (secrets, keys) = keys_and_powers(&powers);

        let aggregate = sign_aggregate(&secrets, &[0, 1], &MESSAGE);
        assert_eq!(
            verify_aggregate(&Bls12Engine, TEST_DST, &MESSAGE, &aggregate, &keys, &powers, 67),
            Err(VerificationError::InsufficientVotingPower {
                signed: 50,
                required: 67
            })
        );
    }

    #[test]
    fn test_aggregation_is_unweighted() {
        // Unequal powers; the signature is a plain sum of the signers' signatures.
        let powers = [1, 10, 100];
        let (secrets, keys) = keys_and_powers(&powers);
        let quorum = quorum_voting_power(111);

        let aggregate = sign_aggregate(&secrets, &[1, 2], &MESSAGE);
        verify_aggregate(&Bls12Engine, TEST_DST, &MESSAGE, &aggregate, &keys, &powers, quorum).unwrap();
    }

    #[test]
    fn test_wrong_message_or_signer_set_rejected() {
        let powers = [25, 25, 25, 25];
        let (secrets, keys) = keys_and_powers(&powers);
        let aggregate = sign_aggregate(&secrets, &[0, 1, 2], &MESSAGE);

        assert_eq!(
            verify_aggregate(&Bls12Engine, TEST_DST, &[0x43; 32], &aggregate, &keys, &powers, 67),
            Err(VerificationError::InvalidSignature)
        );

        // Claim a different signer set with the same signature.
        let relabelled = AggregateSignature::new(
            aggregate.signature.clone(),
            SignerBitmask::from_indices([0, 1, 3]),
        );
        assert_eq!(
            verify_aggregate(&Bls12Engine, TEST_DST, &MESSAGE, &relabelled, &keys, &powers, 67),
            Err(VerificationError::InvalidSignature)
        );

        // A different domain separation tag.
        assert_eq!(
            verify_aggregate(&Bls12Engine, b"OTHER_DST", &MESSAGE, &aggregate, &keys, &powers, 67),
            Err(VerificationError::InvalidSignature)
        );
    }

    #[test]
    fn test_malformed_inputs_rejected_before_crypto() {
        let powers = [25, 25, 25, 25];
        let (secrets, keys) = keys_and_powers(&powers);
        let aggregate = sign_aggregate(&secrets, &[0, 1, 2], &MESSAGE);

        assert_eq!(
            verify_aggregate(&Bls12Engine, TEST_DST, &MESSAGE, &aggregate, &keys, &powers[..3], 67),
            Err(VerificationError::LengthMismatch {
                public_keys: 4,
                voting_powers: 3
            })
        );

        let empty = AggregateSignature::new(aggregate.signature.clone(), SignerBitmask::from_bytes(&[0, 0]));
        assert_eq!(
            verify_aggregate(&Bls12Engine, TEST_DST, &MESSAGE, &empty, &keys, &powers, 67),
            Err(VerificationError::NoSigners)
        );

        let out_of_range = AggregateSignature::new(
            aggregate.signature.clone(),
            SignerBitmask::from_indices([0, 1, 2, 9]),
        );
        assert_eq!(
            verify_aggregate(&Bls12Engine, TEST_DST, &MESSAGE, &out_of_range, &keys, &powers, 67),
            Err(VerificationError::SignerOutOfRange {
                index: 9,
                validators: 4
            })
        );

        let garbage = AggregateSignature::new(BlsSignature([0xFF; 96]), aggregate.signers.clone());
        assert!(matches!(
            verify_aggregate(&Bls12Engine, TEST_DST, &MESSAGE, &garbage, &keys, &powers, 67),
            Err(VerificationError::InvalidSignatureEncoding(_))
        ));
    }

    #[test]
    fn test_cancelling_keys_rejected() {
        // pk and -pk sum to the identity.
        let engine = Bls12Engine;
        let powers = [50, 50];
        let (secrets, mut keys) = keys_and_powers(&powers);
        let point = engine.decode_g1(&keys[0].0).unwrap();
        let negated = engine.encode_g1(&engine.negate(&point)).unwrap();
        keys[1] = BlsPublicKey::from_bytes(&negated).unwrap();

        let aggregate = AggregateSignature::new(
            sign_aggregate(&secrets, &[0], &MESSAGE).signature,
            SignerBitmask::from_indices([0, 1]),
        );
        assert_eq!(
            verify_aggregate(&engine, TEST_DST, &MESSAGE, &aggregate, &keys, &powers, 67),
            Err(VerificationError::IdentityAggregate)
        );
    }

    #[test]
    fn test_verify_with_validator_set() {
        let (secrets, validators) = test_validators(&[25, 25, 25, 25]);
        let set = ValidatorSet::new(&Bls12Engine, 1, validators).unwrap();

        let good = sign_aggregate(&secrets, &[1, 2, 3], &MESSAGE);
        verify_with_validator_set(&Bls12Engine, TEST_DST, &MESSAGE, &good, &set).unwrap();

        let weak = sign_aggregate(&secrets, &[3], &MESSAGE);
        let err = verify_with_validator_set(&Bls12Engine, TEST_DST, &MESSAGE, &weak, &set).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientVotingPower);
    }

    #[test]
    fn test_signer_bitmask_bit_order() {
        let mask = SignerBitmask::from_bytes(&[0b0000_0101, 0b0000_0001]);
        assert_eq!(mask.signers().collect::<Vec<_>>(), vec![0, 2, 8]);
        assert_eq!(mask.count(), 3);
        assert!(mask.is_set(2));
        assert!(!mask.is_set(1));
        assert!(!mask.is_set(100));
        assert_eq!(mask.highest_signer(), Some(8));

        assert_eq!(SignerBitmask::from_indices([0, 2, 8]), mask);
        assert_eq!(mask.to_bytes(), vec![0b0000_0101, 0b0000_0001]);

        assert!(SignerBitmask::default().is_empty());
        assert!(SignerBitmask::from_bytes(&[0, 0]).is_empty());
    }

    #[test]
    fn test_signer_bitmask_serde() {
        let mask = SignerBitmask::from_indices([0, 9]);
        let json = serde_json::to_string(&mask).unwrap();
        assert_eq!(json, "\"0x0102\"");
        assert_eq!(serde_json::from_str::<SignerBitmask>(&json).unwrap(), mask);
    }
}
