//! Pairing engine abstraction over BLS12-381.
//!
//! Every verifier in this crate is generic over [`PairingEngine`]; nothing
//! outside this module touches a concrete curve backend. [`Bls12Engine`] is
//! the production backend built on arkworks.

use std::fmt;

use ark_bls12_381::{g2, Bls12_381, Fr, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::hashing::curve_maps::wb::WBMap;
use ark_ec::hashing::map_to_curve_hasher::MapToCurveBasedHasher;
use ark_ec::hashing::HashToCurve;
use ark_ec::pairing::Pairing;
use ark_ec::{AffineRepr, CurveGroup, VariableBaseMSM};
use ark_ff::field_hashers::DefaultFieldHasher;
use ark_ff::{One, PrimeField, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use sha2::Sha256;
use thiserror::Error;

use crate::error::ErrorKind;

/// Number of bytes in a compressed G1 point.
pub const G1_COMPRESSED_LEN: usize = 48;

/// Number of bytes in a compressed G2 point.
pub const G2_COMPRESSED_LEN: usize = 96;

/// Errors from decoding points or from malformed arithmetic requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurveError {
    #[error("Invalid point encoding length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("Point does not decode to a curve point: {reason}")]
    InvalidEncoding { reason: String },

    #[error("Point is not in the prime-order subgroup")]
    NotInSubgroup,

    #[error("Multi-scalar multiplication length mismatch: {points} points, {scalars} scalars")]
    LengthMismatch { points: usize, scalars: usize },

    #[error("Hash to curve failed: {reason}")]
    HashToCurve { reason: String },
}

impl CurveError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::MalformedInput
    }
}

/// A 256-bit scalar in little-endian byte order, reduced modulo the group order on use.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Scalar(pub [u8; 32]);

impl Scalar {
    pub const ONE: Scalar = Scalar::from_u64(1);

    pub const fn from_u64(value: u64) -> Self {
        let le = value.to_le_bytes();
        let mut bytes = [0u8; 32];
        let mut i = 0;
        while i < 8 {
            bytes[i] = le[i];
            i += 1;
        }
        Scalar(bytes)
    }

    fn to_field(self) -> Fr {
        Fr::from_le_bytes_mod_order(&self.0)
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut be = self.0;
        be.reverse();
        write!(f, "Scalar(0x{})", hex::encode(be))
    }
}

/// Elliptic-curve operations needed by the signature verifier.
///
/// `G1` carries public keys, `G2` carries signatures and message hashes.
pub trait PairingEngine {
    type G1: Clone + fmt::Debug;
    type G2: Clone + fmt::Debug;

    /// Decode a compressed G1 point, rejecting off-curve and non-subgroup encodings.
    fn decode_g1(&self, bytes: &[u8]) -> Result<Self::G1, CurveError>;

    /// Decode a compressed G2 point, rejecting off-curve and non-subgroup encodings.
    fn decode_g2(&self, bytes: &[u8]) -> Result<Self::G2, CurveError>;

    fn encode_g1(&self, point: &Self::G1) -> Result<Vec<u8>, CurveError>;

    fn g1_identity(&self) -> Self::G1;

    fn g1_generator(&self) -> Self::G1;

    fn g1_is_identity(&self, point: &Self::G1) -> bool;

    fn add(&self, a: &Self::G1, b: &Self::G1) -> Self::G1;

    /// Field negation of the y coordinate (`p - y`).
    fn negate(&self, point: &Self::G1) -> Self::G1;

    fn scalar_mul(&self, point: &Self::G1, scalar: &Scalar) -> Self::G1;

    /// `sum(scalars[i] * points[i])`. Unit scalars skip the multiplication.
    fn multi_scalar_mul(
        &self,
        points: &[Self::G1],
        scalars: &[Scalar],
    ) -> Result<Self::G1, CurveError> {
        if points.len() != scalars.len() {
            return Err(CurveError::LengthMismatch {
                points: points.len(),
                scalars: scalars.len(),
            });
        }

        Ok(points
            .iter()
            .zip(scalars)
            .fold(self.g1_identity(), |acc, (point, scalar)| {
                if *scalar == Scalar::ONE {
                    self.add(&acc, point)
                } else {
                    self.add(&acc, &self.scalar_mul(point, scalar))
                }
            }))
    }

    /// Hash an arbitrary message to G2 under a domain separation tag.
    fn hash_to_curve(&self, message: &[u8], dst: &[u8]) -> Result<Self::G2, CurveError>;

    /// Returns true iff `prod e(g1_i, g2_i) == 1`.
    fn pairing_check(&self, pairs: &[(Self::G1, Self::G2)]) -> bool;
}

/// Hash-to-G2 suite `BLS12381G2_XMD:SHA-256_SSWU_RO_`.
type G2Hasher = MapToCurveBasedHasher<G2Projective, DefaultFieldHasher<Sha256, 128>, WBMap<g2::Config>>;

fn invalid_encoding(e: impl fmt::Display) -> CurveError {
    CurveError::InvalidEncoding { reason: e.to_string() }
}

fn check_len(bytes: &[u8], expected: usize) -> Result<(), CurveError> {
    if bytes.len() != expected {
        return Err(CurveError::InvalidLength {
            expected,
            got: bytes.len(),
        });
    }
    Ok(())
}

/// BLS12-381 engine backed by `ark-bls12-381`. Points use the zcash
/// compressed encoding, the same bytes validators sign and publish.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bls12Engine;

impl PairingEngine for Bls12Engine {
    type G1 = G1Projective;
    type G2 = G2Projective;

    fn decode_g1(&self, bytes: &[u8]) -> Result<G1Projective, CurveError> {
        check_len(bytes, G1_COMPRESSED_LEN)?;
        let affine = G1Affine::deserialize_compressed_unchecked(bytes).map_err(invalid_encoding)?;
        if !affine.is_in_correct_subgroup_assuming_on_curve() {
            return Err(CurveError::NotInSubgroup);
        }
        Ok(affine.into_group())
    }

    fn decode_g2(&self, bytes: &[u8]) -> Result<G2Projective, CurveError> {
        check_len(bytes, G2_COMPRESSED_LEN)?;
        let affine = G2Affine::deserialize_compressed_unchecked(bytes).map_err(invalid_encoding)?;
        if !affine.is_in_correct_subgroup_assuming_on_curve() {
            return Err(CurveError::NotInSubgroup);
        }
        Ok(affine.into_group())
    }

    fn encode_g1(&self, point: &G1Projective) -> Result<Vec<u8>, CurveError> {
        let mut out = Vec::with_capacity(G1_COMPRESSED_LEN);
        point
            .into_affine()
            .serialize_compressed(&mut out)
            .map_err(invalid_encoding)?;
        Ok(out)
    }

    fn g1_identity(&self) -> G1Projective {
        G1Projective::zero()
    }

    fn g1_generator(&self) -> G1Projective {
        G1Affine::generator().into_group()
    }

    fn g1_is_identity(&self, point: &G1Projective) -> bool {
        point.is_zero()
    }

    fn add(&self, a: &G1Projective, b: &G1Projective) -> G1Projective {
        *a + b
    }

    fn negate(&self, point: &G1Projective) -> G1Projective {
        -*point
    }

    fn scalar_mul(&self, point: &G1Projective, scalar: &Scalar) -> G1Projective {
        *point * scalar.to_field()
    }

    fn multi_scalar_mul(
        &self,
        points: &[G1Projective],
        scalars: &[Scalar],
    ) -> Result<G1Projective, CurveError> {
        if points.len() != scalars.len() {
            return Err(CurveError::LengthMismatch {
                points: points.len(),
                scalars: scalars.len(),
            });
        }
        // Plain aggregation needs no multiplication at all.
        if scalars.iter().all(|scalar| *scalar == Scalar::ONE) {
            return Ok(points.iter().sum());
        }

        let bases = G1Projective::normalize_batch(points);
        let scalars: Vec<Fr> = scalars.iter().map(|scalar| scalar.to_field()).collect();
        G1Projective::msm(&bases, &scalars).map_err(|_| CurveError::LengthMismatch {
            points: points.len(),
            scalars: scalars.len(),
        })
    }

    fn hash_to_curve(&self, message: &[u8], dst: &[u8]) -> Result<G2Projective, CurveError> {
        let hasher = G2Hasher::new(dst).map_err(|e| CurveError::HashToCurve { reason: format!("{:?}", e) })?;
        let point = hasher
            .hash(message)
            .map_err(|e| CurveError::HashToCurve { reason: format!("{:?}", e) })?;
        Ok(point.into_group())
    }

    fn pairing_check(&self, pairs: &[(G1Projective, G2Projective)]) -> bool {
        // e(O, Q) = e(P, O) = 1, so such pairs contribute nothing.
        let (g1s, g2s): (Vec<G1Affine>, Vec<G2Affine>) = pairs
            .iter()
            .filter(|(p, q)| !p.is_zero() && !q.is_zero())
            .map(|(p, q)| (p.into_affine(), q.into_affine()))
            .unzip();
        Bls12_381::multi_pairing(g1s, g2s).0.is_one()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_secret_key, TEST_DST};

    #[test]
    fn test_decode_rejects_wrong_length() {
        let engine = Bls12Engine;
        assert!(matches!(
            engine.decode_g1(&[0u8; 47]),
            Err(CurveError::InvalidLength { expected: 48, got: 47 })
        ));
        assert!(matches!(
            engine.decode_g2(&[0u8; 95]),
            Err(CurveError::InvalidLength { expected: 96, got: 95 })
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let engine = Bls12Engine;
        // Compression flag set but x is not on the curve.
        let mut bytes = [0xffu8; 48];
        bytes[0] = 0x9f;
        assert!(engine.decode_g1(&bytes).is_err());
    }

    #[test]
    fn test_encode_decode_public_key() {
        let engine = Bls12Engine;
        let pk = test_secret_key(1).sk_to_pk().to_bytes();
        let point = engine.decode_g1(&pk).unwrap();
        assert_eq!(engine.encode_g1(&point).unwrap(), pk.to_vec());
    }

    #[test]
    fn test_negate_cancels() {
        let engine = Bls12Engine;
        let g = engine.g1_generator();
        let sum = engine.add(&g, &engine.negate(&g));
        assert!(engine.g1_is_identity(&sum));
        assert!(!engine.g1_is_identity(&g));
    }

    #[test]
    fn test_scalar_mul_matches_repeated_add() {
        let engine = Bls12Engine;
        let g = engine.g1_generator();
        let three_g = engine.scalar_mul(&g, &Scalar::from_u64(3));
        let sum = engine.add(&engine.add(&g, &g), &g);
        assert_eq!(three_g, sum);
    }

    #[test]
    fn test_multi_scalar_mul() {
        let engine = Bls12Engine;
        let g = engine.g1_generator();
        let msm = engine
            .multi_scalar_mul(&[g, g], &[Scalar::from_u64(2), Scalar::ONE])
            .unwrap();
        let expected = engine.scalar_mul(&g, &Scalar::from_u64(3));
        assert_eq!(msm, expected);

        assert!(matches!(
            engine.multi_scalar_mul(&[g], &[]),
            Err(CurveError::LengthMismatch { points: 1, scalars: 0 })
        ));
    }

    #[test]
    fn test_pairing_check_bls_equation() {
        let engine = Bls12Engine;
        let sk = test_secret_key(7);
        let message = [0x42u8; 32];
        let pk = engine.decode_g1(&sk.sk_to_pk().to_bytes()).unwrap();
        let sig = engine
            .decode_g2(&sk.sign(&message, TEST_DST, &[]).to_bytes())
            .unwrap();
        let h = engine.hash_to_curve(&message, TEST_DST).unwrap();
        let neg_g1 = engine.negate(&engine.g1_generator());

        assert!(engine.pairing_check(&[(pk, h), (neg_g1, sig)]));

        // Without the negation the product is e(g1, H)^(2sk) != 1.
        let g1 = engine.g1_generator();
        assert!(!engine.pairing_check(&[(pk, h), (g1, sig)]));
    }

    #[test]
    fn test_pairing_check_empty_is_one() {
        assert!(Bls12Engine.pairing_check(&[]));
    }
}
