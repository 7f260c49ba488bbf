//! Schema-driven binary decoding.
//!
//! Every wire structure is read through a bounds-checked [`Reader`]; a short
//! or over-long payload is a [`DecodeError`], never a panic or a silent
//! truncation. All integers are little-endian.

use thiserror::Error;

use crate::crypto::{CurveError, Hash};
use crate::error::ErrorKind;

/// Errors while decoding wire payloads or validating decoded structures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Unexpected end of input reading {field}: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("{remaining} trailing bytes after {schema}")]
    TrailingBytes {
        schema: &'static str,
        remaining: usize,
    },

    #[error("Invalid length for {field}: expected {expected}, got {got}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Sibling array length {len} is not a multiple of 32")]
    UnalignedSiblings { len: usize },

    #[error("Validator set is empty")]
    EmptyValidatorSet,

    #[error("Validator set has {count} entries, maximum is {max}")]
    TooManyValidators { count: usize, max: usize },

    #[error("Validator set has zero total voting power")]
    ZeroVotingPower,

    #[error("Duplicate public key at validator index {index}")]
    DuplicatePublicKey { index: usize },

    #[error("Invalid BLS public key at validator index {index}: {source}")]
    InvalidPublicKey {
        index: usize,
        #[source]
        source: CurveError,
    },

    #[error("Invalid hex in {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::MalformedInput
    }
}

/// Bounds-checked cursor over a byte slice.
pub struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn read_bytes(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEnd {
                field,
                needed: len,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N, field)?);
        Ok(out)
    }

    pub fn read_hash(&mut self, field: &'static str) -> Result<Hash, DecodeError> {
        self.read_array::<32>(field)
    }

    pub fn read_u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array::<4>(field)?))
    }

    pub fn read_u64(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.read_array::<8>(field)?))
    }

    pub fn read_u128(&mut self, field: &'static str) -> Result<u128, DecodeError> {
        Ok(u128::from_le_bytes(self.read_array::<16>(field)?))
    }

    /// Require that the whole payload was consumed.
    pub fn finish(self, schema: &'static str) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(DecodeError::TrailingBytes { schema, remaining }),
        }
    }
}

/// A wire structure with a fixed schema.
pub trait Decode: Sized {
    /// Name used in error messages.
    const SCHEMA: &'static str;

    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError>;

    /// Decode a complete payload, rejecting trailing bytes.
    fn decode_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes);
        let value = Self::decode(&mut reader)?;
        reader.finish(Self::SCHEMA)?;
        Ok(value)
    }
}

pub trait Encode {
    fn encode(&self, out: &mut Vec<u8>);

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}

/// Decode a flat array of 32-byte sibling hashes.
pub fn decode_siblings(bytes: &[u8]) -> Result<Vec<Hash>, DecodeError> {
    if bytes.len() % 32 != 0 {
        return Err(DecodeError::UnalignedSiblings { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(32)
        .map(|chunk| {
            let mut hash = [0u8; 32];
            hash.copy_from_slice(chunk);
            hash
        })
        .collect())
}

pub fn encode_siblings(siblings: &[Hash]) -> Vec<u8> {
    siblings.iter().flat_map(|s| s.iter().copied()).collect()
}

/// Non-inclusion proof against an explicit neighbouring leaf:
/// `leafKey:32B, leafValueHash:32B` followed by the sibling array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExplicitLeafProof {
    pub leaf_key: Hash,
    pub leaf_value_hash: Hash,
    pub siblings: Vec<Hash>,
}

impl Decode for ExplicitLeafProof {
    const SCHEMA: &'static str = "explicit-leaf proof";

    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let leaf_key = reader.read_hash("leafKey")?;
        let leaf_value_hash = reader.read_hash("leafValueHash")?;
        let rest = reader.read_bytes(reader.remaining(), "siblings")?;
        Ok(Self {
            leaf_key,
            leaf_value_hash,
            siblings: decode_siblings(rest)?,
        })
    }
}

impl Encode for ExplicitLeafProof {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.leaf_key);
        out.extend_from_slice(&self.leaf_value_hash);
        out.extend_from_slice(&encode_siblings(&self.siblings));
    }
}

/// Parse a hex string with optional `0x` prefix.
pub fn hex_to_bytes(s: &str, field: &'static str) -> Result<Vec<u8>, DecodeError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| DecodeError::InvalidHex {
        field,
        reason: e.to_string(),
    })
}

/// Parse a hex string into a fixed-size array.
pub fn hex_to_array<const N: usize>(s: &str, field: &'static str) -> Result<[u8; N], DecodeError> {
    let bytes = hex_to_bytes(s, field)?;
    if bytes.len() != N {
        return Err(DecodeError::InvalidLength {
            field,
            expected: N,
            got: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Serde adapter for fixed-size byte arrays as `0x`-prefixed hex strings.
pub mod hex_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::hex_to_array::<N>(&s, "hex field").map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for `u128` amounts as decimal strings, so JSON consumers
/// never round them through a float.
pub mod u128_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
