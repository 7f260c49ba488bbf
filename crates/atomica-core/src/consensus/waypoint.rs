use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{tagged_hash, Hash, HashDomain};
use crate::error::ErrorKind;
use crate::types::TrustedState;

/// Errors that can occur while parsing or checking a waypoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaypointError {
    #[error("Waypoint format invalid: {reason}")]
    InvalidFormat { reason: String },

    #[error("Genesis state does not match the configured waypoint: expected {expected}, computed {computed}")]
    Mismatch { expected: String, computed: String },
}

impl WaypointError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WaypointError::InvalidFormat { .. } => ErrorKind::MalformedInput,
            WaypointError::Mismatch { .. } => ErrorKind::Unauthorized,
        }
    }
}

/// The trusted starting point for the light client, handed over out of band
/// by the operator. This is the one moment of trust in the client's
/// lifecycle; everything after it is verified cryptographically.
///
/// Written as `"<version>:<64 hex chars>"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Waypoint {
    version: u64,
    value: Hash,
}

impl Waypoint {
    pub fn new(version: u64, value: Hash) -> Self {
        Self { version, value }
    }

    /// Commit to a genesis state and the validator set that signs its successor.
    pub fn from_genesis(state: &TrustedState, validator_set_hash: &Hash) -> Self {
        let value = tagged_hash(
            HashDomain::Waypoint,
            &[
                &state.version.to_le_bytes(),
                &state.epoch.to_le_bytes(),
                &state.state_root,
                &state.accumulator_root,
                &state.timestamp.to_le_bytes(),
                validator_set_hash,
            ],
        );
        Self {
            version: state.version,
            value,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn value(&self) -> Hash {
        self.value
    }

    /// Check that a proposed genesis matches this waypoint.
    pub fn verify(&self, state: &TrustedState, validator_set_hash: &Hash) -> Result<(), WaypointError> {
        let computed = Self::from_genesis(state, validator_set_hash);
        if computed != *self {
            return Err(WaypointError::Mismatch {
                expected: self.to_string(),
                computed: computed.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Waypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.version, hex::encode(self.value))
    }
}

impl FromStr for Waypoint {
    type Err = WaypointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (version, value) = s.split_once(':').ok_or_else(|| WaypointError::InvalidFormat {
            reason: "expected <version>:<hash>".into(),
        })?;

        let version = version.parse::<u64>().map_err(|e| WaypointError::InvalidFormat {
            reason: format!("Invalid version: {}", e),
        })?;

        let value = value.strip_prefix("0x").unwrap_or(value);
        if value.len() != 64 {
            return Err(WaypointError::InvalidFormat {
                reason: format!("Expected 64 hex characters, got {}", value.len()),
            });
        }
        let bytes = hex::decode(value).map_err(|e| WaypointError::InvalidFormat {
            reason: format!("Invalid hex: {}", e),
        })?;

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(Self::new(version, hash))
    }
}

impl Serialize for Waypoint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Waypoint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
