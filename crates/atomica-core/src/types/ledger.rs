use serde::{Deserialize, Serialize};

use crate::crypto::{tagged_hash, Hash, HashDomain, ZERO_HASH};
use crate::types::codec::{hex_serde, Decode, DecodeError, Encode, Reader};

/// Encoded size of a [`LedgerInfo`] header.
pub const LEDGER_INFO_LEN: usize = 8 + 8 + 32 + 32 + 8 + 32;

/// A source-chain header (ledger info) as signed by the validator quorum.
///
/// Wire layout: `version:u64, epoch:u64, accumulatorRoot:32B, stateRoot:32B,
/// timestamp:u64, nextEpochHash:32B`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerInfo {
    pub version: u64,
    pub epoch: u64,
    /// Root of the transaction accumulator up to `version`.
    #[serde(with = "hex_serde")]
    pub accumulator_root: Hash,
    /// Root of the sparse Merkle state tree at `version`.
    #[serde(with = "hex_serde")]
    pub state_root: Hash,
    /// Source-chain timestamp in microseconds.
    pub timestamp: u64,
    /// Hash of the validator set that takes over at `epoch`, when this header
    /// opens a new epoch. Zero otherwise.
    #[serde(with = "hex_serde")]
    pub next_epoch_hash: Hash,
}

impl LedgerInfo {
    /// The 32-byte message validators sign for this header.
    pub fn signing_hash(&self) -> Hash {
        tagged_hash(HashDomain::LedgerInfo, &[&self.to_bytes()])
    }

    pub fn declares_epoch_change(&self) -> bool {
        self.next_epoch_hash != ZERO_HASH
    }
}

impl Decode for LedgerInfo {
    const SCHEMA: &'static str = "ledger info";

    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            version: reader.read_u64("version")?,
            epoch: reader.read_u64("epoch")?,
            accumulator_root: reader.read_hash("accumulatorRoot")?,
            state_root: reader.read_hash("stateRoot")?,
            timestamp: reader.read_u64("timestamp")?,
            next_epoch_hash: reader.read_hash("nextEpochHash")?,
        })
    }
}

impl Encode for LedgerInfo {
    fn encode(&self, out: &mut Vec<u8>) {
        out.reserve(LEDGER_INFO_LEN);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.epoch.to_le_bytes());
        out.extend_from_slice(&self.accumulator_root);
        out.extend_from_slice(&self.state_root);
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.next_epoch_hash);
    }
}

/// The light client's verified view of the source chain.
/// Exactly one exists per client; it is replaced wholesale on every accepted update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedState {
    pub version: u64,
    #[serde(with = "hex_serde")]
    pub state_root: Hash,
    #[serde(with = "hex_serde")]
    pub accumulator_root: Hash,
    pub timestamp: u64,
    pub epoch: u64,
}

impl From<&LedgerInfo> for TrustedState {
    fn from(info: &LedgerInfo) -> Self {
        Self {
            version: info.version,
            state_root: info.state_root,
            accumulator_root: info.accumulator_root,
            timestamp: info.timestamp,
            epoch: info.epoch,
        }
    }
}
