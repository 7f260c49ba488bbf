use serde::{Deserialize, Serialize};

use crate::crypto::{keccak256, keccak256_concat, Hash};
use crate::types::{hex_serde, u128_string, Address, AssetId, Decode, DecodeError, Encode, Reader};

/// Encoded size of a [`BurnEvent`].
pub const BURN_EVENT_LEN: usize = 32 + 16 + 20 + 8;

/// Prefix of the state-tree key a burn record is stored under.
pub const BURN_RECORD_TAG: &[u8] = b"ATOMICA::BurnRecord";

/// A burn recorded on the source chain, redeemable once on the host chain.
///
/// Wire layout: `asset:32B, amount:u128, recipient:20B, burnVersion:u64`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnEvent {
    #[serde(with = "hex_serde")]
    pub asset_id: AssetId,
    #[serde(with = "u128_string")]
    pub amount: u128,
    #[serde(with = "hex_serde")]
    pub recipient: Address,
    /// Source-chain version at which the burn executed.
    pub burn_version: u64,
}

impl Decode for BurnEvent {
    const SCHEMA: &'static str = "burn event";

    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            asset_id: reader.read_hash("asset")?,
            amount: reader.read_u128("amount")?,
            recipient: reader.read_array::<20>("recipient")?,
            burn_version: reader.read_u64("burnVersion")?,
        })
    }
}

impl Encode for BurnEvent {
    fn encode(&self, out: &mut Vec<u8>) {
        out.reserve(BURN_EVENT_LEN);
        out.extend_from_slice(&self.asset_id);
        out.extend_from_slice(&self.amount.to_le_bytes());
        out.extend_from_slice(&self.recipient);
        out.extend_from_slice(&self.burn_version.to_le_bytes());
    }
}

/// Replay-protection identity of a burn: keccak256 of its exact payload bytes.
pub fn burn_hash(payload: &[u8]) -> Hash {
    keccak256(payload)
}

/// State-tree key under which the source chain records `burn_hash`.
pub fn burn_record_key(burn_hash: &Hash) -> Hash {
    keccak256_concat(&[BURN_RECORD_TAG, burn_hash])
}
