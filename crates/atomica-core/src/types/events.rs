use serde::{Deserialize, Serialize};

use crate::crypto::Hash;
use crate::types::codec::{hex_serde, u128_string};

/// Asset identifier shared by both chains.
pub type AssetId = [u8; 32];

/// Host-chain account address.
pub type Address = [u8; 20];

/// Source-chain account address.
pub type SourceAddress = [u8; 32];

/// Everything the light client and bridge emit, in emission order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    StateUpdated {
        version: u64,
        #[serde(with = "hex_serde")]
        state_root: Hash,
        #[serde(with = "hex_serde")]
        accumulator_root: Hash,
        epoch: u64,
        timestamp: u64,
    },
    EpochChanged {
        old_epoch: u64,
        new_epoch: u64,
        #[serde(with = "hex_serde")]
        validator_set_hash: Hash,
    },
    Locked {
        #[serde(with = "hex_serde")]
        asset_id: AssetId,
        #[serde(with = "hex_serde")]
        sender: Address,
        #[serde(with = "u128_string")]
        amount: u128,
        #[serde(with = "hex_serde")]
        destination_recipient: SourceAddress,
    },
    Unlocked {
        #[serde(with = "hex_serde")]
        asset_id: AssetId,
        #[serde(with = "hex_serde")]
        recipient: Address,
        #[serde(with = "u128_string")]
        amount: u128,
        #[serde(with = "hex_serde")]
        burn_hash: Hash,
    },
}
