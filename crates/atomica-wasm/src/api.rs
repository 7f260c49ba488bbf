//! JSON request formats accepted from the JavaScript side.
//!
//! Relayers hand us hex strings; these types turn them into the raw bytes
//! and fixed-size arrays `atomica-core` verifies. Nothing here is trusted:
//! a successful conversion only means the input is well-formed.

use atomica_core::types::{hex_to_array, hex_to_bytes, Address, AssetId, ExplicitLeafProof, SourceAddress};
use atomica_core::Hash;
use serde::{Deserialize, Serialize};

fn parse_hex(s: &str, field: &'static str) -> Result<Vec<u8>, String> {
    hex_to_bytes(s, field).map_err(|e| e.to_string())
}

fn parse_array<const N: usize>(s: &str, field: &'static str) -> Result<[u8; N], String> {
    hex_to_array::<N>(s, field).map_err(|e| e.to_string())
}

/// Amounts cross the JS boundary as decimal strings; u128 does not fit a JS number.
pub fn parse_amount(s: &str) -> Result<u128, String> {
    s.trim()
        .parse::<u128>()
        .map_err(|e| format!("Invalid amount '{}': {}", s, e))
}

pub fn parse_hash(s: &str, field: &'static str) -> Result<Hash, String> {
    parse_array::<32>(s, field)
}

pub fn parse_siblings(siblings: &[String]) -> Result<Vec<Hash>, String> {
    siblings.iter().map(|s| parse_hash(s, "sibling")).collect()
}

/// A relayed state update: header, aggregate signature, signer bitmask and
/// an optional epoch change proof, all hex encoded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiStateUpdate {
    pub header: String,
    pub signature: String,
    pub signer_bitmask: String,
    #[serde(default)]
    pub epoch_change_proof: Option<String>,
}

/// Decoded byte form of an [`ApiStateUpdate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawStateUpdate {
    pub header: Vec<u8>,
    pub signature: Vec<u8>,
    pub signer_bitmask: Vec<u8>,
    pub epoch_change_proof: Vec<u8>,
}

impl ApiStateUpdate {
    pub fn to_core(&self) -> Result<RawStateUpdate, String> {
        let epoch_change_proof = match &self.epoch_change_proof {
            Some(proof) => parse_hex(proof, "epochChangeProof")?,
            None => Vec::new(),
        };
        Ok(RawStateUpdate {
            header: parse_hex(&self.header, "header")?,
            signature: parse_hex(&self.signature, "signature")?,
            signer_bitmask: parse_hex(&self.signer_bitmask, "signerBitmask")?,
            epoch_change_proof,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiLockRequest {
    pub sender: String,
    pub asset_id: String,
    pub amount: String,
    pub destination: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockRequest {
    pub sender: Address,
    pub asset_id: AssetId,
    pub amount: u128,
    pub destination: SourceAddress,
}

impl ApiLockRequest {
    pub fn to_core(&self) -> Result<LockRequest, String> {
        Ok(LockRequest {
            sender: parse_array::<20>(&self.sender, "sender")?,
            asset_id: parse_hash(&self.asset_id, "assetId")?,
            amount: parse_amount(&self.amount)?,
            destination: parse_hash(&self.destination, "destination")?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiUnlockRequest {
    pub asset_id: String,
    pub amount: String,
    pub recipient: String,
    /// Sparse Merkle siblings, bottom-most first.
    pub siblings: Vec<String>,
    /// Exact burn event bytes as recorded on the source chain.
    pub burn_event: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnlockRequest {
    pub asset_id: AssetId,
    pub amount: u128,
    pub recipient: Address,
    pub siblings: Vec<Hash>,
    pub burn_event: Vec<u8>,
}

impl ApiUnlockRequest {
    pub fn to_core(&self) -> Result<UnlockRequest, String> {
        Ok(UnlockRequest {
            asset_id: parse_hash(&self.asset_id, "assetId")?,
            amount: parse_amount(&self.amount)?,
            recipient: parse_array::<20>(&self.recipient, "recipient")?,
            siblings: parse_siblings(&self.siblings)?,
            burn_event: parse_hex(&self.burn_event, "burnEvent")?,
        })
    }
}

/// A state-tree proof: inclusion when `value_hash` is set, otherwise
/// non-inclusion, optionally through a neighbouring leaf.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiStateProof {
    pub key: String,
    #[serde(default)]
    pub value_hash: Option<String>,
    pub siblings: Vec<String>,
    #[serde(default)]
    pub leaf_key: Option<String>,
    #[serde(default)]
    pub leaf_value_hash: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateProof {
    Inclusion { key: Hash, value_hash: Hash, siblings: Vec<Hash> },
    EmptySubtree { key: Hash, siblings: Vec<Hash> },
    OtherLeaf { key: Hash, proof: ExplicitLeafProof },
}

impl ApiStateProof {
    pub fn to_core(&self) -> Result<StateProof, String> {
        let key = parse_hash(&self.key, "key")?;
        let siblings = parse_siblings(&self.siblings)?;
        match (&self.value_hash, &self.leaf_key, &self.leaf_value_hash) {
            (Some(value_hash), None, None) => Ok(StateProof::Inclusion {
                key,
                value_hash: parse_hash(value_hash, "valueHash")?,
                siblings,
            }),
            (None, None, None) => Ok(StateProof::EmptySubtree { key, siblings }),
            (None, Some(leaf_key), Some(leaf_value_hash)) => Ok(StateProof::OtherLeaf {
                key,
                proof: ExplicitLeafProof {
                    leaf_key: parse_hash(leaf_key, "leafKey")?,
                    leaf_value_hash: parse_hash(leaf_value_hash, "leafValueHash")?,
                    siblings,
                },
            }),
            _ => Err("State proof must carry either valueHash or both leafKey and leafValueHash".into()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiTransactionProof {
    pub transaction_hash: String,
    pub version: u64,
    pub siblings: Vec<String>,
}

impl ApiTransactionProof {
    pub fn to_core(&self) -> Result<(Hash, u64, Vec<Hash>), String> {
        Ok((
            parse_hash(&self.transaction_hash, "transactionHash")?,
            self.version,
            parse_siblings(&self.siblings)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex32(byte: u8) -> String {
        format!("0x{}", hex::encode([byte; 32]))
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("0").unwrap(), 0);
        assert_eq!(parse_amount(" 42 ").unwrap(), 42);
        assert_eq!(
            parse_amount("340282366920938463463374607431768211455").unwrap(),
            u128::MAX
        );
        assert!(parse_amount("340282366920938463463374607431768211456").is_err());
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("0x10").is_err());
    }

    #[test]
    fn test_state_update_conversion() {
        let api = ApiStateUpdate {
            header: "0x0102".into(),
            signature: "aabb".into(),
            signer_bitmask: "0x07".into(),
            epoch_change_proof: None,
        };
        let raw = api.to_core().unwrap();
        assert_eq!(raw.header, vec![1, 2]);
        assert_eq!(raw.signature, vec![0xAA, 0xBB]);
        assert_eq!(raw.signer_bitmask, vec![7]);
        assert!(raw.epoch_change_proof.is_empty());

        let json = r#"{"header":"0x","signature":"0x","signer_bitmask":"0x","epoch_change_proof":"0xff"}"#;
        let api: ApiStateUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(api.to_core().unwrap().epoch_change_proof, vec![0xFF]);
    }

    #[test]
    fn test_state_update_rejects_bad_hex() {
        let api = ApiStateUpdate {
            header: "0xzz".into(),
            signature: "0x".into(),
            signer_bitmask: "0x".into(),
            epoch_change_proof: None,
        };
        assert!(api.to_core().is_err());
    }

    #[test]
    fn test_lock_request_conversion() {
        let api = ApiLockRequest {
            sender: format!("0x{}", hex::encode([0x11; 20])),
            asset_id: hex32(0xA1),
            amount: "1000".into(),
            destination: hex32(0xDE),
        };
        let request = api.to_core().unwrap();
        assert_eq!(request.sender, [0x11; 20]);
        assert_eq!(request.asset_id, [0xA1; 32]);
        assert_eq!(request.amount, 1000);
        assert_eq!(request.destination, [0xDE; 32]);

        let short_sender = ApiLockRequest {
            sender: hex32(0x11),
            ..api
        };
        assert!(short_sender.to_core().is_err());
    }

    #[test]
    fn test_unlock_request_conversion() {
        let api = ApiUnlockRequest {
            asset_id: hex32(0xA1),
            amount: "400".into(),
            recipient: format!("0x{}", hex::encode([0xCE; 20])),
            siblings: vec![hex32(1), hex32(2)],
            burn_event: "0x00ff".into(),
        };
        let request = api.to_core().unwrap();
        assert_eq!(request.siblings, vec![[1; 32], [2; 32]]);
        assert_eq!(request.burn_event, vec![0, 0xFF]);

        let bad_sibling = ApiUnlockRequest {
            siblings: vec!["0x01".into()],
            ..api
        };
        assert!(bad_sibling.to_core().is_err());
    }

    #[test]
    fn test_state_proof_variants() {
        let inclusion = ApiStateProof {
            key: hex32(1),
            value_hash: Some(hex32(2)),
            siblings: vec![hex32(3)],
            leaf_key: None,
            leaf_value_hash: None,
        };
        assert!(matches!(inclusion.to_core().unwrap(), StateProof::Inclusion { .. }));

        let empty = ApiStateProof {
            value_hash: None,
            ..inclusion.clone()
        };
        assert!(matches!(empty.to_core().unwrap(), StateProof::EmptySubtree { .. }));

        let other_leaf = ApiStateProof {
            value_hash: None,
            leaf_key: Some(hex32(4)),
            leaf_value_hash: Some(hex32(5)),
            ..inclusion.clone()
        };
        match other_leaf.to_core().unwrap() {
            StateProof::OtherLeaf { proof, .. } => {
                assert_eq!(proof.leaf_key, [4; 32]);
                assert_eq!(proof.siblings, vec![[3; 32]]);
            }
            other => panic!("unexpected proof: {:?}", other),
        }

        let ambiguous = ApiStateProof {
            leaf_key: Some(hex32(4)),
            ..inclusion
        };
        assert!(ambiguous.to_core().is_err());
    }
}
