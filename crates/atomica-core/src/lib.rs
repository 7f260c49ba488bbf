//! # Atomica Core
//!
//! Pure Rust light client and bridge verification logic.
//!
//! This crate contains **no networking code** and **no WASM dependencies**.
//! Every header, validator set, proof and burn record from the source chain
//! passes through these verification functions before being trusted.
//!
//! ## Trust Model
//!
//! - **Genesis** (`consensus::waypoint`): the operator hands over a waypoint
//!   out of band. It is the only trusted input; everything after it is
//!   verified cryptographically.
//!
//! - **Header verification** (`consensus` module): BLS12-381 aggregate
//!   signatures from the epoch's validator set, gated on a 2/3+ voting-power
//!   quorum. Validator sets rotate only through signed epoch changes.
//!
//! - **Proof verification** (`proof` module): transaction accumulator proofs
//!   and sparse Merkle state proofs against the trusted roots.
//!
//! - **Bridge** (`bridge` module): lock/unlock with exactly-once settlement of
//!   burns proven against trusted state.
//!
//! ## Usage
//!
//! ```ignore
//! use atomica_core::{Bridge, ClientConfig};
//!
//! let mut bridge = Bridge::new(ClientConfig::from_json_str(config_json)?);
//! bridge.initialize(bootstrap)?;
//! bridge.update_state(&header, &signature, &bitmask, &[])?;
//! ```

pub mod bridge;
pub mod config;
pub mod consensus;
pub mod crypto;
pub mod error;
pub mod proof;
pub mod service;
pub mod types;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types for convenience
pub use bridge::{Bridge, BridgeError, BurnEvent};
pub use config::{ClientConfig, ConfigError};
pub use consensus::{
    light_client::{Bootstrap, LightClient, LightClientError},
    signature::{verify_aggregate, AggregateSignature, SignerBitmask, VerificationError},
    waypoint::{Waypoint, WaypointError},
};
pub use crypto::{Bls12Engine, Hash, PairingEngine};
pub use error::ErrorKind;
pub use proof::ProofError;
pub use service::BridgeService;
pub use types::{Event, LedgerInfo, TrustedState, Validator, ValidatorSet};
