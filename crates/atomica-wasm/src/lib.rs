//! # Atomica WASM
//!
//! WebAssembly bindings for the Atomica light client and bridge.
//! This crate bridges `atomica-core`'s pure Rust verification logic to
//! JavaScript via `wasm-bindgen`.
//!
//! ## Architecture
//!
//! - All cryptographic verification happens in Rust/WASM (never in JS)
//! - Relayers submit hex-encoded headers, signatures and proofs as JSON
//! - A rejected update is reported, never fatal: the client keeps its last
//!   trusted state and waits for the next one

mod api;
mod state;

use api::{ApiLockRequest, ApiStateProof, ApiStateUpdate, ApiTransactionProof, ApiUnlockRequest, StateProof};
use atomica_core::types::{hex_to_array, Address, AssetId};
use atomica_core::{Bootstrap, Bridge, ClientConfig, ErrorKind};
use serde::{Deserialize, Serialize};
use state::ClientStats;
use std::fmt::Display;
use wasm_bindgen::prelude::*;

/// Set up panic hook on WASM initialization.
/// This ensures Rust panics are logged to the browser console with full stack traces.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// The main Atomica client: a verified view of the source chain plus the
/// host-side bridge ledger that settles burns against it.
#[wasm_bindgen]
pub struct AtomicaClient {
    bridge: Bridge,
    stats: ClientStats,
}

#[wasm_bindgen]
impl AtomicaClient {
    /// Create a client from a JSON config carrying the genesis waypoint.
    ///
    /// The waypoint is the only trusted input. It must be obtained out of
    /// band; everything the client accepts afterwards is verified.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<AtomicaClient, JsValue> {
        let config = ClientConfig::from_json_str(config_json)
            .map_err(|e| js_error("Invalid config", e.kind(), e))?;

        log_to_console(&format!(
            "[Atomica] Configured with genesis waypoint {}",
            config.genesis_waypoint
        ));

        Ok(AtomicaClient {
            bridge: Bridge::new(config),
            stats: ClientStats::new(),
        })
    }

    /// Install the genesis state and validator set. Fails unless they hash
    /// to the configured waypoint.
    pub fn initialize(&mut self, bootstrap_json: &str) -> Result<(), JsValue> {
        let bootstrap: Bootstrap = serde_json::from_str(bootstrap_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid bootstrap JSON: {}", e)))?;

        self.bridge
            .initialize(bootstrap)
            .map_err(|e| js_error("Failed to initialize", e.kind(), e))?;

        if let Some(state) = self.bridge.trusted_state() {
            self.stats.on_initialized(state);
            log_to_console(&format!(
                "[Atomica] Client initialized at version {} (epoch {})",
                state.version, state.epoch
            ));
        }
        Ok(())
    }

    /// Process a state update relayed from the source chain.
    ///
    /// Returns true if the update was valid and the trusted state advanced.
    /// Returns false if verification rejected it (the caller should log but
    /// not crash). Malformed JSON or hex is an error.
    pub fn update_state(&mut self, update_json: &str) -> Result<bool, JsValue> {
        let update: ApiStateUpdate = serde_json::from_str(update_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid update JSON: {}", e)))?;
        let raw = update.to_core().map_err(|e| JsValue::from_str(&e))?;

        match self.bridge.update_state(
            &raw.header,
            &raw.signature,
            &raw.signer_bitmask,
            &raw.epoch_change_proof,
        ) {
            Ok(state) => {
                self.stats.on_update_accepted(&state);
                log_to_console(&format!(
                    "[Atomica] State advanced to version {} (epoch {})",
                    state.version, state.epoch
                ));
                Ok(true)
            }
            Err(e) => {
                self.stats.on_update_rejected(e.kind());
                log_to_console(&format!("[Atomica] Update rejected [{}]: {}", e.kind(), e));
                Ok(false)
            }
        }
    }

    /// Lock host-side funds for release on the source chain.
    pub fn lock(&mut self, request_json: &str) -> Result<(), JsValue> {
        let request: ApiLockRequest = serde_json::from_str(request_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid lock JSON: {}", e)))?;
        let request = request.to_core().map_err(|e| JsValue::from_str(&e))?;

        self.bridge
            .lock(request.sender, request.asset_id, request.amount, request.destination)
            .map_err(|e| js_error("Lock failed", e.kind(), e))?;
        self.stats.on_lock();
        Ok(())
    }

    /// Settle a source-chain burn against the trusted state root.
    ///
    /// The proof is checked against our internally held state root; the
    /// caller cannot supply one. Returns the settled burn as JSON.
    pub fn unlock(&mut self, request_json: &str) -> Result<JsValue, JsValue> {
        let request: ApiUnlockRequest = serde_json::from_str(request_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid unlock JSON: {}", e)))?;
        let request = request.to_core().map_err(|e| JsValue::from_str(&e))?;

        let burn_hash = match self.bridge.unlock(
            request.asset_id,
            request.amount,
            request.recipient,
            &request.siblings,
            &request.burn_event,
        ) {
            Ok(hash) => {
                self.stats.on_unlock(Ok(()));
                hash
            }
            Err(e) => {
                self.stats.on_unlock(Err(e.kind()));
                return Err(js_error("Unlock rejected", e.kind(), e));
            }
        };

        let response = UnlockResponse {
            burn_hash: format!("0x{}", hex::encode(burn_hash)),
            asset_id: format!("0x{}", hex::encode(request.asset_id)),
            recipient: format!("0x{}", hex::encode(request.recipient)),
            amount: request.amount.to_string(),
            verified_against_version: self.head_version(),
        };
        to_js(&response)
    }

    /// Verify a state-tree proof against the trusted state root.
    ///
    /// Returns false when the proof does not check out; errors only on
    /// malformed input or an uninitialized client.
    pub fn verify_state_proof(&self, proof_json: &str) -> Result<bool, JsValue> {
        let proof: ApiStateProof = serde_json::from_str(proof_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid proof JSON: {}", e)))?;
        let proof = proof.to_core().map_err(|e| JsValue::from_str(&e))?;

        let client = self.bridge.light_client();
        let result = match &proof {
            StateProof::Inclusion {
                key,
                value_hash,
                siblings,
            } => client.verify_state_inclusion(key, value_hash, siblings),
            StateProof::EmptySubtree { key, siblings } => client.verify_state_non_inclusion(key, siblings),
            StateProof::OtherLeaf { key, proof } => client.verify_state_non_inclusion_with_leaf(key, proof),
        };
        proof_result(result.map_err(|e| (e.kind(), e)))
    }

    /// Verify a transaction's inclusion in the trusted accumulator.
    pub fn verify_transaction(&self, proof_json: &str) -> Result<bool, JsValue> {
        let proof: ApiTransactionProof = serde_json::from_str(proof_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid proof JSON: {}", e)))?;
        let (transaction_hash, version, siblings) = proof.to_core().map_err(|e| JsValue::from_str(&e))?;

        let result = self
            .bridge
            .light_client()
            .verify_transaction_inclusion(&transaction_hash, version, &siblings);
        proof_result(result.map_err(|e| (e.kind(), e)))
    }

    /// Get the current trusted state as JSON, or null before initialization.
    pub fn trusted_state(&self) -> Result<JsValue, JsValue> {
        to_js(&self.bridge.trusted_state())
    }

    /// Get the current trusted version. 0 before initialization.
    pub fn head_version(&self) -> u64 {
        self.bridge.trusted_state().map_or(0, |state| state.version)
    }

    pub fn current_epoch(&self) -> Option<u64> {
        self.bridge.light_client().current_epoch()
    }

    pub fn is_initialized(&self) -> bool {
        self.bridge.light_client().is_initialized()
    }

    /// Locked balance of an asset, as a decimal string.
    pub fn locked_balance(&self, asset_id: &str) -> Result<String, JsValue> {
        let asset_id: AssetId = parse_js_array(asset_id, "assetId")?;
        Ok(self.bridge.locked_balance(&asset_id).to_string())
    }

    /// Amount released to `recipient` so far, as a decimal string.
    pub fn released_balance(&self, asset_id: &str, recipient: &str) -> Result<String, JsValue> {
        let asset_id: AssetId = parse_js_array(asset_id, "assetId")?;
        let recipient: Address = parse_js_array(recipient, "recipient")?;
        Ok(self.bridge.released_balance(&asset_id, &recipient).to_string())
    }

    /// Whether a burn hash has already been settled.
    pub fn is_processed(&self, burn_hash: &str) -> Result<bool, JsValue> {
        let burn_hash = parse_js_array::<32>(burn_hash, "burnHash")?;
        Ok(self.bridge.is_processed(&burn_hash))
    }

    /// Drain the event log, oldest first.
    pub fn take_events(&mut self) -> Result<JsValue, JsValue> {
        to_js(&self.bridge.take_events())
    }

    /// Get client statistics as JSON.
    pub fn stats(&self) -> Result<JsValue, JsValue> {
        let response = StatsResponse {
            stats: self.stats.clone(),
            acceptance_rate: self.stats.acceptance_rate(),
        };
        to_js(&response)
    }
}

fn parse_js_array<const N: usize>(s: &str, field: &'static str) -> Result<[u8; N], JsValue> {
    hex_to_array::<N>(s, field).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn js_error(context: &str, kind: ErrorKind, e: impl Display) -> JsValue {
    JsValue::from_str(&format!("{} [{}]: {}", context, kind, e))
}

/// A failed proof is a `false` answer; any other failure is an error.
fn proof_result<E: Display>(result: Result<(), (ErrorKind, E)>) -> Result<bool, JsValue> {
    match result {
        Ok(()) => Ok(true),
        Err((ErrorKind::InvalidProof, e)) => {
            log_to_console(&format!("[Atomica] Proof rejected: {}", e));
            Ok(false)
        }
        Err((kind, e)) => Err(js_error("Proof verification failed", kind, e)),
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

// --- Response types ---

#[derive(Serialize, Deserialize)]
struct UnlockResponse {
    burn_hash: String,
    asset_id: String,
    recipient: String,
    amount: String,
    verified_against_version: u64,
}

#[derive(Serialize, Deserialize)]
struct StatsResponse {
    #[serde(flatten)]
    stats: ClientStats,
    acceptance_rate: f64,
}

// --- Console logging ---

fn log_to_console(msg: &str) {
    web_sys::console::log_1(&JsValue::from_str(msg));
}
