//! Client statistics surfaced to the TypeScript layer.
//!
//! Counters only; the verified state itself lives in `atomica-core`.

use atomica_core::{ErrorKind, TrustedState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClientStats {
    /// Version of the current trusted state, once initialized.
    pub trusted_version: Option<u64>,
    pub current_epoch: Option<u64>,
    /// Number of updates that advanced the trusted state.
    pub updates_processed: u64,
    /// Number of updates rejected (failed verification).
    pub updates_rejected: u64,
    pub epoch_changes: u64,
    pub locks: u64,
    pub unlocks_processed: u64,
    pub unlocks_rejected: u64,
    /// Rejections of any operation, by error kind.
    pub rejections_by_kind: BTreeMap<String, u64>,
}

impl ClientStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_initialized(&mut self, state: &TrustedState) {
        self.trusted_version = Some(state.version);
        self.current_epoch = Some(state.epoch);
    }

    pub fn on_update_accepted(&mut self, state: &TrustedState) {
        if self.current_epoch.is_some_and(|epoch| state.epoch > epoch) {
            self.epoch_changes += 1;
        }
        self.updates_processed += 1;
        self.on_initialized(state);
    }

    pub fn on_update_rejected(&mut self, kind: ErrorKind) {
        self.updates_rejected += 1;
        self.record_rejection(kind);
    }

    pub fn on_lock(&mut self) {
        self.locks += 1;
    }

    pub fn on_unlock(&mut self, result: Result<(), ErrorKind>) {
        match result {
            Ok(()) => self.unlocks_processed += 1,
            Err(kind) => {
                self.unlocks_rejected += 1;
                self.record_rejection(kind);
            }
        }
    }

    pub fn record_rejection(&mut self, kind: ErrorKind) {
        *self.rejections_by_kind.entry(kind.to_string()).or_insert(0) += 1;
    }

    /// Fraction of submitted updates that were accepted (0.0 - 1.0).
    pub fn acceptance_rate(&self) -> f64 {
        let total = self.updates_processed + self.updates_rejected;
        if total == 0 {
            return 0.0;
        }
        self.updates_processed as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(version: u64, epoch: u64) -> TrustedState {
        TrustedState {
            version,
            state_root: [1; 32],
            accumulator_root: [2; 32],
            timestamp: 0,
            epoch,
        }
    }

    #[test]
    fn test_update_counters() {
        let mut stats = ClientStats::new();
        assert_eq!(stats.acceptance_rate(), 0.0);

        stats.on_initialized(&state(100, 1));
        stats.on_update_accepted(&state(101, 1));
        assert_eq!(stats.epoch_changes, 0);

        stats.on_update_accepted(&state(150, 2));
        assert_eq!(stats.epoch_changes, 1);
        assert_eq!(stats.trusted_version, Some(150));
        assert_eq!(stats.current_epoch, Some(2));

        stats.on_update_rejected(ErrorKind::StaleUpdate);
        stats.on_update_rejected(ErrorKind::StaleUpdate);
        assert_eq!(stats.updates_processed, 2);
        assert_eq!(stats.updates_rejected, 2);
        assert_eq!(stats.acceptance_rate(), 0.5);
        assert_eq!(stats.rejections_by_kind.get("StaleUpdate"), Some(&2));
    }

    #[test]
    fn test_unlock_counters() {
        let mut stats = ClientStats::new();
        stats.on_lock();
        stats.on_unlock(Ok(()));
        stats.on_unlock(Err(ErrorKind::AlreadyProcessed));

        assert_eq!(stats.locks, 1);
        assert_eq!(stats.unlocks_processed, 1);
        assert_eq!(stats.unlocks_rejected, 1);
        assert_eq!(stats.rejections_by_kind.get("AlreadyProcessed"), Some(&1));
    }

    #[test]
    fn test_stats_serialize_for_js() {
        let mut stats = ClientStats::new();
        stats.on_initialized(&state(7, 3));
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["trusted_version"], 7);
        assert_eq!(json["current_epoch"], 3);
        assert!(json["rejections_by_kind"].as_object().unwrap().is_empty());
    }
}
