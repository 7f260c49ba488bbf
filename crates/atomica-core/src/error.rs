//! Error taxonomy shared by every module.
//!
//! Each module keeps its own specific `thiserror` enum; [`ErrorKind`] is the
//! coarse classification callers branch on. Every error is fail-closed: the
//! failing call mutates nothing.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Bad lengths, invalid point encodings, trailing bytes. Checked first.
    MalformedInput,
    /// Version did not advance. Resubmit with fresher data.
    StaleUpdate,
    /// Signers below quorum.
    InsufficientVotingPower,
    /// Pairing or Merkle recomputation mismatch.
    InvalidProof,
    /// Burn hash already settled.
    AlreadyProcessed,
    /// Unlock would make the bridge insolvent.
    InsufficientLockedBalance,
    /// Burn record does not match the unlock request.
    ParameterMismatch,
    /// Bootstrap credential (waypoint) did not match.
    Unauthorized,
    /// Operation not valid in the current lifecycle state.
    InvalidState,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::MalformedInput => "MalformedInput",
            ErrorKind::StaleUpdate => "StaleUpdate",
            ErrorKind::InsufficientVotingPower => "InsufficientVotingPower",
            ErrorKind::InvalidProof => "InvalidProof",
            ErrorKind::AlreadyProcessed => "AlreadyProcessed",
            ErrorKind::InsufficientLockedBalance => "InsufficientLockedBalance",
            ErrorKind::ParameterMismatch => "ParameterMismatch",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::InvalidState => "InvalidState",
        };
        f.write_str(name)
    }
}
