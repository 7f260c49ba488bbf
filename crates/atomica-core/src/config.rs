use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consensus::signature::DEFAULT_SIGNATURE_DST;
use crate::consensus::waypoint::Waypoint;
use crate::error::ErrorKind;

/// Longest domain separation tag hash-to-curve accepts.
pub const MAX_DST_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid signature DST: {reason}")]
    InvalidDst { reason: String },
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::MalformedInput
    }
}

fn default_signature_dst() -> String {
    String::from_utf8_lossy(DEFAULT_SIGNATURE_DST).into_owned()
}

/// Light client configuration, fixed for the client's lifetime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Operator-supplied commitment to the genesis state and validator set.
    pub genesis_waypoint: Waypoint,
    /// Domain separation tag validators sign under.
    #[serde(default = "default_signature_dst")]
    pub signature_dst: String,
}

impl ClientConfig {
    pub fn new(genesis_waypoint: Waypoint) -> Self {
        Self {
            genesis_waypoint,
            signature_dst: default_signature_dst(),
        }
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signature_dst.is_empty() {
            return Err(ConfigError::InvalidDst {
                reason: "must not be empty".into(),
            });
        }
        if self.signature_dst.len() > MAX_DST_LEN {
            return Err(ConfigError::InvalidDst {
                reason: format!("{} bytes exceeds {}", self.signature_dst.len(), MAX_DST_LEN),
            });
        }
        Ok(())
    }

    pub fn dst(&self) -> &[u8] {
        self.signature_dst.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_dst() {
        let json = format!(r#"{{"genesis_waypoint": "5:{}"}}"#, "ab".repeat(32));
        let config = ClientConfig::from_json_str(&json).unwrap();
        assert_eq!(config.genesis_waypoint.version(), 5);
        assert_eq!(config.dst(), DEFAULT_SIGNATURE_DST);
    }

    #[test]
    fn test_config_rejects_bad_input() {
        assert!(matches!(
            ClientConfig::from_json_str("{}"),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            ClientConfig::from_json_str(r#"{"genesis_waypoint": "nope"}"#),
            Err(ConfigError::Json(_))
        ));

        let json = format!(
            r#"{{"genesis_waypoint": "5:{}", "signature_dst": ""}}"#,
            "ab".repeat(32)
        );
        assert!(matches!(
            ClientConfig::from_json_str(&json),
            Err(ConfigError::InvalidDst { .. })
        ));

        let mut config = ClientConfig::new(Waypoint::new(0, [0; 32]));
        config.signature_dst = "x".repeat(256);
        assert!(config.validate().is_err());
    }
}
