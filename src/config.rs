//! Desk configuration.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for the CSR desk.
///
/// Every field has a default, so a partial JSON document only needs to name the
/// values it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    /// Artificial latency of a bulk dispatch to a provider (milliseconds)
    pub dispatch_latency_ms: u64,

    /// Artificial latency of forwarding a response to a station (milliseconds)
    pub forward_latency_ms: u64,

    /// Artificial delay before a login attempt is checked (milliseconds)
    pub auth_delay_ms: u64,

    /// Domain appended to derived police station email addresses
    pub email_domain: String,

    /// Number of requests produced by the fixture generator
    pub fixture_count: usize,

    /// Number of notifications buffered per subscriber before the oldest are dropped
    pub notification_capacity: usize,

    /// Number of store events buffered per subscriber
    pub event_capacity: usize,

    /// Rows shown per provider card before collapsing into "+N more"
    pub preview_rows: usize,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            dispatch_latency_ms: 2000,
            forward_latency_ms: 1500,
            auth_delay_ms: 1000,
            email_domain: "tnpolice.gov.in".to_string(),
            fixture_count: 15,
            notification_capacity: 64,
            event_capacity: 256,
            preview_rows: 5,
        }
    }
}

impl DeskConfig {
    /// Configuration with every artificial delay disabled.
    pub fn instant() -> Self {
        Self {
            dispatch_latency_ms: 0,
            forward_latency_ms: 0,
            auth_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read desk config {}", path.display()))?;
        Self::from_json_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = DeskConfig::from_json_str(r#"{"dispatch_latency_ms": 50}"#).unwrap();
        assert_eq!(config.dispatch_latency_ms, 50);
        assert_eq!(config.forward_latency_ms, 1500);
        assert_eq!(config.email_domain, "tnpolice.gov.in");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"email_domain": "police.example.org", "fixture_count": 4}}"#).unwrap();

        let config = DeskConfig::from_file(file.path()).unwrap();
        assert_eq!(config.email_domain, "police.example.org");
        assert_eq!(config.fixture_count, 4);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(DeskConfig::from_file("/nonexistent/desk.json").is_err());
    }

    #[test]
    fn test_malformed_json_is_a_serialization_error() {
        let err = DeskConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, crate::error::CsrError::Serialization(_)));
    }
}
