//! Telecom service providers targeted by CSR requests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CsrError, Result};

/// Telecom operator a request is raised against.
///
/// This is the partition key for dispatch: all pending requests for one
/// provider are sent together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceProvider {
    Jio,
    Airtel,
    #[serde(rename = "VI")]
    Vi,
    #[serde(rename = "BSNL")]
    Bsnl,
}

impl ServiceProvider {
    /// All known providers, in dashboard order.
    pub const ALL: [ServiceProvider; 4] = [
        ServiceProvider::Jio,
        ServiceProvider::Airtel,
        ServiceProvider::Vi,
        ServiceProvider::Bsnl,
    ];

    /// Display label as operators know it.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceProvider::Jio => "Jio",
            ServiceProvider::Airtel => "Airtel",
            ServiceProvider::Vi => "VI",
            ServiceProvider::Bsnl => "BSNL",
        }
    }

    /// Short code used in generated reference IDs.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceProvider::Jio => "JIO",
            ServiceProvider::Airtel => "AIR",
            ServiceProvider::Vi => "VI",
            ServiceProvider::Bsnl => "BSNL",
        }
    }
}

impl fmt::Display for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceProvider {
    type Err = CsrError;

    fn from_str(s: &str) -> Result<Self> {
        ServiceProvider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CsrError::ValidationError(format!("Unknown service provider '{}'", s)))
    }
}
