//! Core domain types for the CSR desk.
//!
//! This module contains pure domain types with no storage dependencies:
//! - Service providers
//! - Request typestate machine
//! - Per-provider grouping of pending requests

pub mod provider;
pub mod request;
pub mod stats;
