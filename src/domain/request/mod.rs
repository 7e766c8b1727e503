//! Request aggregate - domain model and state transitions.
//!
//! This module contains the core domain logic for CSR requests:
//! - Request types and states (typestate pattern)
//! - State transition methods and bulk dispatch
//! - The flat record used at the intake boundary

pub mod state;
pub mod transitions;

// Re-export commonly used types
pub use state::*;
pub use transitions::dispatch_batch;
