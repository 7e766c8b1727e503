//! Request lifecycle for a police control room's customer service requests (CSRs).
//!
//! A CSR asks a telecom provider for the subscriber behind a mobile number. Each
//! request moves `Request Received -> Sent to Provider -> Response Received ->
//! Completed`. Operators see two projections of one shared store: a dashboard
//! that groups pending requests by provider and sends them in bulk, and a
//! reviewer that lists provider responses and forwards each one back to the
//! requesting police station.
//!
//! [`CsrDesk`] wires everything together around an [`InMemoryStorage`].

pub mod activity;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod desk;
pub mod domain;
pub mod error;
pub mod format;
pub mod gateway;
pub mod intake;
pub mod notify;
pub mod request;
pub mod reviewer;
pub mod storage;

// Re-export commonly used types
pub use activity::{Activity, ActivityState, ActivityTracker};
pub use auth::{Captcha, LoginForm, LoginGate, Session};
pub use config::DeskConfig;
pub use dashboard::{DashboardAggregator, DispatchOutcome};
pub use desk::CsrDesk;
pub use domain::provider::ServiceProvider;
pub use domain::stats::{ProviderStats, group_by_provider};
pub use error::{CsrError, Result};
pub use gateway::{MockGateway, ProviderGateway, SimulatedGateway, StationGateway};
pub use intake::{FixtureGenerator, IngestReport, RequestIntake, RequestSource};
pub use notify::{Notification, NotificationLevel, Notifier};
pub use request::*;
pub use reviewer::{ResponseReviewer, list_awaiting_review};
pub use storage::{InMemoryStorage, RequestFilter, Storage, StoreEvent};
