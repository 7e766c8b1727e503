//! Storage trait for the request store.
//!
//! This module defines the `Storage` trait, the single source of truth that both
//! the dashboard and the response reviewer project from. Implementations must
//! apply each mutation as one replacement of the affected records, so readers
//! never observe a partially applied bulk transition.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::provider::ServiceProvider;
use crate::error::Result;
use crate::request::{AnyRequest, Request, RequestId, RequestState, RequestStatus};

pub mod in_memory;

pub use in_memory::InMemoryStorage;

/// Filter for listing requests. `None` fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub provider: Option<ServiceProvider>,
}

impl RequestFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(status: RequestStatus) -> Self {
        Self {
            status: Some(status),
            provider: None,
        }
    }

    /// Requests of one provider still waiting to be dispatched.
    pub fn pending_for(provider: ServiceProvider) -> Self {
        Self {
            status: Some(RequestStatus::RequestReceived),
            provider: Some(provider),
        }
    }

    pub fn matches(&self, request: &AnyRequest) -> bool {
        self.status.is_none_or(|s| s == request.status())
            && self.provider.is_none_or(|p| p == request.provider())
    }
}

/// Change notification broadcast to store subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A new request entered the store
    Inserted { id: RequestId, status: RequestStatus },
    /// An existing request moved to a new status
    Transitioned { id: RequestId, status: RequestStatus },
}

/// Storage trait for persisting and querying requests.
///
/// This trait provides atomic operations for request lifecycle management.
/// The type system only allows valid transitions to be built, but the stored
/// record may have moved on since it was read. Implementations therefore check
/// each persisted request against the stored one and fail with `InvalidState`
/// unless the stored status is the new status's predecessor.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert a new request. Fails with `DuplicateRequest` if the ID is taken.
    async fn insert(&self, request: AnyRequest) -> Result<()>;

    /// Get a request by ID.
    async fn get(&self, id: &RequestId) -> Result<AnyRequest>;

    /// List requests matching the filter, in insertion order.
    async fn list(&self, filter: RequestFilter) -> Result<Vec<AnyRequest>>;

    /// Update an existing request's state in storage.
    ///
    /// Fails with `InvalidState` if the stored request is not in the status
    /// preceding the new one.
    async fn persist<T: RequestState + Clone>(&self, request: &Request<T>) -> Result<()>
    where
        AnyRequest: From<Request<T>>;

    /// Replace several existing requests in a single step.
    ///
    /// Either every request is replaced or, if any ID is unknown or any stored
    /// status is not the expected predecessor, none is.
    async fn persist_many(&self, requests: Vec<AnyRequest>) -> Result<()>;

    /// Subscribe to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}
