//! Gateways to the external parties of the CSR workflow.
//!
//! This module defines the `ProviderGateway` trait (bulk dispatch of lookups to a
//! telecom provider) and the `StationGateway` trait (delivery of a reviewed
//! response back to the police station), enabling testability with mock
//! implementations.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::config::DeskConfig;
use crate::domain::provider::ServiceProvider;
use crate::error::{CsrError, Result};
use crate::request::{RequestData, RequestId};

/// Acknowledgement from a provider for a dispatched batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub provider: ServiceProvider,
    /// Number of lookups the provider accepted
    pub accepted: usize,
}

/// Trait for dispatching a consolidated batch of lookups to a provider.
///
/// An `Err` means the provider endpoint could not be reached; the caller rolls
/// the batch back to `RequestReceived`.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    async fn dispatch(
        &self,
        provider: ServiceProvider,
        batch: &[RequestData],
    ) -> Result<DispatchReceipt>;
}

/// Trait for delivering a reviewed provider response to the originating station.
#[async_trait]
pub trait StationGateway: Send + Sync {
    async fn deliver(&self, request: &RequestData, provider_response: &str) -> Result<()>;
}

// ============================================================================
// Simulated Implementation
// ============================================================================

/// Gateway that stands in for real provider and station endpoints.
///
/// Every call succeeds after a fixed artificial latency.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    dispatch_latency: Duration,
    forward_latency: Duration,
}

impl SimulatedGateway {
    pub fn new(dispatch_latency: Duration, forward_latency: Duration) -> Self {
        Self {
            dispatch_latency,
            forward_latency,
        }
    }

    pub fn from_config(config: &DeskConfig) -> Self {
        Self::new(
            Duration::from_millis(config.dispatch_latency_ms),
            Duration::from_millis(config.forward_latency_ms),
        )
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::from_config(&DeskConfig::default())
    }
}

#[async_trait]
impl ProviderGateway for SimulatedGateway {
    #[tracing::instrument(skip(self, batch), fields(count = batch.len()))]
    async fn dispatch(
        &self,
        provider: ServiceProvider,
        batch: &[RequestData],
    ) -> Result<DispatchReceipt> {
        tracing::debug!(
            latency_ms = self.dispatch_latency.as_millis() as u64,
            "Simulating provider dispatch"
        );
        tokio::time::sleep(self.dispatch_latency).await;
        Ok(DispatchReceipt {
            provider,
            accepted: batch.len(),
        })
    }
}

#[async_trait]
impl StationGateway for SimulatedGateway {
    #[tracing::instrument(skip(self, request, provider_response), fields(request_id = %request.id, station = %request.police_station_email))]
    async fn deliver(&self, request: &RequestData, provider_response: &str) -> Result<()> {
        tracing::debug!(
            latency_ms = self.forward_latency.as_millis() as u64,
            response_len = provider_response.len(),
            "Simulating delivery to station"
        );
        tokio::time::sleep(self.forward_latency).await;
        Ok(())
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

/// Mock gateway for testing.
///
/// Calls succeed unless an outcome has been queued for them. Queued outcomes
/// are consumed in FIFO order per key and can optionally wait for a trigger,
/// which lets tests hold an operation in flight.
///
/// # Example
/// ```ignore
/// let mock = MockGateway::new();
/// mock.fail_dispatch(ServiceProvider::Jio, "connection refused");
/// let trigger = mock.hold_deliver(&RequestId::from("CSR-001"));
/// // ... forward is now blocked waiting ...
/// trigger.send(()).unwrap();
/// ```
#[derive(Clone, Default)]
pub struct MockGateway {
    outcomes: Arc<Mutex<HashMap<String, VecDeque<MockOutcome>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    in_flight: Arc<AtomicUsize>,
}

/// A queued outcome that can optionally wait for a trigger before completing.
enum MockOutcome {
    Immediate(Result<()>),
    Triggered {
        outcome: Result<()>,
        trigger: oneshot::Receiver<()>,
    },
}

/// Record of a call made to the mock gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Dispatch {
        provider: ServiceProvider,
        request_ids: Vec<RequestId>,
    },
    Deliver {
        request_id: RequestId,
        provider_response: String,
    },
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn dispatch_key(provider: ServiceProvider) -> String {
        format!("dispatch {}", provider)
    }

    fn deliver_key(id: &RequestId) -> String {
        format!("deliver {}", id)
    }

    fn push(&self, key: String, outcome: MockOutcome) {
        self.outcomes.lock().entry(key).or_default().push_back(outcome);
    }

    fn unreachable(reason: &str) -> CsrError {
        CsrError::Other(anyhow::anyhow!(reason.to_string()))
    }

    /// Make the next dispatch to `provider` fail with `reason`.
    pub fn fail_dispatch(&self, provider: ServiceProvider, reason: &str) {
        self.push(
            Self::dispatch_key(provider),
            MockOutcome::Immediate(Err(Self::unreachable(reason))),
        );
    }

    /// Make the next delivery of `id` fail with `reason`.
    pub fn fail_deliver(&self, id: &RequestId, reason: &str) {
        self.push(
            Self::deliver_key(id),
            MockOutcome::Immediate(Err(Self::unreachable(reason))),
        );
    }

    /// Hold the next dispatch to `provider` until the returned sender fires (or is dropped).
    pub fn hold_dispatch(&self, provider: ServiceProvider) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.push(
            Self::dispatch_key(provider),
            MockOutcome::Triggered {
                outcome: Ok(()),
                trigger: rx,
            },
        );
        tx
    }

    /// Hold the next delivery of `id` until the returned sender fires (or is dropped).
    pub fn hold_deliver(&self, id: &RequestId) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.push(
            Self::deliver_key(id),
            MockOutcome::Triggered {
                outcome: Ok(()),
                trigger: rx,
            },
        );
        tx
    }

    /// Get all calls that have been made to this mock gateway.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of calls currently waiting on a trigger or executing.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    async fn resolve(&self, key: String) -> Result<()> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
        };

        let outcome = self
            .outcomes
            .lock()
            .get_mut(&key)
            .and_then(|queue| queue.pop_front());

        match outcome {
            None => Ok(()),
            Some(MockOutcome::Immediate(result)) => result,
            Some(MockOutcome::Triggered { outcome, trigger }) => {
                // Proceed whether the trigger fired or was dropped
                let _ = trigger.await;
                outcome
            }
        }
    }
}

#[async_trait]
impl ProviderGateway for MockGateway {
    async fn dispatch(
        &self,
        provider: ServiceProvider,
        batch: &[RequestData],
    ) -> Result<DispatchReceipt> {
        self.calls.lock().push(MockCall::Dispatch {
            provider,
            request_ids: batch.iter().map(|r| r.id.clone()).collect(),
        });

        self.resolve(Self::dispatch_key(provider)).await?;
        Ok(DispatchReceipt {
            provider,
            accepted: batch.len(),
        })
    }
}

#[async_trait]
impl StationGateway for MockGateway {
    async fn deliver(&self, request: &RequestData, provider_response: &str) -> Result<()> {
        self.calls.lock().push(MockCall::Deliver {
            request_id: request.id.clone(),
            provider_response: provider_response.to_string(),
        });

        self.resolve(Self::deliver_key(&request.id)).await
    }
}

/// Guard that decrements the in-flight counter when dropped.
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
