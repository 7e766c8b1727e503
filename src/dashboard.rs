//! Dashboard aggregator: pending requests grouped by provider, and bulk dispatch.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::activity::{Activity, ActivityGuard, ActivityTracker};
use crate::domain::provider::ServiceProvider;
use crate::domain::stats::{ProviderStats, group_by_provider};
use crate::error::Result;
use crate::gateway::ProviderGateway;
use crate::notify::{Notification, Notifier};
use crate::request::{AnyRequest, RequestId, RequestStatus, dispatch_batch};
use crate::storage::{RequestFilter, Storage};

/// Result of a dispatch to one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub provider: ServiceProvider,
    /// Requests moved to `SentToProvider`; empty when nothing was pending
    pub dispatched: Vec<RequestId>,
}

impl DispatchOutcome {
    pub fn is_noop(&self) -> bool {
        self.dispatched.is_empty()
    }
}

/// Projection of the store for the dispatch dashboard.
pub struct DashboardAggregator<S, G> {
    storage: Arc<S>,
    gateway: Arc<G>,
    activity: Arc<ActivityTracker>,
    notifier: Notifier,
}

impl<S, G> DashboardAggregator<S, G>
where
    S: Storage + 'static,
    G: ProviderGateway + 'static,
{
    pub fn new(
        storage: Arc<S>,
        gateway: Arc<G>,
        activity: Arc<ActivityTracker>,
        notifier: Notifier,
    ) -> Self {
        Self {
            storage,
            gateway,
            activity,
            notifier,
        }
    }

    /// Current per-provider grouping of requests awaiting dispatch.
    pub async fn provider_stats(&self) -> Result<Vec<ProviderStats>> {
        let requests = self.storage.list(RequestFilter::all()).await?;
        Ok(group_by_provider(&requests))
    }

    /// Number of requests awaiting dispatch across all providers.
    pub async fn pending_total(&self) -> Result<usize> {
        Ok(self
            .storage
            .list(RequestFilter::with_status(RequestStatus::RequestReceived))
            .await?
            .len())
    }

    /// Whether a dispatch to `provider` is in flight (its send control is busy).
    pub fn is_dispatching(&self, provider: ServiceProvider) -> bool {
        self.activity.is_active(&Activity::Dispatching(provider))
    }

    /// Send every pending request of `provider` and wait for the outcome.
    ///
    /// Fails with `ProviderBusy` if a dispatch to the same provider is already
    /// in flight, and with `ProviderUnreachable` (after rolling back) if the
    /// provider could not be reached.
    pub async fn dispatch_to_provider(&self, provider: ServiceProvider) -> Result<DispatchOutcome> {
        let guard = self.activity.begin(Activity::Dispatching(provider))?;
        Self::run_dispatch(
            provider,
            guard,
            self.storage.clone(),
            self.gateway.clone(),
            self.notifier.clone(),
        )
        .await
    }

    /// Start a dispatch in the background.
    ///
    /// The provider is marked busy before this returns, so an immediate second
    /// call for the same provider fails with `ProviderBusy`.
    pub fn start_dispatch(
        &self,
        provider: ServiceProvider,
    ) -> Result<JoinHandle<Result<DispatchOutcome>>> {
        let guard = self.activity.begin(Activity::Dispatching(provider))?;
        Ok(tokio::spawn(Self::run_dispatch(
            provider,
            guard,
            self.storage.clone(),
            self.gateway.clone(),
            self.notifier.clone(),
        )))
    }

    #[tracing::instrument(skip(guard, storage, gateway, notifier))]
    async fn run_dispatch(
        provider: ServiceProvider,
        guard: ActivityGuard,
        storage: Arc<S>,
        gateway: Arc<G>,
        notifier: Notifier,
    ) -> Result<DispatchOutcome> {
        // Held until the dispatch settles, success or not
        let _guard = guard;

        let pending: Vec<_> = storage
            .list(RequestFilter::pending_for(provider))
            .await?
            .into_iter()
            .filter_map(AnyRequest::into_received)
            .collect();

        if pending.is_empty() {
            tracing::info!("No pending requests for provider");
            notifier.publish(Notification::success(
                "Requests Sent",
                format!("No pending requests for {}; nothing was sent", provider),
            ));
            return Ok(DispatchOutcome {
                provider,
                dispatched: Vec::new(),
            });
        }

        let count = pending.len();
        tracing::info!(count, "Dispatching pending requests");

        match dispatch_batch(provider, pending, gateway.as_ref(), storage.as_ref()).await {
            Ok(sent) => {
                notifier.publish(Notification::success(
                    "Requests Sent",
                    format!(
                        "All pending requests have been consolidated and sent to {}",
                        provider
                    ),
                ));
                Ok(DispatchOutcome {
                    provider,
                    dispatched: sent.into_iter().map(|r| r.data.id).collect(),
                })
            }
            Err(e) => {
                notifier.publish(Notification::error(format!(
                    "Could not reach {}; {} requests remain pending",
                    provider, count
                )));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CsrError;
    use crate::gateway::MockGateway;
    use crate::notify::NotificationLevel;
    use crate::request::{Request, RequestData, RequestReceived};
    use crate::storage::InMemoryStorage;
    use chrono::Utc;

    async fn setup(
        providers: &[ServiceProvider],
    ) -> (
        DashboardAggregator<InMemoryStorage, MockGateway>,
        Arc<InMemoryStorage>,
        MockGateway,
        Notifier,
    ) {
        let storage = Arc::new(InMemoryStorage::new());
        for (i, provider) in providers.iter().enumerate() {
            let request = Request {
                state: RequestReceived {
                    received_at: Utc::now(),
                },
                data: RequestData {
                    id: RequestId::from(format!("CSR-{}", i + 1)),
                    reference_id: format!("REF-{}", i + 1),
                    police_station_name: "Chennai Central Police Station".to_string(),
                    police_station_email: "chennai.central.police.station@tnpolice.gov.in"
                        .to_string(),
                    mobile_number: format!("98765432{:02}", i),
                    service_provider: *provider,
                },
            };
            storage.insert(request.into()).await.unwrap();
        }

        let gateway = MockGateway::new();
        let notifier = Notifier::default();
        let dashboard = DashboardAggregator::new(
            storage.clone(),
            Arc::new(gateway.clone()),
            ActivityTracker::new(),
            notifier.clone(),
        );
        (dashboard, storage, gateway, notifier)
    }

    #[test_log::test(tokio::test)]
    async fn test_dispatch_moves_only_that_provider() {
        use ServiceProvider::*;
        let (dashboard, storage, _gateway, notifier) = setup(&[Jio, Airtel, Jio, Jio]).await;
        let mut notifications = notifier.subscribe();

        let outcome = dashboard.dispatch_to_provider(Jio).await.unwrap();
        assert_eq!(outcome.dispatched.len(), 3);

        let stats = dashboard.provider_stats().await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].provider, Airtel);
        assert_eq!(stats[0].pending_count, 1);
        assert_eq!(dashboard.pending_total().await.unwrap(), 1);

        for id in &outcome.dispatched {
            let stored = storage.get(id).await.unwrap();
            assert_eq!(stored.status(), RequestStatus::SentToProvider);
        }

        let notification = notifications.recv().await.unwrap();
        assert_eq!(notification.title, "Requests Sent");
        assert!(notification.description.ends_with("sent to Jio"));
    }

    #[tokio::test]
    async fn test_dispatch_without_pending_is_noop() {
        let (dashboard, _storage, gateway, notifier) = setup(&[ServiceProvider::Jio]).await;
        let mut notifications = notifier.subscribe();

        let outcome = dashboard
            .dispatch_to_provider(ServiceProvider::Bsnl)
            .await
            .unwrap();
        assert!(outcome.is_noop());
        assert_eq!(gateway.call_count(), 0);
        assert!(!dashboard.is_dispatching(ServiceProvider::Bsnl));

        // Still reported to the operator, naming the provider
        let notification = notifications.try_recv().unwrap();
        assert_eq!(notification.level, NotificationLevel::Success);
        assert_eq!(
            notification.description,
            "No pending requests for BSNL; nothing was sent"
        );
    }

    #[tokio::test]
    async fn test_second_dispatch_while_in_flight_is_rejected() {
        let (dashboard, storage, gateway, _notifier) =
            setup(&[ServiceProvider::Vi, ServiceProvider::Vi]).await;
        let trigger = gateway.hold_dispatch(ServiceProvider::Vi);

        let handle = dashboard.start_dispatch(ServiceProvider::Vi).unwrap();
        assert!(dashboard.is_dispatching(ServiceProvider::Vi));

        let err = dashboard
            .dispatch_to_provider(ServiceProvider::Vi)
            .await
            .unwrap_err();
        assert!(matches!(err, CsrError::ProviderBusy(ServiceProvider::Vi)));

        trigger.send(()).unwrap();
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.dispatched.len(), 2);
        assert!(!dashboard.is_dispatching(ServiceProvider::Vi));

        // Stamped exactly once
        assert_eq!(gateway.call_count(), 1);
        let sent = storage
            .list(RequestFilter::with_status(RequestStatus::SentToProvider))
            .await
            .unwrap();
        assert_eq!(sent.len(), 2);
    }

    #[tokio::test]
    async fn test_other_providers_dispatch_concurrently() {
        let (dashboard, _storage, gateway, _notifier) =
            setup(&[ServiceProvider::Jio, ServiceProvider::Airtel]).await;
        let trigger = gateway.hold_dispatch(ServiceProvider::Jio);

        let jio = dashboard.start_dispatch(ServiceProvider::Jio).unwrap();
        let airtel = dashboard
            .dispatch_to_provider(ServiceProvider::Airtel)
            .await
            .unwrap();
        assert_eq!(airtel.dispatched.len(), 1);
        assert!(dashboard.is_dispatching(ServiceProvider::Jio));

        drop(trigger);
        assert_eq!(jio.await.unwrap().unwrap().dispatched.len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_provider_rolls_back_and_releases() {
        let (dashboard, storage, gateway, notifier) = setup(&[ServiceProvider::Airtel]).await;
        let mut notifications = notifier.subscribe();
        gateway.fail_dispatch(ServiceProvider::Airtel, "connection refused");

        let err = dashboard
            .dispatch_to_provider(ServiceProvider::Airtel)
            .await
            .unwrap_err();
        assert!(matches!(err, CsrError::ProviderUnreachable { .. }));
        assert!(!dashboard.is_dispatching(ServiceProvider::Airtel));

        let stored = storage.get(&RequestId::from("CSR-1")).await.unwrap();
        assert!(stored.is_pending());
        assert!(stored.timestamps().sent_to_provider.is_none());

        let notification = notifications.recv().await.unwrap();
        assert_eq!(notification.level, NotificationLevel::Error);

        // Retry succeeds once the provider is back
        let outcome = dashboard
            .dispatch_to_provider(ServiceProvider::Airtel)
            .await
            .unwrap();
        assert_eq!(outcome.dispatched, vec![RequestId::from("CSR-1")]);
    }
}
